use crate::*;

use blockrelay_core::config::{NodeConfig, TransportPolicy};
use blockrelay_core::PayloadKind;
use blockrelay_services::{
    submit_lines, NodeSubmitter, RunCounters, SubmissionOutcome, SubmitError,
};

/// Accepted, already-known and rejected answers land one in each bucket.
#[tokio::test]
async fn three_answers_three_buckets() {
    let node = MockNode::start(
        NodeState::default()
            .reject("bb", 19, "txn-already-known")
            .reject("cc", 25, "bad-txns-inputs-missingorspent"),
    )
    .await
    .unwrap();

    let tmp = TempOutput::new();
    let report = submit_lines(
        &node.submitter(),
        PayloadKind::Transaction,
        ["aa", "bb", "cc"],
        TransportPolicy::Abort,
        tmp.sinks(),
    )
    .await
    .unwrap();

    assert_eq!(
        report.submitted,
        RunCounters {
            accepted: 1,
            duplicate: 1,
            other: 1
        }
    );
    assert_eq!(report.submitted.total(), 3);
    assert!(report.halted.is_none());
    assert_eq!(tmp.err(), vec!["cc"]);
}

#[tokio::test]
async fn request_envelope_and_headers() {
    let node = MockNode::start(NodeState::default()).await.unwrap();
    let submitter = RpcSubmitter::from_config(
        &NodeConfig {
            rpc_url: node.url.clone(),
            rpc_user: "myusername".into(),
            rpc_password: "secret".into(),
            request_id: "curltest".into(),
            timeout_secs: 5,
        },
        ErrorClassifier::default(),
    )
    .unwrap();

    let block = RawPayload::from_hex("00ff");
    assert_eq!(
        submitter.submit_block(&block).await.unwrap(),
        SubmissionOutcome::Accepted
    );
    let tx = RawPayload::from_hex("abcd");
    submitter.submit_transaction(&tx).await.unwrap();

    let seen = node.requests();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].content_type.as_deref(), Some("text/plain;"));
    assert_eq!(
        seen[0].authorization.as_deref(),
        Some("Basic bXl1c2VybmFtZTpzZWNyZXQ=")
    );
    assert_eq!(
        seen[0].body,
        json!({
            "jsonrpc": "1.0",
            "id": "curltest",
            "method": "submitblock",
            "params": ["00ff"],
        })
    );
    assert_eq!(seen[1].body["method"], "sendrawtransaction");
    assert_eq!(seen[1].body["params"][0], "abcd");
}

#[tokio::test]
async fn no_credentials_no_auth_header() {
    let node = MockNode::start(NodeState::default()).await.unwrap();
    node.submitter()
        .submit_block(&RawPayload::from_hex("01"))
        .await
        .unwrap();
    assert!(node.requests()[0].authorization.is_none());
}

/// Submitting the same payload twice: the second answer is the duplicate code.
#[tokio::test]
async fn resubmission_is_duplicate() {
    let node = MockNode::start(NodeState::default()).await.unwrap();
    let submitter = node.submitter();
    let payload = RawPayload::from_hex("deadbeef");

    let first = submitter.submit_transaction(&payload).await.unwrap();
    let second = submitter.submit_transaction(&payload).await.unwrap();

    assert_eq!(first, SubmissionOutcome::Accepted);
    assert!(
        matches!(second, SubmissionOutcome::DuplicateOrExpected(ref e) if e.code == 19),
        "got {second:?}"
    );
}

#[tokio::test]
async fn rpc_error_under_http_500_is_still_classified() {
    let node = MockNode::start(NodeState::default().reject("0b", -22, "TX decode failed"))
        .await
        .unwrap();
    let outcome = node
        .submitter()
        .submit_transaction(&RawPayload::from_hex("0b"))
        .await
        .unwrap();
    let err = outcome.rpc_error().unwrap();
    assert_eq!(outcome.label(), "other-error");
    assert_eq!(err.code, -22);
    assert_eq!(err.message, "TX decode failed");
}

#[tokio::test]
async fn non_rpc_body_is_malformed() {
    // The mock explorer has no POST route: 404 with an empty body.
    let explorer = MockExplorer::start(ExplorerState::default()).await.unwrap();
    let submitter = RpcSubmitter::new(&explorer.base_url, TIMEOUT, ErrorClassifier::default())
        .unwrap();
    let err = submitter
        .submit_block(&RawPayload::from_hex("aa"))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Malformed { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreachable_node_aborts_batch() {
    let submitter = RpcSubmitter::new(dead_url(), TIMEOUT, ErrorClassifier::default()).unwrap();

    let tmp = TempOutput::new();
    let report = submit_lines(
        &submitter,
        PayloadKind::Block,
        ["aa", "bb", "cc"],
        TransportPolicy::Abort,
        tmp.sinks(),
    )
    .await
    .unwrap();

    assert_eq!(report.submitted.total(), 0);
    assert_eq!(report.submit_transport_failures, 1);
    assert!(report.is_halted());
    assert_eq!(tmp.err(), vec!["aa"]);
}

#[tokio::test]
async fn unreachable_node_with_skip_tries_everything() {
    let submitter = RpcSubmitter::new(dead_url(), TIMEOUT, ErrorClassifier::default()).unwrap();

    let tmp = TempOutput::new();
    let report = submit_lines(
        &submitter,
        PayloadKind::Block,
        ["aa", "bb", "cc"],
        TransportPolicy::Skip,
        tmp.sinks(),
    )
    .await
    .unwrap();

    assert_eq!(report.submitted.total(), 0);
    assert_eq!(report.submit_transport_failures, 3);
    assert!(!report.is_halted());
    assert_eq!(tmp.err(), vec!["aa", "bb", "cc"]);
}
