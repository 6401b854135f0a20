use crate::*;

use blockrelay_core::config::TransportPolicy;
use blockrelay_services::{Delivery, Halt, Relay};

/// Walk a five block chain from its first block into the node, then replay
/// it: the second pass is all duplicates.
#[tokio::test]
async fn chain_walk_into_node_is_idempotent() {
    let blocks = chain(5);
    let explorer = MockExplorer::start(ExplorerState::with_chain(&blocks))
        .await
        .unwrap();
    let node = MockNode::start(NodeState::default()).await.unwrap();
    let client = explorer.client();
    let submitter = node.submitter();
    let relay = Relay::new(&client, Delivery::Submit(&submitter));

    let first = relay.chain(blocks[0].id, None, Sinks::none()).await.unwrap();
    assert_eq!(first.fetched.verified, 5);
    assert_eq!(first.submitted.accepted, 5);

    let second = relay.chain(blocks[0].id, None, Sinks::none()).await.unwrap();
    assert_eq!(second.submitted.duplicate, 5);
    assert_eq!(second.submitted.accepted, 0);

    let sent: Vec<Value> = node
        .requests()
        .iter()
        .take(5)
        .map(|r| r.body["params"][0].clone())
        .collect();
    let expected: Vec<Value> = blocks.iter().map(|b| json!(b.raw.as_hex())).collect();
    assert_eq!(sent, expected, "blocks submitted in chain order");
}

#[tokio::test]
async fn chain_limit_stops_early() {
    let blocks = chain(6);
    let explorer = MockExplorer::start(ExplorerState::with_chain(&blocks))
        .await
        .unwrap();
    let client = explorer.client();

    let tmp = TempOutput::new();
    let report = Relay::new(&client, Delivery::Persist)
        .chain(blocks[2].id, Some(2), tmp.sinks())
        .await
        .unwrap();

    assert_eq!(report.fetched.verified, 2);
    assert_eq!(
        tmp.out(),
        vec![
            blocks[2].raw.as_hex().to_string(),
            blocks[3].raw.as_hex().to_string()
        ]
    );
}

#[tokio::test]
async fn block_transactions_leave_out_coinbase() {
    let blocks = chain(2);
    let explorer = MockExplorer::start(ExplorerState::with_chain(&blocks))
        .await
        .unwrap();
    let client = explorer.client();
    let ids: Vec<Identifier> = blocks.iter().map(|b| b.id).collect();

    let tmp = TempOutput::new();
    let report = Relay::new(&client, Delivery::Persist)
        .with_concurrency(4)
        .block_transactions(&ids, tmp.sinks())
        .await
        .unwrap();

    let expected: Vec<String> = blocks
        .iter()
        .flat_map(|b| b.txs.iter().skip(1))
        .map(|(_, raw)| raw.as_hex().to_string())
        .collect();
    assert_eq!(report.fetched.verified, 4);
    assert_eq!(tmp.out(), expected);
    // Two metadata lookups plus four transactions.
    assert_eq!(explorer.hits(), 6);
}

#[tokio::test]
async fn check_transactions_against_explorer() {
    let blocks = chain(1);
    let mut state = ExplorerState::with_chain(&blocks);
    let (gone_id, gone) = &blocks[0].txs[2];
    state.remove_raw_tx(gone_id);
    let explorer = MockExplorer::start(state).await.unwrap();
    let client = explorer.client();

    let known = blocks[0].txs[1].1.as_hex().to_string();
    let lines = vec![known.clone(), gone.as_hex().to_string()];

    let tmp = TempOutput::new();
    let report = Relay::new(&client, Delivery::Persist)
        .with_concurrency(2)
        .check_transactions(&lines, tmp.sinks())
        .await
        .unwrap();

    assert_eq!(report.fetched.verified, 1);
    assert_eq!(report.fetched.not_found, 1);
    assert_eq!(tmp.out(), vec![known]);
    assert_eq!(tmp.err(), vec![gone.as_hex().to_string()]);
}

#[tokio::test]
async fn fetched_blocks_into_unreachable_node_abort() {
    let blocks = chain(3);
    let explorer = MockExplorer::start(ExplorerState::with_chain(&blocks))
        .await
        .unwrap();
    let client = explorer.client();
    let submitter = RpcSubmitter::new(dead_url(), TIMEOUT, ErrorClassifier::default()).unwrap();
    let ids: Vec<Identifier> = blocks.iter().map(|b| b.id).collect();

    let tmp = TempOutput::new();
    let report = Relay::new(&client, Delivery::Submit(&submitter))
        .with_policy(TransportPolicy::Abort)
        .blocks(&ids, tmp.sinks())
        .await
        .unwrap();

    assert_eq!(report.fetched.verified, 1);
    assert!(matches!(report.halted, Some(Halt::Submit { position: 1, .. })));
    assert_eq!(tmp.err(), vec![ids[0].to_hex()]);
    assert_eq!(explorer.hits(), 1, "nothing fetched after the abort");
}
