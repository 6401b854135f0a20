use crate::*;

use blockrelay_core::hash;
use blockrelay_services::{BlockSource, FetchError, Relay, Delivery};

/// A one-byte block `AA` served under its own identifier is verified and
/// written to the output sink.
#[tokio::test]
async fn single_byte_block_is_verified_and_persisted() {
    let id = Identifier::of(&[0xAA]);
    let mut state = ExplorerState::default();
    state.insert_raw_block(&id.to_hex(), "AA");
    let explorer = MockExplorer::start(state).await.unwrap();
    let client = explorer.client();

    let raw = client.fetch_raw_block(&id).await.unwrap();
    assert!(hash::verify_hex(raw.as_hex(), &id.to_hex()));

    let tmp = TempOutput::new();
    let report = Relay::new(&client, Delivery::Persist)
        .blocks(&[id], tmp.sinks())
        .await
        .unwrap();

    assert_eq!(report.fetched.verified, 1);
    assert_eq!(tmp.out(), vec!["AA"]);
    assert!(tmp.err().is_empty());
}

/// An unknown identifier ends up in the failure sink and the run goes on.
#[tokio::test]
async fn unknown_block_goes_to_failure_sink() {
    let blocks = chain(2);
    let explorer = MockExplorer::start(ExplorerState::with_chain(&blocks))
        .await
        .unwrap();
    let client = explorer.client();
    let missing = Identifier::of(b"never mined");

    let err = client.fetch_raw_block(&missing).await.unwrap_err();
    assert!(err.is_not_found(), "got {err:?}");

    let tmp = TempOutput::new();
    let report = Relay::new(&client, Delivery::Persist)
        .blocks(&[missing, blocks[1].id], tmp.sinks())
        .await
        .unwrap();

    assert_eq!(report.fetched.not_found, 1);
    assert_eq!(report.fetched.verified, 1);
    assert!(report.halted.is_none());
    assert_eq!(tmp.err(), vec![missing.to_hex()]);
    assert_eq!(tmp.out(), vec![blocks[1].raw.as_hex().to_string()]);
}

/// A transaction id the explorer answers "Not found" for is written to the
/// failure sink as given and the rest of the list is still fetched.
#[tokio::test]
async fn unknown_transaction_goes_to_failure_sink() {
    let blocks = chain(1);
    let (known, known_raw) = &blocks[0].txs[1];
    let missing = Identifier::of(b"never broadcast");
    let mut state = ExplorerState::with_chain(&blocks);
    state.respond(&missing, 404, "Not found");
    let explorer = MockExplorer::start(state).await.unwrap();
    let client = explorer.client();

    let tmp = TempOutput::new();
    let report = Relay::new(&client, Delivery::Persist)
        .with_concurrency(2)
        .transactions(&[missing, *known], tmp.sinks())
        .await
        .unwrap();

    assert_eq!(report.fetched.not_found, 1);
    assert_eq!(report.fetched.verified, 1);
    assert!(report.halted.is_none());
    assert_eq!(tmp.err(), vec![missing.to_hex()]);
    assert_eq!(tmp.out(), vec![known_raw.as_hex().to_string()]);
}

#[tokio::test]
async fn not_found_marker_wins_over_status() {
    let id = Identifier::of(b"odd explorer");
    let mut state = ExplorerState::default();
    state.respond(&id, 200, "Not found");
    let explorer = MockExplorer::start(state).await.unwrap();

    let err = explorer.client().fetch_raw_tx(&id).await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound { what: "transaction", .. }), "got {err:?}");
}

#[tokio::test]
async fn server_error_without_marker_is_status() {
    let id = Identifier::of(b"overloaded");
    let mut state = ExplorerState::default();
    state.respond(&id, 503, "try later");
    let explorer = MockExplorer::start(state).await.unwrap();

    let err = explorer.client().fetch_raw_block(&id).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }), "got {err:?}");
}

#[tokio::test]
async fn wrong_shape_is_malformed() {
    let id = Identifier::of(b"schema drift");
    let mut state = ExplorerState::default();
    state.respond(&id, 200, r#"{"raw":"aa"}"#);
    let explorer = MockExplorer::start(state).await.unwrap();

    let err = explorer.client().fetch_raw_block(&id).await.unwrap_err();
    assert!(matches!(err, FetchError::Malformed { .. }), "got {err:?}");
}

#[tokio::test]
async fn unreachable_explorer_is_transport() {
    let client = ExplorerClient::new(format!("{}/api", dead_url()), TIMEOUT).unwrap();
    let err = client
        .fetch_block_meta(&Identifier::of(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transport { .. }), "got {err:?}");
}

#[tokio::test]
async fn block_metadata_links_successor() {
    let blocks = chain(3);
    let explorer = MockExplorer::start(ExplorerState::with_chain(&blocks))
        .await
        .unwrap();
    let client = explorer.client();

    let first = client.fetch_block_meta(&blocks[0].id).await.unwrap();
    assert_eq!(first.id, blocks[0].id);
    assert_eq!(first.height, Some(0));
    assert_eq!(first.next, Some(blocks[1].id));
    assert_eq!(first.txids.len(), 3);
    assert_eq!(first.txids[0], blocks[0].txs[0].0);

    let tip = client.fetch_block_meta(&blocks[2].id).await.unwrap();
    assert!(tip.next.is_none());
}

#[tokio::test]
async fn metadata_for_another_block_is_malformed() {
    let blocks = chain(2);
    let mut state = ExplorerState::with_chain(&blocks);
    let served = json!({ "hash": blocks[1].id.to_hex(), "tx": [] }).to_string();
    state.respond(&blocks[0].id, 200, &served);
    let explorer = MockExplorer::start(state).await.unwrap();

    let err = explorer
        .client()
        .fetch_block_meta(&blocks[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Malformed { .. }), "got {err:?}");
}

#[tokio::test]
async fn identifiers_are_case_insensitive_on_input() {
    let blocks = chain(1);
    let explorer = MockExplorer::start(ExplorerState::with_chain(&blocks))
        .await
        .unwrap();
    let upper: Identifier = blocks[0].id.to_hex().to_uppercase().parse().unwrap();

    let raw = explorer.client().fetch_raw_block(&upper).await.unwrap();
    assert_eq!(raw, blocks[0].raw);
}
