//! Mock Pipeline Integration Tests
//!
//! Runs the full decode → route → handle → store chain with a recording
//! handler set and the in-memory store (no chain or database required).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prost::Message as _;

use nftscope_indexer::config::{ContractsConfig, FailurePolicy, IndexerConfig};
use nftscope_indexer::decoder::{DecodeError, Message, ResultTx};
use nftscope_indexer::events::{Attribute, StringEvent, TxLog};
use nftscope_indexer::handler::{ExecuteCall, HandlerError, InstantiateCall, MessageHandlers, MintCall};
use nftscope_indexer::ingest::{channel, Indexer, IndexerError};
use nftscope_indexer::proto::{
    Any, MsgExecuteContract, MsgInstantiateContract, Tx, TxBody, MSG_EXECUTE_CONTRACT,
    MSG_INSTANTIATE_CONTRACT,
};
use nftscope_indexer::router::{HandleError, Outcome, Route, Router, RouterError, SkipReason};
use nftscope_indexer::store::{Collection, CollectionMetadata, CollectionStore, InMemoryStore};

const REGISTRY: &str = "tori1registry";
const MINTER_CODE_ID: u64 = 6;

/// Handler set that records every call and keeps a tiny token catalog
#[derive(Clone, Default)]
struct RecordingHandlers {
    store: InMemoryStore,
    calls: Arc<Mutex<Vec<(String, Route)>>>,
    /// (collection, token id) -> owner
    tokens: Arc<Mutex<BTreeMap<(String, String), String>>>,
    fail_on: Option<Route>,
}

impl RecordingHandlers {
    fn new(store: InMemoryStore) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    fn failing_on(store: InMemoryStore, route: Route) -> Self {
        Self {
            fail_on: Some(route),
            ..Self::new(store)
        }
    }

    fn record(&self, msg: &Message, route: Route) -> Result<(), HandlerError> {
        if self.fail_on == Some(route) {
            return Err(HandlerError::Rejected(format!("{} disabled", route.name())));
        }
        self.calls.lock().unwrap().push((msg.msg_id.clone(), route));
        Ok(())
    }

    fn calls(&self) -> Vec<(String, Route)> {
        self.calls.lock().unwrap().clone()
    }

    fn tokens(&self) -> BTreeMap<(String, String), String> {
        self.tokens.lock().unwrap().clone()
    }

    async fn track_collection(&self, call: &InstantiateCall) -> Result<(), HandlerError> {
        self.store
            .upsert(Collection {
                address: call.contract_address.clone(),
                name: call.msg.label.clone(),
                image_uri: String::new(),
                metadata: Some(CollectionMetadata {
                    mint_contract_address: call.contract_address.clone(),
                    nft_contract_address: format!("{}-nft", call.contract_address),
                    creator_address: call.msg.sender.clone(),
                }),
            })
            .await?;
        Ok(())
    }

    fn set_owner(&self, collection: &str, token_id: &str, owner: &str) {
        self.tokens
            .lock()
            .unwrap()
            .insert((collection.to_string(), token_id.to_string()), owner.to_string());
    }
}

#[derive(serde::Deserialize)]
struct TransferNft {
    recipient: String,
    token_id: String,
}

#[async_trait]
impl MessageHandlers for RecordingHandlers {
    async fn instantiate_registry(&self, msg: &Message, call: &InstantiateCall) -> Result<(), HandlerError> {
        self.record(msg, Route::RegistryInstantiation)?;
        self.track_collection(call).await
    }

    async fn instantiate_minter(&self, msg: &Message, call: &InstantiateCall) -> Result<(), HandlerError> {
        self.record(msg, Route::MinterInstantiation)?;
        self.track_collection(call).await
    }

    async fn mint_registry(&self, msg: &Message, call: &MintCall) -> Result<(), HandlerError> {
        self.record(msg, Route::RegistryMint)?;
        self.set_owner(&call.collection.address, &call.token_id, &call.execute.sender);
        Ok(())
    }

    async fn mint_collection(&self, msg: &Message, call: &MintCall) -> Result<(), HandlerError> {
        self.record(msg, Route::CollectionMint)?;
        self.set_owner(&call.collection.address, &call.token_id, &call.execute.sender);
        Ok(())
    }

    async fn buy(&self, msg: &Message, _call: &ExecuteCall) -> Result<(), HandlerError> {
        self.record(msg, Route::Buy)
    }

    async fn send_nft(&self, msg: &Message, _call: &ExecuteCall) -> Result<(), HandlerError> {
        self.record(msg, Route::SendNft)
    }

    async fn withdraw(&self, msg: &Message, _call: &ExecuteCall) -> Result<(), HandlerError> {
        self.record(msg, Route::Withdraw)
    }

    async fn burn(&self, msg: &Message, _call: &ExecuteCall) -> Result<(), HandlerError> {
        self.record(msg, Route::Burn)
    }

    async fn update_price(&self, msg: &Message, _call: &ExecuteCall) -> Result<(), HandlerError> {
        self.record(msg, Route::UpdatePrice)
    }

    async fn update_metadata(&self, msg: &Message, _call: &ExecuteCall) -> Result<(), HandlerError> {
        self.record(msg, Route::UpdateMetadata)
    }

    async fn update_primary_alias(&self, msg: &Message, _call: &ExecuteCall) -> Result<(), HandlerError> {
        self.record(msg, Route::UpdatePrimaryAlias)
    }

    async fn transfer_nft(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError> {
        self.record(msg, Route::TransferNft)?;
        let body: TransferNft = call.body_as()?;
        self.set_owner(&call.contract, &body.token_id, &body.recipient);
        Ok(())
    }
}

// ==================== Fixtures ====================

fn contracts() -> ContractsConfig {
    ContractsConfig {
        registry_contract_address: REGISTRY.to_string(),
        minter_code_id: MINTER_CODE_ID,
        ..Default::default()
    }
}

fn setup() -> (Router, RecordingHandlers, InMemoryStore) {
    let store = InMemoryStore::new();
    let handlers = RecordingHandlers::new(store.clone());
    let router = Router::new(contracts(), Arc::new(store.clone()), Arc::new(handlers.clone()));
    (router, handlers, store)
}

fn event(kind: &str, key: &str, value: &str) -> StringEvent {
    StringEvent {
        kind: kind.to_string(),
        attributes: vec![Attribute {
            key: key.to_string(),
            value: value.to_string(),
        }],
    }
}

fn instantiate_msg(code_id: u64, label: &str) -> Any {
    Any {
        type_url: MSG_INSTANTIATE_CONTRACT.to_string(),
        value: MsgInstantiateContract {
            sender: "tori1creator".to_string(),
            code_id,
            label: label.to_string(),
            msg: b"{}".to_vec(),
            ..Default::default()
        }
        .encode_to_vec(),
    }
}

fn execute_msg(contract: &str, payload: &str) -> Any {
    Any {
        type_url: MSG_EXECUTE_CONTRACT.to_string(),
        value: MsgExecuteContract {
            sender: "tori1buyer".to_string(),
            contract: contract.to_string(),
            msg: payload.as_bytes().to_vec(),
            funds: vec![],
        }
        .encode_to_vec(),
    }
}

fn bank_send() -> Any {
    Any {
        type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
        value: vec![0x0a, 0x03, b'a', b'b', b'c'],
    }
}

/// Build a transaction result from (message, events) pairs
fn result_tx(hash: &[u8], messages: Vec<(Any, Vec<StringEvent>)>) -> ResultTx {
    let (msgs, logs): (Vec<Any>, Vec<TxLog>) = messages
        .into_iter()
        .enumerate()
        .map(|(i, (msg, events))| {
            (
                msg,
                TxLog {
                    msg_index: i as u32,
                    log: String::new(),
                    events,
                },
            )
        })
        .unzip();
    let tx = Tx {
        body: Some(TxBody {
            messages: msgs,
            ..Default::default()
        }),
        signatures: vec![vec![0u8; 64]],
    };
    ResultTx {
        hash: hash.to_vec(),
        height: 100,
        tx: tx.encode_to_vec(),
        log: serde_json::to_string(&logs).unwrap(),
    }
}

async fn seed_collection(store: &InMemoryStore, address: &str, with_metadata: bool) {
    store
        .insert(Collection {
            address: address.to_string(),
            name: "Genesis".to_string(),
            image_uri: String::new(),
            metadata: with_metadata.then(|| CollectionMetadata {
                mint_contract_address: address.to_string(),
                nft_contract_address: "tori1nft".to_string(),
                creator_address: "tori1creator".to_string(),
            }),
        })
        .await;
}

// ==================== Scenario Tests ====================

#[tokio::test]
async fn test_mint_on_tracked_collection() {
    let (router, handlers, store) = setup();
    seed_collection(&store, "tori1genesis", true).await;

    let tx = result_tx(
        &[0xab, 0xc0],
        vec![(
            execute_msg("tori1genesis", r#"{"mint": {}}"#),
            vec![event("wasm", "token_id", "42")],
        )],
    );
    let report = router.handle_result_tx(&tx).await.unwrap();

    assert_eq!(report.outcomes, vec![Outcome::Handled(Route::CollectionMint)]);
    assert_eq!(handlers.calls(), vec![("ABC0-0".to_string(), Route::CollectionMint)]);
    assert_eq!(
        handlers.tokens().get(&("tori1genesis".to_string(), "42".to_string())),
        Some(&"tori1buyer".to_string())
    );
}

#[tokio::test]
async fn test_mint_on_collection_without_metadata() {
    let (router, handlers, store) = setup();
    seed_collection(&store, "tori1genesis", false).await;

    let tx = result_tx(
        &[0xab, 0xc0],
        vec![(
            execute_msg("tori1genesis", r#"{"mint": {}}"#),
            vec![event("wasm", "token_id", "42")],
        )],
    );
    let err = router.handle_result_tx(&tx).await.unwrap_err();

    assert!(matches!(
        err,
        RouterError::Message {
            source: HandleError::DataIntegrity { .. },
            ..
        }
    ));
    assert!(handlers.calls().is_empty());
}

#[tokio::test]
async fn test_two_key_payload_is_skipped() {
    let (router, handlers, _store) = setup();

    let tx = result_tx(
        &[0x01],
        vec![(execute_msg("tori1genesis", r#"{"foo": {}, "bar": {}}"#), vec![])],
    );
    let report = router.handle_result_tx(&tx).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![Outcome::Skipped(SkipReason::UnexpectedKeyCount(2))]
    );
    assert!(handlers.calls().is_empty());
}

// ==================== Ordering Tests ====================

#[tokio::test]
async fn test_instantiate_then_mint_in_one_transaction() {
    let (router, handlers, store) = setup();

    let tx = result_tx(
        &[0x10],
        vec![
            (
                instantiate_msg(MINTER_CODE_ID, "Fresh Drop"),
                vec![event("instantiate", "_contract_address", "tori1fresh")],
            ),
            (
                execute_msg("tori1fresh", r#"{"mint": {}}"#),
                vec![event("wasm", "token_id", "1")],
            ),
        ],
    );
    let report = router.handle_result_tx(&tx).await.unwrap();

    assert_eq!(
        report.outcomes,
        vec![
            Outcome::Handled(Route::MinterInstantiation),
            Outcome::Handled(Route::CollectionMint),
        ]
    );
    assert_eq!(store.get("tori1fresh").await.unwrap().name, "Fresh Drop");
    assert_eq!(
        handlers.calls(),
        vec![
            ("10-0".to_string(), Route::MinterInstantiation),
            ("10-1".to_string(), Route::CollectionMint),
        ]
    );
}

#[tokio::test]
async fn test_mixed_transaction_keeps_positions() {
    let (router, handlers, _store) = setup();

    let tx = result_tx(
        &[0x20],
        vec![
            (bank_send(), vec![event("transfer", "amount", "5utori")]),
            (execute_msg("tori1vault", r#"{"buy": {"nft_contract_addr": "x"}}"#), vec![]),
            (execute_msg("tori1vault", r#"{"approve": {}}"#), vec![]),
            (execute_msg("tori1vault", r#"{"withdraw": {}}"#), vec![]),
        ],
    );
    let report = router.handle_result_tx(&tx).await.unwrap();

    assert_eq!(report.handled_count(), 2);
    assert_eq!(report.skipped_count(), 2);
    assert_eq!(
        handlers.calls(),
        vec![
            ("20-1".to_string(), Route::Buy),
            ("20-3".to_string(), Route::Withdraw),
        ]
    );
}

#[tokio::test]
async fn test_registry_instantiation_and_mint() {
    let (router, handlers, _store) = setup();

    let tx = result_tx(
        &[0x30],
        vec![
            (
                instantiate_msg(1, "Name Service"),
                vec![event("instantiate", "_contract_address", REGISTRY)],
            ),
            (
                execute_msg(REGISTRY, r#"{"mint": {"token_id": "alice.tori"}}"#),
                vec![event("wasm", "token_id", "alice.tori")],
            ),
        ],
    );
    router.handle_result_tx(&tx).await.unwrap();

    let routes: Vec<Route> = handlers.calls().into_iter().map(|(_, route)| route).collect();
    assert_eq!(routes, vec![Route::RegistryInstantiation, Route::RegistryMint]);
}

// ==================== Failure Tests ====================

#[tokio::test]
async fn test_alignment_mismatch_dispatches_nothing() {
    let (router, handlers, _store) = setup();

    let mut tx = result_tx(&[0x40], vec![(execute_msg("tori1vault", r#"{"buy": {}}"#), vec![])]);
    tx.log = "[]".to_string();
    let err = router.handle_result_tx(&tx).await.unwrap_err();

    assert!(matches!(
        err,
        RouterError::Decode(DecodeError::Alignment { messages: 1, logs: 0 })
    ));
    assert!(handlers.calls().is_empty());
}

#[tokio::test]
async fn test_failure_keeps_earlier_messages_committed() {
    let store = InMemoryStore::new();
    let handlers = RecordingHandlers::failing_on(store.clone(), Route::Burn);
    let router = Router::new(contracts(), Arc::new(store), Arc::new(handlers.clone()));

    let tx = result_tx(
        &[0x50],
        vec![
            (execute_msg("tori1vault", r#"{"buy": {}}"#), vec![]),
            (execute_msg("tori1vault", r#"{"burn": {}}"#), vec![]),
            (execute_msg("tori1vault", r#"{"withdraw": {}}"#), vec![]),
        ],
    );
    let err = router.handle_result_tx(&tx).await.unwrap_err();

    match err {
        RouterError::Message { msg_id, .. } => assert_eq!(msg_id, "50-1"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(handlers.calls(), vec![("50-0".to_string(), Route::Buy)]);
}

// ==================== Idempotence Tests ====================

#[tokio::test]
async fn test_replayed_transaction_yields_same_state() {
    let (router, handlers, store) = setup();
    let tx = result_tx(
        &[0x60],
        vec![
            (
                instantiate_msg(MINTER_CODE_ID, "Replay"),
                vec![event("instantiate", "_contract_address", "tori1replay")],
            ),
            (
                execute_msg("tori1replay", r#"{"mint": {}}"#),
                vec![event("wasm", "token_id", "9")],
            ),
            (
                execute_msg(
                    "tori1replay",
                    r#"{"transfer_nft": {"recipient": "tori1friend", "token_id": "9"}}"#,
                ),
                vec![],
            ),
        ],
    );

    router.handle_result_tx(&tx).await.unwrap();
    let tokens_once = handlers.tokens();
    let collection_once = store.get("tori1replay").await;

    router.handle_result_tx(&tx).await.unwrap();

    assert_eq!(handlers.tokens(), tokens_once);
    assert_eq!(store.get("tori1replay").await, collection_once);
    assert_eq!(store.len().await, 1);
    assert_eq!(
        tokens_once.get(&("tori1replay".to_string(), "9".to_string())),
        Some(&"tori1friend".to_string())
    );
}

// ==================== Ingest Loop Tests ====================

#[tokio::test]
async fn test_ingest_loop_processes_stream_in_order() {
    let store = InMemoryStore::new();
    let handlers = RecordingHandlers::new(store.clone());
    let config = IndexerConfig {
        contracts: contracts(),
        ..Default::default()
    };
    let mut indexer = Indexer::from_config(&config, Arc::new(store), Arc::new(handlers.clone()));

    let (sender, receiver) = channel(&config);
    let producer = tokio::spawn(async move {
        for i in 0..20u8 {
            let tx = result_tx(&[i], vec![(execute_msg("tori1vault", r#"{"update_price": {}}"#), vec![])]);
            sender.send(tx).await.unwrap();
        }
    });

    let stats = indexer.run(receiver).await.unwrap();
    producer.await.unwrap();

    assert_eq!(stats.transactions, 20);
    assert_eq!(stats.messages_handled, 20);
    let ids: Vec<String> = handlers.calls().into_iter().map(|(id, _)| id).collect();
    let expected: Vec<String> = (0..20u8).map(|i| format!("{:02X}-0", i)).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_ingest_loop_halt_and_skip_policies() {
    for (policy, expect_halt) in [(FailurePolicy::Halt, true), (FailurePolicy::Skip, false)] {
        let store = InMemoryStore::new();
        let handlers = RecordingHandlers::new(store.clone());
        let router = Router::new(contracts(), Arc::new(store), Arc::new(handlers.clone()));
        let mut indexer = Indexer::new(router, policy);

        let (sender, receiver) = channel(&IndexerConfig::default());
        sender
            .send(result_tx(&[1], vec![(execute_msg("tori1vault", r#"{"buy": {}}"#), vec![])]))
            .await
            .unwrap();
        let mut broken = result_tx(&[2], vec![(execute_msg("tori1vault", r#"{"buy": {}}"#), vec![])]);
        broken.log = "[{}, {}]".to_string();
        sender.send(broken).await.unwrap();
        sender
            .send(result_tx(&[3], vec![(execute_msg("tori1vault", r#"{"burn": {}}"#), vec![])]))
            .await
            .unwrap();
        drop(sender);

        let result = indexer.run(receiver).await;

        if expect_halt {
            assert!(matches!(result, Err(IndexerError::Halted { ref tx_hash, .. }) if tx_hash == "02"));
            assert_eq!(handlers.calls().len(), 1);
        } else {
            let stats = result.unwrap();
            assert_eq!(stats.transactions, 2);
            assert_eq!(stats.failed_transactions, 1);
            assert_eq!(handlers.calls().len(), 2);
        }
    }
}
