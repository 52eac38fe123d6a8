//! NFTScope Indexer Library
//!
//! This crate decodes CosmWasm transaction results into event-enriched
//! messages and routes each message to the handler that updates the NFT
//! marketplace catalog (collections, tokens, ownership, prices).

pub mod action;
pub mod config;
pub mod decoder;
pub mod events;
pub mod handler;
pub mod ingest;
pub mod proto;
pub mod router;
pub mod store;

// Re-export commonly used types
pub use action::{parse_action, ExecuteAction, MessageKind};
pub use config::{ContractsConfig, FailurePolicy, IndexerConfig};
pub use decoder::{decode_result_tx, DecodeError, Message, ResultTx};
pub use events::{EventError, EventsMap};
pub use handler::{ExecuteCall, HandlerError, InstantiateCall, MessageHandlers, MintCall};
pub use ingest::{Indexer, IndexerError, IndexerStats};
pub use router::{HandleError, Outcome, Route, Router, RouterError, SkipReason, TxReport};
pub use store::{Collection, CollectionMetadata, CollectionStore, InMemoryStore, StoreError};
