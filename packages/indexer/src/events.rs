//! Event Log Model
//!
//! Parses the per-message execution log emitted by the chain into an
//! [`EventsMap`]: a read-only index from `"<event type>.<attribute key>"` to
//! every value emitted under that key, in emission order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Key holding the address of a freshly instantiated contract
pub const INSTANTIATE_CONTRACT_ADDRESS_KEY: &str = "instantiate._contract_address";

/// Key holding the token id emitted by cw721 contracts
pub const TOKEN_ID_KEY: &str = "wasm.token_id";

/// Errors raised by typed lookups on an [`EventsMap`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Missing event field: {0}")]
    MissingField(String),
}

/// A single key/value attribute of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// One chain-emitted event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// Execution log of one message inside a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLog {
    #[serde(default)]
    pub msg_index: u32,
    #[serde(default)]
    pub log: String,
    #[serde(default)]
    pub events: Vec<StringEvent>,
}

/// Index over a message's events keyed by `type.key`.
///
/// Values keep their multiplicity and emission order. The map is built once
/// and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsMap {
    entries: HashMap<String, Vec<String>>,
}

impl EventsMap {
    /// Build the map from events, in order
    pub fn from_events(events: &[StringEvent]) -> Self {
        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        for event in events {
            for attribute in &event.attributes {
                entries
                    .entry(format!("{}.{}", event.kind, attribute.key))
                    .or_default()
                    .push(attribute.value.clone());
            }
        }
        Self { entries }
    }

    /// Build the map from a message log
    pub fn from_log(log: &TxLog) -> Self {
        Self::from_events(&log.events)
    }

    /// All values emitted under `key`, in emission order
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// The first value emitted under `key`.
    ///
    /// Later values are ignored: the first emission always wins.
    pub fn first(&self, key: &str) -> Result<&str, EventError> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .ok_or_else(|| EventError::MissingField(key.to_string()))
    }

    /// Address of the contract created by an instantiate message
    pub fn instantiate_contract_address(&self) -> Result<&str, EventError> {
        self.first(INSTANTIATE_CONTRACT_ADDRESS_KEY)
    }

    /// Token id emitted by a mint
    pub fn token_id(&self) -> Result<&str, EventError> {
        self.first(TOKEN_ID_KEY)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
