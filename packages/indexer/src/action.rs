//! Message Kinds and Execute Actions
//!
//! Classifies message envelopes by type URL and extracts the single action
//! discriminator from a contract-execution JSON payload.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde_json::value::RawValue;

use crate::proto::{MSG_EXECUTE_CONTRACT, MSG_INSTANTIATE_CONTRACT};

/// Body of an execute message: action name to raw JSON value
pub type ActionPayload = HashMap<String, Box<RawValue>>;

/// Message envelope kinds the router tells apart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    InstantiateContract,
    ExecuteContract,
    /// Any other type URL
    Other(String),
}

impl MessageKind {
    pub fn from_type_url(type_url: &str) -> Self {
        match type_url {
            MSG_INSTANTIATE_CONTRACT => MessageKind::InstantiateContract,
            MSG_EXECUTE_CONTRACT => MessageKind::ExecuteContract,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

/// Contract actions with a dedicated handler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExecuteAction {
    Mint,
    Buy,
    SendNft,
    Withdraw,
    Burn,
    UpdatePrice,
    UpdateMetadata,
    UpdatePrimaryAlias,
    TransferNft,
    /// Action name with no handler
    Unrecognized(String),
}

/// Lookup table from action name to action
static ACTIONS: LazyLock<HashMap<&'static str, ExecuteAction>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    map.insert("mint", ExecuteAction::Mint);
    map.insert("buy", ExecuteAction::Buy);
    map.insert("send_nft", ExecuteAction::SendNft);
    map.insert("withdraw", ExecuteAction::Withdraw);
    map.insert("burn", ExecuteAction::Burn);
    map.insert("update_price", ExecuteAction::UpdatePrice);
    map.insert("update_metadata", ExecuteAction::UpdateMetadata);
    map.insert("update_primary_alias", ExecuteAction::UpdatePrimaryAlias);
    map.insert("transfer_nft", ExecuteAction::TransferNft);
    map
});

impl ExecuteAction {
    /// Resolve an action by exact name
    pub fn from_name(name: &str) -> Self {
        ACTIONS
            .get(name)
            .cloned()
            .unwrap_or_else(|| ExecuteAction::Unrecognized(name.to_string()))
    }

    /// The JSON key naming this action
    pub fn name(&self) -> &str {
        match self {
            ExecuteAction::Mint => "mint",
            ExecuteAction::Buy => "buy",
            ExecuteAction::SendNft => "send_nft",
            ExecuteAction::Withdraw => "withdraw",
            ExecuteAction::Burn => "burn",
            ExecuteAction::UpdatePrice => "update_price",
            ExecuteAction::UpdateMetadata => "update_metadata",
            ExecuteAction::UpdatePrimaryAlias => "update_primary_alias",
            ExecuteAction::TransferNft => "transfer_nft",
            ExecuteAction::Unrecognized(name) => name,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ExecuteAction::Unrecognized(_))
    }
}

/// Result of reading an execute payload
#[derive(Debug)]
pub enum ActionParse {
    /// Exactly one key: the action and its body
    Action {
        action: ExecuteAction,
        body: Box<RawValue>,
    },
    /// Not a JSON object of raw values
    Malformed(serde_json::Error),
    /// A JSON object with zero or several keys
    KeyCount(usize),
}

/// Extract the action discriminator from an execute message body
pub fn parse_action(msg: &[u8]) -> ActionParse {
    let payload: ActionPayload = match serde_json::from_slice(msg) {
        Ok(payload) => payload,
        Err(err) => return ActionParse::Malformed(err),
    };
    if payload.len() != 1 {
        return ActionParse::KeyCount(payload.len());
    }
    match payload.into_iter().next() {
        Some((name, body)) => ActionParse::Action {
            action: ExecuteAction::from_name(&name),
            body,
        },
        None => ActionParse::KeyCount(0),
    }
}
