//! Handler Contract
//!
//! One method per (message type, action) pair. Handlers are the only code
//! allowed to mutate the catalog. Transactions may be delivered more than
//! once, so every handler must be idempotent with respect to
//! [`Message::msg_id`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::action::ExecuteAction;
use crate::decoder::Message;
use crate::events::EventError;
use crate::proto::{Coin, MsgExecuteContract, MsgInstantiateContract};
use crate::store::{Collection, CollectionMetadata, StoreError};

#[cfg(test)]
use mockall::automock;

/// Errors a handler may return
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid action body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Rejected: {0}")]
    Rejected(String),
}

/// A decoded instantiate message together with the created contract
#[derive(Debug, Clone, PartialEq)]
pub struct InstantiateCall {
    /// Address of the instantiated contract, taken from the events
    pub contract_address: String,
    pub msg: MsgInstantiateContract,
}

/// A decoded execute message with its resolved action
#[derive(Debug, Clone)]
pub struct ExecuteCall {
    pub sender: String,
    pub contract: String,
    pub funds: Vec<Coin>,
    pub action: ExecuteAction,
    /// JSON value found under the action key
    pub body: Box<RawValue>,
}

impl ExecuteCall {
    pub fn new(msg: MsgExecuteContract, action: ExecuteAction, body: Box<RawValue>) -> Self {
        Self {
            sender: msg.sender,
            contract: msg.contract,
            funds: msg.funds,
            action,
            body,
        }
    }

    /// Deserialize the action body into a handler-specific type
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(serde_json::from_str(self.body.get())?)
    }
}

/// A mint whose collection and token id are already resolved
#[derive(Debug, Clone)]
pub struct MintCall {
    pub execute: ExecuteCall,
    pub collection: Collection,
    pub metadata: CollectionMetadata,
    pub token_id: String,
}

/// Handlers updating the catalog
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageHandlers: Send + Sync {
    /// The registry (name service) contract was instantiated
    async fn instantiate_registry(&self, msg: &Message, call: &InstantiateCall) -> Result<(), HandlerError>;

    /// A minter contract of the well-known code id was instantiated
    async fn instantiate_minter(&self, msg: &Message, call: &InstantiateCall) -> Result<(), HandlerError>;

    /// Mint into the registry collection
    async fn mint_registry(&self, msg: &Message, call: &MintCall) -> Result<(), HandlerError>;

    /// Mint into any other tracked collection
    async fn mint_collection(&self, msg: &Message, call: &MintCall) -> Result<(), HandlerError>;

    async fn buy(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError>;

    async fn send_nft(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError>;

    async fn withdraw(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError>;

    async fn burn(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError>;

    async fn update_price(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError>;

    async fn update_metadata(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError>;

    async fn update_primary_alias(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError>;

    async fn transfer_nft(&self, msg: &Message, call: &ExecuteCall) -> Result<(), HandlerError>;
}
