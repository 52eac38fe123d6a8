//! Message Router
//!
//! Routes each enriched message to at most one handler. Instantiate messages
//! are routed by the created contract's address and code id, execute messages
//! by the single action key of their JSON body. Unrecognized shapes are
//! skipped, never treated as errors.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::action::{parse_action, ActionParse, ExecuteAction, MessageKind};
use crate::config::ContractsConfig;
use crate::decoder::{decode_messages, decode_result_tx, DecodeError, Message, ResultTx};
use crate::events::{EventError, TxLog};
use crate::handler::{ExecuteCall, HandlerError, InstantiateCall, MessageHandlers, MintCall};
use crate::proto::{MsgExecuteContract, MsgInstantiateContract, Tx};
use crate::store::{CollectionStore, StoreError};

/// Errors that abort the processing of one message
#[derive(Error, Debug)]
pub enum HandleError {
    #[error("Failed to decode message: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to extract event field: {0}")]
    EventExtraction(#[from] EventError),

    #[error("Data integrity violation for {address}: {reason}")]
    DataIntegrity { address: String, reason: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to handle {}: {source}", .route.name())]
    Handler {
        route: Route,
        #[source]
        source: HandlerError,
    },
}

/// Errors that abort the processing of a transaction
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Failed to decode transaction: {0}")]
    Decode(#[from] DecodeError),

    #[error("Failed to handle message {msg_id}: {source}")]
    Message {
        msg_id: String,
        msg_index: usize,
        #[source]
        source: HandleError,
    },
}

/// The handler a message was dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    RegistryInstantiation,
    MinterInstantiation,
    RegistryMint,
    CollectionMint,
    Buy,
    SendNft,
    Withdraw,
    Burn,
    UpdatePrice,
    UpdateMetadata,
    UpdatePrimaryAlias,
    TransferNft,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::RegistryInstantiation => "registry instantiation",
            Route::MinterInstantiation => "minter instantiation",
            Route::RegistryMint => "registry mint",
            Route::CollectionMint => "collection mint",
            Route::Buy => "buy",
            Route::SendNft => "send_nft",
            Route::Withdraw => "withdraw",
            Route::Burn => "burn",
            Route::UpdatePrice => "update_price",
            Route::UpdateMetadata => "update_metadata",
            Route::UpdatePrimaryAlias => "update_primary_alias",
            Route::TransferNft => "transfer_nft",
        }
    }
}

/// Why a message was not dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Message type the indexer does not follow
    UnrelatedMessage(String),
    /// Instantiation of an untracked code id
    UnknownCodeId(u64),
    /// Execute body is not a JSON object
    MalformedPayload,
    /// Execute body has zero or several keys
    UnexpectedKeyCount(usize),
    /// Action with no handler
    UnknownAction(String),
    /// Mint on a contract that is not a tracked collection
    UnknownCollection(String),
}

/// Terminal state of a successfully processed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Handled(Route),
    Skipped(SkipReason),
}

impl Outcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, Outcome::Handled(_))
    }
}

/// Per-message outcomes of one transaction, in message order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReport {
    pub tx_hash: String,
    pub outcomes: Vec<Outcome>,
}

impl TxReport {
    pub fn handled_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_handled()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.handled_count()
    }
}

/// Dispatches decoded messages to the catalog handlers
#[derive(Clone)]
pub struct Router {
    contracts: ContractsConfig,
    store: Arc<dyn CollectionStore>,
    handlers: Arc<dyn MessageHandlers>,
}

impl Router {
    pub fn new(
        contracts: ContractsConfig,
        store: Arc<dyn CollectionStore>,
        handlers: Arc<dyn MessageHandlers>,
    ) -> Self {
        Self {
            contracts,
            store,
            handlers,
        }
    }

    /// Well-known contracts this router compares against
    pub fn contracts(&self) -> &ContractsConfig {
        &self.contracts
    }

    /// Decode and dispatch a raw transaction result
    pub async fn handle_result_tx(&self, result: &ResultTx) -> Result<TxReport, RouterError> {
        let (hash, messages) = decode_result_tx(result)?;
        self.dispatch_all(hash, messages).await
    }

    /// Dispatch every message of `tx`, in order, stopping at the first error.
    ///
    /// Nothing is dispatched when the logs do not line up with the messages.
    pub async fn handle_tx(&self, hash: &str, tx: &Tx, logs: Vec<TxLog>) -> Result<TxReport, RouterError> {
        let messages = decode_messages(hash, tx, logs)?;
        self.dispatch_all(hash.to_string(), messages).await
    }

    async fn dispatch_all(&self, tx_hash: String, messages: Vec<Message>) -> Result<TxReport, RouterError> {
        let mut outcomes = Vec::with_capacity(messages.len());
        for msg in &messages {
            let outcome = self
                .handle_message(msg)
                .await
                .map_err(|source| RouterError::Message {
                    msg_id: msg.msg_id.clone(),
                    msg_index: msg.msg_index,
                    source,
                })?;
            outcomes.push(outcome);
        }
        Ok(TxReport { tx_hash, outcomes })
    }

    /// Route one message to at most one handler
    pub async fn handle_message(&self, msg: &Message) -> Result<Outcome, HandleError> {
        match MessageKind::from_type_url(&msg.msg.type_url) {
            MessageKind::InstantiateContract => self.handle_instantiate(msg).await,
            MessageKind::ExecuteContract => self.handle_execute(msg).await,
            MessageKind::Other(type_url) => Ok(Outcome::Skipped(SkipReason::UnrelatedMessage(type_url))),
        }
    }

    fn is_registry(&self, address: &str) -> bool {
        !self.contracts.registry_contract_address.is_empty()
            && address == self.contracts.registry_contract_address
    }

    async fn handle_instantiate(&self, msg: &Message) -> Result<Outcome, HandleError> {
        let instantiate: MsgInstantiateContract = msg.decode_payload()?;
        // the created contract, not the sender
        let contract_address = msg.events.instantiate_contract_address()?.to_string();
        let call = InstantiateCall {
            contract_address,
            msg: instantiate,
        };

        let (route, result) = if self.is_registry(&call.contract_address) {
            (
                Route::RegistryInstantiation,
                self.handlers.instantiate_registry(msg, &call).await,
            )
        } else if call.msg.code_id == self.contracts.minter_code_id {
            (
                Route::MinterInstantiation,
                self.handlers.instantiate_minter(msg, &call).await,
            )
        } else {
            debug!(
                msg_id = %msg.msg_id,
                code_id = call.msg.code_id,
                "ignored instantiate with unknown code id"
            );
            return Ok(Outcome::Skipped(SkipReason::UnknownCodeId(call.msg.code_id)));
        };

        result.map_err(|source| HandleError::Handler { route, source })?;
        Ok(Outcome::Handled(route))
    }

    async fn handle_execute(&self, msg: &Message) -> Result<Outcome, HandleError> {
        let execute: MsgExecuteContract = msg.decode_payload()?;

        let (action, body) = match parse_action(&execute.msg) {
            ActionParse::Action { action, body } => (action, body),
            ActionParse::Malformed(err) => {
                warn!(msg_id = %msg.msg_id, error = %err, "failed to unmarshal execute payload");
                return Ok(Outcome::Skipped(SkipReason::MalformedPayload));
            }
            ActionParse::KeyCount(count) => {
                warn!(msg_id = %msg.msg_id, count, "unexpected execute keys count");
                return Ok(Outcome::Skipped(SkipReason::UnexpectedKeyCount(count)));
            }
        };
        let call = ExecuteCall::new(execute, action, body);

        let handlers = &self.handlers;
        let (route, result) = match call.action {
            ExecuteAction::Mint => return self.handle_mint(msg, call).await,
            ExecuteAction::Buy => (Route::Buy, handlers.buy(msg, &call).await),
            ExecuteAction::SendNft => (Route::SendNft, handlers.send_nft(msg, &call).await),
            ExecuteAction::Withdraw => (Route::Withdraw, handlers.withdraw(msg, &call).await),
            ExecuteAction::Burn => (Route::Burn, handlers.burn(msg, &call).await),
            ExecuteAction::UpdatePrice => (Route::UpdatePrice, handlers.update_price(msg, &call).await),
            ExecuteAction::UpdateMetadata => {
                (Route::UpdateMetadata, handlers.update_metadata(msg, &call).await)
            }
            ExecuteAction::UpdatePrimaryAlias => (
                Route::UpdatePrimaryAlias,
                handlers.update_primary_alias(msg, &call).await,
            ),
            ExecuteAction::TransferNft => (Route::TransferNft, handlers.transfer_nft(msg, &call).await),
            ExecuteAction::Unrecognized(ref name) => {
                debug!(msg_id = %msg.msg_id, action = %name, "ignored execute with unknown action");
                return Ok(Outcome::Skipped(SkipReason::UnknownAction(name.clone())));
            }
        };

        result.map_err(|source| HandleError::Handler { route, source })?;
        Ok(Outcome::Handled(route))
    }

    /// Resolve the collection and token id, then pick the mint handler
    async fn handle_mint(&self, msg: &Message, call: ExecuteCall) -> Result<Outcome, HandleError> {
        let collection = match self.store.find_by_address(&call.contract).await? {
            Some(collection) => collection,
            None => {
                debug!(msg_id = %msg.msg_id, address = %call.contract, "ignored mint from unknown collection");
                return Ok(Outcome::Skipped(SkipReason::UnknownCollection(call.contract)));
            }
        };
        let metadata = collection
            .metadata
            .clone()
            .ok_or_else(|| HandleError::DataIntegrity {
                address: call.contract.clone(),
                reason: "tracked collection has no metadata".to_string(),
            })?;
        let token_id = msg.events.token_id()?.to_string();

        let registry = self.is_registry(&metadata.mint_contract_address);
        let mint = MintCall {
            execute: call,
            collection,
            metadata,
            token_id,
        };

        let (route, result) = if registry {
            (Route::RegistryMint, self.handlers.mint_registry(msg, &mint).await)
        } else {
            (Route::CollectionMint, self.handlers.mint_collection(msg, &mint).await)
        };

        result.map_err(|source| HandleError::Handler { route, source })?;
        Ok(Outcome::Handled(route))
    }
}
