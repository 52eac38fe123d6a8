//! Transaction Decoder
//!
//! Turns a raw transaction result (hash, protobuf-encoded `Tx`, ABCI log JSON)
//! into an ordered list of [`Message`] records, each paired with its own
//! execution log and [`EventsMap`].

use prost::Message as _;
use thiserror::Error;

use crate::events::{EventsMap, TxLog};
use crate::proto::{Any, Tx};

/// Errors that can occur during transaction decoding
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to parse tx log: {0}")]
    InvalidLog(#[from] serde_json::Error),

    #[error("Failed to decode tx envelope: {0}")]
    Envelope(#[from] prost::DecodeError),

    #[error("Transaction has no body")]
    MissingBody,

    #[error("Messages and results count mismatch: {messages} messages, {logs} logs")]
    Alignment { messages: usize, logs: usize },

    #[error("Failed to decode {type_url} payload: {source}")]
    Payload {
        type_url: String,
        #[source]
        source: prost::DecodeError,
    },
}

/// Transaction result as delivered by the chain client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTx {
    /// Raw transaction hash
    pub hash: Vec<u8>,
    /// Block height the transaction was included at
    pub height: i64,
    /// Protobuf-encoded signed transaction
    pub tx: Vec<u8>,
    /// ABCI log: JSON list of per-message logs
    pub log: String,
}

/// One message of a transaction, enriched with its execution log
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Encoded message envelope
    pub msg: Any,
    /// Zero-based position within the transaction
    pub msg_index: usize,
    /// Globally unique id: `<tx hash>-<index>`
    pub msg_id: String,
    /// Hash of the enclosing transaction
    pub tx_hash: String,
    /// Index over `log`'s events
    pub events: EventsMap,
    /// Raw execution log of this message
    pub log: TxLog,
}

impl Message {
    /// Decode the envelope payload as `T`
    pub fn decode_payload<T: prost::Message + Default>(&self) -> Result<T, DecodeError> {
        T::decode(self.msg.value.as_slice()).map_err(|source| DecodeError::Payload {
            type_url: self.msg.type_url.clone(),
            source,
        })
    }
}

/// Format a raw hash the way the chain displays it (upper-case hex)
pub fn format_hash(hash: &[u8]) -> String {
    hex::encode_upper(hash)
}

/// Build the unique id of the message at `index` in transaction `hash`
pub fn message_id(hash: &str, index: usize) -> String {
    format!("{}-{}", hash, index)
}

/// Parse the ABCI log string into per-message logs
pub fn parse_logs(log: &str) -> Result<Vec<TxLog>, DecodeError> {
    Ok(serde_json::from_str(log)?)
}

/// Decode a protobuf-encoded `Tx`
pub fn decode_tx(bytes: &[u8]) -> Result<Tx, DecodeError> {
    Ok(Tx::decode(bytes)?)
}

/// Pair each message of `tx` with its log.
///
/// Fails without producing anything when the message and log counts differ.
pub fn decode_messages(hash: &str, tx: &Tx, logs: Vec<TxLog>) -> Result<Vec<Message>, DecodeError> {
    let body = tx.body.as_ref().ok_or(DecodeError::MissingBody)?;
    if body.messages.len() != logs.len() {
        return Err(DecodeError::Alignment {
            messages: body.messages.len(),
            logs: logs.len(),
        });
    }

    Ok(body
        .messages
        .iter()
        .zip(logs)
        .enumerate()
        .map(|(index, (msg, log))| Message {
            msg: msg.clone(),
            msg_index: index,
            msg_id: message_id(hash, index),
            tx_hash: hash.to_string(),
            events: EventsMap::from_log(&log),
            log,
        })
        .collect())
}

/// Decode a full transaction result.
///
/// Returns the display hash together with the enriched messages.
pub fn decode_result_tx(result: &ResultTx) -> Result<(String, Vec<Message>), DecodeError> {
    let logs = parse_logs(&result.log)?;
    let tx = decode_tx(&result.tx)?;
    let hash = format_hash(&result.hash);
    let messages = decode_messages(&hash, &tx, logs)?;
    Ok((hash, messages))
}
