//! Binary protocol between sync clients and the document hub.
//!
//! Wire format (bincode-encoded):
//! ```text
//! ┌─────────┬──────────┬───────────┬──────────┬──────────┐
//! │ version │ msg_type │ author_id │ doc_id   │ payload  │
//! │ 1 byte  │ 1 byte   │ 16 bytes  │ 16 bytes │ variable │
//! └─────────┴──────────┴───────────┴──────────┴──────────┘
//! ```
//!
//! Payloads are bincode-encoded records; changesets and selections inside
//! them travel in their compact text form.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::record::{Revision, ServerRecord, SubmittedRecord};

/// Bumped on any incompatible change to the message layout.
pub const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Client → hub: a `SubmittedRecord`
    Submit = 1,
    /// Hub → everyone: a new `ServerRecord`
    Record = 2,
    /// Hub → submitter: the record its submission became
    Acknowledge = 3,
    /// Hub → submitter: the submission was already applied
    Duplicate = 4,
    /// Client → hub: records after a revision
    CatchUp = 5,
    /// Hub → client: a batch of records, oldest first
    Records = 6,
    /// Hub → client: a request failed
    Error = 7,
    Ping = 8,
    Pong = 9,
}

/// Payload of a `CatchUp` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchUpRequest {
    /// Newest revision the client already has.
    pub after_revision: Revision,
}

/// Top-level protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMessage {
    pub version: u8,
    pub msg_type: MessageType,
    pub author_id: Uuid,
    pub doc_id: Uuid,
    pub payload: Vec<u8>,
}

fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| ProtocolError::Serialization(e.to_string()))
}

fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    let (value, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
    Ok(value)
}

impl SyncMessage {
    fn new(msg_type: MessageType, author_id: Uuid, doc_id: Uuid, payload: Vec<u8>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            msg_type,
            author_id,
            doc_id,
            payload,
        }
    }

    pub fn submit(
        author_id: Uuid,
        doc_id: Uuid,
        submitted: &SubmittedRecord,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::Submit,
            author_id,
            doc_id,
            encode_payload(submitted)?,
        ))
    }

    /// Broadcast of a new record. `author_id` is the record's author.
    pub fn record(doc_id: Uuid, record: &ServerRecord) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::Record,
            record.author_id,
            doc_id,
            encode_payload(record)?,
        ))
    }

    pub fn acknowledge(doc_id: Uuid, record: &ServerRecord) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::Acknowledge,
            record.author_id,
            doc_id,
            encode_payload(record)?,
        ))
    }

    pub fn duplicate(doc_id: Uuid, record: &ServerRecord) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::Duplicate,
            record.author_id,
            doc_id,
            encode_payload(record)?,
        ))
    }

    pub fn catch_up(
        author_id: Uuid,
        doc_id: Uuid,
        after_revision: Revision,
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::CatchUp,
            author_id,
            doc_id,
            encode_payload(&CatchUpRequest { after_revision })?,
        ))
    }

    pub fn records(
        author_id: Uuid,
        doc_id: Uuid,
        records: &[ServerRecord],
    ) -> Result<Self, ProtocolError> {
        Ok(Self::new(
            MessageType::Records,
            author_id,
            doc_id,
            encode_payload(&records)?,
        ))
    }

    pub fn error(author_id: Uuid, doc_id: Uuid, message: impl Into<String>) -> Self {
        Self::new(
            MessageType::Error,
            author_id,
            doc_id,
            message.into().into_bytes(),
        )
    }

    pub fn ping(author_id: Uuid) -> Self {
        Self::new(MessageType::Ping, author_id, Uuid::nil(), Vec::new())
    }

    pub fn pong(author_id: Uuid) -> Self {
        Self::new(MessageType::Pong, author_id, Uuid::nil(), Vec::new())
    }

    /// Serialize to binary wire format.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode_payload(self)
    }

    /// Deserialize from binary wire format, rejecting other protocol versions.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let msg: Self = decode_payload(bytes)?;
        if msg.version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                found: msg.version,
            });
        }
        Ok(msg)
    }

    fn expect(&self, msg_type: MessageType) -> Result<(), ProtocolError> {
        if self.msg_type != msg_type {
            return Err(ProtocolError::InvalidMessageType {
                expected: msg_type,
                found: self.msg_type,
            });
        }
        Ok(())
    }

    pub fn submitted_record(&self) -> Result<SubmittedRecord, ProtocolError> {
        self.expect(MessageType::Submit)?;
        decode_payload(&self.payload)
    }

    /// The record carried by a `Record`, `Acknowledge` or `Duplicate` message.
    pub fn server_record(&self) -> Result<ServerRecord, ProtocolError> {
        match self.msg_type {
            MessageType::Record | MessageType::Acknowledge | MessageType::Duplicate => {
                decode_payload(&self.payload)
            }
            found => Err(ProtocolError::InvalidMessageType {
                expected: MessageType::Record,
                found,
            }),
        }
    }

    pub fn catch_up_request(&self) -> Result<CatchUpRequest, ProtocolError> {
        self.expect(MessageType::CatchUp)?;
        decode_payload(&self.payload)
    }

    pub fn server_records(&self) -> Result<Vec<ServerRecord>, ProtocolError> {
        self.expect(MessageType::Records)?;
        decode_payload(&self.payload)
    }

    pub fn error_message(&self) -> Result<String, ProtocolError> {
        self.expect(MessageType::Error)?;
        String::from_utf8(self.payload.clone())
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }
}

/// Protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
    #[error("expected a {expected:?} message, got {found:?}")]
    InvalidMessageType {
        expected: MessageType,
        found: MessageType,
    },
    #[error("protocol version {found} is not supported (expected {expected})")]
    VersionMismatch { expected: u8, found: u8 },
}
