use serde::{Deserialize, Serialize};

use super::messages::{
    AgentStatesMsg, DebugMsg, DestroyMsg, MessageType, PlayerErrorMsg, ProjectileStatesMsg,
    ServerMessage, StartGameMsg, StartSimulationMsg,
};
use crate::outcome::MatchResults;

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let msg_type = msg.message_type();
    match msg {
        ServerMessage::Debug(m) => encode_message(msg_type, m),
        ServerMessage::StartGame(m) => encode_message(msg_type, m),
        ServerMessage::StartSimulation(m) => encode_message(msg_type, m),
        ServerMessage::AgentStates(m) => encode_message(msg_type, m),
        ServerMessage::ProjectileStates(m) => encode_message(msg_type, m),
        ServerMessage::Destroy(m) => encode_message(msg_type, m),
        ServerMessage::PlayerError(m) => encode_message(msg_type, m),
        ServerMessage::Results(m) => encode_message(msg_type, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::Debug => Ok(ServerMessage::Debug(decode_payload::<DebugMsg>(data)?)),
        MessageType::StartGame => Ok(ServerMessage::StartGame(decode_payload::<StartGameMsg>(
            data,
        )?)),
        MessageType::StartSimulation => Ok(ServerMessage::StartSimulation(decode_payload::<
            StartSimulationMsg,
        >(data)?)),
        MessageType::AgentStates => Ok(ServerMessage::AgentStates(decode_payload::<
            AgentStatesMsg,
        >(data)?)),
        MessageType::ProjectileStates => Ok(ServerMessage::ProjectileStates(decode_payload::<
            ProjectileStatesMsg,
        >(data)?)),
        MessageType::Destroy => Ok(ServerMessage::Destroy(decode_payload::<DestroyMsg>(data)?)),
        MessageType::PlayerError => Ok(ServerMessage::PlayerError(decode_payload::<
            PlayerErrorMsg,
        >(data)?)),
        MessageType::Results => Ok(ServerMessage::Results(decode_payload::<MatchResults>(
            data,
        )?)),
    }
}
