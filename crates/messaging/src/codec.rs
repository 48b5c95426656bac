//! JSON wire codec shared by every broker.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{BusError, Result};

/// Serializes a message into its wire payload.
pub fn encode<M: Serialize + ?Sized>(message: &M) -> Result<Vec<u8>> {
    serde_json::to_vec(message).map_err(BusError::Encode)
}

/// Deserializes a wire payload into a message.
pub fn decode<M: DeserializeOwned>(payload: &[u8]) -> Result<M> {
    serde_json::from_slice(payload).map_err(BusError::Decode)
}
