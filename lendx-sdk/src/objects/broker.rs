//! Broker message envelope.
//!
//! ```json
//! {"type":"NEW_LENDING_ORDER","data":{ ...lending order... }}
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Envelope `type` tags.
pub mod message_types {
    pub const NEW_LENDING_ORDER: &str = "NEW_LENDING_ORDER";
    pub const CANCEL_LENDING_ORDER: &str = "CANCEL_LENDING_ORDER";
    pub const LENDING_ORDER_RESPONSE: &str = "LENDING_ORDER_RESPONSE";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    pub data: serde_json::Value,
}

impl BrokerMessage {
    pub fn new<T: Serialize>(message_type: &str, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_type: message_type.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Decode the envelope from raw broker bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode the `data` field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}
