use crate::error::Result;
use crate::utils::{deserialize, serialize};

/// The envelope every transport carries: who sent it and the encoded protocol payload.
#[derive(Debug, Clone, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub struct Message {
    pub from: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(from: &str, payload: Vec<u8>) -> Message {
        Message {
            from: from.to_string(),
            payload,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Message> {
        deserialize(bytes)
    }
}
