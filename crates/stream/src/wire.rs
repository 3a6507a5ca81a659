//! Chunk push messages exchanged between peers, CBOR encoded.

use serde::{Deserialize, Serialize};

use crate::WireError;

/// A computed chunk: one byte per cell, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPush {
    pub generation: u64,
    pub quadkey: String,
    pub chunk: Vec<u8>,
}

/// Reply to a [`ChunkPush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAck {
    pub ok: bool,
}

impl ChunkPush {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        cbor_serialize(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        cbor_deserialize(data)
    }
}

impl ChunkAck {
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        cbor_serialize(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        cbor_deserialize(data)
    }
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| WireError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, WireError> {
    ciborium::from_reader(data).map_err(|e| WireError::CborDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_decodes_what_it_encodes() {
        let push = ChunkPush {
            generation: 42,
            quadkey: "0312".into(),
            chunk: vec![1, 0, 0, 1, 1, 1, 0, 0],
        };
        let bytes = push.encode().unwrap();
        assert_eq!(ChunkPush::decode(&bytes).unwrap(), push);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = ChunkPush::decode(&[0xff, 0x00, 0x13]).unwrap_err();
        assert!(matches!(err, WireError::CborDecode(_)));
        assert!(ChunkAck::decode(&ChunkAck { ok: true }.encode().unwrap()).unwrap().ok);
    }
}
