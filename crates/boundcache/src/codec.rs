//! Value serialization for the disk store
//!
//! The disk store never assumes a format: it is generic over a [`Codec`].
//! File contents are exactly the encoded bytes, with no framing.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Turns values into bytes and back
pub trait Codec<V>: Send + Sync {
    /// Serialize `value`
    fn encode(&self, value: &V) -> Result<Vec<u8>>;

    /// Deserialize a value previously produced by [`encode`](Self::encode)
    fn decode(&self, bytes: &[u8]) -> Result<V>;
}

/// JSON via `serde_json`, for any serde-compatible value
pub struct JsonCodec<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> JsonCodec<V> {
    /// Create a JSON codec
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<V> Default for JsonCodec<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for JsonCodec<V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for JsonCodec<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonCodec")
    }
}

impl<V> Codec<V> for JsonCodec<V>
where
    V: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Stores byte buffers as-is
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl Codec<Vec<u8>> for RawCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

impl<V, C: Codec<V> + ?Sized> Codec<V> for Box<C> {
    fn encode(&self, value: &V) -> Result<Vec<u8>> {
        (**self).encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<V> {
        (**self).decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
    }

    #[test]
    fn test_json_struct() {
        let codec = JsonCodec::<Profile>::new();
        let profile = Profile { name: "alice".to_string(), visits: 3 };

        let bytes = codec.encode(&profile).unwrap();
        assert_eq!(bytes, br#"{"name":"alice","visits":3}"#);
        assert_eq!(codec.decode(&bytes).unwrap(), profile);
    }

    #[test]
    fn test_json_decode_garbage() {
        let codec = JsonCodec::<Profile>::new();

        let result = codec.decode(b"\x00\x01 not json");
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_raw_is_verbatim() {
        let bytes = vec![0u8, 159, 146, 150];
        assert_eq!(RawCodec.encode(&bytes).unwrap(), bytes);
        assert_eq!(RawCodec.decode(&bytes).unwrap(), bytes);
    }

    #[test]
    fn test_boxed_dyn_codec() {
        let codec: Box<dyn Codec<Profile>> = Box::new(JsonCodec::new());
        let profile = Profile { name: "bob".to_string(), visits: 0 };

        let bytes = codec.encode(&profile).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), profile);
    }
}
