//! Serde helpers for binary fields.
//!
//! Use with `#[serde(with = "dcent_protocol::encoding::hex_bytes")]`.
//! Human-readable formats (the CLI's JSON) get a hex string; bincode gets
//! the raw bytes. Works for `Vec<u8>` and fixed-size `[u8; N]` fields.

pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(bytes.as_ref()))
        } else {
            serializer.serialize_bytes(bytes.as_ref())
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: TryFrom<Vec<u8>>,
        D: Deserializer<'de>,
    {
        let bytes = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(&s).map_err(|e| serde::de::Error::custom(format!("hex decode error: {e}")))?
        } else {
            <Vec<u8>>::deserialize(deserializer)?
        };
        let len = bytes.len();
        T::try_from(bytes)
            .map_err(|_| serde::de::Error::custom(format!("unexpected byte length {len}")))
    }
}
