//! Hex-encoded wire values.
//!
//! The auction API carries byte strings and 256-bit integers as `0x`-prefixed
//! hex. Byte strings keep their original text so they round-trip untouched;
//! integers are normalised to minimal lowercase hex on output.

use crate::{Error, Result};
use alloy_primitives::{Address, B256, U256};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated `0x`-prefixed hex byte string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexString {
    text: String,
    bytes: Vec<u8>,
}

impl HexString {
    /// Validate and wrap a hex string. The `0x` prefix is mandatory and the
    /// body must encode whole bytes.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let text = value.into();
        let body = text.strip_prefix("0x").ok_or_else(|| Error::InvalidHex {
            message: format!("hex bytes string should start with 0x: {text:?}"),
        })?;
        let bytes = hex::decode(body).map_err(|e| Error::InvalidHex {
            message: format!("{text:?}: {e}"),
        })?;
        Ok(Self { text, bytes })
    }

    /// Encode raw bytes as lowercase `0x` hex.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            text: format!("0x{}", hex::encode(bytes)),
            bytes: bytes.to_vec(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Interpret the value as a 20-byte address.
    pub fn to_address(&self) -> Result<Address> {
        if self.bytes.len() != 20 {
            return Err(Error::InvalidHex {
                message: format!("{} is not a 20-byte address", self.text),
            });
        }
        Ok(Address::from_slice(&self.bytes))
    }

    /// Interpret the value as a 32-byte word.
    pub fn to_b256(&self) -> Result<B256> {
        if self.bytes.len() != 32 {
            return Err(Error::InvalidHex {
                message: format!("{} is not a 32-byte hash", self.text),
            });
        }
        Ok(B256::from_slice(&self.bytes))
    }
}

impl fmt::Display for HexString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl std::str::FromStr for HexString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl From<Address> for HexString {
    fn from(address: Address) -> Self {
        Self::from_bytes(address.as_slice())
    }
}

impl From<B256> for HexString {
    fn from(hash: B256) -> Self {
        Self::from_bytes(hash.as_slice())
    }
}

impl Serialize for HexString {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for HexString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        HexString::new(text).map_err(de::Error::custom)
    }
}

/// Render an integer as minimal lowercase `0x` hex (`0x0` for zero).
pub fn encode_hex_int(value: U256) -> String {
    let digits = hex::encode(value.to_be_bytes::<32>());
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0x0".to_string()
    } else {
        format!("0x{trimmed}")
    }
}

/// Parse a hex integer, with or without the `0x` prefix. An empty body is zero.
pub fn parse_hex_int(value: &str) -> Result<U256> {
    let body = value.strip_prefix("0x").unwrap_or(value);
    if body.is_empty() {
        return Ok(U256::ZERO);
    }
    if body.len() > 64 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::InvalidHex {
            message: format!("{value:?} is not a 256-bit hex integer"),
        });
    }
    U256::from_str_radix(&body.to_ascii_lowercase(), 16).map_err(|e| Error::InvalidHex {
        message: format!("{value:?}: {e}"),
    })
}

/// Parse a non-negative decimal integer that fits in 256 bits.
fn parse_decimal_int(value: &str) -> Result<U256> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidHex {
            message: format!("{value:?} is not a non-negative integer"),
        });
    }
    U256::from_str_radix(value, 10).map_err(|e| Error::InvalidHex {
        message: format!("{value:?}: {e}"),
    })
}

/// Serde adapter for 256-bit integers travelling as hex.
///
/// Accepts a JSON integer of any size or a hex string; always writes a hex
/// string. Integers beyond `u64` rely on serde_json's `arbitrary_precision`.
pub mod hex_u256 {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &U256,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_hex_int(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<U256, D::Error> {
        deserializer.deserialize_any(HexIntVisitor)
    }

    struct HexIntVisitor;

    impl<'de> Visitor<'de> for HexIntVisitor {
        type Value = U256;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or a hex string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<U256, E> {
            Ok(U256::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> std::result::Result<U256, E> {
            Ok(U256::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<U256, E> {
            u64::try_from(v)
                .map(U256::from)
                .map_err(|_| E::custom(format!("negative integer {v}")))
        }

        // A `Value` holding a big integer is handed over as f64 only when the
        // float prints back to the exact source digits, so parse those digits.
        fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<U256, E> {
            if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
                return Err(E::invalid_type(de::Unexpected::Float(v), &self));
            }
            parse_decimal_int(&v.to_string()).map_err(E::custom)
        }

        // Numbers read straight from JSON text arrive as serde_json's
        // arbitrary-precision map holding the literal digits.
        fn visit_map<A: de::MapAccess<'de>>(self, map: A) -> std::result::Result<U256, A::Error> {
            let number =
                serde_json::Number::deserialize(de::value::MapAccessDeserializer::new(map))?;
            parse_decimal_int(&number.to_string()).map_err(de::Error::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<U256, E> {
            parse_hex_int(v).map_err(E::custom)
        }
    }
}
