use crate::errors::{Result, SessionError};
use crate::network::Network;
use crate::util::{from_hex, to_hex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const HANDLE_LEN: usize = 32;

/// Integer widths accepted by [`crate::EncryptionSession::encrypt_uint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum BitWidth {
    U8,
    U16,
    U32,
    /// Narrowed to a 32-bit remote call; values must fit in 32 bits.
    U64,
}

impl BitWidth {
    pub fn bits(&self) -> u32 {
        match self {
            BitWidth::U8 => 8,
            BitWidth::U16 => 16,
            BitWidth::U32 => 32,
            BitWidth::U64 => 64,
        }
    }

    /// Width of the call actually issued to the remote provider.
    pub fn remote(&self) -> BitWidth {
        match self {
            BitWidth::U64 => BitWidth::U32,
            other => *other,
        }
    }

    /// Largest value accepted for this width.
    pub fn max_value(&self) -> u64 {
        (1u64 << self.remote().bits()) - 1
    }

    pub fn check(&self, value: u64) -> Result<()> {
        if value > self.max_value() {
            return Err(SessionError::InvalidInput(format!(
                "value {value} does not fit in {} bits",
                self.remote().bits()
            )));
        }
        Ok(())
    }
}

impl From<BitWidth> for u32 {
    fn from(width: BitWidth) -> Self {
        width.bits()
    }
}

impl TryFrom<u32> for BitWidth {
    type Error = String;

    fn try_from(bits: u32) -> std::result::Result<Self, Self::Error> {
        match bits {
            8 => Ok(BitWidth::U8),
            16 => Ok(BitWidth::U16),
            32 => Ok(BitWidth::U32),
            64 => Ok(BitWidth::U64),
            other => Err(format!("unsupported bit width {other}")),
        }
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u{}", self.bits())
    }
}

impl FromStr for BitWidth {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let digits = value.trim().trim_start_matches(['u', 'U']);
        let bits = digits
            .parse::<u32>()
            .map_err(|_| format!("invalid bit width `{value}`"))?;
        BitWidth::try_from(bits)
    }
}

/// Opaque ciphertext identifier assigned by the remote service.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle([u8; HANDLE_LEN]);

impl Handle {
    pub fn new(bytes: [u8; HANDLE_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HANDLE_LEN] {
        &self.0
    }

    pub fn parse(value: &str) -> Result<Self> {
        let bytes = from_hex(value)?;
        let bytes: [u8; HANDLE_LEN] = bytes.try_into().map_err(|bytes: Vec<u8>| {
            SessionError::InvalidInput(format!(
                "handle must be {HANDLE_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_hex(self.0))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({self})")
    }
}

impl Serialize for Handle {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Handle::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter that writes byte vectors as `0x` hex strings.
pub mod hex_bytes {
    use super::{from_hex, to_hex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Result of an encrypt call. Owned by the caller once returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    pub handles: Vec<Handle>,
    #[serde(with = "hex_bytes")]
    pub input_proof: Vec<u8>,
}

/// Public encryption parameters fetched during initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicParams {
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub crs: Vec<u8>,
    /// Chain id the remote service reports serving, when it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl_address: Option<String>,
}

impl PublicParams {
    /// Reject structurally unusable parameters.
    pub fn validate(&self) -> std::result::Result<(), crate::ProviderError> {
        if self.public_key.is_empty() {
            return Err(crate::ProviderError::InvalidParams(
                "public key is empty".into(),
            ));
        }
        if self.crs.is_empty() {
            return Err(crate::ProviderError::InvalidParams("crs is empty".into()));
        }
        Ok(())
    }
}

/// Signed token a decryption gateway accepts for `(resource, principal)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationProof {
    pub resource: String,
    pub principal: String,
    #[serde(with = "hex_bytes")]
    pub token: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamsRequest {
    pub network: Network,
    pub acl_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptRequest {
    pub value: u64,
    /// Always a remote width; never [`BitWidth::U64`].
    pub width: BitWidth,
    pub acl_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub resource: String,
    pub principal: String,
    pub public_key: Vec<u8>,
}
