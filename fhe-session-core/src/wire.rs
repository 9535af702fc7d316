//! JSON bodies exchanged with an HTTP encryption gateway.

use crate::types::hex_bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct EncryptBody {
    pub value: u64,
    pub bits: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl_address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeBody {
    pub resource: String,
    pub principal: String,
    #[serde(with = "hex_bytes")]
    pub public_key: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    #[serde(with = "hex_bytes")]
    pub token: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code; not every gateway sends one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}
