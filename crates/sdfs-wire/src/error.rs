//! Errors for the length-prefixed wire protocol.

use thiserror::Error;

use crate::protocol::ResponseCode;

pub type Result<T> = std::result::Result<T, WireError>;

#[derive(Error, Debug)]
pub enum WireError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize frame: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("frame length {len} exceeds maximum {max}")]
    FrameTooLarge { len: u64, max: u64 },

    #[error("received non-OK response code: {0:?}")]
    NonOkResponse(ResponseCode),
}
