//! Error types for the SDFS core (data model + local storage).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("membership list is empty or every member has an empty id")]
    EmptyMembershipList,

    #[error("invalid sdfs file name: {0}")]
    InvalidSdfsName(String),

    #[error("tmp blob not present for publish")]
    TmpNotPresent,

    #[error("no stored versions for {0}")]
    NotExist(String),

    #[error("k_latest must be positive, got {0}")]
    InvalidKLatest(i64),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
