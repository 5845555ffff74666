//! Cluster error types.

use thiserror::Error;

pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("no replicas own file {0}")]
    NoOwningReplicas(String),

    #[error(transparent)]
    Wire(#[from] sdfs_wire::WireError),

    #[error(transparent)]
    Core(#[from] sdfs_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
