//! TCP dialing helpers shared by the master and replica daemons.
//!
//! Grounded in `original_source/mp3-sdfs/replica.go`'s `UnicastToReplica`:
//! dial with a fixed timeout, send one framed request, read back one framed
//! response.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use sdfs_core::types::Member;
use sdfs_wire::{Request, Response};

use crate::error::{ClusterError, ClusterResult};

/// Connects to `member` on `port` within `dial_timeout`, sends `req`, and
/// returns the framed response. The connection is closed when the returned
/// stream is dropped — callers that need to keep talking (e.g. replication
/// streaming) should use `dial` directly instead.
pub async fn unicast(member: &Member, port: u16, dial_timeout: Duration, req: &Request) -> ClusterResult<Response> {
    let mut stream = dial(&member.address, port, dial_timeout).await?;
    sdfs_wire::send_request(&mut stream, req).await?;
    let resp = sdfs_wire::recv_response(&mut stream).await?;
    Ok(resp)
}

/// Opens a raw TCP connection to `host:port`, bounded by `dial_timeout`.
pub async fn dial(host: &str, port: u16, dial_timeout: Duration) -> ClusterResult<TcpStream> {
    match timeout(dial_timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ClusterError::Io(e)),
        Err(_) => Err(ClusterError::Io(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            format!("dial {host}:{port} timed out"),
        ))),
    }
}
