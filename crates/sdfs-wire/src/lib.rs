//! Length-prefixed JSON wire protocol shared by every SDFS connection:
//! client-to-replica, replica-to-replica, and replica-to-master.
//!
//! Grounded in `original_source/mp3-sdfs/fsys/conn.go`.

pub mod error;
pub mod framing;
pub mod gzip;
pub mod protocol;

pub use error::{Result, WireError};
pub use framing::{
    recv_frame, recv_request, recv_response, send_frame, send_request, send_response,
    try_send_error, MAX_FRAME_BYTES,
};
pub use gzip::{gzip_encoded_size, recv_file_from_gzip, send_file_as_gzip};
pub use protocol::{FileListEntry, Request, RequestKind, Response, ResponseCode};
