//! Request/response JSON shapes carried inside the length-prefixed frame.
//!
//! Grounded in `original_source/mp3-sdfs/fsys/conn.go`'s
//! `TCPChannelRequest`/`TCPChannelResponse`. Master RPCs (`GET_REPLICAS`,
//! `GET_REPLICAS_NON_QUORUM`, `FINALIZE_WRITE`, `FINALIZE_DELETE`) are
//! folded into the same request/response shape rather than a separate gRPC
//! service — see DESIGN.md's Open Question decision on Master RPC
//! transport.

use serde::{Deserialize, Serialize};

use sdfs_core::types::{FileVersionSet, Member, SdfsName, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    ReqFileMetadata,
    ReqFileData,
    ReqKVersions,
    SendFileData,
    ReqListFiles,
    MasterFinalizeWrite,
    MasterFinalizeDelete,
    ReplicaQueryFiles,
    ReplicaSendFile,
    MasterGetReplicas,
    MasterGetReplicasNonQuorum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseCode {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "BAD_REQUEST")]
    BadRequest,
    /// Serialized as `INTERNAL_ERROR` on the wire, matching the original's
    /// `MISC_ERROR TCPChannelResponseCode = "INTERNAL_ERROR"`.
    #[serde(rename = "INTERNAL_ERROR")]
    MiscError,
    #[serde(rename = "FILE_NOT_FOUND")]
    FileNotFound,
    #[serde(rename = "NOTHING_TO_DO")]
    NothingToDo,
}

impl ResponseCode {
    pub fn is_ok(self) -> bool {
        matches!(self, ResponseCode::Ok)
    }
}

/// One entry in a directory/version listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListEntry {
    pub name: SdfsName,
    pub version: Version,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub kind: RequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdfs_name: Option<SdfsName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_ns: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_versions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_version_bound_ns: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_version_set: Option<FileVersionSet>,
    /// Master `FINALIZE_WRITE`/`FINALIZE_DELETE`'s replica quorum, and the
    /// replica contact list streamed back by `GET_REPLICAS*`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Member>>,
}

impl Request {
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            sdfs_name: None,
            version_ns: None,
            file_size: None,
            content_hash: None,
            k_versions: None,
            upper_version_bound_ns: None,
            file_version_set: None,
            members: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub code: ResponseCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returning_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_ns: Option<Version>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_list: Option<Vec<FileListEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_file_version_set: Option<FileVersionSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<Member>>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            code: ResponseCode::Ok,
            returning_size: None,
            version_ns: None,
            content_hash: None,
            file_list: None,
            requested_file_version_set: None,
            members: None,
        }
    }

    pub fn error(code: ResponseCode) -> Self {
        Self {
            code,
            returning_size: None,
            version_ns: None,
            content_hash: None,
            file_list: None,
            requested_file_version_set: None,
            members: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_code_serializes_misc_error_as_internal_error() {
        let json = serde_json::to_string(&ResponseCode::MiscError).unwrap();
        assert_eq!(json, "\"INTERNAL_ERROR\"");
    }

    #[test]
    fn request_round_trips_through_json() {
        let mut req = Request::new(RequestKind::ReqFileData);
        req.sdfs_name = Some(SdfsName::new("a.txt").unwrap());
        req.upper_version_bound_ns = Some(i64::MAX);

        let json = serde_json::to_string(&req).unwrap();
        let back: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sdfs_name, req.sdfs_name);
        assert_eq!(back.upper_version_bound_ns, req.upper_version_bound_ns);
    }
}
