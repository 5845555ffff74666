//! Versioned, content-addressed local storage.
//!
//! Grounded in `original_source/mp3-sdfs/fsys/filesystem.go`. Three
//! directories under a root: `tmp/` (content-addressed staging blobs),
//! `stored/<name>/<version_ns>` (published versions, one regular file per
//! version), and a sibling fetched-files area owned by the client role.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use flate2::write::GzDecoder;
use sdfs_core::types::{FileVersionSet, SdfsName, Version};
use sdfs_core::utils::{now_nanos, HashingWriter};
use sdfs_core::{Error, Result};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

const TMP_DIR: &str = "tmp";
const STORED_DIR: &str = "stored";

/// An open handle onto one stored version: enough to stream it back without
/// re-walking the directory.
#[derive(Debug, Clone)]
pub struct Handle {
    pub name: SdfsName,
    pub version: Version,
    pub size: u64,
    pub path: PathBuf,
}

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Destructively (re)initializes the storage root: clears it and
    /// recreates `tmp/` and `stored/`. A fresh node starts empty, by design.
    pub async fn init(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if fs::try_exists(&root).await? {
            fs::remove_dir_all(&root).await?;
        }
        fs::create_dir_all(root.join(TMP_DIR)).await?;
        fs::create_dir_all(root.join(STORED_DIR)).await?;
        info!(root = %root.display(), "local store initialized");
        Ok(Self { root })
    }

    fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    fn stored_dir(&self, name: &SdfsName) -> PathBuf {
        self.root.join(STORED_DIR).join(name.as_str())
    }

    /// Streams exactly `n` bytes from `reader` into a staging file, hashing
    /// as it goes, then renames the staging file to `tmp/<hex_hash>`.
    /// Fails if fewer than `n` bytes arrive.
    pub async fn dump_to_tmp<R>(&self, mut reader: R, n: u64) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        let staging_name = format!("tmp-{}", now_nanos());
        let staging_path = self.tmp_dir().join(&staging_name);

        let mut file = fs::File::create(&staging_path).await?;
        let mut hasher = Sha256::new();
        let mut remaining = n;
        let mut buf = [0u8; 64 * 1024];

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let read = reader.read(&mut buf[..want]).await?;
            if read == 0 {
                let _ = fs::remove_file(&staging_path).await;
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected {n} bytes, got {} fewer", remaining),
                )));
            }
            hasher.update(&buf[..read]);
            file.write_all(&buf[..read]).await?;
            remaining -= read as u64;
        }
        file.flush().await?;
        drop(file);

        let hash = hex::encode(hasher.finalize());
        let final_path = self.tmp_dir().join(&hash);
        fs::rename(&staging_path, &final_path).await?;
        debug!(hash = %hash, bytes = n, "dumped payload to tmp");
        Ok(hash)
    }

    /// Streams exactly `n` gzip-compressed bytes from `reader` into a
    /// staging file *verbatim* (the blob stays gzip-framed on disk, same as
    /// every other stored version), while decompressing a side-channel copy
    /// to compute the content hash. The content hash therefore identifies
    /// the logical (decompressed) content, not its gzip framing, while the
    /// bytes actually written to `tmp/` are untouched.
    pub async fn dump_gzip_to_tmp<R>(&self, mut reader: R, n: u64) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        let staging_name = format!("tmp-{}", now_nanos());
        let staging_path = self.tmp_dir().join(&staging_name);

        let mut file = fs::File::create(&staging_path).await?;
        let mut decoder = GzDecoder::new(HashingWriter::new(std::io::sink()));
        let mut remaining = n;
        let mut buf = [0u8; 64 * 1024];

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let read = reader.read(&mut buf[..want]).await?;
            if read == 0 {
                let _ = fs::remove_file(&staging_path).await;
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("expected {n} bytes, got {} fewer", remaining),
                )));
            }
            file.write_all(&buf[..read]).await?;
            decoder.write_all(&buf[..read])?;
            remaining -= read as u64;
        }
        file.flush().await?;
        drop(file);

        let hashing_writer = decoder.finish()?;
        let (_, hash) = hashing_writer.finish();
        let final_path = self.tmp_dir().join(&hash);
        fs::rename(&staging_path, &final_path).await?;
        debug!(hash = %hash, bytes = n, "dumped gzip payload to tmp, hashed decompressed content");
        Ok(hash)
    }

    /// Renames `tmp/<content_hash>` into `stored/<sdfs_name>/<version_ns>`.
    /// Overwrites (with a warning) if the target already exists.
    pub async fn publish(&self, content_hash: &str, version: Version, name: &SdfsName) -> Result<()> {
        let tmp_path = self.tmp_dir().join(content_hash);
        if !fs::try_exists(&tmp_path).await? {
            return Err(Error::TmpNotPresent);
        }

        let dir = self.stored_dir(name);
        fs::create_dir_all(&dir).await?;
        let target = dir.join(version.to_string());
        if fs::try_exists(&target).await? {
            warn!(name = %name, version, "overwriting existing stored version");
        }
        fs::rename(&tmp_path, &target).await?;
        debug!(name = %name, version, hash = %content_hash, "published version");
        Ok(())
    }

    /// Lists `stored/<sdfs_name>/`, filters to versions `<= upper_bound`,
    /// and returns the newest `min(k, n)` as open handles.
    pub async fn acquire_handles(&self, k_latest: i64, name: &SdfsName, upper_bound: Version) -> Result<Vec<Handle>> {
        if k_latest <= 0 {
            return Err(Error::InvalidKLatest(k_latest));
        }

        let dir = self.stored_dir(name);
        if !fs::try_exists(&dir).await? {
            return Err(Error::NotExist(name.to_string()));
        }

        let mut versions = read_version_files(&dir).await?;
        versions.retain(|v| *v <= upper_bound);
        versions.sort_unstable_by(|a, b| b.cmp(a));

        let take = (k_latest as usize).min(versions.len());
        let mut handles = Vec::with_capacity(take);
        for version in &versions[..take] {
            let path = dir.join(version.to_string());
            let size = fs::metadata(&path).await?.len();
            handles.push(Handle {
                name: name.clone(),
                version: *version,
                size,
                path,
            });
        }
        Ok(handles)
    }

    /// Newest version per file, across the whole store. Equivalent to
    /// `ListDirectory` in the original (which is `acquire_handles(1, .., now)`
    /// per file) generalized to every file at once.
    pub async fn list_directory(&self) -> Result<Vec<Handle>> {
        let names = self.stored_names().await?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            match self.acquire_handles(1, &name, now_nanos()).await {
                Ok(mut handles) => {
                    if let Some(h) = handles.pop() {
                        out.push(h);
                    }
                }
                Err(Error::NotExist(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    /// Walks `stored/` once, building a full `FileVersionSet`.
    pub async fn list_all_versions(&self) -> Result<FileVersionSet> {
        let mut out = FileVersionSet::new();
        for name in self.stored_names().await? {
            let dir = self.stored_dir(&name);
            let versions = read_version_files(&dir).await?;
            out.insert(name, versions.into_iter().collect());
        }
        Ok(out)
    }

    async fn stored_names(&self) -> Result<Vec<SdfsName>> {
        let mut out = Vec::new();
        let mut entries = fs::read_dir(self.root.join(STORED_DIR)).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(s) = entry.file_name().to_str() {
                    if let Ok(name) = SdfsName::new(s) {
                        out.push(name);
                    }
                }
            }
        }
        Ok(out)
    }

    /// Removes versions of `sdfs_name` up to and including `delete_time`.
    /// If `delete_time` is newer than every stored version, removes the
    /// whole directory and returns `false`. Otherwise removes only the
    /// older versions and returns `true` — a write raced the delete and at
    /// least one newer version survives (a "partial delete").
    pub async fn remove(&self, name: &SdfsName, delete_time: Version) -> Result<bool> {
        let dir = self.stored_dir(name);
        if !fs::try_exists(&dir).await? {
            return Err(Error::NotExist(name.to_string()));
        }

        let versions = read_version_files(&dir).await?;
        let max_version = match versions.iter().max() {
            Some(v) => *v,
            None => return Err(Error::NotExist(name.to_string())),
        };

        if delete_time > max_version {
            fs::remove_dir_all(&dir).await?;
            return Ok(false);
        }

        for version in versions.into_iter().filter(|v| *v <= delete_time) {
            fs::remove_file(dir.join(version.to_string())).await?;
        }
        Ok(true)
    }
}

async fn read_version_files(dir: &Path) -> Result<Vec<Version>> {
    let mut versions = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            // I1: every registered version file's name parses as an i64 ns timestamp.
            if let Ok(v) = name.parse::<Version>() {
                versions.push(v);
            }
        }
    }
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn fresh_store() -> (LocalStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::init(dir.path().join("sdfs")).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn publish_after_dump_makes_version_readable() {
        let (store, _dir) = fresh_store().await;
        let name = SdfsName::new("a.txt").unwrap();
        let payload = b"hello\n";

        let hash = store.dump_to_tmp(Cursor::new(payload), payload.len() as u64).await.unwrap();
        store.publish(&hash, 100, &name).await.unwrap();

        let handles = store.acquire_handles(1, &name, i64::MAX).await.unwrap();
        assert_eq!(handles.len(), 1);
        assert_eq!(handles[0].version, 100);
        assert_eq!(handles[0].size, payload.len() as u64);
    }

    #[tokio::test]
    async fn publish_without_tmp_fails() {
        let (store, _dir) = fresh_store().await;
        let name = SdfsName::new("missing.txt").unwrap();
        let err = store.publish("deadbeef", 1, &name).await.unwrap_err();
        assert!(matches!(err, Error::TmpNotPresent));
    }

    #[tokio::test]
    async fn acquire_handles_rejects_non_positive_k() {
        let (store, _dir) = fresh_store().await;
        let name = SdfsName::new("a.txt").unwrap();
        let err = store.acquire_handles(0, &name, i64::MAX).await.unwrap_err();
        assert!(matches!(err, Error::InvalidKLatest(0)));
    }

    #[tokio::test]
    async fn acquire_handles_missing_dir_is_not_exist() {
        let (store, _dir) = fresh_store().await;
        let name = SdfsName::new("nope.txt").unwrap();
        let err = store.acquire_handles(1, &name, i64::MAX).await.unwrap_err();
        assert!(matches!(err, Error::NotExist(_)));
    }

    #[tokio::test]
    async fn acquire_handles_returns_newest_k_within_bound() {
        let (store, _dir) = fresh_store().await;
        let name = SdfsName::new("v.txt").unwrap();
        for (v, body) in [(10i64, "a"), (20, "b"), (30, "c")] {
            let hash = store.dump_to_tmp(Cursor::new(body.as_bytes()), body.len() as u64).await.unwrap();
            store.publish(&hash, v, &name).await.unwrap();
        }

        let handles = store.acquire_handles(2, &name, 25).await.unwrap();
        let versions: Vec<Version> = handles.iter().map(|h| h.version).collect();
        assert_eq!(versions, vec![20, 10]);
    }

    #[tokio::test]
    async fn remove_full_when_delete_time_newer_than_all_versions() {
        let (store, _dir) = fresh_store().await;
        let name = SdfsName::new("z.txt").unwrap();
        for v in [1i64, 2] {
            let hash = store.dump_to_tmp(Cursor::new(b"x".as_slice()), 1).await.unwrap();
            store.publish(&hash, v, &name).await.unwrap();
        }

        let preserved = store.remove(&name, 100).await.unwrap();
        assert!(!preserved);
        let err = store.acquire_handles(1, &name, i64::MAX).await.unwrap_err();
        assert!(matches!(err, Error::NotExist(_)));
    }

    #[tokio::test]
    async fn remove_partial_preserves_newer_versions() {
        let (store, _dir) = fresh_store().await;
        let name = SdfsName::new("z.txt").unwrap();
        for v in [1i64, 2, 3] {
            let hash = store.dump_to_tmp(Cursor::new(b"x".as_slice()), 1).await.unwrap();
            store.publish(&hash, v, &name).await.unwrap();
        }

        let preserved = store.remove(&name, 2).await.unwrap();
        assert!(preserved);
        let handles = store.acquire_handles(10, &name, i64::MAX).await.unwrap();
        let versions: Vec<Version> = handles.iter().map(|h| h.version).collect();
        assert_eq!(versions, vec![3]);
    }

    #[tokio::test]
    async fn list_all_versions_covers_every_file() {
        let (store, _dir) = fresh_store().await;
        for (name, v) in [("a.txt", 1i64), ("a.txt", 2), ("b.txt", 5)] {
            let hash = store.dump_to_tmp(Cursor::new(b"x".as_slice()), 1).await.unwrap();
            store.publish(&hash, v, &SdfsName::new(name).unwrap()).await.unwrap();
        }

        let set = store.list_all_versions().await.unwrap();
        assert_eq!(set.get(&SdfsName::new("a.txt").unwrap()).unwrap().len(), 2);
        assert_eq!(set.get(&SdfsName::new("b.txt").unwrap()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dump_to_tmp_fails_on_short_read() {
        let (store, _dir) = fresh_store().await;
        let err = store.dump_to_tmp(Cursor::new(b"ab".as_slice()), 10).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn dump_gzip_to_tmp_names_the_blob_by_decompressed_content() {
        let (store, _dir) = fresh_store().await;
        let payload = b"the rain in spain falls mainly on the plain".repeat(50);

        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        let hash = store
            .dump_gzip_to_tmp(Cursor::new(compressed.clone()), compressed.len() as u64)
            .await
            .unwrap();
        assert_eq!(hash, hex::encode(Sha256::digest(&payload)));

        let name = SdfsName::new("plain.txt").unwrap();
        store.publish(&hash, 1, &name).await.unwrap();
        let handles = store.acquire_handles(1, &name, i64::MAX).await.unwrap();
        let stored_bytes = fs::read(&handles[0].path).await.unwrap();
        assert_eq!(stored_bytes, compressed, "bytes on disk stay gzip-framed");
    }
}
