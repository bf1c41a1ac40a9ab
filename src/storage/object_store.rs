//! Remote object store clients
//!
//! `ObjectStore` is the minimal S3-shaped surface the remote tier needs:
//! put/get/head/delete plus paginated listing. Two clients ship with the
//! crate:
//!
//! - [`FsObjectStore`]: a bucket exposed as a directory (mounted volume or
//!   sync folder), selected with a `file://` endpoint.
//! - [`MemoryObjectStore`]: in-process bucket with an availability switch,
//!   selected with `memory://`. Used for tests and dry runs.
//!
//! Other clients are injected through `DocumentVault::open_with_object_store`.

use crate::error::{Result, VaultError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use walkdir::WalkDir;

/// One page of a key listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub keys: Vec<String>,
    /// Pass back as `start_after` to fetch the next page
    pub next_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()>;

    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    async fn head(&self, key: &str) -> Result<bool>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Keys under `prefix`, in lexicographic order, strictly after `start_after`.
    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage>;
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(VaultError::validation_error(format!(
            "Invalid object key: {:?}",
            key
        )));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(VaultError::validation_error(format!(
            "Invalid object key: {:?}",
            key
        )));
    }
    Ok(())
}

/// Slice a sorted key sequence into one page.
fn paginate<'a>(
    sorted_keys: impl Iterator<Item = &'a String>,
    prefix: &str,
    start_after: Option<&str>,
    max_keys: usize,
) -> ListPage {
    let max_keys = max_keys.max(1);
    let mut matching = sorted_keys
        .filter(|key| key.starts_with(prefix))
        .filter(|key| start_after.map_or(true, |after| key.as_str() > after));

    let keys: Vec<String> = matching.by_ref().take(max_keys).cloned().collect();
    let next_token = if matching.next().is_some() {
        keys.last().cloned()
    } else {
        None
    };
    ListPage { keys, next_token }
}

/// Directory-backed bucket
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    fn unavailable(action: &str, key: &str, e: std::io::Error) -> VaultError {
        VaultError::remote_unavailable(format!("{} {} failed: {}", action, key, e))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::unavailable("put", key, e))?;
        }

        let staging = path.with_extension("upload");
        let mut file = fs::File::create(&staging)
            .await
            .map_err(|e| Self::unavailable("put", key, e))?;
        file.write_all(&bytes)
            .await
            .map_err(|e| Self::unavailable("put", key, e))?;
        file.sync_all()
            .await
            .map_err(|e| Self::unavailable("put", key, e))?;
        drop(file);

        fs::rename(&staging, &path)
            .await
            .map_err(|e| Self::unavailable("put", key, e))
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.key_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::unavailable("get", key, e)),
        }
    }

    async fn head(&self, key: &str) -> Result<bool> {
        let path = self.key_path(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| Self::unavailable("head", key, e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::unavailable("delete", key, e)),
        }
    }

    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        let start_after = start_after.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            if !root.exists() {
                return ListPage::default();
            }
            let mut keys: Vec<String> = WalkDir::new(&root)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| entry.path().extension().map_or(true, |ext| ext != "upload"))
                .filter_map(|entry| {
                    let relative = entry.path().strip_prefix(&root).ok()?;
                    let segments: Vec<String> = relative
                        .components()
                        .filter_map(|c| match c {
                            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                            _ => None,
                        })
                        .collect();
                    Some(segments.join("/"))
                })
                .collect();
            keys.sort();
            paginate(keys.iter(), &prefix, start_after.as_deref(), max_keys)
        })
        .await
        .map_err(|e| VaultError::Internal(format!("Listing task failed: {}", e)))
    }
}

/// In-process bucket
///
/// `set_available(false)` makes every call fail with `RemoteUnavailable`,
/// which is how tests simulate an outage.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
    available: AtomicBool,
    put_calls: AtomicUsize,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            put_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of put calls seen, successful or not
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    /// Write directly, bypassing the availability switch.
    pub fn insert_raw(&self, key: impl Into<String>, bytes: impl Into<Bytes>) {
        self.objects.write().insert(key.into(), bytes.into());
    }

    /// Delete directly, bypassing the availability switch.
    pub fn remove_raw(&self, key: &str) -> Option<Bytes> {
        self.objects.write().remove(key)
    }

    fn ensure_available(&self, action: &str, key: &str) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(VaultError::remote_unavailable(format!(
                "{} {}: store is offline",
                action, key
            )))
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        validate_key(key)?;
        self.ensure_available("put", key)?;
        self.objects.write().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        validate_key(key)?;
        self.ensure_available("get", key)?;
        Ok(self.objects.read().get(key).cloned())
    }

    async fn head(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        self.ensure_available("head", key)?;
        Ok(self.objects.read().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.ensure_available("delete", key)?;
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list_page(
        &self,
        prefix: &str,
        start_after: Option<&str>,
        max_keys: usize,
    ) -> Result<ListPage> {
        self.ensure_available("list", prefix)?;
        let objects = self.objects.read();
        Ok(paginate(objects.keys(), prefix, start_after, max_keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    #[case("", false)]
    #[case("/abs/key", false)]
    #[case("a/../b", false)]
    #[case("a//b", false)]
    #[case("documents/owner/doc-1", true)]
    fn test_validate_key(#[case] key: &str, #[case] ok: bool) {
        assert_eq!(validate_key(key).is_ok(), ok);
    }

    #[tokio::test]
    async fn test_memory_store_outage() {
        let store = MemoryObjectStore::new();
        store.put("p/a", Bytes::from_static(b"1")).await.unwrap();

        store.set_available(false);
        assert!(matches!(
            store.get("p/a").await,
            Err(VaultError::RemoteUnavailable(_))
        ));
        assert!(store.put("p/b", Bytes::from_static(b"2")).await.is_err());
        assert_eq!(store.put_calls(), 2);

        store.set_available(true);
        assert!(store.head("p/a").await.unwrap());
        assert!(!store.head("p/b").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_pagination() {
        let store = MemoryObjectStore::new();
        for i in 0..5 {
            store.insert_raw(format!("p/{}", i), Bytes::from_static(b"x"));
        }
        store.insert_raw("other/9", Bytes::from_static(b"x"));

        let first = store.list_page("p/", None, 2).await.unwrap();
        assert_eq!(first.keys, vec!["p/0", "p/1"]);
        let token = first.next_token.clone().unwrap();

        let second = store.list_page("p/", Some(&token), 2).await.unwrap();
        assert_eq!(second.keys, vec!["p/2", "p/3"]);

        let third = store
            .list_page("p/", second.next_token.as_deref(), 2)
            .await
            .unwrap();
        assert_eq!(third.keys, vec!["p/4"]);
        assert!(third.next_token.is_none());
    }

    #[tokio::test]
    async fn test_fs_store_round_trip_and_listing() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());

        store
            .put("documents/alice/doc-1", Bytes::from_static(b"hello"))
            .await
            .unwrap();
        store
            .put("documents/bob/doc-2", Bytes::from_static(b"world"))
            .await
            .unwrap();

        assert_eq!(
            store.get("documents/alice/doc-1").await.unwrap().unwrap(),
            Bytes::from_static(b"hello")
        );
        assert!(store.get("documents/alice/missing").await.unwrap().is_none());

        let page = store.list_page("documents/", None, 10).await.unwrap();
        assert_eq!(page.keys, vec!["documents/alice/doc-1", "documents/bob/doc-2"]);

        store.delete("documents/alice/doc-1").await.unwrap();
        store.delete("documents/alice/doc-1").await.unwrap();
        assert!(!store.head("documents/alice/doc-1").await.unwrap());
    }
}
