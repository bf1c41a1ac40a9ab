//! Remote object store tier
//!
//! Wraps an [`ObjectStore`] with the key scheme `<prefix>/<owner>/<id>` and
//! bounded retry on every call. A remote failure is never fatal to the
//! caller's upload; the ingest writer downgrades the entry instead.

use crate::error::Result;
use crate::storage::object_store::ObjectStore;
use crate::storage::tier::{StorageTier, TierKind};
use crate::utils::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RemoteTier {
    store: Arc<dyn ObjectStore>,
    key_prefix: String,
    policy: RetryPolicy,
    page_size: usize,
}

impl RemoteTier {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        key_prefix: impl Into<String>,
        policy: RetryPolicy,
        page_size: usize,
    ) -> Self {
        let key_prefix = key_prefix.into().trim_matches('/').to_string();
        Self {
            store,
            key_prefix,
            policy,
            page_size: page_size.max(1),
        }
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Owner ids are user-supplied; keep them to one safe key segment.
    fn owner_segment(owner_id: &str) -> String {
        let cleaned = sanitize_filename::sanitize(owner_id).replace('/', "_");
        if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
            "_".to_string()
        } else {
            cleaned
        }
    }
}

#[async_trait]
impl StorageTier for RemoteTier {
    fn kind(&self) -> TierKind {
        TierKind::Remote
    }

    fn locate(&self, owner_id: &str, document_id: &str) -> String {
        let owner = Self::owner_segment(owner_id);
        if self.key_prefix.is_empty() {
            format!("{}/{}", owner, document_id)
        } else {
            format!("{}/{}/{}", self.key_prefix, owner, document_id)
        }
    }

    async fn put(&self, location: &str, bytes: Bytes) -> Result<()> {
        with_retry(&self.policy, "remote_put", || {
            self.store.put(location, bytes.clone())
        })
        .await
    }

    async fn get(&self, location: &str) -> Result<Option<Bytes>> {
        with_retry(&self.policy, "remote_get", || self.store.get(location)).await
    }

    async fn exists(&self, location: &str) -> Result<bool> {
        with_retry(&self.policy, "remote_head", || self.store.head(location)).await
    }

    async fn remove(&self, location: &str) -> Result<()> {
        with_retry(&self.policy, "remote_delete", || self.store.delete(location)).await
    }

    async fn list_locations(&self) -> Result<Vec<String>> {
        let prefix = if self.key_prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.key_prefix)
        };

        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = with_retry(&self.policy, "remote_list", || {
                self.store
                    .list_page(&prefix, token.as_deref(), self.page_size)
            })
            .await?;
            pages += 1;
            keys.extend(page.keys);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        debug!(prefix = %prefix, pages = pages, keys = keys.len(), "Listed remote keys");
        Ok(keys)
    }
}
