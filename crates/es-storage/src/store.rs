//! Storage trait shared by every backend.

use async_trait::async_trait;
use std::path::Path;

use crate::{StorageError, StorageResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}

/// One page of a listing. `next` is the continuation token for the
/// following page, `None` once the listing is exhausted.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectMeta>,
    pub next: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List keys under `prefix` in key order, starting after `continuation`.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> StorageResult<ListPage>;

    /// Fetch an object; `Ok(None)` if it does not exist.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store an object, replacing any previous content.
    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> StorageResult<()>;

    /// List every key under `prefix`, following continuation tokens.
    async fn list_all(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self.list_page(bucket, prefix, token.as_deref()).await?;
            objects.extend(page.objects);
            match page.next {
                Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
                Some(next) => {
                    return Err(StorageError::Backend {
                        message: format!("listing did not advance past token {next}"),
                    });
                }
                None => break,
            }
        }
        Ok(objects)
    }

    /// Copy an object into a local file, creating parent directories.
    async fn download_to(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
        let body = self
            .get(bucket, key)
            .await?
            .ok_or_else(|| StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        tokio::fs::write(path, body)
            .await
            .map_err(|e| StorageError::io(path, e))
    }
}

/// Shared paging rule for backends that hold a sorted key set: keys strictly
/// after `continuation`, at most `page_size` of them.
pub(crate) fn paginate(
    sorted: impl IntoIterator<Item = ObjectMeta>,
    prefix: &str,
    continuation: Option<&str>,
    page_size: usize,
) -> ListPage {
    let mut matching = sorted
        .into_iter()
        .filter(|o| o.key.starts_with(prefix))
        .filter(|o| continuation.is_none_or(|token| o.key.as_str() > token));

    let objects: Vec<ObjectMeta> = matching.by_ref().take(page_size.max(1)).collect();
    let next = if matching.next().is_some() {
        objects.last().map(|o| o.key.clone())
    } else {
        None
    };
    ListPage { objects, next }
}
