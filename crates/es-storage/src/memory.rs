//! In-process object store, used by tests and dry runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::StorageResult;
use crate::store::{ListPage, ObjectMeta, ObjectStore, paginate};

type Objects = BTreeMap<(String, String), Vec<u8>>;

pub struct MemoryObjectStore {
    objects: Mutex<Objects>,
    page_size: usize,
    puts: AtomicUsize,
}

impl MemoryObjectStore {
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    pub fn new() -> Self {
        Self::with_page_size(Self::DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
            puts: AtomicUsize::new(0),
        }
    }

    fn objects(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object without counting it as a write.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects()
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of `put` calls served so far.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<&str>,
    ) -> StorageResult<ListPage> {
        let metas: Vec<ObjectMeta> = self
            .objects()
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .map(|((_, key), body)| ObjectMeta {
                key: key.clone(),
                size: body.len() as u64,
            })
            .collect();
        Ok(paginate(metas, prefix, continuation, self.page_size))
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.object(bucket, key))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> StorageResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.objects()
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}
