//! Storage test utilities.

use async_trait::async_trait;
use bytes::Bytes;
use folio_storage::{ByteStream, ObjectMeta, ObjectStore, StorageError, StorageResult};
use std::io;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Wraps a real backend and injects failures on demand.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct FaultyStore {
    inner: Arc<dyn ObjectStore>,
    failing_puts: AtomicU32,
    put_calls: AtomicU32,
    fail_deletes: AtomicBool,
    failing_prefix: Mutex<Option<String>>,
    stored_keys: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            failing_puts: AtomicU32::new(0),
            put_calls: AtomicU32::new(0),
            fail_deletes: AtomicBool::new(false),
            failing_prefix: Mutex::new(None),
            stored_keys: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` puts.
    pub fn fail_next_puts(&self, n: u32) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Fail every put whose key starts with `prefix`.
    pub fn fail_puts_under(&self, prefix: &str) {
        *self.failing_prefix.lock().unwrap() = Some(prefix.to_string());
    }

    /// Keys of every successful put, in order.
    pub fn stored_keys(&self) -> Vec<String> {
        self.stored_keys.lock().unwrap().clone()
    }

    pub fn put_calls(&self) -> u32 {
        self.put_calls.load(Ordering::SeqCst)
    }

    fn unavailable(op: &str) -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::ConnectionReset,
            format!("injected {op} failure"),
        ))
    }
}

#[async_trait]
impl ObjectStore for FaultyStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let under_prefix = self
            .failing_prefix
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|prefix| key.starts_with(prefix));
        if should_fail || under_prefix {
            return Err(Self::unavailable("put"));
        }
        self.inner.put(key, data, content_type).await?;
        self.stored_keys.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("delete"));
        }
        self.inner.delete(key).await
    }

    fn public_url(&self, key: &str) -> String {
        self.inner.public_url(key)
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
