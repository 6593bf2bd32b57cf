use super::{FetchError, ObjectStore};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory object store used by tests. Keys are held
/// in a BTreeMap so listings come back in lexicographic order, matching S3.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    poisoned: Mutex<HashSet<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes);
    }

    /// Make `get` for this key fail with a transport error, to exercise
    /// fetch-failure paths.
    pub fn poison(&self, key: &str) {
        self.poisoned.lock().unwrap().insert(key.to_string());
    }

    /// Undo `poison`, for retry scenarios.
    pub fn heal(&self, key: &str) {
        self.poisoned.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, FetchError> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, FetchError> {
        if self.poisoned.lock().unwrap().contains(key) {
            return Err(FetchError::Transport(format!(
                "simulated transport failure for {}",
                key
            )));
        }

        let objects = self.objects.lock().unwrap();
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                key: key.to_string(),
            })
    }
}
