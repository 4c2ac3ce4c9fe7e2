//! Test helpers: an in-memory backend that records every call.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stowage_storage::{
    BackendConfig, BackendErrorKind, ClientConfig, ListedObject, ObjectKey, ObjectStoreClient,
    Storage, StorageBackend, StoreError, StoreResult,
};

pub const PUBLIC_BASE: &str = "https://cdn.test/public";

#[derive(Default)]
struct State {
    objects: BTreeMap<String, (Bytes, String)>,
    calls: Vec<String>,
    /// Errors returned (in order) by the next calls, before normal behaviour resumes
    injected: VecDeque<BackendErrorKind>,
    /// Writes that commit but then report a transport failure
    lost_responses: u32,
    delay: Option<Duration>,
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn object(&self, key: &str) -> Option<(Bytes, String)> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn fail_next(&self, kinds: &[BackendErrorKind]) {
        self.state.lock().unwrap().injected.extend(kinds.iter().copied());
    }

    pub fn lose_next_responses(&self, count: u32) {
        self.state.lock().unwrap().lost_responses += count;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    async fn enter(&self, call: String) -> StoreResult<()> {
        let (delay, injected) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call);
            (state.delay, state.injected.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match injected {
            Some(kind) => Err(StoreError::backend(kind, "injected failure")),
            None => Ok(()),
        }
    }
}

fn commit(state: &mut State) -> StoreResult<()> {
    if state.lost_responses > 0 {
        state.lost_responses -= 1;
        return Err(StoreError::backend(
            BackendErrorKind::Transport,
            "connection reset after write",
        ));
    }
    Ok(())
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> StoreResult<()> {
        self.enter(format!("upload {}/{}", bucket, key)).await?;
        let mut state = self.state.lock().unwrap();
        if !upsert && state.objects.contains_key(key.as_str()) {
            return Err(StoreError::backend(
                BackendErrorKind::Conflict,
                "The resource already exists",
            ));
        }
        state
            .objects
            .insert(key.to_string(), (data, content_type.to_string()));
        commit(&mut state)
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StoreResult<Vec<ListedObject>> {
        self.enter(format!("list {}/{}", bucket, prefix)).await?;
        let state = self.state.lock().unwrap();
        let wanted = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };
        Ok(state
            .objects
            .iter()
            .filter_map(|(key, (data, _))| {
                let rest = key.strip_prefix(&wanted)?;
                (!rest.contains('/')).then(|| ListedObject {
                    name: rest.to_string(),
                    size: Some(data.len() as u64),
                    last_modified: None,
                    metadata: Some(serde_json::json!({ "size": data.len() })),
                })
            })
            .take(limit)
            .collect())
    }

    async fn download(&self, bucket: &str, key: &ObjectKey) -> StoreResult<Bytes> {
        self.enter(format!("download {}/{}", bucket, key)).await?;
        self.state
            .lock()
            .unwrap()
            .objects
            .get(key.as_str())
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StoreError::backend(BackendErrorKind::NotFound, "Object not found"))
    }

    async fn remove(&self, bucket: &str, key: &ObjectKey) -> StoreResult<()> {
        self.enter(format!("remove {}/{}", bucket, key)).await?;
        self.state.lock().unwrap().objects.remove(key.as_str());
        Ok(())
    }

    async fn move_object(&self, bucket: &str, from: &ObjectKey, to: &ObjectKey) -> StoreResult<()> {
        self.enter(format!("move {}/{} {}", bucket, from, to)).await?;
        let mut state = self.state.lock().unwrap();
        let object = state
            .objects
            .remove(from.as_str())
            .ok_or_else(|| StoreError::backend(BackendErrorKind::NotFound, "Object not found"))?;
        state.objects.insert(to.to_string(), object);
        commit(&mut state)
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", PUBLIC_BASE, bucket, key)
    }

    async fn signed_url(
        &self,
        bucket: &str,
        key: &ObjectKey,
        expires_in: Duration,
    ) -> StoreResult<String> {
        self.enter(format!("sign {}/{}", bucket, key)).await?;
        if !self.state.lock().unwrap().objects.contains_key(key.as_str()) {
            return Err(StoreError::backend(BackendErrorKind::NotFound, "Object not found"));
        }
        Ok(format!(
            "https://cdn.test/sign/{}/{}?token=t&expiresIn={}",
            bucket,
            key,
            expires_in.as_secs()
        ))
    }

    async fn create_bucket(&self, name: &str, public: bool) -> StoreResult<()> {
        self.enter(format!("create_bucket {} {}", name, public)).await
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Supabase
    }
}

pub fn test_config() -> ClientConfig {
    ClientConfig::new(
        BackendConfig::Supabase {
            url: "https://project.supabase.co".to_string(),
            api_key: "test-key".to_string(),
        },
        "videos",
    )
}

pub fn client_with(config: ClientConfig) -> (ObjectStoreClient, MemoryStorage) {
    stowage_storage::init_tracing();
    let storage = MemoryStorage::new();
    let client = ObjectStoreClient::with_backend(config, Arc::new(storage.clone())).unwrap();
    (client, storage)
}
