use crate::api::{Engine, ListApi};
use crate::codec;
use crate::location::LocationResolver;
use crate::mirror::CloudMirror;
use crate::model::{Feature, PickedRemote};
use crate::pending::PendingQueue;
use crate::remote::MemRemote;
use crate::settings::{FeatureSettings, MemKvStore};
use crate::store::backend::Handle;
use crate::store::mem_backend::MemBackend;
use crate::store::record_store::{RecordStore, DEFAULT_CACHE_TTL};
use std::sync::Arc;
use std::time::Duration;

/// A fully wired engine over in-memory storage, settings and remote.
pub struct MemEnv {
    pub backend: Arc<MemBackend>,
    pub remote: Arc<MemRemote>,
    pub kv: Arc<MemKvStore>,
    pub settings: FeatureSettings,
    pub resolver: Arc<LocationResolver>,
    pub mirror: Arc<CloudMirror>,
    pub queue: Arc<PendingQueue>,
    pub store: Arc<RecordStore>,
    pub engine: Engine,
}

impl Default for MemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl MemEnv {
    pub const LOCAL_DIR: &'static str = "/app/documents";
    pub const REMOTE_URI: &'static str = "mem://cloud/shopping_list.csv";

    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let backend = Arc::new(MemBackend::new());
        let remote = Arc::new(MemRemote::new());
        let kv = Arc::new(MemKvStore::new());
        let engine = Engine::new(
            backend.clone(),
            remote.clone(),
            kv.clone(),
            Handle::new(Self::LOCAL_DIR),
            ttl,
        )
        .expect("in-memory engine");
        Self {
            backend,
            remote,
            kv,
            settings: engine.settings().clone(),
            resolver: engine.resolver().clone(),
            mirror: engine.mirror().clone(),
            queue: engine.queue().clone(),
            store: engine.store().clone(),
            engine,
        }
    }

    pub fn feature() -> Feature {
        Feature::shopping_list()
    }

    pub fn api(&self) -> ListApi {
        self.engine.list(Self::feature())
    }

    /// Handle of the shopping list's local file under the default location.
    pub fn local_file(&self) -> Handle {
        Handle::new(Self::LOCAL_DIR).join(&Self::feature().file_name())
    }

    /// Put an empty list at [`MemEnv::REMOTE_URI`] and attach the shopping list to it.
    pub fn attach_fresh_remote(&self) {
        self.remote.put(Self::REMOTE_URI, &codec::header_line());
        self.api()
            .attach_remote(&PickedRemote::new(Self::REMOTE_URI, "shopping_list.csv"))
            .expect("attach in-memory remote");
    }
}
