//! Process-wide cache of the loaded model artifact.
//!
//! The cache has an explicit lifecycle: uninitialized → loaded |
//! unavailable. The first access performs exactly one load attempt,
//! even under concurrent first access; both outcomes are then served
//! for the rest of the process lifetime. A failed load degrades the
//! process once, not every request.

use std::{
    env,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        RwLock,
    },
};

use log::{debug, warn};
use once_cell::sync::Lazy;

use crate::artifact::ModelArtifact;

/// Environment variable overriding the default artifact location.
pub const MODEL_PATH_ENV: &str = "RECOMMENDER_MODEL_PATH";

/// Default artifact location relative to the working directory.
const DEFAULT_MODEL_PATH: &str = "models/recommender.bin";

enum CacheState {
    Uninitialized,
    Loaded(Arc<ModelArtifact>),
    Unavailable,
}

/// Lazily-initialized holder of the loaded model artifact.
pub struct ModelCache {
    location: PathBuf,
    state: RwLock<CacheState>,
    load_attempts: AtomicUsize,
}

impl ModelCache {
    /// Creates an uninitialized cache reading from the given location.
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            state: RwLock::new(CacheState::Uninitialized),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// The artifact location this cache reads from.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Returns the cached model, loading it on first access.
    ///
    /// Returns `None` if the cache is unavailable, which it stays
    /// until [`invalidate()`](Self::invalidate) or a process restart.
    pub fn get(&self) -> Option<Arc<ModelArtifact>> {
        match &*self.state.read().unwrap() {
            CacheState::Loaded(artifact) => return Some(Arc::clone(artifact)),
            CacheState::Unavailable => return None,
            CacheState::Uninitialized => {}
        }

        let mut state = self.state.write().unwrap();
        // another caller may have initialized the cache while this
        // one was waiting for the write lock
        match &*state {
            CacheState::Loaded(artifact) => return Some(Arc::clone(artifact)),
            CacheState::Unavailable => return None,
            CacheState::Uninitialized => {}
        }

        self.load_attempts.fetch_add(1, Ordering::Relaxed);
        match ModelArtifact::load(&self.location) {
            Ok(artifact) => {
                debug!(
                    "loaded model artifact from {} ({} users, {} courses, {} factors)",
                    self.location.display(),
                    artifact.params.nr_users(),
                    artifact.params.nr_courses(),
                    artifact.params.nr_factors(),
                );
                let artifact = Arc::new(artifact);
                *state = CacheState::Loaded(Arc::clone(&artifact));
                Some(artifact)
            }
            Err(error) => {
                warn!(
                    "model artifact unavailable, serving degraded recommendations: {}",
                    error,
                );
                *state = CacheState::Unavailable;
                None
            }
        }
    }

    /// Resets the cache to uninitialized.
    ///
    /// The next [`get()`](Self::get) performs a fresh load attempt.
    pub fn invalidate(&self) {
        *self.state.write().unwrap() = CacheState::Uninitialized;
    }

    /// Number of load attempts performed so far.
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::Relaxed)
    }
}

static MODEL_CACHE: Lazy<ModelCache> = Lazy::new(|| {
    let location = env::var_os(MODEL_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH));
    ModelCache::new(location)
});

/// The process-global model cache.
pub fn global() -> &'static ModelCache {
    &MODEL_CACHE
}
