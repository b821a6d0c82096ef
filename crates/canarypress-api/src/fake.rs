//! Scripted in-memory backend double.
//!
//! Implements [`ReleaseApi`](crate::ReleaseApi) over shared mutable state so
//! reconciler and controller tests (and the daemon's simulate mode) can run
//! without a live backend. An attribute left unscripted answers with a fetch
//! error, which is also how tests exercise the skip-a-tick path.

use std::sync::{Arc, Mutex};

use crate::error::{ApiError, ApiResult};
use crate::types::{ClusterEnvelope, ReleaseGroup, ReleaseGroupEnvelope};
use crate::ReleaseApi;

#[derive(Default)]
struct FakeState {
    group: Option<ReleaseGroupEnvelope>,
    cluster: Option<ClusterEnvelope>,
    pushed: Vec<ReleaseGroup>,
}

/// Cloneable handle to the scripted backend.
#[derive(Clone, Default)]
pub struct FakeReleaseApi {
    inner: Arc<Mutex<FakeState>>,
}

impl FakeReleaseApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the release group returned by subsequent fetches.
    pub fn set_release_group(&self, envelope: ReleaseGroupEnvelope) {
        self.inner.lock().unwrap().group = Some(envelope);
    }

    /// Script the cluster snapshot returned by subsequent fetches.
    pub fn set_cluster(&self, envelope: ClusterEnvelope) {
        self.inner.lock().unwrap().cluster = Some(envelope);
    }

    /// Make release-group fetches fail until scripted again.
    pub fn clear_release_group(&self) {
        self.inner.lock().unwrap().group = None;
    }

    /// Make cluster fetches fail until scripted again.
    pub fn clear_cluster(&self) {
        self.inner.lock().unwrap().cluster = None;
    }

    /// Every body pushed so far, oldest first.
    pub fn pushed(&self) -> Vec<ReleaseGroup> {
        self.inner.lock().unwrap().pushed.clone()
    }
}

impl ReleaseApi for FakeReleaseApi {
    async fn get_release_group(&self, name: &str) -> ApiResult<ReleaseGroupEnvelope> {
        self.inner
            .lock()
            .unwrap()
            .group
            .clone()
            .ok_or_else(|| ApiError::Fetch(format!("release group {name} unavailable")))
    }

    async fn get_cluster(&self, cluster_key: &str) -> ApiResult<ClusterEnvelope> {
        self.inner
            .lock()
            .unwrap()
            .cluster
            .clone()
            .ok_or_else(|| ApiError::Fetch(format!("cluster {cluster_key} unavailable")))
    }

    async fn put_release_group(&self, _name: &str, body: &ReleaseGroup) -> ApiResult<()> {
        let mut state = self.inner.lock().unwrap();
        state.pushed.push(body.clone());
        // Pushing also updates what the next fetch observes, like the real
        // backend does.
        if let Some(envelope) = state.group.as_mut() {
            envelope.result = body.clone();
        }
        Ok(())
    }
}
