use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use tcpw_model::JobId;

use crate::job::Job;

/// In-memory job storage keyed by job identity.
///
/// Written when a job is created or torn down, read by every execution.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<JobId, Arc<Job>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a job, replacing any previous record with the same id.
    pub fn insert(&self, job: Job) -> Arc<Job> {
        let job = Arc::new(job);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(job.id(), Arc::clone(&job));
        job
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<Job>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.get(id).cloned()
    }

    pub fn remove(&self, id: &JobId) -> Option<Arc<Job>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.remove(id)
    }

    pub fn ids(&self) -> Vec<JobId> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
