use crate::config::Settings;
use crate::error::ProxyResult;
use crate::services::{BackendService, ChunkSessionService};
use crate::utils::ShutdownCoordinator;
use std::sync::Arc;

/// Everything the proxy handlers share. Built once at startup and cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendService>,
    pub sessions: Arc<ChunkSessionService>,
    pub shutdown_coordinator: ShutdownCoordinator,
}

impl AppState {
    pub fn new(
        backend: Arc<BackendService>,
        sessions: Arc<ChunkSessionService>,
        shutdown_coordinator: ShutdownCoordinator,
    ) -> Self {
        Self {
            backend,
            sessions,
            shutdown_coordinator,
        }
    }

    pub fn from_settings(settings: &Settings) -> ProxyResult<Self> {
        let backend = Arc::new(BackendService::new(settings.backend.clone())?);
        let sessions = Arc::new(ChunkSessionService::new(settings.sessions.ttl()));
        Ok(Self::new(backend, sessions, ShutdownCoordinator::new()))
    }
}
