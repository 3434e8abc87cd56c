use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::Config;
use crate::content_loader::{render_body, RenderFn};
use crate::index::IndexCache;
use crate::layout::Templates;
use crate::source::ContentSource;

pub type RefreshBroadcaster = broadcast::Sender<()>;

pub struct AppState {
    pub templates: RwLock<Templates>,
    pub index: IndexCache,
    pub source: Arc<dyn ContentSource>,
    pub config: Arc<Config>,
    pub render: RenderFn,
}

impl AppState {
    pub fn new(config: Arc<Config>, templates: Templates, source: Arc<dyn ContentSource>) -> Self {
        Self {
            templates: RwLock::new(templates),
            index: IndexCache::new(config.index_cache_ttl()),
            source,
            config,
            render: render_body,
        }
    }

    pub fn is_development(&self) -> bool {
        self.config.is_development
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub app_state: Arc<AppState>,
    pub broadcaster: RefreshBroadcaster,
}

impl axum::extract::FromRef<RouterState> for Arc<AppState> {
    fn from_ref(state: &RouterState) -> Self {
        state.app_state.clone()
    }
}

impl axum::extract::FromRef<RouterState> for RefreshBroadcaster {
    fn from_ref(state: &RouterState) -> Self {
        state.broadcaster.clone()
    }
}
