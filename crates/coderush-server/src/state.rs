use std::sync::Arc;

use crate::chat::ChatEngine;
use crate::config::Settings;
use crate::database::{DbPool, Repository};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub repository: Arc<Repository>,
    pub db_pool: DbPool,
    pub settings: Settings,
}
