use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use crate::models::User;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub started_at: Instant,
    pub users: Arc<RwLock<HashMap<u64, User>>>,
    pub panic_route_enabled: bool,
}

impl AppState {
    pub fn new(panic_route_enabled: bool) -> Self {
        Self {
            started_at: Instant::now(),
            users: Arc::new(RwLock::new(HashMap::new())),
            panic_route_enabled,
        }
    }

    pub fn from_env() -> Self {
        let enabled = std::env::var("DEMO_PANIC_ROUTE")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);
        Self::new(enabled)
    }
}
