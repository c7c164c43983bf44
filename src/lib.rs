pub mod channel;
pub mod config;
pub mod conversation;
pub mod country;
pub mod engine;
pub mod intent;
pub mod localization;
pub mod moderation;
pub mod render;
pub mod status;
pub mod store;
pub mod types;
pub mod webhook;

use std::sync::Arc;

use engine::Engine;
use store::Store;

pub fn get_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

pub struct AppState {
    pub engine: Arc<Engine>,
    pub store: Arc<dyn Store>,
}
