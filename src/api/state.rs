//! Application state for the API server

use crate::auth::AuthGate;
use crate::bridge::BridgeContext;
use crate::{Config, SessionManager};
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// This struct is cloned for each request (cheap Arc clones) and provides
/// access to the session manager, the token gate and the configuration.
#[derive(Clone)]
pub struct AppState {
    /// The session manager
    pub manager: SessionManager,

    /// Token verifier handed to every websocket connection
    pub auth: Arc<AuthGate>,

    /// Configuration (read only)
    pub config: Arc<Config>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(manager: SessionManager, auth: Arc<AuthGate>) -> Self {
        let config = manager.get_config();
        Self {
            manager,
            auth,
            config,
        }
    }

    /// Context for one websocket connection
    pub fn bridge_context(&self) -> BridgeContext {
        BridgeContext {
            manager: self.manager.clone(),
            auth: self.auth.clone(),
        }
    }
}
