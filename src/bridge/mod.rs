//! Websocket command bridge between clients and the session manager.
//!
//! [`serve_connection`] is transport agnostic: it takes a stream of inbound
//! text frames and a sink for outbound ones. The HTTP layer adapts the axum
//! websocket to that shape.

mod dispatcher;
pub mod protocol;

pub use dispatcher::serve_connection;
pub use protocol::{Envelope, MessageLevel, Outbound};

use crate::auth::AuthGate;
use crate::session::SessionManager;
use std::sync::Arc;

/// What a connection needs to execute commands
#[derive(Clone)]
pub struct BridgeContext {
    /// Session manager commands are dispatched to
    pub manager: SessionManager,
    /// Token verifier and issuer
    pub auth: Arc<AuthGate>,
}
