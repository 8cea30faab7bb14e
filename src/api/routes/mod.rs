//! Route handlers for the HTTP surface
//!
//! Handlers are organized by domain:
//! - [`torrents`] - Torrent list snapshot
//! - [`websocket`] - Upgrade into the command bridge
//! - [`system`] - Health, OpenAPI

use serde::{Deserialize, Serialize};

mod system;
mod torrents;
mod websocket;

pub use system::*;
pub use torrents::*;
pub use websocket::*;

/// Query parameters for GET /api
#[derive(Debug, Default, Deserialize, Serialize, utoipa::IntoParams)]
pub struct TorrentListQuery {
    /// Only include torrents in this filter class
    pub state: Option<crate::types::StateFilter>,
}
