//! Torrent list snapshot handler

use super::TorrentListQuery;
use crate::api::AppState;
use crate::bridge::Outbound;
use crate::session::{TorrentList, snapshot};
use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

/// GET /api - Torrent list, same shape as the websocket `torrentList` message
#[utoipa::path(
    get,
    path = "/api",
    tag = "torrents",
    params(TorrentListQuery),
    responses(
        (status = 200, description = "Every session, newest first", body = TorrentList)
    )
)]
pub async fn torrent_list(
    State(state): State<AppState>,
    Query(query): Query<TorrentListQuery>,
) -> impl IntoResponse {
    let list = match query.state {
        Some(filter) => {
            let sessions = state.manager.registry().filter(filter).await;
            let data = snapshot::build(&sessions).await;
            TorrentList {
                total: data.len(),
                data,
            }
        }
        None => state.manager.snapshot().await,
    };

    Json(Outbound::from(list))
}
