//! Per-connection command loop.
//!
//! A connection moves Unauthenticated → Authenticated → Closed. The reader
//! loop below is the only code that consumes inbound frames, and a single
//! writer task owns the outbound half. Everything that wants to talk to the
//! client, including background work and forwarded manager events, goes
//! through the writer's queue, which is drained before the socket is let go.
//! The queue is bounded. Replies to commands wait for room, but a forwarded
//! event that finds the queue full means the client stopped reading, and the
//! connection is dropped without the drain.

use super::BridgeContext;
use super::protocol::{
    AuthPayload, DeletePayload, Envelope, HashesPayload, MagnetPayload, MessageLevel,
    NewTokenPayload, Outbound, PeerListPayload,
};
use crate::types::{Event, InfoHash};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outbound messages buffered per connection before it counts as stalled
pub(crate) const OUTBOUND_CAPACITY: usize = 256;

const CONNECTED: &str = "Websocket Connection Established, awaiting Authentication";
const AUTH_OK: &str = "Authentication Verified, proceed with commands.";
const AUTH_ALREADY: &str = "Already Authenticated... Awaiting Commands";
const AUTH_MALFORMED: &str = "Message Payload in AuthRequest was malformed, closing connection";
const AUTH_INVALID: &str =
    "Parsing of Token failed, ensure you have the correct token! Closing Connection";
const AUTH_REQUIRED: &str = "Authentication required before sending commands, closing connection";
const MALFORMED_JSON: &str = "Malformed JSON request made to server.. ignoring";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Unauthenticated,
    Authenticated,
    Closed,
}

enum Flow {
    Continue,
    Close,
}

/// Producer side of the writer queue, shared with background work
#[derive(Clone)]
struct OutboundQueue {
    tx: mpsc::Sender<Outbound>,
    overflow: CancellationToken,
}

impl OutboundQueue {
    /// Enqueue without waiting; false once the queue is full or gone
    fn push(&self, message: Outbound) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                if !self.overflow.is_cancelled() {
                    tracing::warn!(
                        capacity = OUTBOUND_CAPACITY,
                        "client is not reading, closing connection"
                    );
                    self.overflow.cancel();
                }
                false
            }
            // Writer has stopped, the client is gone
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Enqueue a reply, waiting for room unless the connection overflowed
    async fn send(&self, message: Outbound) {
        tokio::select! {
            _ = self.overflow.cancelled() => {}
            // Only fails once the writer has stopped, in which case the client is gone
            _ = self.tx.send(message) => {}
        }
    }
}

struct Connection {
    ctx: BridgeContext,
    state: ConnectionState,
    outbound: OutboundQueue,
    event_forwarder: Option<JoinHandle<()>>,
}

/// Run one client connection to completion
///
/// `inbound` yields text frames and ends when the client goes away. `sink`
/// receives serialized outbound messages. Returns once the connection is
/// closed and every queued message has been handed to the sink, or right
/// away when the client let the queue overflow.
pub async fn serve_connection<S, K>(mut inbound: S, sink: K, ctx: BridgeContext)
where
    S: Stream<Item = String> + Unpin + Send,
    K: Sink<String> + Unpin + Send + 'static,
    K::Error: std::fmt::Display,
{
    let (tx, queue) = mpsc::channel(OUTBOUND_CAPACITY);
    let writer = tokio::spawn(write_loop(queue, sink));
    let overflow = CancellationToken::new();

    let mut conn = Connection {
        ctx,
        state: ConnectionState::Unauthenticated,
        outbound: OutboundQueue {
            tx,
            overflow: overflow.clone(),
        },
        event_forwarder: None,
    };

    tracing::info!("websocket connection established, awaiting authentication");
    conn.send(Outbound::ConnectResponse {
        level: MessageLevel::Message,
        payload: CONNECTED.to_string(),
    })
    .await;

    loop {
        let frame = tokio::select! {
            _ = overflow.cancelled() => break,
            frame = inbound.next() => frame,
        };
        let Some(frame) = frame else {
            break;
        };
        if let Flow::Close = conn.handle_frame(&frame).await {
            break;
        }
    }

    conn.state = ConnectionState::Closed;
    if let Some(forwarder) = conn.event_forwarder.take() {
        forwarder.abort();
    }
    tracing::debug!(state = ?conn.state, "websocket connection closing");

    drop(conn);
    if overflow.is_cancelled() {
        writer.abort();
        return;
    }

    // Background senders hold their own queue handles; the writer finishes
    // once the last of them is gone
    if let Err(e) = writer.await {
        tracing::warn!(error = %e, "websocket writer task failed");
    }
}

async fn write_loop<K>(mut queue: mpsc::Receiver<Outbound>, mut sink: K)
where
    K: Sink<String> + Unpin,
    K::Error: std::fmt::Display,
{
    while let Some(message) = queue.recv().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize outbound message");
                continue;
            }
        };
        if let Err(e) = sink.send(text).await {
            tracing::debug!(error = %e, "client went away, dropping outbound queue");
            return;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "error closing websocket");
    }
}

impl Connection {
    async fn send(&self, message: Outbound) {
        self.outbound.send(message).await;
    }

    async fn handle_frame(&mut self, frame: &str) -> Flow {
        let envelope: Envelope = match serde_json::from_str(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::error!(error = %e, "Unable to read JSON client message");
                self.send(Outbound::info(MALFORMED_JSON)).await;
                return Flow::Close;
            }
        };

        tracing::debug!(message_type = %envelope.message_type, "message from client");
        match self.state {
            ConnectionState::Unauthenticated => self.handle_unauthenticated(&envelope).await,
            ConnectionState::Authenticated => self.handle_command(&envelope).await,
            ConnectionState::Closed => Flow::Close,
        }
    }

    async fn handle_unauthenticated(&mut self, envelope: &Envelope) -> Flow {
        if envelope.message_type != "authRequest" {
            tracing::warn!(
                message_type = %envelope.message_type,
                "command received before authentication"
            );
            self.send(Outbound::auth(AUTH_REQUIRED)).await;
            return Flow::Close;
        }

        let payload: AuthPayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "malformed authentication payload");
                self.send(Outbound::auth(AUTH_MALFORMED)).await;
                return Flow::Close;
            }
        };

        match self.ctx.auth.verify(&payload.client_auth_string).await {
            Ok(claims) => {
                tracing::info!(client_name = %claims.client_name, "client authenticated");
                self.state = ConnectionState::Authenticated;
                // Subscribe first so no event after the reply is missed
                self.start_event_forwarding();
                self.send(Outbound::auth(AUTH_OK)).await;
                Flow::Continue
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to parse token!");
                self.send(Outbound::auth(AUTH_INVALID)).await;
                Flow::Close
            }
        }
    }

    /// Relay manager events as push notices until the connection closes
    fn start_event_forwarding(&mut self) {
        let mut events = self.ctx.manager.subscribe();
        let outbound = self.outbound.clone();

        self.event_forwarder = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if let Some(notice) = notice_for(&event)
                            && !outbound.push(notice)
                        {
                            return;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "websocket client lagging behind events");
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }));
    }

    async fn handle_command(&mut self, envelope: &Envelope) -> Flow {
        match envelope.message_type.as_str() {
            "authRequest" => {
                tracing::debug!("client already authenticated, skipping verification");
                self.send(Outbound::auth(AUTH_ALREADY)).await;
            }
            "newAuthToken" => self.new_auth_token(envelope).await,
            "torrentListRequest" => self.torrent_list(),
            "torrentPeerListRequest" => self.peer_list(envelope).await,
            "magnetLinkSubmit" => self.magnet_links(envelope).await,
            "startTorrents" => {
                if let Some(hashes) = self.hashes(envelope).await {
                    self.send(Outbound::info("Received Start Request")).await;
                    for hash in hashes {
                        let result = self.ctx.manager.start(&hash).await;
                        self.report(&hash, "start", result).await;
                    }
                }
            }
            "stopTorrents" => {
                if let Some(hashes) = self.hashes(envelope).await {
                    self.send(Outbound::info("Received Stop Request")).await;
                    for hash in hashes {
                        let result = self.ctx.manager.stop(&hash).await;
                        self.report(&hash, "stop", result).await;
                    }
                }
            }
            "deleteTorrents" => self.delete(envelope).await,
            "forceUploadTorrents" => {
                if let Some(hashes) = self.hashes(envelope).await {
                    self.send(Outbound::info("Received Force Start Request")).await;
                    for hash in hashes {
                        let result = self.ctx.manager.force_upload(&hash).await;
                        self.report(&hash, "force start", result).await;
                    }
                }
            }
            other => {
                tracing::warn!(message_type = %other, "unrecognized message type, closing connection");
                return Flow::Close;
            }
        }
        Flow::Continue
    }

    async fn new_auth_token(&self, envelope: &Envelope) {
        let payload: NewTokenPayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(e) => return self.send(Outbound::error(e)).await,
        };

        tracing::info!(client_name = %payload.client_name, "New Auth Token creation request");
        match self.ctx.auth.issue_token(&payload.client_name).await {
            Ok(token) => self.send(Outbound::TokenReturn { token }).await,
            Err(e) => {
                tracing::error!(error = %e, "failed to issue token");
                self.send(Outbound::error(format!("Unable to create token: {}", e))).await;
            }
        }
    }

    /// Build the snapshot off the reader loop and queue it when ready
    fn torrent_list(&self) {
        let manager = self.ctx.manager.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            let list = manager.snapshot().await;
            tracing::trace!(total = list.total, "sending torrent list");
            outbound.send(Outbound::from(list)).await;
        });
    }

    async fn peer_list(&self, envelope: &Envelope) {
        let payload: PeerListPayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(e) => return self.send(Outbound::error(e)).await,
        };

        let hash: InfoHash = match payload.peer_list_hash.parse() {
            Ok(hash) => hash,
            Err(e) => return self.send(Outbound::error(e.to_string())).await,
        };

        tracing::info!(hash = %hash, "Client Requested PeerList Update");
        match self.ctx.manager.peer_list(&hash).await {
            Ok(peers) => self.send(Outbound::from(peers)).await,
            Err(e) => self.send(Outbound::error(e.to_string())).await,
        }
    }

    async fn magnet_links(&self, envelope: &Envelope) {
        let payload: MagnetPayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(e) => return self.send(Outbound::error(e)).await,
        };

        for link in &payload.magnet_links {
            match self.ctx.manager.add_magnet(link, payload.label.clone()).await {
                Ok(session) => {
                    tracing::info!(hash = %session.hash, "Adding torrent to client!");
                    self.send(Outbound::info("Received MagnetLink")).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, magnet_link = %link, "Unable to add magnetlink to client!");
                    self.send(Outbound::error("Unable to add magnetlink to client!")).await;
                }
            }
        }
    }

    async fn delete(&self, envelope: &Envelope) {
        let payload: DeletePayload = match envelope.payload_as() {
            Ok(payload) => payload,
            Err(e) => return self.send(Outbound::error(e)).await,
        };

        self.send(Outbound::info("Received Delete Request")).await;
        for raw in &payload.torrent_hashes {
            let Some(hash) = self.parse_hash(raw).await else {
                continue;
            };
            let result = self.ctx.manager.delete(&hash, payload.with_data).await;
            self.report(&hash, "delete", result).await;
        }
    }

    /// Decode a hash list, reporting a malformed payload to the client
    ///
    /// Unparsable hashes are reported and skipped.
    async fn hashes(&self, envelope: &Envelope) -> Option<Vec<InfoHash>> {
        match envelope.payload_as::<HashesPayload>() {
            Ok(payload) => {
                let mut hashes = Vec::with_capacity(payload.torrent_hashes.len());
                for raw in &payload.torrent_hashes {
                    if let Some(hash) = self.parse_hash(raw).await {
                        hashes.push(hash);
                    }
                }
                Some(hashes)
            }
            Err(e) => {
                self.send(Outbound::error(e)).await;
                None
            }
        }
    }

    async fn parse_hash(&self, raw: &str) -> Option<InfoHash> {
        match raw.parse() {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(hash = %raw, error = %e, "ignoring invalid torrent hash");
                self.send(Outbound::error(format!("Invalid torrent hash '{}'", raw))).await;
                None
            }
        }
    }

    async fn report(&self, hash: &InfoHash, action: &str, result: crate::Result<()>) {
        if let Err(e) = result {
            tracing::error!(hash = %hash, action, error = %e, "torrent command failed");
            self.send(Outbound::error(format!("Unable to {} {}: {}", action, hash, e))).await;
        }
    }
}

/// Push notice for events the client should hear about
fn notice_for(event: &Event) -> Option<Outbound> {
    match event {
        Event::MetadataReceived { name, .. } => {
            Some(Outbound::info(format!("Metadata received for {}", name)))
        }
        Event::Completed { name, .. } => {
            Some(Outbound::info(format!("Download completed: {}", name)))
        }
        Event::Demoted { hash } => Some(Outbound::info(format!(
            "Torrent {} queued, active limit reached",
            hash
        ))),
        _ => None,
    }
}
