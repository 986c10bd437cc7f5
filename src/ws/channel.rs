//! One WebSocket connection per `(document, participant)`.
//!
//! The channel announces the participant with a `presence/join` as soon as
//! the socket is up, then shuttles JSON frames both ways. Sends are gated on
//! the open state and simply dropped otherwise; nothing is queued or retried,
//! and a lost connection is never re-established by the channel itself.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::models::{CollabMessage, Participant};

/// Path prefix of the relay's document rooms.
pub const DOCS_PATH: &str = "/ws/docs";

/// Anything a controller can hand outbound messages to.
pub trait MessageSink {
    /// Fire-and-forget. `false` means the message was dropped.
    fn send(&self, message: &CollabMessage) -> bool;

    fn is_open(&self) -> bool;

    /// Close the underlying connection. Calling it again is a no-op.
    fn close(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closed,
}

/// Events delivered to the owner of a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Open,
    Message(CollabMessage),
    Error(String),
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Unsupported page origin '{0}'")]
    InvalidOrigin(String),

    #[error("Failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("Connection error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Where the relay lives and whether to reach it over TLS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEndpoint {
    /// `host` or `host:port`
    pub host: String,
    pub secure: bool,
}

impl ChannelEndpoint {
    pub fn new(host: impl Into<String>, secure: bool) -> Self {
        Self {
            host: host.into(),
            secure,
        }
    }

    /// Derive the endpoint from the origin the hosting page was served from.
    /// An `https` page talks `wss`, anything served over `http` talks `ws`.
    ///
    /// With `relay_port` the page's hostname is kept and its port replaced,
    /// for a relay running beside the web server. Without it the page origin
    /// must be the relay's own origin.
    pub fn from_page_origin(origin: &str, relay_port: Option<u16>) -> Result<Self, ChannelError> {
        let (secure, rest) = if let Some(rest) = origin.strip_prefix("https://") {
            (true, rest)
        } else if let Some(rest) = origin.strip_prefix("http://") {
            (false, rest)
        } else {
            return Err(ChannelError::InvalidOrigin(origin.to_string()));
        };

        let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
        let hostname = strip_port(authority);
        if hostname.is_empty() {
            return Err(ChannelError::InvalidOrigin(origin.to_string()));
        }

        match relay_port {
            Some(port) => Ok(Self::new(format!("{}:{}", hostname, port), secure)),
            None => Ok(Self::new(authority, secure)),
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }

    /// Connection target for one participant on one document.
    pub fn connection_url(&self, document_id: &str, participant_name: &str) -> String {
        format!(
            "{}://{}{}/{}?user_name={}",
            self.scheme(),
            self.host,
            DOCS_PATH,
            urlencoding::encode(document_id),
            urlencoding::encode(participant_name)
        )
    }
}

/// `host:port` or `[v6]:port` down to the bare hostname.
fn strip_port(authority: &str) -> &str {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    authority.split(':').next().unwrap_or_default()
}

enum Outbound {
    Frame(String),
    Close,
}

/// Handle to a live (or dying) session connection.
pub struct SessionChannel {
    document_id: String,
    participant: Participant,
    state: watch::Receiver<ChannelState>,
    outgoing: mpsc::UnboundedSender<Outbound>,
    closed: Arc<AtomicBool>,
}

impl SessionChannel {
    /// Start connecting. Progress is reported on the returned receiver:
    /// `Open` once the join announcement is out, then `Message`s, and a final
    /// `Closed`. Must be called from within a tokio runtime.
    pub fn open(
        endpoint: &ChannelEndpoint,
        document_id: &str,
        participant: &Participant,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let url = endpoint.connection_url(document_id, &participant.name);
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(256);
        let closed = Arc::new(AtomicBool::new(false));

        info!("Opening session channel for document {} as {}", document_id, participant.name);

        tokio::spawn(run_connection(
            url,
            participant.clone(),
            state_tx,
            out_rx,
            event_tx,
            closed.clone(),
        ));

        let channel = Self {
            document_id: document_id.to_string(),
            participant: participant.clone(),
            state: state_rx,
            outgoing: out_tx,
            closed,
        };
        (channel, event_rx)
    }

    pub fn state(&self) -> ChannelState {
        if self.closed.load(Ordering::SeqCst) {
            return ChannelState::Closed;
        }
        *self.state.borrow()
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn participant(&self) -> &Participant {
        &self.participant
    }
}

impl MessageSink for SessionChannel {
    fn send(&self, message: &CollabMessage) -> bool {
        if !self.is_open() {
            debug!(
                "Dropping {} message for document {}: channel not open",
                message.kind(),
                self.document_id
            );
            return false;
        }

        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Failed to encode {} message: {}", message.kind(), e);
                return false;
            }
        };
        self.outgoing.send(Outbound::Frame(frame)).is_ok()
    }

    fn is_open(&self) -> bool {
        self.state() == ChannelState::Open
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(
            "Closing session channel for document {} ({})",
            self.document_id, self.participant.name
        );
        let _ = self.outgoing.send(Outbound::Close);
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    url: String,
    participant: Participant,
    state_tx: watch::Sender<ChannelState>,
    mut out_rx: mpsc::UnboundedReceiver<Outbound>,
    event_tx: mpsc::Sender<ChannelEvent>,
    closed: Arc<AtomicBool>,
) {
    let ws_stream = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(source) => {
            let err = ChannelError::Connect { url, source };
            error!("{}", err);
            state_tx.send_replace(ChannelState::Closed);
            let _ = event_tx.send(ChannelEvent::Error(err.to_string())).await;
            let _ = event_tx.send(ChannelEvent::Closed).await;
            return;
        }
    };
    let (mut writer, mut reader) = ws_stream.split();

    // Torn down while the handshake was in flight
    if closed.load(Ordering::SeqCst) {
        let _ = writer.send(Message::Close(None)).await;
        state_tx.send_replace(ChannelState::Closed);
        let _ = event_tx.send(ChannelEvent::Closed).await;
        return;
    }

    // The join is the only way peers learn about us
    let announced = match CollabMessage::join(&participant).encode() {
        Ok(frame) => writer.send(Message::Text(frame.into())).await.map_err(ChannelError::from),
        Err(e) => {
            warn!("Failed to encode join for {}: {}", participant.name, e);
            Ok(())
        }
    };
    if let Err(err) = announced {
        error!("Failed to announce {}: {}", participant.name, err);
        state_tx.send_replace(ChannelState::Closed);
        let _ = event_tx.send(ChannelEvent::Error(err.to_string())).await;
        let _ = event_tx.send(ChannelEvent::Closed).await;
        return;
    }

    state_tx.send_replace(ChannelState::Open);
    info!("Session channel connected: {}", url);
    let _ = event_tx.send(ChannelEvent::Open).await;

    loop {
        tokio::select! {
            outbound = out_rx.recv() => match outbound {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = writer.send(Message::Text(frame.into())).await {
                        error!("Failed to send frame to {}: {}", url, e);
                        let err = ChannelError::from(e).to_string();
                        let _ = event_tx.send(ChannelEvent::Error(err)).await;
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = writer.send(Message::Close(None)).await;
                    break;
                }
            },
            inbound = reader.next() => match inbound {
                Some(Ok(Message::Text(text))) => match CollabMessage::decode(text.as_str()) {
                    Ok(message) => {
                        debug!("Received {} message from {}", message.kind(), message.user().name);
                        if event_tx.send(ChannelEvent::Message(message)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Dropping malformed frame from {}: {}", url, e);
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Session channel closed by peer: {}", url);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Session channel error on {}: {}", url, e);
                    let err = ChannelError::from(e).to_string();
                    let _ = event_tx.send(ChannelEvent::Error(err)).await;
                    break;
                }
            }
        }
    }

    state_tx.send_replace(ChannelState::Closed);
    let _ = event_tx.send(ChannelEvent::Closed).await;
}
