//! Authority channel lifecycle: connect, pump frames, reconnect forever

use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::util::events::{Dispatcher, Subscription, SubscriptionId};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Connection lifecycle as seen by the rest of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempt in flight
    Connecting,
    /// Channel is up; sends go through
    Open,
    /// Channel is down and a reconnect is scheduled
    ClosedRetrying,
}

/// Transport errors; none of these ever stop the reconnect loop
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Channel closed")]
    Closed,
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ConnectionError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ConnectionError>> + Send>>;

/// An open text-frame channel. The stream ending means the peer closed.
pub struct Channel {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens channels to the authority
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Channel, ConnectionError>>;
}

/// Production connector over WebSocket
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &str) -> BoxFuture<'static, Result<Channel, ConnectionError>> {
        let url = url.to_string();
        Box::pin(async move {
            let (socket, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;
            let (ws_sink, ws_stream) = socket.split();

            let sink = ws_sink
                .with(|text: String| future::ready(Ok::<_, ConnectionError>(Message::Text(text))));

            let stream = ws_stream.filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(Ok(text)),
                    Ok(Message::Binary(_)) => {
                        warn!("Received binary frame from authority, ignoring");
                        None
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "Authority sent close frame");
                        None
                    }
                    // Ping/pong are answered by tungstenite itself
                    Ok(_) => None,
                    Err(e) => Some(Err(ConnectionError::from(e))),
                })
            });

            Ok(Channel {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}

/// Owns the channel to the authority.
///
/// A background driver connects, dispatches inbound messages to subscribers,
/// writes outbound frames, and after any close or error waits a fixed delay
/// before trying again. There is no retry cap.
pub struct ConnectionManager {
    url: String,
    state_rx: watch::Receiver<ConnectionState>,
    outbound_tx: Option<mpsc::UnboundedSender<String>>,
    inbound: Dispatcher<ServerMsg>,
    driver: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Start connecting to `url` in the background
    pub fn connect<C: Connector>(url: impl Into<String>, connector: C, reconnect_delay: Duration) -> Self {
        let url = url.into();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let inbound = Dispatcher::new();

        let driver = tokio::spawn(run_driver(
            url.clone(),
            connector,
            reconnect_delay,
            state_tx,
            outbound_rx,
            inbound.clone(),
        ));

        Self {
            url,
            state_rx,
            outbound_tx: Some(outbound_tx),
            inbound,
            driver: Some(driver),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Observe state transitions
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Send `msg` if the channel is open. Returns whether it was handed to
    /// the transport; messages sent while not open are dropped, not queued.
    pub fn send(&self, msg: &ClientMsg) -> bool {
        if self.state() != ConnectionState::Open {
            debug!(?msg, "Authority channel not open, dropping message");
            return false;
        }

        let Some(tx) = &self.outbound_tx else {
            return false;
        };

        match serde_json::to_string(msg) {
            Ok(json) => tx.send(json).is_ok(),
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                false
            }
        }
    }

    /// Register for inbound authority messages
    pub fn subscribe(&self) -> Subscription<ServerMsg> {
        self.inbound.subscribe()
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inbound.unsubscribe(id)
    }

    /// Close the channel and stop reconnecting.
    ///
    /// An open channel gets a short window to send its close frame; anything
    /// else is aborted straight away.
    pub async fn shutdown(&mut self) {
        let was_open = self.state() == ConnectionState::Open;
        self.outbound_tx = None;

        if let Some(mut driver) = self.driver.take() {
            if !was_open
                || tokio::time::timeout(Duration::from_millis(500), &mut driver)
                    .await
                    .is_err()
            {
                driver.abort();
            }
        }
        info!(url = %self.url, "Authority connection shut down");
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

/// How a single open channel ended
enum ChannelEnd {
    Closed,
    Failed(ConnectionError),
    Shutdown,
}

async fn run_driver<C: Connector>(
    url: String,
    connector: C,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    inbound: Dispatcher<ServerMsg>,
) {
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        state_tx.send_replace(ConnectionState::Connecting);
        info!(url = %url, attempt, "Connecting to authority");

        match connector.connect(&url).await {
            Ok(channel) => {
                state_tx.send_replace(ConnectionState::Open);
                info!(url = %url, attempt, "Authority channel open");
                attempt = 0;

                match pump(channel, &mut outbound_rx, &inbound).await {
                    ChannelEnd::Closed => info!(url = %url, "Authority closed the channel"),
                    ChannelEnd::Failed(e) => warn!(url = %url, error = %e, "Authority channel failed"),
                    ChannelEnd::Shutdown => {
                        debug!(url = %url, "Connection driver stopping");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(url = %url, attempt, error = %e, "Failed to connect to authority");
            }
        }

        // Frames queued against the dead channel are dropped, not replayed
        while outbound_rx.try_recv().is_ok() {}

        state_tx.send_replace(ConnectionState::ClosedRetrying);
        info!(
            url = %url,
            delay_ms = reconnect_delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn pump(
    channel: Channel,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    inbound: &Dispatcher<ServerMsg>,
) -> ChannelEnd {
    let Channel {
        mut sink,
        mut stream,
    } = channel;

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(text)) => dispatch_frame(&text, inbound),
                Some(Err(e)) => return ChannelEnd::Failed(e),
                None => return ChannelEnd::Closed,
            },
            outbound = outbound_rx.recv() => match outbound {
                Some(json) => {
                    if let Err(e) = sink.send(json).await {
                        return ChannelEnd::Failed(e);
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return ChannelEnd::Shutdown;
                }
            },
        }
    }
}

/// Parse one inbound frame; malformed frames are logged and dropped
fn dispatch_frame(text: &str, inbound: &Dispatcher<ServerMsg>) {
    match serde_json::from_str::<ServerMsg>(text) {
        Ok(ServerMsg::Unknown) => {
            debug!(frame = %text, "Ignoring unknown authority message type");
        }
        Ok(msg) => {
            inbound.publish(msg);
        }
        Err(e) => {
            warn!(error = %e, "Discarding malformed authority message");
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory connector for driving the manager without sockets

    use super::*;
    use futures::channel::mpsc as fmpsc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::time::Instant;

    /// Authority side of a mock channel
    pub struct MockPeer {
        pub to_client: fmpsc::UnboundedSender<Result<String, ConnectionError>>,
        pub from_client: fmpsc::UnboundedReceiver<String>,
    }

    impl MockPeer {
        pub fn push(&self, text: &str) {
            let _ = self.to_client.unbounded_send(Ok(text.to_string()));
        }

        pub fn push_msg(&self, msg: &ServerMsg) {
            self.push(&serde_json::to_string(msg).unwrap());
        }
    }

    #[derive(Clone, Default)]
    pub struct MockConnector {
        /// Channels handed out in order; when empty every attempt fails
        pending: Arc<Mutex<VecDeque<Channel>>>,
        pub attempts: Arc<Mutex<Vec<Instant>>>,
    }

    impl MockConnector {
        /// Queue a channel for the next successful attempt
        pub fn accept_next(&self) -> MockPeer {
            let (to_client, client_stream) = fmpsc::unbounded();
            let (client_sink, from_client) = fmpsc::unbounded::<String>();
            self.pending.lock().push_back(Channel {
                sink: Box::pin(client_sink.sink_map_err(|_| ConnectionError::Closed)),
                stream: Box::pin(client_stream),
            });
            MockPeer {
                to_client,
                from_client,
            }
        }

        pub fn attempt_times(&self) -> Vec<Instant> {
            self.attempts.lock().clone()
        }
    }

    impl Connector for MockConnector {
        fn connect(&self, _url: &str) -> BoxFuture<'static, Result<Channel, ConnectionError>> {
            self.attempts.lock().push(Instant::now());
            let next = self.pending.lock().pop_front();
            Box::pin(async move { next.ok_or(ConnectionError::Closed) })
        }
    }
}
