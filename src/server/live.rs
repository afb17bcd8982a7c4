//! Server-Sent Events push channel: one `LiveConnection` per browser tab.
//!
//! - `connected` once on open
//! - `status` / `status-error` on the status interval (read through the shared status cache)
//! - `viewers` on the presence interval, re-heartbeating the connection's viewer id

use axum::response::sse::Event;
use futures::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::telemetry::{SingleFlightCache, StatusSnapshot, ViewerPresenceTracker};

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Connected { viewer: Option<String> },
    Status(StatusSnapshot),
    StatusError(String),
    Viewers { count: usize },
}

impl LiveEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::Connected { .. } => "connected",
            LiveEvent::Status(_) => "status",
            LiveEvent::StatusError(_) => "status-error",
            LiveEvent::Viewers { .. } => "viewers",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            LiveEvent::Connected { viewer } => json!({ "viewer": viewer }),
            LiveEvent::Status(snapshot) => serde_json::to_value(snapshot)
                .unwrap_or_else(|e| json!({ "error": e.to_string() })),
            LiveEvent::StatusError(error) => json!({ "error": error }),
            LiveEvent::Viewers { count } => json!({ "count": count }),
        }
    }

    pub fn to_sse(&self) -> Event {
        Event::default()
            .event(self.name())
            .data(self.payload().to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LiveSettings {
    pub status_interval: Duration,
    pub presence_interval: Duration,
}

/// Opens live connections and can close all of them at shutdown.
#[derive(Clone)]
pub struct LiveChannelHub {
    status: Arc<SingleFlightCache<StatusSnapshot>>,
    presence: ViewerPresenceTracker,
    settings: LiveSettings,
    shutdown: CancellationToken,
    open_connections: Arc<AtomicUsize>,
}

impl LiveChannelHub {
    pub fn new(
        status: Arc<SingleFlightCache<StatusSnapshot>>,
        presence: ViewerPresenceTracker,
        settings: LiveSettings,
    ) -> Self {
        Self {
            status,
            presence,
            settings,
            shutdown: CancellationToken::new(),
            open_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Registers a connection and starts its pump. The returned stream closes the connection
    /// when dropped.
    pub fn open(&self, viewer: Option<String>) -> LiveStream {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let connection =
            LiveConnection::new(viewer, self.shutdown.child_token(), &self.open_connections);

        tracing::info!(
            "Live connection {} opened (viewer: {}, open: {})",
            connection.id(),
            connection.viewer().unwrap_or("-"),
            self.open_connections()
        );

        tokio::spawn(self.clone().pump(connection.clone(), tx));

        LiveStream {
            events: ReceiverStream::new(rx),
            connection,
        }
    }

    /// Cancels every open connection.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn pump(self, connection: LiveConnection, tx: mpsc::Sender<LiveEvent>) {
        let token = connection.token.clone();
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tx.closed() => {}
            _ = self.run(&connection, &tx) => {}
        }
        connection.close();
    }

    /// Returns only when the receiving side is gone.
    async fn run(&self, connection: &LiveConnection, tx: &mpsc::Sender<LiveEvent>) {
        let viewer = connection.viewer();

        if let Some(viewer) = viewer {
            self.presence.heartbeat(viewer).await;
        }

        let connected = LiveEvent::Connected {
            viewer: viewer.map(str::to_string),
        };
        if tx.send(connected).await.is_err() {
            return;
        }

        let start = Instant::now();
        tokio::join!(
            self.status_loop(tx, start),
            self.presence_loop(viewer, tx, start),
        );
    }

    /// Pushes a status event now and on every status tick.
    async fn status_loop(&self, tx: &mpsc::Sender<LiveEvent>, start: Instant) {
        let period = self.settings.status_interval;
        let mut tick = interval_at(start + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if tx.send(self.status_event().await).await.is_err() {
                return;
            }
            tick.tick().await;
        }
    }

    /// Pushes the viewer count now and on every presence tick, never waiting on a status build.
    async fn presence_loop(
        &self,
        viewer: Option<&str>,
        tx: &mpsc::Sender<LiveEvent>,
        start: Instant,
    ) {
        let period = self.settings.presence_interval;
        let mut tick = interval_at(start + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if tx.send(self.presence_event(viewer).await).await.is_err() {
                return;
            }
            tick.tick().await;
        }
    }

    async fn status_event(&self) -> LiveEvent {
        match self.status.get().await {
            Ok(snapshot) => LiveEvent::Status(snapshot),
            Err(err) => {
                tracing::warn!("Status push failed: {}", err);
                LiveEvent::StatusError(err.to_string())
            }
        }
    }

    async fn presence_event(&self, viewer: Option<&str>) -> LiveEvent {
        let count = match viewer {
            Some(viewer) => self.presence.heartbeat(viewer).await,
            None => self.presence.count().await,
        };
        LiveEvent::Viewers { count }
    }
}

struct ConnectionInner {
    id: Uuid,
    viewer: Option<String>,
    closed: AtomicBool,
    open_connections: Arc<AtomicUsize>,
}

/// One open push channel. Closing cancels its timers; it is safe to close more than once.
#[derive(Clone)]
pub struct LiveConnection {
    inner: Arc<ConnectionInner>,
    token: CancellationToken,
}

impl LiveConnection {
    fn new(
        viewer: Option<String>,
        token: CancellationToken,
        open_connections: &Arc<AtomicUsize>,
    ) -> Self {
        open_connections.fetch_add(1, Ordering::SeqCst);
        Self {
            inner: Arc::new(ConnectionInner {
                id: Uuid::new_v4(),
                viewer,
                closed: AtomicBool::new(false),
                open_connections: Arc::clone(open_connections),
            }),
            token,
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn viewer(&self) -> Option<&str> {
        self.inner.viewer.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.token.cancel();
        self.inner.open_connections.fetch_sub(1, Ordering::SeqCst);
        tracing::info!("Live connection {} closed", self.inner.id);
    }
}

/// Event stream handed to the SSE response; dropping it (client went away) closes the connection.
pub struct LiveStream {
    events: ReceiverStream<LiveEvent>,
    connection: LiveConnection,
}

impl LiveStream {
    pub fn connection(&self) -> &LiveConnection {
        &self.connection
    }

    /// Next raw event, for callers that do not need SSE framing.
    pub async fn next_event(&mut self) -> Option<LiveEvent> {
        futures::StreamExt::next(&mut self.events).await
    }
}

impl Stream for LiveStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events)
            .poll_next(cx)
            .map(|event| event.map(|event| Ok(event.to_sse())))
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.connection.close();
    }
}
