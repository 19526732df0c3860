//! Live view and download counters for the displayed file.
//!
//! One connection is current at a time. Every subscription gets a new
//! generation number; a connection only touches the surface, and a retry
//! only reconnects, while the channel is still on that generation.

use futures::future::BoxFuture;
use serde::Deserialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;
use crate::file::{stats_url, FileDescriptor};
use crate::format::{downloads_from_bandwidth, format_thousands};
use crate::surface::{set_text, Element, Surface};

pub const LOADING: &str = "loading...";
pub const ERROR: &str = "error";
pub const RETRYING: &str = "retrying...";
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// One open push connection.
pub trait StatsConnection: Send {
    /// Next text payload; `None` once the server has closed the connection.
    fn next_message(&mut self) -> BoxFuture<'_, Option<Result<String>>>;

    fn close(self: Box<Self>) -> BoxFuture<'static, ()>;
}

pub trait StatsTransport: Send + Sync {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<Box<dyn StatsConnection>>>;
}

/// Cumulative counters pushed by the server.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatsUpdate {
    pub views: u64,
    pub bandwidth: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsCounters {
    pub views: u64,
    pub downloads: u64,
}

#[derive(Debug, Clone)]
struct Subscription {
    generation: u64,
    file_id: String,
    size: u64,
    url: Url,
}

struct LiveConnection {
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl LiveConnection {
    async fn shut_down(self) {
        let abort = self.task.abort_handle();
        let _ = self.close_tx.send(());
        if tokio::time::timeout(CLOSE_TIMEOUT, self.task).await.is_err() {
            warn!("stats connection did not close in time, aborting it");
            abort.abort();
        }
    }
}

#[derive(Default)]
struct ChannelState {
    generation: u64,
    current: Option<LiveConnection>,
    counters: Option<StatsCounters>,
}

struct Inner {
    transport: Arc<dyn StatsTransport>,
    surface: Arc<dyn Surface>,
    api_base: String,
    retry_delay: Duration,
    state: Mutex<ChannelState>,
}

pub struct StatsChannel {
    inner: Arc<Inner>,
}

impl StatsChannel {
    pub fn new(
        transport: Arc<dyn StatsTransport>,
        surface: Arc<dyn Surface>,
        api_base: impl Into<String>,
        retry_delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                surface,
                api_base: api_base.into(),
                retry_delay,
                state: Mutex::new(ChannelState::default()),
            }),
        }
    }

    /// Replace the current connection with one for `file`.
    ///
    /// The previous connection is closed before the new one is opened.
    pub async fn subscribe(&self, file: &FileDescriptor) -> Result<()> {
        let url = stats_url(&self.inner.api_base, &file.id)?;
        let (generation, previous) = {
            let mut state = self.inner.lock();
            state.generation += 1;
            state.counters = None;
            (state.generation, state.current.take())
        };

        if let Some(previous) = previous {
            previous.shut_down().await;
        }

        let sub = Subscription {
            generation,
            file_id: file.id.clone(),
            size: file.size,
            url,
        };
        debug!(file = %sub.file_id, generation, "subscribing to stats");
        self.inner.open(sub);
        Ok(())
    }

    /// Close the current connection without opening another.
    pub async fn close(&self) {
        let previous = {
            let mut state = self.inner.lock();
            state.generation += 1;
            state.current.take()
        };
        if let Some(previous) = previous {
            previous.shut_down().await;
        }
    }

    /// Latest counters of the current subscription.
    pub fn counters(&self) -> Option<StatsCounters> {
        self.inner.lock().counters
    }
}

impl Drop for StatsChannel {
    fn drop(&mut self) {
        let mut state = self.inner.lock();
        state.generation += 1;
        if let Some(live) = state.current.take() {
            let _ = live.close_tx.send(());
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a connection task unless `sub` has been superseded or a
    /// connection is already current. Returns whether one was started.
    fn open(self: &Arc<Self>, sub: Subscription) -> bool {
        let mut state = self.lock();
        if state.generation != sub.generation || state.current.is_some() {
            return false;
        }

        set_text(self.surface.as_ref(), Element::Views, LOADING);
        set_text(self.surface.as_ref(), Element::Downloads, LOADING);

        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(Arc::clone(self), sub, close_rx));
        state.current = Some(LiveConnection { close_tx, task });
        true
    }

    fn apply(&self, sub: &Subscription, payload: &str) {
        let update: StatsUpdate = match serde_json::from_str(payload) {
            Ok(update) => update,
            Err(err) => {
                warn!(file = %sub.file_id, %err, "ignoring malformed stats message");
                return;
            }
        };

        let mut state = self.lock();
        if state.generation != sub.generation {
            return;
        }
        let counters = StatsCounters {
            views: update.views,
            downloads: downloads_from_bandwidth(update.bandwidth, sub.size),
        };
        debug!(file = %sub.file_id, ?counters, "stats update");
        state.counters = Some(counters);
        set_text(self.surface.as_ref(), Element::Views, format_thousands(counters.views));
        set_text(
            self.surface.as_ref(),
            Element::Downloads,
            format_thousands(counters.downloads),
        );
    }

    fn fail(self: &Arc<Self>, sub: Subscription, reason: String) {
        {
            let mut state = self.lock();
            if state.generation != sub.generation {
                debug!(file = %sub.file_id, "superseded connection failed, ignoring");
                return;
            }
            state.current = None;
            set_text(self.surface.as_ref(), Element::Views, ERROR);
            set_text(self.surface.as_ref(), Element::Downloads, RETRYING);
        }

        warn!(file = %sub.file_id, %reason, "stats connection failed");
        self.surface.log(format!(
            "[!] Stats connection for {} lost: {}. Retrying in {}s",
            sub.file_id,
            reason,
            self.retry_delay.as_secs()
        ));

        let inner = Arc::clone(self);
        let delay = self.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let file_id = sub.file_id.clone();
            if inner.open(sub) {
                info!(file = %file_id, "reconnecting stats");
            } else {
                debug!(file = %file_id, "newer stats subscription exists, dropping retry");
            }
        });
    }
}

async fn run_connection(inner: Arc<Inner>, sub: Subscription, mut close_rx: oneshot::Receiver<()>) {
    let connect = inner.transport.connect(sub.url.clone());
    let mut conn = tokio::select! {
        biased;
        _ = &mut close_rx => return,
        res = connect => match res {
            Ok(conn) => conn,
            Err(err) => {
                inner.fail(sub, err.to_string());
                return;
            }
        },
    };
    debug!(file = %sub.file_id, url = %sub.url, "stats connection open");

    loop {
        tokio::select! {
            biased;
            _ = &mut close_rx => {
                conn.close().await;
                debug!(file = %sub.file_id, "stats connection closed");
                return;
            }
            msg = conn.next_message() => match msg {
                Some(Ok(payload)) => inner.apply(&sub, &payload),
                Some(Err(err)) => {
                    conn.close().await;
                    inner.fail(sub, err.to_string());
                    return;
                }
                None => {
                    debug!(file = %sub.file_id, "server closed stats connection");
                    return;
                }
            },
        }
    }
}
