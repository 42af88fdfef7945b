//! Rate-limited outbound request dispatcher
//!
//! Every upstream call goes through one `RateLimitedDispatcher`, which
//! releases at most `rate_limit` requests per rolling one-second window:
//! - Under quota, a submitted request is dispatched immediately
//! - Over quota, it waits in a FIFO pending queue
//! - A single one-second tick expires old dispatches from the window and
//!   drains as many pending requests as the window has room for
//!
//! Each caller awaits only its own request; a failure is delivered to the
//! submitter of the failing request and never to anyone else.

pub mod request;
pub mod stats;
pub mod transport;

pub use request::{DispatchResponse, RequestSpec, ResponseFormat};
pub use stats::{DispatcherStats, DispatcherStatsSnapshot};
pub use transport::{HttpTransport, ReqwestTransport, TransportResponse};

use crate::errors::{MetadataError, MetadataResult};
use crate::logger::{self, LogTag};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Length of the rate window and of the tick that services it
pub const WINDOW: Duration = Duration::from_millis(1000);

/// Windows of quota the pending queue may hold before the dispatcher counts as backlogged
pub const BACKLOG_WINDOWS: usize = 60;

type Reply = oneshot::Sender<MetadataResult<Option<DispatchResponse>>>;

struct QueuedRequest {
    spec: RequestSpec,
    reply: Reply,
}

/// Shared state touched by both `submit` and the tick
struct DispatchWindow {
    /// Dispatch times inside the current rolling window, oldest first
    dispatched_at: VecDeque<Instant>,
    pending: VecDeque<QueuedRequest>,
    /// Set once the tick has stopped; nothing would ever drain `pending` again
    closed: bool,
}

impl DispatchWindow {
    fn expire(&mut self, now: Instant) {
        while let Some(oldest) = self.dispatched_at.front() {
            if now.duration_since(*oldest) >= WINDOW {
                self.dispatched_at.pop_front();
            } else {
                break;
            }
        }
    }
}

pub struct RateLimitedDispatcher {
    rate_limit: u32,
    window: Mutex<DispatchWindow>,
    transport: Arc<dyn HttpTransport>,
    stats: Arc<DispatcherStats>,
}

impl RateLimitedDispatcher {
    pub fn new(rate_limit: u32, transport: Arc<dyn HttpTransport>) -> MetadataResult<Self> {
        if rate_limit == 0 {
            return Err(MetadataError::Config(
                "Dispatcher rate limit must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            rate_limit,
            window: Mutex::new(DispatchWindow {
                dispatched_at: VecDeque::new(),
                pending: VecDeque::new(),
                closed: false,
            }),
            transport,
            stats: Arc::new(DispatcherStats::default()),
        })
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn pending_len(&self) -> usize {
        self.window.lock().pending.len()
    }

    /// More requests waiting than `BACKLOG_WINDOWS` seconds of quota can release
    pub fn is_backlogged(&self) -> bool {
        self.pending_len() > self.rate_limit as usize * BACKLOG_WINDOWS
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot(self.pending_len())
    }

    /// Submit a request and wait for its own outcome
    ///
    /// `Ok(None)` means the upstream answered 404.
    pub async fn submit(&self, spec: RequestSpec) -> MetadataResult<Option<DispatchResponse>> {
        let (reply, outcome) = oneshot::channel();
        let queued = QueuedRequest { spec, reply };
        self.stats.record_submitted();

        let immediate = {
            let mut window = self.window.lock();
            if window.closed {
                return Err(MetadataError::DispatcherClosed);
            }
            let now = Instant::now();
            window.expire(now);

            if window.dispatched_at.len() < self.rate_limit as usize {
                window.dispatched_at.push_back(now);
                Some(queued)
            } else {
                window.pending.push_back(queued);
                None
            }
        };

        match immediate {
            Some(queued) => self.dispatch(queued),
            None => {
                self.stats.record_deferred();
                logger::verbose(
                    LogTag::Dispatcher,
                    &format!("Rate limit reached, request queued ({} pending)", self.pending_len()),
                );
            }
        }

        outcome.await.map_err(|_| MetadataError::DispatcherClosed)?
    }

    /// One window step: expire old dispatches, then release pending requests into the free slots
    pub fn tick(&self) -> usize {
        let released: Vec<QueuedRequest> = {
            let mut window = self.window.lock();
            let now = Instant::now();
            window.expire(now);

            let room = (self.rate_limit as usize).saturating_sub(window.dispatched_at.len());
            let count = room.min(window.pending.len());
            for _ in 0..count {
                window.dispatched_at.push_back(now);
            }
            window.pending.drain(..count).collect()
        };

        let count = released.len();
        if count > 0 {
            logger::debug(
                LogTag::Dispatcher,
                &format!("Released {} queued requests ({} still pending)", count, self.pending_len()),
            );
        }
        for queued in released {
            self.dispatch(queued);
        }
        count
    }

    /// Run the window tick until `shutdown` is notified
    pub fn start(self: &Arc<Self>, shutdown: Arc<Notify>) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let stop = shutdown.notified();
            tokio::pin!(stop);

            let mut ticker = tokio::time::interval(WINDOW);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => {
                        dispatcher.tick();
                    }
                }
            }

            let abandoned = dispatcher.close();
            logger::info(
                LogTag::Dispatcher,
                &format!("Dispatcher tick stopped ({} queued requests cancelled)", abandoned),
            );
        })
    }

    /// Stop accepting requests and fail everything still waiting for a window
    pub fn close(&self) -> usize {
        let cancelled: Vec<QueuedRequest> = {
            let mut window = self.window.lock();
            window.closed = true;
            window.pending.drain(..).collect()
        };

        let count = cancelled.len();
        for queued in cancelled {
            self.stats.record_failed();
            let _ = queued.reply.send(Err(MetadataError::DispatcherClosed));
        }
        count
    }

    fn dispatch(&self, queued: QueuedRequest) {
        let transport = Arc::clone(&self.transport);
        let stats = Arc::clone(&self.stats);
        stats.record_dispatched();

        tokio::spawn(async move {
            let QueuedRequest { spec, reply } = queued;
            let result = perform(transport.as_ref(), &spec).await;

            match &result {
                Ok(Some(_)) => stats.record_succeeded(),
                Ok(None) => stats.record_not_found(),
                Err(e) => {
                    stats.record_failed();
                    logger::debug(LogTag::Dispatcher, &format!("Request failed: {}", e));
                }
            }

            // Submitter may have gone away; nothing else is waiting on this result
            let _ = reply.send(result);
        });
    }
}

/// Execute one request and interpret its status: 200 parsed, 404 empty, anything else an error
async fn perform(
    transport: &dyn HttpTransport,
    spec: &RequestSpec,
) -> MetadataResult<Option<DispatchResponse>> {
    let response = transport.execute(spec).await?;

    match response.status {
        200 => match spec.format {
            ResponseFormat::Json => serde_json::from_str(&response.body)
                .map(|value| Some(DispatchResponse::Json(value)))
                .map_err(|e| MetadataError::Parse(format!("Invalid JSON from {}: {}", spec.url, e))),
            ResponseFormat::Text => Ok(Some(DispatchResponse::Text(response.body))),
        },
        404 => Ok(None),
        status => Err(MetadataError::Http {
            url: spec.url.clone(),
            status,
        }),
    }
}
