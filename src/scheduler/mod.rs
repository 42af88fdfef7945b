//! Background collection refresh
//!
//! Collections are queued by the cache and downloaded one at a time:
//! token count check, full fetch, rerank, then persistence in sub-batches.
//! A pass only services the collections queued when it started; anything
//! queued meanwhile waits for the next pass.

mod queue;

pub use queue::{RefreshQueue, SkippedCollection};

use crate::config::RefreshConfig;
use crate::errors::{MetadataError, MetadataResult};
use crate::logger::{self, LogTag};
use crate::providers::MetadataProvider;
use crate::rarity::{rerank, RarityScorer};
use crate::store::MetadataStore;
use crate::types::{current_timestamp_secs, normalize_collection_id, TokenMetadata};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// What one pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub refreshed: usize,
    pub abandoned: usize,
    pub skipped: usize,
}

impl PassSummary {
    pub fn total(&self) -> usize {
        self.refreshed + self.abandoned + self.skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Tokens handed to persistence; in-flight is released by the write
    Refreshed,
    Abandoned,
    Skipped,
}

pub struct CollectionRefreshScheduler {
    queue: Arc<Mutex<RefreshQueue>>,
    provider: Arc<dyn MetadataProvider>,
    store: Arc<dyn MetadataStore>,
    scorer: Arc<dyn RarityScorer>,
    settings: RefreshConfig,
}

impl CollectionRefreshScheduler {
    pub fn new(
        provider: Arc<dyn MetadataProvider>,
        store: Arc<dyn MetadataStore>,
        scorer: Arc<dyn RarityScorer>,
        settings: RefreshConfig,
    ) -> Self {
        Self {
            queue: Arc::new(Mutex::new(RefreshQueue::new())),
            provider,
            store,
            scorer,
            settings,
        }
    }

    /// Queue a collection for refresh; returns whether it was added
    ///
    /// Safe to call as often as needed: pending, in-flight and skipped
    /// collections are ignored.
    pub fn add_to_queue(&self, collection_id: &str) -> bool {
        let collection_id = normalize_collection_id(collection_id);
        if collection_id.is_empty() {
            return false;
        }
        let (added, queued) = {
            let mut queue = self.queue.lock();
            let added = queue.push(&collection_id);
            (added, queue.pending_len())
        };
        if added {
            logger::debug(
                LogTag::Scheduler,
                &format!("Queued {} for refresh (queue length {})", collection_id, queued),
            );
        }
        added
    }

    pub fn pending_len(&self) -> usize {
        self.queue.lock().pending_len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.queue.lock().in_flight_len()
    }

    pub fn is_pending(&self, collection_id: &str) -> bool {
        self.queue
            .lock()
            .is_pending(&normalize_collection_id(collection_id))
    }

    pub fn is_in_flight(&self, collection_id: &str) -> bool {
        self.queue
            .lock()
            .is_in_flight(&normalize_collection_id(collection_id))
    }

    pub fn is_skipped(&self, collection_id: &str) -> bool {
        self.queue
            .lock()
            .is_skipped(&normalize_collection_id(collection_id))
    }

    pub fn skipped_collections(&self) -> Vec<SkippedCollection> {
        self.queue.lock().skipped()
    }

    /// Process every collection that was pending when the pass began
    pub async fn run_pass(&self) -> PassSummary {
        let mut summary = PassSummary::default();
        let batch = self.pending_len();

        for _ in 0..batch {
            let Some(collection_id) = self.queue.lock().start_next() else {
                break;
            };

            match self.process_collection(&collection_id).await {
                Outcome::Refreshed => summary.refreshed += 1,
                Outcome::Abandoned => {
                    summary.abandoned += 1;
                    self.queue.lock().finish(&collection_id);
                }
                Outcome::Skipped => {
                    summary.skipped += 1;
                    self.queue.lock().finish(&collection_id);
                }
            }
        }

        summary
    }

    async fn process_collection(&self, collection_id: &str) -> Outcome {
        let token_count = match self.provider.token_count(collection_id).await {
            Ok(Some(count)) => count,
            Ok(None) => {
                logger::warning(
                    LogTag::Scheduler,
                    &format!("No token count for {}, trying again on a later refresh", collection_id),
                );
                return Outcome::Abandoned;
            }
            Err(e) => {
                log_abandoned(collection_id, "Token count", &e);
                return Outcome::Abandoned;
            }
        };

        if token_count > self.settings.max_token_count {
            self.queue
                .lock()
                .skip(collection_id, token_count, current_timestamp_secs());
            logger::warning(
                LogTag::Scheduler,
                &format!(
                    "Skipping {} permanently: {} tokens exceeds the limit of {}",
                    collection_id, token_count, self.settings.max_token_count
                ),
            );
            return Outcome::Skipped;
        }

        let mut tokens = match self.provider.collection_metadata(collection_id).await {
            Ok(Some(tokens)) if !tokens.is_empty() => tokens,
            Ok(_) => {
                logger::warning(
                    LogTag::Scheduler,
                    &format!("No metadata returned for {}", collection_id),
                );
                return Outcome::Abandoned;
            }
            Err(e) => {
                log_abandoned(collection_id, "Metadata download", &e);
                return Outcome::Abandoned;
            }
        };

        let ranked = rerank(&mut tokens, self.scorer.as_ref());
        logger::info(
            LogTag::Scheduler,
            &format!(
                "Fetched {} tokens for {} ({} ranked)",
                tokens.len(),
                collection_id,
                ranked
            ),
        );

        // Fewer tokens than the reported count means pruning could delete live tokens
        let complete = tokens.len() as u64 >= token_count;
        if !complete && self.settings.prune_removed_tokens {
            logger::warning(
                LogTag::Scheduler,
                &format!(
                    "{} returned {} of {} tokens; keeping stored tokens not in this download",
                    collection_id,
                    tokens.len(),
                    token_count
                ),
            );
        }

        let job = persist_and_release(
            Arc::clone(&self.queue),
            Arc::clone(&self.store),
            collection_id.to_string(),
            tokens,
            self.settings.clone(),
            complete,
        );
        if self.settings.await_persistence {
            job.await;
        } else {
            tokio::spawn(job);
        }
        Outcome::Refreshed
    }

    /// Run passes until `shutdown` is notified, pausing `loop_delay_ms` between them
    pub fn start(self: &Arc<Self>, shutdown: Arc<Notify>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let stop = shutdown.notified();
            tokio::pin!(stop);
            let delay = Duration::from_millis(scheduler.settings.loop_delay_ms);

            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    summary = scheduler.run_pass() => {
                        if summary.total() > 0 {
                            logger::debug(
                                LogTag::Scheduler,
                                &format!(
                                    "Pass finished: {} refreshed, {} abandoned, {} skipped",
                                    summary.refreshed, summary.abandoned, summary.skipped
                                ),
                            );
                        }
                    }
                }

                tokio::select! {
                    _ = &mut stop => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            logger::info(LogTag::Scheduler, "Refresh loop stopped");
        })
    }
}

/// Upstream trouble is a warning; anything else points at a bug or bad payload
fn log_abandoned(collection_id: &str, stage: &str, error: &MetadataError) {
    if error.is_transient() {
        logger::warning(
            LogTag::Scheduler,
            &format!(
                "{} for {} failed upstream, retrying on a later request: {}",
                stage, collection_id, error
            ),
        );
    } else {
        logger::error(
            LogTag::Scheduler,
            &format!("{} for {} abandoned: {}", stage, collection_id, error),
        );
    }
}

/// Write the collection, then release its in-flight marker
///
/// Failures are logged only; the next TTL-driven refresh repairs a lost write.
async fn persist_and_release(
    queue: Arc<Mutex<RefreshQueue>>,
    store: Arc<dyn MetadataStore>,
    collection_id: String,
    tokens: Vec<TokenMetadata>,
    settings: RefreshConfig,
    complete: bool,
) {
    let id = collection_id.clone();
    let prune = settings.prune_removed_tokens && complete;
    let result = tokio::task::spawn_blocking(move || {
        write_collection(store.as_ref(), &id, &tokens, settings.write_batch_size, prune)
    })
    .await;

    match result {
        Ok(Ok((written, pruned))) => {
            let suffix = if pruned > 0 {
                format!(", pruned {} removed tokens", pruned)
            } else {
                String::new()
            };
            logger::info(
                LogTag::Store,
                &format!("Saved {} tokens for {}{}", written, collection_id, suffix),
            );
        }
        Ok(Err(e)) => {
            logger::error(
                LogTag::Store,
                &format!("Failed to save {}: {}", collection_id, e),
            );
        }
        Err(e) => {
            logger::error(
                LogTag::Store,
                &format!("Save task for {} failed: {}", collection_id, e),
            );
        }
    }

    queue.lock().finish(&collection_id);
}

/// Upsert in sub-batches; with `prune`, delete tokens the download no longer has
///
/// Pruning runs only after every sub-batch was written.
fn write_collection(
    store: &dyn MetadataStore,
    collection_id: &str,
    tokens: &[TokenMetadata],
    batch_size: usize,
    prune: bool,
) -> MetadataResult<(usize, usize)> {
    let mut written = 0;
    for chunk in tokens.chunks(batch_size.max(1)) {
        written += store.write_batch(chunk, true)?;
    }

    let mut pruned = 0;
    if prune {
        let keep: HashSet<String> = tokens.iter().map(|t| t.token_id.clone()).collect();
        pruned = store.prune_collection(collection_id, &keep)?;
    }
    Ok((written, pruned))
}
