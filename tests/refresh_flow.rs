//! End-to-end refresh flow: cache -> scheduler -> provider -> dispatcher -> store

use async_trait::async_trait;
use nftmeta::cache::StalenessCache;
use nftmeta::config::{RefreshConfig, UpstreamConfig};
use nftmeta::dispatcher::{HttpTransport, RateLimitedDispatcher, RequestSpec, TransportResponse};
use nftmeta::providers::GomuProvider;
use nftmeta::rarity::TraitFrequencyScorer;
use nftmeta::scheduler::CollectionRefreshScheduler;
use nftmeta::store::{MetadataStore, SqliteMetadataStore};
use nftmeta::{MetadataLookup, MetadataResult};
use serde_json::json;
use std::collections::HashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Fake Gomu API serving collections of known sizes
struct FakeGomu {
    sizes: HashMap<String, u64>,
    /// Page cursors that answer 404
    missing_pages: Mutex<Vec<u64>>,
    calls: Mutex<Vec<String>>,
}

impl FakeGomu {
    fn new(collections: &[(&str, u64)]) -> Self {
        Self {
            sizes: collections
                .iter()
                .map(|(id, size)| (id.to_string(), *size))
                .collect(),
            missing_pages: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls_for(&self, path: &str, collection: &str) -> usize {
        let needle = format!("contractAddress={}", collection);
        self.calls
            .lock()
            .iter()
            .filter(|url| url.contains(path) && url.contains(&needle))
            .count()
    }
}

fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let query = url.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

#[async_trait]
impl HttpTransport for FakeGomu {
    async fn execute(&self, request: &RequestSpec) -> MetadataResult<TransportResponse> {
        self.calls.lock().push(request.url.clone());

        let collection = query_param(&request.url, "contractAddress").unwrap_or_default();
        let Some(size) = self.sizes.get(collection).copied() else {
            return Ok(TransportResponse { status: 404, body: String::new() });
        };

        let body = if request.url.contains("/rest/overview/contract") {
            json!({ "data": { "contract": { "tokensCount": size } } })
        } else {
            let cursor: u64 = query_param(&request.url, "cursor")
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);
            if self.missing_pages.lock().contains(&cursor) {
                return Ok(TransportResponse { status: 404, body: String::new() });
            }
            let tokens: Vec<_> = (cursor + 1..=(cursor + 100).min(size))
                .map(|id| {
                    let background = if id % 10 == 0 { "Gold" } else { "Blue" };
                    json!({
                        "tokenId": id.to_string(),
                        "metadata": { "traits": [
                            { "traitType": "Background", "traitValue": background },
                            { "traitType": "Level", "traitValue": id % 3 }
                        ]}
                    })
                })
                .collect();
            json!({ "data": tokens })
        };

        Ok(TransportResponse { status: 200, body: body.to_string() })
    }
}

struct Harness {
    upstream: Arc<FakeGomu>,
    store: Arc<SqliteMetadataStore>,
    dispatcher: Arc<RateLimitedDispatcher>,
    scheduler: Arc<CollectionRefreshScheduler>,
    cache: StalenessCache,
}

fn harness(collections: &[(&str, u64)]) -> Harness {
    let upstream = Arc::new(FakeGomu::new(collections));
    let dispatcher = Arc::new(RateLimitedDispatcher::new(1_000, upstream.clone()).unwrap());
    let provider = Arc::new(GomuProvider::new(
        &UpstreamConfig {
            api_key: "test-key".to_string(),
            base_url: "https://gomu.test".to_string(),
            page_size: 100,
            ..UpstreamConfig::default()
        },
        Arc::clone(&dispatcher),
    ));
    let store = Arc::new(SqliteMetadataStore::open_in_memory().unwrap());
    let scheduler = Arc::new(CollectionRefreshScheduler::new(
        provider,
        store.clone(),
        Arc::new(TraitFrequencyScorer),
        RefreshConfig {
            max_token_count: 100_000,
            await_persistence: true,
            ..RefreshConfig::default()
        },
    ));
    let cache = StalenessCache::new(store.clone(), Arc::clone(&scheduler), 86_400);

    Harness {
        upstream,
        store,
        dispatcher,
        scheduler,
        cache,
    }
}

#[tokio::test]
async fn unknown_collection_becomes_available_after_refresh() {
    let h = harness(&[("0xabc", 50)]);

    let first = h.cache.get_metadata("0xABC", "1").await.unwrap();
    assert_eq!(first, MetadataLookup::Pending);
    assert!(h.scheduler.is_pending("0xabc"));

    let summary = h.scheduler.run_pass().await;
    assert_eq!(summary.refreshed, 1);
    assert_eq!(h.store.count_tokens("0xabc").unwrap(), 50);

    let second = h.cache.get_metadata("0xabc", "1").await.unwrap();
    let metadata = second.into_metadata().expect("token 1 should be stored");
    assert_eq!(metadata.collection_id, "0xabc");
    assert_eq!(metadata.traits.len(), 2);
    assert!(metadata.rarity_rank.is_some());

    // Fresh within the TTL: nothing queued again
    assert_eq!(h.scheduler.pending_len(), 0);
    assert_eq!(h.upstream.calls_for("overview/contract", "0xabc"), 1);
}

#[tokio::test]
async fn ranks_cover_the_whole_collection() {
    let h = harness(&[("0xabc", 250)]);

    h.scheduler.add_to_queue("0xabc");
    h.scheduler.run_pass().await;

    // Three offset pages
    assert_eq!(h.upstream.calls_for("by-contract", "0xabc"), 3);
    let mut ranks: Vec<u32> = (1..=250)
        .map(|id| {
            h.store
                .read_one("0xabc", &id.to_string())
                .unwrap()
                .unwrap()
                .rarity_rank
                .unwrap()
        })
        .collect();
    ranks.sort_unstable();
    assert_eq!(ranks, (1..=250).collect::<Vec<u32>>());
    assert_eq!(h.dispatcher.stats().failed, 0);
}

#[tokio::test]
async fn oversized_collection_is_never_downloaded() {
    let h = harness(&[("0xbig", 1_000_000)]);

    assert_eq!(
        h.cache.get_metadata("0xbig", "1").await.unwrap(),
        MetadataLookup::Pending
    );
    let summary = h.scheduler.run_pass().await;
    assert_eq!(summary.skipped, 1);
    assert!(h.scheduler.is_skipped("0xbig"));

    for _ in 0..3 {
        assert!(!h.scheduler.add_to_queue("0xbig"));
        assert_eq!(
            h.cache.get_metadata("0xbig", "1").await.unwrap(),
            MetadataLookup::Pending
        );
        h.scheduler.run_pass().await;
    }

    assert_eq!(h.upstream.calls_for("by-contract", "0xbig"), 0);
    assert_eq!(h.upstream.calls_for("overview/contract", "0xbig"), 1);
    assert!(!h.store.has_any("0xbig").unwrap());
}

#[tokio::test]
async fn missing_page_keeps_previous_refresh() {
    let h = harness(&[("0xabc", 250)]);
    h.scheduler.add_to_queue("0xabc");
    h.scheduler.run_pass().await;
    let before = h.store.read_last_updated("0xabc").unwrap();

    h.upstream.missing_pages.lock().push(200);
    h.scheduler.add_to_queue("0xabc");
    let summary = h.scheduler.run_pass().await;

    assert_eq!(summary.abandoned, 1);
    assert_eq!(summary.refreshed, 0);
    assert_eq!(h.store.count_tokens("0xabc").unwrap(), 250);
    assert!(h.store.read_one("0xabc", "250").unwrap().is_some());
    assert_eq!(h.store.read_last_updated("0xabc").unwrap(), before);
    assert!(h.scheduler.add_to_queue("0xabc"));
}

#[tokio::test]
async fn unknown_upstream_collection_stays_retryable() {
    let h = harness(&[]);

    h.cache.get_metadata("0xmissing", "1").await.unwrap();
    let summary = h.scheduler.run_pass().await;

    assert_eq!(summary.abandoned, 1);
    assert!(!h.scheduler.is_skipped("0xmissing"));
    assert!(h.scheduler.add_to_queue("0xmissing"));
}

#[cfg(feature = "web")]
#[tokio::test]
async fn http_surface_reports_pending_then_found() {
    use nftmeta::webserver::{self, AppState};
    use tokio::sync::Notify;

    let h = harness(&[("0xabc", 5)]);
    let cache = Arc::new(h.cache);
    let state = AppState::new(cache, Arc::clone(&h.scheduler), Arc::clone(&h.dispatcher));

    let listener = webserver::bind("127.0.0.1", 0).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Arc::new(Notify::new());
    let server = tokio::spawn(webserver::serve(listener, state, Arc::clone(&shutdown)));

    let client = reqwest::Client::new();
    let url = format!("http://{}/metadata/0xABC/1", addr);

    let pending = client.get(&url).send().await.unwrap();
    assert_eq!(pending.status().as_u16(), 202);

    h.scheduler.run_pass().await;

    let found = client.get(&url).send().await.unwrap();
    assert_eq!(found.status().as_u16(), 200);
    let body: serde_json::Value = found.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["metadata"]["token_id"], "1");
    assert_eq!(body["metadata"]["traits"][0]["type"], "Background");

    let absent = client
        .get(format!("http://{}/metadata/0xabc/999", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(absent.status().as_u16(), 404);

    let health: serde_json::Value = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["refresh"]["pending"], 0);

    drop(client);
    shutdown.notify_waiters();
    server.await.unwrap().unwrap();
}
