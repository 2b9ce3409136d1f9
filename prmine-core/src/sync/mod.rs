//! The sync engine: a strictly forward, single-pass pagination driver.
//!
//! One page per iteration, gated by the [`RateGovernor`]. Each page is
//! decomposed into entity records and persisted through the store's
//! upsert layer; authors and labels are always ensured before any row
//! referencing them. There is no restart on abort; a later run
//! re-fetches from page one and relies on upsert idempotence.

pub mod rate;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::api::types::PullRequestNode;
use crate::api::{PageQuery, SyncPage, Transport};
use crate::config::PrMineConfig;
use crate::error::ApiError;
use crate::progress::ProgressReporter;
use crate::store::SqliteStore;

pub use rate::RateGovernor;

/// Statistics returned by a completed sync run.
#[derive(Debug, Default)]
pub struct SyncStats {
    pub pages: u64,
    pub pull_requests: u64,
    pub duration: Duration,
}

/// Walks the pull-request feed end to end and persists every page.
pub struct SyncEngine<'a> {
    store: &'a SqliteStore,
    transport: &'a dyn Transport,
    query: PageQuery,
    governor: RateGovernor,
    tokens: &'a [String],
    token_idx: usize,
    page_delay: Duration,
}

impl std::fmt::Debug for SyncEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("token_idx", &self.token_idx)
            .field("credentials", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

impl<'a> SyncEngine<'a> {
    pub fn new(
        store: &'a SqliteStore,
        transport: &'a dyn Transport,
        config: &'a PrMineConfig,
    ) -> Self {
        Self {
            store,
            transport,
            query: PageQuery::from_config(config),
            governor: RateGovernor::new(config.sync.cost_per_minute),
            tokens: &config.auth.tokens,
            token_idx: 0,
            page_delay: Duration::from_millis(config.sync.page_delay_ms),
        }
    }

    /// Follow the cursor until exhausted.
    ///
    /// Fatal errors (malformed response, non-auth transport failure,
    /// exhausted credential pool) propagate immediately; the store
    /// keeps whatever pages were already committed.
    pub async fn run(&mut self, progress: &dyn ProgressReporter) -> crate::error::Result<SyncStats> {
        let start = std::time::Instant::now();
        let mut stats = SyncStats::default();
        let mut cursor: Option<String> = None;

        info!("sync starting");
        progress.start("Syncing");

        loop {
            self.governor.admit().await;

            let page = self.fetch_page(cursor.as_deref()).await?;
            self.governor.record(page.rate_limit.cost);

            let fetched = page.pull_requests.len() as u64;
            self.persist_page(&page.pull_requests)?;
            stats.pages += 1;
            stats.pull_requests += fetched;
            progress.advance(fetched);
            debug!(
                pages = stats.pages,
                pull_requests = stats.pull_requests,
                cost_spent = self.governor.spent(),
                remaining = page.rate_limit.remaining,
                "page persisted"
            );

            match page.page_info.end_cursor {
                Some(next) if page.page_info.has_next_page => cursor = Some(next),
                _ => break,
            }
            tokio::time::sleep(self.page_delay).await;
        }

        progress.finish();
        stats.duration = start.elapsed();
        info!(
            pages = stats.pages,
            pull_requests = stats.pull_requests,
            duration = ?stats.duration,
            "sync complete"
        );
        Ok(stats)
    }

    /// Fetch one page, rotating credentials on authorization-class
    /// failures. The same page is retried with each new credential; any
    /// other failure is fatal.
    async fn fetch_page(&mut self, after: Option<&str>) -> crate::error::Result<SyncPage> {
        let request = self.query.request(after);
        loop {
            let Some(token) = self.tokens.get(self.token_idx) else {
                return Err(ApiError::CredentialsExhausted.into());
            };
            match self.transport.execute(&request, token).await {
                Ok(data) => return Ok(SyncPage::from_response(&data)?),
                Err(err @ (ApiError::RateLimited(_) | ApiError::Unauthorized(_))) => {
                    warn!(
                        error = %err,
                        credential = self.token_idx,
                        "credential rejected, rotating to next in pool"
                    );
                    self.token_idx += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Decompose one page into entity records.
    ///
    /// Order matters: the pull request row (and its author) first, then
    /// every nested collection keyed by it.
    fn persist_page(&self, pull_requests: &[PullRequestNode]) -> crate::error::Result<()> {
        for pr in pull_requests {
            let pr_id = self.store.save_pull_request(pr)?;
            self.store.save_commits(&pr.commits.nodes, pr_id)?;
            self.store
                .save_comments(&pr.comments.nodes, Some(pr_id), None, None)?;
            self.store.save_reviews(&pr.reviews.nodes, pr_id)?;
            self.store
                .save_review_threads(&pr.review_threads.nodes, pr_id)?;
            self.store.save_files(&pr.files.nodes, pr_id)?;
            self.store
                .save_participants(&pr.participants.nodes, pr_id)?;
            self.store.link_labels(&pr.labels.nodes, pr_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::{Value, json};

    use super::*;
    use crate::error::PrMineError;
    use crate::progress::NoopReporter;

    /// Scripted transport: pops one response per call, records the
    /// credential and request used.
    struct FakeTransport {
        responses: Mutex<VecDeque<Result<Value, ApiError>>>,
        tokens_seen: Mutex<Vec<String>>,
        requests_seen: Mutex<Vec<Value>>,
    }

    impl FakeTransport {
        fn new(responses: Vec<Result<Value, ApiError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                tokens_seen: Mutex::new(Vec::new()),
                requests_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: &Value, token: &str) -> Result<Value, ApiError> {
            self.tokens_seen.lock().unwrap().push(token.to_string());
            self.requests_seen.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::Transport("script exhausted".to_string())))
        }
    }

    fn config_with_tokens(tokens: &[&str]) -> PrMineConfig {
        let mut config = PrMineConfig::default();
        config.auth.tokens = tokens.iter().map(ToString::to_string).collect();
        config.sync.page_delay_ms = 0;
        config
    }

    fn page_data(prs: Value, cursor: Option<&str>, has_next: bool, cost: u32) -> Value {
        json!({
            "rateLimit": {
                "cost": cost, "limit": 5000, "remaining": 4000, "used": 1000,
                "resetAt": "2024-01-01T00:01:00Z"
            },
            "repository": {
                "pullRequests": {
                    "nodes": prs,
                    "pageInfo": {"endCursor": cursor, "hasNextPage": has_next}
                }
            }
        })
    }

    /// One pull request with 2 commits, 1 comment by alice, 1 review by
    /// bob carrying 1 nested comment, 1 file, and the "clang" label.
    fn single_pr() -> Value {
        json!([{
            "number": 1001,
            "author": {"login": "alice"},
            "title": "Teach the driver a new flag",
            "state": "MERGED",
            "createdAt": "2024-01-01T00:00:00Z",
            "closedAt": "2024-01-02T00:00:00Z",
            "mergedAt": "2024-01-02T00:00:00Z",
            "additions": 40,
            "deletions": 5,
            "commits": {"nodes": [
                {"commit": {"commitUrl": "https://x/c1", "committedDate": "2024-01-01T01:00:00Z"}},
                {"commit": {"commitUrl": "https://x/c2", "committedDate": "2024-01-01T02:00:00Z"}}
            ]},
            "comments": {"nodes": [
                {"fullDatabaseId": "501", "author": {"login": "alice"}, "createdAt": "2024-01-01T03:00:00Z"}
            ]},
            "reviews": {"nodes": [{
                "fullDatabaseId": "601",
                "author": {"login": "bob"},
                "createdAt": "2024-01-01T04:00:00Z",
                "comments": {"nodes": [
                    {"fullDatabaseId": "502", "author": {"login": "bob"}, "createdAt": "2024-01-01T05:00:00Z"}
                ]}
            }]},
            "reviewThreads": {"nodes": []},
            "files": {"nodes": [
                {"path": "clang/lib/Driver/Driver.cpp", "changeType": "MODIFIED", "additions": 40, "deletions": 5}
            ]},
            "participants": {"nodes": []},
            "authorAssociation": "MEMBER",
            "headRepository": {"url": "https://github.com/alice/llvm-project"},
            "isCrossRepository": true,
            "labels": {"nodes": [{"name": "clang"}]},
            "mergeCommit": {"statusCheckRollup": {"state": "SUCCESS"}},
            "totalCommentsCount": 2
        }])
    }

    #[tokio::test]
    async fn single_page_end_to_end() {
        let store = SqliteStore::in_memory().unwrap();
        let transport = FakeTransport::new(vec![Ok(page_data(single_pr(), None, false, 7))]);
        let config = config_with_tokens(&[""]);
        let mut engine = SyncEngine::new(&store, &transport, &config);

        let stats = engine.run(&NoopReporter).await.unwrap();
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.pull_requests, 1);

        let counts = store.stats().unwrap();
        assert_eq!(counts.pull_requests, 1);
        assert_eq!(counts.authors, 2); // alice, bob
        assert_eq!(counts.commits, 2);
        assert_eq!(counts.comments, 2); // PR comment + review comment
        assert_eq!(counts.reviews, 1);
        assert_eq!(counts.files, 1);
        assert_eq!(counts.labels, 1);
        assert_eq!(counts.label_links, 1);
    }

    #[tokio::test]
    async fn resync_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();
        let config = config_with_tokens(&[""]);

        for _ in 0..2 {
            let transport = FakeTransport::new(vec![Ok(page_data(single_pr(), None, false, 7))]);
            let mut engine = SyncEngine::new(&store, &transport, &config);
            engine.run(&NoopReporter).await.unwrap();
        }

        let counts = store.stats().unwrap();
        assert_eq!(counts.pull_requests, 1);
        assert_eq!(counts.authors, 2);
        assert_eq!(counts.commits, 2);
        assert_eq!(counts.comments, 2);
        assert_eq!(counts.reviews, 1);
        assert_eq!(counts.files, 1);
        assert_eq!(counts.label_links, 1);
    }

    #[tokio::test]
    async fn follows_cursor_across_pages() {
        let store = SqliteStore::in_memory().unwrap();
        let transport = FakeTransport::new(vec![
            Ok(page_data(json!([]), Some("CUR1"), true, 2)),
            Ok(page_data(single_pr(), None, false, 2)),
        ]);
        let config = config_with_tokens(&[""]);
        let mut engine = SyncEngine::new(&store, &transport, &config);

        let stats = engine.run(&NoopReporter).await.unwrap();
        assert_eq!(stats.pages, 2);

        let requests = transport.requests_seen.lock().unwrap();
        assert!(requests[0]["variables"]["after"].is_null());
        assert_eq!(requests[1]["variables"]["after"], "CUR1");
    }

    #[tokio::test]
    async fn rotates_credentials_on_authorization_failure() {
        let store = SqliteStore::in_memory().unwrap();
        let transport = FakeTransport::new(vec![
            Err(ApiError::Unauthorized("bad credentials".to_string())),
            Ok(page_data(json!([]), None, false, 1)),
        ]);
        let config = config_with_tokens(&["token-one", "token-two"]);
        let mut engine = SyncEngine::new(&store, &transport, &config);

        engine.run(&NoopReporter).await.unwrap();

        let tokens = transport.tokens_seen.lock().unwrap();
        assert_eq!(tokens.as_slice(), ["token-one", "token-two"]);
    }

    #[tokio::test]
    async fn exhausted_pool_is_fatal() {
        let store = SqliteStore::in_memory().unwrap();
        let transport = FakeTransport::new(vec![
            Err(ApiError::Unauthorized("bad credentials".to_string())),
            Err(ApiError::RateLimited("rate limit exceeded".to_string())),
        ]);
        let config = config_with_tokens(&["token-one", "token-two"]);
        let mut engine = SyncEngine::new(&store, &transport, &config);

        let err = engine.run(&NoopReporter).await.unwrap_err();
        assert!(matches!(
            err,
            PrMineError::Api(ApiError::CredentialsExhausted)
        ));
    }

    #[tokio::test]
    async fn other_transport_errors_are_fatal_without_retry() {
        let store = SqliteStore::in_memory().unwrap();
        let transport = FakeTransport::new(vec![Err(ApiError::Transport(
            "connection reset".to_string(),
        ))]);
        let config = config_with_tokens(&["token-one", "token-two"]);
        let mut engine = SyncEngine::new(&store, &transport, &config);

        let err = engine.run(&NoopReporter).await.unwrap_err();
        assert!(matches!(err, PrMineError::Api(ApiError::Transport(_))));
        // No rotation happened
        assert_eq!(transport.tokens_seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn malformed_page_is_fatal() {
        let store = SqliteStore::in_memory().unwrap();
        let transport = FakeTransport::new(vec![Ok(json!({"message": "unexpected"}))]);
        let config = config_with_tokens(&[""]);
        let mut engine = SyncEngine::new(&store, &transport, &config);

        let err = engine.run(&NoopReporter).await.unwrap_err();
        assert!(matches!(err, PrMineError::Api(ApiError::Malformed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn governor_blocks_next_page_when_budget_spent() {
        let store = SqliteStore::in_memory().unwrap();
        // Each page costs the whole budget, so page two must wait a window
        let mut config = config_with_tokens(&[""]);
        config.sync.cost_per_minute = 10;
        let transport = FakeTransport::new(vec![
            Ok(page_data(json!([]), Some("CUR1"), true, 10)),
            Ok(page_data(json!([]), None, false, 10)),
        ]);
        let mut engine = SyncEngine::new(&store, &transport, &config);

        let before = tokio::time::Instant::now();
        engine.run(&NoopReporter).await.unwrap();
        // The cooldown dominates; the run cannot finish inside the window
        assert!(before.elapsed() >= Duration::from_secs(59));
    }
}
