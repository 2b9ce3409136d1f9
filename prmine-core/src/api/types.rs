//! Deserialized shapes of one page of the pull-request feed.
//!
//! Nested connections and actor objects are nullable in the upstream
//! schema; absent data decodes to empty collections or `None`, never to
//! an error. Deletion-orphaned authors arrive as `null` actors.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ApiError;

/// One decoded page: rate-limit metadata plus the pull-request batch.
#[derive(Debug)]
pub struct SyncPage {
    pub rate_limit: RateLimitInfo,
    pub pull_requests: Vec<PullRequestNode>,
    pub page_info: PageInfo,
}

impl SyncPage {
    /// Decode the `data` object of a GraphQL response.
    ///
    /// A response missing `rateLimit` or `repository.pullRequests` is
    /// malformed and fatal; there is no partial-page recovery.
    pub fn from_response(data: &Value) -> Result<Self, ApiError> {
        let rate_limit = data
            .get("rateLimit")
            .cloned()
            .ok_or_else(|| ApiError::Malformed("response has no rateLimit field".to_string()))?;
        let pull_requests = data
            .pointer("/repository/pullRequests")
            .cloned()
            .ok_or_else(|| {
                ApiError::Malformed("response has no repository.pullRequests field".to_string())
            })?;

        let rate_limit: RateLimitInfo = serde_json::from_value(rate_limit)
            .map_err(|e| ApiError::Malformed(format!("rateLimit: {e}")))?;
        let connection: PullRequestConnection = serde_json::from_value(pull_requests)
            .map_err(|e| ApiError::Malformed(format!("pullRequests: {e}")))?;

        Ok(Self {
            rate_limit,
            pull_requests: connection.nodes,
            page_info: connection.page_info,
        })
    }
}

/// Rate-limit metadata reported alongside every response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub cost: u32,
    pub limit: u32,
    pub remaining: u32,
    pub used: Option<u32>,
    pub reset_at: String,
}

/// Forward-pagination cursor state.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestConnection {
    #[serde(default, deserialize_with = "null_default")]
    nodes: Vec<PullRequestNode>,
    page_info: PageInfo,
}

/// A generic connection: we only ever request the `nodes` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Connection<T> {
    #[serde(default, deserialize_with = "null_default")]
    pub nodes: Vec<T>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub number: i64,
    pub author: Option<AuthorNode>,
    pub title: String,
    pub state: String,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub merged_at: Option<String>,
    pub additions: i64,
    pub deletions: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub commits: Connection<CommitNode>,
    #[serde(default, deserialize_with = "null_default")]
    pub comments: Connection<CommentNode>,
    #[serde(default, deserialize_with = "null_default")]
    pub reviews: Connection<ReviewNode>,
    #[serde(default, deserialize_with = "null_default")]
    pub review_threads: Connection<ReviewThreadNode>,
    #[serde(default, deserialize_with = "null_default")]
    pub files: Connection<FileNode>,
    #[serde(default, deserialize_with = "null_default")]
    pub participants: Connection<AuthorNode>,
    pub author_association: String,
    pub head_repository: Option<HeadRepository>,
    #[serde(default)]
    pub is_cross_repository: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub labels: Connection<LabelNode>,
    pub merge_commit: Option<MergeCommit>,
    #[serde(default)]
    pub total_comments_count: i64,
}

/// An actor reference. `name` is only requested for participants.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorNode {
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub commit: Option<CommitInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub commit_url: Option<String>,
    pub committed_date: Option<String>,
}

/// `fullDatabaseId` is a numeric string in the wire format and nullable;
/// records without one are skipped by the store.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub full_database_id: Option<String>,
    pub author: Option<AuthorNode>,
    pub created_at: String,
}

impl CommentNode {
    /// Platform-assigned id, if present and numeric.
    pub fn database_id(&self) -> Option<i64> {
        self.full_database_id.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewNode {
    pub full_database_id: Option<String>,
    pub author: Option<AuthorNode>,
    pub created_at: String,
    #[serde(default, deserialize_with = "null_default")]
    pub comments: Connection<CommentNode>,
}

impl ReviewNode {
    /// Platform-assigned id, if present and numeric.
    pub fn database_id(&self) -> Option<i64> {
        self.full_database_id.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewThreadNode {
    pub id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub comments: Connection<CommentNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub path: String,
    pub change_type: Option<String>,
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelNode {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadRepository {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCommit {
    pub status_check_rollup: Option<StatusCheckRollup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusCheckRollup {
    pub state: Option<String>,
}

/// Decode `null` as the type's default. Plain `#[serde(default)]` only
/// covers a missing key, not an explicit JSON null.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
