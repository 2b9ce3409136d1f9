//! Builds one page request of the pull-request feed.

use serde_json::{Value, json};

use crate::config::PrMineConfig;

/// GraphQL document fetching one page of pull requests with their nested
/// activity, plus rate-limit metadata. Entities beyond `$entitiesLimit`
/// per pull request are not paginated further; the nested collections
/// are deliberately bounded.
pub const PULL_REQUEST_PAGE_QUERY: &str = r"
query (
    $owner: String!
    $name: String!
    $labels: [String!]
    $prsLimit: Int!
    $entitiesLimit: Int!
    $after: String
) {
    rateLimit {
        cost
        limit
        remaining
        used
        resetAt
    }
    repository(owner: $owner, name: $name) {
        pullRequests(
            labels: $labels
            first: $prsLimit
            after: $after
            orderBy: {field: CREATED_AT, direction: ASC}
        ) {
            nodes {
                number
                author { login }
                title
                state
                createdAt
                closedAt
                mergedAt
                additions
                deletions
                commits(first: $entitiesLimit) {
                    nodes { commit { commitUrl committedDate } }
                }
                comments(first: $entitiesLimit) {
                    nodes { fullDatabaseId author { login } createdAt }
                }
                reviews(first: $entitiesLimit) {
                    nodes {
                        fullDatabaseId
                        author { login }
                        createdAt
                        comments(first: $entitiesLimit) {
                            nodes { fullDatabaseId author { login } createdAt }
                        }
                    }
                }
                reviewThreads(first: $entitiesLimit) {
                    nodes {
                        id
                        comments(first: $entitiesLimit) {
                            nodes { fullDatabaseId author { login } createdAt }
                        }
                    }
                }
                changedFiles
                files(first: $entitiesLimit) {
                    nodes { path changeType additions deletions }
                }
                participants(first: $entitiesLimit) {
                    nodes { login name }
                }
                authorAssociation
                headRepository { url }
                isCrossRepository
                labels(first: $entitiesLimit) {
                    nodes { name }
                }
                mergeCommit { statusCheckRollup { state } }
                totalCommentsCount
            }
            pageInfo {
                startCursor
                endCursor
                hasNextPage
                hasPreviousPage
            }
        }
    }
}
";

/// Request factory bound to one repository and label filter.
#[derive(Debug, Clone)]
pub struct PageQuery {
    owner: String,
    name: String,
    label: String,
    prs_per_page: u32,
    related_per_page: u32,
}

impl PageQuery {
    pub fn from_config(config: &PrMineConfig) -> Self {
        Self {
            owner: config.repository.owner.clone(),
            name: config.repository.name.clone(),
            label: config.repository.label.clone(),
            prs_per_page: config.sync.prs_per_page,
            related_per_page: config.sync.related_per_page,
        }
    }

    /// Build the request body for the page after `after` (`None` = first page).
    pub fn request(&self, after: Option<&str>) -> Value {
        json!({
            "query": PULL_REQUEST_PAGE_QUERY,
            "variables": {
                "owner": self.owner,
                "name": self.name,
                "labels": [self.label],
                "prsLimit": self.prs_per_page,
                "entitiesLimit": self.related_per_page,
                "after": after,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> PageQuery {
        PageQuery::from_config(&PrMineConfig::default())
    }

    #[test]
    fn first_page_has_null_cursor() {
        let body = query().request(None);
        assert!(body["variables"]["after"].is_null());
        assert_eq!(body["variables"]["owner"], "llvm");
        assert_eq!(body["variables"]["labels"][0], "clang");
        assert_eq!(body["variables"]["prsLimit"], 10);
        assert_eq!(body["variables"]["entitiesLimit"], 5);
    }

    #[test]
    fn subsequent_page_carries_cursor() {
        let body = query().request(Some("Y3Vyc29yOjEw"));
        assert_eq!(body["variables"]["after"], "Y3Vyc29yOjEw");
    }

    #[test]
    fn document_requests_rate_limit_metadata() {
        let body = query().request(None);
        let doc = body["query"].as_str().unwrap();
        assert!(doc.contains("rateLimit"));
        assert!(doc.contains("cost"));
        assert!(doc.contains("resetAt"));
        assert!(doc.contains("pageInfo"));
    }
}
