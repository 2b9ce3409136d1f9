/// Current schema version.
pub const SCHEMA_VERSION: &str = "1";

/// Full SQL schema for prmine's `SQLite` database.
///
/// Deletion policy is deliberately asymmetric: deleting an author severs
/// the link on dependent rows (history survives), while deleting a pull
/// request removes its files and join rows but leaves commits, reviews,
/// and review threads behind as orphans for audit.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS prmine_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS authors (
    id INTEGER PRIMARY KEY,
    login TEXT UNIQUE NOT NULL,
    name TEXT
);

-- id is the platform-assigned pull request number
CREATE TABLE IF NOT EXISTS pull_requests (
    id INTEGER PRIMARY KEY,
    author_id INTEGER REFERENCES authors(id) ON DELETE SET NULL,
    title TEXT NOT NULL,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    closed_at TEXT,
    merged_at TEXT,
    additions INTEGER NOT NULL,
    deletions INTEGER NOT NULL,
    author_association TEXT NOT NULL,
    head_repository_url TEXT,
    is_cross_repository INTEGER NOT NULL DEFAULT 0,
    merge_commit_ci_state TEXT,
    api_total_comments_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS commits (
    id INTEGER PRIMARY KEY,
    pull_request_id INTEGER REFERENCES pull_requests(id) ON DELETE SET NULL,
    url TEXT,
    committed_at TEXT NOT NULL,
    UNIQUE(pull_request_id, url)
);

CREATE TABLE IF NOT EXISTS reviews (
    id INTEGER PRIMARY KEY,
    author_id INTEGER REFERENCES authors(id) ON DELETE SET NULL,
    pull_request_id INTEGER REFERENCES pull_requests(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS review_threads (
    id INTEGER PRIMARY KEY,
    node_id TEXT UNIQUE NOT NULL,
    pull_request_id INTEGER REFERENCES pull_requests(id) ON DELETE SET NULL
);

-- A comment has exactly one parent at creation, but the links are merged
-- additively across partial syncs, so all three columns coexist.
CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY,
    author_id INTEGER REFERENCES authors(id) ON DELETE SET NULL,
    pull_request_id INTEGER REFERENCES pull_requests(id) ON DELETE SET NULL,
    review_id INTEGER REFERENCES reviews(id) ON DELETE SET NULL,
    review_thread_id INTEGER REFERENCES review_threads(id) ON DELETE SET NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY,
    pull_request_id INTEGER REFERENCES pull_requests(id) ON DELETE CASCADE,
    path TEXT NOT NULL,
    change_type TEXT,
    additions INTEGER,
    deletions INTEGER,
    UNIQUE(pull_request_id, path)
);

-- Participant join table
CREATE TABLE IF NOT EXISTS author_pull_request (
    author_id INTEGER REFERENCES authors(id) ON DELETE CASCADE,
    pull_request_id INTEGER REFERENCES pull_requests(id) ON DELETE CASCADE,
    UNIQUE(author_id, pull_request_id)
);

CREATE TABLE IF NOT EXISTS labels (
    id INTEGER PRIMARY KEY,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS label_pull_request (
    label_id INTEGER REFERENCES labels(id) ON DELETE CASCADE,
    pull_request_id INTEGER REFERENCES pull_requests(id) ON DELETE CASCADE,
    UNIQUE(label_id, pull_request_id)
);

CREATE INDEX IF NOT EXISTS idx_comments_pr ON comments(pull_request_id);
CREATE INDEX IF NOT EXISTS idx_comments_review ON comments(review_id);
CREATE INDEX IF NOT EXISTS idx_reviews_pr ON reviews(pull_request_id);
CREATE INDEX IF NOT EXISTS idx_commits_pr ON commits(pull_request_id);
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_executes_on_in_memory_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        for table in [
            "authors",
            "pull_requests",
            "commits",
            "reviews",
            "review_threads",
            "comments",
            "files",
            "author_pull_request",
            "labels",
            "label_pull_request",
            "prmine_meta",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
    }

    #[test]
    fn schema_version_is_set() {
        assert_eq!(SCHEMA_VERSION, "1");
    }
}
