//! `SqliteStore`: one exclusive connection plus the per-entity upsert layer.
//!
//! Merge rules differ by entity and all three are load-bearing:
//!
//! - authors enrich monotonically (`name` never regresses to null),
//! - pull requests are fully overwritten on re-sync,
//! - comments merge their parent links additively (`coalesce`),
//! - everything else is append-only (conflict = no-op).
//!
//! Every save commits as soon as its logical unit completes; there is no
//! cross-page transaction. A crash mid-page is repaired by a later run
//! through the same idempotent upserts.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::api::types::{
    AuthorNode, CommentNode, CommitNode, FileNode, LabelNode, PullRequestNode, ReviewNode,
    ReviewThreadNode,
};
use crate::error::StoreError;

use super::schema;

/// Row counts per table, for end-of-run reporting.
#[derive(Debug, Default, Clone, Copy)]
pub struct StoreStats {
    pub authors: u64,
    pub pull_requests: u64,
    pub commits: u64,
    pub reviews: u64,
    pub review_threads: u64,
    pub comments: u64,
    pub files: u64,
    pub participants: u64,
    pub labels: u64,
    pub label_links: u64,
}

/// SQLite-backed activity store.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path. Idempotent: the schema
    /// is applied with `CREATE TABLE IF NOT EXISTS`.
    pub fn open(path: &Path) -> crate::error::Result<Self> {
        let conn = Connection::open(path).map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> crate::error::Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Path of the backing file, if any.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> crate::error::Result<()> {
        let conn = self.conn.lock().expect("prmine store mutex poisoned");

        // Foreign keys are off by default per connection; the deletion
        // policy depends on them.
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(StoreError::Sqlite)?;

        // Try WAL mode; silently ignored for in-memory
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(StoreError::Sqlite)?;

        conn.execute(
            "INSERT OR IGNORE INTO prmine_meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION],
        )
        .map_err(StoreError::Sqlite)?;

        Ok(())
    }

    // ── Authors ─────────────────────────────────────────────────────

    /// Insert an author; on conflict, update `name` only when the
    /// incoming value is non-null. Existing data never regresses to null.
    pub fn save_author(&self, login: &str, name: Option<&str>) -> crate::error::Result<()> {
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        Self::save_author_on(&conn, login, name).map_err(StoreError::Sqlite)?;
        Ok(())
    }

    /// Batch form of [`save_author`](Self::save_author). Empty input is a no-op.
    pub fn save_authors(&self, authors: &[AuthorNode]) -> crate::error::Result<()> {
        if authors.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for author in authors {
            Self::save_author_on(&tx, &author.login, author.name.as_deref())
                .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    /// Natural-key lookup of an author's surrogate id.
    pub fn author_id_by_login(&self, login: &str) -> crate::error::Result<Option<i64>> {
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        conn.query_row(
            "SELECT id FROM authors WHERE login = ?1",
            params![login],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::Sqlite)
        .map_err(Into::into)
    }

    /// Insert-if-absent, then resolve the surrogate id by natural key.
    pub fn ensure_author(&self, login: &str) -> crate::error::Result<i64> {
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        match Self::ensure_author_on(&conn, login, None) {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(StoreError::RowNotFound(format!("author {login}")).into())
            }
            Err(e) => Err(StoreError::Sqlite(e).into()),
        }
    }

    fn save_author_on(conn: &Connection, login: &str, name: Option<&str>) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO authors (login, name) VALUES (?1, ?2)
             ON CONFLICT(login) DO UPDATE SET name = excluded.name
             WHERE excluded.name IS NOT NULL",
            params![login, name],
        )?;
        Ok(())
    }

    /// Insert-then-lookup: the upsert does not return the surrogate id on
    /// the conflict path, so the id is always re-read by natural key.
    fn ensure_author_on(conn: &Connection, login: &str, name: Option<&str>) -> rusqlite::Result<i64> {
        Self::save_author_on(conn, login, name)?;
        conn.query_row(
            "SELECT id FROM authors WHERE login = ?1",
            params![login],
            |row| row.get(0),
        )
    }

    // ── Pull requests ───────────────────────────────────────────────

    /// Insert or fully overwrite a pull request (last write wins).
    ///
    /// The only mutable entity: re-syncing reconciles every column with
    /// the incoming value. Returns the pull request's id (its number).
    pub fn save_pull_request(&self, pr: &PullRequestNode) -> crate::error::Result<i64> {
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;

        let author_id = match &pr.author {
            Some(author) => Some(
                Self::ensure_author_on(&tx, &author.login, author.name.as_deref())
                    .map_err(StoreError::Sqlite)?,
            ),
            None => None,
        };

        let head_repository_url = pr.head_repository.as_ref().and_then(|r| r.url.clone());
        let merge_commit_ci_state = pr
            .merge_commit
            .as_ref()
            .and_then(|m| m.status_check_rollup.as_ref())
            .and_then(|s| s.state.clone());

        tx.execute(
            "INSERT INTO pull_requests (
                id, author_id, title, state, created_at, closed_at, merged_at,
                additions, deletions, author_association, head_repository_url,
                is_cross_repository, merge_commit_ci_state, api_total_comments_count
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                author_id = excluded.author_id,
                title = excluded.title,
                state = excluded.state,
                created_at = excluded.created_at,
                closed_at = excluded.closed_at,
                merged_at = excluded.merged_at,
                additions = excluded.additions,
                deletions = excluded.deletions,
                author_association = excluded.author_association,
                head_repository_url = excluded.head_repository_url,
                is_cross_repository = excluded.is_cross_repository,
                merge_commit_ci_state = excluded.merge_commit_ci_state,
                api_total_comments_count = excluded.api_total_comments_count",
            params![
                pr.number,
                author_id,
                pr.title,
                pr.state,
                pr.created_at,
                pr.closed_at,
                pr.merged_at,
                pr.additions,
                pr.deletions,
                pr.author_association,
                head_repository_url,
                i64::from(pr.is_cross_repository),
                merge_commit_ci_state,
                pr.total_comments_count,
            ],
        )
        .map_err(StoreError::Sqlite)?;

        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(pr.number)
    }

    // ── Commits ─────────────────────────────────────────────────────

    /// Append-only: a conflicting `(pull_request_id, url)` pair is a no-op.
    pub fn save_commits(
        &self,
        commits: &[CommitNode],
        pull_request_id: i64,
    ) -> crate::error::Result<()> {
        if commits.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for node in commits {
            let Some(commit) = &node.commit else {
                continue;
            };
            let Some(committed_at) = &commit.committed_date else {
                debug!(pull_request_id, "commit without committedDate, skipping");
                continue;
            };
            tx.execute(
                "INSERT INTO commits (pull_request_id, url, committed_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(pull_request_id, url) DO NOTHING",
                params![pull_request_id, commit.commit_url, committed_at],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    // ── Comments ────────────────────────────────────────────────────

    /// Insert comments under at most one parent per call; on conflict,
    /// merge each parent-link column independently: keep the existing
    /// value when the incoming one is null, take the incoming one
    /// otherwise. A link can be added by a later sync but never erased.
    pub fn save_comments(
        &self,
        comments: &[CommentNode],
        pull_request_id: Option<i64>,
        review_id: Option<i64>,
        review_thread_id: Option<i64>,
    ) -> crate::error::Result<()> {
        if comments.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        Self::save_comments_on(&tx, comments, pull_request_id, review_id, review_thread_id)
            .map_err(StoreError::Sqlite)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    fn save_comments_on(
        conn: &Connection,
        comments: &[CommentNode],
        pull_request_id: Option<i64>,
        review_id: Option<i64>,
        review_thread_id: Option<i64>,
    ) -> rusqlite::Result<()> {
        for comment in comments {
            let Some(id) = comment.database_id() else {
                debug!("comment without fullDatabaseId, skipping");
                continue;
            };
            let author_id = match &comment.author {
                Some(author) => Some(Self::ensure_author_on(conn, &author.login, None)?),
                None => None,
            };
            conn.execute(
                "INSERT INTO comments (
                    id, author_id, pull_request_id, review_id, review_thread_id, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                    pull_request_id  = coalesce(excluded.pull_request_id,  comments.pull_request_id),
                    review_id        = coalesce(excluded.review_id,        comments.review_id),
                    review_thread_id = coalesce(excluded.review_thread_id, comments.review_thread_id)",
                params![
                    id,
                    author_id,
                    pull_request_id,
                    review_id,
                    review_thread_id,
                    comment.created_at,
                ],
            )?;
        }
        Ok(())
    }

    // ── Reviews ─────────────────────────────────────────────────────

    /// Append-only reviews; nested comments are saved under the review.
    pub fn save_reviews(
        &self,
        reviews: &[ReviewNode],
        pull_request_id: i64,
    ) -> crate::error::Result<()> {
        if reviews.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for review in reviews {
            let Some(review_id) = review.database_id() else {
                debug!(pull_request_id, "review without fullDatabaseId, skipping");
                continue;
            };
            let author_id = match &review.author {
                Some(author) => Some(
                    Self::ensure_author_on(&tx, &author.login, None).map_err(StoreError::Sqlite)?,
                ),
                None => None,
            };
            tx.execute(
                "INSERT INTO reviews (id, author_id, pull_request_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO NOTHING",
                params![review_id, author_id, pull_request_id, review.created_at],
            )
            .map_err(StoreError::Sqlite)?;

            Self::save_comments_on(&tx, &review.comments.nodes, None, Some(review_id), None)
                .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    // ── Review threads ──────────────────────────────────────────────

    /// Upsert-stable: a conflict rewrites the same key, a no-op in
    /// effect. Returns the surrogate id on both paths; callers depend
    /// on receiving an id even when the thread already existed.
    pub fn save_review_thread(
        &self,
        node_id: &str,
        pull_request_id: i64,
    ) -> crate::error::Result<i64> {
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let id = Self::save_review_thread_on(&conn, node_id, pull_request_id)
            .map_err(StoreError::Sqlite)?;
        Ok(id)
    }

    /// Save threads with their nested comments.
    pub fn save_review_threads(
        &self,
        threads: &[ReviewThreadNode],
        pull_request_id: i64,
    ) -> crate::error::Result<()> {
        if threads.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for thread in threads {
            let thread_id = Self::save_review_thread_on(&tx, &thread.id, pull_request_id)
                .map_err(StoreError::Sqlite)?;
            Self::save_comments_on(&tx, &thread.comments.nodes, None, None, Some(thread_id))
                .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    fn save_review_thread_on(
        conn: &Connection,
        node_id: &str,
        pull_request_id: i64,
    ) -> rusqlite::Result<i64> {
        conn.query_row(
            "INSERT INTO review_threads (node_id, pull_request_id)
             VALUES (?1, ?2)
             ON CONFLICT(node_id) DO UPDATE SET node_id = excluded.node_id
             RETURNING id",
            params![node_id, pull_request_id],
            |row| row.get(0),
        )
    }

    // ── Files ───────────────────────────────────────────────────────

    /// Append-only: a conflicting `(pull_request_id, path)` pair is a no-op.
    pub fn save_files(&self, files: &[FileNode], pull_request_id: i64) -> crate::error::Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for file in files {
            tx.execute(
                "INSERT INTO files (pull_request_id, path, change_type, additions, deletions)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(pull_request_id, path) DO NOTHING",
                params![
                    pull_request_id,
                    file.path,
                    file.change_type,
                    file.additions,
                    file.deletions,
                ],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    // ── Participants ────────────────────────────────────────────────

    /// Ensure every participant exists as an author, then append the
    /// join rows. Participants carry the optional display name, so this
    /// is where author enrichment usually happens.
    pub fn save_participants(
        &self,
        participants: &[AuthorNode],
        pull_request_id: i64,
    ) -> crate::error::Result<()> {
        if participants.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for participant in participants {
            let author_id =
                Self::ensure_author_on(&tx, &participant.login, participant.name.as_deref())
                    .map_err(StoreError::Sqlite)?;
            tx.execute(
                "INSERT INTO author_pull_request (author_id, pull_request_id)
                 VALUES (?1, ?2)
                 ON CONFLICT(author_id, pull_request_id) DO NOTHING",
                params![author_id, pull_request_id],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    // ── Labels ──────────────────────────────────────────────────────

    /// Append-only label catalogue.
    pub fn save_labels(&self, labels: &[LabelNode]) -> crate::error::Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for label in labels {
            Self::save_label_on(&tx, &label.name).map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    /// Natural-key lookup of a label's surrogate id.
    pub fn label_id_by_name(&self, name: &str) -> crate::error::Result<Option<i64>> {
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        conn.query_row(
            "SELECT id FROM labels WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::Sqlite)
        .map_err(Into::into)
    }

    /// Ensure the labels exist, then append the join rows.
    pub fn link_labels(
        &self,
        labels: &[LabelNode],
        pull_request_id: i64,
    ) -> crate::error::Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let tx = conn.unchecked_transaction().map_err(StoreError::Sqlite)?;
        for label in labels {
            Self::save_label_on(&tx, &label.name).map_err(StoreError::Sqlite)?;
            let label_id: i64 = tx
                .query_row(
                    "SELECT id FROM labels WHERE name = ?1",
                    params![label.name],
                    |row| row.get(0),
                )
                .map_err(StoreError::Sqlite)?;
            tx.execute(
                "INSERT INTO label_pull_request (label_id, pull_request_id)
                 VALUES (?1, ?2)
                 ON CONFLICT(label_id, pull_request_id) DO NOTHING",
                params![label_id, pull_request_id],
            )
            .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    // ── Reporting ───────────────────────────────────────────────────

    /// Current row counts across every table.
    pub fn stats(&self) -> crate::error::Result<StoreStats> {
        let conn = self.conn.lock().expect("prmine store mutex poisoned");
        let stats = (|| -> rusqlite::Result<StoreStats> {
            Ok(StoreStats {
                authors: Self::count_rows(&conn, "authors")?,
                pull_requests: Self::count_rows(&conn, "pull_requests")?,
                commits: Self::count_rows(&conn, "commits")?,
                reviews: Self::count_rows(&conn, "reviews")?,
                review_threads: Self::count_rows(&conn, "review_threads")?,
                comments: Self::count_rows(&conn, "comments")?,
                files: Self::count_rows(&conn, "files")?,
                participants: Self::count_rows(&conn, "author_pull_request")?,
                labels: Self::count_rows(&conn, "labels")?,
                label_links: Self::count_rows(&conn, "label_pull_request")?,
            })
        })()
        .map_err(StoreError::Sqlite)?;
        Ok(stats)
    }

    fn count_rows(conn: &Connection, table: &str) -> rusqlite::Result<u64> {
        let n: i64 = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    fn save_label_on(conn: &Connection, name: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO labels (name) VALUES (?1)
             ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        Ok(())
    }
}
