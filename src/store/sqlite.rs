//! SQLite implementation of `Store`.
//!
//! Persistent storage that survives service restarts. Synchronous rusqlite
//! calls run under `tokio::task::spawn_blocking` so they never stall the
//! async runtime. The database carries a `schema_version` table; schema
//! changes bump `CURRENT_SCHEMA_VERSION` and add a step in
//! `run_migrations()`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{DecisionClaim, NewPost, PostRecord, Store, StoreError, UserRecord};
use crate::localization::Language;
use crate::types::{
    ChatId, MessageId, PhotoRef, PostId, PostStatus, TopicId, UserId, Verdict,
};

/// Current schema version.
const CURRENT_SCHEMA_VERSION: i64 = 2;

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run pending migrations.
    ///
    /// The connection is configured with WAL journaling and a busy timeout;
    /// WAL is verified because SQLite can silently keep DELETE mode on
    /// filesystems without shared-memory support.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();

        if path_str != ":memory:" && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| StoreError::storage("open database", e.to_string()))?;

        let is_in_memory = path_str == ":memory:";
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("set journal_mode", e.to_string()))?;
        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(StoreError::storage(
                "configure journal_mode",
                format!(
                    "failed to enable WAL mode: SQLite returned '{}' instead of 'wal'",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch("PRAGMA busy_timeout = 5000;")
            .map_err(|e| StoreError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, for tests.
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), StoreError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::storage(
                "schema version",
                format!(
                    "database schema version {} is newer than supported version {}",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }
        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    user_id INTEGER PRIMARY KEY,
                    handle TEXT,
                    display_name TEXT NOT NULL,
                    language TEXT NOT NULL DEFAULT 'en',
                    topic_id INTEGER,
                    registered_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS posts (
                    post_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL,
                    photo_ref TEXT NOT NULL,
                    age INTEGER NOT NULL,
                    country TEXT NOT NULL,
                    country_emoji TEXT NOT NULL,
                    is_anonymous INTEGER NOT NULL,
                    display_name TEXT NOT NULL,
                    mod_chat_id INTEGER NOT NULL,
                    mod_message_id INTEGER NOT NULL,
                    decision_message_id INTEGER,
                    status TEXT NOT NULL DEFAULT 'pending',
                    created_at TEXT NOT NULL,
                    published_at TEXT,
                    FOREIGN KEY (user_id) REFERENCES users (user_id)
                );

                CREATE INDEX IF NOT EXISTS idx_posts_status ON posts(status);
                CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id);
                "#,
            )
            .map_err(|e| StoreError::storage("migration v1", e.to_string()))?;
        }

        // v2: record where an approved post landed in the output channel.
        if from_version < 2 {
            conn.execute_batch(
                "ALTER TABLE posts ADD COLUMN published_message_id INTEGER;",
            )
            .map_err(|e| StoreError::storage("migration v2", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::storage(operation, e.to_string()))?
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn parse_timestamp(raw: &str, what: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| StoreError::corruption(format!("{} timestamp '{}'", what, raw)))
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<(UserRecord, String)> {
    let language_raw: String = row.get(3)?;
    let registered_raw: String = row.get(5)?;
    let record = UserRecord {
        id: UserId(row.get(0)?),
        handle: row.get(1)?,
        display_name: row.get(2)?,
        language: Language::parse(&language_raw).unwrap_or_default(),
        topic: row.get::<_, Option<i64>>(4)?.map(TopicId),
        // Placeholder; the caller parses the raw timestamp so corruption
        // surfaces as StoreError rather than a rusqlite error.
        registered_at: Utc::now(),
    };
    Ok((record, registered_raw))
}

const POST_COLUMNS: &str = "post_id, user_id, photo_ref, age, country, country_emoji, \
     is_anonymous, display_name, mod_chat_id, mod_message_id, decision_message_id, \
     published_message_id, status, created_at, published_at";

struct RawPost {
    post_id: i64,
    user_id: i64,
    photo_ref: String,
    age: i64,
    country: String,
    country_emoji: String,
    is_anonymous: bool,
    display_name: String,
    mod_chat_id: i64,
    mod_message_id: i64,
    decision_message_id: Option<i64>,
    published_message_id: Option<i64>,
    status: String,
    created_at: String,
    published_at: Option<String>,
}

fn raw_post_from_row(row: &Row<'_>) -> rusqlite::Result<RawPost> {
    Ok(RawPost {
        post_id: row.get(0)?,
        user_id: row.get(1)?,
        photo_ref: row.get(2)?,
        age: row.get(3)?,
        country: row.get(4)?,
        country_emoji: row.get(5)?,
        is_anonymous: row.get(6)?,
        display_name: row.get(7)?,
        mod_chat_id: row.get(8)?,
        mod_message_id: row.get(9)?,
        decision_message_id: row.get(10)?,
        published_message_id: row.get(11)?,
        status: row.get(12)?,
        created_at: row.get(13)?,
        published_at: row.get(14)?,
    })
}

fn post_from_raw(raw: RawPost) -> Result<PostRecord, StoreError> {
    let status = PostStatus::parse(&raw.status)
        .ok_or_else(|| StoreError::corruption(format!("post status '{}'", raw.status)))?;
    let age = u8::try_from(raw.age)
        .map_err(|_| StoreError::corruption(format!("post age {}", raw.age)))?;
    let published_at = match raw.published_at {
        Some(ref ts) => Some(parse_timestamp(ts, "published_at")?),
        None => None,
    };
    Ok(PostRecord {
        id: PostId(raw.post_id),
        user: UserId(raw.user_id),
        photo: PhotoRef(raw.photo_ref),
        age,
        country: raw.country,
        country_emoji: raw.country_emoji,
        is_anonymous: raw.is_anonymous,
        display_name: raw.display_name,
        moderation_chat: ChatId(raw.mod_chat_id),
        moderation_message: MessageId(raw.mod_message_id),
        decision_message: raw.decision_message_id.map(MessageId),
        published_message: raw.published_message_id.map(MessageId),
        status,
        created_at: parse_timestamp(&raw.created_at, "created_at")?,
        published_at,
    })
}

// =============================================================================
// Store trait implementation
// =============================================================================

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_user(
        &self,
        id: UserId,
        handle: Option<String>,
        display_name: String,
    ) -> Result<(), StoreError> {
        self.with_conn("upsert_user", move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (user_id, handle, display_name, registered_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.0, handle, display_name, Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::storage("upsert_user", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn user(&self, id: UserId) -> Result<Option<UserRecord>, StoreError> {
        self.with_conn("user", move |conn| {
            let result = conn
                .query_row(
                    "SELECT user_id, handle, display_name, language, topic_id, registered_at
                     FROM users WHERE user_id = ?1",
                    params![id.0],
                    user_from_row,
                )
                .optional()
                .map_err(|e| StoreError::storage("user", e.to_string()))?;
            match result {
                Some((mut record, registered_raw)) => {
                    record.registered_at = parse_timestamp(&registered_raw, "registered_at")?;
                    Ok(Some(record))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn set_language(&self, id: UserId, language: Language) -> Result<(), StoreError> {
        self.with_conn("set_language", move |conn| {
            conn.execute(
                "UPDATE users SET language = ?1 WHERE user_id = ?2",
                params![language.as_str(), id.0],
            )
            .map_err(|e| StoreError::storage("set_language", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn language(&self, id: UserId) -> Result<Language, StoreError> {
        self.with_conn("language", move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT language FROM users WHERE user_id = ?1",
                    params![id.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::storage("language", e.to_string()))?;
            Ok(raw
                .and_then(|s| Language::parse(&s))
                .unwrap_or_default())
        })
        .await
    }

    async fn topic(&self, id: UserId) -> Result<Option<TopicId>, StoreError> {
        self.with_conn("topic", move |conn| {
            let topic: Option<Option<i64>> = conn
                .query_row(
                    "SELECT topic_id FROM users WHERE user_id = ?1",
                    params![id.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::storage("topic", e.to_string()))?;
            Ok(topic.flatten().map(TopicId))
        })
        .await
    }

    async fn assign_topic(&self, id: UserId, topic: TopicId) -> Result<TopicId, StoreError> {
        self.with_conn("assign_topic", move |conn| {
            // Conditional update keeps the assignment write-once; a racing
            // submission that lost the update reads the winner's value back.
            conn.execute(
                "UPDATE users SET topic_id = ?1 WHERE user_id = ?2 AND topic_id IS NULL",
                params![topic.0, id.0],
            )
            .map_err(|e| StoreError::storage("assign_topic", e.to_string()))?;

            let stored: Option<Option<i64>> = conn
                .query_row(
                    "SELECT topic_id FROM users WHERE user_id = ?1",
                    params![id.0],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StoreError::storage("assign_topic", e.to_string()))?;
            match stored.flatten() {
                Some(stored_topic) => Ok(TopicId(stored_topic)),
                None => Err(StoreError::storage(
                    "assign_topic",
                    format!("unknown user {}", id),
                )),
            }
        })
        .await
    }

    async fn create_post(&self, post: NewPost) -> Result<PostId, StoreError> {
        self.with_conn("create_post", move |conn| {
            conn.execute(
                "INSERT INTO posts (user_id, photo_ref, age, country, country_emoji,
                                    is_anonymous, display_name, mod_chat_id, mod_message_id,
                                    status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10)",
                params![
                    post.user.0,
                    post.photo.0,
                    i64::from(post.age),
                    post.country,
                    post.country_emoji,
                    post.is_anonymous,
                    post.display_name,
                    post.moderation_chat.0,
                    post.moderation_message.0,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| StoreError::storage("create_post", e.to_string()))?;
            Ok(PostId(conn.last_insert_rowid()))
        })
        .await
    }

    async fn post(&self, id: PostId) -> Result<Option<PostRecord>, StoreError> {
        self.with_conn("post", move |conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {} FROM posts WHERE post_id = ?1", POST_COLUMNS),
                    params![id.0],
                    raw_post_from_row,
                )
                .optional()
                .map_err(|e| StoreError::storage("post", e.to_string()))?;
            raw.map(post_from_raw).transpose()
        })
        .await
    }

    async fn set_decision_message(
        &self,
        id: PostId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        self.with_conn("set_decision_message", move |conn| {
            conn.execute(
                "UPDATE posts SET decision_message_id = ?1 WHERE post_id = ?2",
                params![message.0, id.0],
            )
            .map_err(|e| StoreError::storage("set_decision_message", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn set_published_message(
        &self,
        id: PostId,
        message: MessageId,
    ) -> Result<(), StoreError> {
        self.with_conn("set_published_message", move |conn| {
            conn.execute(
                "UPDATE posts SET published_message_id = ?1 WHERE post_id = ?2",
                params![message.0, id.0],
            )
            .map_err(|e| StoreError::storage("set_published_message", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn delete_post(&self, id: PostId) -> Result<(), StoreError> {
        self.with_conn("delete_post", move |conn| {
            conn.execute("DELETE FROM posts WHERE post_id = ?1", params![id.0])
                .map_err(|e| StoreError::storage("delete_post", e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn claim_decision(
        &self,
        id: PostId,
        verdict: Verdict,
        decided_at: DateTime<Utc>,
    ) -> Result<DecisionClaim, StoreError> {
        self.with_conn("claim_decision", move |conn| {
            let published_at = match verdict {
                Verdict::Approve => Some(decided_at.to_rfc3339()),
                Verdict::Reject => None,
            };

            // The conditional update is the at-most-once gate: zero rows
            // affected is the authoritative "someone else decided first".
            let rows = conn
                .execute(
                    "UPDATE posts SET status = ?1, published_at = ?2
                     WHERE post_id = ?3 AND status = 'pending'",
                    params![verdict.target_status().as_str(), published_at, id.0],
                )
                .map_err(|e| StoreError::storage("claim_decision", e.to_string()))?;

            let raw = conn
                .query_row(
                    &format!("SELECT {} FROM posts WHERE post_id = ?1", POST_COLUMNS),
                    params![id.0],
                    raw_post_from_row,
                )
                .optional()
                .map_err(|e| StoreError::storage("claim_decision", e.to_string()))?;

            match (rows, raw) {
                (0, None) => Ok(DecisionClaim::NotFound),
                (0, Some(raw)) => {
                    let record = post_from_raw(raw)?;
                    Ok(DecisionClaim::AlreadyDecided(record.status))
                }
                (_, Some(raw)) => Ok(DecisionClaim::Claimed(post_from_raw(raw)?)),
                (_, None) => Err(StoreError::corruption(format!(
                    "post {} vanished mid-claim",
                    id
                ))),
            }
        })
        .await
    }

    async fn status_counts(&self) -> Result<Vec<(PostStatus, u64)>, StoreError> {
        self.with_conn("status_counts", move |conn| {
            let mut counts: Vec<(PostStatus, u64)> = vec![
                (PostStatus::Pending, 0),
                (PostStatus::Published, 0),
                (PostStatus::Rejected, 0),
            ];
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM posts GROUP BY status")
                .map_err(|e| StoreError::storage("status_counts", e.to_string()))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })
                .map_err(|e| StoreError::storage("status_counts", e.to_string()))?;
            for row in rows {
                let (status_raw, count) =
                    row.map_err(|e| StoreError::storage("status_counts", e.to_string()))?;
                let Some(status) = PostStatus::parse(&status_raw) else {
                    return Err(StoreError::corruption(format!(
                        "post status '{}'",
                        status_raw
                    )));
                };
                if let Some(entry) = counts.iter_mut().find(|(s, _)| *s == status) {
                    entry.1 = count.max(0) as u64;
                }
            }
            Ok(counts)
        })
        .await
    }

    async fn pending_posts(&self) -> Result<Vec<PostRecord>, StoreError> {
        self.with_conn("pending_posts", move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM posts WHERE status = 'pending' ORDER BY post_id",
                    POST_COLUMNS
                ))
                .map_err(|e| StoreError::storage("pending_posts", e.to_string()))?;
            let rows = stmt
                .query_map([], raw_post_from_row)
                .map_err(|e| StoreError::storage("pending_posts", e.to_string()))?;
            let mut posts = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| StoreError::storage("pending_posts", e.to_string()))?;
                posts.push(post_from_raw(raw)?);
            }
            Ok(posts)
        })
        .await
    }
}
