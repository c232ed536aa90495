//! SQLite record store for reports, articles, topics, users, and checkpoints
//!
//! All pipeline persistence goes through this module. Tables:
//!
//! 1. **reports** - assembled report text plus the topic bias it was generated
//!    under; articles join against it for their creation time
//! 2. **articles** - final styled articles, foreign-keyed to the generating
//!    report (the report row must exist first)
//! 3. **topics** - every topic already written about, consulted by the topic
//!    generator to avoid repeats
//! 4. **users** - personalization records (leaning, preferred writing style)
//! 5. **checkpoints** - serialized workflow state keyed by thread id, held
//!    indefinitely while a run sits at the approval interrupt
//! 6. **schema_version** - schema version for migrations
//!
//! WAL mode is enabled for better concurrent access; foreign keys are
//! enforced so deleting a report cascades to its articles.

use anyhow::Result;
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::PathBuf;
use uuid::Uuid;

/// Database wrapper for pipeline persistence
pub struct Database {
    conn: Connection,
}

/// A stored report row
#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub id: i64,
    pub content: String,
    pub topic_bias: String,
    pub created_at: DateTime<Local>,
}

/// A new article to insert
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub report_id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub opposite_view: String,
    pub bias: String,
    pub topic_bias: String,
    pub preferred_writing_style: Vec<String>,
    pub relevant_topics: Vec<String>,
}

/// A stored article row
#[derive(Debug, Clone)]
pub struct ArticleRecord {
    pub id: i64,
    pub report_id: i64,
    pub title: String,
    pub summary: String,
    pub content: String,
    pub opposite_view: String,
    pub bias: String,
    pub topic_bias: String,
    pub preferred_writing_style: Vec<String>,
    pub relevant_topics: Vec<String>,
    pub created_at: DateTime<Local>,
}

/// Listing projection of an article
#[derive(Debug, Clone)]
pub struct ArticleSummary {
    pub id: i64,
    pub title: String,
    pub summary: String,
    pub bias: String,
    pub relevant_topics: Vec<String>,
    pub created_at: DateTime<Local>,
}

/// A stored user row
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub preferred_topics: Vec<String>,
    pub locations: Vec<String>,
    pub political_leaning: String,
    pub additional_info: Option<String>,
    pub preferred_writing_style: Vec<String>,
}

/// Fields to create a user with
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub preferred_topics: Vec<String>,
    pub locations: Vec<String>,
    pub political_leaning: String,
    pub additional_info: Option<String>,
    pub preferred_writing_style: Vec<String>,
}

impl Database {
    /// Create a new database connection at the specified path
    pub fn new(path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent access
        conn.pragma_update(None, "journal_mode", "WAL")?;

        // Enable foreign key constraints
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self { conn })
    }

    /// Create an in-memory database (for testing and scratch runs)
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self { conn })
    }

    /// Initialize database schema with all tables and indexes
    pub fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                topic_bias TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                report_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                summary TEXT NOT NULL,
                content TEXT NOT NULL,
                opposite_view TEXT NOT NULL DEFAULT '',
                bias TEXT NOT NULL,
                topic_bias TEXT NOT NULL,
                preferred_writing_style TEXT NOT NULL,
                relevant_topics TEXT NOT NULL,
                created_at TEXT NOT NULL,

                FOREIGN KEY(report_id) REFERENCES reports(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_articles_report_id ON articles(report_id);

            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                preferred_topics TEXT NOT NULL DEFAULT '[]',
                locations TEXT NOT NULL DEFAULT '[]',
                political_leaning TEXT NOT NULL DEFAULT 'neutral',
                additional_info TEXT,
                preferred_writing_style TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id TEXT PRIMARY KEY,
                phase TEXT NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_checkpoints_updated_at ON checkpoints(updated_at);

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (1)",
            [],
        )?;

        Ok(())
    }

    /// Get current schema version
    pub fn get_schema_version(&self) -> Result<i32> {
        let version: i32 =
            self.conn
                .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                    row.get(0)
                })?;
        Ok(version)
    }

    // ------------------------------------------------------------------
    // Reports
    // ------------------------------------------------------------------

    /// Insert a report and return its id
    pub fn insert_report(&self, content: &str, topic_bias: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO reports (content, topic_bias, created_at) VALUES (?1, ?2, ?3)",
            params![content, topic_bias, Local::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a single report by id
    pub fn get_report(&self, id: i64) -> Result<Option<ReportRecord>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, content, topic_bias, created_at FROM reports WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ReportRecord {
                        id: row.get(0)?,
                        content: row.get(1)?,
                        topic_bias: row.get(2)?,
                        created_at: parse_datetime(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(result)
    }

    // ------------------------------------------------------------------
    // Articles
    // ------------------------------------------------------------------

    /// Insert an article and return its id. The referenced report row must
    /// already exist.
    pub fn insert_article(&self, article: &NewArticle) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO articles (
                report_id, title, summary, content, opposite_view, bias,
                topic_bias, preferred_writing_style, relevant_topics, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                article.report_id,
                article.title,
                article.summary,
                article.content,
                article.opposite_view,
                article.bias,
                article.topic_bias,
                serde_json::to_string(&article.preferred_writing_style)?,
                serde_json::to_string(&article.relevant_topics)?,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Get a single article by id
    pub fn get_article(&self, id: i64) -> Result<Option<ArticleRecord>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT id, report_id, title, summary, content, opposite_view, bias,
                       topic_bias, preferred_writing_style, relevant_topics, created_at
                FROM articles
                WHERE id = ?1
                "#,
                params![id],
                map_article_row,
            )
            .optional()?;
        Ok(result)
    }

    /// List articles newest-first, optionally filtered to those tagged with
    /// `topic`. Ordering uses the generating report's creation time, matching
    /// what readers see as publication time.
    pub fn list_articles(&self, topic: Option<&str>) -> Result<Vec<ArticleSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT a.id, a.title, a.summary, a.bias, a.relevant_topics, r.created_at
            FROM articles a
            JOIN reports r ON r.id = a.report_id
            ORDER BY r.created_at DESC
            "#,
        )?;

        let summaries = stmt
            .query_map([], |row| {
                Ok(ArticleSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    summary: row.get(2)?,
                    bias: row.get(3)?,
                    relevant_topics: parse_json_list(row, 4)?,
                    created_at: parse_datetime(row, 5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Tag filtering happens on the decoded list; the column is a JSON blob
        let summaries = match topic {
            Some(tag) => summaries
                .into_iter()
                .filter(|s| s.relevant_topics.iter().any(|t| t == tag))
                .collect(),
            None => summaries,
        };

        Ok(summaries)
    }

    // ------------------------------------------------------------------
    // Topics
    // ------------------------------------------------------------------

    /// Record a topic that has been written about
    pub fn insert_topic(&self, content: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO topics (content, created_at) VALUES (?1, ?2)",
            params![content, Local::now().to_rfc3339()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// All previously written topics, oldest first
    pub fn list_topics(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT content FROM topics ORDER BY created_at ASC")?;
        let topics = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(topics)
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert a user and return its id
    pub fn insert_user(&self, user: &NewUser) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO users (
                email, preferred_topics, locations, political_leaning,
                additional_info, preferred_writing_style, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                user.email,
                serde_json::to_string(&user.preferred_topics)?,
                serde_json::to_string(&user.locations)?,
                user.political_leaning,
                user.additional_info,
                serde_json::to_string(&user.preferred_writing_style)?,
                Local::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Look up a user by email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let result = self
            .conn
            .query_row(
                r#"
                SELECT id, email, preferred_topics, locations, political_leaning,
                       additional_info, preferred_writing_style
                FROM users
                WHERE email = ?1
                "#,
                params![email],
                map_user_row,
            )
            .optional()?;
        Ok(result)
    }

    /// Update a user's leaning and writing style. Returns false if no such
    /// user exists.
    pub fn update_user_preferences(
        &self,
        id: i64,
        political_leaning: &str,
        preferred_writing_style: &[String],
    ) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE users SET political_leaning = ?1, preferred_writing_style = ?2 WHERE id = ?3",
            params![
                political_leaning,
                serde_json::to_string(preferred_writing_style)?,
                id
            ],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------

    /// Insert or update the checkpoint for a workflow thread
    pub fn save_checkpoint(&self, thread_id: &Uuid, phase: &str, state_json: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            r#"
            INSERT INTO checkpoints (thread_id, phase, state, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(thread_id) DO UPDATE SET
                phase = excluded.phase,
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
            params![thread_id.to_string(), phase, state_json, now],
        )?;
        Ok(())
    }

    /// Load the checkpoint state JSON for a thread
    pub fn load_checkpoint(&self, thread_id: &Uuid) -> Result<Option<String>> {
        let result = self
            .conn
            .query_row(
                "SELECT state FROM checkpoints WHERE thread_id = ?1",
                params![thread_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    /// Delete one checkpoint
    pub fn delete_checkpoint(&self, thread_id: &Uuid) -> Result<()> {
        self.conn.execute(
            "DELETE FROM checkpoints WHERE thread_id = ?1",
            params![thread_id.to_string()],
        )?;
        Ok(())
    }

    /// Delete checkpoints not touched since the cutoff. Returns how many were
    /// reaped.
    pub fn purge_checkpoints_before(&self, cutoff: DateTime<Local>) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM checkpoints WHERE updated_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }
}

// Helper functions for mapping between database and Rust types

fn parse_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_json_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn map_article_row(row: &Row) -> rusqlite::Result<ArticleRecord> {
    Ok(ArticleRecord {
        id: row.get(0)?,
        report_id: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        content: row.get(4)?,
        opposite_view: row.get(5)?,
        bias: row.get(6)?,
        topic_bias: row.get(7)?,
        preferred_writing_style: parse_json_list(row, 8)?,
        relevant_topics: parse_json_list(row, 9)?,
        created_at: parse_datetime(row, 10)?,
    })
}

fn map_user_row(row: &Row) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        preferred_topics: parse_json_list(row, 2)?,
        locations: parse_json_list(row, 3)?,
        political_leaning: row.get(4)?,
        additional_info: row.get(5)?,
        preferred_writing_style: parse_json_list(row, 6)?,
    })
}

/// Look up a user id by email, tolerating lookup failures the way the
/// delivery layer expects: any error degrades to "no user".
pub fn find_user_id(db: &Database, email: &str) -> Option<i64> {
    db.get_user_by_email(email)
        .ok()
        .flatten()
        .map(|user| user.id)
}
