use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors.
///
/// Uniqueness violations are surfaced as [`DatabaseError::DuplicateKey`] so callers
/// can treat a repeated insert as "already there" without inspecting driver messages.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An insert collided with a UNIQUE constraint
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// The row addressed by an update or lookup does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(sqlx::Error),
}

impl DatabaseError {
    /// Returns true if this error is a uniqueness violation.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DatabaseError::DuplicateKey(_))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        // Classify by the driver's constraint kind, never by message text
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return DatabaseError::DuplicateKey(db_err.message().to_string());
            }
        }
        DatabaseError::Other(err)
    }
}

/// Converts a stored Unix timestamp back into a UTC datetime.
pub(crate) fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            created_at: from_unix(row.created_at),
            updated_at: from_unix(row.updated_at),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_fetched_at: Option<i64>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            name: row.name,
            url: row.url,
            user_id: row.user_id,
            created_at: from_unix(row.created_at),
            updated_at: from_unix(row.updated_at),
            last_fetched_at: row.last_fetched_at.map(from_unix),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: i64,
    pub published_at_estimated: bool,
    pub feed_id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            title: row.title,
            url: row.url,
            description: row.description,
            published_at: from_unix(row.published_at),
            published_at_estimated: row.published_at_estimated,
            feed_id: row.feed_id,
            created_at: from_unix(row.created_at),
            updated_at: from_unix(row.updated_at),
        }
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A remote feed known to the store.
///
/// `last_fetched_at` is `None` until the scheduler has fetched the feed once;
/// such feeds are the stalest possible and are polled first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    /// Owning user
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Feed listing row joined with its creator's name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedWithCreator {
    pub id: Uuid,
    pub name: String,
    pub url: String,
    pub user_name: String,
}

/// A user's subscription to a feed, with names resolved for display.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FeedFollow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub feed_id: Uuid,
    pub user_name: String,
    pub feed_name: String,
}

/// An ingested feed item.
///
/// `published_at_estimated` is set when the item's date could not be parsed and
/// `published_at` holds the ingestion time instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub published_at_estimated: bool,
    pub feed_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert parameters for a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub published_at_estimated: bool,
    pub feed_id: Uuid,
}
