use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, Feed, FeedRow, FeedWithCreator};

const FEED_COLUMNS: &str = "id, name, url, user_id, created_at, updated_at, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a new feed owned by `owner_id`.
    ///
    /// Fails with [`DatabaseError::DuplicateKey`] if the url is already registered;
    /// feeds are shared, so a second user should follow the existing one instead.
    pub async fn create_feed(
        &self,
        url: &str,
        name: &str,
        owner_id: Uuid,
    ) -> Result<Feed, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO feeds (id, name, url, user_id, created_at, updated_at, last_fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(url)
        .bind(owner_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(FeedRow {
            id,
            name: name.to_string(),
            url: url.to_string(),
            user_id: owner_id,
            created_at: now,
            updated_at: now,
            last_fetched_at: None,
        }
        .into())
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>, DatabaseError> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE url = ?", FEED_COLUMNS))
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Feed::from))
    }

    pub async fn get_feed_by_id(&self, id: Uuid) -> Result<Option<Feed>, DatabaseError> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {} FROM feeds WHERE id = ?", FEED_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Feed::from))
    }

    /// All feeds with the name of the user who added them, oldest first
    pub async fn list_feeds_with_creators(&self) -> Result<Vec<FeedWithCreator>, DatabaseError> {
        let rows: Vec<FeedWithCreator> = sqlx::query_as(
            r#"
                SELECT f.id, f.name, f.url, u.name AS user_name
                FROM feeds f
                JOIN users u ON u.id = f.user_id
                ORDER BY f.created_at, f.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ========================================================================
    // Scheduling Operations
    // ========================================================================

    /// The single feed that has gone longest without a successful fetch.
    ///
    /// Never-fetched feeds (`last_fetched_at IS NULL`) come first. Ties are broken
    /// by creation order; `rowid` settles feeds created within the same second.
    pub async fn select_most_stale_feed(&self) -> Result<Option<Feed>, DatabaseError> {
        self.select_most_stale_feed_excluding(&[]).await
    }

    /// [`Database::select_most_stale_feed`] ignoring the feeds in `exclude`.
    pub async fn select_most_stale_feed_excluding(
        &self,
        exclude: &[Uuid],
    ) -> Result<Option<Feed>, DatabaseError> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM feeds", FEED_COLUMNS));

        if !exclude.is_empty() {
            builder.push(" WHERE id NOT IN (");
            let mut separated = builder.separated(", ");
            for id in exclude {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }

        builder.push(
            " ORDER BY last_fetched_at IS NOT NULL, last_fetched_at, created_at, rowid LIMIT 1",
        );

        let row: Option<FeedRow> = builder
            .build_query_as()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Feed::from))
    }

    /// Record a successful fetch of `feed_id` at `at`.
    pub async fn mark_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let ts = at.timestamp();
        let result =
            sqlx::query("UPDATE feeds SET last_fetched_at = ?, updated_at = ? WHERE id = ?")
                .bind(ts)
                .bind(ts)
                .bind(feed_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("feed"));
        }
        Ok(())
    }
}
