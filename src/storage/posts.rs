use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, NewPost, Post, PostRow};

/// Upper bound on rows returned by any post listing
const MAX_POSTS: i64 = 1000;

const POST_COLUMNS: &str = "p.id, p.title, p.url, p.description, p.published_at, \
     p.published_at_estimated, p.feed_id, p.created_at, p.updated_at";

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert one post.
    ///
    /// Post urls are globally unique; inserting a url that is already stored fails
    /// with [`DatabaseError::DuplicateKey`] and leaves the existing row untouched.
    pub async fn create_post(&self, post: &NewPost) -> Result<Post, DatabaseError> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO posts
                (id, title, url, description, published_at, published_at_estimated,
                 feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(post.published_at.timestamp())
        .bind(post.published_at_estimated)
        .bind(post.feed_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(PostRow {
            id: post.id,
            title: post.title.clone(),
            url: post.url.clone(),
            description: post.description.clone(),
            published_at: post.published_at.timestamp(),
            published_at_estimated: post.published_at_estimated,
            feed_id: post.feed_id,
            created_at: now,
            updated_at: now,
        }
        .into())
    }

    /// Newest posts from every feed `user_id` follows.
    pub async fn get_posts_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Post>, DatabaseError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            r#"
                SELECT {}
                FROM posts p
                JOIN feed_follows ff ON ff.feed_id = p.feed_id
                WHERE ff.user_id = ?
                ORDER BY p.published_at DESC, p.rowid DESC
                LIMIT ?
            "#,
            POST_COLUMNS
        ))
        .bind(user_id)
        .bind(limit.clamp(0, MAX_POSTS))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// All posts of one feed, newest first
    pub async fn get_posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>, DatabaseError> {
        let rows: Vec<PostRow> = sqlx::query_as(&format!(
            r#"
                SELECT {}
                FROM posts p
                WHERE p.feed_id = ?
                ORDER BY p.published_at DESC, p.rowid DESC
                LIMIT ?
            "#,
            POST_COLUMNS
        ))
        .bind(feed_id)
        .bind(MAX_POSTS)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }
}
