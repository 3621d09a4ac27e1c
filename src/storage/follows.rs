use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{DatabaseError, FeedFollow};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Subscribe `user_id` to `feed_id`.
    ///
    /// A second follow of the same pair fails with [`DatabaseError::DuplicateKey`].
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<FeedFollow, DatabaseError> {
        let id = Uuid::new_v4();
        let now = Utc::now().timestamp();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO feed_follows (id, user_id, feed_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(user_id)
        .bind(feed_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let follow: FeedFollow = sqlx::query_as(
            r#"
                SELECT ff.id, ff.user_id, ff.feed_id, u.name AS user_name, f.name AS feed_name
                FROM feed_follows ff
                JOIN users u ON u.id = ff.user_id
                JOIN feeds f ON f.id = ff.feed_id
                WHERE ff.id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(follow)
    }

    /// Feeds followed by `user_id`, in the order they were followed
    pub async fn get_follows_for_user(&self, user_id: Uuid) -> Result<Vec<FeedFollow>, DatabaseError> {
        let rows: Vec<FeedFollow> = sqlx::query_as(
            r#"
                SELECT ff.id, ff.user_id, ff.feed_id, u.name AS user_name, f.name AS feed_name
                FROM feed_follows ff
                JOIN users u ON u.id = ff.user_id
                JOIN feeds f ON f.id = ff.feed_id
                WHERE ff.user_id = ?
                ORDER BY ff.created_at, ff.rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Remove the follow of the feed at `feed_url`. Returns false if there was none.
    pub async fn delete_feed_follow(&self, user_id: Uuid, feed_url: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
                DELETE FROM feed_follows
                WHERE user_id = ?
                  AND feed_id = (SELECT id FROM feeds WHERE url = ?)
            "#,
        )
        .bind(user_id)
        .bind(feed_url)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::Database;

    const URL: &str = "https://blog.example.com/index.xml";

    #[tokio::test]
    async fn test_follow_and_list() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.create_user("alice").await.unwrap();
        let feed = db.create_feed(URL, "Blog", alice.id).await.unwrap();

        let follow = db.create_feed_follow(alice.id, feed.id).await.unwrap();
        assert_eq!(follow.user_name, "alice");
        assert_eq!(follow.feed_name, "Blog");

        let follows = db.get_follows_for_user(alice.id).await.unwrap();
        assert_eq!(follows.len(), 1);
        assert_eq!(follows[0].feed_id, feed.id);
    }

    #[tokio::test]
    async fn test_follow_twice_is_duplicate() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.create_user("alice").await.unwrap();
        let feed = db.create_feed(URL, "Blog", alice.id).await.unwrap();
        db.create_feed_follow(alice.id, feed.id).await.unwrap();

        let err = db.create_feed_follow(alice.id, feed.id).await.unwrap_err();
        assert!(err.is_duplicate(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_follows_are_per_user() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.create_user("alice").await.unwrap();
        let bob = db.create_user("bob").await.unwrap();
        let feed = db.create_feed(URL, "Blog", alice.id).await.unwrap();

        db.create_feed_follow(alice.id, feed.id).await.unwrap();
        db.create_feed_follow(bob.id, feed.id).await.unwrap();

        assert_eq!(db.get_follows_for_user(alice.id).await.unwrap().len(), 1);
        assert_eq!(db.get_follows_for_user(bob.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unfollow() {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db.create_user("alice").await.unwrap();
        let feed = db.create_feed(URL, "Blog", alice.id).await.unwrap();
        db.create_feed_follow(alice.id, feed.id).await.unwrap();

        assert!(db.delete_feed_follow(alice.id, URL).await.unwrap());
        assert!(db.get_follows_for_user(alice.id).await.unwrap().is_empty());

        // Second unfollow and unknown url are both no-ops
        assert!(!db.delete_feed_follow(alice.id, URL).await.unwrap());
        assert!(!db
            .delete_feed_follow(alice.id, "https://nowhere.example.com/")
            .await
            .unwrap());
    }
}
