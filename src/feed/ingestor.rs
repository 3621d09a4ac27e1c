use crate::feed::dates::normalize_published;
use crate::feed::parser::{RawFeedItem, RssFeed};
use crate::storage::{Database, DatabaseError, NewPost};
use uuid::Uuid;

/// Per-feed tally of what happened to each item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// New posts written
    pub created: usize,
    /// Items whose url was already stored
    pub duplicates: usize,
    /// Items with no link, which cannot become posts
    pub skipped: usize,
    /// Items the store rejected for any other reason
    pub failed: usize,
    /// Posts stored with an estimated publish date
    pub estimated_dates: usize,
}

impl IngestSummary {
    pub fn total(&self) -> usize {
        self.created + self.duplicates + self.skipped + self.failed
    }
}

/// Store every item of `feed` as a post of `feed_id`, in document order.
///
/// Items are independent: a failed insert is logged and the next item is tried.
/// Re-ingesting a document is harmless since post urls are unique.
pub async fn ingest_feed(db: &Database, feed_id: Uuid, feed: &RssFeed) -> IngestSummary {
    let mut summary = IngestSummary::default();

    for item in &feed.channel.items {
        let link = item.link.trim();
        if link.is_empty() {
            tracing::warn!(feed_id = %feed_id, title = %item.title, "Skipping item without link");
            summary.skipped += 1;
            continue;
        }

        let post = new_post(feed_id, link, item);
        let estimated = post.published_at_estimated;

        match db.create_post(&post).await {
            Ok(_) => {
                summary.created += 1;
                if estimated {
                    summary.estimated_dates += 1;
                }
            }
            Err(DatabaseError::DuplicateKey(_)) => {
                tracing::debug!(url = %link, "Post already stored");
                summary.duplicates += 1;
            }
            Err(e) => {
                tracing::warn!(feed_id = %feed_id, url = %link, error = %e, "Failed to store post");
                summary.failed += 1;
            }
        }
    }

    summary
}

fn new_post(feed_id: Uuid, link: &str, item: &RawFeedItem) -> NewPost {
    let published = normalize_published(&item.pub_date);
    let description = Some(item.description.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string);

    NewPost {
        id: Uuid::new_v4(),
        title: item.title.trim().to_string(),
        url: link.to_string(),
        description,
        published_at: published.at,
        published_at_estimated: published.estimated,
        feed_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parser::RssChannel;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn item(link: &str, pub_date: &str) -> RawFeedItem {
        RawFeedItem {
            title: format!("Post {}", link),
            link: link.to_string(),
            description: "Body".to_string(),
            pub_date: pub_date.to_string(),
        }
    }

    fn envelope(items: Vec<RawFeedItem>) -> RssFeed {
        RssFeed {
            channel: RssChannel {
                title: "Feed".to_string(),
                items,
                ..Default::default()
            },
        }
    }

    async fn setup() -> (Database, Uuid) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed("https://example.com/rss", "Example", user.id)
            .await
            .unwrap();
        (db, feed.id)
    }

    #[tokio::test]
    async fn test_ingest_creates_posts() {
        let (db, feed_id) = setup().await;
        let feed = envelope(vec![
            item("https://example.com/1", "Mon, 02 Jan 2006 15:04:05 -0700"),
            item("https://example.com/2", "2024-03-15T08:30:00Z"),
        ]);

        let summary = ingest_feed(&db, feed_id, &feed).await;
        assert_eq!(
            summary,
            IngestSummary {
                created: 2,
                ..Default::default()
            }
        );

        let posts = db.get_posts_for_feed(feed_id).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].url, "https://example.com/2");
        assert_eq!(
            posts[1].published_at,
            Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap()
        );
        assert_eq!(posts[1].description.as_deref(), Some("Body"));
    }

    #[tokio::test]
    async fn test_ingest_twice_is_idempotent() {
        let (db, feed_id) = setup().await;
        let feed = envelope(vec![
            item("https://example.com/1", "Mon, 02 Jan 2006 15:04:05 -0700"),
            item("https://example.com/2", ""),
        ]);

        ingest_feed(&db, feed_id, &feed).await;
        let first: Vec<String> = db
            .get_posts_for_feed(feed_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();

        let second = ingest_feed(&db, feed_id, &feed).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.duplicates, 2);

        let again: Vec<String> = db
            .get_posts_for_feed(feed_id)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        assert_eq!(first, again);
    }

    #[tokio::test]
    async fn test_duplicate_url_in_one_document_keeps_first() {
        let (db, feed_id) = setup().await;
        let feed = envelope(vec![
            item("https://x/a", "Mon, 02 Jan 2006 15:04:05 -0700"),
            item("https://x/a", "02 Jan 06 15:04 UTC"),
        ]);

        let summary = ingest_feed(&db, feed_id, &feed).await;
        assert_eq!(summary.created, 1);
        assert_eq!(summary.duplicates, 1);

        let posts = db.get_posts_for_feed(feed_id).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].published_at,
            Utc.with_ymd_and_hms(2006, 1, 2, 22, 4, 5).unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_date_is_estimated() {
        let (db, feed_id) = setup().await;
        let before = Utc::now();

        let summary = ingest_feed(&db, feed_id, &envelope(vec![item("https://x/b", "")])).await;
        assert_eq!(summary.estimated_dates, 1);

        let post = &db.get_posts_for_feed(feed_id).await.unwrap()[0];
        assert!(post.published_at_estimated);
        // Stored with second precision
        assert!(post.published_at.timestamp() >= before.timestamp());
        assert!(post.published_at.timestamp() <= Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_item_without_link_skipped() {
        let (db, feed_id) = setup().await;
        let feed = envelope(vec![
            item("", "2024-03-15T08:30:00Z"),
            item("   ", "2024-03-15T08:30:00Z"),
            item("https://x/c", "2024-03-15T08:30:00Z"),
        ]);

        let summary = ingest_feed(&db, feed_id, &feed).await;
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.total(), 3);
    }

    #[tokio::test]
    async fn test_empty_description_stored_as_none() {
        let (db, feed_id) = setup().await;
        let mut bare = item("https://x/d", "2024-03-15T08:30:00Z");
        bare.description = "  ".to_string();

        ingest_feed(&db, feed_id, &envelope(vec![bare])).await;
        let post = &db.get_posts_for_feed(feed_id).await.unwrap()[0];
        assert_eq!(post.description, None);
    }

    #[tokio::test]
    async fn test_store_failure_isolated_per_item() {
        let (db, _) = setup().await;
        // Unknown feed id: every insert violates the foreign key
        let missing = Uuid::new_v4();
        let feed = envelope(vec![
            item("https://x/e", "2024-03-15T08:30:00Z"),
            item("https://x/f", "2024-03-15T08:30:00Z"),
        ]);

        let summary = ingest_feed(&db, missing, &feed).await;
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.created, 0);
    }
}
