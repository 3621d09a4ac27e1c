//! Command implementations behind the `gator` subcommands.
//!
//! Every command receives an explicit [`AppContext`]; nothing here touches
//! process-wide state. Commands return data and leave printing to `main`.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::feed::{run_ingestion_loop, FeedFetcher};
use crate::storage::{Database, DatabaseError, Feed, FeedFollow, FeedWithCreator, Post, User};
use crate::util::validate_feed_url;

/// Posts shown by `browse` when no limit is given
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// Everything a command needs: the store, the loaded config and where to save it.
pub struct AppContext {
    pub db: Database,
    pub config: Config,
    pub config_path: PathBuf,
}

/// One row of the `users` listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub name: String,
    pub current: bool,
}

impl AppContext {
    pub fn new(db: Database, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config,
            config_path,
        }
    }

    /// Load the config at `config_path` and open the database it points to.
    pub async fn open(config_path: &Path) -> Result<Self> {
        let config = Config::load(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
        Self::open_with_config(config, config_path).await
    }

    /// Open the database for an already loaded `config`.
    pub async fn open_with_config(config: Config, config_path: &Path) -> Result<Self> {
        let db_path = config.resolve_db_path(config_path);
        let db_path_str = db_path
            .to_str()
            .with_context(|| format!("Database path is not valid UTF-8: {}", db_path.display()))?;
        let db = Database::open(db_path_str)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

        Ok(Self::new(db, config, config_path.to_path_buf()))
    }

    /// The logged-in user, as named in the config.
    pub async fn current_user(&self) -> Result<User> {
        let Some(name) = self.config.current_user_name.as_deref() else {
            bail!("Not logged in: run `gator register <name>` or `gator login <name>` first");
        };
        match self.db.get_user_by_name(name).await? {
            Some(user) => Ok(user),
            None => bail!("Current user '{}' no longer exists; log in again", name),
        }
    }

    fn set_current_user(&mut self, name: &str) -> Result<()> {
        self.config.current_user_name = Some(name.to_string());
        self.config
            .save(&self.config_path)
            .with_context(|| format!("Failed to save config to {}", self.config_path.display()))
    }
}

// ============================================================================
// Accounts
// ============================================================================

pub async fn register(ctx: &mut AppContext, name: &str) -> Result<User> {
    let name = non_empty(name, "user name")?;
    let user = match ctx.db.create_user(name).await {
        Ok(user) => user,
        Err(DatabaseError::DuplicateKey(_)) => bail!("User '{}' already exists", name),
        Err(e) => return Err(e).context("Failed to create user"),
    };
    ctx.set_current_user(&user.name)?;
    tracing::info!(user = %user.name, "Registered user");
    Ok(user)
}

pub async fn login(ctx: &mut AppContext, name: &str) -> Result<User> {
    let name = non_empty(name, "user name")?;
    let Some(user) = ctx.db.get_user_by_name(name).await? else {
        bail!("User '{}' does not exist", name);
    };
    ctx.set_current_user(&user.name)?;
    Ok(user)
}

/// Delete every user and, by cascade, every feed, follow and post.
pub async fn reset(ctx: &AppContext) -> Result<u64> {
    let removed = ctx
        .db
        .delete_all_users()
        .await
        .context("Failed to reset database")?;
    tracing::info!(users = removed, "Database reset");
    Ok(removed)
}

pub async fn users(ctx: &AppContext) -> Result<Vec<UserEntry>> {
    let current = ctx.config.current_user_name.as_deref();
    Ok(ctx
        .db
        .list_users()
        .await?
        .into_iter()
        .map(|u| UserEntry {
            current: current == Some(u.name.as_str()),
            name: u.name,
        })
        .collect())
}

// ============================================================================
// Feeds & Follows
// ============================================================================

/// Register a new feed owned by the current user, and follow it.
pub async fn add_feed(ctx: &AppContext, name: &str, url: &str) -> Result<(Feed, FeedFollow)> {
    let user = ctx.current_user().await?;
    let name = non_empty(name, "feed name")?;
    let url = validate_feed_url(url).with_context(|| format!("Rejected feed url '{}'", url))?;

    let feed = match ctx.db.create_feed(url.as_str(), name, user.id).await {
        Ok(feed) => feed,
        Err(DatabaseError::DuplicateKey(_)) => {
            bail!("Feed {} already exists; use `gator follow {}`", url, url)
        }
        Err(e) => return Err(e).context("Failed to create feed"),
    };
    let follow = ctx
        .db
        .create_feed_follow(user.id, feed.id)
        .await
        .context("Failed to follow new feed")?;

    tracing::info!(feed = %feed.name, url = %feed.url, "Added feed");
    Ok((feed, follow))
}

pub async fn feeds(ctx: &AppContext) -> Result<Vec<FeedWithCreator>> {
    Ok(ctx.db.list_feeds_with_creators().await?)
}

pub async fn follow(ctx: &AppContext, url: &str) -> Result<FeedFollow> {
    let user = ctx.current_user().await?;
    let url = stored_url(url);
    let Some(feed) = ctx.db.get_feed_by_url(&url).await? else {
        bail!("No feed with url {}; add it with `gator addfeed <name> <url>`", url);
    };

    match ctx.db.create_feed_follow(user.id, feed.id).await {
        Ok(follow) => Ok(follow),
        Err(DatabaseError::DuplicateKey(_)) => bail!("Already following {}", feed.name),
        Err(e) => Err(e).context("Failed to follow feed"),
    }
}

pub async fn following(ctx: &AppContext) -> Result<Vec<FeedFollow>> {
    let user = ctx.current_user().await?;
    Ok(ctx.db.get_follows_for_user(user.id).await?)
}

pub async fn unfollow(ctx: &AppContext, url: &str) -> Result<()> {
    let user = ctx.current_user().await?;
    let url = stored_url(url);
    if !ctx.db.delete_feed_follow(user.id, &url).await? {
        bail!("Not following {}", url);
    }
    Ok(())
}

/// Newest posts from the current user's feeds; `limit` defaults to [`DEFAULT_BROWSE_LIMIT`].
pub async fn browse(ctx: &AppContext, limit: Option<i64>) -> Result<Vec<Post>> {
    let limit = limit.unwrap_or(DEFAULT_BROWSE_LIMIT);
    if limit <= 0 {
        bail!("Limit must be positive, got {}", limit);
    }
    let user = ctx.current_user().await?;
    Ok(ctx.db.get_posts_for_user(user.id, limit).await?)
}

// ============================================================================
// Aggregation
// ============================================================================

/// Poll feeds every `interval` until `shutdown` resolves.
pub async fn agg<F>(ctx: &AppContext, interval: &str, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let fetcher = FeedFetcher::new(ctx.config.user_agent(), ctx.config.fetch_timeout())
        .context("Failed to build HTTP client")?;
    run_ingestion_loop(ctx.db.clone(), fetcher, interval, shutdown).await?;
    Ok(())
}

/// Feed urls are stored in the normalized form `addfeed` produced.
fn stored_url(raw: &str) -> String {
    validate_feed_url(raw)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| raw.trim().to_string())
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("{} must not be empty", what);
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn context() -> (AppContext, PathBuf) {
        let dir = std::env::temp_dir().join(format!("gator_commands_test_{}", uuid::Uuid::new_v4()));
        let db = Database::open(":memory:").await.unwrap();
        let ctx = AppContext::new(db, Config::default(), dir.join("config.toml"));
        (ctx, dir)
    }

    #[tokio::test]
    async fn test_current_user_requires_login() {
        let (ctx, _dir) = context().await;
        let err = ctx.current_user().await.unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
    }

    #[tokio::test]
    async fn test_current_user_deleted_after_reset() {
        let (mut ctx, dir) = context().await;
        register(&mut ctx, "alice").await.unwrap();
        reset(&ctx).await.unwrap();

        let err = ctx.current_user().await.unwrap_err();
        assert!(err.to_string().contains("no longer exists"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_register_rejects_blank_name() {
        let (mut ctx, _dir) = context().await;
        assert!(register(&mut ctx, "   ").await.is_err());
    }

    #[tokio::test]
    async fn test_login_trims_name_like_register() {
        let (mut ctx, dir) = context().await;
        register(&mut ctx, "  bob").await.unwrap();
        register(&mut ctx, "alice").await.unwrap();

        let user = login(&mut ctx, "  bob ").await.unwrap();
        assert_eq!(user.name, "bob");
        assert_eq!(ctx.config.current_user_name.as_deref(), Some("bob"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_browse_rejects_non_positive_limit() {
        let (mut ctx, dir) = context().await;
        register(&mut ctx, "alice").await.unwrap();
        assert!(browse(&ctx, Some(0)).await.is_err());
        assert!(browse(&ctx, Some(-3)).await.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_agg_invalid_interval() {
        let (ctx, _dir) = context().await;
        let err = agg(&ctx, "whenever", async {}).await.unwrap_err();
        assert!(err.to_string().contains("Invalid interval"));
    }
}
