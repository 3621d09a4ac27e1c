use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use gator::commands::{self, AppContext};
use gator::config::Config;
use gator::storage::Post;
use gator::util::{collapse_whitespace, strip_control_chars, truncate_to_width};

/// Column budget for post descriptions in `browse`
const DESCRIPTION_WIDTH: usize = 280;

#[derive(Parser, Debug)]
#[command(name = "gator", version, about = "Multi-user RSS aggregator")]
struct Args {
    /// Config file (defaults to ~/.config/gator/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch the current user
    Login { name: String },
    /// Delete all users, feeds, follows and posts
    Reset,
    /// List users
    Users,
    /// Poll feeds every INTERVAL (e.g. 30s, 1m, 1h30m) until interrupted
    Agg { interval: String },
    /// Add a feed and follow it
    #[command(name = "addfeed")]
    AddFeed { name: String, url: String },
    /// List all feeds
    Feeds,
    /// Follow an existing feed by url
    Follow { url: String },
    /// List feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show the newest posts from followed feeds
    Browse { limit: Option<i64> },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    init_tracing(&config.log_level);

    let mut ctx = AppContext::open_with_config(config, &config_path).await?;

    match args.command {
        Command::Register { name } => {
            let user = commands::register(&mut ctx, &name).await?;
            println!("User {} created", user.name);
        }
        Command::Login { name } => {
            let user = commands::login(&mut ctx, &name).await?;
            println!("Logged in as {}", user.name);
        }
        Command::Reset => {
            let removed = commands::reset(&ctx).await?;
            println!("Database reset ({} users removed)", removed);
        }
        Command::Users => {
            for entry in commands::users(&ctx).await? {
                if entry.current {
                    println!("* {} (current)", entry.name);
                } else {
                    println!("* {}", entry.name);
                }
            }
        }
        Command::Agg { interval } => {
            commands::agg(&ctx, &interval, shutdown_signal()).await?;
        }
        Command::AddFeed { name, url } => {
            let (feed, follow) = commands::add_feed(&ctx, &name, &url).await?;
            println!("Feed created:");
            println!(" | ID:   {}", feed.id);
            println!(" | Name: {}", feed.name);
            println!(" | URL:  {}", feed.url);
            println!("{} now follows {}", follow.user_name, follow.feed_name);
        }
        Command::Feeds => {
            for feed in commands::feeds(&ctx).await? {
                println!("Feed: {}", strip_control_chars(&feed.name));
                println!(" | URL: {}", feed.url);
                println!(" | Creator: {}", feed.user_name);
                println!(" | ID: {}", feed.id);
            }
        }
        Command::Follow { url } => {
            let follow = commands::follow(&ctx, &url).await?;
            println!("{} now follows {}", follow.user_name, follow.feed_name);
        }
        Command::Following => {
            for follow in commands::following(&ctx).await? {
                println!("* {}", strip_control_chars(&follow.feed_name));
            }
        }
        Command::Unfollow { url } => {
            commands::unfollow(&ctx, &url).await?;
            println!("Unfollowed {}", url.trim());
        }
        Command::Browse { limit } => {
            let posts = commands::browse(&ctx, limit).await?;
            if posts.is_empty() {
                println!("No posts yet. Run `gator agg <interval>` to collect some.");
            }
            for post in &posts {
                print_post(post);
            }
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level. Logs go to stderr.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_post(post: &Post) {
    println!("Title: {}", strip_control_chars(&post.title));
    if let Some(description) = &post.description {
        let flat = collapse_whitespace(&strip_control_chars(description));
        println!(
            "Description: {}",
            truncate_to_width(&flat, DESCRIPTION_WIDTH)
        );
    }
    println!("URL: {}", strip_control_chars(&post.url));
    let published = post.published_at.format("%Y-%m-%d %H:%M:%S UTC");
    if post.published_at_estimated {
        println!("Published Date: {} (estimated)", published);
    } else {
        println!("Published Date: {}", published);
    }
    println!("-----------------------");
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received SIGINT, shutting down gracefully"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM, shutting down gracefully");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    // Never completes off Unix
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = sigterm => {}
    }
}
