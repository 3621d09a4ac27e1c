//! gator: a multi-user RSS aggregator backed by SQLite.
//!
//! The [`feed`] module holds the ingestion engine; [`commands`] exposes the
//! operations behind each CLI subcommand.

pub mod commands;
pub mod config;
pub mod feed;
pub mod storage;
pub mod util;
