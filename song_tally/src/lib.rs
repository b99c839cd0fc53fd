//! # song_tally
//!
//! A Revolt bot that counts the songs people post in a channel. Uploads
//! ending in `.mp3` or `.wav` that play for more than ten seconds are
//! tallied per user in a small text file; a handful of `>` commands report
//! the totals, and `>scan` rebuilds the file from the channel's history.

pub mod archive;
pub mod audio;
pub mod commands;
pub mod config;
pub mod directory;
pub mod format;
pub mod handler;
pub mod ingest;
pub mod live;
pub mod rescan;
pub mod store;

pub use commands::{Command, Dispatcher};
pub use config::BotConfig;
pub use store::{FileStatStore, MemoryStatStore, StatStore, StatTable, UserStat};
