//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `config` - Config inspection commands (show, path)
//! - `core` - Shared utilities (config loading, CSV I/O, API client, dates)
//! - `fetch` - Catering API download
//! - `normalize` - Single-table cleaning
//! - `reconcile` - Merge, classify and the watch loop
//! - `reports` - Spend leaderboard

pub mod config;
pub mod core;
pub mod fetch;
pub mod normalize;
pub mod reconcile;
pub mod reports;

// Re-export command functions for main.rs
pub use config::*;
pub use core::*;
pub use fetch::*;
pub use normalize::*;
pub use reconcile::*;
pub use reports::*;

/// Truncate a string to at most `max` characters, ending in "..." when cut
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
