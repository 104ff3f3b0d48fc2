//! Feed parsing.
//!
//! Turns raw calendar-feed bytes into raw event records plus a best-effort
//! calendar/team display name.

mod parse;

pub use parse::{ParsedFeed, parse_feed, resolve_team_name};
