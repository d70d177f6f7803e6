//! # Starwatch GitHub
//! Thin GitHub REST client used as the poller's star source and the bot's
//! repository resolver.

pub mod client;
pub mod repo_ref;

pub use client::GitHubClient;
pub use repo_ref::parse_repo_ref;
