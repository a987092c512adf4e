//! Operation keys and their commands
//!
//! Every storage-touching step has its own key, so one failing query trips
//! only its own circuit.

use crate::config::AnalyticsConfig;
use review_guard::{Command, ConfigError};

pub const FETCH_ENGAGEMENT: &str = "fetch-engagement";
pub const FETCH_RATINGS: &str = "fetch-ratings";
pub const FETCH_FOLLOWING: &str = "fetch-following";
pub const FETCH_FOLLOWERS: &str = "fetch-followers";
pub const FETCH_ACTIVE_USERS: &str = "fetch-active-users";
pub const SIMILARITY_CACHE_READ: &str = "similarity-cache-read";
pub const SIMILARITY_CACHE_WRITE: &str = "similarity-cache-write";
pub const CALCULATE_SIMILARITY: &str = "calculate-similarity";

/// Validated commands for every analytics operation
#[derive(Debug, Clone)]
pub struct Commands {
    pub fetch_engagement: Command,
    pub fetch_ratings: Command,
    pub fetch_following: Command,
    pub fetch_followers: Command,
    pub fetch_active_users: Command,
    pub cache_read: Command,
    pub cache_write: Command,
    pub calculate_similarity: Command,
}

impl Commands {
    /// Storage keys use the database profile, pair scoring the similarity one
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, ConfigError> {
        let database = &config.database;

        Ok(Self {
            fetch_engagement: database.into_command(FETCH_ENGAGEMENT)?,
            fetch_ratings: database.into_command(FETCH_RATINGS)?,
            fetch_following: database.into_command(FETCH_FOLLOWING)?,
            fetch_followers: database.into_command(FETCH_FOLLOWERS)?,
            fetch_active_users: database.into_command(FETCH_ACTIVE_USERS)?,
            cache_read: database.into_command(SIMILARITY_CACHE_READ)?,
            cache_write: database.into_command(SIMILARITY_CACHE_WRITE)?,
            calculate_similarity: config.similarity.into_command(CALCULATE_SIMILARITY)?,
        })
    }

    pub fn all(&self) -> [&Command; 8] {
        [
            &self.fetch_engagement,
            &self.fetch_ratings,
            &self.fetch_following,
            &self.fetch_followers,
            &self.fetch_active_users,
            &self.cache_read,
            &self.cache_write,
            &self.calculate_similarity,
        ]
    }
}
