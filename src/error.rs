// Allow module inception for error types - this is a common Rust pattern
#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CampaignSqlError {
    #[error("Campaign not found: {name}")]
    CampaignNotFound { name: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type CampaignSqlResult<T> = Result<T, CampaignSqlError>;
