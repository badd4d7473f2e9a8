//! CLI error types and conversions

use crate::credentials::CredentialError;
use crate::extractor::ExtractError;
use crate::fetcher::query::QueryError;
use crate::output::OutputError;
use crate::registry::RegistryError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Registry error
    #[error("registry error: {0}")]
    RegistryError(#[from] RegistryError),

    /// Query error
    #[error("query error: {0}")]
    QueryError(#[from] QueryError),

    /// Credential error
    #[error("credential error: {0}")]
    CredentialError(#[from] CredentialError),

    /// Extraction error
    #[error("extraction error: {0}")]
    ExtractError(#[from] ExtractError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Extraction returned nothing and `--allow-empty` was not given
    #[error("no records extracted for {dataset} ({window}); pass --allow-empty to write an empty object")]
    EmptyExtraction {
        /// Dataset name
        dataset: String,
        /// Date window
        window: String,
    },

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
