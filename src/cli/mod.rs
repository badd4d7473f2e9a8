//! CLI command implementations

use std::path::Path;

use crate::registry::{DatasetRegistry, RegistryError};

pub mod datasets;
pub mod error;
pub mod extract;
pub mod validate;

pub use datasets::DatasetsCommand;
pub use error::CliError;
pub use extract::{Cli, Commands, ExtractArgs, ExtractSummary, Mode, OutputFormat};
pub use validate::ValidateCommand;

/// Load the registry file given with `--registry`, or the embedded one
pub fn load_registry(path: Option<&Path>) -> Result<DatasetRegistry, RegistryError> {
    match path {
        Some(path) => DatasetRegistry::from_file(path),
        None => DatasetRegistry::load_embedded(),
    }
}
