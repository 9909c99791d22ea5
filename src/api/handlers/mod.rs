mod files;
mod health;
mod query;

use crate::api::response::ApiError;
use crate::dispatch::DispatchError;
use crate::registry::RegistryError;

pub use files::{delete_file, list_files, upload_file};
pub use health::health;
pub use query::query_files;

/// Map a RegistryError to an ApiError
fn registry_error(e: RegistryError) -> ApiError {
    match e {
        RegistryError::Validation(message) => ApiError::bad_request(message),
        RegistryError::Storage(e) => {
            tracing::error!(error = %e, "File store operation failed");
            ApiError::internal("File storage is unavailable")
        }
    }
}

/// Map a DispatchError to an ApiError
fn dispatch_error(e: DispatchError) -> ApiError {
    match e {
        DispatchError::InvalidInput(message) => ApiError::bad_request(message),
        DispatchError::NoFilesResolved => ApiError::not_found(e.to_string()),
        DispatchError::Engine(e) => {
            tracing::warn!(error = %e, "Reasoning engine failed");
            ApiError::internal(e.to_string())
        }
        DispatchError::Materialize(e) => {
            tracing::error!(error = %e, "Failed to materialize query files");
            ApiError::internal("Failed to prepare files for the query")
        }
    }
}
