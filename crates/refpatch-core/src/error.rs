//! Error types for Refpatch Core
//!
//! Provides error handling for:
//! - Method owner resolution
//! - Reference scanning
//! - Configuration loading

use refpatch_graph::GraphError;
use refpatch_patch::PatchError;
use std::path::PathBuf;

/// Errors from the [`Mocker`](crate::Mocker) entry points
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockerError {
    /// Unbound function with no type publishing it
    #[error(
        "could not determine the type owning function '{name}': if it is a plain function \
         rather than a method, use patch_references or object instead"
    )]
    UnresolvableOwner {
        /// Declared name of the function
        name: String,
    },

    /// Input is neither a bound nor an unbound method
    #[error("{0} does not look like a method")]
    NotAMethod(String),

    /// Primitive values have no identity and cannot be referenced
    #[error("{0} has no identity; only heap objects can be patched by reference")]
    NoIdentity(String),

    /// Patch primitive failed
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// Graph operation failed
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for [`MockerConfig`](crate::MockerConfig)
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolvable_owner_suggests_alternatives() {
        let err = MockerError::UnresolvableOwner {
            name: "module_func".into(),
        };
        let message = err.to_string();
        assert!(message.contains("module_func"));
        assert!(message.contains("patch_references"));
    }

    #[test]
    fn patch_errors_pass_through() {
        let inner = PatchError::ConflictingOptions("new", "autospec");
        assert_eq!(MockerError::from(inner.clone()).to_string(), inner.to_string());
    }
}
