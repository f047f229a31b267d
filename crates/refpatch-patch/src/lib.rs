//! Refpatch Patch Primitive
//!
//! Reversible, by-name substitution of values in a [`refpatch_graph::Heap`],
//! tracked by a test-scoped [`PatchSession`].
//!
//! # Overview
//!
//! - **PatchOptions**: what substitute to build (explicit value, factory or mock)
//! - **Reversible**: `start` installs, `stop` restores the displaced state
//! - **NamedAttributePatch / MappingPatch**: one attribute, or several keys of a namespace
//! - **PatchSession**: ordered registry, torn down newest first by `stop_all`
//! - **Patcher**: the `object` and `dict` entry points
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use refpatch_graph::{Heap, Value};
//! use refpatch_patch::{PatchOptions, PatchSession, Patcher};
//!
//! let heap = Arc::new(Heap::new());
//! let module = heap.new_module("settings");
//! heap.set_attr(module, "retries", 3).unwrap();
//!
//! let patcher = Patcher::new(Arc::new(PatchSession::new(Arc::clone(&heap))));
//! patcher
//!     .object(module, "retries", &PatchOptions::new().with_new(0))
//!     .unwrap();
//! assert_eq!(heap.get_attr(module, "retries").unwrap(), Value::Int(0));
//!
//! patcher.session().stop_all().unwrap();
//! assert_eq!(heap.get_attr(module, "retries").unwrap(), Value::Int(3));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod options;
mod patch;
mod patcher;
mod session;

// Re-exports
pub use error::{PatchError, TeardownError};
pub use options::{NewCallable, PatchOptions, Spec};
pub use patch::{MappingPatch, NamedAttributePatch, Reversible};
pub use patcher::Patcher;
pub use session::PatchSession;

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for patching
    pub use crate::{PatchError, PatchOptions, PatchSession, Patcher, Reversible, Spec, TeardownError};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
