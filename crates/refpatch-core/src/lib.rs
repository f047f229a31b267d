//! Refpatch Core
//!
//! Patch test doubles in by reference rather than by dotted path:
//! - Hand over a method and have its owner resolved for you
//! - Hand over any live object and have every holder of it patched
//! - Tear everything down in one call, or when the fixture drops
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use refpatch_core::{Mocker, PatchOptions};
//! use refpatch_graph::{Heap, Value};
//!
//! let heap = Arc::new(Heap::new());
//! let module1 = heap.new_module("module1");
//! let module2 = heap.new_module("module2");
//! let f = heap
//!     .define_function(module1, "module_func", Some(0), |_, _| Ok(Value::Int(42)))
//!     .unwrap();
//! heap.set_attr(module2, "rose_by_any_other_name", f).unwrap();
//!
//! let mocker = Mocker::new(Arc::clone(&heap));
//! mocker
//!     .patch_references(&Value::Ref(f), &PatchOptions::new().with_return_value("x"))
//!     .unwrap();
//! assert_eq!(
//!     heap.call_method(module2, "rose_by_any_other_name", &[]).unwrap(),
//!     Value::from("x")
//! );
//!
//! mocker.stop_all().unwrap();
//! assert_eq!(heap.call_method(module1, "module_func", &[]).unwrap(), Value::Int(42));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod error;
mod mocker;
mod resolver;
mod scanner;
mod slot_patch;

// Re-exports
pub use config::{MockerConfig, ScanConfig};
pub use error::{ConfigError, MockerError};
pub use mocker::Mocker;
pub use resolver::MethodResolver;
pub use scanner::{ReferenceScanner, ScanReport};
pub use slot_patch::SlotPatch;

pub use refpatch_patch::{PatchError, PatchOptions, Reversible, Spec, TeardownError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for tests using the Mocker fixture
    pub use crate::{Mocker, MockerConfig, MockerError, PatchOptions, Spec};
    pub use refpatch_graph::prelude::*;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
