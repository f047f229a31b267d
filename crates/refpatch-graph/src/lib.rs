//! Refpatch Object Graph
//!
//! A live, mutable object graph with identity, dynamic attributes and a
//! maintained back-reference index.
//!
//! # Overview
//!
//! - **Heap**: arena of objects behind one lock, shared as `Arc<Heap>`
//! - **Value / ObjectId**: primitives by value, heap objects by identity
//! - **Namespace**: keyed-mapping storage (modules, instance dicts, type members)
//! - **Storage::Slots**: fixed-slot storage declared by a type
//! - **ReferrerIndex**: who holds a reference to whom, updated on every store
//! - **MockState**: call-recording stand-ins that live in the heap
//!
//! # Example
//!
//! ```rust
//! use refpatch_graph::{Heap, Value};
//!
//! let heap = Heap::new();
//! let module = heap.new_module("module1");
//! let f = heap
//!     .define_function(module, "module_func", Some(0), |_, _| Ok(Value::Int(42)))
//!     .unwrap();
//!
//! // Every store is indexed: the module holds the function
//! assert_eq!(heap.referrers(f), vec![module]);
//! assert_eq!(heap.call_method(module, "module_func", &[]).unwrap(), Value::Int(42));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod heap;
mod mock;
mod object;
mod referrers;
mod value;

// Re-exports
pub use error::GraphError;
pub use heap::Heap;
pub use mock::{MockSpec, MockState, SideEffect};
pub use object::{
    BoundMethod, Function, Instance, Namespace, NativeFn, Object, ObjectKind, Opaque, Storage,
    TypeObject,
};
pub use referrers::ReferrerIndex;
pub use value::{ObjectId, Value};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for graph operations
    pub use crate::{GraphError, Heap, MockSpec, MockState, ObjectId, ObjectKind, SideEffect, Value};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
