//! # Tessera DB Query
//!
//! Query planning and execution for Tessera DB.
//!
//! This crate provides:
//! - A pull-based iterator layer over refs and values, with `next`,
//!   membership `contains`, tag propagation and cancellation
//! - The declarative shape algebra (`Shape` / `ValShape`) with a generic
//!   structural optimizer and hooks for store-specific rewrites
//! - A binder attaching shape trees to a `QuadStore`
//! - The fluent path/morphism builder with reversal
//!
//! ## Quick Start
//!
//! Compose a `Path`, then call `iterate` with a store to drain results:
//!
//! ```ignore
//! use tessera_db_query::{ExecutionContext, Path};
//! use tessera_db_core::Value;
//!
//! let ctx = ExecutionContext::new();
//! let people = Path::start(vec![Value::iri("alice")])
//!     .out(Value::iri("follows"))
//!     .iterate(&ctx, &store)
//!     .all_values()?;
//! ```

pub mod bind;
pub mod context;
pub mod error;
pub mod execute;
pub mod iterator;
pub mod path;
pub mod shape;
pub mod store;

// Re-exports
pub use bind::Binder;
pub use context::ExecutionContext;
pub use error::{QueryError, Result};
pub use execute::{bind as bind_shape, build_iterator, optimize, IterateChain, StoreOptimizer};
pub use iterator::{describe, Description, IteratorBase, RefIterator, Stats, TagMap, VIterator};
pub use path::{Morphism, Path, PathContext, Via};
pub use shape::{
    CmpOperator, OneShot, Optimizer, QuadFilter, QuadsAction, RecursiveShape, Shape, TagBindings,
    ValShape, ValueFilter, MATERIALIZE_THRESHOLD,
};
pub use store::{to_refs, to_values, IndexConstraints, QuadStore, StoreHandle, StoreStats};
