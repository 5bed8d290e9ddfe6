//! Core types for the sqlstorm stress engine.
//!
//! This crate owns everything that does not need a live server connection:
//! the option registry, the per-thread PRNG and value generator, the schema
//! model (columns, indexes, tables, partitions), the catalog, the checkpoint
//! document, and the random DML text builders.

pub mod catalog;
pub mod checkpoint;
pub mod column;
pub mod dml;
pub mod env;
pub mod error;
pub mod index;
pub mod options;
pub mod partition;
pub mod rng;
pub mod table;
pub mod value;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::Catalog;
pub use column::{Column, TypeTag};
pub use error::{CoreError, Result};
pub use index::{Index, IndexColumn};
pub use options::{Opt, OptionKind, OptionRegistry, OptionValue};
pub use partition::{ListPartition, PartitionLayout, PartitionStrategy, RangeBound};
pub use rng::{Prng, StringPool};
pub use table::{FkAction, Table, TableState, TableVariant};
pub use value::GenContext;
