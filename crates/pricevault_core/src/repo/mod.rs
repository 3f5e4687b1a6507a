//! Repository layer for named price tables.
//!
//! # Responsibility
//! - Define the table persistence contract.
//! - Keep SQL and identifier handling inside the core persistence boundary.
//!
//! # Invariants
//! - Repositories borrow connections and never open or close them.
//! - Repository APIs return semantic errors (`TableExists`, `TableNotFound`,
//!   `SchemaMismatch`) in addition to DB transport errors.

pub mod table_name;
pub mod table_repo;
