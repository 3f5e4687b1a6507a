//! Typed price data model.
//!
//! # Responsibility
//! - Replace loosely typed tabular frames with a fixed `Bar` row.
//!
//! # Invariants
//! - Every persisted table shares the bar column set.

pub mod bar;
