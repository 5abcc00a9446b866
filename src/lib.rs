//! # TYPEGRAPH
//!
//! Type-level dependency graphs for C# solutions.
//!
//! TYPEGRAPH loads every project of a solution, gives each declared type one
//! stable identity and records which types reference or inherit from which,
//! then writes the result as a `{nodes, links}` JSON artifact that force-graph
//! viewers can render directly.
//!
//! ## Scan modes
//!
//! - **Reference**: a link for every in-solution type mentioned inside a type
//! - **Inheritance**: a link from each class to its direct base class
//! - **Full**: both of the above

pub mod core;
pub mod formatters;
pub mod parsers;
