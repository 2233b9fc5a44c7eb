//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the graph store contract the calendar tree is written against.
//! - Isolate SQLite query details from tree maintenance logic.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NodeNotFound`, `MultipleEdges`)
//!   in addition to DB transport errors.

pub mod graph_repo;
