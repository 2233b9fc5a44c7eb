//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate graph store calls into calendar tree operations.
//! - Keep callers decoupled from edge types and storage details.

pub mod time_tree;
