//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces the usecases layer requires from the outside
//! world. Adapters implement these traits.
//!
//! Port categories:
//! - `HistorySink`: round-by-round and settlement history recording

pub mod history;
