//! Adapters Layer - Concrete Implementations of Ports
//!
//! Everything that touches the filesystem lives here, behind the traits
//! defined in `ports`. The domain and usecases layers never import from
//! this module directly.

pub mod persistence;
