//! Domain model module declarations.

pub mod session;
pub mod snapshot;
pub mod stats;
pub mod status;
