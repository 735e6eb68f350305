//! # Formats Module
//!
//! Serialization of complete manager state.
//!
//! This module contains:
//! - `StakeSnapshot`, the plain-data image of a manager
//! - Binary snapshot format (postcard + header)
//!
//! Note: File I/O stays in the storage module and the app layer.
//! This module only handles format conversion (pure transformations).

mod snapshot;

pub use snapshot::*;
