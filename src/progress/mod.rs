//! Progress reporting module
//!
//! A spinner that counts completed items and transferred bytes while a
//! pipeline run is in flight.

mod reporter;

pub use reporter::*;
