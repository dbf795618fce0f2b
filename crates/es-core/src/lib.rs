//! es-core: stable foundation for energy-sweep.
//!
//! Contains:
//! - scenario (climate pathway keys + aging codes)
//! - years (filename and result-matrix year ranges)
//! - naming (simulation / weather artifact name parsing)
//! - error (shared parse errors)

pub mod error;
pub mod naming;
pub mod scenario;
pub mod years;

// Re-exports: nice ergonomics for downstream crates
pub use error::{ParseError, ParseResult};
pub use naming::*;
pub use scenario::*;
pub use years::*;
