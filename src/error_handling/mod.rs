//! Error taxonomy and error statistics.
//!
//! [`RelayError`] is the single error type flowing out of the dispatch
//! layer; the route layer maps its variants onto HTTP responses.
//! [`ErrorStats`] keeps process-wide counters per failure class for the
//! status endpoint and the shutdown summary.

mod stats;
mod types;

pub use stats::{ErrorStats, ErrorType};
pub use types::{InitializationError, RelayError};
