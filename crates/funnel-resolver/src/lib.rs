//! Resolution layer for cartprobe: turning an intent into something
//! clickable on a hostile page.
//!
//! Three cooperating pieces, all stateless between steps:
//!
//! - [`AddressResolver`]: the oracle → heuristic → text → vision
//!   cascade that maps an intent to ranked element addresses
//! - [`OverlaySuppressor`]: bounded-pass popup/modal clearing
//! - [`OptionRemediator`]: prerequisite form-control fills for
//!   disabled action buttons

pub mod heuristics;
pub mod remediator;
pub mod resolver;
pub mod suppressor;

pub use remediator::{OptionRemediator, RemediationReport};
pub use resolver::AddressResolver;
pub use suppressor::{OverlaySuppressor, SuppressionReport};
