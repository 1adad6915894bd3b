//! Verification harness
//!
//! Case selection, request invocation, response checks and pacing for a
//! single virtual user. The scheduler drives many of these concurrently.

pub mod catalog;
pub mod checks;
mod invoker;
mod iteration;
mod pacer;

#[cfg(test)]
pub mod stub;

pub use catalog::{Catalog, CaseSelector};
pub use checks::CheckSettings;
pub use invoker::{build_url, RequestInvoker};
pub use iteration::{Harness, VirtualUser};
pub use pacer::Pacer;
