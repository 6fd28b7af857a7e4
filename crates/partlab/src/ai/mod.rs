//! Optional AI part descriptions.
//!
//! Compiled with the "ai" feature flag; without it a template-based stub
//! provides the same API so callers never need their own cfg gates.

#[cfg(feature = "ai")]
pub mod describer;

#[cfg(not(feature = "ai"))]
pub mod describer_stub;

#[cfg(feature = "ai")]
pub use describer::{DescriberError, PartDescriber, PartDescription};

#[cfg(not(feature = "ai"))]
pub use describer_stub::{DescriberError, PartDescriber, PartDescription};
