//! Command Routing
//!
//! Every command that passes the safety filter is classified once and routed
//! to one of two backends:
//!
//! ```text
//! text ──► TaskClassifier ──► TaskClass::Simple   ──► "fast" backend,     fast profile
//!                         └─► TaskClass::Creative ──► "creative" backend, creative profile
//! ```
//!
//! The profile fixes the model id, generation budget and turn budget. None of
//! it can be changed per request.

pub mod classifier;
pub mod profile;

pub use classifier::{Classification, ClassificationReason, TaskClass, TaskClassifier};
pub use profile::ModelProfile;
