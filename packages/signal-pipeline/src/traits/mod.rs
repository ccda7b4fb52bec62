//! Seams between the pipeline and the outside world.
//!
//! Applications implement these to plug in job sources, an alert transport
//! and storage.

pub mod notifier;
pub mod producer;
pub mod store;
