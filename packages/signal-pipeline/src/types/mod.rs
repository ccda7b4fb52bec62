//! Data types flowing through the pipeline.

pub mod job;
pub mod raw;
pub mod signal;
