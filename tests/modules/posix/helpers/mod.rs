//! Test helper utilities

pub mod builders;
pub mod environment;
pub mod recording;
