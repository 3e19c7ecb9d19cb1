//! Infrastructure layer

pub mod canonical;
pub mod diff;
pub mod logger;
pub mod yaml_stream;
