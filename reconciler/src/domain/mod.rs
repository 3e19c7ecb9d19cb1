//! Domain layer

pub mod agent_config;
pub mod desired_config;
pub mod devfile;
pub mod keys;
pub mod types;
pub mod workspace;
