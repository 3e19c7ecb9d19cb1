//! Service layer - the reconciliation output pipeline

pub mod config_to_apply_builder;
pub mod config_values_extractor;
pub mod desired_config_fetcher;
pub mod desired_config_generator;
pub mod devfile_parser;
pub mod response_payload_builder;
pub mod response_payload_observer;
pub mod shadow_run_handler;
