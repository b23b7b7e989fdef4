pub mod app_config;
pub mod codebook;
pub mod error;
pub mod export_request;
pub mod response_batch;
pub mod store_names;
pub mod survey_definition;
pub mod sync_cursor;
