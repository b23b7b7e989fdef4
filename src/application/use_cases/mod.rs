pub mod codebook_builder;
pub mod column_mapping;
pub mod column_transformer;
pub mod sync_orchestrator;
