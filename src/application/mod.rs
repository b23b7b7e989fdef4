pub mod use_cases;

pub use use_cases::codebook_builder::{generate_codebook, load_codebook};
pub use use_cases::column_mapping::{generate_column_mappings, MappingKind};
pub use use_cases::column_transformer::{coalesce_multiselect, rename_columns, CodebookTransform};
pub use use_cases::sync_orchestrator::{SyncOptions, SyncOrchestrator, SyncReport};
