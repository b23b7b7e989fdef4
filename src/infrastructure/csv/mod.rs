// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// Response export parsing

pub mod export_parser;

pub use export_parser::ExportCsvParser;
