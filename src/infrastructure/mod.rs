#[path = "config/mod.rs"]
pub mod config_mod;
pub use config_mod as config;
pub mod csv;
pub mod db;
pub mod qualtrics;
pub mod security;
pub mod sheets;
pub mod storage;
