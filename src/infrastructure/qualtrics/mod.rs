pub mod client;
pub mod fetcher;

pub use client::{ClientConfig, QualtricsClient};
pub use fetcher::QualtricsResponseFetcher;
