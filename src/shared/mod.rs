pub mod text_normalizer;
