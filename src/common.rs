pub mod amount_normalizer;
pub mod date_normalizer;
pub mod error;
