//! Composite conv blocks.
pub mod cna;
pub mod conv_norm;
