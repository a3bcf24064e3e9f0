//! # Compat
//!
//! Layer abstractions that later `burn` releases ship natively,
//! carried here for `burn` 0.18.
pub mod activation_wrapper;
pub mod conv_shape;
pub mod normalization_wrapper;
