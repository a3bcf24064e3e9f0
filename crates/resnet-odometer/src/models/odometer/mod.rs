//! # Visual Odometry Encoder
//!
//! A `ResNet` encoder over paired source/target observations.

pub mod encoder;
pub mod modality;
