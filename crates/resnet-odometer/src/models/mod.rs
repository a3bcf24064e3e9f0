//! # Models
//!
//! * [`resnet`] - the `GroupNorm` `ResNet` backbone family.
//! * [`odometer`] - the visual odometry encoder.
pub mod odometer;
pub mod resnet;
