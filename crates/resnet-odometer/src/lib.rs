#![warn(missing_docs)]
//!# resnet-odometer - `ResNet` Encoders for Visual Odometry
//!
//! ## Notable Components
//!
//! * [`compat`] - compat code, ported or planned for an upcoming release of ``burn``.
//!   * [`compat::activation_wrapper::Activation`] - activation layer abstraction wrapper.
//!   * [`compat::normalization_wrapper::Normalization`] - norm layer abstraction wrapper.
//!   * [`compat::conv_shape`] - conv / pool output shape arithmetic.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::blocks`] - conv/norm/act blocks.
//!   * [`layers::squeeze_excite`] - squeeze-excite channel gate.
//!   * [`layers::init`] - weight (re-)initialization traversal.
//! * [`models`] - complete model families.
//!   * [`models::resnet`] - `ResNet`, `SE-ResNet`, `ResNeXt`, `SE-ResNeXt` backbones.
//!   * [`models::odometer`] - [`models::odometer::encoder::ResNetEncoderForOdometer`].

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;
pub mod layers;
pub mod models;
