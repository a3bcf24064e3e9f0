//! # `ResNet`
//!
//! A `GroupNorm` `ResNet` backbone family:
//! `ResNet`, `SE-ResNet`, `ResNeXt` and `SE-ResNeXt`; without classifier heads.

pub mod basic_block;
pub mod block_kind;
pub mod bottleneck;
pub mod downsample;
pub mod layer_block;
pub mod prefabs;
pub mod residual_block;
pub mod resnet_model;
pub mod stem;
pub mod util;
