//! # Normalization Wrapper
//!
//! Provides support for the channel-wise ``burn::nn::norm`` norm layers
//! usable on ``[batch, channels, height, width]`` feature maps:
//! * [`Batch`] - [`BatchNorm`]
//! * [`Group`] - [`GroupNorm`]
//! * [`Instance`] - [`InstanceNorm`]
//!
//! The encoder family normalizes with [`GroupNorm`] throughout;
//! the other variants are accepted for the optional input normalization.
//!
//! The enum is non-exhaustive, to prepare for future additions.

use burn::nn::{
    BatchNorm, BatchNormConfig, GroupNorm, GroupNormConfig, InstanceNorm, InstanceNormConfig,
};
use burn::prelude::{Backend, Config, Module, Tensor};

/// ['Normalization'] Configuration.
///
/// The enum is non-exhaustive to prepare for future additions.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum NormalizationConfig {
    /// ['`BatchNorm`'] Configuration.
    Batch(BatchNormConfig),

    /// ['`GroupNorm`'] Configuration.
    Group(GroupNormConfig),

    /// ['`InstanceNorm`'] Configuration.
    Instance(InstanceNormConfig),
}

impl From<BatchNormConfig> for NormalizationConfig {
    fn from(config: BatchNormConfig) -> Self {
        Self::Batch(config)
    }
}

impl From<GroupNormConfig> for NormalizationConfig {
    fn from(config: GroupNormConfig) -> Self {
        Self::Group(config)
    }
}

impl From<InstanceNormConfig> for NormalizationConfig {
    fn from(config: InstanceNormConfig) -> Self {
        Self::Instance(config)
    }
}

impl NormalizationConfig {
    /// Abstract [`GroupNorm`] config with `num_groups` groups.
    ///
    /// The channel count is a placeholder; it is matched to the
    /// producing layer by [`NormalizationConfig::with_num_features`].
    pub fn group(num_groups: usize) -> Self {
        GroupNormConfig::new(num_groups, num_groups).into()
    }

    /// Initialize a ['Norm'] layer.
    ///
    /// # Panics
    ///
    /// Burn rejects a [`GroupNorm`] whose channel count is not a multiple of its group count.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Normalization<B> {
        match self {
            NormalizationConfig::Batch(config) => config.init(device).into(),
            NormalizationConfig::Group(config) => config.init(device).into(),
            NormalizationConfig::Instance(config) => config.init(device).into(),
        }
    }

    /// Adjust a norm config to the feature size.
    pub fn with_num_features(
        self,
        num_features: usize,
    ) -> Self {
        match self {
            NormalizationConfig::Batch(config) => BatchNormConfig {
                num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Group(config) => GroupNormConfig {
                num_channels: num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Instance(config) => InstanceNormConfig {
                num_channels: num_features,
                ..config
            }
            .into(),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            NormalizationConfig::Batch(config) => config.num_features,
            NormalizationConfig::Group(config) => config.num_channels,
            NormalizationConfig::Instance(config) => config.num_channels,
        }
    }

    /// Check that the norm can be sized to `num_features` channels.
    pub fn try_validate_features(
        &self,
        num_features: usize,
    ) -> Result<(), String> {
        match self {
            NormalizationConfig::Group(config) if num_features % config.num_groups != 0 => {
                Err(format!(
                    "GroupNorm num_groups({}) does not divide num_channels({})",
                    config.num_groups, num_features
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Normalization Layer Wrapper
///
/// Provides support for built-in ``burn::nn::norm`` norm layers:
/// * [`Batch`] - [`BatchNorm`]
/// * [`Group`] - [`GroupNorm`]
/// * [`Instance`] - [`InstanceNorm`]
///
/// The enum is non-exhaustive, to prepare for future additions.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Normalization<B: Backend> {
    /// [`BatchNorm`] layer; restricted to `BatchNorm`<2>.
    Batch(BatchNorm<B, 2>),

    /// [`GroupNorm`] layer.
    Group(GroupNorm<B>),

    /// ['`InstanceNorm`'] layer.
    Instance(InstanceNorm<B>),
}

impl<B: Backend> From<BatchNorm<B, 2>> for Normalization<B> {
    fn from(layer: BatchNorm<B, 2>) -> Self {
        Self::Batch(layer)
    }
}

impl<B: Backend> From<GroupNorm<B>> for Normalization<B> {
    fn from(layer: GroupNorm<B>) -> Self {
        Self::Group(layer)
    }
}

impl<B: Backend> From<InstanceNorm<B>> for Normalization<B> {
    fn from(layer: InstanceNorm<B>) -> Self {
        Self::Instance(layer)
    }
}

impl<B: Backend> Normalization<B> {
    /// Applies normalization to a tensor.
    ///
    /// The normalization contract depends upon the wrapped norm layer;
    /// but all norm layers assume an input of at least rank 2;
    /// and produce an output of the same rank and shape.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Normalization::Batch(norm) => norm.forward(input),
            Normalization::Group(norm) => norm.forward(input),
            Normalization::Instance(norm) => norm.forward(input),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            Normalization::Batch(norm) => norm.gamma.shape().dims[0],
            Normalization::Group(norm) => norm.num_channels,
            Normalization::Instance(norm) => norm.num_channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    #[test]
    fn test_with_num_features() {
        let config = NormalizationConfig::group(4).with_num_features(32);
        assert_eq!(config.num_features(), 32);
        match &config {
            NormalizationConfig::Group(inner) => assert_eq!(inner.num_groups, 4),
            _ => panic!("Unexpected config type"),
        }

        let config: NormalizationConfig = BatchNormConfig::new(0).into();
        assert_eq!(config.with_num_features(12).num_features(), 12);
    }

    #[test]
    fn test_try_validate_features() {
        let config = NormalizationConfig::group(32);
        assert!(config.try_validate_features(64).is_ok());
        assert_eq!(
            config.try_validate_features(48),
            Err("GroupNorm num_groups(32) does not divide num_channels(48)".to_string())
        );

        let config: NormalizationConfig = InstanceNormConfig::new(0).into();
        assert!(config.try_validate_features(7).is_ok());
    }

    #[test]
    fn test_group_norm() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let num_features = 12;
        let input: Tensor<B, 4> = Tensor::ones([2, num_features, 3, 4], &device);

        let config: NormalizationConfig = GroupNormConfig::new(3, num_features).into();

        let layer: Normalization<B> = config.init(&device);
        assert_eq!(layer.num_features(), num_features);

        let expected = match &layer {
            Normalization::Group(inner) => inner.forward(input.clone()),
            _ => panic!("Unexpected layer type"),
        };

        let output = layer.forward(input);

        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_instance_norm() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let num_features = 4;
        let input: Tensor<B, 4> = Tensor::ones([2, num_features, 3, 4], &device);

        let config: NormalizationConfig = InstanceNormConfig::new(num_features).into();

        let layer: Normalization<B> = config.init(&device);
        assert_eq!(layer.num_features(), num_features);

        let expected = match &layer {
            Normalization::Instance(inner) => inner.forward(input.clone()),
            _ => panic!("Unexpected layer type"),
        };

        let output = layer.forward(input);

        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
