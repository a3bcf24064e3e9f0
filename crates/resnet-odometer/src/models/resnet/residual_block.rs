//! # Residual Block Wrapper
//!
//! [`ResidualBlockConfig::build`] maps a [`ResidualBlockKind`] to the concrete
//! [`BasicBlockConfig`] or [`BottleneckBlockConfig`] for that family.

use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::init::WeightInit;
use crate::layers::squeeze_excite::DEFAULT_SE_REDUCTION;
use crate::models::resnet::basic_block::{BasicBlock, BasicBlockConfig, BasicBlockMeta};
use crate::models::resnet::block_kind::ResidualBlockKind;
use crate::models::resnet::bottleneck::{
    BottleneckBlock, BottleneckBlockConfig, BottleneckBlockMeta,
};
use crate::models::resnet::util::strided_output_resolution;
use burn::config::Config;
use burn::nn::Initializer;
use burn::prelude::{Backend, Module, Tensor};

/// [`ResidualBlock`] Meta API.
pub trait ResidualBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The stride of convolution.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// Number of grouped-convolution paths in the 3x3 convs.
    fn cardinality(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        strided_output_resolution(input_resolution, self.stride())
    }
}

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub enum ResidualBlockConfig {
    /// A `ResNet` [`BasicBlock`].
    Basic(BasicBlockConfig),

    /// A `ResNet` [`BottleneckBlock`].
    Bottleneck(BottleneckBlockConfig),
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.in_planes(),
            Self::Bottleneck(config) => config.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(config) => config.out_planes(),
            Self::Bottleneck(config) => config.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(config) => config.stride(),
            Self::Bottleneck(config) => config.stride(),
        }
    }

    fn cardinality(&self) -> usize {
        match self {
            Self::Basic(config) => config.cardinality(),
            Self::Bottleneck(config) => config.cardinality(),
        }
    }
}

impl From<BasicBlockConfig> for ResidualBlockConfig {
    fn from(config: BasicBlockConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<BottleneckBlockConfig> for ResidualBlockConfig {
    fn from(config: BottleneckBlockConfig) -> Self {
        Self::Bottleneck(config)
    }
}

impl ResidualBlockConfig {
    /// Build the block config for a block family.
    ///
    /// # Arguments
    ///
    /// - `kind`: the block family.
    /// - `in_planes`: input channels.
    /// - `planes`: block width; ``out_planes = planes * kind.expansion()``.
    /// - `stride`: spatial stride of the block.
    /// - `cardinality`: grouped-conv paths in the 3x3 convs.
    /// - `normalization`: the abstract norm config.
    pub fn build(
        kind: ResidualBlockKind,
        in_planes: usize,
        planes: usize,
        stride: usize,
        cardinality: usize,
        normalization: NormalizationConfig,
    ) -> Self {
        let spec = kind.spec();
        if kind.is_bottleneck() {
            BottleneckBlockConfig::new(in_planes, planes)
                .with_expansion_factor(spec.expansion)
                .with_stride(stride)
                .with_cardinality(cardinality)
                .with_se_reduction(spec.uses_se.then_some(DEFAULT_SE_REDUCTION))
                .with_normalization(normalization)
                .into()
        } else {
            BasicBlockConfig::new(in_planes, planes)
                .with_stride(stride)
                .with_cardinality(cardinality)
                .with_normalization(normalization)
                .into()
        }
    }

    /// Check that the block can be built.
    pub fn try_validate(&self) -> Result<(), String> {
        match self {
            Self::Basic(config) => config.try_validate(),
            Self::Bottleneck(config) => config.try_validate(),
        }
    }

    /// Initialize a [`ResidualBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        match self {
            Self::Basic(config) => ResidualBlock::Basic(config.clone().init(device)),
            Self::Bottleneck(config) => ResidualBlock::Bottleneck(config.clone().init(device)),
        }
    }
}

/// A `ResNet` [`BasicBlock`] or [`BottleneckBlock`] wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ResidualBlock<B: Backend> {
    /// A `ResNet` [`BasicBlock`].
    Basic(BasicBlock<B>),

    /// A `ResNet` [`BottleneckBlock`].
    Bottleneck(BottleneckBlock<B>),
}

impl<B: Backend> From<BasicBlock<B>> for ResidualBlock<B> {
    fn from(block: BasicBlock<B>) -> Self {
        Self::Basic(block)
    }
}

impl<B: Backend> From<BottleneckBlock<B>> for ResidualBlock<B> {
    fn from(block: BottleneckBlock<B>) -> Self {
        Self::Bottleneck(block)
    }
}

impl<B: Backend> ResidualBlockMeta for ResidualBlock<B> {
    fn in_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.in_planes(),
            Self::Bottleneck(block) => block.in_planes(),
        }
    }

    fn out_planes(&self) -> usize {
        match self {
            Self::Basic(block) => block.out_planes(),
            Self::Bottleneck(block) => block.out_planes(),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Basic(block) => block.stride(),
            Self::Bottleneck(block) => block.stride(),
        }
    }

    fn cardinality(&self) -> usize {
        match self {
            Self::Basic(block) => block.cardinality(),
            Self::Bottleneck(block) => block.cardinality(),
        }
    }
}

impl<B: Backend> WeightInit for ResidualBlock<B> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        match self {
            Self::Basic(block) => block.init_weights(initializer).into(),
            Self::Bottleneck(block) => block.init_weights(initializer).into(),
        }
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// Apply the wrapped block to the input.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Basic(block) => block.forward(input),
            Self::Bottleneck(block) => block.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;

    #[test]
    fn test_build_basic() {
        let cfg = ResidualBlockConfig::build(
            ResidualBlockKind::Basic,
            16,
            32,
            2,
            1,
            NormalizationConfig::group(8),
        );
        assert!(matches!(cfg, ResidualBlockConfig::Basic(_)));
        assert_eq!(cfg.in_planes(), 16);
        assert_eq!(cfg.out_planes(), 32);
        assert_eq!(cfg.stride(), 2);
        assert_eq!(cfg.output_resolution([15, 20]), [8, 10]);
        assert!(cfg.try_validate().is_ok());
    }

    #[test]
    fn test_build_bottleneck_kinds() {
        let norm = NormalizationConfig::group(8);

        let cfg = ResidualBlockConfig::build(
            ResidualBlockKind::Bottleneck,
            64,
            32,
            1,
            1,
            norm.clone(),
        );
        assert_eq!(cfg.out_planes(), 128);
        match &cfg {
            ResidualBlockConfig::Bottleneck(inner) => assert!(inner.se_reduction.is_none()),
            _ => panic!("Unexpected config type"),
        }

        let cfg = ResidualBlockConfig::build(
            ResidualBlockKind::SEBottleneck,
            64,
            32,
            1,
            1,
            norm.clone(),
        );
        assert_eq!(cfg.out_planes(), 128);
        match &cfg {
            ResidualBlockConfig::Bottleneck(inner) => {
                assert_eq!(inner.se_reduction, Some(DEFAULT_SE_REDUCTION))
            }
            _ => panic!("Unexpected config type"),
        }

        let cfg = ResidualBlockConfig::build(
            ResidualBlockKind::SEResNeXtBottleneck,
            64,
            64,
            2,
            16,
            norm,
        );
        assert_eq!(cfg.out_planes(), 128);
        assert_eq!(cfg.stride(), 2);
        match &cfg {
            ResidualBlockConfig::Bottleneck(inner) => {
                assert_eq!(inner.cardinality, 16);
                assert_eq!(inner.expansion_factor, 2);
                assert_eq!(inner.se_reduction, Some(DEFAULT_SE_REDUCTION));
            }
            _ => panic!("Unexpected config type"),
        }
        assert!(cfg.try_validate().is_ok());
    }

    #[test]
    fn test_residual_block_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let cfg = ResidualBlockConfig::build(
            ResidualBlockKind::Basic,
            8,
            16,
            2,
            1,
            NormalizationConfig::group(4),
        );

        let block: ResidualBlock<B> = cfg.init(&device);
        assert!(matches!(block, ResidualBlock::Basic(_)));
        assert_eq!(block.in_planes(), 8);
        assert_eq!(block.out_planes(), 16);
        assert_eq!(block.stride(), 2);

        let input = Tensor::ones([2, 8, 7, 10], &device);
        let output = block.forward(input);

        assert_shape_contract!(
            ["batch", "out_planes", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_planes", 16),
                ("out_height", 4),
                ("out_width", 5)
            ],
        );
    }

    #[test]
    fn test_residual_block_bottleneck_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let cfg = ResidualBlockConfig::build(
            ResidualBlockKind::Bottleneck,
            8,
            4,
            2,
            1,
            NormalizationConfig::group(4),
        );

        let block: ResidualBlock<B> = cfg.init(&device);
        assert!(matches!(block, ResidualBlock::Bottleneck(_)));
        assert_eq!(block.out_planes(), 16);

        let input = Tensor::ones([2, 8, 7, 10], &device);
        let output = block.forward(input);
        assert_eq!(output.dims(), [2, 16, 4, 5]);
    }
}
