//! # Basic Block for `ResNet`
//!
//! [`BasicBlock`] is the two-conv `ResNet` residual unit:
//!
//! ```text
//! x -> conv3x3(stride, groups) -> norm -> act
//!   -> conv3x3 -> norm -> (+ shortcut(x)) -> act
//! ```
//!
//! [`BasicBlockMeta`] defines a common meta API for [`BasicBlock`]
//! and [`BasicBlockConfig`].
//!
//! [`BasicBlockConfig`] implements [`Config`], and provides
//! [`BasicBlockConfig::init`] to initialize a [`BasicBlock`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d, CNA2dMeta};
use crate::layers::conv::conv3x3;
use crate::layers::init::WeightInit;
use crate::models::resnet::downsample::{ConvDownsample, ConvDownsampleConfig, needs_downsample};
use crate::models::resnet::util::{DEFAULT_NGROUPS, strided_output_resolution};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`BasicBlock`] Meta trait.
pub trait BasicBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The width of both convs.
    fn planes(&self) -> usize;

    /// Number of grouped-convolution paths in the convs.
    fn cardinality(&self) -> usize;

    /// The stride of the first conv.
    fn stride(&self) -> usize;

    /// The size of the out channels dimension; basic blocks do not expand.
    fn out_planes(&self) -> usize {
        self.planes()
    }

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

/// [`BasicBlock`] Config.
///
/// Implements [`BasicBlockMeta`].
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The width of both convs.
    pub planes: usize,

    /// The stride of the first conv.
    #[config(default = 1)]
    pub stride: usize,

    /// Number of grouped-convolution paths.
    #[config(default = 1)]
    pub cardinality: usize,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    ///
    /// The feature size of this config will be replaced
    /// with the appropriate feature size for the input layer.
    #[config(default = "NormalizationConfig::group(DEFAULT_NGROUPS)")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl BasicBlockMeta for BasicBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn cardinality(&self) -> usize {
        self.cardinality
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BasicBlockConfig {
    /// Check that the block can be built.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.cardinality == 0 {
            return Err("cardinality must be > 0".to_string());
        }
        for planes in [self.in_planes(), self.planes()] {
            if planes % self.cardinality != 0 {
                return Err(format!(
                    "cardinality({}) does not divide grouped width({})",
                    self.cardinality, planes
                ));
            }
        }
        self.normalization.try_validate_features(self.out_planes())
    }

    /// Initialize a [`BasicBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BasicBlock<B> {
        let in_planes = self.in_planes();
        let planes = self.planes();
        let out_planes = self.out_planes();
        let stride = self.stride();

        let downsample: Option<ConvDownsampleConfig> =
            if needs_downsample(in_planes, out_planes, stride) {
                ConvDownsampleConfig::new(in_planes, out_planes)
                    .with_stride(stride)
                    .with_norm(self.normalization.clone())
                    .into()
            } else {
                None
            };

        let cna_builder = AbstractCNA2dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let cna1 = cna_builder.build_config(conv3x3(in_planes, planes, stride, self.cardinality));
        let cna2 = cna_builder.build_config(conv3x3(planes, out_planes, 1, self.cardinality));

        BasicBlock {
            downsample: downsample.map(|cfg| cfg.init(device)),
            cna1: cna1.init(device),
            cna2: cna2.init(device),
        }
    }
}

/// Basic Block for `ResNet`.
///
/// Implements [`BasicBlockMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// Optional shortcut projection.
    pub downsample: Option<ConvDownsample<B>>,

    /// First Conv/Norm/Act Block.
    pub cna1: CNA2d<B>,

    /// Second Conv/Norm/Act Block; the shortcut merges before its activation.
    pub cna2: CNA2d<B>,
}

impl<B: Backend> BasicBlockMeta for BasicBlock<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn planes(&self) -> usize {
        self.cna1.out_channels()
    }

    fn cardinality(&self) -> usize {
        self.cna1.groups()
    }

    fn stride(&self) -> usize {
        self.cna1.stride()[0]
    }

    fn out_planes(&self) -> usize {
        self.cna2.out_channels()
    }
}

impl<B: Backend> WeightInit for BasicBlock<B> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        Self {
            downsample: self.downsample.init_weights(initializer),
            cna1: self.cna1.init_weights(initializer),
            cna2: self.cna2.init_weights(initializer),
        }
    }
}

impl<B: Backend> BasicBlock<B> {
    /// Forward Pass.
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
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_planes())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);
        let out_bindings = [
            ("batch", batch),
            ("out_planes", self.out_planes()),
            ("out_height", out_height),
            ("out_width", out_width),
        ];

        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };
        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &identity,
            &out_bindings
        );

        let x = self.cna1.forward(input);
        let x = self.cna2.hook_forward(x, |x| x + identity);

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &out_bindings
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    #[test]
    fn test_basic_block_config() {
        let config = BasicBlockConfig::new(16, 32);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 1);
        assert_eq!(config.cardinality(), 1);
        assert_eq!(config.output_resolution([15, 16]), [15, 16]);
        assert!(matches!(config.activation, ActivationConfig::Relu));
        assert!(config.try_validate().is_ok());

        let config = config.with_stride(2);
        assert_eq!(config.output_resolution([15, 16]), [8, 8]);

        let config = BasicBlockConfig::new(16, 48);
        assert_eq!(
            config.try_validate(),
            Err("GroupNorm num_groups(32) does not divide num_channels(48)".to_string())
        );
        let config = BasicBlockConfig::new(12, 32).with_cardinality(8);
        assert_eq!(
            config.try_validate(),
            Err("cardinality(8) does not divide grouped width(12)".to_string())
        );
    }

    #[test]
    fn test_basic_block_meta() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(8, 8)
            .with_normalization(NormalizationConfig::group(4))
            .init(&device);

        assert_eq!(block.in_planes(), 8);
        assert_eq!(block.planes(), 8);
        assert_eq!(block.out_planes(), 8);
        assert_eq!(block.stride(), 1);
        assert_eq!(block.cardinality(), 1);
        assert!(block.downsample.is_none());

        let block: BasicBlock<B> = BasicBlockConfig::new(8, 8)
            .with_stride(2)
            .with_normalization(NormalizationConfig::group(4))
            .init(&device);
        assert!(block.downsample.is_some());

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 8)
            .with_normalization(NormalizationConfig::group(4))
            .init(&device);
        assert!(block.downsample.is_some());
    }

    #[test]
    fn test_basic_block_forward_identity_shortcut() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(8, 8)
            .with_normalization(NormalizationConfig::group(4))
            .init(&device);

        let input = Tensor::random([2, 8, 7, 9], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), [2, 8, 7, 9]);

        let expected = {
            let x = block.cna1.forward(input.clone());
            block.cna2.hook_forward(x, |x| x + input)
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_basic_block_forward_downsample() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 8)
            .with_stride(2)
            .with_normalization(NormalizationConfig::group(4))
            .init(&device);

        let input = Tensor::random([2, 4, 15, 9], Distribution::Default, &device);
        let output = block.forward(input.clone());
        assert_eq!(output.dims(), [2, 8, 8, 5]);

        let expected = {
            let identity = block.downsample.as_ref().unwrap().forward(input.clone());
            let x = block.cna1.forward(input);
            block.cna2.hook_forward(x, |x| x + identity)
        };
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[cfg(feature = "wgpu")]
    #[test]
    fn test_grouped_basic_block_forward() {
        type B = burn::backend::Wgpu;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(8, 16)
            .with_cardinality(4)
            .with_stride(2)
            .with_normalization(NormalizationConfig::group(4))
            .init(&device);
        assert_eq!(block.cardinality(), 4);

        let input = Tensor::random([2, 8, 9, 9], Distribution::Default, &device);
        let output = block.forward(input);
        assert_eq!(output.dims(), [2, 16, 5, 5]);
    }
}
