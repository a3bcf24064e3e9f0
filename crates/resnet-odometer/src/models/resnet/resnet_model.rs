//! # `ResNet` Backbone
//!
//! [`ResNet`] is the headless `ResNet` feature extractor:
//! a [`ResNetStem`] followed by four [`LayerBlock`] stages.
//!
//! [`ResNetConfig`] implements [`Config`], and provides a high-level configuration
//! interface; [`ResNetConfig::to_structure`] converts it to a [`ResNetStructureConfig`],
//! and [`ResNetStructureConfig::init`] initializes a [`ResNet`].
//!
//! The stages run at strides ``[1, 2, 2, 2]`` with widths
//! ``stage_base * [1, 2, 4, 8]``; where ``stage_base`` is the base plane count
//! times the block kind's `base_plane_multiplier`.

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::init::WeightInit;
use crate::models::resnet::block_kind::ResidualBlockKind;
use crate::models::resnet::layer_block::{LayerBlock, LayerBlockConfig, LayerBlockMeta};
use crate::models::resnet::stem::{ResNetStem, ResNetStemConfig};
use crate::models::resnet::util::{SPATIAL_COMPRESSION_STEPS, halved_resolution};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::module::Module;
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Tensor};

/// `ResNet`-18 block depths.
pub const RESNET18_BLOCKS: [usize; 4] = [2, 2, 2, 2];
/// `ResNet`-50 block depths.
pub const RESNET50_BLOCKS: [usize; 4] = [3, 4, 6, 3];
/// `ResNet`-101 block depths.
pub const RESNET101_BLOCKS: [usize; 4] = [3, 4, 23, 3];

/// Per-stage strides.
pub const STAGE_STRIDES: [usize; 4] = [1, 2, 2, 2];

/// [`ResNet`] Meta API.
pub trait ResNetMeta {
    /// The number of input image channels.
    fn in_channels(&self) -> usize;

    /// The channel count of the backbone output.
    fn final_channels(&self) -> usize;

    /// The number of stride-2 reductions; always [`SPATIAL_COMPRESSION_STEPS`].
    fn spatial_compression_steps(&self) -> usize {
        SPATIAL_COMPRESSION_STEPS
    }

    /// Predict the backbone output ``[height, width]`` for an input resolution.
    ///
    /// Each reduction maps ``s -> (s - 1) / 2 + 1``.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        halved_resolution(input_resolution, self.spatial_compression_steps())
    }
}

/// High-level [`ResNet`] configuration.
#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// The number of input image channels.
    pub in_channels: usize,

    /// The stem width, and the stage-1 width before the block multiplier.
    pub base_planes: usize,

    /// `GroupNorm` group count for every norm layer.
    pub ngroups: usize,

    /// The residual block family.
    pub block: ResidualBlockKind,

    /// Stage depths.
    pub layers: [usize; 4],

    /// Grouped-conv paths in the 3x3 convs of each stage's first block.
    #[config(default = 1)]
    pub cardinality: usize,

    /// Activation used throughout.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl ResNetMeta for ResNetConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn final_channels(&self) -> usize {
        self.stage_planes(3) * self.block.expansion()
    }
}

impl ResNetConfig {
    /// The block width of a stage.
    ///
    /// ``base_planes * base_plane_multiplier * 2^stage``
    pub fn stage_planes(
        &self,
        stage: usize,
    ) -> usize {
        (self.base_planes * self.block.spec().base_plane_multiplier) << stage
    }

    /// The abstract norm config shared by every layer.
    pub fn normalization(&self) -> NormalizationConfig {
        NormalizationConfig::group(self.ngroups)
    }

    /// Convert to a [`ResNetStructureConfig`].
    pub fn to_structure(&self) -> ResNetStructureConfig {
        let normalization = self.normalization();

        let stem = ResNetStemConfig::build(
            self.in_channels,
            self.base_planes,
            normalization.clone(),
            self.activation.clone(),
        );

        let mut in_planes = self.base_planes;
        let layers = (0..4)
            .map(|stage| {
                let layer = LayerBlockConfig::build(
                    self.block,
                    self.layers[stage],
                    in_planes,
                    self.stage_planes(stage),
                    STAGE_STRIDES[stage],
                    self.cardinality,
                    normalization.clone(),
                );
                in_planes = layer.out_planes();
                layer
            })
            .collect();

        ResNetStructureConfig { stem, layers }
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.in_channels == 0 {
            return Err("in_channels must be > 0".to_string());
        }
        if self.ngroups == 0 {
            return Err("ngroups must be > 0".to_string());
        }
        if self.layers.contains(&0) {
            return Err(format!("every stage needs a block: {:?}", self.layers));
        }
        self.to_structure().try_validate()
    }

    /// Initialize a [`ResNet`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNet<B> {
        self.to_structure().init(device)
    }
}

/// [`ResNet`] Structure Config.
///
/// The concrete stem and stage configs of a converted [`ResNetConfig`].
#[derive(Config, Debug)]
pub struct ResNetStructureConfig {
    /// The input stem.
    pub stem: ResNetStemConfig,

    /// The stages.
    pub layers: Vec<LayerBlockConfig>,
}

impl ResNetMeta for ResNetStructureConfig {
    fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    fn final_channels(&self) -> usize {
        match self.layers.last() {
            Some(layer) => layer.out_planes(),
            None => self.stem.out_channels(),
        }
    }
}

impl ResNetStructureConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        self.stem.try_validate()?;

        let mut planes = self.stem.out_channels();
        for (idx, layer) in self.layers.iter().enumerate() {
            layer
                .try_validate()
                .map_err(|err| format!("layer[{idx}]: {err}"))?;
            if layer.in_planes() != planes {
                return Err(format!(
                    "layer[{idx}].in_planes({}) != {planes}",
                    layer.in_planes()
                ));
            }
            planes = layer.out_planes();
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Initialize a [`ResNet`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ResNet<B> {
        self.expect_valid();

        ResNet {
            stem: self.stem.init(device),
            layers: self
                .layers
                .into_iter()
                .map(|layer| layer.init(device))
                .collect(),
        }
    }
}

/// Headless `ResNet` backbone.
///
/// Implements [`ResNetMeta`].
#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    /// Input stem.
    pub stem: ResNetStem<B>,

    /// Stages.
    pub layers: Vec<LayerBlock<B>>,
}

impl<B: Backend> ResNetMeta for ResNet<B> {
    fn in_channels(&self) -> usize {
        self.stem.in_channels()
    }

    fn final_channels(&self) -> usize {
        match self.layers.last() {
            Some(layer) => layer.out_planes(),
            None => self.stem.out_channels(),
        }
    }
}

impl<B: Backend> WeightInit for ResNet<B> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        Self {
            stem: self.stem.init_weights(initializer),
            layers: self.layers.init_weights(initializer),
        }
    }
}

impl<B: Backend> ResNet<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, final_channels, out_height, out_width]``;
    /// see [`ResNetMeta::output_resolution`].
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.stem.forward(input);
        let x = self.layers.iter().fold(x, |x, layer| layer.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.final_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::residual_block::ResidualBlockConfig;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_resnet18_structure() {
        let config = ResNetConfig::new(4, 32, 32, ResidualBlockKind::Basic, RESNET18_BLOCKS);
        assert_eq!(config.in_channels(), 4);
        assert_eq!(config.stage_planes(0), 32);
        assert_eq!(config.stage_planes(3), 256);
        assert_eq!(config.final_channels(), 256);
        assert_eq!(config.spatial_compression_steps(), 5);
        assert_eq!(config.output_resolution([120, 213]), [4, 7]);
        assert!(config.try_validate().is_ok());

        let structure = config.to_structure();
        assert_eq!(structure.final_channels(), 256);
        assert_eq!(structure.stem.out_channels(), 32);
        assert_eq!(structure.layers.len(), 4);

        let strides: Vec<usize> = structure.layers.iter().map(|l| l.stride()).collect();
        assert_eq!(strides, vec![1, 2, 2, 2]);

        let widths: Vec<usize> = structure.layers.iter().map(|l| l.out_planes()).collect();
        assert_eq!(widths, vec![32, 64, 128, 256]);

        assert!(structure.layers.iter().all(|l| l.len() == 2));
    }

    #[test]
    fn test_resnext_structure() {
        let config = ResNetConfig::new(
            4,
            32,
            32,
            ResidualBlockKind::SEResNeXtBottleneck,
            RESNET50_BLOCKS,
        )
        .with_cardinality(16);
        assert_eq!(config.stage_planes(0), 64);
        assert_eq!(config.final_channels(), 1024);
        assert!(config.try_validate().is_ok());

        let structure = config.to_structure();
        assert_eq!(structure.stem.out_channels(), 32);
        assert_eq!(structure.layers[0].in_planes(), 32);
        assert_eq!(structure.layers[0].out_planes(), 128);
        assert_eq!(structure.layers[2].len(), 6);

        for layer in &structure.layers {
            for (idx, block) in layer.blocks.iter().enumerate() {
                match block {
                    ResidualBlockConfig::Bottleneck(inner) => {
                        let expected = if idx == 0 { 16 } else { 1 };
                        assert_eq!(inner.cardinality, expected);
                        assert_eq!(inner.expansion_factor, 2);
                        assert!(inner.se_reduction.is_some());
                    }
                    _ => panic!("Unexpected config type"),
                }
            }
        }
    }

    #[test]
    fn test_try_validate() {
        let config = ResNetConfig::new(4, 32, 32, ResidualBlockKind::Basic, [2, 0, 2, 2]);
        assert_eq!(
            config.try_validate(),
            Err("every stage needs a block: [2, 0, 2, 2]".to_string())
        );

        let config = ResNetConfig::new(4, 24, 16, ResidualBlockKind::Basic, RESNET18_BLOCKS);
        assert_eq!(
            config.try_validate(),
            Err("GroupNorm num_groups(16) does not divide num_channels(24)".to_string())
        );

        let config = ResNetConfig::new(0, 32, 32, ResidualBlockKind::Basic, RESNET18_BLOCKS);
        assert!(config.try_validate().is_err());
    }

    #[test]
    fn test_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = ResNetConfig::new(4, 8, 4, ResidualBlockKind::Basic, [1, 1, 1, 1]);
        let model: ResNet<B> = config.init(&device);
        assert_eq!(model.in_channels(), 4);
        assert_eq!(model.final_channels(), 64);
        assert_eq!(model.layers.len(), 4);

        let input = Tensor::random([2, 4, 53, 71], Distribution::Default, &device);
        let output = model.forward(input);

        assert_eq!(
            config.output_resolution([53, 71]),
            model.output_resolution([53, 71])
        );
        let [out_height, out_width] = config.output_resolution([53, 71]);
        assert_eq!([out_height, out_width], [2, 3]);
        assert_eq!(output.dims(), [2, 64, out_height, out_width]);
    }

    #[test]
    fn test_bottleneck_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let config = ResNetConfig::new(2, 8, 4, ResidualBlockKind::SEBottleneck, [1, 1, 1, 1]);
        let model: ResNet<B> = config.init(&device);
        assert_eq!(model.final_channels(), 256);

        let input = Tensor::random([1, 2, 32, 40], Distribution::Default, &device);
        let output = model.forward(input);
        assert_eq!(output.dims(), [1, 256, 1, 2]);
    }
}
