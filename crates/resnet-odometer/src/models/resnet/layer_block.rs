//! # `ResNet` Layer Block
//!
//! A [`LayerBlock`] is one `ResNet` stage: a sequence of [`ResidualBlock`]s,
//! where only the first block strides or changes the channel count.
//!
//! [`LayerBlockMeta`] defines a common meta API for [`LayerBlock`]
//! and [`LayerBlockConfig`].
//!
//! [`LayerBlockConfig`] implements [`Config`], and provides
//! [`LayerBlockConfig::init`] to initialize a [`LayerBlock`].

use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::init::WeightInit;
use crate::models::resnet::block_kind::ResidualBlockKind;
use crate::models::resnet::residual_block::{
    ResidualBlock, ResidualBlockConfig, ResidualBlockMeta,
};
use crate::models::resnet::util::strided_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::nn::Initializer;
use burn::prelude::{Backend, Module, Tensor};

/// [`LayerBlock`] Meta API.
pub trait LayerBlockMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the layer block is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// Get the effective stride of the layers.
    fn stride(&self) -> usize;

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

/// [`LayerBlock`] Configuration.
#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlockConfig>,
}

impl From<Vec<ResidualBlockConfig>> for LayerBlockConfig {
    fn from(blocks: Vec<ResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl LayerBlockMeta for LayerBlockConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl LayerBlockConfig {
    /// Build a stage config.
    ///
    /// The first block maps ``in_planes -> planes * expansion`` at `stride`,
    /// with `cardinality` grouped paths;
    /// the remaining blocks keep the width at stride 1, ungrouped.
    ///
    /// # Arguments
    ///
    /// - `kind`: the block family.
    /// - `num_blocks`: the number of blocks in the stage.
    /// - `in_planes`: stage input channels.
    /// - `planes`: block width.
    /// - `stride`: stride of the first block.
    /// - `cardinality`: grouped-conv paths of the first block.
    /// - `normalization`: the abstract norm config.
    pub fn build(
        kind: ResidualBlockKind,
        num_blocks: usize,
        in_planes: usize,
        planes: usize,
        stride: usize,
        cardinality: usize,
        normalization: NormalizationConfig,
    ) -> Self {
        let out_planes = planes * kind.expansion();
        let blocks = (0..num_blocks)
            .map(|b| {
                let (block_in, block_stride, block_cardinality) = if b == 0 {
                    (in_planes, stride, cardinality)
                } else {
                    (out_planes, 1, 1)
                };
                ResidualBlockConfig::build(
                    kind,
                    block_in,
                    planes,
                    block_stride,
                    block_cardinality,
                    normalization.clone(),
                )
            })
            .collect();

        Self { blocks }
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }

        for (idx, block) in self.blocks.iter().enumerate() {
            block
                .try_validate()
                .map_err(|err| format!("block[{idx}]: {err}"))?;
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_planes() != curr.in_planes() {
                return Err(format!(
                    "block[{}].out_planes({}) != block[{}].in_planes({})",
                    idx - 1,
                    prev.out_planes(),
                    idx,
                    curr.in_planes(),
                ));
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Initialize a new [`LayerBlock`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> LayerBlock<B> {
        self.expect_valid();

        LayerBlock {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }
}

/// Layer block.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> LayerBlockMeta for LayerBlock<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_planes(&self) -> usize {
        self.blocks[0].in_planes()
    }

    fn out_planes(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_planes()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> WeightInit for LayerBlock<B> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        Self {
            blocks: self.blocks.init_weights(initializer),
        }
    }
}

impl<B: Backend> LayerBlock<B> {
    /// Apply the layer block.
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
            &[("in_planes", self.in_planes())],
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.blocks.iter().fold(input, |x, block| block.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ],
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_build_basic_stage() {
        let config = LayerBlockConfig::build(
            ResidualBlockKind::Basic,
            2,
            16,
            32,
            2,
            1,
            NormalizationConfig::group(8),
        );
        assert_eq!(config.len(), 2);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 32);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.blocks[0].stride(), 2);
        assert_eq!(config.blocks[1].stride(), 1);
        assert_eq!(config.blocks[1].in_planes(), 32);
        assert_eq!(config.output_resolution([15, 30]), [8, 15]);
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_build_bottleneck_stage() {
        let config = LayerBlockConfig::build(
            ResidualBlockKind::Bottleneck,
            3,
            32,
            32,
            1,
            1,
            NormalizationConfig::group(8),
        );
        assert_eq!(config.len(), 3);
        assert_eq!(config.in_planes(), 32);
        assert_eq!(config.out_planes(), 128);
        assert_eq!(config.stride(), 1);
        assert_eq!(config.blocks[1].in_planes(), 128);
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_only_first_block_is_grouped() {
        let config = LayerBlockConfig::build(
            ResidualBlockKind::ResNeXtBottleneck,
            4,
            64,
            64,
            2,
            16,
            NormalizationConfig::group(16),
        );
        assert_eq!(config.blocks[0].cardinality(), 16);
        for block in &config.blocks[1..] {
            assert_eq!(block.cardinality(), 1);
            assert_eq!(block.stride(), 1);
            assert_eq!(block.in_planes(), 128);
        }
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_try_validate() {
        let config = LayerBlockConfig::new(vec![]);
        assert_eq!(config.try_validate(), Err("blocks is empty".to_string()));

        let norm = NormalizationConfig::group(4);
        let config: LayerBlockConfig = vec![
            ResidualBlockConfig::build(ResidualBlockKind::Basic, 8, 16, 1, 1, norm.clone()),
            ResidualBlockConfig::build(ResidualBlockKind::Basic, 8, 16, 1, 1, norm.clone()),
        ]
        .into();
        assert_eq!(
            config.try_validate(),
            Err("block[0].out_planes(16) != block[1].in_planes(8)".to_string())
        );

        let config = LayerBlockConfig::build(ResidualBlockKind::Basic, 1, 8, 10, 1, 1, norm);
        assert_eq!(
            config.try_validate(),
            Err("block[0]: GroupNorm num_groups(4) does not divide num_channels(10)".to_string())
        );
    }

    #[test]
    #[should_panic(expected = "blocks is empty")]
    fn test_init_empty_panics() {
        type B = NdArray<f32>;
        let device = Default::default();
        let _layer: LayerBlock<B> = LayerBlockConfig::new(vec![]).init(&device);
    }

    #[test]
    fn test_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: LayerBlock<B> = LayerBlockConfig::build(
            ResidualBlockKind::Basic,
            2,
            4,
            8,
            2,
            1,
            NormalizationConfig::group(4),
        )
        .init(&device);
        assert_eq!(layer.len(), 2);
        assert_eq!(layer.in_planes(), 4);
        assert_eq!(layer.out_planes(), 8);
        assert_eq!(layer.stride(), 2);

        let input = Tensor::random([2, 4, 9, 13], Distribution::Default, &device);
        let output = layer.forward(input.clone());
        assert_eq!(output.dims(), [2, 8, 5, 7]);

        let expected = layer.blocks[1].forward(layer.blocks[0].forward(input));
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
