//! # `ResNet` Encoder for Visual Odometry
//!
//! [`ResNetEncoderForOdometer`] maps a paired source/target observation to a
//! fixed-size representation vector:
//!
//! ```text
//! [batch, 2 * input_channels, h, w]
//!   -> arrange frames         [rgb_src, depth_src, rgb_tgt, depth_tgt]
//!   -> avg_pool(3, stride 3)  [batch, cnn_channels, h0, w0]
//!   -> input_norm?
//!   -> backbone               [batch, final_channels, h', w']
//!   -> conv3x3 -> GroupNorm(1) -> relu
//!                             [batch, k, h', w'],  k = round(2048 / (h' * w'))
//!   -> flatten -> linear -> relu
//!                             [batch, repr_size]
//! ```
//!
//! Every shape is known from the config alone; see
//! [`ResNetEncoderForOdometerConfig::backbone_output_shape`] and
//! [`ResNetEncoderForOdometerConfig::compression_shape`].
//!
//! An unsupported `input_channels` selects the blind modality:
//! no layers are built, and [`ResNetEncoderForOdometer::forward`] returns `None`.

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::compat::conv_shape::maybe_conv1d_output_size;
use crate::compat::normalization_wrapper::{Normalization, NormalizationConfig};
use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta};
use crate::layers::conv::conv3x3;
use crate::layers::init::{CONV_INTO_RELU_INITIALIZER, WeightInit};
use crate::models::odometer::modality::InputModality;
use crate::models::resnet::prefabs::ResNetPrefab;
use crate::models::resnet::resnet_model::{ResNet, ResNetConfig, ResNetMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::pool::{AvgPool2d, AvgPool2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::{Backend, Config, Module, Tensor};
use tracing::debug;

/// Kernel size and stride of the initial average pool.
pub const INITIAL_POOL_SIZE: usize = 3;

/// Default target for the flattened compression output.
pub const DEFAULT_COMPRESSION_FLAT_SIZE: usize = 2048;

/// [`ResNetEncoderForOdometer`] Config.
#[derive(Config, Debug)]
pub struct ResNetEncoderForOdometerConfig {
    /// ``[height, width]`` of the input observations.
    #[config(default = "[360, 640]")]
    pub input_dims: [usize; 2],

    /// Per-frame channel count; selects the modality.
    ///
    /// `1` is depth, `3` is rgb, `4` is rgb and depth; anything else is blind.
    #[config(default = 1)]
    pub input_channels: usize,

    /// Length of the output representation.
    #[config(default = 512)]
    pub repr_size: usize,

    /// Backbone base plane count.
    #[config(default = 32)]
    pub baseplanes: usize,

    /// `GroupNorm` group count in the backbone.
    #[config(default = 32)]
    pub ngroups: usize,

    /// Unused; the spatial size is derived from `input_dims`.
    #[config(default = 128)]
    pub spatial_size: usize,

    /// The backbone architecture.
    #[config(default = "ResNetPrefab::ResNet18")]
    pub backbone: ResNetPrefab,

    /// Optional normalization applied to the pooled input.
    ///
    /// The feature size will be auto-matched to the paired channel count.
    #[config(default = "None")]
    pub input_norm: Option<NormalizationConfig>,

    /// Target size of the flattened compression output.
    #[config(default = "DEFAULT_COMPRESSION_FLAT_SIZE")]
    pub compression_flat_size: usize,
}

impl ResNetEncoderForOdometerConfig {
    /// The selected input modality.
    pub fn modality(&self) -> InputModality {
        InputModality::from_input_channels(self.input_channels)
    }

    /// No visual input selected.
    pub fn is_blind(&self) -> bool {
        self.modality().is_blind()
    }

    /// Paired rgb channels.
    pub fn n_input_rgb(&self) -> usize {
        self.modality().n_input_rgb()
    }

    /// Paired depth channels.
    pub fn n_input_depth(&self) -> usize {
        self.modality().n_input_depth()
    }

    /// The ``[height, width]`` after the initial pool.
    ///
    /// ``(s - 3) / 3 + 1``; `None` if an input dim is smaller than the pool.
    pub fn pooled_resolution(&self) -> Option<[usize; 2]> {
        let [height, width] = self.input_dims;
        let pool = |size: usize| {
            if size == 0 {
                return None;
            }
            maybe_conv1d_output_size(size, INITIAL_POOL_SIZE, INITIAL_POOL_SIZE, 0, 1)
        };
        Some([pool(height)?, pool(width)?])
    }

    /// The backbone config; `None` when blind.
    pub fn backbone_config(&self) -> Option<ResNetConfig> {
        let modality = self.modality();
        if modality.is_blind() {
            return None;
        }
        Some(
            self.backbone
                .to_config(modality.cnn_channels(), self.baseplanes, self.ngroups),
        )
    }

    /// The backbone output ``[channels, height, width]``.
    ///
    /// `None` when blind, or when the input is smaller than the initial pool.
    pub fn backbone_output_shape(&self) -> Option<[usize; 3]> {
        let backbone = self.backbone_config()?;
        let [height, width] = backbone.output_resolution(self.pooled_resolution()?);
        Some([backbone.final_channels(), height, width])
    }

    /// Compression conv channels.
    ///
    /// ``round(compression_flat_size / (h' * w'))``, ties to even.
    pub fn num_compression_channels(&self) -> Option<usize> {
        let [_, height, width] = self.backbone_output_shape()?;
        let cells = (height * width) as f64;
        Some((self.compression_flat_size as f64 / cells).round_ties_even() as usize)
    }

    /// The compression output ``[channels, height, width]``.
    pub fn compression_shape(&self) -> Option<[usize; 3]> {
        let [_, height, width] = self.backbone_output_shape()?;
        Some([self.num_compression_channels()?, height, width])
    }

    /// Input width of the projection head.
    pub fn flattened_size(&self) -> Option<usize> {
        self.compression_shape()
            .map(|[channels, height, width]| channels * height * width)
    }

    /// Length of the output representation; `None` when blind.
    pub fn output_size(&self) -> Option<usize> {
        if self.is_blind() {
            None
        } else {
            Some(self.repr_size)
        }
    }

    /// Check if the config is valid.
    ///
    /// Blind configs are always valid.
    pub fn try_validate(&self) -> Result<(), String> {
        let Some(backbone) = self.backbone_config() else {
            return Ok(());
        };

        if self.repr_size == 0 {
            return Err("repr_size must be > 0".to_string());
        }
        if self.pooled_resolution().is_none() {
            return Err(format!(
                "input_dims {:?} are smaller than the initial pool({INITIAL_POOL_SIZE})",
                self.input_dims
            ));
        }

        backbone.try_validate()?;

        if let Some(norm) = &self.input_norm {
            norm.try_validate_features(backbone.in_channels)?;
        }

        if self.num_compression_channels() == Some(0) {
            return Err(format!(
                "backbone output grid {:?} is too large for compression_flat_size({})",
                self.backbone_output_shape().map(|[_, h, w]| [h, w]),
                self.compression_flat_size
            ));
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Initialize a [`ResNetEncoderForOdometer`].
    ///
    /// Every conv and linear weight is drawn from [`CONV_INTO_RELU_INITIALIZER`];
    /// every bias is zeroed.
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResNetEncoderForOdometer<B> {
        self.expect_valid();

        let modality = self.modality();
        let visual = match (
            self.backbone_config(),
            self.backbone_output_shape(),
            self.compression_shape(),
        ) {
            (
                Some(backbone),
                Some([final_channels, _, _]),
                Some([compression_channels, height, width]),
            ) => {
                debug!(
                    input_dims = ?self.input_dims,
                    n_input_rgb = modality.n_input_rgb(),
                    n_input_depth = modality.n_input_depth(),
                    backbone = self.backbone.name(),
                    final_channels,
                    compression_channels,
                    grid = ?[height, width],
                    "building odometer encoder"
                );

                let encoder = VisualEncoder {
                    initial_pool: AvgPool2dConfig::new([INITIAL_POOL_SIZE, INITIAL_POOL_SIZE])
                        .with_strides([INITIAL_POOL_SIZE, INITIAL_POOL_SIZE])
                        .init(),
                    input_norm: self.input_norm.as_ref().map(|norm| {
                        norm.clone()
                            .with_num_features(modality.cnn_channels())
                            .init(device)
                    }),
                    backbone: backbone.init(device),
                    compression: CNA2dConfig::new(
                        conv3x3(final_channels, compression_channels, 1, 1),
                        NormalizationConfig::group(1),
                    )
                    .init(device),
                    visual_fc: LinearConfig::new(
                        compression_channels * height * width,
                        self.repr_size,
                    )
                    .init(device),
                    fc_act: ActivationConfig::Relu.init(device),
                };
                Some(encoder.init_weights(&CONV_INTO_RELU_INITIALIZER))
            }
            _ => {
                debug!(
                    input_channels = self.input_channels,
                    "building blind odometer encoder"
                );
                None
            }
        };

        ResNetEncoderForOdometer {
            n_input_rgb: modality.n_input_rgb(),
            n_input_depth: modality.n_input_depth(),
            repr_size: self.repr_size,
            visual,
        }
    }
}

/// The layers of a non-blind encoder.
#[derive(Module, Debug)]
pub struct VisualEncoder<B: Backend> {
    /// 3x3, stride 3 average pool.
    pub initial_pool: AvgPool2d,

    /// Optional input normalization.
    pub input_norm: Option<Normalization<B>>,

    /// `ResNet` feature extractor.
    pub backbone: ResNet<B>,

    /// Channel compression.
    pub compression: CNA2d<B>,

    /// Projection head.
    pub visual_fc: Linear<B>,

    /// Projection head activation.
    pub fc_act: Activation<B>,
}

impl<B: Backend> WeightInit for VisualEncoder<B> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        Self {
            backbone: self.backbone.init_weights(initializer),
            compression: self.compression.init_weights(initializer),
            visual_fc: self.visual_fc.init_weights(initializer),
            ..self
        }
    }
}

impl<B: Backend> VisualEncoder<B> {
    /// The number of compression channels.
    pub fn compression_channels(&self) -> usize {
        self.compression.out_channels()
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: frame-arranged ``[batch, cnn_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, repr_size]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "cnn_channels", "height", "width"],
            &input,
            &["batch"],
            &[("cnn_channels", self.backbone.in_channels())]
        );

        let x = self.initial_pool.forward(input);
        let x = match &self.input_norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        let x = self.backbone.forward(x);
        let x = self.compression.forward(x);

        let x: Tensor<B, 2> = x.flatten(1, 3);
        let x = self.visual_fc.forward(x);
        let x = self.fc_act.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "repr_size"],
            &x,
            &[("batch", batch), ("repr_size", self.visual_fc.weight.dims()[1])]
        );

        x
    }
}

/// `ResNet` Encoder for Visual Odometry.
#[derive(Module, Debug)]
pub struct ResNetEncoderForOdometer<B: Backend> {
    /// Paired rgb channels.
    pub n_input_rgb: usize,

    /// Paired depth channels.
    pub n_input_depth: usize,

    /// Length of the output representation.
    pub repr_size: usize,

    /// The visual layers; `None` when blind.
    pub visual: Option<VisualEncoder<B>>,
}

impl<B: Backend> ResNetEncoderForOdometer<B> {
    /// The selected input modality.
    pub fn modality(&self) -> InputModality {
        InputModality::new(self.n_input_rgb, self.n_input_depth)
    }

    /// No visual input selected.
    pub fn is_blind(&self) -> bool {
        self.visual.is_none()
    }

    /// Paired rgb channels.
    pub fn n_input_rgb(&self) -> usize {
        self.n_input_rgb
    }

    /// Paired depth channels.
    pub fn n_input_depth(&self) -> usize {
        self.n_input_depth
    }

    /// Length of the output representation; `None` when blind.
    pub fn output_size(&self) -> Option<usize> {
        self.visual.as_ref().map(|_| self.repr_size)
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, n_input_rgb + n_input_depth, height, width]``, laid out
    ///   ``[rgb_src, rgb_tgt, depth_src, depth_tgt]``.
    ///
    /// # Returns
    ///
    /// ``Some([batch, repr_size])``; or `None` when blind, for any input.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Option<Tensor<B, 2>> {
        let visual = self.visual.as_ref()?;
        let _span = tracing::trace_span!("odometer_encoder_forward").entered();

        let x = self.modality().arrange_frames(input);
        Some(visual.forward(x))
    }
}
