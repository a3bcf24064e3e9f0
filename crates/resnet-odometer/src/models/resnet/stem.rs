//! # Input Stem
//!
//! The `ResNet` stem is a 7x7/s2/p3 conv-norm-act, followed by a 3x3/s2/p1 max-pool:
//!
//! ```text
//! [batch, in_channels, h, w]
//!   -> conv7x7(s2, p3) -> norm -> act     [batch, base_planes, (h-1)/2+1, ..]
//!   -> max_pool3x3(s2, p1)                [batch, base_planes, (h'-1)/2+1, ..]
//! ```

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta};
use crate::layers::init::WeightInit;
use crate::models::resnet::util::halved_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2dConfig;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{Initializer, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};

/// Number of stride-2 reductions in the stem.
pub const STEM_COMPRESSION_STEPS: usize = 2;

/// [`ResNetStem`] Config.
#[derive(Config, Debug)]
pub struct ResNetStemConfig {
    /// The 7x7 conv/norm/act.
    pub cna: CNA2dConfig,

    /// The stem pool.
    pub pool: MaxPool2dConfig,
}

impl ResNetStemConfig {
    /// Build the standard stem.
    ///
    /// # Arguments
    ///
    /// - `in_channels`: the image channels.
    /// - `out_channels`: the base plane count.
    /// - `normalization`: the abstract norm config.
    /// - `activation`: the stem activation.
    pub fn build(
        in_channels: usize,
        out_channels: usize,
        normalization: NormalizationConfig,
        activation: ActivationConfig,
    ) -> Self {
        let cna = CNA2dConfig {
            conv: Conv2dConfig::new([in_channels, out_channels], [7, 7])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(3, 3))
                .with_bias(false),
            norm: normalization,
            act: activation,
        }
        .match_norm_features();

        let pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1));

        Self { cna, pool }
    }

    /// The number of input channels.
    pub fn in_channels(&self) -> usize {
        self.cna.in_channels()
    }

    /// The number of output channels.
    pub fn out_channels(&self) -> usize {
        self.cna.out_channels()
    }

    /// Predict the ``[out_height, out_width]`` for an input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        halved_resolution(input_resolution, STEM_COMPRESSION_STEPS)
    }

    /// Check that the stem can be built.
    pub fn try_validate(&self) -> Result<(), String> {
        self.cna.norm.try_validate_features(self.out_channels())
    }

    /// Initialize a [`ResNetStem`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ResNetStem<B> {
        ResNetStem {
            cna: self.cna.init(device),
            pool: self.pool.init(),
        }
    }
}

/// The `ResNet` input stem.
#[derive(Module, Debug)]
pub struct ResNetStem<B: Backend> {
    /// The 7x7 conv/norm/act.
    pub cna: CNA2d<B>,

    /// The stem pool.
    pub pool: MaxPool2d,
}

impl<B: Backend> WeightInit for ResNetStem<B> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        Self {
            cna: self.cna.init_weights(initializer),
            ..self
        }
    }
}

impl<B: Backend> ResNetStem<B> {
    /// The number of input channels.
    pub fn in_channels(&self) -> usize {
        self.cna.in_channels()
    }

    /// The number of output channels.
    pub fn out_channels(&self) -> usize {
        self.cna.out_channels()
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
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
        let [out_height, out_width] =
            halved_resolution([in_height, in_width], STEM_COMPRESSION_STEPS);

        let x = self.cna.forward(input);
        let x = self.pool.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
