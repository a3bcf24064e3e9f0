//! # Squeeze-Excite Channel Attention
//!
//! [`SqueezeExcite`] squeezes a ``[batch, channels, height, width]`` feature map
//! to a per-channel descriptor, and excites it through a bottleneck MLP into a
//! per-channel gate in ``(0, 1)``:
//!
//! ```text
//! avg_pool(1x1) -> [batch, channels]
//!   -> linear(channels, channels / reduction) -> act
//!   -> linear(channels / reduction, channels) -> sigmoid
//!   -> [batch, channels, 1, 1]
//! ```
//!
//! [`SqueezeExciteConfig`] implements [`Config`], and provides
//! [`SqueezeExciteConfig::init`] to initialize a [`SqueezeExcite`].

use crate::compat::activation_wrapper::{Activation, ActivationConfig};
use crate::layers::init::WeightInit;
use bimm_contracts::unpack_shape_contract;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Default channel reduction ratio.
pub const DEFAULT_SE_REDUCTION: usize = 16;

/// [`SqueezeExcite`] Meta trait.
pub trait SqueezeExciteMeta {
    /// The number of gated channels.
    fn channels(&self) -> usize;

    /// The width of the excitation bottleneck.
    fn reduced_channels(&self) -> usize;
}

/// [`SqueezeExcite`] Config.
#[derive(Config, Debug)]
pub struct SqueezeExciteConfig {
    /// The number of gated channels.
    pub channels: usize,

    /// Channel reduction ratio; ``reduced = channels / reduction`` (floor).
    #[config(default = "DEFAULT_SE_REDUCTION")]
    pub reduction: usize,

    /// Activation between the two excitation layers.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl SqueezeExciteMeta for SqueezeExciteConfig {
    fn channels(&self) -> usize {
        self.channels
    }

    fn reduced_channels(&self) -> usize {
        self.channels / self.reduction
    }
}

impl SqueezeExciteConfig {
    /// Check if the config is valid.
    ///
    /// The floor-divided bottleneck width must be at least one channel.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.reduction == 0 {
            return Err("squeeze-excite reduction must be > 0".to_string());
        }
        if self.reduced_channels() == 0 {
            return Err(format!(
                "squeeze-excite channels({}) / reduction({}) == 0",
                self.channels, self.reduction
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

    /// Initialize a [`SqueezeExcite`].
    ///
    /// # Panics
    ///
    /// If the config is invalid.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SqueezeExcite<B> {
        self.expect_valid();

        let channels = self.channels();
        let reduced = self.reduced_channels();

        SqueezeExcite {
            squeeze: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            reduce: LinearConfig::new(channels, reduced).init(device),
            act: self.activation.init(device),
            expand: LinearConfig::new(reduced, channels).init(device),
            gate: ActivationConfig::Sigmoid.init(device),
        }
    }
}

/// Squeeze-Excite channel gate.
///
/// Implements [`SqueezeExciteMeta`].
#[derive(Module, Debug)]
pub struct SqueezeExcite<B: Backend> {
    /// Global spatial pooling.
    pub squeeze: AdaptiveAvgPool2d,

    /// ``channels -> reduced`` excitation layer.
    pub reduce: Linear<B>,

    /// Excitation activation.
    pub act: Activation<B>,

    /// ``reduced -> channels`` excitation layer.
    pub expand: Linear<B>,

    /// Sigmoid gate.
    pub gate: Activation<B>,
}

impl<B: Backend> SqueezeExciteMeta for SqueezeExcite<B> {
    fn channels(&self) -> usize {
        self.reduce.weight.shape().dims[0]
    }

    fn reduced_channels(&self) -> usize {
        self.reduce.weight.shape().dims[1]
    }
}

impl<B: Backend> WeightInit for SqueezeExcite<B> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        Self {
            reduce: self.reduce.init_weights(initializer),
            expand: self.expand.init_weights(initializer),
            ..self
        }
    }
}

impl<B: Backend> SqueezeExcite<B> {
    /// Compute the per-channel gate.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, channels, 1, 1]`` tensor of values in ``(0, 1)``.
    pub fn gate(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, channels] = unpack_shape_contract!(
            ["batch", "channels", "height", "width"],
            &input,
            &["batch", "channels"],
            &[("channels", self.channels())]
        );

        let x = self.squeeze.forward(input);
        let x: Tensor<B, 2> = x.reshape([batch, channels]);

        let x = self.reduce.forward(x);
        let x = self.act.forward(x);
        let x = self.expand.forward(x);
        let x = self.gate.forward(x);

        x.reshape([batch, channels, 1, 1])
    }

    /// Rescale the input by its channel gate.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``input * gate(input)``, with the same shape as `input`.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, channels, height, width] = input.dims();
        let gate = self
            .gate(input.clone())
            .expand([batch, channels, height, width]);
        input * gate
    }
}
