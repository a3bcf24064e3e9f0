//! # Activation Layer Wrapper
//!
//! Config-selectable wrapper over the two `burn::nn` activations the encoder uses:
//! * [`Relu`] - residual blocks, compression and the projection head.
//! * [`Sigmoid`] - the squeeze-excite gate.
use burn::nn::{Relu, Sigmoid};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Activation`] Configuration.
#[derive(Config, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu`] activation layer.
    Relu,

    /// [`Sigmoid`] activation layer.
    Sigmoid,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl ActivationConfig {
    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        _device: &B::Device,
    ) -> Activation<B> {
        match self {
            ActivationConfig::Relu => Activation::Relu(Relu),
            ActivationConfig::Sigmoid => Activation::Sigmoid(Sigmoid),
        }
    }
}

/// Activation Layer Wrapper.
///
/// Stateless; the backend parameter keeps the wrapper open to learned activations.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Activation<B: Backend> {
    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`Sigmoid`] activation layer.
    Sigmoid(Sigmoid),

    #[doc(hidden)]
    Phantom(core::marker::PhantomData<B>),
}

impl<B: Backend> Activation<B> {
    /// Forward pass.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Relu(layer) => layer.forward(input),
            Activation::Sigmoid(layer) => layer.forward(input),
            Activation::Phantom(_) => input,
        }
    }

    /// Build a [`ActivationConfig`] for this module.
    pub fn to_config(&self) -> ActivationConfig {
        match self {
            Activation::Relu(_) | Activation::Phantom(_) => ActivationConfig::Relu,
            Activation::Sigmoid(_) => ActivationConfig::Sigmoid,
        }
    }
}
