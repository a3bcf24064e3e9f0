//! # Weight Initialization
//!
//! [`WeightInit`] is an explicit post-construction traversal over a module tree.
//! Composite modules forward the call to the sub-layers they own;
//! the leaf rules are:
//!
//! * [`Conv2d`] - weight redrawn from the initializer; bias zeroed.
//! * [`Linear`] - weight redrawn from the initializer; bias zeroed.
//!
//! Norm, pooling and activation layers are left untouched.

use burn::nn::conv::Conv2d;
use burn::nn::{Initializer, Linear};
use burn::prelude::Backend;
use core::f64::consts::SQRT_2;

/// Kaiming-normal, fan-in mode, with the ReLU gain ``sqrt(2)``.
///
/// ``std = sqrt(2 / fan_in)``
pub const CONV_INTO_RELU_INITIALIZER: Initializer = Initializer::KaimingNormal {
    gain: SQRT_2,
    fan_out_only: false,
};

/// Recursive weight (re-)initialization.
pub trait WeightInit: Sized {
    /// Re-initialize every conv and linear weight reachable from `self`.
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self;
}

impl<B: Backend> WeightInit for Conv2d<B> {
    fn init_weights(
        mut self,
        initializer: &Initializer,
    ) -> Self {
        let [out_channels, group_in_channels, kernel_height, kernel_width] = self.weight.dims();
        let receptive_field = kernel_height * kernel_width;
        let fan_in = group_in_channels * receptive_field;
        let fan_out = (out_channels / self.groups) * receptive_field;
        let device = self.weight.device();

        self.weight = initializer.init_with(
            [out_channels, group_in_channels, kernel_height, kernel_width],
            Some(fan_in),
            Some(fan_out),
            &device,
        );
        self.bias = self.bias.map(|bias| bias.map(|b| b.zeros_like()));
        self
    }
}

impl<B: Backend> WeightInit for Linear<B> {
    fn init_weights(
        mut self,
        initializer: &Initializer,
    ) -> Self {
        let [d_input, d_output] = self.weight.dims();
        let device = self.weight.device();

        self.weight = initializer.init_with(
            [d_input, d_output],
            Some(d_input),
            Some(d_output),
            &device,
        );
        self.bias = self.bias.map(|bias| bias.map(|b| b.zeros_like()));
        self
    }
}

impl<M: WeightInit> WeightInit for Option<M> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        self.map(|module| module.init_weights(initializer))
    }
}

impl<M: WeightInit> WeightInit for Vec<M> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        self.into_iter()
            .map(|module| module.init_weights(initializer))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::conv::conv3x3;
    use burn::backend::NdArray;
    use burn::nn::LinearConfig;
    use burn::nn::conv::Conv2dConfig;
    use burn::prelude::Tensor;
    use hamcrest::prelude::*;

    type B = NdArray<f32>;

    fn sample_std(values: &[f32]) -> f64 {
        let n = values.len() as f64;
        let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
        let var = values
            .iter()
            .map(|v| (*v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        var.sqrt()
    }

    #[test]
    fn test_conv_init() {
        let device = Default::default();

        let conv: Conv2d<B> = Conv2dConfig::new([64, 128], [3, 3])
            .with_initializer(Initializer::Ones)
            .init(&device);
        let conv = conv.init_weights(&CONV_INTO_RELU_INITIALIZER);

        assert_eq!(conv.weight.dims(), [128, 64, 3, 3]);
        let weights = conv.weight.val().to_data().to_vec::<f32>().unwrap();
        let expected_std = (2.0f64 / (64.0 * 9.0)).sqrt();
        assert_that!(sample_std(&weights), close_to(expected_std, 0.1 * expected_std));

        let bias: Tensor<B, 1> = conv.bias.expect("bias").val();
        bias.to_data()
            .assert_eq(&Tensor::<B, 1>::zeros([128], &device).to_data(), true);
    }

    #[test]
    fn test_grouped_conv_fan_in() {
        let device = Default::default();

        let conv: Conv2d<B> = conv3x3(64, 64, 1, 4).init(&device);
        assert!(conv.bias.is_none());

        let conv = conv.init_weights(&CONV_INTO_RELU_INITIALIZER);
        assert_eq!(conv.weight.dims(), [64, 16, 3, 3]);

        let weights = conv.weight.val().to_data().to_vec::<f32>().unwrap();
        let expected_std = (2.0f64 / (16.0 * 9.0)).sqrt();
        assert_that!(sample_std(&weights), close_to(expected_std, 0.15 * expected_std));
    }

    #[test]
    fn test_linear_init() {
        let device = Default::default();

        let linear: Linear<B> = LinearConfig::new(256, 64)
            .with_initializer(Initializer::Ones)
            .init(&device);
        let linear = Some(linear).init_weights(&CONV_INTO_RELU_INITIALIZER).unwrap();

        let weights = linear.weight.val().to_data().to_vec::<f32>().unwrap();
        let expected_std = (2.0f64 / 256.0).sqrt();
        assert_that!(sample_std(&weights), close_to(expected_std, 0.1 * expected_std));

        let bias: Tensor<B, 1> = linear.bias.expect("bias").val();
        bias.to_data()
            .assert_eq(&Tensor::<B, 1>::zeros([64], &device).to_data(), true);
    }
}
