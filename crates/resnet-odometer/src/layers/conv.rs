//! # Convolution Primitives
//!
//! The two convolution shapes the residual network is built from:
//! * [`conv3x3`] - padded 3x3 convolution, optionally grouped.
//! * [`conv1x1`] - pointwise projection.
//!
//! Neither carries a bias; every conv in the network is followed by a norm layer.

use crate::compat::conv_shape::expect_conv_output_shape;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::Conv2dConfig;

/// 3x3 convolution with padding 1.
///
/// At stride 1 the spatial size is preserved;
/// in general ``out = (in - 1) / stride + 1``.
///
/// # Arguments
///
/// - `in_planes`: input channels; must be a multiple of `groups`.
/// - `out_planes`: output channels; must be a multiple of `groups`.
/// - `stride`: spatial stride.
/// - `groups`: number of grouped-convolution paths.
pub fn conv3x3(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
    groups: usize,
) -> Conv2dConfig {
    Conv2dConfig::new([in_planes, out_planes], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_groups(groups)
        .with_bias(false)
}

/// 1x1 convolution.
pub fn conv1x1(
    in_planes: usize,
    out_planes: usize,
    stride: usize,
) -> Conv2dConfig {
    Conv2dConfig::new([in_planes, out_planes], [1, 1])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(0, 0))
        .with_bias(false)
}

/// Predict the ``[height, width]`` output of a [`Conv2dConfig`].
///
/// # Panics
///
/// If the input is too small for the kernel.
pub fn conv2d_output_resolution(
    config: &Conv2dConfig,
    input_resolution: [usize; 2],
) -> [usize; 2] {
    let padding = match &config.padding {
        PaddingConfig2d::Valid => [0, 0],
        PaddingConfig2d::Explicit(h, w) => [*h, *w],
        PaddingConfig2d::Same => [config.kernel_size[0] / 2, config.kernel_size[1] / 2],
    };
    expect_conv_output_shape(
        input_resolution,
        config.kernel_size,
        config.stride,
        padding,
        config.dilation,
    )
}
