//! # `ResNet` Utilities
//!
//! Analytic resolution arithmetic for the padded, strided layers of the network.
//!
//! Every strided layer in the backbone (the 7x7/p3 stem conv, the 3x3/p1 max-pool,
//! the 3x3/p1 block convs and the 1x1/p0 shortcut projections) maps a size `s` to
//! ``(s - 1) / stride + 1``; so the backbone output resolution is a function
//! of the configuration alone.

/// Number of stride-2 reductions in a `ResNet` backbone.
///
/// One in the stem conv, one in the stem pool, and one in each of stages 2..=4.
pub const SPATIAL_COMPRESSION_STEPS: usize = 5;

/// Default normalization group count.
pub const DEFAULT_NGROUPS: usize = 32;

/// Output size of a padded strided layer.
///
/// ``out = (size - 1) / stride + 1 = ceil(size / stride)``
///
/// # Panics
///
/// If `size` or `stride` is zero.
#[inline(always)]
pub fn strided_output_size(
    size: usize,
    stride: usize,
) -> usize {
    assert!(size > 0, "size must be > 0");
    assert!(stride > 0, "stride must be > 0");
    (size - 1) / stride + 1
}

/// Get the output resolution of a padded strided layer.
///
/// # Arguments
///
/// - `input_resolution`: ``[in_height, in_width]``.
/// - `stride`: the layer stride.
///
/// # Returns
///
/// ``[out_height, out_width]``
#[inline(always)]
pub fn strided_output_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    input_resolution.map(|size| strided_output_size(size, stride))
}

/// Apply `steps` stride-2 reductions to a resolution.
pub fn halved_resolution(
    input_resolution: [usize; 2],
    steps: usize,
) -> [usize; 2] {
    (0..steps).fold(input_resolution, |resolution, _| {
        strided_output_resolution(resolution, 2)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::conv_shape::expect_conv1d_output_size;

    #[test]
    fn test_strided_output_size() {
        assert_eq!(strided_output_size(1, 2), 1);
        assert_eq!(strided_output_size(15, 2), 8);
        assert_eq!(strided_output_size(16, 2), 8);
        assert_eq!(strided_output_size(16, 1), 16);
        assert_eq!(strided_output_resolution([120, 213], 2), [60, 107]);
    }

    #[test]
    fn test_matches_padded_layer_arithmetic() {
        for size in 1..64 {
            let expected = strided_output_size(size, 2);
            // 7x7 stem conv.
            assert_eq!(expect_conv1d_output_size(size, 7, 2, 3, 1), expected);
            // 3x3 max-pool and block conv.
            assert_eq!(expect_conv1d_output_size(size, 3, 2, 1, 1), expected);
            // 1x1 shortcut projection.
            assert_eq!(expect_conv1d_output_size(size, 1, 2, 0, 1), expected);
        }
    }

    #[test]
    fn test_halved_resolution() {
        assert_eq!(halved_resolution([120, 213], SPATIAL_COMPRESSION_STEPS), [4, 7]);
        assert_eq!(halved_resolution([32, 32], 0), [32, 32]);
        assert_eq!(halved_resolution([32, 32], 5), [1, 1]);
    }

    #[test]
    #[should_panic(expected = "size must be > 0")]
    fn test_zero_size() {
        strided_output_size(0, 2);
    }
}
