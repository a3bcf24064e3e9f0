//! # Input Modality
//!
//! The odometer encodes a *source* and a *target* frame jointly; each frame
//! carries an RGB image, a depth map, or both.
//!
//! | `input_channels` | rgb per frame | depth per frame |
//! |------------------|---------------|-----------------|
//! | 1                | 0             | 1               |
//! | 3                | 3             | 0               |
//! | 4                | 3             | 1               |
//! | other            | 0             | 0 (blind)       |
//!
//! The input tensor stacks the modalities, source before target within each:
//! ``[rgb_src, rgb_tgt, depth_src, depth_tgt]``;
//! [`InputModality::arrange_frames`] regroups it by frame:
//! ``[rgb_src, depth_src, rgb_tgt, depth_tgt]``.

use bimm_contracts::assert_shape_contract;
use burn::prelude::{Backend, Tensor};

/// Channels of one RGB frame.
pub const RGB_FRAME_CHANNELS: usize = 3;

/// Channels of one depth frame.
pub const DEPTH_FRAME_CHANNELS: usize = 1;

/// Frames per observation pair.
pub const FRAMES_PER_PAIR: usize = 2;

/// Selected input modality, with counts over both frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputModality {
    n_input_rgb: usize,
    n_input_depth: usize,
}

impl InputModality {
    /// Construct from paired channel counts.
    ///
    /// # Panics
    ///
    /// If either count is not a whole number of frame pairs.
    pub fn new(
        n_input_rgb: usize,
        n_input_depth: usize,
    ) -> Self {
        assert_eq!(
            n_input_rgb % (FRAMES_PER_PAIR * RGB_FRAME_CHANNELS),
            0,
            "n_input_rgb({n_input_rgb}) is not a whole number of frame pairs"
        );
        assert_eq!(
            n_input_depth % (FRAMES_PER_PAIR * DEPTH_FRAME_CHANNELS),
            0,
            "n_input_depth({n_input_depth}) is not a whole number of frame pairs"
        );
        Self {
            n_input_rgb,
            n_input_depth,
        }
    }

    /// Select the modality for a per-frame channel count.
    ///
    /// Unsupported counts select the blind modality.
    pub fn from_input_channels(input_channels: usize) -> Self {
        let (rgb, depth) = match input_channels {
            1 => (0, DEPTH_FRAME_CHANNELS),
            3 => (RGB_FRAME_CHANNELS, 0),
            4 => (RGB_FRAME_CHANNELS, DEPTH_FRAME_CHANNELS),
            _ => (0, 0),
        };
        Self {
            n_input_rgb: rgb * FRAMES_PER_PAIR,
            n_input_depth: depth * FRAMES_PER_PAIR,
        }
    }

    /// RGB channels over both frames.
    pub fn n_input_rgb(&self) -> usize {
        self.n_input_rgb
    }

    /// Depth channels over both frames.
    pub fn n_input_depth(&self) -> usize {
        self.n_input_depth
    }

    /// No visual input selected.
    pub fn is_blind(&self) -> bool {
        self.n_input_rgb + self.n_input_depth == 0
    }

    /// Channels of the paired input; also the backbone input width.
    pub fn cnn_channels(&self) -> usize {
        self.n_input_rgb + self.n_input_depth
    }

    /// Regroup a stacked-modality input by frame.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, cnn_channels, height, width]``, laid out
    ///   ``[rgb_src, rgb_tgt, depth_src, depth_tgt]``.
    ///
    /// # Returns
    ///
    /// ``[batch, cnn_channels, height, width]``, laid out
    /// ``[rgb_src, depth_src, rgb_tgt, depth_tgt]``.
    ///
    /// # Panics
    ///
    /// If the modality is blind, or the channel count does not match.
    pub fn arrange_frames<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        assert!(!self.is_blind(), "cannot arrange frames of a blind modality");
        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &input,
            &[("channels", self.cnn_channels())]
        );

        let rgb = self.n_input_rgb / FRAMES_PER_PAIR;
        let depth = self.n_input_depth / FRAMES_PER_PAIR;

        let mut source = Vec::with_capacity(2);
        let mut target = Vec::with_capacity(2);
        if rgb > 0 {
            source.push(input.clone().narrow(1, 0, rgb));
            target.push(input.clone().narrow(1, rgb, rgb));
        }
        if depth > 0 {
            let offset = self.n_input_rgb;
            source.push(input.clone().narrow(1, offset, depth));
            target.push(input.narrow(1, offset + depth, depth));
        }

        source.extend(target);
        Tensor::cat(source, 1)
    }
}
