//! # [`BottleneckBlock`] Block for `ResNet`
//!
//! [`BottleneckBlock`] is the bottleneck form of the `ResNet` residual unit:
//!
//! ```text
//! x -> conv1x1 -> norm -> act
//!   -> conv3x3(stride, groups=cardinality) -> norm -> act
//!   -> conv1x1(planes * expansion) -> norm
//!   -> (* se_gate)? -> (+ shortcut(x)) -> act
//! ```
//!
//! The same block covers the `Bottleneck`, `SE`, `ResNeXt` and `SE-ResNeXt`
//! families; they differ only in `expansion_factor`, `cardinality`, and
//! whether a [`SqueezeExcite`] gate is present.
//!
//! [`BottleneckBlockConfig`] implements [`Config`], and provides
//! [`BottleneckBlockConfig::init`] to initialize a [`BottleneckBlock`].

use crate::compat::activation_wrapper::ActivationConfig;
use crate::compat::normalization_wrapper::NormalizationConfig;
use crate::layers::blocks::cna::{AbstractCNA2dConfig, CNA2d, CNA2dMeta};
use crate::layers::conv::{conv1x1, conv3x3};
use crate::layers::init::WeightInit;
use crate::layers::squeeze_excite::{SqueezeExcite, SqueezeExciteConfig};
use crate::models::resnet::downsample::{ConvDownsample, ConvDownsampleConfig, needs_downsample};
use crate::models::resnet::util::{DEFAULT_NGROUPS, strided_output_resolution};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::Initializer;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Default bottleneck expansion.
pub const DEFAULT_BOTTLENECK_EXPANSION: usize = 4;

/// [`BottleneckBlock`] Meta trait.
pub trait BottleneckBlockMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The width of the 1x1 reduce and the 3x3 conv.
    fn planes(&self) -> usize;

    /// Groups of the 3x3 conv.
    fn cardinality(&self) -> usize;

    /// Control factor for `out_planes()`.
    fn expansion_factor(&self) -> usize;

    /// The number of output feature planes.
    ///
    /// ``out_planes = planes * expansion_factor``
    fn out_planes(&self) -> usize {
        self.planes() * self.expansion_factor()
    }

    /// The stride of the 3x3 conv.
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

/// [`BottleneckBlock`] Config.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Config, Debug)]
pub struct BottleneckBlockConfig {
    /// The number of input feature planes.
    pub in_planes: usize,

    /// The width of the 1x1 reduce and the 3x3 conv.
    pub planes: usize,

    /// Control factor for `out_planes()`.
    #[config(default = "DEFAULT_BOTTLENECK_EXPANSION")]
    pub expansion_factor: usize,

    /// The stride of the 3x3 conv.
    #[config(default = 1)]
    pub stride: usize,

    /// Groups of the 3x3 conv.
    #[config(default = 1)]
    pub cardinality: usize,

    /// Squeeze-excite reduction ratio; `None` disables the gate.
    #[config(default = "None")]
    pub se_reduction: Option<usize>,

    /// [`crate::compat::normalization_wrapper::Normalization`] config.
    ///
    /// The feature size of this config will be replaced
    /// with the appropriate feature size for the input layer.
    #[config(default = "NormalizationConfig::group(DEFAULT_NGROUPS)")]
    pub normalization: NormalizationConfig,

    /// [`crate::compat::activation_wrapper::Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub activation: ActivationConfig,
}

impl BottleneckBlockMeta for BottleneckBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn cardinality(&self) -> usize {
        self.cardinality
    }

    fn expansion_factor(&self) -> usize {
        self.expansion_factor
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BottleneckBlockConfig {
    /// The squeeze-excite gate config, if enabled.
    pub fn se_config(&self) -> Option<SqueezeExciteConfig> {
        self.se_reduction.map(|reduction| {
            SqueezeExciteConfig::new(self.out_planes())
                .with_reduction(reduction)
                .with_activation(self.activation.clone())
        })
    }

    /// Check that the block can be built.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.cardinality == 0 {
            return Err("cardinality must be > 0".to_string());
        }
        if self.planes() % self.cardinality != 0 {
            return Err(format!(
                "cardinality({}) does not divide grouped width({})",
                self.cardinality,
                self.planes()
            ));
        }
        self.normalization.try_validate_features(self.planes())?;
        self.normalization
            .try_validate_features(self.out_planes())?;
        if let Some(se) = self.se_config() {
            se.try_validate()?;
        }
        Ok(())
    }

    /// Initialize a [`BottleneckBlock`].
    ///
    /// # Panics
    ///
    /// If the squeeze-excite gate would be empty.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BottleneckBlock<B> {
        let in_planes = self.in_planes();
        let planes = self.planes();
        let out_planes = self.out_planes();
        let stride = self.stride();

        let downsample: Option<ConvDownsampleConfig> =
            if needs_downsample(in_planes, out_planes, stride) {
                ConvDownsampleConfig::new(in_planes, out_planes)
                    .with_stride(stride)
                    .with_norm(self.normalization.clone())
                    .into()
            } else {
                None
            };

        let cna_builder = AbstractCNA2dConfig {
            norm: self.normalization.clone(),
            act: self.activation.clone(),
        };

        let cna1 = cna_builder.build_config(conv1x1(in_planes, planes, 1));
        let cna2 = cna_builder.build_config(conv3x3(planes, planes, stride, self.cardinality));
        let cna3 = cna_builder.build_config(conv1x1(planes, out_planes, 1));

        BottleneckBlock {
            downsample: downsample.map(|cfg| cfg.init(device)),
            cna1: cna1.init(device),
            cna2: cna2.init(device),
            cna3: cna3.init(device),
            se: self.se_config().map(|cfg| cfg.init(device)),
        }
    }
}

/// Bottleneck Block for `ResNet`.
///
/// Implements [`BottleneckBlockMeta`].
#[derive(Module, Debug)]
pub struct BottleneckBlock<B: Backend> {
    /// Optional shortcut projection.
    pub downsample: Option<ConvDownsample<B>>,

    /// 1x1 reduce.
    pub cna1: CNA2d<B>,

    /// 3x3, strided and grouped.
    pub cna2: CNA2d<B>,

    /// 1x1 expand; the gate and shortcut run before its activation.
    pub cna3: CNA2d<B>,

    /// Optional squeeze-excite gate on the residual path.
    pub se: Option<SqueezeExcite<B>>,
}

impl<B: Backend> BottleneckBlockMeta for BottleneckBlock<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn planes(&self) -> usize {
        self.cna1.out_channels()
    }

    fn cardinality(&self) -> usize {
        self.cna2.groups()
    }

    fn expansion_factor(&self) -> usize {
        self.cna3.out_channels() / self.planes()
    }

    fn out_planes(&self) -> usize {
        self.cna3.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna2.stride()[0]
    }
}

impl<B: Backend> WeightInit for BottleneckBlock<B> {
    fn init_weights(
        self,
        initializer: &Initializer,
    ) -> Self {
        Self {
            downsample: self.downsample.init_weights(initializer),
            cna1: self.cna1.init_weights(initializer),
            cna2: self.cna2.init_weights(initializer),
            cna3: self.cna3.init_weights(initializer),
            se: self.se.init_weights(initializer),
        }
    }
}

impl<B: Backend> BottleneckBlock<B> {
    /// Forward Pass.
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
            &[("in_planes", self.in_planes())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);
        let out_bindings = [
            ("batch", batch),
            ("out_planes", self.out_planes()),
            ("out_height", out_height),
            ("out_width", out_width),
        ];

        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };
        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &identity,
            &out_bindings
        );

        let x = self.cna1.forward(input);
        let x = self.cna2.forward(x);
        let x = self.cna3.hook_forward(x, |x| {
            let x = match &self.se {
                Some(se) => se.forward(x),
                None => x,
            };
            x + identity
        });

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &out_bindings
        );

        x
    }
}
