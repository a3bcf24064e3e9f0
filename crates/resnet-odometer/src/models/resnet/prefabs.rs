//! # `ResNet` Prefabs
//!
//! Named backbone configurations.
//!
//! | name            | block                 | depths         | cardinality      |
//! |-----------------|-----------------------|----------------|------------------|
//! | `resnet18`      | `Basic`               | `[2, 2, 2, 2]` | 1                |
//! | `resnet50`      | `Bottleneck`          | `[3, 4, 6, 3]` | 1                |
//! | `resnext50`     | `ResNeXtBottleneck`   | `[3, 4, 6, 3]` | `base_planes / 2`|
//! | `se_resnet50`   | `SEBottleneck`        | `[3, 4, 6, 3]` | 1                |
//! | `se_resnext50`  | `SEResNeXtBottleneck` | `[3, 4, 6, 3]` | `base_planes / 2`|
//! | `se_resnext101` | `SEResNeXtBottleneck` | `[3, 4, 23, 3]`| `base_planes / 2`|

use crate::models::resnet::block_kind::ResidualBlockKind;
use crate::models::resnet::resnet_model::{
    RESNET18_BLOCKS, RESNET50_BLOCKS, RESNET101_BLOCKS, ResNetConfig,
};
use serde::{Deserialize, Serialize};

/// A named backbone configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ResNetPrefab {
    /// `ResNet`-18.
    #[default]
    ResNet18,

    /// `ResNet`-50.
    ResNet50,

    /// `ResNeXt`-50.
    ResNeXt50,

    /// `SE-ResNet`-50.
    SEResNet50,

    /// `SE-ResNeXt`-50.
    SEResNeXt50,

    /// `SE-ResNeXt`-101.
    SEResNeXt101,
}

impl ResNetPrefab {
    /// Every prefab.
    pub const ALL: [ResNetPrefab; 6] = [
        Self::ResNet18,
        Self::ResNet50,
        Self::ResNeXt50,
        Self::SEResNet50,
        Self::SEResNeXt50,
        Self::SEResNeXt101,
    ];

    /// Every prefab, in declaration order.
    pub const fn all() -> [ResNetPrefab; 6] {
        Self::ALL
    }

    /// The prefab name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::ResNet18 => "resnet18",
            Self::ResNet50 => "resnet50",
            Self::ResNeXt50 => "resnext50",
            Self::SEResNet50 => "se_resnet50",
            Self::SEResNeXt50 => "se_resnext50",
            Self::SEResNeXt101 => "se_resnext101",
        }
    }

    /// Look up a prefab by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|prefab| prefab.name() == name)
    }

    /// The block family.
    pub const fn block(self) -> ResidualBlockKind {
        match self {
            Self::ResNet18 => ResidualBlockKind::Basic,
            Self::ResNet50 => ResidualBlockKind::Bottleneck,
            Self::ResNeXt50 => ResidualBlockKind::ResNeXtBottleneck,
            Self::SEResNet50 => ResidualBlockKind::SEBottleneck,
            Self::SEResNeXt50 | Self::SEResNeXt101 => ResidualBlockKind::SEResNeXtBottleneck,
        }
    }

    /// The stage depths.
    pub const fn layers(self) -> [usize; 4] {
        match self {
            Self::ResNet18 => RESNET18_BLOCKS,
            Self::SEResNeXt101 => RESNET101_BLOCKS,
            _ => RESNET50_BLOCKS,
        }
    }

    /// Build the backbone config.
    ///
    /// Grouped block kinds use ``cardinality = base_planes / 2``.
    pub fn to_config(
        self,
        in_channels: usize,
        base_planes: usize,
        ngroups: usize,
    ) -> ResNetConfig {
        let block = self.block();
        let cardinality = if block.spec().uses_grouping {
            base_planes / 2
        } else {
            1
        };
        ResNetConfig::new(in_channels, base_planes, ngroups, block, self.layers())
            .with_cardinality(cardinality)
    }
}

/// `ResNet`-18 backbone config.
pub fn resnet18(
    in_channels: usize,
    base_planes: usize,
    ngroups: usize,
) -> ResNetConfig {
    ResNetPrefab::ResNet18.to_config(in_channels, base_planes, ngroups)
}

/// `ResNet`-50 backbone config.
pub fn resnet50(
    in_channels: usize,
    base_planes: usize,
    ngroups: usize,
) -> ResNetConfig {
    ResNetPrefab::ResNet50.to_config(in_channels, base_planes, ngroups)
}

/// `ResNeXt`-50 backbone config.
pub fn resnext50(
    in_channels: usize,
    base_planes: usize,
    ngroups: usize,
) -> ResNetConfig {
    ResNetPrefab::ResNeXt50.to_config(in_channels, base_planes, ngroups)
}

/// `SE-ResNet`-50 backbone config.
pub fn se_resnet50(
    in_channels: usize,
    base_planes: usize,
    ngroups: usize,
) -> ResNetConfig {
    ResNetPrefab::SEResNet50.to_config(in_channels, base_planes, ngroups)
}

/// `SE-ResNeXt`-50 backbone config.
pub fn se_resnext50(
    in_channels: usize,
    base_planes: usize,
    ngroups: usize,
) -> ResNetConfig {
    ResNetPrefab::SEResNeXt50.to_config(in_channels, base_planes, ngroups)
}

/// `SE-ResNeXt`-101 backbone config.
pub fn se_resnext101(
    in_channels: usize,
    base_planes: usize,
    ngroups: usize,
) -> ResNetConfig {
    ResNetPrefab::SEResNeXt101.to_config(in_channels, base_planes, ngroups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::resnet::residual_block::{ResidualBlockConfig, ResidualBlockMeta};
    use crate::models::resnet::resnet_model::ResNetMeta;

    #[test]
    fn test_names() {
        for prefab in ResNetPrefab::ALL {
            assert_eq!(ResNetPrefab::from_name(prefab.name()), Some(prefab));
        }
        assert_eq!(ResNetPrefab::from_name("resnet34"), None);
        assert_eq!(ResNetPrefab::all().len(), 6);
        assert_eq!(ResNetPrefab::all()[0], ResNetPrefab::ResNet18);
        assert_eq!(ResNetPrefab::default(), ResNetPrefab::ResNet18);
    }

    #[test]
    fn test_factories() {
        let config = resnet18(4, 32, 32);
        assert_eq!(config.block, ResidualBlockKind::Basic);
        assert_eq!(config.layers, [2, 2, 2, 2]);
        assert_eq!(config.cardinality, 1);
        assert_eq!(config.final_channels(), 256);

        let config = resnet50(4, 32, 32);
        assert_eq!(config.block, ResidualBlockKind::Bottleneck);
        assert_eq!(config.layers, [3, 4, 6, 3]);
        assert_eq!(config.final_channels(), 1024);

        let config = resnext50(4, 32, 32);
        assert_eq!(config.block, ResidualBlockKind::ResNeXtBottleneck);
        assert_eq!(config.cardinality, 16);
        assert_eq!(config.final_channels(), 1024);

        let config = se_resnet50(4, 32, 32);
        assert_eq!(config.block, ResidualBlockKind::SEBottleneck);
        assert_eq!(config.cardinality, 1);

        let config = se_resnext50(4, 32, 32);
        assert_eq!(config.block, ResidualBlockKind::SEResNeXtBottleneck);
        assert_eq!(config.layers, [3, 4, 6, 3]);
        assert_eq!(config.cardinality, 16);

        let config = se_resnext101(4, 32, 32);
        assert_eq!(config.block, ResidualBlockKind::SEResNeXtBottleneck);
        assert_eq!(config.layers, [3, 4, 23, 3]);
        assert_eq!(config.cardinality, 16);
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_grouped_widths_divide() {
        for prefab in ResNetPrefab::ALL {
            let config = prefab.to_config(2, 32, 32);
            assert!(config.try_validate().is_ok(), "{prefab:?}");

            let structure = config.to_structure();
            for (stage, layer) in structure.layers.iter().enumerate() {
                for (idx, block) in layer.blocks.iter().enumerate() {
                    let expected = if idx == 0 { config.cardinality } else { 1 };
                    assert_eq!(block.cardinality(), expected, "{prefab:?} {stage} {idx}");

                    let width = match block {
                        ResidualBlockConfig::Basic(inner) => inner.planes,
                        ResidualBlockConfig::Bottleneck(inner) => inner.planes,
                    };
                    assert_eq!(width % block.cardinality(), 0, "{prefab:?} {stage} {idx}");
                }
            }
        }
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&ResNetPrefab::SEResNeXt101).unwrap();
        assert_eq!(json, "\"SEResNeXt101\"");
        let prefab: ResNetPrefab = serde_json::from_str(&json).unwrap();
        assert_eq!(prefab, ResNetPrefab::SEResNeXt101);
    }
}
