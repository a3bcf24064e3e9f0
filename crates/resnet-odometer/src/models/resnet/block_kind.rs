//! # Residual Block Kinds
//!
//! [`ResidualBlockKind`] tags the block family a `ResNet` is built from;
//! [`BlockKindSpec`] is the architectural record each tag selects.
//!
//! | kind                    | expansion | SE gate | grouped | base multiplier |
//! |-------------------------|-----------|---------|---------|-----------------|
//! | `Basic`                 | 1         | no      | no      | 1               |
//! | `Bottleneck`            | 4         | no      | no      | 1               |
//! | `SEBottleneck`          | 4         | yes     | no      | 1               |
//! | `ResNeXtBottleneck`     | 2         | no      | yes     | 2               |
//! | `SEResNeXtBottleneck`   | 2         | yes     | yes     | 2               |

use serde::{Deserialize, Serialize};

/// Architectural record of a [`ResidualBlockKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockKindSpec {
    /// ``out_planes = planes * expansion``.
    pub expansion: usize,

    /// Gate the residual path with a squeeze-excite branch.
    pub uses_se: bool,

    /// Use grouped 3x3 convolutions (``cardinality > 1``).
    pub uses_grouping: bool,

    /// Multiplier applied to the base plane count before stage 1.
    pub base_plane_multiplier: usize,
}

/// Residual block family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResidualBlockKind {
    /// Two 3x3 convs.
    Basic,

    /// 1x1 reduce, 3x3, 1x1 expand.
    Bottleneck,

    /// [`ResidualBlockKind::Bottleneck`] with a squeeze-excite gate.
    SEBottleneck,

    /// Grouped bottleneck with expansion 2.
    ResNeXtBottleneck,

    /// [`ResidualBlockKind::ResNeXtBottleneck`] with a squeeze-excite gate.
    SEResNeXtBottleneck,
}

impl ResidualBlockKind {
    /// The architectural record for this kind.
    pub const fn spec(self) -> BlockKindSpec {
        match self {
            Self::Basic => BlockKindSpec {
                expansion: 1,
                uses_se: false,
                uses_grouping: false,
                base_plane_multiplier: 1,
            },
            Self::Bottleneck => BlockKindSpec {
                expansion: 4,
                uses_se: false,
                uses_grouping: false,
                base_plane_multiplier: 1,
            },
            Self::SEBottleneck => BlockKindSpec {
                expansion: 4,
                uses_se: true,
                uses_grouping: false,
                base_plane_multiplier: 1,
            },
            Self::ResNeXtBottleneck => BlockKindSpec {
                expansion: 2,
                uses_se: false,
                uses_grouping: true,
                base_plane_multiplier: 2,
            },
            Self::SEResNeXtBottleneck => BlockKindSpec {
                expansion: 2,
                uses_se: true,
                uses_grouping: true,
                base_plane_multiplier: 2,
            },
        }
    }

    /// ``out_planes = planes * expansion``.
    pub const fn expansion(self) -> usize {
        self.spec().expansion
    }

    /// Is this a 1x1/3x3/1x1 bottleneck kind?
    pub const fn is_bottleneck(self) -> bool {
        !matches!(self, Self::Basic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specs() {
        assert_eq!(ResidualBlockKind::Basic.expansion(), 1);
        assert!(!ResidualBlockKind::Basic.is_bottleneck());

        assert_eq!(ResidualBlockKind::Bottleneck.expansion(), 4);
        assert!(ResidualBlockKind::Bottleneck.is_bottleneck());

        let se = ResidualBlockKind::SEBottleneck.spec();
        assert!(se.uses_se);
        assert!(!se.uses_grouping);
        assert_eq!(se.base_plane_multiplier, 1);

        let resnext = ResidualBlockKind::ResNeXtBottleneck.spec();
        assert_eq!(resnext.expansion, 2);
        assert!(resnext.uses_grouping);
        assert!(!resnext.uses_se);
        assert_eq!(resnext.base_plane_multiplier, 2);

        let se_resnext = ResidualBlockKind::SEResNeXtBottleneck.spec();
        assert_eq!(
            se_resnext,
            BlockKindSpec {
                expansion: 2,
                uses_se: true,
                uses_grouping: true,
                base_plane_multiplier: 2,
            }
        );
    }

    #[test]
    fn test_serde() {
        let json = serde_json::to_string(&ResidualBlockKind::SEResNeXtBottleneck).unwrap();
        assert_eq!(json, "\"SEResNeXtBottleneck\"");
        let kind: ResidualBlockKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, ResidualBlockKind::SEResNeXtBottleneck);
    }
}
