//! Authoring format of part templates.
//!
//! These types are the serialized form; they deliberately refer to no internal types
//! except small enums, so that internal representation changes do not leak into files.
//! Points are 3-element arrays.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::math::Face6;
use crate::mount::AdjacencyRule;

/// Size class of a grid. Parts of different classes never join.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum GridScale {
    /// Small blocks.
    Small,
    /// Large blocks.
    #[default]
    Large,
}

/// Raw authoring data of one part template.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct TemplateSource {
    /// Unique name within a catalog.
    pub name: String,
    /// Grid size class.
    #[serde(default, skip_serializing_if = "is_default")]
    pub scale: GridScale,
    /// Occupied cells.
    pub blocks: Vec<BlockSource>,
    /// Connectors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mounts: Vec<MountSource>,
    /// Exclusion volumes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reserved: Vec<ReservedSource>,
    /// Free-form labels, such as `"start"` for templates eligible to begin a construction.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

/// One occupied cell.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct BlockSource {
    /// Cell position.
    pub pos: [i32; 3],
    /// Block id, looked up in a [`BlockRegistry`](crate::BlockRegistry).
    pub block: String,
}

/// One connector.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct MountSource {
    /// Connector type; only equal types join.
    #[serde(rename = "type")]
    pub kind: String,
    /// Connector name, unique per type within the template.
    pub name: String,
    /// The plug cells.
    pub anchors: Vec<AnchorSource>,
}

/// One plug cell of a connector.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct AnchorSource {
    /// Cell position; must be occupied.
    pub pos: [i32; 3],
    /// Outward direction.
    pub direction: Face6,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bias: Option<Face6>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_bias: Option<Face6>,
    /// Piece key for multi-part connectors.
    #[serde(default, skip_serializing_if = "is_default")]
    pub piece: u32,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "is_default")]
    pub adjacency: AdjacencyRule,
}

/// One exclusion volume, as a half-open box.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct ReservedSource {
    /// Inclusive lower corner.
    pub lower: [i32; 3],
    /// Exclusive upper corner.
    pub upper: [i32; 3],
    /// Shared volumes do not collide with other reserved volumes.
    #[serde(default, skip_serializing_if = "is_default")]
    pub shared: bool,
    /// Optional volumes may be ignored by some collision queries.
    #[serde(default, skip_serializing_if = "is_default")]
    pub optional: bool,
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Programmatic construction of [`TemplateSource`]s.
///
/// ```
/// use stationgen::TemplateBuilder;
/// use stationgen::math::Face6;
///
/// let source = TemplateBuilder::new("corridor")
///     .fill([0, 0, 0], [1, 1, 4], "hull")
///     .mount("corridor", "front", [([0, 0, 3], Face6::PZ)])
///     .mount("corridor", "back", [([0, 0, 0], Face6::NZ)])
///     .build();
/// assert_eq!(source.blocks.len(), 4);
/// ```
#[derive(Clone, Debug)]
#[must_use]
pub struct TemplateBuilder {
    source: TemplateSource,
}

impl TemplateBuilder {
    /// Starts a template with the given name and nothing in it.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            source: TemplateSource {
                name: name.into(),
                scale: GridScale::default(),
                blocks: Vec::new(),
                mounts: Vec::new(),
                reserved: Vec::new(),
                tags: BTreeSet::new(),
            },
        }
    }

    /// Sets the grid size class.
    pub fn scale(mut self, scale: GridScale) -> Self {
        self.source.scale = scale;
        self
    }

    /// Adds a label.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.source.tags.insert(tag.into());
        self
    }

    /// Places one block.
    pub fn block(mut self, pos: [i32; 3], block: impl Into<String>) -> Self {
        self.source.blocks.push(BlockSource {
            pos,
            block: block.into(),
        });
        self
    }

    /// Places one block, removing any block already placed at `pos`.
    pub fn replace(mut self, pos: [i32; 3], block: impl Into<String>) -> Self {
        self.source.blocks.retain(|b| b.pos != pos);
        self.block(pos, block)
    }

    /// Places `block` in every cell of the half-open box from `lower` to `upper`.
    pub fn fill(mut self, lower: [i32; 3], upper: [i32; 3], block: impl Into<String>) -> Self {
        let block = block.into();
        for x in lower[0]..upper[0] {
            for y in lower[1]..upper[1] {
                for z in lower[2]..upper[2] {
                    self.source.blocks.push(BlockSource {
                        pos: [x, y, z],
                        block: block.clone(),
                    });
                }
            }
        }
        self
    }

    /// Adds a connector made of unbiased anchors in piece 0.
    pub fn mount(
        self,
        kind: impl Into<String>,
        name: impl Into<String>,
        anchors: impl IntoIterator<Item = ([i32; 3], Face6)>,
    ) -> Self {
        self.mount_with(
            kind,
            name,
            anchors.into_iter().map(|(pos, direction)| AnchorSource {
                pos,
                direction,
                bias: None,
                second_bias: None,
                piece: 0,
                adjacency: AdjacencyRule::Any,
            }),
        )
    }

    /// Adds a connector with fully specified anchors.
    pub fn mount_with(
        mut self,
        kind: impl Into<String>,
        name: impl Into<String>,
        anchors: impl IntoIterator<Item = AnchorSource>,
    ) -> Self {
        self.source.mounts.push(MountSource {
            kind: kind.into(),
            name: name.into(),
            anchors: anchors.into_iter().collect(),
        });
        self
    }

    /// Adds an exclusion volume.
    pub fn reserve(mut self, lower: [i32; 3], upper: [i32; 3], shared: bool, optional: bool) -> Self {
        self.source.reserved.push(ReservedSource {
            lower,
            upper,
            shared,
            optional,
        });
        self
    }

    /// Finishes the template.
    pub fn build(self) -> TemplateSource {
        self.source
    }
}

impl AnchorSource {
    /// Constructs an unbiased anchor in piece 0 with no adjacency restriction.
    pub fn new(pos: [i32; 3], direction: Face6) -> Self {
        Self {
            pos,
            direction,
            bias: None,
            second_bias: None,
            piece: 0,
            adjacency: AdjacencyRule::Any,
        }
    }

    /// Sets the primary bias direction.
    #[must_use]
    pub fn with_bias(mut self, bias: Face6) -> Self {
        self.bias = Some(bias);
        self
    }

    /// Sets the secondary bias direction.
    #[must_use]
    pub fn with_second_bias(mut self, bias: Face6) -> Self {
        self.second_bias = Some(bias);
        self
    }

    /// Sets the piece key.
    #[must_use]
    pub fn in_piece(mut self, piece: u32) -> Self {
        self.piece = piece;
        self
    }

    /// Sets the adjacency rule.
    #[must_use]
    pub fn with_adjacency(mut self, adjacency: AdjacencyRule) -> Self {
        self.adjacency = adjacency;
        self
    }
}
