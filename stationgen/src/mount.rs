//! Mounts (named connectors) and the geometric matching between them.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::caches::EngineCaches;
use crate::math::{Face6, GridPoint, GridRotation, Gridgid};
use crate::template::TemplateId;

/// Restriction on which mounts an anchor may attach to.
///
/// Variants are ordered from least to most strict; a mount obeys the strictest rule of
/// any of its anchors.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum AdjacencyRule {
    /// May attach to anything of the same type.
    #[default]
    Any,
    /// May not attach to another instance of the same mount.
    ExcludeSameMount,
    /// May not attach to any mount of the same template.
    ExcludeSameTemplate,
}

/// Identifies a [`Mount`] within a catalog: the template it belongs to and its position
/// in that template's mount list.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MountId {
    /// Template that owns the mount.
    pub template: TemplateId,
    /// Index in [`PartTemplate::mounts()`](crate::PartTemplate::mounts).
    pub index: u16,
}

/// One cell of a mount, acting as a plug.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub struct Anchor {
    /// The occupied cell of the template which is the plug.
    pub cell: GridPoint,
    /// Direction in which the plug faces out of the template.
    pub direction: Face6,
    /// Optional direction which must line up with the mating anchor's bias,
    /// disambiguating rotation about [`Self::direction`].
    pub bias: Option<Face6>,
    /// Optional second direction which must also line up.
    pub second_bias: Option<Face6>,
    /// Which piece of a multi-part mount this anchor belongs to.
    pub piece: u32,
    /// Restriction on what this anchor may attach to.
    pub adjacency: AdjacencyRule,
}

impl Anchor {
    /// Constructs an anchor with no bias, in piece 0, with no adjacency restriction.
    pub fn new(cell: GridPoint, direction: Face6) -> Self {
        Self {
            cell,
            direction,
            bias: None,
            second_bias: None,
            piece: 0,
            adjacency: AdjacencyRule::Any,
        }
    }

    /// The cell just outside the template which a mating anchor's cell occupies.
    pub fn location(&self) -> GridPoint {
        self.cell + self.direction.normal_vector()
    }

    /// Whether a mating anchor `other`, rotated by `rotation`, has compatible biases.
    /// Biases only constrain when both anchors specify them.
    fn bias_compatible(&self, rotation: GridRotation, other: &Anchor) -> bool {
        let agrees = |mine: Option<Face6>, theirs: Option<Face6>| match (mine, theirs) {
            (Some(mine), Some(theirs)) => rotation.transform(theirs) == mine,
            _ => true,
        };
        agrees(self.bias, other.bias) && agrees(self.second_bias, other.second_bias)
    }
}

/// A named socket on a part template, made of one or more [`Anchor`]s.
///
/// Two mounts can be joined when they have the same type and some rigid transform puts
/// every anchor of one against a mating anchor of the other.
#[derive(Clone, Debug)]
pub struct Mount {
    id: MountId,
    kind: Arc<str>,
    name: Arc<str>,
    /// Sorted by piece, then cell, then direction.
    anchors: Vec<Anchor>,
    adjacency: AdjacencyRule,
}

impl Mount {
    pub(crate) fn new(id: MountId, kind: Arc<str>, name: Arc<str>, mut anchors: Vec<Anchor>) -> Self {
        for anchor in &mut anchors {
            for bias in [&mut anchor.bias, &mut anchor.second_bias] {
                if let Some(b) = *bias
                    && b.is_parallel(anchor.direction)
                {
                    log::warn!(
                        "mount {kind}/{name}: ignoring bias {b:?} parallel to direction {dir:?}",
                        dir = anchor.direction
                    );
                    *bias = None;
                }
            }
        }
        anchors.sort_by_key(|a| (a.piece, a.cell.to_array(), a.direction));
        let adjacency = anchors
            .iter()
            .map(|a| a.adjacency)
            .max()
            .unwrap_or_default();
        Self {
            id,
            kind,
            name,
            anchors,
            adjacency,
        }
    }

    /// Identifier of this mount within its catalog.
    pub fn id(&self) -> MountId {
        self.id
    }

    /// The type of the mount. Only mounts of equal type can join.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The name of the mount, unique among mounts of the same type in its template.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All anchors, sorted by piece.
    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// The strictest adjacency rule of any anchor.
    pub fn adjacency(&self) -> AdjacencyRule {
        self.adjacency
    }

    /// Anchor counts by piece key.
    fn piece_sizes(&self) -> BTreeMap<u32, usize> {
        let mut sizes = BTreeMap::new();
        for anchor in &self.anchors {
            *sizes.entry(anchor.piece).or_insert(0) += 1;
        }
        sizes
    }

    /// Computes every transform which places `other`'s template, relative to this mount's
    /// template, so that the two mounts join.
    ///
    /// The result is sorted and free of duplicates. It is empty when the types differ,
    /// when the adjacency rule forbids the pair, or when the anchor layouts are not
    /// congruent. Prefer [`EngineCaches::mount_transforms()`], which memoizes this.
    pub fn compute_transforms(&self, other: &Mount) -> Vec<Gridgid> {
        if self.kind != other.kind {
            return Vec::new();
        }
        match self.adjacency.max(other.adjacency) {
            AdjacencyRule::Any => {}
            AdjacencyRule::ExcludeSameMount => {
                if self.id == other.id {
                    return Vec::new();
                }
            }
            AdjacencyRule::ExcludeSameTemplate => {
                if self.id.template == other.id.template {
                    return Vec::new();
                }
            }
        }
        let sizes = self.piece_sizes();
        if sizes != other.piece_sizes() {
            return Vec::new();
        }
        let Some((&seed_piece, _)) = sizes.iter().min_by_key(|&(&piece, &size)| (size, piece))
        else {
            return Vec::new();
        };

        let mine: HashMap<(GridPoint, Face6), &Anchor> = self
            .anchors
            .iter()
            .map(|a| ((a.location(), a.direction), a))
            .collect();
        let Some(seed) = other.anchors.iter().find(|b| b.piece == seed_piece) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        for a in self.anchors.iter().filter(|a| a.piece == seed_piece) {
            for rotation in GridRotation::mapping(seed.direction, a.direction.opposite()) {
                if !a.bias_compatible(rotation, seed) {
                    continue;
                }
                let rotated = Gridgid::from_rotation_about_origin(rotation).transform_cube(seed.cell);
                let candidate = Gridgid {
                    rotation,
                    translation: a.location() - rotated,
                };
                let all_mate = other.anchors.iter().all(|b| {
                    let key = (
                        candidate.transform_cube(b.cell),
                        rotation.transform(b.direction).opposite(),
                    );
                    mine.get(&key).is_some_and(|&mate| {
                        mate.piece == b.piece && mate.bias_compatible(rotation, b)
                    })
                });
                if all_mate {
                    found.push(candidate);
                }
            }
        }
        found.into_iter().sorted().dedup().collect()
    }
}

impl EngineCaches {
    /// Returns [`Mount::compute_transforms()`] of `a` and `b`, memoized.
    pub fn mount_transforms(&self, a: &Mount, b: &Mount) -> Arc<[Gridgid]> {
        self.mount_transforms
            .get_or_insert_with((a.id, b.id), || a.compute_transforms(b).into())
    }
}
