//! Part templates: the immutable catalog entries that rooms are instances of.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

use hashbrown::{HashMap, HashSet};

use crate::block::BlockRegistry;
use crate::ledger::Ledger;
use crate::math::{Face6, GridAab, GridPoint, InvertedBoxError, point};
use crate::mount::{Anchor, Mount, MountId};

mod derived;
pub use derived::*;
mod source;
pub use source::*;

/// Identifies a [`PartTemplate`] by a hash of its authoring data.
///
/// Equal sources have equal ids, across program runs.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TemplateId(u64);

impl TemplateId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the numeric value of this id.
    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TemplateId({:016x})", self.0)
    }
}

fn hash_prefix(hash: &blake3::Hash) -> u64 {
    let mut prefix = [0; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(prefix)
}

/// An exclusion volume of a template, in template-local coordinates.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub struct ReservedSpace {
    /// The volume.
    pub bounds: GridAab,
    /// Shared volumes do not collide with other reserved volumes.
    pub shared: bool,
    /// Optional volumes are ignored by collision queries that do not test them.
    pub optional: bool,
}

/// Error from [`PartTemplate::new()`] when authoring data is inconsistent.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum TemplateError {
    /// The template has no blocks.
    #[error("template {name:?} has no blocks")]
    Empty {
        #[allow(missing_docs)]
        name: String,
    },
    /// Two blocks occupy the same cell.
    #[error("template {name:?} has more than one block at {pos:?}")]
    DuplicateBlock {
        #[allow(missing_docs)]
        name: String,
        #[allow(missing_docs)]
        pos: [i32; 3],
    },
    /// A reserved volume is inverted.
    #[error("template {name:?}: invalid reserved volume")]
    Reserved {
        #[allow(missing_docs)]
        name: String,
        #[allow(missing_docs)]
        #[source]
        error: InvertedBoxError,
    },
    /// A mount is malformed.
    #[error("template {name:?}, mount {kind}/{mount}: {problem}")]
    Mount {
        #[allow(missing_docs)]
        name: String,
        #[allow(missing_docs)]
        kind: String,
        #[allow(missing_docs)]
        mount: String,
        #[allow(missing_docs)]
        problem: MountProblem,
    },
    /// More mounts than can be indexed.
    #[error("template {name:?} has too many mounts")]
    TooManyMounts {
        #[allow(missing_docs)]
        name: String,
    },
}

/// What is wrong with a mount; see [`TemplateError::Mount`].
#[derive(Clone, Debug, Eq, PartialEq, displaydoc::Display)]
#[non_exhaustive]
pub enum MountProblem {
    /// defined more than once
    Duplicate,
    /// has no anchors
    NoAnchors,
    /// anchor at {0:?} is not an occupied cell
    AnchorNotOccupied([i32; 3]),
    /// anchor at {0:?} faces into an occupied cell
    AnchorFacesInward([i32; 3]),
    /// anchor at {0:?} is listed more than once
    DuplicateAnchor([i32; 3]),
    /// anchor at {0:?} has the same position and facing as an anchor of another mount
    SharedAnchor([i32; 3]),
}

/// Data derived from the blocks on first use.
#[derive(Debug)]
struct Computed {
    palette: Vec<Arc<str>>,
    cells: HashMap<GridPoint, u32>,
    ledger: Ledger,
}

/// An immutable prefabricated part: occupied cells, reserved volumes, mounts, and the
/// aggregate statistics of its blocks.
///
/// Geometry needed for bounding-box tests and mount matching is validated and derived
/// on construction. The per-cell map and the [`Ledger`] are derived on first use, exactly
/// once even if several threads ask at the same time, optionally going through a
/// [`DerivedCache`].
pub struct PartTemplate {
    id: TemplateId,
    name: Arc<str>,
    name_hash: u64,
    content_hash: blake3::Hash,
    source: TemplateSource,
    block_box: GridAab,
    reserved: Vec<ReservedSpace>,
    reserved_box: Option<GridAab>,
    mounts: Vec<Mount>,

    registry: Arc<BlockRegistry>,
    cache: Option<Arc<dyn DerivedCache>>,
    computed: OnceLock<Computed>,
}

impl PartTemplate {
    /// Validates `source` and constructs a template whose blocks are defined by `registry`.
    pub fn new(source: TemplateSource, registry: Arc<BlockRegistry>) -> Result<Self, TemplateError> {
        Self::with_cache(source, registry, None)
    }

    /// As [`PartTemplate::new()`], but derived data is read from and written to `cache`.
    pub fn with_cache(
        source: TemplateSource,
        registry: Arc<BlockRegistry>,
        cache: Option<Arc<dyn DerivedCache>>,
    ) -> Result<Self, TemplateError> {
        let name = source.name.clone();

        let mut occupied = HashSet::with_capacity(source.blocks.len());
        let mut block_box: Option<GridAab> = None;
        for block in &source.blocks {
            let cell = point(block.pos);
            if !occupied.insert(cell) {
                return Err(TemplateError::DuplicateBlock {
                    name,
                    pos: block.pos,
                });
            }
            block_box = Some(match block_box {
                Some(aab) => aab.union_cube(cell),
                None => GridAab::single_cube(cell),
            });
        }
        let Some(block_box) = block_box else {
            return Err(TemplateError::Empty { name });
        };

        let reserved = source
            .reserved
            .iter()
            .map(|r| {
                Ok(ReservedSpace {
                    bounds: GridAab::checked_from_lower_upper(point(r.lower), point(r.upper))?,
                    shared: r.shared,
                    optional: r.optional,
                })
            })
            .collect::<Result<Vec<_>, InvertedBoxError>>()
            .map_err(|error| TemplateError::Reserved {
                name: name.clone(),
                error,
            })?;
        let reserved_box = reserved
            .iter()
            .map(|r| r.bounds)
            .filter(|b| !b.is_empty())
            .reduce(GridAab::union_box);

        let source_bytes = match serde_json::to_vec(&source) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("failed to serialize template {name:?} for hashing: {e}");
                name.clone().into_bytes()
            }
        };
        let id = TemplateId(hash_prefix(&blake3::hash(&source_bytes)));
        let content_hash = {
            let mut hasher = blake3::Hasher::new();
            hasher.update(&source_bytes);
            hasher.update(registry.fingerprint().as_bytes());
            hasher.finalize()
        };

        let mounts = Self::build_mounts(&source, id, &occupied)?;

        Ok(Self {
            id,
            name_hash: hash_prefix(&blake3::hash(name.as_bytes())),
            name: name.into(),
            content_hash,
            block_box,
            reserved,
            reserved_box,
            mounts,
            source,
            registry,
            cache,
            computed: OnceLock::new(),
        })
    }

    fn build_mounts(
        source: &TemplateSource,
        id: TemplateId,
        occupied: &HashSet<GridPoint>,
    ) -> Result<Vec<Mount>, TemplateError> {
        let mut sorted: Vec<&MountSource> = source.mounts.iter().collect();
        sorted.sort_by(|a, b| (&a.kind, &a.name).cmp(&(&b.kind, &b.name)));
        if sorted.len() > usize::from(u16::MAX) {
            return Err(TemplateError::TooManyMounts {
                name: source.name.clone(),
            });
        }

        let mut mounts = Vec::with_capacity(sorted.len());
        let mut claimed: HashSet<(GridPoint, Face6)> = HashSet::new();
        for (index, mount) in sorted.iter().enumerate() {
            let fail = |problem| TemplateError::Mount {
                name: source.name.clone(),
                kind: mount.kind.clone(),
                mount: mount.name.clone(),
                problem,
            };
            if index > 0 && (&sorted[index - 1].kind, &sorted[index - 1].name) == (&mount.kind, &mount.name) {
                return Err(fail(MountProblem::Duplicate));
            }
            if mount.anchors.is_empty() {
                return Err(fail(MountProblem::NoAnchors));
            }
            let mut seen = HashSet::new();
            let mut anchors = Vec::with_capacity(mount.anchors.len());
            for a in &mount.anchors {
                let mut anchor = Anchor::new(point(a.pos), a.direction);
                anchor.bias = a.bias;
                anchor.second_bias = a.second_bias;
                anchor.piece = a.piece;
                anchor.adjacency = a.adjacency;
                if !occupied.contains(&anchor.cell) {
                    return Err(fail(MountProblem::AnchorNotOccupied(a.pos)));
                }
                if occupied.contains(&anchor.location()) {
                    return Err(fail(MountProblem::AnchorFacesInward(a.pos)));
                }
                if !seen.insert((anchor.cell, anchor.direction)) {
                    return Err(fail(MountProblem::DuplicateAnchor(a.pos)));
                }
                anchors.push(anchor);
            }
            // Mounts may share a cell, but not a facing within it.
            for anchor in &anchors {
                if !claimed.insert((anchor.cell, anchor.direction)) {
                    return Err(fail(MountProblem::SharedAnchor(anchor.cell.to_array())));
                }
            }
            mounts.push(Mount::new(
                MountId {
                    template: id,
                    index: index as u16,
                },
                mount.kind.as_str().into(),
                mount.name.as_str().into(),
                anchors,
            ));
        }
        Ok(mounts)
    }

    fn computed(&self) -> &Computed {
        self.computed.get_or_init(|| self.compute())
    }

    fn compute(&self) -> Computed {
        let mut palette: Vec<Arc<str>> = Vec::new();
        let mut palette_index: HashMap<&str, u32> = HashMap::new();
        let mut cells = HashMap::with_capacity(self.source.blocks.len());
        for block in &self.source.blocks {
            let index = *palette_index.entry(block.block.as_str()).or_insert_with(|| {
                palette.push(block.block.as_str().into());
                (palette.len() - 1) as u32
            });
            cells.insert(point(block.pos), index);
        }
        let ledger = self.derive_ledger();
        Computed {
            palette,
            cells,
            ledger,
        }
    }

    fn derive_ledger(&self) -> Ledger {
        let content_hash = self.content_hash.to_hex();
        let block_box = self.block_box.to_arrays();
        if let Some(cache) = &self.cache {
            match cache.load(&self.name) {
                Some(record)
                    if record.format == DerivedRecord::FORMAT
                        && record.content_hash == content_hash.as_str()
                        && record.block_box == block_box =>
                {
                    log::trace!("using cached derived data for {name}", name = self.name);
                    return record.ledger;
                }
                Some(_) => log::debug!("derived data for {name} is stale", name = self.name),
                None => {}
            }
        }

        let mut ledger = Ledger::new();
        for block in &self.source.blocks {
            match self.registry.get(&block.block) {
                Some(def) => ledger.add_block(&block.block, def, &self.registry),
                None => self.registry.report_unknown(&block.block, &self.name),
            }
        }

        if let Some(cache) = &self.cache {
            cache.store(
                &self.name,
                DerivedRecord::new(content_hash.to_string(), block_box, ledger.clone()),
            );
        }
        ledger
    }

    /// Content-derived identifier.
    pub fn id(&self) -> TemplateId {
        self.id
    }

    /// Name, unique within a catalog.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> &Arc<str> {
        &self.name
    }

    /// Stable hash of [`Self::name()`].
    pub fn name_hash(&self) -> u64 {
        self.name_hash
    }

    /// Grid size class.
    pub fn scale(&self) -> GridScale {
        self.source.scale
    }

    /// Whether the template carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.source.tags.contains(tag)
    }

    /// All tags.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.source.tags
    }

    /// The authoring data this template was built from.
    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// Whether the derived per-cell data and ledger have been computed yet.
    pub fn is_computed(&self) -> bool {
        self.computed.get().is_some()
    }

    /// Bounding box of occupied cells.
    pub fn block_box(&self) -> GridAab {
        self.block_box
    }

    /// Bounding box of all non-empty reserved volumes, if there are any.
    pub fn reserved_box(&self) -> Option<GridAab> {
        self.reserved_box
    }

    /// Bounding box of occupied cells and reserved volumes.
    pub fn bounds(&self) -> GridAab {
        match self.reserved_box {
            Some(reserved) => self.block_box.union_box(reserved),
            None => self.block_box,
        }
    }

    /// Reserved volumes.
    pub fn reserved(&self) -> &[ReservedSpace] {
        &self.reserved
    }

    /// Mounts, ordered by type and then name. [`MountId::index`] indexes this slice.
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Looks up a mount by type and name.
    pub fn mount_named(&self, kind: &str, name: &str) -> Option<&Mount> {
        self.mounts
            .iter()
            .find(|m| m.kind() == kind && m.name() == name)
    }

    /// Number of occupied cells.
    pub fn block_count(&self) -> usize {
        self.source.blocks.len()
    }

    /// Whether the cell is occupied.
    pub fn contains_cell(&self, cell: GridPoint) -> bool {
        self.computed().cells.contains_key(&cell)
    }

    /// The block id at the cell, if occupied.
    pub fn block_at(&self, cell: GridPoint) -> Option<&str> {
        let computed = self.computed();
        let &index = computed.cells.get(&cell)?;
        computed.palette.get(index as usize).map(|id| &**id)
    }

    /// Iterates over occupied cells, in no particular order.
    pub fn cells(&self) -> impl Iterator<Item = GridPoint> + '_ {
        self.computed().cells.keys().copied()
    }

    /// Aggregate statistics of all blocks.
    pub fn ledger(&self) -> &Ledger {
        &self.computed().ledger
    }
}

impl fmt::Debug for PartTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartTemplate")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("block_box", &self.block_box)
            .field("reserved", &self.reserved)
            .field("mounts", &self.mounts.len())
            .field("computed", &self.is_computed())
            .finish_non_exhaustive()
    }
}
