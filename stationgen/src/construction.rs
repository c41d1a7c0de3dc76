//! The mutable assembly of placed rooms.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};

use crate::caches::EngineCaches;
use crate::catalog::Catalog;
use crate::collision::CollisionMode;
use crate::ledger::Ledger;
use crate::math::{Face6, GridAab, GridPoint, GridRotation, GridVector, Gridgid};
use crate::mount::Mount;
use crate::seed::Seed;
use crate::template::{PartTemplate, TemplateId};

/// Identifies a [`Room`] within the [`Construction`] that created it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RoomId(u64);

/// A mount of a particular room: a connector instance.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MountKey {
    #[allow(missing_docs)]
    pub room: RoomId,
    /// Index into the room's template's [`mounts()`](PartTemplate::mounts).
    pub mount: u16,
}

/// An instance of a [`PartTemplate`] at a particular transform.
#[derive(Clone)]
pub struct Room {
    id: RoomId,
    template: Arc<PartTemplate>,
    transform: Gridgid,
    block_box: GridAab,
    bounds: GridAab,
}

impl Room {
    fn new(id: RoomId, template: Arc<PartTemplate>, transform: Gridgid) -> Self {
        Self {
            id,
            block_box: template.block_box().transform(transform),
            bounds: template.bounds().transform(transform),
            template,
            transform,
        }
    }

    #[allow(missing_docs)]
    pub fn id(&self) -> RoomId {
        self.id
    }

    #[allow(missing_docs)]
    pub fn template(&self) -> &Arc<PartTemplate> {
        &self.template
    }

    /// Maps template coordinates to world coordinates.
    pub fn transform(&self) -> Gridgid {
        self.transform
    }

    /// World bounding box of the occupied cells.
    pub fn block_box(&self) -> GridAab {
        self.block_box
    }

    /// World bounding box of occupied cells and reserved volumes.
    pub fn bounds(&self) -> GridAab {
        self.bounds
    }

    /// The template's ledger.
    pub fn ledger(&self) -> &Ledger {
        self.template.ledger()
    }

    /// Keys of all of this room's mounts.
    pub fn mount_keys(&self) -> impl Iterator<Item = MountKey> + '_ {
        (0..self.template.mounts().len()).map(|i| MountKey {
            room: self.id,
            mount: i as u16,
        })
    }

    /// The mount with the given index.
    pub fn mount(&self, index: u16) -> Option<&Mount> {
        self.template.mounts().get(usize::from(index))
    }

    /// Whether the world cell is occupied by this room.
    pub fn contains_cell(&self, cell: GridPoint) -> bool {
        self.block_box.contains_cube(cell)
            && self
                .template
                .contains_cell(self.transform.inverse().transform_cube(cell))
    }

    /// World anchor cell, world location and world direction of each anchor of a mount.
    fn world_anchors(&self, mount: &Mount) -> impl Iterator<Item = (GridPoint, GridPoint, Face6)> {
        let t = self.transform;
        mount.anchors().iter().map(move |a| {
            (
                t.transform_cube(a.cell),
                t.transform_cube(a.location()),
                t.rotation.transform(a.direction),
            )
        })
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("template", &self.template.name())
            .field("transform", &self.transform)
            .finish()
    }
}

/// A template placement, as produced by generation.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Placement {
    #[allow(missing_docs)]
    pub template: Arc<PartTemplate>,
    #[allow(missing_docs)]
    pub transform: Gridgid,
}

impl Placement {
    /// Converts to the serializable form.
    pub fn to_record(&self) -> PlacementRecord {
        PlacementRecord {
            template: self.template.name().to_owned(),
            rotation: self.transform.rotation.to_basis(),
            translation: self.transform.translation.to_array(),
        }
    }
}

impl PartialEq for Placement {
    fn eq(&self, other: &Self) -> bool {
        self.template.id() == other.template.id() && self.transform == other.transform
    }
}

/// Serialized form of a [`Placement`]: template name, the images of the X, Y and Z axes,
/// and translation.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct PlacementRecord {
    #[allow(missing_docs)]
    pub template: String,
    #[allow(missing_docs)]
    pub rotation: [Face6; 3],
    #[allow(missing_docs)]
    pub translation: [i32; 3],
}

impl PlacementRecord {
    /// Looks up the template in `catalog` and validates the rotation.
    pub fn resolve(&self, catalog: &Catalog) -> Result<Placement, ConstructionError> {
        let template = catalog
            .get(&self.template)
            .ok_or_else(|| ConstructionError::UnknownTemplate(self.template.clone()))?;
        let [x, y, z] = self.rotation;
        let rotation = GridRotation::from_basis(x, y)
            .filter(|r| r.to_basis()[2] == z)
            .ok_or(ConstructionError::InvalidRotation(self.rotation))?;
        Ok(Placement {
            template: template.clone(),
            transform: Gridgid {
                rotation,
                translation: GridVector::from(self.translation),
            },
        })
    }
}

/// A change to the set of rooms in a [`Construction`].
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum RoomChange {
    /// The room was added.
    Attached {
        #[allow(missing_docs)]
        room: RoomId,
        #[allow(missing_docs)]
        template: TemplateId,
    },
    /// The room was removed.
    Detached {
        #[allow(missing_docs)]
        room: RoomId,
        #[allow(missing_docs)]
        template: TemplateId,
    },
}

/// Receiver of [`RoomChange`]s from a [`Construction`].
///
/// Listeners are called while the construction is being modified, so they should only
/// record the change.
pub trait RoomListener: Send + Sync {
    /// Records a change.
    fn receive(&self, change: &RoomChange);

    /// Returns `false` if the listener should not receive any further changes.
    fn alive(&self) -> bool {
        true
    }
}

/// Error from modifying a [`Construction`]. A failed modification changes nothing.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConstructionError {
    /// The room is already part of the construction.
    #[error("room {0:?} is already attached")]
    AlreadyAttached(RoomId),
    /// The room was created by a different construction.
    #[error("room {0:?} was not created by this construction")]
    ForeignRoom(RoomId),
    /// The room's grid size class differs from the construction's.
    #[error("template {template:?} has grid scale {actual:?}, but the construction uses {expected:?}")]
    ScaleMismatch {
        #[allow(missing_docs)]
        template: String,
        #[allow(missing_docs)]
        actual: crate::template::GridScale,
        #[allow(missing_docs)]
        expected: crate::template::GridScale,
    },
    /// A placement names a template not in the catalog.
    #[error("no template named {0:?}")]
    UnknownTemplate(String),
    /// A placement's rotation is not a proper rotation.
    #[error("{0:?} is not a rotation")]
    InvalidRotation([Face6; 3]),
}

/// R-tree entry.
#[derive(Clone, Debug, PartialEq)]
struct RoomEnvelope {
    room: RoomId,
    bounds: GridAab,
}

impl RTreeObject for RoomEnvelope {
    type Envelope = AABB<[i32; 3]>;

    fn envelope(&self) -> Self::Envelope {
        envelope_of(self.bounds)
    }
}

/// Corners are inclusive in [`AABB`].
fn envelope_of(bounds: GridAab) -> AABB<[i32; 3]> {
    AABB::from_corners(
        bounds.lower_bounds().to_array(),
        (bounds.upper_bounds() - GridVector::new(1, 1, 1)).to_array(),
    )
}

/// Bits of the per-pair collision cache, per [`CollisionMode::flag_shift()`].
const KNOWN: u8 = 0b01;
const COLLIDES: u8 = 0b10;

/// A set of rooms being assembled, with the indexes needed to grow it quickly.
///
/// Owns its rooms exclusively; everything else refers to them by [`RoomId`]. All
/// modifications go through [`Construction::add_room()`] and
/// [`Construction::remove_room()`], which keep the spatial index, the anchor registry,
/// the aggregate ledger and the room order in agreement.
pub struct Construction {
    seed: Seed,
    caches: Arc<EngineCaches>,
    next_id: u64,
    rooms: HashMap<RoomId, Room>,
    /// Attachment order.
    order: Vec<RoomId>,
    index: RTree<RoomEnvelope>,
    /// World anchor cell and facing to the mount it belongs to. One cell may hold
    /// anchors of several mounts facing different ways.
    anchors: HashMap<(GridPoint, Face6), MountKey>,
    ledger: Ledger,
    /// Smaller id first.
    pair_flags: HashMap<(RoomId, RoomId), u8>,
    listeners: Vec<Arc<dyn RoomListener>>,
}

impl Construction {
    /// Constructs an empty construction with the given target profile.
    pub fn new(seed: Seed, caches: Arc<EngineCaches>) -> Self {
        Self {
            seed,
            caches,
            next_id: 0,
            rooms: HashMap::new(),
            order: Vec::new(),
            index: RTree::new(),
            anchors: HashMap::new(),
            ledger: Ledger::new(),
            pair_flags: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Builds a construction by adding the given placements in order.
    pub fn replay<'p>(
        seed: Seed,
        caches: Arc<EngineCaches>,
        placements: impl IntoIterator<Item = &'p Placement>,
    ) -> Result<Self, ConstructionError> {
        let mut construction = Self::new(seed, caches);
        for placement in placements {
            let room = construction.create_room(placement.template.clone(), placement.transform);
            construction.add_room(room)?;
        }
        Ok(construction)
    }

    /// The target profile.
    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// The caches used for collision tests.
    pub fn caches(&self) -> &Arc<EngineCaches> {
        &self.caches
    }

    /// Creates a detached room, which may later be passed to [`Self::add_room()`].
    pub fn create_room(&mut self, template: Arc<PartTemplate>, transform: Gridgid) -> Room {
        let id = RoomId(self.next_id);
        self.next_id += 1;
        Room::new(id, template, transform)
    }

    /// Registers a listener for [`RoomChange`]s.
    pub fn listen(&mut self, listener: Arc<dyn RoomListener>) {
        self.listeners.push(listener);
    }

    fn notify(&mut self, change: RoomChange) {
        self.listeners.retain(|listener| {
            if listener.alive() {
                listener.receive(&change);
                true
            } else {
                false
            }
        });
    }

    /// Attaches a room created by [`Self::create_room()`].
    pub fn add_room(&mut self, room: Room) -> Result<RoomId, ConstructionError> {
        let id = room.id;
        if id.0 >= self.next_id {
            return Err(ConstructionError::ForeignRoom(id));
        }
        if self.rooms.contains_key(&id) {
            return Err(ConstructionError::AlreadyAttached(id));
        }
        if room.template.scale() != self.seed.scale {
            return Err(ConstructionError::ScaleMismatch {
                template: room.template.name().to_owned(),
                actual: room.template.scale(),
                expected: self.seed.scale,
            });
        }

        self.index.insert(RoomEnvelope {
            room: id,
            bounds: room.bounds,
        });
        for (index, mount) in room.template.mounts().iter().enumerate() {
            let key = MountKey {
                room: id,
                mount: index as u16,
            };
            for (cell, _, direction) in room.world_anchors(mount) {
                match self.anchors.entry((cell, direction)) {
                    hashbrown::hash_map::Entry::Occupied(existing) => log::warn!(
                        "anchor {cell:?} {direction:?} of {key:?} is already registered to {other:?}",
                        other = existing.get(),
                    ),
                    hashbrown::hash_map::Entry::Vacant(vacant) => {
                        vacant.insert(key);
                    }
                }
            }
        }
        self.ledger.add(room.ledger());
        self.order.push(id);
        let template = room.template.id();
        self.rooms.insert(id, room);
        self.notify(RoomChange::Attached { room: id, template });
        Ok(id)
    }

    /// Detaches and returns a room.
    pub fn remove_room(&mut self, id: RoomId) -> Option<Room> {
        let room = self.rooms.remove(&id)?;
        self.index.remove(&RoomEnvelope {
            room: id,
            bounds: room.bounds,
        });
        for mount in room.template.mounts() {
            for (cell, _, direction) in room.world_anchors(mount) {
                if self.anchors.get(&(cell, direction)).is_some_and(|k| k.room == id) {
                    self.anchors.remove(&(cell, direction));
                }
            }
        }
        self.ledger.subtract(room.ledger());
        if self.order.last() == Some(&id) {
            self.order.pop();
        } else {
            log::warn!("removing {id:?}, which is not the most recent room; possibly unsafe");
            self.order.retain(|&r| r != id);
        }
        self.pair_flags.retain(|&(a, b), _| a != id && b != id);
        self.notify(RoomChange::Detached {
            room: id,
            template: room.template.id(),
        });
        Some(room)
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether there are no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Looks up a room.
    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    /// All rooms, in attachment order.
    pub fn rooms(&self) -> impl Iterator<Item = &Room> + '_ {
        self.order.iter().filter_map(|id| self.rooms.get(id))
    }

    /// All rooms as placements, in attachment order.
    pub fn placements(&self) -> Vec<Placement> {
        self.rooms()
            .map(|room| Placement {
                template: room.template.clone(),
                transform: room.transform,
            })
            .collect()
    }

    /// Sum of all rooms' ledgers.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Total number of occupied cells.
    pub fn block_count(&self) -> usize {
        self.rooms.values().map(|r| r.template.block_count()).sum()
    }

    /// Error of the aggregate ledger against the target profile.
    pub fn error(&self) -> f64 {
        self.seed.error(&[&self.ledger])
    }

    /// Whether `room` collides with any room of this construction other than itself.
    ///
    /// Results for pairs of attached rooms are remembered until either is removed.
    pub fn intersects(&mut self, room: &Room, mode: CollisionMode) -> bool {
        let attached = self.rooms.contains_key(&room.id);
        let mut candidates: Vec<RoomId> = self
            .index
            .locate_in_envelope_intersecting(&envelope_of(room.bounds))
            .map(|e| e.room)
            .filter(|&other| other != room.id)
            .collect();
        candidates.sort_unstable();

        let shift = mode.flag_shift();
        for other_id in candidates {
            let Some(other) = self.rooms.get(&other_id) else {
                continue;
            };
            let pair = (room.id.min(other_id), room.id.max(other_id));
            if attached && let Some(&flags) = self.pair_flags.get(&pair) {
                let flags = flags >> shift;
                if flags & KNOWN != 0 {
                    if flags & COLLIDES != 0 {
                        return true;
                    }
                    continue;
                }
            }
            let collides = self.caches.intersects(
                &room.template,
                room.transform,
                &other.template,
                other.transform,
                mode,
            );
            if attached {
                let bits = (KNOWN | if collides { COLLIDES } else { 0 }) << shift;
                *self.pair_flags.entry(pair).or_default() |= bits;
            }
            if collides {
                return true;
            }
        }
        false
    }

    /// A mount with an anchor in the given world cell; the least key if there are several.
    pub fn mount_point_at(&self, cell: GridPoint) -> Option<MountKey> {
        Face6::ALL
            .into_iter()
            .filter_map(|direction| self.mount_point_facing(cell, direction))
            .min()
    }

    /// The mount with an anchor in the given world cell facing `direction`.
    pub fn mount_point_facing(&self, cell: GridPoint, direction: Face6) -> Option<MountKey> {
        self.anchors.get(&(cell, direction)).copied()
    }

    /// The room occupying the given world cell.
    pub fn room_at(&self, cell: GridPoint) -> Option<RoomId> {
        self.index
            .locate_in_envelope_intersecting(&AABB::from_point(cell.to_array()))
            .map(|e| e.room)
            .filter(|id| self.rooms.get(id).is_some_and(|r| r.contains_cell(cell)))
            .min()
    }

    /// The mount attached to the given one, if every anchor of it is mated with an anchor
    /// of the same other mount.
    pub fn attached_to(&self, key: MountKey) -> Option<MountKey> {
        let room = self.rooms.get(&key.room)?;
        self.partner(room, room.mount(key.mount)?)
    }

    /// For each mount of `room`, which need not be attached, the mount of this
    /// construction it is (or would be) attached to.
    pub fn attachments<'r>(&'r self, room: &'r Room) -> impl Iterator<Item = (u16, MountKey)> + 'r {
        room.template
            .mounts()
            .iter()
            .enumerate()
            .filter_map(|(index, mount)| Some((index as u16, self.partner(room, mount)?)))
    }

    fn partner(&self, room: &Room, mount: &Mount) -> Option<MountKey> {
        let mut partner: Option<MountKey> = None;
        for (_, location, direction) in room.world_anchors(mount) {
            let &key = self.anchors.get(&(location, direction.opposite()))?;
            if key.room == room.id {
                return None;
            }
            match partner {
                Some(p) if p != key => return None,
                _ => partner = Some(key),
            }
        }
        let partner = partner?;
        let partner_anchors = self.rooms.get(&partner.room)?.mount(partner.mount)?.anchors().len();
        (partner_anchors == mount.anchors().len()).then_some(partner)
    }

    /// All mounts not attached to anything, in room order.
    pub fn open_mounts(&self) -> Vec<MountKey> {
        self.rooms()
            .flat_map(|room| room.mount_keys())
            .filter(|&key| self.attached_to(key).is_none())
            .collect()
    }
}

impl fmt::Debug for Construction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Construction")
            .field("rooms", &self.order.len())
            .field("anchors", &self.anchors.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDefinition, BlockKind, BlockRegistry};
    use crate::template::{GridScale, TemplateBuilder};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn catalog() -> Catalog {
        let mut registry = BlockRegistry::new();
        registry.insert_block("hull", BlockDefinition::default());
        registry.insert_block(
            "pump",
            BlockDefinition::of_kind(BlockKind::Assembler).with_production("ice", -10.0),
        );
        let mut catalog = Catalog::new(Arc::new(registry));
        catalog
            .insert(
                TemplateBuilder::new("corridor")
                    .fill([0, 0, 0], [1, 1, 3], "hull")
                    .mount("corridor", "front", [([0, 0, 2], Face6::PZ)])
                    .mount("corridor", "back", [([0, 0, 0], Face6::NZ)])
                    .build(),
            )
            .unwrap();
        catalog
            .insert(
                TemplateBuilder::new("pump")
                    .block([0, 0, 0], "pump")
                    .mount("corridor", "end", [([0, 0, 0], Face6::NZ)])
                    .build(),
            )
            .unwrap();
        catalog
            .insert(
                TemplateBuilder::new("joint")
                    .block([0, 0, 0], "hull")
                    .mount("corridor", "a", [([0, 0, 0], Face6::PZ)])
                    .mount("corridor", "b", [([0, 0, 0], Face6::NZ)])
                    .build(),
            )
            .unwrap();
        catalog
    }

    /// A pump turned to face +Z, placed so that its mount lies against cell `(x, y, z + 1)`.
    fn pump_facing_pz(x: i32, y: i32, z: i32) -> Gridgid {
        Gridgid {
            rotation: GridRotation::from_basis(Face6::NX, Face6::PY).unwrap(),
            translation: GridVector::new(x, y, z),
        }
    }

    fn construction() -> Construction {
        Construction::new(Seed::new(0), Arc::new(EngineCaches::default()))
    }

    fn at(x: i32, y: i32, z: i32) -> Gridgid {
        Gridgid::from_translation([x, y, z])
    }

    #[derive(Default)]
    struct Log(Mutex<Vec<RoomChange>>);
    impl RoomListener for Log {
        fn receive(&self, change: &RoomChange) {
            self.0.lock().unwrap().push(change.clone());
        }
    }

    #[test]
    fn attach_and_detach() {
        let catalog = catalog();
        let log = Arc::new(Log::default());
        let mut c = construction();
        c.listen(log.clone());

        let corridor = c.create_room(catalog.get("corridor").unwrap().clone(), Gridgid::IDENTITY);
        let a = c.add_room(corridor).unwrap();
        assert_eq!(c.open_mounts().len(), 2);

        let pump = c.create_room(catalog.get("pump").unwrap().clone(), at(0, 0, 3));
        let b = c.add_room(pump).unwrap();
        assert_eq!(
            c.attached_to(MountKey { room: a, mount: 1 }),
            Some(MountKey { room: b, mount: 0 })
        );
        assert_eq!(c.attached_to(MountKey { room: b, mount: 0 }), Some(MountKey { room: a, mount: 1 }));
        assert_eq!(c.open_mounts(), vec![MountKey { room: a, mount: 0 }]);
        assert_eq!(c.mount_point_at(GridPoint::new(0, 0, 3)), Some(MountKey { room: b, mount: 0 }));
        assert_eq!(c.room_at(GridPoint::new(0, 0, 1)), Some(a));
        assert_eq!(c.room_at(GridPoint::new(1, 0, 1)), None);

        // A detached pump facing the corridor's back.
        let another = c.create_room(
            catalog.get("pump").unwrap().clone(),
            Gridgid {
                rotation: GridRotation::from_basis(Face6::NX, Face6::PY).unwrap(),
                translation: GridVector::new(1, 0, 0),
            },
        );
        assert_eq!(
            c.attachments(&another).collect::<Vec<_>>(),
            vec![(0, MountKey { room: a, mount: 0 })]
        );

        let removed = c.remove_room(b).unwrap();
        assert_eq!(removed.id(), b);
        assert_eq!(c.open_mounts().len(), 2);
        assert_eq!(c.mount_point_at(GridPoint::new(0, 0, 3)), None);
        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                RoomChange::Attached { room: a, template: catalog.get("corridor").unwrap().id() },
                RoomChange::Attached { room: b, template: catalog.get("pump").unwrap().id() },
                RoomChange::Detached { room: b, template: catalog.get("pump").unwrap().id() },
            ]
        );
    }

    #[test]
    fn mounts_sharing_a_cell_attach_independently() {
        let catalog = catalog();
        let mut c = construction();
        let joint = c.create_room(catalog.get("joint").unwrap().clone(), Gridgid::IDENTITY);
        let j = c.add_room(joint).unwrap();
        let (ja, jb) = (MountKey { room: j, mount: 0 }, MountKey { room: j, mount: 1 });
        let cell = GridPoint::new(0, 0, 0);
        assert_eq!(c.mount_point_facing(cell, Face6::PZ), Some(ja));
        assert_eq!(c.mount_point_facing(cell, Face6::NZ), Some(jb));
        assert_eq!(c.mount_point_at(cell), Some(ja));

        let pump = c.create_room(catalog.get("pump").unwrap().clone(), pump_facing_pz(0, 0, -1));
        let p = c.add_room(pump).unwrap();
        let end = MountKey { room: p, mount: 0 };
        assert_eq!(c.attached_to(jb), Some(end));
        assert_eq!(c.attached_to(end), Some(jb));
        assert_eq!(c.open_mounts(), vec![ja]);

        // The other side is still free.
        let pump = c.create_room(catalog.get("pump").unwrap().clone(), at(0, 0, 1));
        let q = c.add_room(pump).unwrap();
        assert_eq!(c.attached_to(ja), Some(MountKey { room: q, mount: 0 }));
        assert!(c.open_mounts().is_empty());

        c.remove_room(q);
        assert_eq!(c.mount_point_facing(GridPoint::new(0, 0, 1), Face6::NZ), None);
        assert_eq!(c.attached_to(jb), Some(end));
        assert_eq!(c.open_mounts(), vec![ja]);
    }

    #[test]
    fn overlapping_anchor_keeps_first_registration() {
        let catalog = catalog();
        let mut c = construction();
        let joint = catalog.get("joint").unwrap().clone();
        let room = c.create_room(joint.clone(), Gridgid::IDENTITY);
        let first = c.add_room(room).unwrap();
        let pump = c.create_room(catalog.get("pump").unwrap().clone(), pump_facing_pz(0, 0, -1));
        let p = c.add_room(pump).unwrap();

        // Rooms are not collision-checked here; the overlap is registered without failing.
        let room = c.create_room(joint, Gridgid::IDENTITY);
        let second = c.add_room(room).unwrap();
        let cell = GridPoint::new(0, 0, 0);
        assert_eq!(
            c.mount_point_facing(cell, Face6::NZ),
            Some(MountKey { room: first, mount: 1 })
        );
        assert_eq!(
            c.attached_to(MountKey { room: p, mount: 0 }),
            Some(MountKey { room: first, mount: 1 })
        );

        c.remove_room(second);
        assert_eq!(
            c.mount_point_facing(cell, Face6::NZ),
            Some(MountKey { room: first, mount: 1 })
        );
        assert_eq!(
            c.mount_point_facing(cell, Face6::PZ),
            Some(MountKey { room: first, mount: 0 })
        );
        assert_eq!(c.anchors.len(), 3);
    }

    #[test]
    fn ledger_tracks_rooms_exactly() {
        let catalog = catalog();
        let mut c = construction();
        let corridor = c.create_room(catalog.get("corridor").unwrap().clone(), Gridgid::IDENTITY);
        c.add_room(corridor).unwrap();
        let before = c.ledger().clone();

        let pump = c.create_room(catalog.get("pump").unwrap().clone(), at(0, 0, 3));
        let id = c.add_room(pump).unwrap();
        assert_eq!(
            c.ledger().production("ice").to_f64(),
            before.production("ice").to_f64() - 10.0
        );
        let sum: Ledger = c.rooms().map(|r| r.ledger()).sum();
        assert_eq!(c.ledger(), &sum);

        c.remove_room(id);
        assert_eq!(c.ledger(), &before);
    }

    #[test]
    fn removal_out_of_order_cleans_up() {
        let catalog = catalog();
        let mut c = construction();
        let template = catalog.get("corridor").unwrap().clone();
        let ids: Vec<RoomId> = (0..4)
            .map(|i| {
                let room = c.create_room(template.clone(), at(0, 0, 3 * i));
                c.add_room(room).unwrap()
            })
            .collect();
        c.remove_room(ids[1]);
        assert_eq!(
            c.rooms().map(|r| r.id()).collect::<Vec<_>>(),
            vec![ids[0], ids[2], ids[3]]
        );
        assert!(c.anchors.values().all(|k| k.room != ids[1]));
        assert_eq!(c.room_at(GridPoint::new(0, 0, 4)), None);
        assert_eq!(c.remove_room(ids[1]).map(|r| r.id()), None);
    }

    #[test]
    fn rejected_rooms_change_nothing() {
        let catalog = catalog();
        let mut c = construction();
        let room = c.create_room(catalog.get("pump").unwrap().clone(), Gridgid::IDENTITY);
        let copy = room.clone();
        c.add_room(room).unwrap();
        assert_eq!(
            c.add_room(copy.clone()),
            Err(ConstructionError::AlreadyAttached(copy.id()))
        );

        let mut other = construction();
        let foreign = other.create_room(catalog.get("pump").unwrap().clone(), at(5, 0, 0));
        let _ = other.create_room(catalog.get("pump").unwrap().clone(), at(5, 0, 0));
        let foreign = Room { id: RoomId(7), ..foreign };
        assert_eq!(c.add_room(foreign), Err(ConstructionError::ForeignRoom(RoomId(7))));

        let mut small = Construction::new(
            Seed::new(0).with_scale(GridScale::Small),
            Arc::new(EngineCaches::default()),
        );
        let room = small.create_room(catalog.get("pump").unwrap().clone(), Gridgid::IDENTITY);
        assert!(matches!(
            small.add_room(room),
            Err(ConstructionError::ScaleMismatch { .. })
        ));
        assert!(small.is_empty());
        assert!(small.ledger().is_empty());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn intersects_and_remembers_pairs() {
        let mut catalog = catalog();
        let ell = catalog
            .insert(
                TemplateBuilder::new("ell")
                    .fill([0, 0, 0], [3, 1, 1], "hull")
                    .fill([0, 1, 0], [1, 3, 1], "hull")
                    .build(),
            )
            .unwrap();
        let pump = catalog.get("pump").unwrap().clone();
        let mut c = construction();
        let first = c.create_room(ell, Gridgid::IDENTITY);
        c.add_room(first).unwrap();

        let overlapping = c.create_room(pump.clone(), at(1, 0, 0));
        let in_the_hollow = c.create_room(pump.clone(), at(2, 2, 0));
        assert!(c.intersects(&overlapping, CollisionMode::STRICT));
        assert!(!c.intersects(&in_the_hollow, CollisionMode::STRICT));
        // Detached rooms are not remembered.
        assert!(c.pair_flags.is_empty());

        let id = c.add_room(in_the_hollow).unwrap();
        let in_the_hollow = c.room(id).unwrap().clone();
        assert!(!c.intersects(&in_the_hollow, CollisionMode::STRICT));
        assert_eq!(c.pair_flags.len(), 1);
        assert!(!c.intersects(&in_the_hollow, CollisionMode::STRICT));
        assert!(c.intersects(
            &in_the_hollow,
            CollisionMode {
                test_optional: true,
                quick: true
            }
        ));
        assert_eq!(c.pair_flags.len(), 1);
        c.remove_room(id);
        assert!(c.pair_flags.is_empty());
    }

    #[test]
    fn placement_records() {
        let catalog = catalog();
        let placement = Placement {
            template: catalog.get("pump").unwrap().clone(),
            transform: Gridgid {
                rotation: GridRotation::from_basis(Face6::PY, Face6::NX).unwrap(),
                translation: GridVector::new(1, 2, 3),
            },
        };
        let record = placement.to_record();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"template":"pump","rotation":["PY","NX","PZ"],"translation":[1,2,3]}"#
        );
        let parsed: PlacementRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.resolve(&catalog).unwrap(), placement);

        let bad = PlacementRecord {
            rotation: [Face6::PX, Face6::PY, Face6::NZ],
            ..record
        };
        assert_eq!(
            bad.resolve(&catalog).unwrap_err(),
            ConstructionError::InvalidRotation([Face6::PX, Face6::PY, Face6::NZ])
        );
    }

    #[test]
    fn replay_reproduces() {
        let catalog = catalog();
        let mut c = construction();
        for (name, t) in [("corridor", Gridgid::IDENTITY), ("pump", at(0, 0, 3))] {
            let room = c.create_room(catalog.get(name).unwrap().clone(), t);
            c.add_room(room).unwrap();
        }
        let placements = c.placements();
        let replayed = Construction::replay(Seed::new(0), c.caches().clone(), &placements).unwrap();
        assert_eq!(replayed.placements(), placements);
        assert_eq!(replayed.ledger(), c.ledger());
        assert_eq!(replayed.open_mounts(), c.open_mounts());
    }
}
