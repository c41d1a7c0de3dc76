//! The frontier-driven search that grows a [`Construction`] toward a [`Seed`].

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use hashbrown::HashMap;
use ordered_float::OrderedFloat;
use rand::{RngCore as _, SeedableRng as _};
use rand_xoshiro::SplitMix64;
use serde::{Deserialize, Serialize};

use crate::caches::EngineCaches;
use crate::catalog::Catalog;
use crate::collision::CollisionMode;
use crate::construction::{
    Construction, ConstructionError, MountKey, Placement, PlacementRecord, Room, RoomId,
    RoomListener,
};
use crate::ledger::Ledger;
use crate::math::Gridgid;
use crate::seed::Seed;
use crate::template::{GridScale, PartTemplate, TemplateId};

/// How the winner of a step is chosen among scored candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
#[non_exhaustive]
pub enum SelectionPolicy {
    /// The highest score. Ties go to the first candidate in key order.
    #[default]
    Best,
    /// A noise-chosen candidate among the best `quantile` fraction (at least one).
    TopQuantile {
        #[allow(missing_docs)]
        quantile: f64,
    },
}

/// Parameters of a generation run.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorOptions {
    #[allow(missing_docs)]
    pub selection: SelectionPolicy,
    /// The growth phase stops at this many rooms.
    pub max_rooms: usize,
    /// The growth phase stops at this many blocks.
    pub max_blocks: usize,
    /// The growth phase stops after this many steps without reducing the error.
    pub patience: u32,
    /// Initial growth target, scaled by `sqrt(population / 10)`.
    pub growth_scale: f64,
    /// Number of steps over which the growth target halves.
    pub growth_decay_steps: f64,
    /// Growth target while closing open mounts. Should be strongly negative.
    pub closing_growth: f64,
    /// Weight of the tie-breaking noise in candidate scores.
    pub noise_weight: f64,
    /// Weight of the change in error against the profile in candidate scores.
    pub error_weight: f64,
    /// Whether candidates whose bounding boxes are inconclusive are rejected instead of
    /// being tested cell by cell.
    pub quick_collisions: bool,
    /// Name of the template to start from. If absent, one is chosen by noise.
    pub start_template: Option<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            selection: SelectionPolicy::Best,
            max_rooms: 200,
            max_blocks: 50_000,
            patience: 5,
            growth_scale: 2.0,
            growth_decay_steps: 20.0,
            closing_growth: -8.0,
            noise_weight: 1.0,
            error_weight: 10.0,
            quick_collisions: false,
            start_template: None,
        }
    }
}

/// Error from [`StationGenerator::generate()`]. The construction is left unchanged.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum GenerationError {
    /// The requested start template has a different grid scale than the profile.
    #[error(
        "start template {template:?} has grid scale {actual:?}, but the profile requires {expected:?}"
    )]
    ScaleMismatch {
        #[allow(missing_docs)]
        template: String,
        #[allow(missing_docs)]
        actual: GridScale,
        #[allow(missing_docs)]
        expected: GridScale,
    },
    /// No template is eligible to start from.
    #[error("no template of grid scale {0:?} has at least two mounts")]
    NoStartingTemplate(GridScale),
    /// The requested start template does not exist.
    #[error("start template {0:?} is not in the catalog")]
    UnknownStartTemplate(String),
    #[allow(missing_docs)]
    #[error(transparent)]
    Construction(#[from] ConstructionError),
}

/// Result of [`StationGenerator::generate()`].
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct GeneratedStation {
    /// Placed templates, in the order they were attached.
    pub placements: Vec<Placement>,
    /// Sum of all placed templates' ledgers.
    pub ledger: Ledger,
    /// Mounts that could not be closed. Nonempty means generation only partly succeeded.
    pub open_mounts: Vec<MountKey>,
    /// Final error against the profile.
    pub error: f64,
    /// Number of steps taken while growing.
    pub growth_steps: usize,
    /// Number of steps taken while closing.
    pub closing_steps: usize,
}

impl GeneratedStation {
    /// Converts to the serializable form.
    pub fn to_record(&self, seed: &Seed) -> StationRecord {
        StationRecord {
            seed: seed.seed,
            error: self.error,
            open_mounts: self.open_mounts.len(),
            placements: self.placements.iter().map(Placement::to_record).collect(),
            ledger: self.ledger.clone(),
        }
    }
}

/// Serialized form of a [`GeneratedStation`].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[non_exhaustive]
pub struct StationRecord {
    /// [`Seed::seed`] of the profile.
    pub seed: i64,
    #[allow(missing_docs)]
    pub error: f64,
    /// Number of mounts left open.
    pub open_mounts: usize,
    #[allow(missing_docs)]
    pub placements: Vec<PlacementRecord>,
    #[allow(missing_docs)]
    pub ledger: Ledger,
}

/// Noise keys for decisions that are not about a particular candidate.
const BOOTSTRAP_KEY: i64 = -1;
const SELECTION_KEY: i64 = 0x5e1ec7;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
struct CandidateKey {
    template: TemplateId,
    transform: Gridgid,
}

#[derive(Debug)]
struct Candidate {
    room: Room,
    /// Number of open mounts which can produce this candidate.
    in_factor: u32,
    /// Expansion pass that last counted this candidate.
    nonce: u64,
    /// One bit per [`CollisionMode`] in which this candidate is known to collide.
    collides: u8,
}

/// Grows a [`Construction`] by attaching templates from a [`Catalog`] at open mounts,
/// guided by a target profile ([`Seed`]).
///
/// Every open mount is expanded once into candidate placements: each transform which
/// joins some catalog mount to it. Each step scores all candidates that do not collide,
/// attaches the winner, and updates the set of open mounts and candidates incrementally.
/// Generation is deterministic for a given catalog, profile and options.
pub struct StationGenerator {
    catalog: Arc<Catalog>,
    options: GeneratorOptions,
    construction: Construction,

    /// Open mounts not yet expanded, oldest first.
    frontier: VecDeque<MountKey>,
    open: BTreeSet<MountKey>,
    candidates: BTreeMap<CandidateKey, Candidate>,
    /// Candidates by the open mounts that produced them.
    dependents: HashMap<MountKey, BTreeSet<CandidateKey>>,
    nonce: u64,
}

impl StationGenerator {
    /// Prepares to generate a new structure.
    pub fn new(
        catalog: Arc<Catalog>,
        caches: Arc<EngineCaches>,
        seed: Seed,
        options: GeneratorOptions,
    ) -> Self {
        Self {
            catalog,
            options,
            construction: Construction::new(seed, caches),
            frontier: VecDeque::new(),
            open: BTreeSet::new(),
            candidates: BTreeMap::new(),
            dependents: HashMap::new(),
            nonce: 0,
        }
    }

    /// The structure built so far.
    pub fn construction(&self) -> &Construction {
        &self.construction
    }

    /// Consumes the generator, returning the structure.
    pub fn into_construction(self) -> Construction {
        self.construction
    }

    /// Registers a listener for rooms being attached.
    pub fn listen(&mut self, listener: Arc<dyn RoomListener>) {
        self.construction.listen(listener);
    }

    /// Number of mounts currently open.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Number of candidate placements currently known.
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }

    fn seed(&self) -> &Seed {
        self.construction.seed()
    }

    /// Runs the whole generation: start, grow, then close open mounts.
    ///
    /// Leftover open mounts are not an error; they are reported in the result.
    pub fn generate(&mut self) -> Result<GeneratedStation, GenerationError> {
        if self.construction.is_empty() {
            self.bootstrap()?;
        }
        let growth_steps = self.grow();
        let closing_steps = self.close();

        let open_mounts: Vec<MountKey> = self.open.iter().copied().collect();
        if !open_mounts.is_empty() {
            log::debug!("{n} mounts left open", n = open_mounts.len());
        }
        Ok(GeneratedStation {
            placements: self.construction.placements(),
            ledger: self.construction.ledger().clone(),
            open_mounts,
            error: self.construction.error(),
            growth_steps,
            closing_steps,
        })
    }

    fn bootstrap(&mut self) -> Result<(), GenerationError> {
        let scale = self.seed().scale;
        let template: Arc<PartTemplate> = match &self.options.start_template {
            Some(name) => {
                let template = self
                    .catalog
                    .get(name)
                    .ok_or_else(|| GenerationError::UnknownStartTemplate(name.clone()))?;
                if template.scale() != scale {
                    return Err(GenerationError::ScaleMismatch {
                        template: name.clone(),
                        actual: template.scale(),
                        expected: scale,
                    });
                }
                template.clone()
            }
            None => {
                let eligible: Vec<&Arc<PartTemplate>> = self
                    .catalog
                    .templates()
                    .filter(|t| t.scale() == scale && t.mounts().len() >= 2)
                    .collect();
                let tagged: Vec<&Arc<PartTemplate>> =
                    eligible.iter().copied().filter(|t| t.has_tag("start")).collect();
                let pool = if tagged.is_empty() { eligible } else { tagged };
                if pool.is_empty() {
                    return Err(GenerationError::NoStartingTemplate(scale));
                }
                let index = (self.seed().noise(BOOTSTRAP_KEY) * pool.len() as f64) as usize;
                pool[index.min(pool.len() - 1)].clone()
            }
        };
        log::debug!("starting from {name}", name = template.name());
        let room = self.construction.create_room(template, Gridgid::IDENTITY);
        let id = self.construction.add_room(room)?;
        self.track_new_mounts(id);
        Ok(())
    }

    fn growth_target(&self, step: usize) -> f64 {
        let population = f64::from(self.seed().population);
        let decay = 1.0 + step as f64 / self.options.growth_decay_steps.max(f64::MIN_POSITIVE);
        self.options.growth_scale * (population / 10.0).sqrt() / decay
    }

    fn grow(&mut self) -> usize {
        let mut best_error = self.construction.error();
        let mut stale = 0;
        let mut steps = 0;
        loop {
            if self.construction.len() >= self.options.max_rooms
                || self.construction.block_count() >= self.options.max_blocks
            {
                log::debug!("growth stopped at budget after {steps} steps");
                break;
            }
            if !self.step(self.growth_target(steps), true) {
                log::debug!("growth exhausted after {steps} steps");
                break;
            }
            steps += 1;
            let error = self.construction.error();
            if error < best_error {
                best_error = error;
                stale = 0;
            } else {
                stale += 1;
                if stale >= self.options.patience {
                    log::debug!("growth stopped improving after {steps} steps");
                    break;
                }
            }
        }
        steps
    }

    /// Open mounts that some template could attach to.
    fn closeable_count(&self) -> usize {
        let caches = self.construction.caches();
        self.open
            .iter()
            .filter(|&&key| {
                self.construction
                    .room(key.room)
                    .and_then(|room| room.mount(key.mount))
                    .is_some_and(|mount| self.catalog.smallest_terminator(mount, caches).is_some())
            })
            .count()
    }

    fn close(&mut self) -> usize {
        let mut steps = 0;
        for test_optional in [true, false] {
            let closeable = self.closeable_count();
            if closeable == 0 {
                break;
            }
            if !test_optional {
                log::debug!("retrying {closeable} mounts ignoring optional reserved space");
            }
            for _ in 0..2 * closeable + 2 {
                if self.closeable_count() == 0 || !self.step(self.options.closing_growth, test_optional) {
                    break;
                }
                steps += 1;
            }
        }
        steps
    }

    /// Attaches one room. Returns `false`, having changed nothing, if no candidate fits.
    ///
    /// `target_growth` is the desired change in the number of open mounts.
    pub fn step(&mut self, target_growth: f64, test_optional: bool) -> bool {
        while let Some(key) = self.frontier.pop_front() {
            if self.open.contains(&key) {
                self.expand(key);
            }
        }

        let mode = CollisionMode {
            test_optional,
            quick: self.options.quick_collisions,
        };
        let flag = 1u8 << mode.flag_shift();
        let open = self.open.len() as f64;
        let current_error = self.construction.error();
        let mut error_deltas: HashMap<TemplateId, f64> = HashMap::new();
        let mut scored: Vec<(OrderedFloat<f64>, CandidateKey)> = Vec::new();

        for (&key, candidate) in &mut self.candidates {
            if candidate.collides & flag != 0 {
                continue;
            }
            if self.construction.intersects(&candidate.room, mode) {
                candidate.collides |= flag;
                continue;
            }

            let mounts = candidate.room.template().mounts().len() as f64;
            let attached = self.construction.attachments(&candidate.room).count() as f64;
            if attached == 0.0 {
                continue;
            }
            let delta = mounts - 2.0 * attached;
            if (target_growth < 0.0 && delta > 0.0) || (target_growth >= 0.0 && open + delta <= 0.0) {
                continue;
            }
            let growth_penalty = (delta - target_growth).powi(2) * (1.0 + open).sqrt();

            let template = candidate.room.template();
            let construction = &self.construction;
            let error_delta = *error_deltas.entry(template.id()).or_insert_with(|| {
                construction.seed().error(&[construction.ledger(), template.ledger()]) - current_error
            });

            let noise = construction
                .seed()
                .noise((template.name_hash() ^ transform_hash(key.transform)) as i64);
            let score = self.options.noise_weight * noise
                - growth_penalty
                - self.options.error_weight * error_delta;
            scored.push((OrderedFloat(score), key));
        }

        let Some(winner) = self.select(scored) else {
            log::trace!("no viable candidate among {n}", n = self.candidates.len());
            return false;
        };
        self.commit(winner)
    }

    fn select(&self, mut scored: Vec<(OrderedFloat<f64>, CandidateKey)>) -> Option<CandidateKey> {
        match self.options.selection {
            SelectionPolicy::Best => scored
                .into_iter()
                .reduce(|best, next| if next.0 > best.0 { next } else { best })
                .map(|(_, key)| key),
            SelectionPolicy::TopQuantile { quantile } => {
                if scored.is_empty() {
                    return None;
                }
                scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
                let top = ((quantile * scored.len() as f64).ceil() as usize).clamp(1, scored.len());
                let noise = self
                    .seed()
                    .noise(SELECTION_KEY ^ self.construction.len() as i64);
                let index = ((noise * top as f64) as usize).min(top - 1);
                Some(scored[index].1)
            }
        }
    }

    fn commit(&mut self, key: CandidateKey) -> bool {
        let Some(candidate) = self.candidates.remove(&key) else {
            return false;
        };
        let closed: Vec<MountKey> = self
            .construction
            .attachments(&candidate.room)
            .map(|(_, partner)| partner)
            .collect();
        let name = candidate.room.template().name().to_owned();
        let id = match self.construction.add_room(candidate.room) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("discarding candidate {name}: {e}");
                return false;
            }
        };
        log::trace!(
            "attached {name} at {transform:?}, closing {n} mounts",
            transform = key.transform,
            n = closed.len()
        );
        for mount in closed {
            self.close_mount(mount);
        }
        self.track_new_mounts(id);
        true
    }

    /// Records the still-open mounts of a newly attached room.
    fn track_new_mounts(&mut self, room: RoomId) {
        let Some(room) = self.construction.room(room) else {
            return;
        };
        let new: Vec<MountKey> = room
            .mount_keys()
            .filter(|&key| self.construction.attached_to(key).is_none())
            .collect();
        for key in new {
            self.open.insert(key);
            self.frontier.push_back(key);
        }
    }

    fn close_mount(&mut self, mount: MountKey) {
        self.open.remove(&mount);
        self.frontier.retain(|&k| k != mount);
        for key in self.dependents.remove(&mount).unwrap_or_default() {
            if let Some(candidate) = self.candidates.get_mut(&key) {
                candidate.in_factor = candidate.in_factor.saturating_sub(1);
                if candidate.in_factor == 0 {
                    self.candidates.remove(&key);
                }
            }
        }
    }

    /// Registers every placement that attaches some catalog mount to `key`.
    fn expand(&mut self, key: MountKey) {
        self.nonce += 1;
        let nonce = self.nonce;
        let Some(room) = self.construction.room(key.room) else {
            return;
        };
        let Some(mount) = room.mount(key.mount) else {
            return;
        };
        let room_transform = room.transform();
        let scale = self.seed().scale;
        let caches = self.construction.caches().clone();

        let mut found: Vec<(Arc<PartTemplate>, Gridgid)> = Vec::new();
        for other in self.catalog.mounts_of_type(mount.kind()) {
            if other.template.scale() != scale {
                continue;
            }
            for &t in caches.mount_transforms(mount, other.mount()).iter() {
                found.push((other.template.clone(), room_transform * t));
            }
        }

        let mut produced = BTreeSet::new();
        for (template, transform) in found {
            let candidate_key = CandidateKey {
                template: template.id(),
                transform,
            };
            let candidate = match self.candidates.entry(candidate_key) {
                std::collections::btree_map::Entry::Occupied(entry) => entry.into_mut(),
                std::collections::btree_map::Entry::Vacant(entry) => entry.insert(Candidate {
                    room: self.construction.create_room(template, transform),
                    in_factor: 0,
                    nonce: 0,
                    collides: 0,
                }),
            };
            if candidate.nonce != nonce {
                candidate.nonce = nonce;
                candidate.in_factor += 1;
                produced.insert(candidate_key);
            }
        }
        log::trace!("{key:?} produced {n} candidates", n = produced.len());
        self.dependents.entry(key).or_default().extend(produced);
    }
}

impl std::fmt::Debug for StationGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StationGenerator")
            .field("construction", &self.construction)
            .field("open", &self.open.len())
            .field("candidates", &self.candidates.len())
            .finish_non_exhaustive()
    }
}

/// Stable hash of a transform, for keying noise.
fn transform_hash(transform: Gridgid) -> u64 {
    let mut hash = u64::from(transform.rotation.code());
    for coordinate in transform.translation.to_array() {
        hash = SplitMix64::seed_from_u64(hash.rotate_left(21) ^ u64::from(coordinate as u32)).next_u64();
    }
    hash
}

/// Generates one structure per seed, in parallel if the `auto-threads` feature is
/// enabled. Results are in the order of `seeds` and equal to those of generating each
/// one separately.
pub fn generate_batch(
    catalog: &Arc<Catalog>,
    caches: &Arc<EngineCaches>,
    seeds: &[Seed],
    options: &GeneratorOptions,
) -> Vec<Result<GeneratedStation, GenerationError>> {
    let run = |seed: &Seed| {
        StationGenerator::new(catalog.clone(), caches.clone(), seed.clone(), options.clone())
            .generate()
    };
    #[cfg(feature = "auto-threads")]
    {
        use rayon::prelude::*;
        seeds.par_iter().map(run).collect()
    }
    #[cfg(not(feature = "auto-threads"))]
    {
        seeds.iter().map(run).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockDefinition, BlockRegistry};
    use crate::math::Face6;
    use crate::mount::AdjacencyRule;
    use crate::template::{AnchorSource, TemplateBuilder};
    use pretty_assertions::assert_eq;

    fn registry() -> Arc<BlockRegistry> {
        let mut registry = BlockRegistry::new();
        registry.insert_block("hull", BlockDefinition::default());
        Arc::new(registry)
    }

    /// Corridors along Z, a hub with four horizontal ports, and a cap.
    fn catalog() -> Arc<Catalog> {
        let mut catalog = Catalog::new(registry());
        for source in [
            TemplateBuilder::new("corridor")
                .fill([0, 0, 0], [1, 1, 3], "hull")
                .mount("port", "front", [([0, 0, 2], Face6::PZ)])
                .mount("port", "back", [([0, 0, 0], Face6::NZ)])
                .build(),
            TemplateBuilder::new("hub")
                .fill([0, 0, 0], [3, 1, 3], "hull")
                .mount("port", "n", [([1, 0, 2], Face6::PZ)])
                .mount("port", "s", [([1, 0, 0], Face6::NZ)])
                .mount("port", "e", [([2, 0, 1], Face6::PX)])
                .mount("port", "w", [([0, 0, 1], Face6::NX)])
                .tag("start")
                .build(),
            TemplateBuilder::new("cap")
                .block([0, 0, 0], "hull")
                .mount("port", "end", [([0, 0, 0], Face6::NZ)])
                .build(),
        ] {
            catalog.insert(source).unwrap();
        }
        Arc::new(catalog)
    }

    fn generator(seed: i64, options: GeneratorOptions) -> StationGenerator {
        StationGenerator::new(catalog(), Arc::new(EngineCaches::default()), Seed::new(seed), options)
    }

    #[test]
    fn bootstrap_prefers_tagged_templates() {
        let mut g = generator(1, GeneratorOptions::default());
        g.bootstrap().unwrap();
        let rooms: Vec<&str> = g.construction().rooms().map(|r| r.template().name()).collect();
        assert_eq!(rooms, vec!["hub"]);
        assert_eq!(g.open_count(), 4);
        assert_eq!(g.frontier.len(), 4);
    }

    #[test]
    fn bootstrap_errors() {
        let mut g = generator(
            1,
            GeneratorOptions {
                start_template: Some("nope".into()),
                ..GeneratorOptions::default()
            },
        );
        assert_eq!(
            g.generate().unwrap_err(),
            GenerationError::UnknownStartTemplate("nope".into())
        );
        assert!(g.construction().is_empty());

        let mut g = StationGenerator::new(
            catalog(),
            Arc::new(EngineCaches::default()),
            Seed::new(1).with_scale(GridScale::Small),
            GeneratorOptions::default(),
        );
        assert_eq!(
            g.generate().unwrap_err(),
            GenerationError::NoStartingTemplate(GridScale::Small)
        );

        let mut g = StationGenerator::new(
            catalog(),
            Arc::new(EngineCaches::default()),
            Seed::new(1).with_scale(GridScale::Small),
            GeneratorOptions {
                start_template: Some("hub".into()),
                ..GeneratorOptions::default()
            },
        );
        assert!(matches!(
            g.generate().unwrap_err(),
            GenerationError::ScaleMismatch { .. }
        ));
        assert!(g.construction().is_empty());
    }

    #[test]
    fn in_factor_counts_distinct_mounts() {
        let mut g = generator(1, GeneratorOptions::default());
        g.bootstrap().unwrap();
        let hub = g.construction().rooms().next().unwrap().id();
        g.expand(MountKey { room: hub, mount: 0 });
        let after_one = g.candidates.len();
        assert!(after_one > 0);
        assert!(g.candidates.values().all(|c| c.in_factor == 1));
        // Nothing else produces these candidates.
        g.close_mount(MountKey { room: hub, mount: 0 });
        assert_eq!(g.candidates.len(), 0);
    }

    #[test]
    fn step_attaches_and_updates_frontier() {
        let mut g = generator(3, GeneratorOptions::default());
        g.bootstrap().unwrap();
        assert!(g.step(1.0, true));
        assert_eq!(g.construction().len(), 2);
        // Whatever was attached closed exactly one hub mount.
        let hub = g.construction().rooms().next().unwrap().id();
        let open_on_hub = g.open.iter().filter(|k| k.room == hub).count();
        assert_eq!(open_on_hub, 3);
        let sum: Ledger = g.construction().rooms().map(|r| r.ledger()).sum();
        assert_eq!(g.construction().ledger(), &sum);
    }

    #[test]
    fn negative_target_excludes_growth() {
        let mut g = generator(5, GeneratorOptions::default());
        g.bootstrap().unwrap();
        assert!(g.step(-8.0, true));
        let placed = g.construction().rooms().nth(1).unwrap().template().name().to_owned();
        assert_eq!(placed, "cap");
        assert_eq!(g.open_count(), 3);
    }

    #[test]
    fn exhausted_step_changes_nothing() {
        let mut catalog = Catalog::new(registry());
        let anchor = |direction| {
            AnchorSource::new([0, 0, 0], direction).with_adjacency(AdjacencyRule::ExcludeSameTemplate)
        };
        catalog
            .insert(
                TemplateBuilder::new("lonely")
                    .block([0, 0, 0], "hull")
                    .mount_with("port", "a", [anchor(Face6::PX)])
                    .mount_with("port", "b", [anchor(Face6::NX)])
                    .build(),
            )
            .unwrap();
        let mut g = StationGenerator::new(
            Arc::new(catalog),
            Arc::new(EngineCaches::default()),
            Seed::new(0),
            GeneratorOptions::default(),
        );
        g.bootstrap().unwrap();
        let before = g.construction().placements();
        let ledger = g.construction().ledger().clone();

        assert!(!g.step(1.0, true));
        assert_eq!(g.construction().placements(), before);
        assert_eq!(g.construction().ledger(), &ledger);
        assert_eq!(g.open_count(), 2);

        let station = g.generate().unwrap();
        assert_eq!(station.placements.len(), 1);
        assert_eq!(station.open_mounts.len(), 2);
        assert_eq!((station.growth_steps, station.closing_steps), (0, 0));
    }

    #[test]
    fn closing_retries_without_optional_reserves() {
        let mut catalog = Catalog::new(registry());
        catalog
            .insert(
                TemplateBuilder::new("berth")
                    .block([0, 0, 0], "hull")
                    .mount_with(
                        "port",
                        "open",
                        [AnchorSource::new([0, 0, 0], Face6::PX)
                            .with_adjacency(AdjacencyRule::ExcludeSameTemplate)],
                    )
                    // Exactly where a cap on the port would go.
                    .reserve([1, 0, 0], [2, 1, 1], false, true)
                    .build(),
            )
            .unwrap();
        catalog
            .insert(
                TemplateBuilder::new("cap")
                    .block([0, 0, 0], "hull")
                    .mount("port", "end", [([0, 0, 0], Face6::NZ)])
                    .build(),
            )
            .unwrap();
        let catalog = Arc::new(catalog);
        let options = GeneratorOptions {
            max_rooms: 1,
            start_template: Some("berth".into()),
            ..GeneratorOptions::default()
        };
        let new_generator = || {
            StationGenerator::new(
                catalog.clone(),
                Arc::new(EngineCaches::default()),
                Seed::new(0),
                options.clone(),
            )
        };

        let mut g = new_generator();
        g.bootstrap().unwrap();
        assert!(!g.step(options.closing_growth, true));
        assert_eq!(g.open_count(), 1);
        assert_eq!(g.construction().len(), 1);

        assert_eq!(g.close(), 1);
        assert_eq!(g.open_count(), 0);
        let names: Vec<&str> = g.construction().rooms().map(|r| r.template().name()).collect();
        assert_eq!(names, vec!["berth", "cap"]);

        let station = new_generator().generate().unwrap();
        assert_eq!((station.growth_steps, station.closing_steps), (0, 1));
        assert!(station.open_mounts.is_empty());
    }

    #[test]
    fn selection_policies() {
        let g = generator(9, GeneratorOptions::default());
        let key = |x: i32| CandidateKey {
            template: TemplateId::from_raw(1),
            transform: Gridgid::from_translation([x, 0, 0]),
        };
        let scored = vec![
            (OrderedFloat(1.0), key(0)),
            (OrderedFloat(3.0), key(1)),
            (OrderedFloat(3.0), key(2)),
            (OrderedFloat(-1.0), key(3)),
        ];
        assert_eq!(g.select(scored.clone()), Some(key(1)));
        assert_eq!(g.select(Vec::new()), None);

        let q = generator(
            9,
            GeneratorOptions {
                selection: SelectionPolicy::TopQuantile { quantile: 0.5 },
                ..GeneratorOptions::default()
            },
        );
        let chosen = q.select(scored).unwrap();
        assert!(chosen == key(1) || chosen == key(2), "{chosen:?}");
    }

    #[test]
    fn options_json() {
        let options: GeneratorOptions = serde_json::from_str(
            r#"{ "selection": { "policy": "top_quantile", "quantile": 0.01 }, "max_rooms": 12 }"#,
        )
        .unwrap();
        assert_eq!(
            options,
            GeneratorOptions {
                selection: SelectionPolicy::TopQuantile { quantile: 0.01 },
                max_rooms: 12,
                ..GeneratorOptions::default()
            }
        );
    }

    #[test]
    fn transform_hash_distinguishes() {
        let a = Gridgid::from_translation([1, 0, 0]);
        let b = Gridgid::from_translation([0, 1, 0]);
        assert_ne!(transform_hash(a), transform_hash(b));
        assert_eq!(transform_hash(a), transform_hash(a));
    }
}
