use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collision::CollisionKey;
use crate::lru::SharedLru;
pub use crate::lru::CacheStats;
use crate::math::Gridgid;
use crate::mount::MountId;

/// Capacities of the memo tables in [`EngineCaches`].
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct CacheConfig {
    /// Maximum number of (mount, mount) pairs whose matching transforms are remembered.
    pub mount_transforms: usize,
    /// Maximum number of exact template-pair collision results remembered.
    pub template_collisions: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mount_transforms: 1 << 14,
            template_collisions: 1 << 16,
        }
    }
}

/// Memo tables for the pure, expensive computations of generation: mount matching and
/// exact collision tests.
///
/// One instance may be shared (via [`Arc`]) by any number of generators, on any number of
/// threads, as long as they use catalogs whose template ids do not collide.
#[derive(Debug)]
pub struct EngineCaches {
    pub(crate) mount_transforms: SharedLru<(MountId, MountId), Arc<[Gridgid]>>,
    pub(crate) template_collisions: SharedLru<CollisionKey, bool>,
}

impl EngineCaches {
    /// Constructs empty caches with the given capacities.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            mount_transforms: SharedLru::new(config.mount_transforms),
            template_collisions: SharedLru::new(config.template_collisions),
        }
    }

    /// Statistics of the mount-transform cache.
    pub fn mount_transform_stats(&self) -> CacheStats {
        self.mount_transforms.stats()
    }

    /// Statistics of the exact-collision cache.
    pub fn collision_stats(&self) -> CacheStats {
        self.template_collisions.stats()
    }

    /// Forgets all cached results.
    pub fn clear(&self) {
        self.mount_transforms.clear();
        self.template_collisions.clear();
    }
}

impl Default for EngineCaches {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
