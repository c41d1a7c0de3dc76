use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::block::BlockRegistry;
use crate::caches::EngineCaches;
use crate::mount::{Mount, MountId};
use crate::template::{DerivedCache, PartTemplate, TemplateError, TemplateId, TemplateSource};

/// Error from adding templates to a [`Catalog`].
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// The authoring data was invalid.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// A template with the same name is already present.
    #[error("catalog already contains a template named {0:?}")]
    DuplicateName(String),
    /// Two templates hashed to the same id.
    #[error("templates {name:?} and {existing:?} have the same id")]
    DuplicateId {
        #[allow(missing_docs)]
        name: String,
        #[allow(missing_docs)]
        existing: String,
    },
}

/// Serialized form of a whole catalog: block definitions plus templates.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
#[non_exhaustive]
pub struct CatalogFile {
    /// Definitions of the blocks the templates use.
    pub registry: BlockRegistry,
    /// Templates.
    pub templates: Vec<TemplateSource>,
}

/// A mount together with the template it belongs to.
#[derive(Clone, Debug)]
pub struct MountRef {
    /// The template.
    pub template: Arc<PartTemplate>,
    /// Index into the template's mounts.
    pub index: u16,
}

impl MountRef {
    /// The mount.
    pub fn mount(&self) -> &Mount {
        &self.template.mounts()[usize::from(self.index)]
    }
}

/// The set of [`PartTemplate`]s available to generation.
///
/// Templates are kept in name order, so every iteration over a catalog is deterministic.
/// A catalog is only changed through `&mut self`, typically before it is wrapped in an
/// [`Arc`] and shared; the lookup tables that depend on its contents are rebuilt lazily
/// after each change.
#[derive(Debug)]
pub struct Catalog {
    registry: Arc<BlockRegistry>,
    derived_cache: Option<Arc<dyn DerivedCache>>,
    by_name: BTreeMap<Arc<str>, Arc<PartTemplate>>,
    by_id: HashMap<TemplateId, Arc<PartTemplate>>,

    /// Mounts by type, in catalog order.
    by_kind: OnceLock<HashMap<Arc<str>, Vec<MountRef>>>,
    terminators: Mutex<HashMap<MountId, Option<TemplateId>>>,
}

impl Catalog {
    /// Constructs an empty catalog whose templates use the blocks in `registry`.
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self {
            registry,
            derived_cache: None,
            by_name: BTreeMap::new(),
            by_id: HashMap::new(),
            by_kind: OnceLock::new(),
            terminators: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the cache through which templates added from now on load and store their
    /// derived data.
    #[must_use]
    pub fn with_derived_cache(mut self, cache: Arc<dyn DerivedCache>) -> Self {
        self.derived_cache = Some(cache);
        self
    }

    /// Builds a catalog from a [`CatalogFile`].
    pub fn from_file(
        file: CatalogFile,
        derived_cache: Option<Arc<dyn DerivedCache>>,
    ) -> Result<Self, CatalogError> {
        let mut catalog = Self::new(Arc::new(file.registry));
        catalog.derived_cache = derived_cache;
        for source in file.templates {
            catalog.insert(source)?;
        }
        Ok(catalog)
    }

    /// Validates and adds a template.
    pub fn insert(&mut self, source: TemplateSource) -> Result<Arc<PartTemplate>, CatalogError> {
        if self.by_name.contains_key(source.name.as_str()) {
            return Err(CatalogError::DuplicateName(source.name));
        }
        let template = Arc::new(PartTemplate::with_cache(
            source,
            self.registry.clone(),
            self.derived_cache.clone(),
        )?);
        if let Some(existing) = self.by_id.get(&template.id()) {
            return Err(CatalogError::DuplicateId {
                name: template.name().to_owned(),
                existing: existing.name().to_owned(),
            });
        }

        self.by_name
            .insert(template.name_arc().clone(), template.clone());
        self.by_id.insert(template.id(), template.clone());
        self.by_kind = OnceLock::new();
        self.terminators
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(template)
    }

    /// The block definitions templates are built from.
    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Whether there are no templates.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Looks up a template by name.
    pub fn get(&self, name: &str) -> Option<&Arc<PartTemplate>> {
        self.by_name.get(name)
    }

    /// Looks up a template by id.
    pub fn get_by_id(&self, id: TemplateId) -> Option<&Arc<PartTemplate>> {
        self.by_id.get(&id)
    }

    /// All templates, in name order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<PartTemplate>> + '_ {
        self.by_name.values()
    }

    /// All mounts of the given type, in catalog order.
    pub fn mounts_of_type(&self, kind: &str) -> &[MountRef] {
        let index = self.by_kind.get_or_init(|| {
            let mut index: HashMap<Arc<str>, Vec<MountRef>> = HashMap::new();
            for template in self.by_name.values() {
                for (i, mount) in template.mounts().iter().enumerate() {
                    index
                        .entry(Arc::from(mount.kind()))
                        .or_default()
                        .push(MountRef {
                            template: template.clone(),
                            index: i as u16,
                        });
                }
            }
            index
        });
        index.get(kind).map_or(&[], Vec::as_slice)
    }

    /// Computes the derived data of every template now rather than on first use.
    pub fn precompute(&self) {
        #[cfg(feature = "auto-threads")]
        {
            use rayon::prelude::*;
            let templates: Vec<&Arc<PartTemplate>> = self.by_name.values().collect();
            templates.par_iter().for_each(|t| {
                t.ledger();
            });
        }
        #[cfg(not(feature = "auto-threads"))]
        for template in self.by_name.values() {
            template.ledger();
        }
    }

    /// Returns the smallest template which can attach to `mount`, for estimating whether
    /// the mount can be closed at all.
    ///
    /// Templates with exactly one mount are preferred; otherwise any template with a
    /// compatible mount will do. Size is compared by bounding box diagonal, then name.
    /// If nothing fits, a warning is logged and [`None`] is returned.
    /// The answer is memoized until the catalog changes.
    pub fn smallest_terminator(
        &self,
        mount: &Mount,
        caches: &EngineCaches,
    ) -> Option<Arc<PartTemplate>> {
        if let Some(&known) = self
            .terminators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&mount.id())
        {
            return known.and_then(|id| self.by_id.get(&id).cloned());
        }

        let scale = self.by_id.get(&mount.id().template).map(|t| t.scale());
        let mut single: Option<&Arc<PartTemplate>> = None;
        let mut any: Option<&Arc<PartTemplate>> = None;
        for candidate in self.mounts_of_type(mount.kind()) {
            let template = &candidate.template;
            if scale.is_some_and(|s| s != template.scale())
                || caches.mount_transforms(mount, candidate.mount()).is_empty()
            {
                continue;
            }
            let smaller = |best: Option<&Arc<PartTemplate>>| {
                best.is_none_or(|b| size_key(template) < size_key(b))
            };
            if template.mounts().len() == 1 && smaller(single) {
                single = Some(template);
            }
            if smaller(any) {
                any = Some(template);
            }
        }
        let found = single.or(any).cloned();
        if found.is_none() {
            log::warn!(
                "no template can attach to mount {kind}/{name} of template {template:?}",
                kind = mount.kind(),
                name = mount.name(),
                template = mount.id().template,
            );
        }
        self.terminators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(mount.id(), found.as_ref().map(|t| t.id()));
        found
    }
}

fn size_key(template: &PartTemplate) -> (i64, &str) {
    (template.bounds().diagonal_squared(), template.name())
}
