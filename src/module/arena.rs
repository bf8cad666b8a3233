use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::ModuleStructureError;

use super::{qualify_namespace, Module, ModuleCatalog, ModuleDefinition, Resource};

/// Stable handle of a module inside its [`ModuleArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(usize);

impl ModuleId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a hierarchical name lookup.
#[derive(Debug)]
pub struct Resolved<'a> {
    /// Module that declares the resource
    pub owner: ModuleId,
    /// `<owner namespace>::<qualified name>`
    pub fq_name: String,
    pub resource: &'a Resource,
}

/// Owns every module instance of an application.
///
/// The namespace cache remembers misses as well as hits, so an unknown
/// namespace is only looked up in the catalog once.
#[derive(Default)]
pub struct ModuleArena {
    catalog: ModuleCatalog,
    records: Vec<Module>,
    by_namespace: HashMap<String, Option<ModuleId>>,
}

impl ModuleArena {
    #[must_use]
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog,
            records: Vec::new(),
            by_namespace: HashMap::new(),
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// Add a definition. Namespaces already looked up are not affected.
    pub fn define(&mut self, definition: ModuleDefinition) {
        self.catalog.add(definition);
    }

    /// `None` when `namespace` was never looked up, `Some(None)` for a cached
    /// miss.
    #[must_use]
    pub fn cached(&self, namespace: &str) -> Option<Option<ModuleId>> {
        self.by_namespace.get(namespace).copied()
    }

    pub(crate) fn cache_miss(&mut self, namespace: &str) {
        self.by_namespace.insert(namespace.to_string(), None);
    }

    pub(crate) fn uncache(&mut self, namespace: &str) {
        self.by_namespace.remove(namespace);
    }

    /// Instantiate `definition` without links and cache it under its namespace.
    pub(crate) fn insert(&mut self, definition: &ModuleDefinition) -> ModuleId {
        let id = ModuleId(self.records.len());
        self.records.push(Module::from_definition(id, definition));
        self.by_namespace
            .insert(definition.namespace.clone(), Some(id));
        debug!(module = %definition.namespace, id = %id, "Module instantiated");
        id
    }

    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.records.get(id.0)
    }

    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.records.get_mut(id.0)
    }

    /// Module instantiated for `namespace`, if any.
    #[must_use]
    pub fn by_namespace(&self, namespace: &str) -> Option<&Module> {
        self.cached(namespace)
            .flatten()
            .and_then(|id| self.get(id))
    }

    /// Every live module, in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.records
            .iter()
            .filter(|m| self.cached(m.namespace()) == Some(Some(m.id())))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn namespace_of(&self, id: ModuleId) -> String {
        self.get(id)
            .map(|m| m.namespace().to_string())
            .unwrap_or_else(|| id.to_string())
    }

    /// Whether `ancestor` is reachable from `id` through parent and partial
    /// links, `id` itself included.
    #[must_use]
    pub fn inherits_from(&self, id: ModuleId, ancestor: ModuleId) -> bool {
        if id == ancestor {
            return true;
        }
        let Some(module) = self.get(id) else {
            return false;
        };
        module
            .partials()
            .iter()
            .chain(module.parent().iter())
            .any(|&next| self.inherits_from(next, ancestor))
    }

    /// Make `parent` the parent of `child`.
    pub fn set_parent(&mut self, child: ModuleId, parent: ModuleId) -> Result<(), ModuleStructureError> {
        let parent_module = self.get(parent).ok_or_else(|| ModuleStructureError::MissingModule {
            module: self.namespace_of(child),
            requested: parent.to_string(),
        })?;
        if parent_module.is_final() {
            return Err(ModuleStructureError::FinalParent {
                module: self.namespace_of(child),
                parent: parent_module.namespace().to_string(),
            });
        }
        if self.inherits_from(parent, child) {
            return Err(ModuleStructureError::Cycle {
                module: self.namespace_of(child),
                other: self.namespace_of(parent),
            });
        }
        if let Some(module) = self.get_mut(child) {
            module.set_parent_link(parent);
        }
        Ok(())
    }

    /// Append `partial` to the partials of `module`.
    pub fn add_partial(&mut self, module: ModuleId, partial: ModuleId) -> Result<(), ModuleStructureError> {
        let partial_module = self.get(partial).ok_or_else(|| ModuleStructureError::MissingModule {
            module: self.namespace_of(module),
            requested: partial.to_string(),
        })?;
        if !partial_module.is_partial() {
            return Err(ModuleStructureError::NotPartial {
                module: self.namespace_of(module),
                partial: partial_module.namespace().to_string(),
            });
        }
        if self.inherits_from(partial, module) {
            return Err(ModuleStructureError::Cycle {
                module: self.namespace_of(module),
                other: self.namespace_of(partial),
            });
        }
        if let Some(record) = self.get_mut(module) {
            record.push_partial_link(partial);
        }
        Ok(())
    }

    /// Partials of `id`; with `ask_parents` the parent chain's partials come
    /// first.
    #[must_use]
    pub fn partials(&self, id: ModuleId, ask_parents: bool) -> Vec<ModuleId> {
        let Some(module) = self.get(id) else {
            return Vec::new();
        };
        let mut partials = match module.parent() {
            Some(parent) if ask_parents => self.partials(parent, true),
            _ => Vec::new(),
        };
        partials.extend_from_slice(module.partials());
        partials
    }

    /// Whether `id` is, or descends from, the module named `namespace`
    /// (qualified like [`qualify_namespace`]). Only the parent chain counts;
    /// partials do not.
    #[must_use]
    pub fn is_instance_of(&self, id: ModuleId, namespace: &str) -> bool {
        let namespace = qualify_namespace(namespace);
        let mut current = self.get(id);
        while let Some(module) = current {
            if module.namespace() == namespace {
                return true;
            }
            current = module.parent().and_then(|parent| self.get(parent));
        }
        false
    }

    /// Find `qualified_name` (e.g. `controllers::Post`) for module `id`: in
    /// the module itself, then in each partial in order, then in the parent.
    #[must_use]
    pub fn resolve(&self, id: ModuleId, qualified_name: &str) -> Option<Resolved<'_>> {
        let module = self.get(id)?;

        if let Some(resource) = module.own_resources().get(qualified_name) {
            return Some(Resolved {
                owner: id,
                fq_name: format!("{}::{qualified_name}", module.namespace()),
                resource,
            });
        }

        module
            .partials()
            .iter()
            .find_map(|&partial| self.resolve(partial, qualified_name))
            .or_else(|| {
                module
                    .parent()
                    .and_then(|parent| self.resolve(parent, qualified_name))
            })
    }
}
