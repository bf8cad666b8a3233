use std::any::Any;
use std::rc::Rc;

use tracing::debug;

struct PluginEntry<P: ?Sized> {
    name: String,
    plugin: Rc<P>,
    /// The same allocation as `plugin`, kept for typed lookups
    any: Rc<dyn Any>,
}

/// Ordered registry of named plugins for one scope.
///
/// Plugins are invoked in registration order. Registering under a name that is
/// already taken replaces the plugin but keeps its position. Plugins added
/// without a name get a sequential `_plugin<n>` id.
///
/// `P` is the capability trait of the scope (`dyn ApplicationPlugin`,
/// `dyn ModulePlugin` or `dyn ControllerPlugin`); the scope owner performs the
/// unsizing coercion and hands both views of the plugin to [`PluginBroker::add`].
pub struct PluginBroker<P: ?Sized> {
    entries: Vec<PluginEntry<P>>,
    next_id: usize,
}

impl<P: ?Sized> Default for PluginBroker<P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<P: ?Sized> PluginBroker<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` and return the name it was stored under.
    pub fn add(&mut self, plugin: Rc<P>, any: Rc<dyn Any>, name: Option<&str>) -> String {
        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let generated = format!("_plugin{}", self.next_id);
                self.next_id += 1;
                generated
            }
        };

        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            debug!(plugin = %name, "Plugin replaced");
            entry.plugin = plugin;
            entry.any = any;
        } else {
            debug!(plugin = %name, position = self.entries.len(), "Plugin added");
            self.entries.push(PluginEntry {
                name: name.clone(),
                plugin,
                any,
            });
        }
        name
    }

    /// Remove the plugin registered as `name`. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.name != name);
        before != self.entries.len()
    }

    /// The plugin registered as `name`, if it is a `T`.
    #[must_use]
    pub fn get<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| Rc::clone(&e.any).downcast::<T>().ok())
    }

    /// The plugin registered as `name`, as its scope capability.
    #[must_use]
    pub fn get_dyn(&self, name: &str) -> Option<Rc<P>> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| Rc::clone(&e.plugin))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Registered names in invocation order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The plugins in invocation order.
    ///
    /// Hooks are invoked on a snapshot so that a hook may register further
    /// plugins, on this scope or a child scope, while the event is running.
    /// Plugins added during an event first see the next event.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Rc<P>> {
        self.entries.iter().map(|e| Rc::clone(&e.plugin)).collect()
    }
}
