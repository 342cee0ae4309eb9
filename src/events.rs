// Script-level identifiers created on behalf of modules: events and enum types
use std::collections::BTreeMap;

use tracing::debug;

use crate::host::{Host, IdHandle, IdType, GLOBAL_MODULE_NAME};

/// Events registered by modules, by fully qualified name.
///
/// An event's identifier only gets a type once a script defines a handler
/// for it; whatever is still untyped at post-script time gets a dummy type.
#[derive(Debug, Default)]
pub struct EventTable {
    events: BTreeMap<String, IdHandle>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_event(&mut self, host: &mut dyn Host, name: &str) {
        host.register_event_handler(name);

        let module = match name.split_once("::") {
            Some((module, _)) => module,
            None => GLOBAL_MODULE_NAME,
        };

        let id = match host.lookup_id(name, module) {
            Some(id) => {
                // Auto-export IDs that already exist.
                host.export_id(id);
                id
            }
            None => host.install_id(name, module, true),
        };

        self.events.insert(name.to_string(), id);
    }

    /// Gives every still-untyped event a placeholder type.
    pub fn assign_dummy_types(&self, host: &mut dyn Host) {
        for (name, id) in &self.events {
            if !host.id_has_type(*id) {
                debug!("Event {} has no handler, using dummy type", name);
                host.set_id_type(*id, IdType::DummyEvent);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<IdHandle> {
        self.events.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }
}

/// Installs enum type `ns::id` with one `<id>_<label>` name per label.
///
/// An existing identifier of that name is left alone: either an earlier
/// module provided it, or a script defined it by hand.
pub fn register_enum_type(host: &mut dyn Host, ns: &str, id: &str, labels: &[(String, i64)]) {
    if host.lookup_id(id, ns).is_some() {
        return;
    }

    let fqid = format!("{}::{}", ns, id);
    debug!("Adding enum type {}", fqid);

    let labels = labels
        .iter()
        .map(|(label, value)| (format!("{}_{}", id, label), *value))
        .collect();

    let handle = host.install_id(id, ns, true);
    host.set_id_type(handle, IdType::Enum { name: fqid, labels });
}
