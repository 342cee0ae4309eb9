// In-process host: keeps analyzer components, script identifiers and queued
// events in plain collections. Drives the CLI and the test suite.
use std::collections::{BTreeMap, BTreeSet};

use super::{
    AnalyzerKind, AnalyzerTag, Component, ComponentId, EntryPoint, EnumVal, EventArg, FileTag, Host,
    IdHandle, IdType, ProtocolTag, TransportProto, GLOBAL_MODULE_NAME,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRecord {
    pub component: Component,
    pub tag: Option<AnalyzerTag>,
    pub enabled: bool,
    pub builtin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdRecord {
    pub name: String,
    pub exported: bool,
    pub ty: Option<IdType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub tag: ProtocolTag,
    pub proto: TransportProto,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub name: String,
    pub args: Vec<EventArg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryHost {
    version: u32,
    plugin_path: String,
    search_path: Vec<String>,
    components: Vec<ComponentRecord>,
    next_protocol_type: u32,
    next_file_type: u32,
    next_packet_type: u32,
    locations: Vec<String>,
    port_bindings: Vec<PortBinding>,
    events: Vec<QueuedEvent>,
    ids: Vec<IdRecord>,
    event_handlers: BTreeSet<String>,
    consts: BTreeMap<String, bool>,
    file_toggle_supported: bool,
}

impl MemoryHost {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            plugin_path: String::new(),
            search_path: Vec::new(),
            components: Vec::new(),
            // Type zero is reserved for "no analyzer".
            next_protocol_type: 1,
            next_file_type: 1,
            next_packet_type: 1,
            locations: Vec::new(),
            port_bindings: Vec::new(),
            events: Vec::new(),
            ids: Vec::new(),
            event_handlers: BTreeSet::new(),
            consts: BTreeMap::new(),
            file_toggle_supported: true,
        }
    }

    pub fn with_plugin_path(mut self, path: impl Into<String>) -> Self {
        self.plugin_path = path.into();
        self
    }

    pub fn with_file_analyzer_toggle(mut self, supported: bool) -> Self {
        self.file_toggle_supported = supported;
        self
    }

    pub fn set_const(&mut self, name: &str, value: bool) {
        self.consts.insert(name.to_string(), value);
    }

    /// Adds an analyzer the host ships with, enabled and already initialized.
    pub fn add_builtin_protocol_analyzer(&mut self, name: &str) -> ProtocolTag {
        ProtocolTag::new(self.add_builtin(name, EntryPoint::TcpAnalyzer).type_id())
    }

    pub fn add_builtin_file_analyzer(&mut self, name: &str) -> FileTag {
        FileTag::new(self.add_builtin(name, EntryPoint::FileAnalyzer).type_id())
    }

    fn add_builtin(&mut self, name: &str, entry: EntryPoint) -> AnalyzerTag {
        let tag = self.allocate_tag(entry.kind());
        self.components.push(ComponentRecord {
            component: Component {
                name: name.to_string(),
                entry,
            },
            tag: Some(tag),
            enabled: true,
            builtin: true,
        });
        tag
    }

    fn allocate_tag(&mut self, kind: AnalyzerKind) -> AnalyzerTag {
        let counter = match kind {
            AnalyzerKind::Protocol => &mut self.next_protocol_type,
            AnalyzerKind::File => &mut self.next_file_type,
            AnalyzerKind::Packet => &mut self.next_packet_type,
        };
        let type_id = *counter;
        *counter += 1;
        AnalyzerTag::new(kind, type_id)
    }

    fn component_mut(&mut self, tag: AnalyzerTag) -> Option<&mut ComponentRecord> {
        self.components.iter_mut().find(|c| c.tag == Some(tag))
    }

    fn component_by_name(&self, kind: AnalyzerKind, name: &str) -> Option<&ComponentRecord> {
        self.components
            .iter()
            .find(|c| c.component.entry.kind() == kind && c.component.name == name)
    }

    /// Enabled state of the named analyzer, if the host knows it.
    pub fn is_enabled(&self, kind: AnalyzerKind, name: &str) -> Option<bool> {
        self.component_by_name(kind, name).map(|c| c.enabled)
    }

    /// Script-level value for a tag, as scripts would hand it in.
    pub fn enum_val(&self, tag: AnalyzerTag) -> EnumVal {
        EnumVal::new(self.tag_type_name(tag.kind()), tag.type_id())
    }

    /// Simulates a script defining a handler for `name`, which types its ID.
    pub fn define_event_handler(&mut self, name: &str) {
        if let Some(record) = self.ids.iter_mut().find(|r| r.name == name) {
            record.ty = Some(IdType::Event);
        }
    }

    pub fn components(&self) -> &[ComponentRecord] {
        &self.components
    }

    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn port_bindings(&self) -> &[PortBinding] {
        &self.port_bindings
    }

    pub fn queued_events(&self) -> &[QueuedEvent] {
        &self.events
    }

    pub fn event_handlers(&self) -> &BTreeSet<String> {
        &self.event_handlers
    }

    pub fn id(&self, qualified_name: &str) -> Option<&IdRecord> {
        self.ids.iter().find(|r| r.name == qualified_name)
    }
}

fn qualify(name: &str, module: &str) -> String {
    if name.contains("::") || module == GLOBAL_MODULE_NAME {
        name.to_string()
    } else {
        format!("{}::{}", module, name)
    }
}

impl Host for MemoryHost {
    fn version(&self) -> u32 {
        self.version
    }

    fn plugin_path(&self) -> String {
        self.plugin_path.clone()
    }

    fn add_to_search_path(&mut self, dir: &str) {
        self.search_path.push(dir.to_string());
    }

    fn add_component(&mut self, component: Component) -> ComponentId {
        self.components.push(ComponentRecord {
            component,
            tag: None,
            enabled: true,
            builtin: false,
        });
        ComponentId(self.components.len() - 1)
    }

    fn initialize_component(&mut self, id: ComponentId) -> Option<AnalyzerTag> {
        let kind = self.components.get(id.0)?.component.entry.kind();
        if let Some(tag) = self.components[id.0].tag {
            return Some(tag);
        }
        let tag = self.allocate_tag(kind);
        self.components[id.0].tag = Some(tag);
        Some(tag)
    }

    fn register_script_location(&mut self, name: &str) {
        if !self.locations.iter().any(|l| l == name) {
            self.locations.push(name.to_string());
        }
    }

    fn protocol_analyzer_tag(&self, name: &str) -> Option<ProtocolTag> {
        match self.component_by_name(AnalyzerKind::Protocol, name)?.tag? {
            AnalyzerTag::Protocol(tag) => Some(tag),
            _ => None,
        }
    }

    fn set_protocol_analyzer_enabled(&mut self, tag: ProtocolTag, enabled: bool) {
        if let Some(record) = self.component_mut(tag.into()) {
            record.enabled = enabled;
        }
    }

    fn register_analyzer_for_port(&mut self, tag: ProtocolTag, proto: TransportProto, port: u16) {
        self.port_bindings.push(PortBinding { tag, proto, port });
    }

    fn file_analyzer_tag(&self, name: &str) -> Option<FileTag> {
        match self.component_by_name(AnalyzerKind::File, name)?.tag? {
            AnalyzerTag::File(tag) => Some(tag),
            _ => None,
        }
    }

    fn supports_file_analyzer_toggle(&self) -> bool {
        self.file_toggle_supported
    }

    fn set_file_analyzer_enabled(&mut self, tag: FileTag, enabled: bool) -> bool {
        match self.component_mut(tag.into()) {
            Some(record) => {
                record.enabled = enabled;
                true
            }
            None => false,
        }
    }

    fn tag_type_name(&self, kind: AnalyzerKind) -> &str {
        match kind {
            AnalyzerKind::Protocol => "Analyzer::Tag",
            AnalyzerKind::File => "Files::Tag",
            AnalyzerKind::Packet => "PacketAnalyzer::Tag",
        }
    }

    fn component_tag(&self, kind: AnalyzerKind, value: &EnumVal) -> Option<AnalyzerTag> {
        let tag = AnalyzerTag::new(kind, value.value);
        self.components.iter().find(|c| c.tag == Some(tag)).and(Some(tag))
    }

    fn lookup_id(&self, name: &str, module: &str) -> Option<IdHandle> {
        let qualified = qualify(name, module);
        self.ids.iter().position(|r| r.name == qualified).map(IdHandle)
    }

    fn install_id(&mut self, name: &str, module: &str, export: bool) -> IdHandle {
        self.ids.push(IdRecord {
            name: qualify(name, module),
            exported: export,
            ty: None,
        });
        IdHandle(self.ids.len() - 1)
    }

    fn export_id(&mut self, id: IdHandle) {
        if let Some(record) = self.ids.get_mut(id.0) {
            record.exported = true;
        }
    }

    fn id_has_type(&self, id: IdHandle) -> bool {
        self.ids.get(id.0).map_or(false, |r| r.ty.is_some())
    }

    fn set_id_type(&mut self, id: IdHandle, ty: IdType) {
        if let Some(record) = self.ids.get_mut(id.0) {
            record.ty = Some(ty);
        }
    }

    fn register_event_handler(&mut self, name: &str) {
        self.event_handlers.insert(name.to_string());
    }

    fn enqueue_event(&mut self, name: &str, args: Vec<EventArg>) {
        self.events.push(QueuedEvent {
            name: name.to_string(),
            args,
        });
    }

    fn find_const_bool(&self, name: &str) -> Option<bool> {
        self.consts.get(name).copied()
    }
}
