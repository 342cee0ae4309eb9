//! The narrow interface to the host engine.
//!
//! The plugin never reimplements analyzer management; it asks the host to
//! allocate tags, flip enable bits, bind ports and install script
//! identifiers through [`Host`].

pub mod memory;
pub mod tag;

use serde::{Deserialize, Serialize};

pub use memory::MemoryHost;
pub use tag::{AnalyzerKind, AnalyzerTag, EnumVal, FileTag, PacketTag, ProtocolTag};

/// Module name the host uses for identifiers without a namespace.
pub const GLOBAL_MODULE_NAME: &str = "GLOBAL";

/// Event through which file analyzers get bound to MIME types.
pub const MIME_TYPE_EVENT: &str = "spicy_analyzer_for_mime_type";

/// Entry point the host calls to instantiate an analyzer of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPoint {
    TcpAnalyzer,
    UdpAnalyzer,
    FileAnalyzer,
    PacketAnalyzer,
}

impl EntryPoint {
    pub fn kind(self) -> AnalyzerKind {
        match self {
            EntryPoint::TcpAnalyzer | EntryPoint::UdpAnalyzer => AnalyzerKind::Protocol,
            EntryPoint::FileAnalyzer => AnalyzerKind::File,
            EntryPoint::PacketAnalyzer => AnalyzerKind::Packet,
        }
    }
}

/// An analyzer component to be added to the host's component system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub entry: EntryPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub usize);

/// Opaque handle to a script-level identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdHandle(pub usize);

/// Transport protocols the host can bind analyzers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportProto {
    Tcp,
    Udp,
    Icmp,
}

/// Type assigned to a script identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdType {
    Enum { name: String, labels: Vec<(String, i64)> },
    Event,
    /// Placeholder for events nobody defined a handler for.
    DummyEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventArg {
    FileTag(FileTag),
    String(String),
}

pub trait Host {
    /// Numeric version of the running host.
    fn version(&self) -> u32;

    /// The host's own plugin search path, colon-separated.
    fn plugin_path(&self) -> String;

    fn add_to_search_path(&mut self, dir: &str);

    fn add_component(&mut self, component: Component) -> ComponentId;

    /// Runs component initialization, returning the tag the host assigned.
    fn initialize_component(&mut self, id: ComponentId) -> Option<AnalyzerTag>;

    /// Records a synthetic script location so the documentation subsystem
    /// has something to point at for generated identifiers.
    fn register_script_location(&mut self, name: &str);

    fn protocol_analyzer_tag(&self, name: &str) -> Option<ProtocolTag>;

    fn set_protocol_analyzer_enabled(&mut self, tag: ProtocolTag, enabled: bool);

    fn register_analyzer_for_port(&mut self, tag: ProtocolTag, proto: TransportProto, port: u16);

    fn file_analyzer_tag(&self, name: &str) -> Option<FileTag>;

    /// Older hosts cannot disable file analyzers at all.
    fn supports_file_analyzer_toggle(&self) -> bool;

    /// Returns false if no component exists for the tag.
    fn set_file_analyzer_enabled(&mut self, tag: FileTag, enabled: bool) -> bool;

    /// Name of the script-level enum type carrying tags of this kind.
    fn tag_type_name(&self, kind: AnalyzerKind) -> &str;

    /// Maps a script-level tag value to the component it denotes.
    fn component_tag(&self, kind: AnalyzerKind, value: &EnumVal) -> Option<AnalyzerTag>;

    fn lookup_id(&self, name: &str, module: &str) -> Option<IdHandle>;

    fn install_id(&mut self, name: &str, module: &str, export: bool) -> IdHandle;

    fn export_id(&mut self, id: IdHandle);

    fn id_has_type(&self, id: IdHandle) -> bool;

    fn set_id_type(&mut self, id: IdHandle, ty: IdType);

    fn register_event_handler(&mut self, name: &str);

    /// Queues an event; the host raises it later from its own run loop.
    fn enqueue_event(&mut self, name: &str, args: Vec<EventArg>);

    fn find_const_bool(&self, name: &str) -> Option<bool>;
}
