//! Analyzer descriptor tables and the two-phase registration protocol.
//!
//! Phase one runs while modules register themselves: every analyzer gets a
//! host component and a descriptor slot, but parser names stay unresolved.
//! Phase two ([`AnalyzerRegistry::resolve`]) runs once after all modules are
//! in, binds parser names to parsers and does the host-side port and MIME
//! type registration.

pub mod descriptor;
pub mod file;
pub mod packet;
pub mod protocol;
pub mod toggle;

use std::sync::Arc;

use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::host::{AnalyzerTag, Component, EntryPoint, Host, TransportProto};
use crate::runtime::{Parser, Port, Protocol};

pub use descriptor::{Descriptor, DescriptorTable};
pub use file::{FileAnalyzerInfo, FileAnalyzerSpec};
pub use packet::{PacketAnalyzerInfo, PacketAnalyzerSpec};
pub use protocol::{ProtocolAnalyzerInfo, ProtocolAnalyzerSpec};
pub use toggle::tag_from_enum;

/// The three descriptor tables, one per analyzer kind.
#[derive(Debug, Default)]
pub struct AnalyzerRegistry {
    protocol: DescriptorTable<ProtocolAnalyzerInfo>,
    file: DescriptorTable<FileAnalyzerInfo>,
    packet: DescriptorTable<PacketAnalyzerInfo>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol_analyzers(&self) -> &DescriptorTable<ProtocolAnalyzerInfo> {
        &self.protocol
    }

    pub fn file_analyzers(&self) -> &DescriptorTable<FileAnalyzerInfo> {
        &self.file
    }

    pub fn packet_analyzers(&self) -> &DescriptorTable<PacketAnalyzerInfo> {
        &self.packet
    }

    /// Phase two: resolves parser names against `parsers` and binds every
    /// analyzer to its ports and MIME types.
    pub fn resolve(&mut self, host: &mut dyn Host, parsers: &[Arc<Parser>]) -> Result<()> {
        self.resolve_protocol_analyzers(host, parsers)?;
        self.resolve_file_analyzers(host, parsers)?;
        self.resolve_packet_analyzers(parsers)?;
        Ok(())
    }
}

/// Name under which generated identifiers of `analyzer` are documented.
pub(crate) fn location_name(analyzer: &str) -> String {
    format!("<Spicy-{}>", analyzer)
}

/// Adds and initializes the host component backing a new analyzer.
///
/// The host has already run its own component initialization by the time
/// modules load, so the component gets initialized right here.
pub(crate) fn add_component(host: &mut dyn Host, name: &str, entry: EntryPoint) -> Result<AnalyzerTag> {
    let id = host.add_component(Component {
        name: name.to_string(),
        entry,
    });

    // Keeps the documentation subsystem from flagging the generated ID as
    // having no location during initialization.
    host.register_script_location(&location_name(name));

    host.initialize_component(id)
        .filter(|tag| tag.kind() == entry.kind() && tag.type_id() != 0)
        .ok_or_else(|| BridgeError::MissingTag(name.to_string()))
}

/// Exact-name lookup of a parser. An empty name means "no parser".
pub(crate) fn find_parser(analyzer: &str, parser: &str, parsers: &[Arc<Parser>]) -> Result<Option<Arc<Parser>>> {
    if parser.is_empty() {
        return Ok(None);
    }

    parsers
        .iter()
        .find(|p| p.name == parser)
        .cloned()
        .map(Some)
        .ok_or_else(|| BridgeError::UnknownParser {
            parser: parser.to_string(),
            analyzer: analyzer.to_string(),
        })
}

/// The host-side transport protocol of a port.
pub(crate) fn transport_protocol(port: &Port) -> Result<TransportProto> {
    match port.protocol {
        Protocol::Tcp => Ok(TransportProto::Tcp),
        Protocol::Udp => Ok(TransportProto::Udp),
        Protocol::Icmp => Ok(TransportProto::Icmp),
        Protocol::Undef => Err(BridgeError::UnsupportedTransport(port.to_string())),
    }
}

pub(crate) fn log_missing_replacement(name: &str, replaces: &str) {
    debug!("{} is supposed to replace {}, but that does not exist", name, replaces);
}
