use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{add_component, find_parser, location_name};
use super::{AnalyzerRegistry, Descriptor};
use crate::error::Result;
use crate::host::{EntryPoint, Host, PacketTag};
use crate::runtime::Parser;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketAnalyzerSpec {
    pub name: String,
    #[serde(default)]
    pub parser: String,
}

#[derive(Debug, Clone, Default)]
pub struct PacketAnalyzerInfo {
    pub name_analyzer: String,
    pub name_parser: String,
    pub location: String,
    pub type_id: u32,
    pub parser: Option<Arc<Parser>>,
}

impl Descriptor for PacketAnalyzerInfo {
    fn type_id(&self) -> u32 {
        self.type_id
    }

    fn name(&self) -> &str {
        &self.name_analyzer
    }
}

impl PacketAnalyzerInfo {
    pub fn tag(&self) -> PacketTag {
        PacketTag::new(self.type_id)
    }
}

impl AnalyzerRegistry {
    /// Phase one for a packet analyzer. Packet analyzers cannot replace
    /// anything.
    pub fn register_packet_analyzer(&mut self, host: &mut dyn Host, spec: PacketAnalyzerSpec) -> Result<()> {
        debug!("Have Spicy packet analyzer {}", spec.name);

        let tag = add_component(host, &spec.name, EntryPoint::PacketAnalyzer)?;

        self.packet.insert(PacketAnalyzerInfo {
            location: location_name(&spec.name),
            name_analyzer: spec.name,
            name_parser: spec.parser,
            type_id: tag.type_id(),
            parser: None,
        });

        Ok(())
    }

    // The host has no dynamic binding mechanism for packet analyzers, so
    // this only resolves parsers.
    pub(super) fn resolve_packet_analyzers(&mut self, parsers: &[Arc<Parser>]) -> Result<()> {
        for p in self.packet.iter_mut() {
            debug!("Registering packet analyzer {} with host", p.name_analyzer);
            p.parser = find_parser(&p.name_analyzer, &p.name_parser, parsers)?;
        }

        Ok(())
    }

    pub fn parser_for_packet_analyzer(&self, tag: PacketTag) -> Option<&Arc<Parser>> {
        self.packet.get(tag.type_id())?.parser.as_ref()
    }

    pub fn tag_for_packet_analyzer(&self, tag: PacketTag) -> PacketTag {
        tag
    }
}
