use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{add_component, find_parser, location_name, log_missing_replacement, transport_protocol};
use super::{AnalyzerRegistry, Descriptor};
use crate::error::{BridgeError, Result};
use crate::host::{EntryPoint, Host, ProtocolTag};
use crate::runtime::{Direction, Parser, Port, Protocol};

/// What a module declares when it registers a protocol analyzer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolAnalyzerSpec {
    pub name: String,
    pub protocol: Protocol,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub parser_orig: String,
    #[serde(default)]
    pub parser_resp: String,
    #[serde(default)]
    pub replaces: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProtocolAnalyzerInfo {
    pub name_analyzer: String,
    pub name_parser_orig: String,
    pub name_parser_resp: String,
    pub name_replaces: String,
    pub location: String,
    pub protocol: Protocol,
    pub ports: Vec<Port>,
    pub type_id: u32,
    pub replaces: Option<ProtocolTag>,
    pub parser_orig: Option<Arc<Parser>>,
    pub parser_resp: Option<Arc<Parser>>,
}

impl Descriptor for ProtocolAnalyzerInfo {
    fn type_id(&self) -> u32 {
        self.type_id
    }

    fn name(&self) -> &str {
        &self.name_analyzer
    }
}

impl ProtocolAnalyzerInfo {
    pub fn tag(&self) -> ProtocolTag {
        ProtocolTag::new(self.type_id)
    }
}

impl AnalyzerRegistry {
    /// Phase one for a protocol analyzer.
    ///
    /// Analyzers over anything but TCP or UDP are reported and skipped; the
    /// process carries on with the remaining registrations.
    pub fn register_protocol_analyzer(&mut self, host: &mut dyn Host, spec: ProtocolAnalyzerSpec) -> Result<()> {
        debug!("Have Spicy protocol analyzer {}", spec.name);

        let entry = match spec.protocol {
            Protocol::Tcp => EntryPoint::TcpAnalyzer,
            Protocol::Udp => EntryPoint::UdpAnalyzer,
            other => {
                let err = BridgeError::UnsupportedProtocol {
                    analyzer: spec.name.clone(),
                    protocol: other.to_string(),
                };
                error!("{}", err);
                return Ok(());
            }
        };

        let mut replaces = None;
        if !spec.replaces.is_empty() {
            match host.protocol_analyzer_tag(&spec.replaces) {
                Some(tag) => {
                    debug!("  Replaces existing protocol analyzer {}", spec.replaces);
                    host.set_protocol_analyzer_enabled(tag, false);
                    replaces = Some(tag);
                }
                None => log_missing_replacement(&spec.name, &spec.replaces),
            }
        }

        let tag = add_component(host, &spec.name, entry)?;

        self.protocol.insert(ProtocolAnalyzerInfo {
            location: location_name(&spec.name),
            name_analyzer: spec.name,
            name_parser_orig: spec.parser_orig,
            name_parser_resp: spec.parser_resp,
            name_replaces: spec.replaces,
            protocol: spec.protocol,
            ports: spec.ports,
            type_id: tag.type_id(),
            replaces,
            parser_orig: None,
            parser_resp: None,
        });

        Ok(())
    }

    pub(super) fn resolve_protocol_analyzers(&mut self, host: &mut dyn Host, parsers: &[Arc<Parser>]) -> Result<()> {
        for p in self.protocol.iter_mut() {
            debug!("Registering {} protocol analyzer {} with host", p.protocol, p.name_analyzer);

            p.parser_orig = find_parser(&p.name_analyzer, &p.name_parser_orig, parsers)?;
            p.parser_resp = find_parser(&p.name_analyzer, &p.name_parser_resp, parsers)?;

            let tag = host
                .protocol_analyzer_tag(&p.name_analyzer)
                .ok_or_else(|| BridgeError::MissingTag(p.name_analyzer.clone()))?;

            for port in &p.ports {
                debug!("  Scheduling analyzer for port {}", port);
                host.register_analyzer_for_port(tag, transport_protocol(port)?, port.number);
            }

            if let Some(parser) = &p.parser_resp {
                for pp in &parser.ports {
                    if !matches!(pp.direction, Direction::Both | Direction::Responder) {
                        continue;
                    }

                    debug!("  Scheduling analyzer for port {}", pp.port);
                    host.register_analyzer_for_port(tag, transport_protocol(&pp.port)?, pp.port.number);
                }
            }
        }

        Ok(())
    }

    /// The parser handling one side of connections for `tag`.
    pub fn parser_for_protocol_analyzer(&self, tag: ProtocolTag, is_orig: bool) -> Option<&Arc<Parser>> {
        let info = self.protocol.get(tag.type_id())?;
        if is_orig {
            info.parser_orig.as_ref()
        } else {
            info.parser_resp.as_ref()
        }
    }

    /// The tag the host should attribute `tag`'s activity to: the replaced
    /// analyzer if there is one.
    pub fn tag_for_protocol_analyzer(&self, tag: ProtocolTag) -> ProtocolTag {
        self.protocol
            .get(tag.type_id())
            .and_then(|info| info.replaces)
            .unwrap_or(tag)
    }
}
