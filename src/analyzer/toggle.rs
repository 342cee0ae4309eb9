// Enabling and disabling analyzers, keeping replaced analyzers inverse
use tracing::debug;

use super::AnalyzerRegistry;
use crate::error::{BridgeError, Result};
use crate::host::{AnalyzerKind, AnalyzerTag, EnumVal, FileTag, Host, PacketTag, ProtocolTag};

/// Turns a script-level tag value into a typed tag, or `None` if it is not
/// an analyzer tag the host knows.
pub fn tag_from_enum(host: &dyn Host, val: &EnumVal) -> Option<AnalyzerTag> {
    let kind = AnalyzerKind::ALL
        .into_iter()
        .find(|kind| host.tag_type_name(*kind) == val.type_name)?;
    host.component_tag(kind, val)
}

impl AnalyzerRegistry {
    /// Enables or disables the analyzer behind `tag`.
    ///
    /// Returns `Ok(false)` for tags that are not ours or for kinds the host
    /// cannot toggle.
    pub fn toggle(&self, host: &mut dyn Host, tag: AnalyzerTag, enable: bool) -> Result<bool> {
        match tag {
            AnalyzerTag::Protocol(tag) => Ok(self.toggle_protocol_analyzer(host, tag, enable)),
            AnalyzerTag::File(tag) => self.toggle_file_analyzer(host, tag, enable),
            AnalyzerTag::Packet(tag) => Ok(self.toggle_packet_analyzer(tag, enable)),
        }
    }

    pub fn toggle_enum(&self, host: &mut dyn Host, val: &EnumVal, enable: bool) -> Result<bool> {
        match tag_from_enum(host, val) {
            Some(tag) => self.toggle(host, tag, enable),
            None => Ok(false),
        }
    }

    pub fn toggle_protocol_analyzer(&self, host: &mut dyn Host, tag: ProtocolTag, enable: bool) -> bool {
        // Not set -> not ours.
        let Some(analyzer) = self.protocol.get(tag.type_id()) else {
            return false;
        };

        if enable {
            debug!("Enabling Spicy protocol analyzer {}", analyzer.name_analyzer);
            host.set_protocol_analyzer_enabled(tag, true);

            if let Some(replaces) = analyzer.replaces {
                debug!("Disabling standard protocol analyzer {}", analyzer.name_replaces);
                host.set_protocol_analyzer_enabled(replaces, false);
            }
        } else {
            debug!("Disabling Spicy protocol analyzer {}", analyzer.name_analyzer);
            host.set_protocol_analyzer_enabled(tag, false);

            if let Some(replaces) = analyzer.replaces {
                debug!("Re-enabling standard protocol analyzer {}", analyzer.name_replaces);
                host.set_protocol_analyzer_enabled(replaces, true);
            }
        }

        true
    }

    pub fn toggle_file_analyzer(&self, host: &mut dyn Host, tag: FileTag, enable: bool) -> Result<bool> {
        let Some(analyzer) = self.file.get(tag.type_id()) else {
            return Ok(false);
        };

        if !host.supports_file_analyzer_toggle() {
            debug!(
                "supposed to toggle file analyzer {}, but that is not supported by host version",
                analyzer.name_analyzer
            );
            return Ok(false);
        }

        debug!(
            "{} Spicy file analyzer {}",
            if enable { "Enabling" } else { "Disabling" },
            analyzer.name_analyzer
        );

        if !host.set_file_analyzer_enabled(tag, enable) {
            return Err(BridgeError::ComponentLookup {
                kind: "file",
                name: analyzer.name_analyzer.clone(),
            });
        }

        if let Some(replaces) = analyzer.replaces {
            debug!(
                "{} standard file analyzer {}",
                if enable { "Disabling" } else { "Enabling" },
                analyzer.name_replaces
            );
            host.set_file_analyzer_enabled(replaces, !enable);
        }

        Ok(true)
    }

    /// The host offers no way to toggle packet analyzers; this always fails.
    pub fn toggle_packet_analyzer(&self, tag: PacketTag, _enable: bool) -> bool {
        if let Some(analyzer) = self.packet.get(tag.type_id()) {
            debug!(
                "supposed to toggle packet analyzer {}, but that is not supported by host",
                analyzer.name_analyzer
            );
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{FileAnalyzerSpec, PacketAnalyzerSpec, ProtocolAnalyzerSpec};
    use crate::host::MemoryHost;
    use crate::runtime::Protocol;

    fn setup() -> (MemoryHost, AnalyzerRegistry, ProtocolTag) {
        let mut host = MemoryHost::new(40100);
        host.add_builtin_protocol_analyzer("OLD");
        let mut registry = AnalyzerRegistry::new();
        let spec = ProtocolAnalyzerSpec {
            name: "FOO".to_string(),
            protocol: Protocol::Tcp,
            replaces: "OLD".to_string(),
            ..Default::default()
        };
        registry.register_protocol_analyzer(&mut host, spec).unwrap();
        let tag = host.protocol_analyzer_tag("FOO").unwrap();
        (host, registry, tag)
    }

    #[test]
    fn test_toggle_inverts_replaced_analyzer() {
        let (mut host, registry, tag) = setup();

        assert!(registry.toggle_protocol_analyzer(&mut host, tag, false));
        assert_eq!(host.is_enabled(AnalyzerKind::Protocol, "FOO"), Some(false));
        assert_eq!(host.is_enabled(AnalyzerKind::Protocol, "OLD"), Some(true));

        assert!(registry.toggle_protocol_analyzer(&mut host, tag, true));
        assert_eq!(host.is_enabled(AnalyzerKind::Protocol, "FOO"), Some(true));
        assert_eq!(host.is_enabled(AnalyzerKind::Protocol, "OLD"), Some(false));
    }

    #[test]
    fn test_unknown_tag_leaves_host_untouched() {
        let (mut host, registry, _) = setup();
        let before = host.clone();

        assert!(!registry.toggle(&mut host, ProtocolTag::new(500).into(), true).unwrap());
        assert!(!registry.toggle(&mut host, FileTag::new(3).into(), false).unwrap());
        // Slot exists but belongs to the built-in analyzer.
        assert!(!registry.toggle(&mut host, ProtocolTag::new(1).into(), false).unwrap());
        assert_eq!(host, before);
    }

    #[test]
    fn test_toggle_enum_dispatches_by_type() {
        let (mut host, registry, tag) = setup();
        let val = host.enum_val(tag.into());

        assert!(registry.toggle_enum(&mut host, &val, false).unwrap());
        assert_eq!(host.is_enabled(AnalyzerKind::Protocol, "FOO"), Some(false));

        let bogus = EnumVal::new("Log::ID", tag.type_id());
        assert!(!registry.toggle_enum(&mut host, &bogus, true).unwrap());
        assert_eq!(host.is_enabled(AnalyzerKind::Protocol, "FOO"), Some(false));
    }

    #[test]
    fn test_file_toggle_requires_host_support() {
        let mut host = MemoryHost::new(40000).with_file_analyzer_toggle(false);
        let mut registry = AnalyzerRegistry::new();
        let spec = FileAnalyzerSpec {
            name: "FOO_FILE".to_string(),
            ..Default::default()
        };
        registry.register_file_analyzer(&mut host, spec).unwrap();
        let tag = host.file_analyzer_tag("FOO_FILE").unwrap();

        assert!(!registry.toggle_file_analyzer(&mut host, tag, false).unwrap());
        assert_eq!(host.is_enabled(AnalyzerKind::File, "FOO_FILE"), Some(true));
    }

    #[test]
    fn test_file_toggle_with_replacement() {
        let mut host = MemoryHost::new(40100);
        host.add_builtin_file_analyzer("PE");
        let mut registry = AnalyzerRegistry::new();
        let spec = FileAnalyzerSpec {
            name: "SPICY_PE".to_string(),
            replaces: "PE".to_string(),
            ..Default::default()
        };
        registry.register_file_analyzer(&mut host, spec).unwrap();
        let tag = host.file_analyzer_tag("SPICY_PE").unwrap();

        assert!(registry.toggle_file_analyzer(&mut host, tag, false).unwrap());
        assert_eq!(host.is_enabled(AnalyzerKind::File, "SPICY_PE"), Some(false));
        assert_eq!(host.is_enabled(AnalyzerKind::File, "PE"), Some(true));
    }

    #[test]
    fn test_packet_toggle_unsupported() {
        let mut host = MemoryHost::new(40100);
        let mut registry = AnalyzerRegistry::new();
        let spec = PacketAnalyzerSpec {
            name: "FOO_PACKET".to_string(),
            parser: String::new(),
        };
        registry.register_packet_analyzer(&mut host, spec).unwrap();
        let tag = registry.packet_analyzers().iter().next().unwrap().tag();

        assert!(!registry.toggle(&mut host, tag.into(), false).unwrap());
    }
}
