use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{add_component, find_parser, location_name, log_missing_replacement};
use super::{AnalyzerRegistry, Descriptor};
use crate::error::{BridgeError, Result};
use crate::host::{EntryPoint, EventArg, FileTag, Host, MIME_TYPE_EVENT};
use crate::runtime::Parser;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalyzerSpec {
    pub name: String,
    #[serde(default)]
    pub mime_types: Vec<String>,
    #[serde(default)]
    pub parser: String,
    #[serde(default)]
    pub replaces: String,
}

#[derive(Debug, Clone, Default)]
pub struct FileAnalyzerInfo {
    pub name_analyzer: String,
    pub name_parser: String,
    pub name_replaces: String,
    pub location: String,
    pub mime_types: Vec<String>,
    pub type_id: u32,
    pub replaces: Option<FileTag>,
    pub parser: Option<Arc<Parser>>,
}

impl Descriptor for FileAnalyzerInfo {
    fn type_id(&self) -> u32 {
        self.type_id
    }

    fn name(&self) -> &str {
        &self.name_analyzer
    }
}

impl FileAnalyzerInfo {
    pub fn tag(&self) -> FileTag {
        FileTag::new(self.type_id)
    }
}

impl AnalyzerRegistry {
    /// Phase one for a file analyzer.
    pub fn register_file_analyzer(&mut self, host: &mut dyn Host, spec: FileAnalyzerSpec) -> Result<()> {
        debug!("Have Spicy file analyzer {}", spec.name);

        // Without a way to disable file analyzers there is nothing to
        // replace; the declaration is accepted but has no effect.
        let mut replaces = None;
        if !spec.replaces.is_empty() && host.supports_file_analyzer_toggle() {
            match host.file_analyzer_tag(&spec.replaces) {
                Some(tag) => {
                    debug!("  Replaces existing file analyzer {}", spec.replaces);
                    host.set_file_analyzer_enabled(tag, false);
                    replaces = Some(tag);
                }
                None => log_missing_replacement(&spec.name, &spec.replaces),
            }
        }

        let tag = add_component(host, &spec.name, EntryPoint::FileAnalyzer)?;

        self.file.insert(FileAnalyzerInfo {
            location: location_name(&spec.name),
            name_analyzer: spec.name,
            name_parser: spec.parser,
            name_replaces: spec.replaces,
            mime_types: spec.mime_types,
            type_id: tag.type_id(),
            replaces,
            parser: None,
        });

        Ok(())
    }

    pub(super) fn resolve_file_analyzers(&mut self, host: &mut dyn Host, parsers: &[Arc<Parser>]) -> Result<()> {
        for p in self.file.iter_mut() {
            debug!("Registering file analyzer {} with host", p.name_analyzer);

            p.parser = find_parser(&p.name_analyzer, &p.name_parser, parsers)?;

            let tag = host
                .file_analyzer_tag(&p.name_analyzer)
                .ok_or_else(|| BridgeError::MissingTag(p.name_analyzer.clone()))?;

            let parser_mime_types = p.parser.iter().flat_map(|parser| parser.mime_types.iter());
            for mime_type in p.mime_types.iter().chain(parser_mime_types) {
                register_analyzer_for_mime_type(host, tag, mime_type);
            }
        }

        Ok(())
    }

    pub fn parser_for_file_analyzer(&self, tag: FileTag) -> Option<&Arc<Parser>> {
        self.file.get(tag.type_id())?.parser.as_ref()
    }

    pub fn tag_for_file_analyzer(&self, tag: FileTag) -> FileTag {
        self.file
            .get(tag.type_id())
            .and_then(|info| info.replaces)
            .unwrap_or(tag)
    }
}

// MIME types are registered on the script side, so this only queues the
// event whose predefined handler does it. The binding is not visible until
// the host has drained its event queue.
fn register_analyzer_for_mime_type(host: &mut dyn Host, tag: FileTag, mime_type: &str) {
    debug!("  Scheduling analyzer for MIME type {}", mime_type);
    host.enqueue_event(
        MIME_TYPE_EVENT,
        vec![EventArg::FileTag(tag), EventArg::String(mime_type.to_string())],
    );
}
