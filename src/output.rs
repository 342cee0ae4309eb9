use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::*;
use serde::Serialize;

use crate::analyzer::Descriptor;
use crate::cli::OutputFormat;
use crate::host::{AnalyzerKind, MemoryHost};
use crate::plugin::{Phase, Plugin};

#[derive(Debug, Clone, Serialize)]
pub struct ModuleRow {
    pub path: PathBuf,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerRow {
    pub kind: AnalyzerKind,
    pub type_id: u32,
    pub name: String,
    pub parsers: Vec<String>,
    pub replaces: Option<String>,
    pub bindings: Vec<String>,
    pub enabled: Option<bool>,
}

/// Snapshot of everything the plugin registered with the host.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryReport {
    pub phase: Phase,
    pub modules: Vec<ModuleRow>,
    pub analyzers: Vec<AnalyzerRow>,
    pub events: Vec<String>,
}

impl RegistryReport {
    pub fn from_plugin(plugin: &Plugin<MemoryHost>) -> Self {
        let host = plugin.host();
        let registry = plugin.analyzers();
        let mut analyzers = Vec::new();

        let resolved = |name: &str, parser: Option<&String>| match parser {
            Some(p) => p.clone(),
            None if name.is_empty() => "-".to_string(),
            None => format!("{} (unresolved)", name),
        };

        for info in registry.protocol_analyzers().iter() {
            analyzers.push(AnalyzerRow {
                kind: AnalyzerKind::Protocol,
                type_id: info.type_id(),
                name: info.name().to_string(),
                parsers: vec![
                    resolved(&info.name_parser_orig, info.parser_orig.as_ref().map(|p| &p.name)),
                    resolved(&info.name_parser_resp, info.parser_resp.as_ref().map(|p| &p.name)),
                ],
                replaces: info.replaces.map(|_| info.name_replaces.clone()),
                bindings: info.ports.iter().map(|p| p.to_string()).collect(),
                enabled: host.is_enabled(AnalyzerKind::Protocol, info.name()),
            });
        }

        for info in registry.file_analyzers().iter() {
            analyzers.push(AnalyzerRow {
                kind: AnalyzerKind::File,
                type_id: info.type_id(),
                name: info.name().to_string(),
                parsers: vec![resolved(&info.name_parser, info.parser.as_ref().map(|p| &p.name))],
                replaces: info.replaces.map(|_| info.name_replaces.clone()),
                bindings: info.mime_types.clone(),
                enabled: host.is_enabled(AnalyzerKind::File, info.name()),
            });
        }

        for info in registry.packet_analyzers().iter() {
            analyzers.push(AnalyzerRow {
                kind: AnalyzerKind::Packet,
                type_id: info.type_id(),
                name: info.name().to_string(),
                parsers: vec![resolved(&info.name_parser, info.parser.as_ref().map(|p| &p.name))],
                replaces: None,
                bindings: Vec::new(),
                enabled: host.is_enabled(AnalyzerKind::Packet, info.name()),
            });
        }

        Self {
            phase: plugin.phase(),
            modules: plugin
                .modules()
                .modules()
                .map(|m| ModuleRow {
                    path: m.path.clone(),
                    loaded_at: m.loaded_at,
                })
                .collect(),
            analyzers,
            events: plugin.events().names().map(String::from).collect(),
        }
    }
}

/// Module files discovery would load, per search path list.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub search_paths: Vec<String>,
    pub modules: Vec<PathBuf>,
}

pub struct OutputWriter {
    format: OutputFormat,
    file: Option<PathBuf>,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, file: Option<PathBuf>) -> Result<Self> {
        Ok(Self { format, file })
    }

    pub fn write_registry(&self, report: &RegistryReport) -> Result<()> {
        let output = match self.format {
            OutputFormat::Human => format_registry_human(report),
            OutputFormat::Json => serde_json::to_string_pretty(report)? + "\n",
        };
        self.emit(&output)
    }

    pub fn write_discovery(&self, report: &DiscoveryReport) -> Result<()> {
        let output = match self.format {
            OutputFormat::Human => format_discovery_human(report),
            OutputFormat::Json => serde_json::to_string_pretty(report)? + "\n",
        };
        self.emit(&output)
    }

    fn emit(&self, output: &str) -> Result<()> {
        match &self.file {
            Some(path) => {
                let file = File::create(path)?;
                let mut writer = BufWriter::new(file);
                writer.write_all(output.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", output);
                io::stdout().flush()?;
            }
        }

        Ok(())
    }
}

fn format_registry_human(report: &RegistryReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{} {}\n\n",
        "ANALYZER REGISTRY".truecolor(0, 255, 65).bold(),
        format!("({:?})", report.phase).truecolor(128, 128, 128)
    ));

    output.push_str(&format!(
        "{} {} {} {} {}\n\n",
        "⟦".truecolor(64, 64, 64),
        format!("{} modules", report.modules.len()).truecolor(191, 64, 191).bold(),
        "•".truecolor(0, 255, 65),
        format!("{} analyzers", report.analyzers.len()).truecolor(191, 64, 191).bold(),
        "⟧".truecolor(64, 64, 64)
    ));

    for module in &report.modules {
        output.push_str(&format!(
            "  {} {}\n",
            "▶".truecolor(0, 255, 65).bold(),
            module.path.display().to_string().truecolor(255, 255, 255)
        ));
    }
    if !report.modules.is_empty() {
        output.push('\n');
    }

    for analyzer in &report.analyzers {
        let state = match analyzer.enabled {
            Some(true) => "enabled".truecolor(0, 255, 65),
            Some(false) => "disabled".truecolor(255, 140, 0),
            None => "unknown".truecolor(128, 128, 128),
        };

        output.push_str(&format!(
            "  {} {} {} {}\n",
            format!("{:<8}", analyzer.kind.to_string()).truecolor(0, 212, 255),
            format!("#{:<4}", analyzer.type_id).truecolor(128, 128, 128),
            analyzer.name.truecolor(255, 255, 255).bold(),
            state
        ));
        output.push_str(&format!("      parsers  {}\n", analyzer.parsers.join(", ")));
        if let Some(replaces) = &analyzer.replaces {
            output.push_str(&format!("      replaces {}\n", replaces.truecolor(255, 140, 0)));
        }
        if !analyzer.bindings.is_empty() {
            output.push_str(&format!("      bound to {}\n", analyzer.bindings.join(", ")));
        }
    }

    if !report.events.is_empty() {
        output.push_str(&format!("\n{}\n", "EVENTS".truecolor(0, 255, 65).bold()));
        for event in &report.events {
            output.push_str(&format!("  {}\n", event));
        }
    }

    output
}

fn format_discovery_human(report: &DiscoveryReport) -> String {
    let mut output = String::new();

    for paths in &report.search_paths {
        output.push_str(&format!("{} {}\n", "searching".truecolor(128, 128, 128), paths));
    }

    if report.modules.is_empty() {
        output.push_str(&format!("{}\n", "no modules found".truecolor(255, 140, 0)));
    }

    for module in &report.modules {
        output.push_str(&format!(
            "  {} {}\n",
            "●".truecolor(0, 255, 65),
            module.display().to_string().truecolor(255, 255, 255)
        ));
    }

    output
}
