// Parser model and the external parser runtime lifecycle
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Transport protocol attached to a port or a protocol analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    #[default]
    Undef,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Icmp => write!(f, "icmp"),
            Protocol::Undef => write!(f, "undef"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub protocol: Protocol,
}

impl Port {
    pub fn new(number: u16, protocol: Protocol) -> Self {
        Self { number, protocol }
    }

    pub fn tcp(number: u16) -> Self {
        Self::new(number, Protocol::Tcp)
    }

    pub fn udp(number: u16) -> Self {
        Self::new(number, Protocol::Udp)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

/// Side of a connection a parser declares itself for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Originator,
    Responder,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserPort {
    pub port: Port,
    pub direction: Direction,
}

/// A parser exported by a loaded module.
///
/// Only the metadata matters here; the parsing machinery itself lives in the
/// runtime and is reached through the host's analyzer instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parser {
    pub name: String,
    #[serde(default)]
    pub ports: Vec<ParserPort>,
    #[serde(default)]
    pub mime_types: Vec<String>,
}

impl Parser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: Vec::new(),
            mime_types: Vec::new(),
        }
    }

    pub fn with_port(mut self, port: Port, direction: Direction) -> Self {
        self.ports.push(ParserPort { port, direction });
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_types.push(mime_type.into());
        self
    }
}

/// Settings handed to the runtime when it is initialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub enable_print: bool,
    pub abort_on_exceptions: bool,
    pub show_backtraces: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("{message}")]
    Exception { kind: String, message: String },
}

/// The process-wide parser runtime: collects parsers as modules register
/// them, and is initialized once all modules are in.
pub trait Runtime {
    fn register_parser(&mut self, parser: Parser);
    fn init(&mut self, config: &RuntimeConfig) -> std::result::Result<(), RuntimeError>;
    fn done(&mut self);
    fn parsers(&self) -> &[Arc<Parser>];
}

/// Runtime living in the same process as the plugin.
#[derive(Debug, Default)]
pub struct LocalRuntime {
    parsers: Vec<Arc<Parser>>,
    config: Option<RuntimeConfig>,
}

impl LocalRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&RuntimeConfig> {
        self.config.as_ref()
    }
}

impl Runtime for LocalRuntime {
    fn register_parser(&mut self, parser: Parser) {
        tracing::debug!("Registering parser {}", parser.name);
        self.parsers.push(Arc::new(parser));
    }

    fn init(&mut self, config: &RuntimeConfig) -> std::result::Result<(), RuntimeError> {
        self.config = Some(*config);
        Ok(())
    }

    fn done(&mut self) {
        self.config = None;
    }

    fn parsers(&self) -> &[Arc<Parser>] {
        &self.parsers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_display() {
        assert_eq!(Port::tcp(80).to_string(), "80/tcp");
        assert_eq!(Port::udp(53).to_string(), "53/udp");
        assert_eq!(Port::new(0, Protocol::Icmp).to_string(), "0/icmp");
    }

    #[test]
    fn test_local_runtime_lifecycle() {
        let mut runtime = LocalRuntime::new();
        runtime.register_parser(Parser::new("http::Request"));
        assert!(!runtime.is_initialized());

        let config = RuntimeConfig { enable_print: true, ..Default::default() };
        runtime.init(&config).unwrap();
        assert!(runtime.is_initialized());
        assert_eq!(runtime.config(), Some(&config));
        assert_eq!(runtime.parsers().len(), 1);

        runtime.done();
        assert!(!runtime.is_initialized());
    }
}
