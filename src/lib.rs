//! Bridges precompiled Spicy parser modules into a Zeek-style host.
//!
//! A [`Plugin`] discovers and loads module files, collects the protocol,
//! file and packet analyzers they declare, registers those with the
//! [`host::Host`] and, once the host has finished loading scripts, resolves
//! every analyzer to its parsers.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod module;
pub mod output;
pub mod plugin;
pub mod runtime;

pub use config::Config;
pub use error::{BridgeError, Result};
pub use plugin::{LoadFileOutcome, Phase, Plugin};
