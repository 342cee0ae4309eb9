use anyhow::{bail, Result};
use clap::Parser;
use colored::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use spicy_bridge::cli::{Cli, Command};
use spicy_bridge::config::{Config, HOST_PLUGIN_PATH_ENV};
use spicy_bridge::host::MemoryHost;
use spicy_bridge::module::{find_modules, module_search_paths, DylibOpener};
use spicy_bridge::output::{DiscoveryReport, OutputWriter, RegistryReport};
use spicy_bridge::runtime::LocalRuntime;
use spicy_bridge::{BridgeError, LoadFileOutcome, Plugin};

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(err) = run(cli) {
        let fatal = err.downcast_ref::<BridgeError>().map_or(true, BridgeError::is_fatal);
        if fatal {
            eprintln!("{} {:#}", "fatal error:".red().bold(), err);
            std::process::exit(1);
        }
        warn!("{:#}", err);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("spicy_bridge=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spicy_bridge=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    let host_plugin_path = std::env::var(HOST_PLUGIN_PATH_ENV).unwrap_or_default();
    let writer = OutputWriter::new(cli.output_format, cli.output_file)?;

    match cli.command {
        Command::Discover { module_path } => {
            if module_path.is_some() {
                config.module_path_override = module_path;
            }

            let search_paths = module_search_paths(&config, &host_plugin_path);
            let modules = search_paths
                .iter()
                .flat_map(|paths| find_modules(paths, &config.module_extension))
                .collect();

            writer.write_discovery(&DiscoveryReport { search_paths, modules })?;
        }

        Command::Inspect {
            modules,
            no_discover,
            host_version,
        } => {
            let version = host_version.or(config.compiled_host_version).unwrap_or_default();
            let host = MemoryHost::new(version).with_plugin_path(host_plugin_path);
            let mut plugin = Plugin::new(config, host, Box::new(LocalRuntime::new()), Box::new(DylibOpener))?;

            if !no_discover {
                plugin.init_pre_script()?;
            }

            for path in &modules {
                if plugin.hook_load_file(path)? == LoadFileOutcome::NotOurs {
                    bail!("{} is not a module file", path.display());
                }
            }

            plugin.init_post_script()?;
            info!(
                "Loaded {} modules, {} events",
                plugin.modules().len(),
                plugin.events().len()
            );

            let report = RegistryReport::from_plugin(&plugin);
            plugin.done();

            writer.write_registry(&report)?;
        }
    }

    Ok(())
}
