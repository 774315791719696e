//! Command-line interface for the modhost plugin host.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modhost_core::config::{HostConfig, defaults, env_vars};
use modhost_core::plugin::{LoadedPlugin, PluginHost, compile, is_plugin_library};

/// modhost - load plugins and inspect their capabilities.
#[derive(Parser, Debug)]
#[command(name = "modhost")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Plugin management commands.
    Plugin {
        #[command(subcommand)]
        plugin_cmd: PluginCommand,
    },
}

/// Plugin subcommands.
#[derive(Subcommand, Debug)]
enum PluginCommand {
    /// Build a plugin crate into a loadable library.
    Compile {
        /// Plugin crate directory.
        #[arg(required = true)]
        source: PathBuf,
        /// Output library path.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load plugins and activate their capabilities.
    Load {
        /// Logical names or absolute paths.
        #[arg(required = true)]
        plugins: Vec<String>,
    },
    /// Show the capabilities of a plugin without activating it.
    Inspect {
        /// Path to the plugin library.
        #[arg(required = true)]
        path: PathBuf,
    },
    /// List plugin libraries in the plugin directory.
    List,
    /// Load every plugin in the plugin directory.
    Discover,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;
    tracing::debug!(
        libexec_dir = %config.libexec_dir.display(),
        activation_timeout_ms = config.activation_timeout_ms,
        "Using plugin host configuration"
    );

    match args.command {
        Command::Plugin { plugin_cmd } => run_plugin_cmd(plugin_cmd, config).await,
    }
}

fn init_logging(verbose: bool) {
    // JSON format for production/container environments
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("modhost={default_level}"))
            .add_directive(tracing::Level::WARN.into())
    });

    // Logs go to stderr; stdout carries command output.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Explicit `--config`, then the user config file if present, then defaults.
/// Environment overrides apply last.
fn load_config(explicit: Option<&Path>) -> Result<HostConfig> {
    let user_file = dirs::config_dir()
        .map(|dir| dir.join("modhost").join(defaults::CONFIG_FILE_NAME))
        .filter(|path| path.is_file());

    let config = match explicit.map(Path::to_path_buf).or(user_file) {
        Some(path) => HostConfig::from_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => HostConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

async fn run_plugin_cmd(cmd: PluginCommand, config: HostConfig) -> Result<()> {
    match cmd {
        PluginCommand::Compile { source, output } => compile_cmd(&source, output),
        PluginCommand::Load { plugins } => load_plugins(PluginHost::new(config), &plugins).await,
        PluginCommand::Inspect { path } => inspect_plugin(PluginHost::new(config), &path),
        PluginCommand::List => list_plugins(&config),
        PluginCommand::Discover => discover_plugins(PluginHost::new(config)).await,
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn compile_cmd(source: &Path, output: Option<PathBuf>) -> Result<()> {
    let source = source
        .canonicalize()
        .with_context(|| format!("Plugin source not found: {}", source.display()))?;
    let destination = match output {
        Some(path) => absolute(&path)?,
        None => {
            let lib_name = compile::library_name(&source.join("Cargo.toml"))?;
            compile::default_destination(&source, &lib_name)
        }
    };

    println!("Compiling plugin: {}", source.display());
    let built = compile::compile_plugin(&source, &destination)?;
    println!("Plugin written to {}", built.display());
    Ok(())
}

async fn load_plugins(host: PluginHost, plugins: &[String]) -> Result<()> {
    let mut reports = Vec::with_capacity(plugins.len());
    for plugin in plugins {
        let loaded = host
            .load(plugin)
            .await
            .with_context(|| format!("Failed to load plugin {plugin}"))?;
        reports.push(loaded);
    }
    let reports: Vec<&LoadedPlugin> = reports.iter().map(|p| p.as_ref()).collect();
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn inspect_plugin(host: PluginHost, path: &Path) -> Result<()> {
    let path = absolute(path)?;
    let capabilities = host.inspect(&path)?;

    println!("Plugin: {}", path.display());
    if capabilities.is_empty() {
        println!("Capabilities: none");
    } else {
        let names: Vec<_> = capabilities.capabilities().map(|c| c.name()).collect();
        println!("Capabilities: {}", names.join(", "));
    }
    Ok(())
}

fn list_plugins(config: &HostConfig) -> Result<()> {
    let dir = config.plugin_dir();
    println!("Plugin directory: {}", dir.display());

    let mut names: Vec<String> = match std::fs::read_dir(&dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|path| path.is_file() && is_plugin_library(path))
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect(),
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "Plugin directory not readable");
            Vec::new()
        }
    };
    names.sort();

    if names.is_empty() {
        println!("No plugins found");
    }
    for name in names {
        println!("  {name}");
    }
    Ok(())
}

async fn discover_plugins(host: PluginHost) -> Result<()> {
    let outcomes = host.discover().await?;
    let mut failed = 0;
    for (path, outcome) in outcomes {
        match outcome {
            Ok(plugin) => {
                let names: Vec<_> = plugin.capabilities.iter().map(|c| c.name()).collect();
                println!("  loaded  {} [{}]", path.display(), names.join(", "));
            }
            Err(e) => {
                failed += 1;
                println!("  failed  {}: {e}", path.display());
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} plugin(s) failed to load");
    }
    Ok(())
}
