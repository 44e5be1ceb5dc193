//! CLI definitions and command routing.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::assemble::{assemble_with_locator, AssembledStore, CertificateEntry};
use crate::config::{BaseConfig, Config, ProjectPaths};
use crate::handoff::{self, TrustStoreProperties};
use crate::passphrase::Passphrase;
use crate::{cert, loader, platform};

#[derive(Parser)]
#[command(name = "trustpack")]
#[command(about = "Assemble a trust store from a base store and extra certificates")]
pub struct Cli {
    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of trustpack.toml in the project directory
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter trustpack.toml in the project directory
    Init,

    /// Assemble the trust store and print where it is
    Assemble {
        #[command(flatten)]
        source: SourceArgs,
        /// What to print on success
        #[arg(long, value_enum, default_value_t = Emit::Path)]
        emit: Emit,
    },

    /// Detect the container format of a store file
    Probe {
        store: PathBuf,
        #[arg(long)]
        password: String,
    },

    /// List the entries of a store file
    List {
        store: PathBuf,
        #[arg(long)]
        password: String,
    },

    /// Assemble, then run a command with the store in JAVA_TOOL_OPTIONS
    Exec {
        #[command(flatten)]
        source: SourceArgs,
        /// Command and arguments, after `--`
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
}

/// Overrides for the configured base store and certificates.
#[derive(Args, Clone, Default)]
pub struct SourceArgs {
    /// Extend this store file instead of the configured base
    #[arg(long, conflicts_with = "empty")]
    pub base_file: Option<PathBuf>,

    /// Start from a new, empty store
    #[arg(long)]
    pub empty: bool,

    /// Base store password (at least 6 characters)
    #[arg(long)]
    pub password: Option<String>,

    /// Trust an extra certificate (repeatable)
    #[arg(long = "cert", value_name = "ALIAS=PATH", value_parser = parse_cert)]
    pub certs: Vec<CertificateEntry>,

    /// Where to write the merged store
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Emit {
    /// Absolute store path
    Path,
    /// name=value lines for both trust store properties
    Properties,
    /// -D flags for a JVM command line
    JavaOpts,
    /// Full result as JSON
    Json,
}

fn parse_cert(s: &str) -> std::result::Result<CertificateEntry, String> {
    let (alias, path) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ALIAS=PATH, got '{s}'"))?;
    if alias.is_empty() || path.is_empty() {
        return Err(format!("expected ALIAS=PATH, got '{s}'"));
    }
    Ok(CertificateEntry::new(path, alias))
}

impl SourceArgs {
    /// Apply overrides onto `config`. Relative paths are taken from the cwd.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        let password = self
            .password
            .clone()
            .unwrap_or_else(|| config.base.password().to_string());

        if let Some(path) = &self.base_file {
            config.base = BaseConfig::File {
                path: from_cwd(path)?,
                password,
            };
        } else if self.empty {
            config.base = BaseConfig::Empty { password };
        } else if self.password.is_some() {
            config.base = match &config.base {
                BaseConfig::Java { .. } => BaseConfig::Java { password },
                BaseConfig::Empty { .. } => BaseConfig::Empty { password },
                BaseConfig::File { path, .. } => BaseConfig::File {
                    path: path.clone(),
                    password,
                },
            };
        }

        for c in &self.certs {
            config
                .certificates
                .push(CertificateEntry::new(from_cwd(&c.path)?, c.alias.clone()));
        }
        if let Some(output) = &self.output {
            config.output = Some(from_cwd(output)?);
        }
        Ok(())
    }
}

fn from_cwd(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolve {}", path.display()))
}

/// Run CLI and dispatch to handlers.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let paths = ProjectPaths::default_paths();

    match cli.command {
        Commands::Init => cmd_init(&paths, cli.config.as_deref()),
        Commands::Assemble { source, emit } => {
            cmd_assemble(&paths, cli.config.as_deref(), &source, emit)
        }
        Commands::Probe { store, password } => cmd_probe(&store, password),
        Commands::List { store, password } => cmd_list(&store, password),
        Commands::Exec { source, command } => {
            cmd_exec(&paths, cli.config.as_deref(), &source, &command)
        }
    }
}

/// Log to stderr; TRUSTPACK_LOG takes precedence over -v.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("TRUSTPACK_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(paths: &ProjectPaths, config: Option<&Path>) -> Result<Config> {
    match config {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            Config::load_file(path)
        }
        None => Config::load(paths),
    }
}

fn cmd_init(paths: &ProjectPaths, config: Option<&Path>) -> Result<()> {
    let paths = match config {
        Some(file) => ProjectPaths {
            config_file: file.to_path_buf(),
            ..paths.clone()
        },
        None => paths.clone(),
    };
    if paths.config_file.is_file() {
        println!("Config already exists: {}", paths.config_file.display());
        return Ok(());
    }
    Config::default().save(&paths)?;
    println!("Created {}", paths.config_file.display());
    Ok(())
}

/// Load config, apply overrides, assemble and publish the result.
fn run_assembly(
    paths: &ProjectPaths,
    config: Option<&Path>,
    source: &SourceArgs,
) -> Result<AssembledStore> {
    let mut config = load_config(paths, config)?;
    source.apply(&mut config)?;
    let request = config.resolve(paths)?;
    let locator = platform::default_locator(config.java_home.as_ref().map(|p| paths.resolve(p)));

    let store = assemble_with_locator(
        &request.source,
        &request.certificates,
        &request.output,
        locator.as_ref(),
    )?;
    handoff::publish(&TrustStoreProperties::from(&store));
    Ok(store)
}

fn cmd_assemble(
    paths: &ProjectPaths,
    config: Option<&Path>,
    source: &SourceArgs,
    emit: Emit,
) -> Result<()> {
    let store = run_assembly(paths, config, source)?;
    let props = TrustStoreProperties::from(&store);
    match emit {
        Emit::Path => println!("{}", store.path.display()),
        Emit::Properties => {
            for (name, value) in props.pairs() {
                println!("{name}={value}");
            }
        }
        Emit::JavaOpts => println!("{}", props.java_options().join(" ")),
        Emit::Json => {
            let report = serde_json::json!({
                "path": store.path,
                "format": store.format,
                "origin": store.origin,
                "entries": store.entries,
                "properties": props.view(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn cmd_probe(store: &Path, password: String) -> Result<()> {
    let opened = loader::probe_and_load(store, &Passphrase::new(password))?;
    println!("{}\t{} entries", opened.format(), opened.len());
    Ok(())
}

fn cmd_list(store: &Path, password: String) -> Result<()> {
    let opened = loader::probe_and_load(store, &Passphrase::new(password))?;
    for (alias, entry) in opened.entries() {
        let Some(der) = entry.certificate_der() else {
            println!("{alias}\t{}", entry.kind());
            continue;
        };
        let summary = cert::summarize(der).with_context(|| format!("inspect entry '{alias}'"))?;
        let expired = if summary.expired { " (expired)" } else { "" };
        println!(
            "{alias}\t{}\t{}\t{}\t{}{expired}",
            entry.kind(),
            summary.subject,
            summary.issuer,
            summary.not_after
        );
    }
    Ok(())
}

fn cmd_exec(
    paths: &ProjectPaths,
    config: Option<&Path>,
    source: &SourceArgs,
    command: &[String],
) -> Result<()> {
    let store = run_assembly(paths, config, source)?;
    let (program, args) = command
        .split_first()
        .context("no command given")?;

    let mut cmd = std::process::Command::new(program);
    cmd.args(args);
    handoff::command_with(&TrustStoreProperties::from(&store), &mut cmd);
    let status = cmd
        .status()
        .with_context(|| format!("run {program}"))?;
    std::process::exit(status.code().unwrap_or(1));
}
