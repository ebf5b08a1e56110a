//! setupforge - NSIS installer build orchestrator.
//!
//! Packs application payloads, composes the installer script, runs the
//! uninstaller sub-build, invokes `makensis`, and writes update metadata
//! next to the finished artifacts.

use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;
use setupforge::builder::events;
use setupforge::settings::{Arch, PackageSettings, RawInstallerOptions, SettingsBuilder};
use setupforge::{BuildEvent, Orchestrator};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use tokio_util::sync::CancellationToken;

/// NSIS installer build orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "setupforge",
    version,
    about = "Builds NSIS installers from packaged application payloads",
    long_about = "Builds Windows installers via the NSIS compiler.

Reads application metadata and installer options from a JSON config,
packs one payload directory per target architecture, and writes the
installer plus its differential-update metadata to the output directory.

Usage:
  setupforge --config app.json --payload x64=dist/win-unpacked --output-dir dist
  setupforge --config app.json --payload x64=out/x64 --payload arm64=out/arm64 --output-dir dist

Exit code 0 = every planned artifact exists in the output directory."
)]
struct Args {
    /// Path to the JSON build configuration
    #[arg(short, long, value_name = "PATH")]
    config: PathBuf,

    /// Payload directory per architecture, as `arch=dir` (repeatable)
    ///
    /// Valid architecture tokens: x64, ia32, arm64.
    #[arg(long, value_name = "ARCH=DIR", required = true)]
    payload: Vec<String>,

    /// Output directory for artifacts
    #[arg(short, long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Directory with license files, images, and custom script resources
    #[arg(long, value_name = "DIR", default_value = "build")]
    build_resources: PathBuf,

    /// Command template used to sign binaries (`%1` replaced by the path)
    #[arg(long, value_name = "CMD", env = "SETUPFORGE_SIGN_COMMAND")]
    sign_command: Option<String>,

    /// VM command used to run Windows binaries when emulation fails
    #[arg(long, value_name = "CMD", env = "SETUPFORGE_VM_COMMAND")]
    vm_command: Option<String>,

    /// Enable verbose build diagnostics
    #[arg(short, long)]
    verbose: bool,
}

/// On-disk build configuration document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildConfig {
    product_name: String,
    app_id: String,
    version: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    company_name: Option<String>,
    /// Installer options, validated before any build work starts.
    #[serde(default)]
    nsis: RawInstallerOptions,
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let exit_code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };

    process::exit(exit_code);
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_text = std::fs::read_to_string(&args.config)
        .with_context(|| format!("reading config {}", args.config.display()))?;
    let config: BuildConfig = serde_json::from_str(&config_text)
        .with_context(|| format!("parsing config {}", args.config.display()))?;

    let payload_dirs = parse_payloads(&args.payload)?;
    let archs: Vec<Arch> = payload_dirs.keys().copied().collect();

    let mut builder = SettingsBuilder::new()
        .package_settings(PackageSettings {
            product_name: config.product_name,
            app_id: config.app_id,
            version: config.version,
            description: config.description,
            company_name: config.company_name,
        })
        .raw_installer_options(config.nsis)
        .archs(archs)
        .build_resources_dir(&args.build_resources)
        .output_dir(&args.output_dir)
        .debug_logging(args.verbose);
    if let Some(command) = args.sign_command {
        builder = builder.sign_command(command);
    }
    if let Some(command) = args.vm_command {
        builder = builder.vm_command(command);
    }
    let settings = builder.build()?;

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupt received; cancelling build");
            ctrl_c_token.cancel();
        }
    });

    let (sender, mut receiver) = events::channel();
    let reporter = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            match event {
                BuildEvent::ArtifactBuildStarted { target, file, .. } => {
                    println!("building {} ({})", file.display(), target);
                }
                BuildEvent::ArtifactBuildCompleted { file, .. } => {
                    println!("finished {}", file.display());
                }
            }
        }
    });

    let orchestrator = Orchestrator::new(settings, cancel).with_event_sink(sender);
    let artifacts = orchestrator.build(&payload_dirs).await?;
    reporter.await.ok();

    for artifact in &artifacts {
        println!(
            "{}  {} bytes  sha256:{}",
            artifact.path.display(),
            artifact.size,
            artifact.sha256
        );
    }
    Ok(())
}

/// Parses repeated `arch=dir` flags into a payload map.
fn parse_payloads(specs: &[String]) -> anyhow::Result<BTreeMap<Arch, PathBuf>> {
    let mut payload_dirs = BTreeMap::new();
    for spec in specs {
        let Some((token, dir)) = spec.split_once('=') else {
            bail!("invalid --payload `{spec}`: expected arch=dir");
        };
        let arch = Arch::from_token(token)
            .with_context(|| format!("invalid --payload `{spec}`: unknown architecture"))?;
        if payload_dirs.insert(arch, PathBuf::from(dir)).is_some() {
            bail!("duplicate --payload for architecture {token}");
        }
    }
    Ok(payload_dirs)
}
