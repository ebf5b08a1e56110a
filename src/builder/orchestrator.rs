//! Top-level build orchestration.
//!
//! Plans build units (universal fan-in vs per-architecture fan-out),
//! serializes all units of one logical target through a single-concurrency
//! queue, and drives the full pipeline per unit: payload packing, symbol
//! table, fragment gathering, script assembly, uninstaller sub-build,
//! compiler invocation, signing, and differential-update metadata.

use super::archive;
use super::blockmap::{self, UpdateInfo};
use super::checksum;
use super::compiler::{self, LockProbe};
use super::events::{BuildEvent, EventSender};
use super::fragments;
use super::script::{PluginAbi, ScriptGenerator};
use super::sign;
use super::symbols::{self, PackagedPayload};
use super::template::INSTALLER_TEMPLATE;
use super::uninstaller::{self, MaterializePoll};
use crate::error::{Error, ErrorExt, Result};
use crate::settings::{Arch, DeliveryKind, InstallerMode, Settings};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// One (installer-kind, architecture-set) pairing compiled into a single
/// artifact.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildUnit {
    /// Target architectures, in request order.
    pub archs: Vec<Arch>,
    /// One artifact spanning all architectures vs one per architecture.
    pub universal: bool,
}

/// Descriptor of one finished artifact.
#[derive(Clone, Debug)]
pub struct ArtifactDescriptor {
    /// Artifact path.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// SHA-256 content hash, hex.
    pub sha256: String,
}

/// Plans the build units for one target.
///
/// With universal disabled, each requested architecture becomes its own
/// unit. With universal enabled and several architectures, one combined
/// unit is planned, plus one extra unit per architecture when the
/// artifact-name pattern references the architecture token, so both the
/// universal and the per-architecture-named artifacts exist.
pub fn plan_units(requested: &[Arch], universal: bool, pattern_references_arch: bool) -> Vec<BuildUnit> {
    if universal && requested.len() > 1 {
        let mut units = vec![BuildUnit {
            archs: requested.to_vec(),
            universal: true,
        }];
        if pattern_references_arch {
            units.extend(requested.iter().map(|arch| BuildUnit {
                archs: vec![*arch],
                universal: false,
            }));
        }
        units
    } else {
        requested
            .iter()
            .map(|arch| BuildUnit {
                archs: vec![*arch],
                universal: false,
            })
            .collect()
    }
}

/// Main build orchestrator for one logical target.
///
/// All units of the target run through an internal single-concurrency
/// queue: uninstaller sub-builds shell out and wait on external processes
/// and must never race each other within the same target. Distinct targets
/// use distinct orchestrators and proceed independently.
pub struct Orchestrator {
    settings: Settings,
    cancel: CancellationToken,
    events: Option<EventSender>,
    queue: tokio::sync::Mutex<()>,
    probe: LockProbe,
    poll: MaterializePoll,
}

impl Orchestrator {
    /// Creates an orchestrator for `settings`.
    pub fn new(settings: Settings, cancel: CancellationToken) -> Self {
        Self {
            settings,
            cancel,
            events: None,
            queue: tokio::sync::Mutex::new(()),
            probe: LockProbe::default(),
            poll: MaterializePoll::default(),
        }
    }

    /// Attaches a packaging-event sink.
    pub fn with_event_sink(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Overrides the output-lock probe cadence.
    pub fn with_lock_probe(mut self, probe: LockProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Overrides the uninstaller materialization poll cadence.
    pub fn with_materialize_poll(mut self, poll: MaterializePoll) -> Self {
        self.poll = poll;
        self
    }

    /// Logical target name, used in events and log lines.
    pub fn target_name(&self) -> &'static str {
        match self.settings.installer().delivery {
            DeliveryKind::SelfContained => "nsis",
            DeliveryKind::Web => "nsis-web",
        }
    }

    /// Builds every planned unit, returning one descriptor per artifact.
    ///
    /// `payload_dirs` maps each requested architecture to its application
    /// payload directory; a missing entry is a configuration error.
    pub async fn build(
        &self,
        payload_dirs: &BTreeMap<Arch, PathBuf>,
    ) -> Result<Vec<ArtifactDescriptor>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        for arch in self.settings.archs() {
            if !payload_dirs.contains_key(arch) {
                return Err(Error::InvalidConfiguration {
                    option: "payloadDirs".into(),
                    reason: format!("no payload directory for requested architecture {arch}"),
                });
            }
        }

        let pattern_references_arch = self
            .settings
            .installer()
            .artifact_name
            .as_deref()
            .is_some_and(|pattern| pattern.contains("${arch}"));
        let units = plan_units(
            self.settings.archs(),
            self.settings.installer().universal,
            pattern_references_arch,
        );
        log::info!(
            "planned {} build unit(s) for target {}",
            units.len(),
            self.target_name()
        );

        let mut artifacts = Vec::with_capacity(units.len());
        for unit in &units {
            // Single-concurrency queue per target: sub-builds must not
            // race within one target.
            let _serial = self.queue.lock().await;
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            artifacts.push(self.build_unit(unit, payload_dirs).await?);
        }
        Ok(artifacts)
    }

    async fn build_unit(
        &self,
        unit: &BuildUnit,
        payload_dirs: &BTreeMap<Arch, PathBuf>,
    ) -> Result<ArtifactDescriptor> {
        let file_name = self.installer_file_name(unit);
        let installer_path = self.settings.output_dir().join(&file_name);
        self.emit(BuildEvent::ArtifactBuildStarted {
            target: self.target_name().to_string(),
            file: installer_path.clone(),
            archs: unit.archs.clone(),
        });

        let seven_zip = archive::find_seven_zip()?;
        let compiler_path = compiler::find_compiler()?;

        // Per-architecture packing is independent; pack concurrently.
        let payloads = futures::future::try_join_all(
            unit.archs
                .iter()
                .map(|arch| self.pack_arch(&seven_zip, *arch, &payload_dirs[arch])),
        )
        .await?;

        let estimated_size_kib = self.estimated_size_kib(&seven_zip, &payloads).await;
        let mut table =
            symbols::build_symbol_table(&self.settings, &payloads, estimated_size_kib, &installer_path)?;

        let mut script = self.compose_base_script().await;
        let gathered = fragments::gather(&self.settings, &self.cancel).await?;
        gathered
            .resources
            .merge_into("installerIcons", &mut script, &mut table)?;
        gathered
            .license
            .merge_into("licensePage", &mut script, &mut table)?;
        gathered
            .languages
            .merge_into("languageFiles", &mut script, &mut table)?;
        gathered.register_associations.merge_into(
            "registerFileAssociations",
            &mut script,
            &mut table,
        )?;
        gathered.unregister_associations.merge_into(
            "unregisterFileAssociations",
            &mut script,
            &mut table,
        )?;
        let script_text = script.build();
        if self.settings.debug_logging() {
            // Keep the composed script on disk for compiler-error diagnosis.
            let script_dump = self.settings.output_dir().join(format!("{file_name}.nsi"));
            tokio::fs::write(&script_dump, &script_text)
                .await
                .fs_context("writing composed script", &script_dump)?;
            log::debug!("composed script kept at {}", script_dump.display());
        }

        // Portable artifacts have nothing to uninstall; everyone else gets
        // the sub-build, whose define must land before the freeze.
        let uninstaller_artifact = if matches!(
            self.settings.installer().mode,
            InstallerMode::Portable
        ) {
            None
        } else {
            Some(
                uninstaller::build_and_embed(
                    &self.settings,
                    &compiler_path,
                    &mut table,
                    &script_text,
                    &file_name,
                    &self.probe,
                    &self.poll,
                )
                .await?,
            )
        };

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // Freeze: nothing mutated past this point reaches the output.
        let args = table.freeze();
        let compile_result = compiler::compile(
            &compiler_path,
            &args,
            &script_text,
            &installer_path,
            self.settings.installer().warnings_as_errors,
            &self.probe,
        )
        .await;
        // The transient uninstaller is removed whether or not the parent
        // compile succeeded.
        drop(uninstaller_artifact);
        compile_result?;

        sign::sign_file(&self.settings, &installer_path).await?;

        let metadata = tokio::fs::metadata(&installer_path)
            .await
            .fs_context("reading artifact metadata", &installer_path)?;
        let descriptor = ArtifactDescriptor {
            path: installer_path.clone(),
            size: metadata.len(),
            sha256: checksum::sha256_hex(&installer_path).await?,
        };

        let update_info = self.update_metadata(&descriptor, &payloads).await?;
        self.emit(BuildEvent::ArtifactBuildCompleted {
            target: self.target_name().to_string(),
            file: installer_path,
            archs: unit.archs.clone(),
            update_info: Some(update_info),
        });
        log::info!("built {}", descriptor.path.display());
        Ok(descriptor)
    }

    async fn pack_arch(
        &self,
        seven_zip: &Path,
        arch: Arch,
        source_dir: &Path,
    ) -> Result<PackagedPayload> {
        let file_name = format!(
            "{}-{}-{}.nsis.7z",
            self.settings.app_package_name(),
            self.settings.version(),
            arch.token()
        );
        let archive_path = self.settings.output_dir().join(&file_name);
        tokio::fs::create_dir_all(self.settings.output_dir())
            .await
            .fs_context("creating output directory", self.settings.output_dir())?;

        log::debug!("packing {} payload from {}", arch, source_dir.display());
        archive::pack_directory(
            seven_zip,
            source_dir,
            &archive_path,
            self.settings.installer().compression,
        )
        .await?;

        if self.settings.installer().delivery == DeliveryKind::Web {
            // Web payloads are fetched separately; annotate them for delta
            // downloads now, at packaging time.
            blockmap::write_block_map(&archive_path).await?;
        }

        let metadata = tokio::fs::metadata(&archive_path)
            .await
            .fs_context("reading payload metadata", &archive_path)?;
        Ok(PackagedPayload {
            arch,
            sha512_base64: checksum::sha512_base64(&archive_path).await?,
            archive_size: metadata.len(),
            unpacked_size: directory_size(source_dir),
            path: archive_path,
            file_name,
        })
    }

    /// Advisory registry-display size: the sum of per-archive entry sizes.
    ///
    /// Omitted entirely when listing fails for any architecture.
    async fn estimated_size_kib(
        &self,
        seven_zip: &Path,
        payloads: &[PackagedPayload],
    ) -> Option<u64> {
        let mut total: u64 = 0;
        for payload in payloads {
            total = total
                .checked_add(archive::list_entry_sizes_total(seven_zip, &payload.path).await?)?;
        }
        Some(symbols::bytes_to_kib_ceil(total))
    }

    async fn compose_base_script(&self) -> ScriptGenerator {
        let mut script = ScriptGenerator::new();

        let custom = self.settings.build_resources_dir().join("installer.nsh");
        if tokio::fs::try_exists(&custom).await.unwrap_or(false) {
            script.include(&custom);
        }

        let abi = if self.settings.installer().unicode {
            PluginAbi::Unicode
        } else {
            PluginAbi::Ansi
        };
        let plugins = self.settings.build_resources_dir().join("plugins");
        if tokio::fs::try_exists(&plugins).await.unwrap_or(false) {
            script.add_plugin_dir(abi, &plugins);
        }

        script.set_template(INSTALLER_TEMPLATE);
        script
    }

    async fn update_metadata(
        &self,
        descriptor: &ArtifactDescriptor,
        payloads: &[PackagedPayload],
    ) -> Result<UpdateInfo> {
        let file_name = descriptor
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let is_admin_rights_required = blockmap::is_admin_rights_required(&self.settings);

        let block_map_file = match self.settings.installer().delivery {
            DeliveryKind::SelfContained => Some(blockmap::write_block_map(&descriptor.path).await?),
            DeliveryKind::Web => {
                let stem = file_name.trim_end_matches(".exe");
                blockmap::write_web_manifest(self.settings.output_dir(), stem, payloads).await?;
                None
            }
        };

        Ok(UpdateInfo {
            file_name,
            size: descriptor.size,
            sha512: checksum::sha512_base64(&descriptor.path).await?,
            is_admin_rights_required,
            block_map_file,
        })
    }

    /// Substitutes the artifact-name pattern for one unit.
    fn installer_file_name(&self, unit: &BuildUnit) -> String {
        let default_pattern = if unit.universal || self.settings.archs().len() == 1 {
            "${name} Setup ${version}.exe"
        } else {
            "${name} Setup ${version}-${arch}.exe"
        };
        let pattern = self
            .settings
            .installer()
            .artifact_name
            .clone()
            .unwrap_or_else(|| default_pattern.to_string());
        let arch_token = if unit.universal {
            "universal"
        } else {
            unit.archs[0].token()
        };
        pattern
            .replace("${name}", &self.settings.app_package_name())
            .replace("${version}", self.settings.version())
            .replace("${arch}", arch_token)
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(events) = &self.events {
            // A departed pipeline listener never fails the build.
            let _ = events.send(event);
        }
    }
}

/// Total size of all regular files under `dir`.
fn directory_size(dir: &Path) -> u64 {
    walkdir::WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{PackageSettings, RawInstallerOptions, SettingsBuilder};

    fn settings(options_json: &str, archs: Vec<Arch>) -> Settings {
        let raw: RawInstallerOptions = serde_json::from_str(options_json).unwrap();
        SettingsBuilder::new()
            .package_settings(PackageSettings {
                product_name: "Orch".into(),
                app_id: "com.example.orch".into(),
                version: "3.1.4".into(),
                description: "orchestrator".into(),
                company_name: None,
            })
            .archs(archs)
            .output_dir("dist")
            .raw_installer_options(raw)
            .build()
            .unwrap()
    }

    #[test]
    fn fan_out_schedules_one_unit_per_architecture() {
        let units = plan_units(&[Arch::X64, Arch::Ia32, Arch::Arm64], false, false);
        assert_eq!(units.len(), 3);
        for unit in &units {
            assert_eq!(unit.archs.len(), 1);
            assert!(!unit.universal);
        }
    }

    #[test]
    fn universal_with_arch_pattern_schedules_combined_plus_per_arch() {
        let units = plan_units(&[Arch::X64, Arch::Arm64], true, true);
        assert_eq!(units.len(), 3);
        assert!(units[0].universal);
        assert_eq!(units[0].archs, vec![Arch::X64, Arch::Arm64]);
        assert_eq!(units[1].archs, vec![Arch::X64]);
        assert_eq!(units[2].archs, vec![Arch::Arm64]);
    }

    #[test]
    fn universal_without_arch_pattern_schedules_single_unit() {
        let units = plan_units(&[Arch::X64, Arch::Arm64], true, false);
        assert_eq!(units.len(), 1);
        assert!(units[0].universal);
    }

    #[test]
    fn single_arch_is_one_unit_regardless_of_universal() {
        let units = plan_units(&[Arch::X64], true, true);
        assert_eq!(units.len(), 1);
        assert!(!units[0].universal);
    }

    #[test]
    fn installer_file_name_substitutes_tokens() {
        let settings = settings(
            r#"{"artifactName": "${name}-${version}-${arch}.exe"}"#,
            vec![Arch::X64, Arch::Arm64],
        );
        let orchestrator = Orchestrator::new(settings, CancellationToken::new());
        let name = orchestrator.installer_file_name(&BuildUnit {
            archs: vec![Arch::Arm64],
            universal: false,
        });
        assert_eq!(name, "Orch-3.1.4-arm64.exe");
        let universal = orchestrator.installer_file_name(&BuildUnit {
            archs: vec![Arch::X64, Arch::Arm64],
            universal: true,
        });
        assert_eq!(universal, "Orch-3.1.4-universal.exe");
    }

    #[test]
    fn default_name_gets_arch_suffix_only_on_fan_out() {
        let multi = settings("{}", vec![Arch::X64, Arch::Arm64]);
        let orchestrator = Orchestrator::new(multi, CancellationToken::new());
        let name = orchestrator.installer_file_name(&BuildUnit {
            archs: vec![Arch::X64],
            universal: false,
        });
        assert_eq!(name, "Orch Setup 3.1.4-x64.exe");

        let single = settings("{}", vec![Arch::X64]);
        let orchestrator = Orchestrator::new(single, CancellationToken::new());
        let name = orchestrator.installer_file_name(&BuildUnit {
            archs: vec![Arch::X64],
            universal: false,
        });
        assert_eq!(name, "Orch Setup 3.1.4.exe");
    }

    #[test]
    fn probe_and_poll_cadences_are_overridable() {
        let orchestrator = Orchestrator::new(settings("{}", vec![Arch::X64]), CancellationToken::new())
            .with_lock_probe(LockProbe {
                attempts: 2,
                delay: std::time::Duration::from_millis(1),
            })
            .with_materialize_poll(MaterializePoll {
                attempts: 4,
                interval: std::time::Duration::from_millis(2),
            });
        assert_eq!(orchestrator.probe.attempts, 2);
        assert_eq!(orchestrator.poll.attempts, 4);
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let settings = settings("{}", vec![Arch::X64]);
        let (sender, mut receiver) = super::super::events::channel();
        let orchestrator =
            Orchestrator::new(settings, CancellationToken::new()).with_event_sink(sender);
        let file = PathBuf::from("dist/out.exe");
        orchestrator.emit(BuildEvent::ArtifactBuildStarted {
            target: "nsis".into(),
            file: file.clone(),
            archs: vec![Arch::X64],
        });
        orchestrator.emit(BuildEvent::ArtifactBuildCompleted {
            target: "nsis".into(),
            file,
            archs: vec![Arch::X64],
            update_info: None,
        });
        assert!(matches!(
            receiver.recv().await,
            Some(BuildEvent::ArtifactBuildStarted { .. })
        ));
        assert!(matches!(
            receiver.recv().await,
            Some(BuildEvent::ArtifactBuildCompleted { .. })
        ));
    }

    #[tokio::test]
    async fn departed_event_listener_does_not_fail_emission() {
        let settings = settings("{}", vec![Arch::X64]);
        let (sender, receiver) = super::super::events::channel();
        drop(receiver);
        let orchestrator =
            Orchestrator::new(settings, CancellationToken::new()).with_event_sink(sender);
        orchestrator.emit(BuildEvent::ArtifactBuildStarted {
            target: "nsis".into(),
            file: PathBuf::from("dist/out.exe"),
            archs: vec![Arch::X64],
        });
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_work() {
        let settings = settings("{}", vec![Arch::X64]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let orchestrator = Orchestrator::new(settings, cancel);
        let mut payload_dirs = BTreeMap::new();
        payload_dirs.insert(Arch::X64, PathBuf::from("payload/x64"));
        assert!(matches!(
            orchestrator.build(&payload_dirs).await,
            Err(Error::Cancelled)
        ));
    }

    #[tokio::test]
    async fn missing_payload_directory_is_a_configuration_error() {
        let settings = settings("{}", vec![Arch::X64, Arch::Arm64]);
        let orchestrator = Orchestrator::new(settings, CancellationToken::new());
        let mut payload_dirs = BTreeMap::new();
        payload_dirs.insert(Arch::X64, PathBuf::from("payload/x64"));
        match orchestrator.build(&payload_dirs).await {
            Err(Error::InvalidConfiguration { option, .. }) => {
                assert_eq!(option, "payloadDirs");
            }
            other => panic!("expected InvalidConfiguration, got {other:?}"),
        }
    }
}
