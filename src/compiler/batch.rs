//! One-shot batch compilation with input-fingerprint caching.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::artifacts::{is_runnable, Artifacts};
use crate::compiler::framer::{CompilerOutput, ResultFramer};
use crate::compiler::target::TargetModel;
use crate::diagnostics::DiagnosticSink;
use crate::fingerprint::{FingerprintGate, FingerprintStore};
use crate::process::{ChildChannels, Spawner};
use crate::uri::{ensure_trailing_slash, SourceUriMapper};
use crate::utils::DriverError;

/// Options for one batch compile.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub sdk_root: String,
    pub main_path: String,
    pub output_file_path: String,
    pub depfile_path: Option<String>,
    pub target: TargetModel,
    pub link_platform_kernel: bool,
    pub aot: bool,
    pub track_widget_creation: bool,
    pub extra_front_end_options: Vec<String>,
    pub incremental_byte_store_path: Option<String>,
    pub packages_path: Option<String>,
    pub filesystem_roots: Vec<String>,
    pub filesystem_scheme: Option<String>,
    pub product_vm: bool,
}

/// Spawns the frontend server once, reads a single result frame, and
/// persists a fingerprint of the inputs so an unchanged build can be
/// skipped next time.
pub struct BatchCompiler {
    artifacts: Arc<dyn Artifacts>,
    spawner: Arc<dyn Spawner>,
    sink: Arc<dyn DiagnosticSink>,
    fingerprints: Arc<dyn FingerprintStore>,
}

impl BatchCompiler {
    pub fn new(
        artifacts: Arc<dyn Artifacts>,
        spawner: Arc<dyn Spawner>,
        sink: Arc<dyn DiagnosticSink>,
        fingerprints: Arc<dyn FingerprintStore>,
    ) -> Self {
        Self { artifacts, spawner, sink, fingerprints }
    }

    /// Compile once. `Ok(None)` means the compile ran and failed; the
    /// diagnostics went to the sink. `Err` means it could not run at all.
    pub async fn compile(
        &self,
        options: &BatchOptions,
    ) -> Result<Option<CompilerOutput>, DriverError> {
        let binary = self.artifacts.compiler_binary();
        if !is_runnable(&binary) {
            return Err(DriverError::ToolMissing { path: binary });
        }

        let gate = options.depfile_path.as_deref().map(|depfile| {
            FingerprintGate::new(
                Arc::clone(&self.fingerprints),
                Path::new(depfile),
                BTreeMap::from([
                    ("entryPoint".to_string(), options.main_path.clone()),
                    (
                        "trackWidgetCreation".to_string(),
                        options.track_widget_creation.to_string(),
                    ),
                    (
                        "linkPlatformKernelIn".to_string(),
                        options.link_platform_kernel.to_string(),
                    ),
                ]),
                vec![PathBuf::from(&options.main_path)],
            )
        });
        if let Some(gate) = &gate {
            if gate.matches() {
                tracing::info!("inputs unchanged, skipping compile of {}", options.main_path);
                return Ok(Some(CompilerOutput {
                    output_path: options.output_file_path.clone(),
                    error_count: 0,
                }));
            }
        }

        let args = self.batch_args(options);
        tracing::debug!("starting frontend server: {} {args:?}", binary.display());
        let child = match self.spawner.spawn(&binary, &args) {
            Ok(child) => child,
            Err(err) => {
                self.sink.line(&format!("Failed to start frontend server: {err}"));
                return Ok(None);
            }
        };

        // stdin and the kill trigger stay alive until the child exits.
        let ChildChannels { stdin: _stdin, mut stdout, mut stderr, exit, kill: _kill } = child;

        let framer = ResultFramer::new(Arc::clone(&self.sink));
        let receiver = framer.reset(false);
        {
            let framer = framer.clone();
            tokio::spawn(async move {
                while let Some(line) = stdout.recv().await {
                    framer.handle_line(&line);
                }
                framer.finish();
            });
        }
        {
            let sink = Arc::clone(&self.sink);
            tokio::spawn(async move {
                while let Some(line) = stderr.recv().await {
                    sink.line(&line);
                }
            });
        }

        let code = exit.await.unwrap_or(-1);
        if code != 0 {
            tracing::error!("frontend server exited with code {code}");
            return Ok(None);
        }
        if let Some(gate) = &gate {
            if let Err(err) = gate.persist() {
                tracing::warn!("could not persist fingerprint: {err}");
            }
        }
        Ok(receiver.await.unwrap_or(None))
    }

    fn batch_args(&self, options: &BatchOptions) -> Vec<String> {
        let mut args = vec![
            self.artifacts.frontend_snapshot().to_string_lossy().into_owned(),
            "--sdk-root".to_string(),
            ensure_trailing_slash(&options.sdk_root),
            "--strong".to_string(),
            format!("--target={}", options.target),
        ];
        if options.track_widget_creation {
            args.push("--track-widget-creation".to_string());
        }
        if !options.link_platform_kernel {
            args.push("--no-link-platform".to_string());
        }
        if options.aot {
            args.push("--aot".to_string());
            args.push("--tfa".to_string());
        }
        if options.product_vm {
            args.push("-Ddart.vm.product=true".to_string());
        }
        if options.incremental_byte_store_path.is_some() {
            args.push("--incremental".to_string());
        }
        let mut main_uri = None;
        if let Some(packages) = &options.packages_path {
            args.push("--packages".to_string());
            args.push(packages.clone());
            let mapper = SourceUriMapper::from_packages_file(
                &options.main_path,
                Path::new(packages),
                options.filesystem_scheme.as_deref(),
                &options.filesystem_roots,
            );
            main_uri = mapper.map(&options.main_path);
        }
        if !options.output_file_path.is_empty() {
            args.push("--output-dill".to_string());
            args.push(options.output_file_path.clone());
        }
        if let Some(depfile) = &options.depfile_path {
            // With virtual roots the depfile would list unmappable paths.
            if options.filesystem_roots.is_empty() {
                args.push("--depfile".to_string());
                args.push(depfile.clone());
            }
        }
        for root in &options.filesystem_roots {
            args.push("--filesystem-root".to_string());
            args.push(root.clone());
        }
        if let Some(scheme) = &options.filesystem_scheme {
            args.push("--filesystem-scheme".to_string());
            args.push(scheme.clone());
        }
        args.extend(options.extra_front_end_options.iter().cloned());
        args.push(main_uri.unwrap_or_else(|| options.main_path.clone()));
        args
    }
}
