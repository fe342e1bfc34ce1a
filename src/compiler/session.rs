//! The resident compiler session.
//!
//! A session owns one frontend server process for its whole life. Requests
//! are serialized through a [`RequestQueue`]: the worker writes a command
//! to the child's stdin, awaits the matching result frame from the framer,
//! and only then picks up the next request, so every frame is unambiguously
//! paired with the command that produced it.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::artifacts::Artifacts;
use crate::compiler::framer::{CompilerOutput, ResultFramer};
use crate::compiler::queue::{RequestHandler, RequestQueue};
use crate::compiler::target::TargetModel;
use crate::diagnostics::DiagnosticSink;
use crate::process::{ChildChannels, Spawner};
use crate::uri::{ensure_trailing_slash, path_from_file_uri, SourceUriMapper};
use crate::utils::DriverError;

/// Options fixed for the life of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub sdk_root: String,
    pub target: TargetModel,
    pub track_widget_creation: bool,
    pub packages_path: Option<String>,
    pub filesystem_roots: Vec<String>,
    pub filesystem_scheme: Option<String>,
    pub initialize_from_dill: Option<String>,
    pub unsafe_package_serialization: bool,
    pub experimental_flags: Vec<String>,
}

/// One recompile. The first request of a session is the cold compile: it
/// must carry the entry point, and its invalidated list is ignored by the
/// server.
#[derive(Debug, Clone, Default)]
pub struct RecompileRequest {
    pub main_path: Option<String>,
    pub invalidated_files: Vec<String>,
    pub output_path: Option<String>,
    pub packages_path: Option<String>,
}

/// Evaluate an expression against the state of the last compile.
#[derive(Debug, Clone, Default)]
pub struct ExpressionRequest {
    pub expression: String,
    pub definitions: Vec<String>,
    pub type_definitions: Vec<String>,
    pub library_uri: Option<String>,
    pub class_name: Option<String>,
    pub is_static: Option<bool>,
}

enum Request {
    Recompile(RecompileRequest, oneshot::Sender<Option<CompilerOutput>>),
    CompileExpression(ExpressionRequest, oneshot::Sender<Option<CompilerOutput>>),
    Reject(oneshot::Sender<Option<CompilerOutput>>),
    Accept,
    Reset,
}

enum State {
    NotStarted,
    Running {
        stdin: Box<dyn AsyncWrite + Send + Unpin>,
        awaiting_confirmation: bool,
    },
    /// The child failed to start or its stdout closed mid-frame. Every
    /// subsequent request completes absent.
    Broken,
}

#[derive(Default)]
struct SessionControl {
    shut_down: AtomicBool,
    child: Mutex<ChildControl>,
}

#[derive(Default)]
struct ChildControl {
    kill: Option<oneshot::Sender<()>>,
    exit: Option<oneshot::Receiver<i32>>,
}

impl SessionControl {
    fn adopt(&self, kill: Option<oneshot::Sender<()>>, exit: oneshot::Receiver<i32>) {
        let mut child = self.child.lock().unwrap();
        child.kill = kill;
        child.exit = Some(exit);
    }
}

/// Long-lived driver for one frontend server process.
///
/// Requests may be submitted concurrently from any task; they execute one
/// at a time in arrival order. `shutdown` is the hard escape: it kills the
/// child (resolving a pending result as absent) and fails everything still
/// queued.
pub struct CompilerSession {
    queue: RequestQueue<Request>,
    control: Arc<SessionControl>,
}

impl CompilerSession {
    pub fn new(
        config: SessionConfig,
        artifacts: Arc<dyn Artifacts>,
        spawner: Arc<dyn Spawner>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let control = Arc::new(SessionControl::default());
        let worker = SessionWorker {
            framer: ResultFramer::new(Arc::clone(&sink)),
            config,
            artifacts,
            spawner,
            sink,
            control: Arc::clone(&control),
            state: State::NotStarted,
            entry_point: None,
        };
        Self { queue: RequestQueue::start(worker), control }
    }

    /// Compile, or recompile after invalidations. Absent output means the
    /// compile failed; the diagnostics went to the sink.
    pub async fn recompile(
        &self,
        request: RecompileRequest,
    ) -> Result<Option<CompilerOutput>, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Request::Recompile(request, tx))?;
        rx.await.map_err(|_| DriverError::SessionClosed)
    }

    /// Evaluate an expression. Absent before the first successful compile.
    pub async fn compile_expression(
        &self,
        request: ExpressionRequest,
    ) -> Result<Option<CompilerOutput>, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Request::CompileExpression(request, tx))?;
        rx.await.map_err(|_| DriverError::SessionClosed)
    }

    /// Discard the pending compile's state. Completes absent immediately
    /// when no compile awaited confirmation.
    pub async fn reject(&self) -> Result<Option<CompilerOutput>, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Request::Reject(tx))?;
        rx.await.map_err(|_| DriverError::SessionClosed)
    }

    /// Adopt the pending compile's state. Fire and forget.
    pub fn accept(&self) {
        let _ = self.queue.submit(Request::Accept);
    }

    /// Have the server treat the next recompile as from scratch.
    pub fn reset(&self) {
        let _ = self.queue.submit(Request::Reset);
    }

    /// Kill the child and fail everything still queued. Returns the exit
    /// code when the child reported one, -1 otherwise.
    pub async fn shutdown(&self) -> i32 {
        self.control.shut_down.store(true, Ordering::SeqCst);
        let (kill, exit) = {
            let mut child = self.control.child.lock().unwrap();
            (child.kill.take(), child.exit.take())
        };
        if let Some(kill) = kill {
            let _ = kill.send(());
        }
        match exit {
            Some(exit) => exit.await.unwrap_or(-1),
            None => -1,
        }
    }

    fn submit(&self, request: Request) -> Result<(), DriverError> {
        if self.control.shut_down.load(Ordering::SeqCst) {
            return Err(DriverError::SessionClosed);
        }
        if !self.queue.submit(request) {
            return Err(DriverError::SessionClosed);
        }
        Ok(())
    }
}

struct SessionWorker {
    config: SessionConfig,
    artifacts: Arc<dyn Artifacts>,
    spawner: Arc<dyn Spawner>,
    sink: Arc<dyn DiagnosticSink>,
    framer: ResultFramer,
    control: Arc<SessionControl>,
    state: State,
    /// Entry point of the cold compile; the mapper's script path for
    /// requests that do not carry their own.
    entry_point: Option<String>,
}

impl RequestHandler<Request> for SessionWorker {
    async fn handle(&mut self, request: Request) {
        if self.control.shut_down.load(Ordering::SeqCst) {
            // Dropping the completion surfaces SessionClosed to the caller.
            return;
        }
        if self.framer.is_closed() && matches!(self.state, State::Running { .. }) {
            tracing::warn!("frontend server stdout closed; session is unusable");
            self.state = State::Broken;
        }
        match request {
            Request::Recompile(request, done) => {
                let output = self.recompile(request).await;
                let _ = done.send(output);
            }
            Request::CompileExpression(request, done) => {
                let output = self.compile_expression(request).await;
                let _ = done.send(output);
            }
            Request::Reject(done) => {
                let output = self.reject().await;
                let _ = done.send(output);
            }
            Request::Accept => self.accept().await,
            Request::Reset => self.reset().await,
        }
    }
}

impl SessionWorker {
    async fn recompile(&mut self, request: RecompileRequest) -> Option<CompilerOutput> {
        if matches!(self.state, State::Broken) {
            tracing::warn!("recompile on an unusable session");
            return None;
        }
        if matches!(self.state, State::NotStarted) {
            self.cold_compile(request).await
        } else {
            self.incremental_compile(request).await
        }
    }

    async fn cold_compile(&mut self, request: RecompileRequest) -> Option<CompilerOutput> {
        let Some(main_path) = request.main_path.clone() else {
            tracing::warn!("cold compile requires an entry point");
            return None;
        };

        let binary = self.artifacts.compiler_binary();
        let args = self.cold_args(&request);
        let receiver = self.framer.reset(false);

        tracing::debug!("starting frontend server: {} {args:?}", binary.display());
        let child = match self.spawner.spawn(&binary, &args) {
            Ok(child) => child,
            Err(err) => {
                self.sink.line(&format!("Failed to start frontend server: {err}"));
                self.state = State::Broken;
                return None;
            }
        };

        let ChildChannels { stdin, stdout, stderr, exit, kill } = child;
        self.control.adopt(kill, exit);
        self.pump_stdout(stdout);
        self.pump_stderr(stderr);

        let mapper = self.mapper_for(request.packages_path.as_deref(), &main_path);
        let script_uri = self.map_filename(&main_path, mapper.as_ref());
        self.entry_point = Some(main_path);
        self.state = State::Running { stdin, awaiting_confirmation: true };

        self.write_command(format!("compile {script_uri}\n")).await?;
        receiver.await.unwrap_or(None)
    }

    async fn incremental_compile(&mut self, request: RecompileRequest) -> Option<CompilerOutput> {
        if let State::Running { awaiting_confirmation, .. } = &mut self.state {
            *awaiting_confirmation = true;
        }
        let receiver = self.framer.reset(false);

        let script_path = request.main_path.clone().or_else(|| self.entry_point.clone());
        let mapper = script_path
            .as_deref()
            .and_then(|script| self.mapper_for(request.packages_path.as_deref(), script));

        let boundary_key = Uuid::new_v4().to_string();
        let mut command = match &request.main_path {
            Some(main) => {
                let main_uri = self.map_filename(main, mapper.as_ref());
                format!("recompile {main_uri} {boundary_key}\n")
            }
            None => format!("recompile {boundary_key}\n"),
        };
        for file in &request.invalidated_files {
            command.push_str(&self.map_file_entry(file, mapper.as_ref()));
            command.push('\n');
        }
        command.push_str(&boundary_key);
        command.push('\n');

        self.write_command(command).await?;
        receiver.await.unwrap_or(None)
    }

    async fn compile_expression(&mut self, request: ExpressionRequest) -> Option<CompilerOutput> {
        if !matches!(self.state, State::Running { .. }) {
            // Expression evaluation needs the state of a previous compile.
            return None;
        }
        let receiver = self.framer.reset(true);

        let boundary_key = Uuid::new_v4().to_string();
        let mut command = format!("compile-expression {boundary_key}\n");
        command.push_str(&request.expression);
        command.push('\n');
        for definition in &request.definitions {
            command.push_str(definition);
            command.push('\n');
        }
        command.push_str(&boundary_key);
        command.push('\n');
        for type_definition in &request.type_definitions {
            command.push_str(type_definition);
            command.push('\n');
        }
        command.push_str(&boundary_key);
        command.push('\n');
        command.push_str(request.library_uri.as_deref().unwrap_or(""));
        command.push('\n');
        command.push_str(request.class_name.as_deref().unwrap_or(""));
        command.push('\n');
        // An absent flag goes on the wire as the literal false.
        command.push_str(&request.is_static.map_or("false".to_string(), |flag| flag.to_string()));
        command.push('\n');

        self.write_command(command).await?;
        receiver.await.unwrap_or(None)
    }

    async fn reject(&mut self) -> Option<CompilerOutput> {
        let State::Running { awaiting_confirmation, .. } = &mut self.state else {
            return None;
        };
        if !*awaiting_confirmation {
            return None;
        }
        *awaiting_confirmation = false;

        let receiver = self.framer.reset(false);
        self.write_command("reject\n".to_string()).await?;
        receiver.await.unwrap_or(None)
    }

    async fn accept(&mut self) {
        let State::Running { awaiting_confirmation, .. } = &mut self.state else {
            return;
        };
        if !*awaiting_confirmation {
            return;
        }
        *awaiting_confirmation = false;
        let _ = self.write_command("accept\n".to_string()).await;
    }

    async fn reset(&mut self) {
        if matches!(self.state, State::Running { .. }) {
            let _ = self.write_command("reset\n".to_string()).await;
        }
    }

    /// Write one command to the child's stdin. A write failure breaks the
    /// session.
    async fn write_command(&mut self, text: String) -> Option<()> {
        let State::Running { stdin, .. } = &mut self.state else {
            return None;
        };
        let write = async {
            stdin.write_all(text.as_bytes()).await?;
            stdin.flush().await
        };
        if let Err(err) = write.await {
            tracing::error!("writing to frontend server failed: {err}");
            self.state = State::Broken;
            return None;
        }
        Some(())
    }

    fn pump_stdout(&self, mut stdout: mpsc::UnboundedReceiver<String>) {
        let framer = self.framer.clone();
        tokio::spawn(async move {
            while let Some(line) = stdout.recv().await {
                framer.handle_line(&line);
            }
            framer.finish();
        });
    }

    fn pump_stderr(&self, mut stderr: mpsc::UnboundedReceiver<String>) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            while let Some(line) = stderr.recv().await {
                sink.line(&line);
            }
        });
    }

    fn mapper_for(
        &self,
        request_packages: Option<&str>,
        script_path: &str,
    ) -> Option<SourceUriMapper> {
        let packages = request_packages.or(self.config.packages_path.as_deref())?;
        Some(SourceUriMapper::from_packages_file(
            script_path,
            Path::new(packages),
            self.config.filesystem_scheme.as_deref(),
            &self.config.filesystem_roots,
        ))
    }

    fn map_filename(&self, path: &str, mapper: Option<&SourceUriMapper>) -> String {
        self.map_to_uri(path, mapper).unwrap_or_else(|| path.to_string())
    }

    /// Map one invalidated-file entry. `file:` URIs are decoded to a path
    /// first; when decoding fails the entry passes through unchanged.
    fn map_file_entry(&self, entry: &str, mapper: Option<&SourceUriMapper>) -> String {
        if entry.starts_with("file:") {
            match path_from_file_uri(entry) {
                Some(path) => {
                    self.map_to_uri(&path, mapper).unwrap_or_else(|| entry.to_string())
                }
                None => entry.to_string(),
            }
        } else {
            self.map_to_uri(entry, mapper).unwrap_or_else(|| entry.to_string())
        }
    }

    fn map_to_uri(&self, path: &str, mapper: Option<&SourceUriMapper>) -> Option<String> {
        if let Some(uri) = mapper.and_then(|mapper| mapper.map(path)) {
            return Some(uri);
        }
        let scheme = self.config.filesystem_scheme.as_deref()?;
        for root in &self.config.filesystem_roots {
            if let Some(suffix) = path.strip_prefix(root.as_str()) {
                return Some(format!("{scheme}:/{}", suffix.trim_start_matches('/')));
            }
        }
        None
    }

    fn cold_args(&self, request: &RecompileRequest) -> Vec<String> {
        let config = &self.config;
        let mut args = vec![
            self.artifacts.frontend_snapshot().to_string_lossy().into_owned(),
            "--sdk-root".to_string(),
            ensure_trailing_slash(&config.sdk_root),
            "--incremental".to_string(),
            "--strong".to_string(),
            format!("--target={}", config.target),
        ];
        if config.track_widget_creation {
            args.push("--track-widget-creation".to_string());
        }
        for root in &config.filesystem_roots {
            args.push("--filesystem-root".to_string());
            args.push(root.clone());
        }
        if let Some(scheme) = &config.filesystem_scheme {
            args.push("--filesystem-scheme".to_string());
            args.push(scheme.clone());
        }
        if let Some(dill) = &config.initialize_from_dill {
            args.push("--initialize-from-dill".to_string());
            args.push(dill.clone());
        }
        if let Some(output) = &request.output_path {
            args.push("--output-dill".to_string());
            args.push(output.clone());
        }
        // TODO: drop the duplicate --packages once the server's precedence
        // between a request-scoped and a session-scoped map is confirmed.
        if let Some(packages) = &request.packages_path {
            args.push("--packages".to_string());
            args.push(packages.clone());
        }
        if let Some(packages) = &config.packages_path {
            args.push("--packages".to_string());
            args.push(packages.clone());
        }
        if config.unsafe_package_serialization {
            args.push("--unsafe-package-serialization".to_string());
        }
        if !config.experimental_flags.is_empty() {
            args.push(format!("--enable-experiment={}", config.experimental_flags.join(",")));
        }
        args
    }
}
