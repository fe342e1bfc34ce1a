//! Shared fakes: a scripted frontend server and artifact fixtures.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader, DuplexStream};
use tokio::sync::{mpsc, oneshot};

use kernelc::artifacts::Artifacts;
use kernelc::process::{ChildChannels, Spawner};

/// What a scripted child does once spawned.
#[derive(Clone)]
#[allow(dead_code)]
pub enum ChildScript {
    /// Answer every command with a complete result frame.
    Echo { output_path: String, error_count: u32 },

    /// Write fixed stdout/stderr lines, then exit with the given code.
    Lines { stdout: Vec<String>, stderr: Vec<String>, exit_code: i32 },

    /// Read one command, open a frame, and close stdout without
    /// terminating it.
    CloseMidFrame,
}

/// Spawner that records every spawn and runs a [`ChildScript`] instead of
/// a real process.
pub struct ScriptedSpawner {
    script: ChildScript,
    calls: Arc<Mutex<Vec<(PathBuf, Vec<String>)>>>,
    stdin_lines: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSpawner {
    pub fn new(script: ChildScript) -> Self {
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
            stdin_lines: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every (program, args) pair this spawner was asked to start.
    pub fn calls(&self) -> Arc<Mutex<Vec<(PathBuf, Vec<String>)>>> {
        Arc::clone(&self.calls)
    }

    /// Every line the driver wrote to a child's stdin, across spawns.
    pub fn transcript(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.stdin_lines)
    }
}

impl Spawner for ScriptedSpawner {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<ChildChannels> {
        self.calls.lock().unwrap().push((program.to_path_buf(), args.to_vec()));

        let (driver_stdin, child_stdin) = tokio::io::duplex(64 * 1024);
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        tokio::spawn(run_child(
            self.script.clone(),
            child_stdin,
            stdout_tx,
            stderr_tx,
            exit_tx,
            kill_rx,
            Arc::clone(&self.stdin_lines),
        ));

        Ok(ChildChannels {
            stdin: Box::new(driver_stdin),
            stdout: stdout_rx,
            stderr: stderr_rx,
            exit: exit_rx,
            kill: Some(kill_tx),
        })
    }
}

async fn run_child(
    script: ChildScript,
    stdin: DuplexStream,
    stdout: mpsc::UnboundedSender<String>,
    stderr: mpsc::UnboundedSender<String>,
    exit: oneshot::Sender<i32>,
    mut kill: oneshot::Receiver<()>,
    transcript: Arc<Mutex<Vec<String>>>,
) {
    match script {
        ChildScript::Lines { stdout: out_lines, stderr: err_lines, exit_code } => {
            for line in out_lines {
                let _ = stdout.send(line);
            }
            for line in err_lines {
                let _ = stderr.send(line);
            }
            drop(stdout);
            drop(stderr);
            let _ = exit.send(exit_code);
        }
        ChildScript::CloseMidFrame => {
            let mut lines = BufReader::new(stdin).lines();
            if let Ok(Some(line)) = lines.next_line().await {
                transcript.lock().unwrap().push(line);
            }
            let _ = stdout.send("result BBB".to_string());
            drop(stdout);
            let _ = (&mut kill).await;
            let _ = exit.send(-1);
        }
        ChildScript::Echo { output_path, error_count } => {
            let mut lines = BufReader::new(stdin).lines();
            let mut frame = 0u32;
            let code = loop {
                let line = tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => line,
                        _ => break 0,
                    },
                    _ = &mut kill => break -1,
                };
                transcript.lock().unwrap().push(line.clone());

                match line.split(' ').next().unwrap_or("") {
                    "compile" => {
                        frame += 1;
                        respond(&stdout, &format!("child-key-{frame}"), &output_path, error_count);
                    }
                    "recompile" => {
                        let key = line.rsplit(' ').next().unwrap_or("").to_string();
                        while let Ok(Some(entry)) = lines.next_line().await {
                            transcript.lock().unwrap().push(entry.clone());
                            if entry == key {
                                break;
                            }
                        }
                        respond(&stdout, &key, &output_path, error_count);
                    }
                    "compile-expression" => {
                        let key = line.rsplit(' ').next().unwrap_or("").to_string();
                        let mut separators = 0;
                        let mut tail = 0;
                        while let Ok(Some(entry)) = lines.next_line().await {
                            transcript.lock().unwrap().push(entry.clone());
                            if separators < 2 {
                                if entry == key {
                                    separators += 1;
                                }
                            } else {
                                tail += 1;
                                if tail == 3 {
                                    break;
                                }
                            }
                        }
                        respond(&stdout, &key, &output_path, error_count);
                    }
                    "reject" => {
                        frame += 1;
                        let key = format!("child-key-{frame}");
                        let _ = stdout.send(format!("result {key}"));
                        let _ = stdout.send(key);
                    }
                    _ => {} // accept / reset take no response
                }
            };
            let _ = exit.send(code);
        }
    }
}

fn respond(stdout: &mpsc::UnboundedSender<String>, key: &str, path: &str, errors: u32) {
    let _ = stdout.send(format!("result {key}"));
    let _ = stdout.send(format!("{key} {path} {errors}"));
}

/// Artifacts pointing at fixed paths, with a helper that makes the binary
/// genuinely runnable so the batch driver's check passes.
pub struct FixedArtifacts {
    pub binary: PathBuf,
    pub snapshot: PathBuf,
}

impl Artifacts for FixedArtifacts {
    fn compiler_binary(&self) -> PathBuf {
        self.binary.clone()
    }

    fn frontend_snapshot(&self) -> PathBuf {
        self.snapshot.clone()
    }
}

/// Create a runnable fake compiler binary inside `dir`.
#[allow(dead_code)]
pub fn runnable_artifacts(dir: &Path) -> FixedArtifacts {
    let binary = dir.join("dart");
    std::fs::write(&binary, "#!/bin/sh\nexit 0\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    FixedArtifacts { binary, snapshot: dir.join("frontend_server.dart.snapshot") }
}
