//! Parsing of result frames from the frontend server's stdout.
//!
//! The server brackets each result in a frame: a line `result <key>` opens
//! it, and a later line beginning with `<key>` closes it. The bare key
//! means the compile produced nothing; `<key> <path> <count>` carries the
//! output file and the error count. Every other line inside or outside a
//! frame is a compiler diagnostic.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::diagnostics::DiagnosticSink;

const RESULT_PREFIX: &str = "result ";

/// One committed compile result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOutput {
    pub output_path: String,
    pub error_count: u32,
}

/// Receives the next framed result. Resolves with `None` when the frame
/// reports no output or the stream ends mid-frame.
pub type OutputReceiver = oneshot::Receiver<Option<CompilerOutput>>;

struct FramerState {
    boundary_key: Option<String>,
    suppress_messages: bool,
    message_seen: bool,
    pending: Option<oneshot::Sender<Option<CompilerOutput>>>,
    closed: bool,
}

/// Splits the child's stdout line stream into diagnostics and framed
/// results.
///
/// `reset` must be called before each command the driver issues; the
/// receiver it returns resolves with that command's result. Lines arrive
/// from a reader task via [`handle_line`], and [`finish`] marks stdout
/// closed, resolving any pending result as absent.
///
/// [`handle_line`]: ResultFramer::handle_line
/// [`finish`]: ResultFramer::finish
#[derive(Clone)]
pub struct ResultFramer {
    state: Arc<Mutex<FramerState>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ResultFramer {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FramerState {
                boundary_key: None,
                suppress_messages: false,
                message_seen: false,
                pending: None,
                closed: false,
            })),
            sink,
        }
    }

    /// Arm the framer for the next command. With `suppress_messages` set,
    /// diagnostics inside the frame are dropped instead of forwarded.
    pub fn reset(&self, suppress_messages: bool) -> OutputReceiver {
        let (tx, rx) = oneshot::channel();
        let mut state = self.state.lock().unwrap();
        state.boundary_key = None;
        state.message_seen = false;
        state.suppress_messages = suppress_messages;
        state.pending = Some(tx);
        rx
    }

    pub fn handle_line(&self, line: &str) {
        let mut state = self.state.lock().unwrap();
        if state.boundary_key.is_none() {
            if let Some(key) = line.strip_prefix(RESULT_PREFIX) {
                state.boundary_key = Some(key.to_string());
                return;
            }
        } else {
            let matched = state
                .boundary_key
                .as_deref()
                .filter(|key| line.starts_with(key))
                .map(str::len);
            if let Some(key_len) = matched {
                let result = parse_result_suffix(line, key_len);
                if result.is_none() && line.len() > key_len {
                    tracing::warn!("unparsable result line from compiler: {line}");
                }
                complete(&mut state, result);
                return;
            }
        }

        if state.suppress_messages {
            return;
        }
        if !state.message_seen {
            state.message_seen = true;
            self.sink.emphasized("\nCompiler message:");
        }
        self.sink.line(line);
    }

    /// Stdout reached EOF. An unresolved pending result completes absent;
    /// the framer refuses further frames.
    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        complete(&mut state, None);
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

fn complete(state: &mut FramerState, result: Option<CompilerOutput>) {
    if let Some(tx) = state.pending.take() {
        let _ = tx.send(result);
    }
}

/// Parse the terminator's ` <path> <count>` suffix. The split is at the
/// last space so the path may itself contain spaces.
fn parse_result_suffix(line: &str, key_len: usize) -> Option<CompilerOutput> {
    let suffix = line.get(key_len + 1..)?;
    let (output_path, count) = suffix.rsplit_once(' ')?;
    let error_count = count.parse().ok()?;
    Some(CompilerOutput { output_path: output_path.to_string(), error_count })
}
