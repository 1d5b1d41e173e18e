use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use tracing::{error, trace};

use crate::host::{CommandSink, DebugHost, ExitHook, ExitHookToken, HostCommand};

/// GDB console syntax for a command.
pub fn wire_syntax(command: &HostCommand) -> String {
    match command {
        HostCommand::Connect(endpoint) => format!("target remote {endpoint}"),
        HostCommand::LoadSymbols(path) => format!("file {}", path.display()),
        HostCommand::SetBreakpoint(symbol) => format!("break {symbol}"),
        HostCommand::Continue => "continue".to_string(),
        HostCommand::TerminateRemote => "kill".to_string(),
    }
}

/// Whether a console output line marks the end of the debugging session.
///
/// GDB emits no single machine-readable end-of-session record on its console
/// stream; these markers cover inferior exit and a dropped remote. End of
/// stream is handled separately by the reader.
pub fn is_session_exit_line(line: &str) -> bool {
    (line.starts_with("[Inferior") && line.contains("exited"))
        || line.starts_with("Remote connection closed")
}

type SharedHooks = Arc<Mutex<Vec<(ExitHookToken, ExitHook)>>>;

/// Sink over the host's stdin, shared between normal command execution and
/// hook dispatch on the reader thread.
struct GdbCommandSink {
    stdin: Arc<Mutex<ChildStdin>>,
}

impl CommandSink for GdbCommandSink {
    fn issue(&mut self, command: HostCommand) -> Result<()> {
        let line = wire_syntax(&command);
        trace!(%command, wire = %line, "issuing command to gdb");
        let mut stdin = self
            .stdin
            .lock()
            .map_err(|_| anyhow!("gdb stdin lock poisoned"))?;
        writeln!(stdin, "{line}")?;
        stdin.flush()?;
        Ok(())
    }
}

/// Exit-event dispatch state for the stdout reader thread.
struct ExitDispatch {
    hooks: SharedHooks,
    stdin: Arc<Mutex<ChildStdin>>,
}

impl ExitDispatch {
    fn fire(&self) {
        trace!("session exit event, dispatching exit hooks");
        let mut sink = GdbCommandSink {
            stdin: Arc::clone(&self.stdin),
        };
        let mut hooks = self.hooks.lock().expect("exit hook registry poisoned");
        for (_, hook) in hooks.iter_mut() {
            hook(&mut sink);
        }
    }
}

/// A debugger host backed by a spawned `gdb` process with piped stdio.
///
/// Commands are rendered to GDB console syntax and written to the child's
/// stdin. Output lines from the child are forwarded over a channel for the
/// caller to display; the stdout reader also watches for session-exit
/// markers and dispatches registered exit hooks.
pub struct GdbHost {
    child: Child,
    stdin: Arc<Mutex<ChildStdin>>,
    hooks: SharedHooks,
    stdout_thread: Option<JoinHandle<()>>,
    stderr_thread: Option<JoinHandle<()>>,
}

impl GdbHost {
    pub fn spawn(gdb: &Path, output_tx: Sender<String>) -> Result<Self> {
        trace!("spawning gdb host {:?}", gdb);
        let mut child = Command::new(gdb)
            .args(["--nx", "--quiet"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("gdb child has no stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("gdb child has no stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("gdb child has no stderr handle"))?;

        let stdin = Arc::new(Mutex::new(stdin));
        let hooks: SharedHooks = Arc::new(Mutex::new(Vec::new()));

        let dispatch = ExitDispatch {
            hooks: Arc::clone(&hooks),
            stdin: Arc::clone(&stdin),
        };
        let stdout_tx = output_tx.clone();
        let stdout_thread = thread::spawn(move || {
            read_host_output(stdout, stdout_tx, Some(dispatch));
        });
        let stderr_thread = thread::spawn(move || {
            read_host_output(stderr, output_tx, None);
        });

        Ok(GdbHost {
            child,
            stdin,
            hooks,
            stdout_thread: Some(stdout_thread),
            stderr_thread: Some(stderr_thread),
        })
    }

    /// Pass a raw command line through to the host untranslated.
    pub fn send_line(&mut self, line: &str) -> Result<()> {
        let mut stdin = self
            .stdin
            .lock()
            .map_err(|_| anyhow!("gdb stdin lock poisoned"))?;
        writeln!(stdin, "{line}")?;
        stdin.flush()?;
        Ok(())
    }

    /// Block until the host process exits, then join the reader threads.
    pub fn wait(&mut self) -> Result<()> {
        let status = self.child.wait()?;
        trace!(?status, "gdb host exited");
        for handle in [self.stdout_thread.take(), self.stderr_thread.take()]
            .into_iter()
            .flatten()
        {
            let _ = handle.join();
        }
        Ok(())
    }
}

impl DebugHost for GdbHost {
    fn execute(&mut self, command: HostCommand) -> Result<()> {
        GdbCommandSink {
            stdin: Arc::clone(&self.stdin),
        }
        .issue(command)
    }

    fn subscribe_session_exit(&mut self, hook: ExitHook) -> ExitHookToken {
        let token = ExitHookToken::next();
        self.hooks
            .lock()
            .expect("exit hook registry poisoned")
            .push((token, hook));
        token
    }

    fn unsubscribe_session_exit(&mut self, token: ExitHookToken) {
        self.hooks
            .lock()
            .expect("exit hook registry poisoned")
            .retain(|(t, _)| *t != token);
    }
}

impl Drop for GdbHost {
    fn drop(&mut self) {
        // Reap the child if wait() was never reached; EOF unblocks the readers.
        let _ = self.child.kill();
        let _ = self.child.wait();
        for handle in [self.stdout_thread.take(), self.stderr_thread.take()]
            .into_iter()
            .flatten()
        {
            let _ = handle.join();
        }
    }
}

fn read_host_output<R: Read>(reader: R, tx: Sender<String>, exit_dispatch: Option<ExitDispatch>) {
    let reader = BufReader::new(reader);
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("error reading gdb output: {:?}", e);
                break;
            }
        };

        if let Some(dispatch) = &exit_dispatch
            && is_session_exit_line(&line)
        {
            dispatch.fire();
        }

        if tx.send(line).is_err() {
            trace!("host output receiver dropped, stopping reader");
            return;
        }
    }

    // End of stream means the host itself is gone.
    if let Some(dispatch) = &exit_dispatch {
        dispatch.fire();
    }
}
