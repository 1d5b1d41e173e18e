use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicI32, Ordering};

use anyhow::{Error, Result, anyhow};

pub mod gdb;

/// Network address of the remote debug stub, as `host:port`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteEndpoint {
    host: String,
    port: u16,
}

impl RemoteEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into();
        if host.is_empty() {
            return Err(anyhow!("remote host must not be empty"));
        }
        Ok(Self { host, port })
    }
}

impl FromStr for RemoteEndpoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("expected host:port, got {:?}", s))?;
        let port = port.parse::<u16>()?;
        RemoteEndpoint::new(host, port)
    }
}

impl fmt::Display for RemoteEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The commands this driver issues against the debugger host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostCommand {
    /// Attach the host to the remote debug stub.
    Connect(RemoteEndpoint),
    /// Load debug symbols from a local file.
    LoadSymbols(PathBuf),
    /// Install an execution breakpoint on a symbol.
    SetBreakpoint(String),
    Continue,
    /// Kill the attached remote target.
    TerminateRemote,
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostCommand::Connect(endpoint) => write!(f, "connect {}", endpoint),
            HostCommand::LoadSymbols(path) => write!(f, "load-symbols {}", path.display()),
            HostCommand::SetBreakpoint(symbol) => write!(f, "set-breakpoint {}", symbol),
            HostCommand::Continue => write!(f, "continue"),
            HostCommand::TerminateRemote => write!(f, "terminate-remote"),
        }
    }
}

// Simple global ID generator; relaxed ordering is sufficient for a monotonic counter.
static NEXT_ID: AtomicI32 = AtomicI32::new(1);

/// Handle to one exit-hook subscription, used to unsubscribe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExitHookToken {
    id: i32,
}

impl ExitHookToken {
    /// Mint a fresh token; hosts call this when registering a hook.
    pub fn next() -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        ExitHookToken { id }
    }
}

/// Callback invoked by the host when the debugging session ends.
pub type ExitHook = Box<dyn FnMut(&mut dyn CommandSink) + Send>;

/// Write side of a host's command interface, handed to exit hooks so they
/// can issue commands from inside the host's own event dispatch.
pub trait CommandSink {
    fn issue(&mut self, command: HostCommand) -> Result<()>;
}

/// An external debugger host: executes commands synchronously and emits a
/// session-exited event hooks can subscribe to.
///
/// The host owns all session state; this driver only issues commands against
/// it and listens for the end of the session.
pub trait DebugHost {
    /// Issue a single command and wait for the host to accept it.
    fn execute(&mut self, command: HostCommand) -> Result<()>;

    /// Subscribe a hook to the host's session-exited event. The hook fires
    /// once per exit event until unsubscribed.
    fn subscribe_session_exit(&mut self, hook: ExitHook) -> ExitHookToken;

    /// Remove a previously registered hook. Unknown tokens are ignored.
    fn unsubscribe_session_exit(&mut self, token: ExitHookToken);
}
