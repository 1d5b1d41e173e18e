use std::path::PathBuf;

use anyhow::{Result, anyhow};
use strum::Display;
use tracing::{trace, warn};

use crate::host::{CommandSink, DebugHost, ExitHookToken, HostCommand, RemoteEndpoint};

/// Lifecycle of one debugging session. Transitions run strictly forward;
/// there is no recovery path back to an earlier state.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum SessionState {
    /// No commands issued against the host yet.
    NotConnected,
    Connected,
    SymbolsLoaded,
    BreakpointArmed,
    Running,
}

/// What to do when the entry breakpoint cannot be installed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum BreakpointFailurePolicy {
    /// Resume the target anyway; the session runs with no breakpoint armed.
    #[default]
    RunAnyway,
    /// Surface the failure and leave the target stopped.
    Abort,
}

/// Per-session configuration, validated once at startup and passed into the
/// controller by value.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub remote: RemoteEndpoint,
    pub symbol_file: PathBuf,
    pub entry_symbol: String,
    pub on_breakpoint_failure: BreakpointFailurePolicy,
}

impl SessionConfig {
    pub fn new(
        remote: RemoteEndpoint,
        symbol_file: PathBuf,
        entry_symbol: impl Into<String>,
        on_breakpoint_failure: BreakpointFailurePolicy,
    ) -> Result<Self> {
        let entry_symbol = entry_symbol.into();
        if entry_symbol.is_empty() {
            return Err(anyhow!("entry symbol must not be empty"));
        }
        if entry_symbol.chars().any(char::is_whitespace) {
            return Err(anyhow!(
                "entry symbol must be a single identifier: {:?}",
                entry_symbol
            ));
        }

        Ok(Self {
            remote,
            symbol_file,
            entry_symbol,
            on_breakpoint_failure,
        })
    }
}

/// Drives the fixed session-setup sequence against a debugger host and holds
/// the token of the exit hook it registered.
pub struct SessionController {
    config: SessionConfig,
    state: SessionState,
    exit_hook: Option<ExitHookToken>,
}

impl SessionController {
    pub fn new(config: SessionConfig) -> Self {
        SessionController {
            config,
            state: SessionState::NotConnected,
            exit_hook: None,
        }
    }

    /// Run the setup sequence: register the exit hook, then connect, load
    /// symbols, arm the entry breakpoint, and resume the target.
    ///
    /// Step failures propagate unmodified and leave the session wherever it
    /// got to; there are no retries and no rollback. A failed breakpoint
    /// install is tolerated under [`BreakpointFailurePolicy::RunAnyway`].
    pub fn initialize_and_run(&mut self, host: &mut impl DebugHost) -> Result<()> {
        if self.state != SessionState::NotConnected {
            return Err(anyhow!("session already initialized (state {})", self.state));
        }

        // The hook must be in place before the first command reaches the
        // host, so registration precedes the connect.
        let token = host.subscribe_session_exit(Box::new(|sink| {
            // The remote may already be gone; the command's failure is not observed.
            let _ = sink.issue(HostCommand::TerminateRemote);
        }));
        self.exit_hook = Some(token);

        host.execute(HostCommand::Connect(self.config.remote.clone()))?;
        self.transition(SessionState::Connected);

        host.execute(HostCommand::LoadSymbols(self.config.symbol_file.clone()))?;
        self.transition(SessionState::SymbolsLoaded);

        match host.execute(HostCommand::SetBreakpoint(self.config.entry_symbol.clone())) {
            Ok(()) => self.transition(SessionState::BreakpointArmed),
            Err(e) => match self.config.on_breakpoint_failure {
                BreakpointFailurePolicy::RunAnyway => {
                    warn!(
                        symbol = %self.config.entry_symbol,
                        "breakpoint install failed, resuming without it: {:?}", e
                    );
                }
                BreakpointFailurePolicy::Abort => return Err(e),
            },
        }

        host.execute(HostCommand::Continue)?;
        self.transition(SessionState::Running);

        Ok(())
    }

    /// Remove the exit hook from the host. The remote target will no longer
    /// be killed when the session ends. The `kdb` binary never calls this
    /// (controller and host share a lifetime there); embedders whose
    /// controller is shorter-lived than the host use it between runs.
    pub fn detach_exit_hook(&mut self, host: &mut impl DebugHost) {
        if let Some(token) = self.exit_hook.take() {
            host.unsubscribe_session_exit(token);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn transition(&mut self, next: SessionState) {
        trace!(from = %self.state, to = %next, "session state transition");
        self.state = next;
    }
}
