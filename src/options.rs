use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Parser;

use crate::host::RemoteEndpoint;
use crate::session::{BreakpointFailurePolicy, SessionConfig};

#[derive(Clone, Debug, Parser)]
#[command(version, about = "KDB (kernel debug session driver)")]
pub struct Options {
    /// Remote debug stub to attach to, as host:port.
    #[arg(long = "remote", default_value = "localhost:1234")]
    pub remote: String,

    /// Symbol file matching the code running on the remote target.
    #[arg(long = "symbols", default_value = "./build/kernel-x86_64-qemu.elf")]
    pub symbol_file: PathBuf,

    /// Symbol the entry breakpoint is installed on.
    #[arg(long = "entry", default_value = "os_run")]
    pub entry_symbol: String,

    /// Surface a failed breakpoint install instead of resuming without it.
    #[arg(long = "abort-on-breakpoint-failure")]
    pub abort_on_breakpoint_failure: bool,

    /// Path to the gdb executable that hosts the session.
    #[arg(long = "gdb", default_value = "gdb")]
    pub gdb: PathBuf,
}

impl Options {
    /// Checks that only make sense against the local filesystem; the rest is
    /// validated when the `SessionConfig` is built.
    pub fn validate(&self) -> Result<()> {
        if !self.symbol_file.is_file() {
            return Err(anyhow!("symbol file not found: {:?}", self.symbol_file));
        }
        Ok(())
    }

    pub fn session_config(&self) -> Result<SessionConfig> {
        let remote = self.remote.parse::<RemoteEndpoint>()?;
        let on_breakpoint_failure = if self.abort_on_breakpoint_failure {
            BreakpointFailurePolicy::Abort
        } else {
            BreakpointFailurePolicy::RunAnyway
        };

        SessionConfig::new(
            remote,
            self.symbol_file.clone(),
            self.entry_symbol.clone(),
            on_breakpoint_failure,
        )
    }
}
