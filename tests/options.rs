use std::path::PathBuf;

use clap::Parser;
use kdb::host::RemoteEndpoint;
use kdb::options::Options;
use kdb::session::{BreakpointFailurePolicy, SessionConfig};

/// A bare `kdb` invocation reproduces the original fixed-constant deployment.
#[test]
fn defaults_match_the_qemu_kernel_deployment() {
    let options = Options::parse_from(["kdb"]);
    let config = options
        .session_config()
        .expect("default options should produce a valid config");

    assert_eq!(config.remote.to_string(), "localhost:1234");
    assert_eq!(
        config.symbol_file,
        PathBuf::from("./build/kernel-x86_64-qemu.elf")
    );
    assert_eq!(config.entry_symbol, "os_run");
    assert_eq!(
        config.on_breakpoint_failure,
        BreakpointFailurePolicy::RunAnyway
    );
}

#[test]
fn abort_flag_selects_the_abort_policy() {
    let options = Options::parse_from(["kdb", "--abort-on-breakpoint-failure"]);
    let config = options.session_config().expect("config should build");
    assert_eq!(config.on_breakpoint_failure, BreakpointFailurePolicy::Abort);
}

#[test]
fn endpoint_parsing_rejects_malformed_addresses() {
    assert!("localhost:1234".parse::<RemoteEndpoint>().is_ok());
    assert!("10.0.0.7:9000".parse::<RemoteEndpoint>().is_ok());

    assert!("localhost".parse::<RemoteEndpoint>().is_err());
    assert!(":1234".parse::<RemoteEndpoint>().is_err());
    assert!("localhost:notaport".parse::<RemoteEndpoint>().is_err());
    assert!("localhost:99999".parse::<RemoteEndpoint>().is_err());
}

#[test]
fn config_rejects_malformed_entry_symbols() {
    let endpoint = "localhost:1234"
        .parse::<RemoteEndpoint>()
        .expect("endpoint should parse");
    let path = PathBuf::from("./build/kernel-x86_64-qemu.elf");

    assert!(
        SessionConfig::new(
            endpoint.clone(),
            path.clone(),
            "",
            BreakpointFailurePolicy::RunAnyway
        )
        .is_err()
    );
    assert!(
        SessionConfig::new(
            endpoint,
            path,
            "os run",
            BreakpointFailurePolicy::RunAnyway
        )
        .is_err()
    );
}
