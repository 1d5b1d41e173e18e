use std::io::{self, BufRead};
use std::{env, fs, thread};

use anyhow::Result;
use clap::Parser;
use crossbeam_channel::{Receiver, select, unbounded};
use kdb::{host::gdb::GdbHost, options::Options, session::SessionController};
use tracing::trace;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let options = Options::parse();
    options.validate()?;
    let config = options.session_config()?;

    let _log_guard = init_logging();

    let (output_tx, output_rx) = unbounded();
    let mut host = GdbHost::spawn(&options.gdb, output_tx)?;

    let mut controller = SessionController::new(config);
    controller.initialize_and_run(&mut host)?;

    // The session is set up and the target is running; from here on, relay
    // host output to the terminal and terminal lines to the host until the
    // host goes away. The exit hook fires inside the host's own dispatch.
    let input_rx = spawn_terminal_reader();
    loop {
        select! {
            recv(output_rx) -> line => match line {
                Ok(line) => println!("{line}"),
                // host output closed, session is over
                Err(_) => break,
            },
            recv(input_rx) -> line => match line {
                Ok(line) => {
                    if host.send_line(&line).is_err() {
                        break;
                    }
                }
                Err(_) => {
                    // Terminal EOF: ask the host to wind down.
                    trace!("terminal input closed, sending quit to host");
                    let _ = host.send_line("quit");
                    break;
                }
            },
        }
    }

    // Keep draining host output until it actually exits.
    for line in output_rx {
        println!("{line}");
    }

    host.wait()
}

fn spawn_terminal_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Log to a file under the user cache dir; stdout belongs to the host relay.
fn init_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = dirs::cache_dir().unwrap_or_else(env::temp_dir).join("kdb");
    let _ = fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::never(log_dir, "kdb.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}
