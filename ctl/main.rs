#![forbid(unsafe_code)]

//! `wpdaemon-ctl` — local CLI companion for `wpdaemon`.
//!
//! Connects to the daemon's loopback control port and sends one
//! line-framed command per invocation.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "wpdaemon-ctl",
    about = "Local CLI for the wpdaemon supervisor",
    version,
    long_about = None
)]
struct Cli {
    /// Daemon host (loopback only on the server side).
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Daemon control port.
    #[arg(long, short, default_value_t = 23888)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a tunnel with the given configuration name.
    Up {
        /// Configuration name, with or without the `.conf` suffix.
        config: String,
    },

    /// Stop the running tunnel.
    Down,

    /// Show the current tunnel state.
    State,

    /// List available configuration names.
    Confs,

    /// Identify the daemon (version and implementation).
    Whoami,
}

fn main() {
    let args = Cli::parse();

    let command_line = match &args.command {
        Command::Up { config } => format!("spin_up:{config}\n"),
        Command::Down => "spin_down:\n".to_owned(),
        Command::State => "state:\n".to_owned(),
        Command::Confs => "available_confs:\n".to_owned(),
        Command::Whoami => "whoami:\n".to_owned(),
    };

    match send_command(&args.host, args.port, &command_line) {
        Ok(response) => {
            let error = response.get("error").filter(|e| !e.is_null());
            if let Some(err) = error.and_then(|e| e.as_str()) {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
            match response.get("result") {
                Some(result) if !result.is_null() => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(result).unwrap_or_default()
                    );
                }
                _ => println!("OK"),
            }
        }
        Err(err) => {
            eprintln!("Failed to reach wpdaemon at {}:{}: {err}", args.host, args.port);
            eprintln!("Is the daemon running?");
            std::process::exit(1);
        }
    }
}

/// Connect, send one command line, and read the single-line JSON reply.
fn send_command(
    host: &str,
    port: u16,
    command_line: &str,
) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect((host, port))?;
    stream.set_read_timeout(Some(Duration::from_secs(30)))?;

    stream.write_all(command_line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    Ok(response)
}
