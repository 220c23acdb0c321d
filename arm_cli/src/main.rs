//! # Arm Command Line
//!
//! Interactive console for the arm executable. Each line is parsed into a command, for example
//!
//! ```text
//! PF400 $ move safe1 --motion-profile-id 2
//! PF400 $ transfer hotel_3 reader
//! PF400 $ jog z -5
//! ```
//!
//! sent to the executable, and the response printed once the command has completed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use comms_if::{
    cmd::{ArmCmd, ArmResponse},
    net::{zmq, MonitoredSocket, NetParams, SocketOptions},
};
use rustyline::{error::ReadlineError, DefaultEditor};
use std::path::Path;
use structopt::StructOpt;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const PROMPT: &str = "PF400 $ ";

/// History file, relative to the software root.
const HISTORY_PATH: &str = "data/arm_cli_history.txt";

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let params: NetParams = match util::params::load("net.toml") {
        Ok(p) => p,
        Err(e) => {
            println!("Could not load net.toml ({}), using the default parameters", e);
            NetParams::default()
        }
    };

    let ctx = zmq::Context::new();
    let socket = MonitoredSocket::new(
        &ctx,
        zmq::REQ,
        SocketOptions {
            block_on_first_connect: false,
            req_correlate: true,
            req_relaxed: true,
            recv_timeout: params.cmd_timeout_ms,
            send_timeout: 1000,
            linger: 1,
            ..Default::default()
        },
        &params.cmd_endpoint,
    )
    .wrap_err("Failed to create the command socket")?;

    println!("Connected to {}, type \"help\" for the list of commands", params.cmd_endpoint);

    let history_path = util::params::resolve_path(HISTORY_PATH);
    let mut rl = DefaultEditor::new().map_err(|e| eyre!("Failed to create the editor: {}", e))?;
    if rl.load_history(&history_path).is_err() {
        println!("No history detected");
    }

    loop {
        let line = match rl.readline(PROMPT) {
            Ok(l) => l,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                println!("Unhandled Error: {:?}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        rl.add_history_entry(line).ok();

        if line == "exit" || line == "quit" {
            break;
        }

        let cmd = match parse(line) {
            Ok(c) => c,
            Err(e) => {
                // Also covers `help` and `<cmd> --help`
                println!("{}", e.message);
                continue;
            }
        };

        match send(&socket, &cmd) {
            Ok(r) => print_response(&r),
            Err(e) => println!("Error: {:#}", e),
        }
    }

    save_history(&mut rl, &history_path);
    println!("Exiting...");

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn parse(line: &str) -> std::result::Result<ArmCmd, structopt::clap::Error> {
    ArmCmd::from_iter_safe(std::iter::once("arm").chain(line.split_whitespace()))
}

fn send(socket: &MonitoredSocket, cmd: &ArmCmd) -> Result<ArmResponse> {
    let record = cmd.to_record().wrap_err("Could not serialize the command")?;

    socket
        .send_json(&record)
        .wrap_err("Could not send the command")?;
    socket
        .recv_json()
        .wrap_err("No valid response from the arm executable")
}

fn print_response(response: &ArmResponse) {
    match response {
        ArmResponse::Ok { payload: None } => println!("Ok"),
        ArmResponse::Ok { payload: Some(p) } => match serde_json::to_string_pretty(p) {
            Ok(s) => println!("{}", s),
            Err(_) => println!("{}", p),
        },
        ArmResponse::Invalid { message } => println!("Invalid command: {}", message),
        ArmResponse::Error { code, message } => println!("Error {}: {}", code, message),
    }
}

fn save_history(rl: &mut DefaultEditor, path: &Path) {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).ok();
    }

    if let Err(e) = rl.save_history(path) {
        println!("Could not save the history: {}", e);
    }
}
