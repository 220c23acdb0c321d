//! # Arm Executable
//!
//! Command server for a PF400 arm. The executable:
//!
//!     - Initialises the session and logging
//!     - Loads its parameters and the labware catalog
//!     - Configures the default workcell, if one is given
//!     - Main loop:
//!         - Receives a command from a client
//!         - Runs it to completion on the arm
//!         - Sends the response back

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use comms_if::{cmd::ArmResponse, net::zmq};
use log::{error, info, warn};

// Internal
use arm_lib::{
    arm_server::{ArmServer, ArmServerError},
    labware::{JsonLabwareCatalog, LabwareCatalog},
    params::ArmExecParams,
    sequencer::{CmdInterpreter, Connector, InterpreterParams, SimConnector, TcpConnector},
    transport::SimController,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    params::resolve_path,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    let session = Session::new("arm_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    info!("PF400 Arm Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: ArmExecParams =
        util::params::load("arm_exec.toml").wrap_err("Failed to load the parameters")?;

    info!("Parameters loaded");

    let catalog: Box<dyn LabwareCatalog> = match &params.labware_file {
        Some(f) => {
            let catalog = JsonLabwareCatalog::load(resolve_path(f))
                .wrap_err("Failed to load the labware catalog")?;
            info!("Labware catalog loaded ({} entries)", catalog.len());
            Box::new(catalog)
        }
        None => {
            warn!("No labware catalog given, lid commands will be unavailable");
            Box::new(JsonLabwareCatalog::default())
        }
    };

    // ---- INTERPRETER INITIALISATION ----

    let connector: Box<dyn Connector> = if params.simulate {
        warn!("Running against the simulated controller");
        Box::new(SimConnector {
            sim: SimController::new(),
        })
    } else {
        Box::new(TcpConnector {
            address: params.controller_address.clone(),
            connect_timeout: params.connect_timeout(),
        })
    };

    let mut interpreter = CmdInterpreter::new(
        InterpreterParams {
            workcells_dir: resolve_path(&params.workcells_dir),
            sequences_dir: resolve_path(&params.sequences_dir),
            max_read_attempts: params.max_read_attempts,
            driver: params.driver_params(),
        },
        connector,
        catalog,
    );

    if let Some(w) = &params.default_workcell {
        if let Err(e) = interpreter.configure(w) {
            warn!(
                "Could not configure the default workcell \"{}\": {}. Waiting for a configure \
                command.",
                w, e
            );
        }
    }

    // ---- SERVER INITIALISATION ----

    let ctx = zmq::Context::new();
    let server = ArmServer::new(&ctx, &params).wrap_err("Failed to initialise the server")?;

    info!("Server listening on {}", params.cmd_endpoint);

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop");

    loop {
        let cmd = match server.get_cmd() {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(ArmServerError::CmdParseError(e)) => {
                warn!("Invalid command received: {}", e);
                continue;
            }
            Err(e) => {
                error!("Could not receive a command: {}", e);
                continue;
            }
        };

        let response = match interpreter.handle(&cmd) {
            Ok(payload) => ArmResponse::Ok { payload },
            Err(e) => ArmResponse::Error {
                code: e.code(),
                message: e.to_string(),
            },
        };

        if let Err(e) = server.send_response(&response) {
            error!("Could not send the response to {}: {}", cmd.name(), e);
        }
    }
}
