#![deny(clippy::unwrap_used)]

use clap::builder::BoolishValueParser;
use clap::{arg, command, value_parser, ArgMatches};
use env_logger::Env;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use rigolctrl::proto::command::Command;
use rigolctrl::proto::transport::UsbtmcConnector;
use rigolctrl::proto::{self, Result};
use rigolctrl::{
    Channel, Instrument, MeasureMode, Multimeter, PowerSupply, Session, SessionConfig,
    DEFAULT_DELAY, DEFAULT_DEVICE_DIR, DEFAULT_TIMEOUT,
};

fn chan_arg() -> clap::Arg {
    arg!(<chan> "Output channel").value_parser(value_parser!(Channel))
}

#[tokio::main]
async fn main() {
    let matches =
        command!() // requires `cargo` feature
            .arg(
                arg!(
                    -s --serial <SERIAL> "Serial number of the instrument"
                )
                .required(false),
            )
            .arg(arg!(
                -d --debug "Log every command sent to the instrument"
            ))
            .arg(
                arg!(
                    --"dev-dir" <DIR> "Directory holding the usbtmc device nodes"
                )
                .default_value(DEFAULT_DEVICE_DIR)
                .value_parser(value_parser!(PathBuf)),
            )
            .arg(
                arg!(
                    --delay <MS> "Delay after each command in milliseconds"
                )
                .default_value(DEFAULT_DELAY.as_millis().to_string())
                .value_parser(value_parser!(u64)),
            )
            .arg(
                arg!(
                    --timeout <MS> "Response timeout in milliseconds"
                )
                .default_value(DEFAULT_TIMEOUT.as_millis().to_string())
                .value_parser(value_parser!(u64)),
            )
            .subcommand(clap::Command::new("list").about("List connected instruments"))
            .subcommand(clap::Command::new("ident").about("Device identification"))
            .subcommand(clap::Command::new("reset").about("Reset device"))
            .subcommand(
                clap::Command::new("raw")
                    .about("Send a raw command, queries print their response")
                    .arg(arg!(<command> "Command text")),
            )
            .subcommand(
                clap::Command::new("dmm-voltage")
                    .about("Measure voltage")
                    .arg(
                        arg!([mode] "Coupling")
                            .value_parser(value_parser!(MeasureMode))
                            .default_value("DC"),
                    ),
            )
            .subcommand(
                clap::Command::new("dmm-current")
                    .about("Measure current")
                    .arg(
                        arg!([mode] "Coupling")
                            .value_parser(value_parser!(MeasureMode))
                            .default_value("DC"),
                    ),
            )
            .subcommand(
                clap::Command::new("psu-on")
                    .about("Enable output")
                    .arg(chan_arg()),
            )
            .subcommand(
                clap::Command::new("psu-off")
                    .about("Disable output")
                    .arg(chan_arg()),
            )
            .subcommand(
                clap::Command::new("psu-output")
                    .about("Query output state")
                    .arg(chan_arg()),
            )
            .subcommand(
                clap::Command::new("psu-voltage")
                    .about("Set voltage, arms OCP if a current limit is given")
                    .arg(chan_arg())
                    .arg(arg!(<volts> "Voltage setpoint").value_parser(value_parser!(f64)))
                    .arg(
                        arg!(--"max-current" <AMPS> "Over-current protection threshold")
                            .required(false)
                            .value_parser(value_parser!(f64)),
                    ),
            )
            .subcommand(
                clap::Command::new("psu-current")
                    .about("Set current, arms OVP if a voltage limit is given")
                    .arg(chan_arg())
                    .arg(arg!(<amps> "Current setpoint").value_parser(value_parser!(f64)))
                    .arg(
                        arg!(--"max-voltage" <VOLTS> "Over-voltage protection threshold")
                            .required(false)
                            .value_parser(value_parser!(f64)),
                    ),
            )
            .subcommand(
                clap::Command::new("psu-ovp")
                    .about("Over-voltage protection")
                    .arg(chan_arg())
                    .arg(arg!([volts] "Set threshold").value_parser(value_parser!(f64)))
                    .arg(
                        arg!(--state <STATE> "Enable or disable")
                            .required(false)
                            .value_parser(BoolishValueParser::new()),
                    ),
            )
            .subcommand(
                clap::Command::new("psu-ocp")
                    .about("Over-current protection")
                    .arg(chan_arg())
                    .arg(arg!([amps] "Set threshold").value_parser(value_parser!(f64)))
                    .arg(
                        arg!(--state <STATE> "Enable or disable")
                            .required(false)
                            .value_parser(BoolishValueParser::new()),
                    ),
            )
            .subcommand(
                clap::Command::new("psu-measure")
                    .about("Measure voltage, current and power")
                    .arg(chan_arg()),
            )
            .subcommand_required(true)
            .get_matches();

    if matches.get_flag("debug") {
        env_logger::Builder::from_env(Env::default().default_filter_or("rigolctrl=debug")).init();
    } else {
        env_logger::init();
    }

    match handle_args(&matches).await {
        Ok(()) => {}
        Err(e) => {
            match e {
                proto::ProtoError::Io(err) => {
                    if err.kind() == ErrorKind::NotFound {
                        eprintln!("Device node not found: {}", err);
                    } else if err.kind() == ErrorKind::PermissionDenied {
                        eprintln!("Permission denied, check access to the usbtmc device nodes");
                    } else {
                        eprintln!("I/O Error: {}", err);
                    }
                }
                proto::ProtoError::NotFound(serial) => {
                    eprintln!("No instrument with serial {} found", serial);
                }
                proto::ProtoError::Transport { command, source } => {
                    eprintln!("Communication failed on `{}`: {}", command, source);
                }
                proto::ProtoError::Device {
                    command,
                    code,
                    message,
                } => {
                    eprintln!(
                        "Instrument rejected `{}` with error {}: {}",
                        command, code, message
                    );
                }
                proto::ProtoError::Parse { command, response } => {
                    eprintln!(
                        "Unexpected response to `{}`, aborting!: {:?}",
                        command, response
                    );
                }
                proto::ProtoError::Closed | proto::ProtoError::Abort => {
                    eprintln!("Failed to communicate with device, aborting!");
                }
            }
            exit(-1);
        }
    }
}

fn config(matches: &ArgMatches) -> SessionConfig {
    let delay = matches
        .get_one::<u64>("delay")
        .map(|ms| Duration::from_millis(*ms))
        .unwrap_or(DEFAULT_DELAY);
    let timeout = matches
        .get_one::<u64>("timeout")
        .map(|ms| Duration::from_millis(*ms))
        .unwrap_or(DEFAULT_TIMEOUT);

    SessionConfig::default()
        .with_delay(delay)
        .with_timeout(timeout)
        .with_debug(matches.get_flag("debug"))
}

fn connector(matches: &ArgMatches) -> UsbtmcConnector {
    match matches.get_one::<PathBuf>("dev-dir") {
        Some(dir) => UsbtmcConnector::new(dir),
        None => UsbtmcConnector::default(),
    }
}

/// Picks the driver matching the model field of the identification.
fn instrument(session: Session) -> Box<dyn Instrument> {
    let model = session
        .identity()
        .and_then(|id| id.split(',').nth(1))
        .unwrap_or_default()
        .trim()
        .to_string();
    if model.starts_with("DM") {
        Box::new(Multimeter::new(session))
    } else {
        Box::new(PowerSupply::new(session))
    }
}

fn channel(args: &ArgMatches) -> Channel {
    args.get_one::<Channel>("chan").copied().unwrap_or_default()
}

async fn handle_args(matches: &ArgMatches) -> Result<()> {
    let config = config(matches);
    let connector = connector(matches);

    if let Some(("list", _)) = matches.subcommand() {
        for (id, identity) in Session::probe_all(&connector, config).await? {
            match identity {
                Ok(identity) => println!("{}: {}", id, identity),
                Err(err) => println!("{}: <{}>", id, err),
            }
        }
        return Ok(());
    }

    let serial = match matches.get_one::<String>("serial") {
        Some(serial) => serial,
        None => {
            eprintln!("--serial is required for this command");
            exit(-1);
        }
    };

    let session = Session::discover_with(&connector, serial, config).await?;
    eprintln!(
        "Connected to: {}\n",
        session.identity().unwrap_or(session.serial())
    );

    match matches.subcommand() {
        // Device ID
        Some(("ident", _)) => {
            let mut device = instrument(session);
            let ident = device.ident().await?;
            println!("Manufacturer: {}", ident.manufacturer);
            println!("Model: {}", ident.model);
            println!("Serial: {}", ident.serial);
            println!("Firmware: {}", ident.firmware);
            device.close().await?;
        }
        // Reset
        Some(("reset", _)) => {
            let mut device = instrument(session);
            device.reset().await?;
            println!("OK");
            device.close().await?;
        }
        // Raw command
        Some(("raw", args)) => {
            let mut session = session;
            if let Some(text) = args.get_one::<String>("command") {
                let command = Command::from(text.as_str());
                if command.is_query() {
                    println!("{}", session.query(command).await?);
                } else {
                    session.write(command).await?;
                    println!("OK");
                }
            }
            session.close().await?;
        }
        // Multimeter
        Some(("dmm-voltage", args)) => {
            let mode = args.get_one::<MeasureMode>("mode").copied().unwrap_or_default();
            let mut dmm = Multimeter::new(session);
            println!("Voltage ({}): {} V", mode, dmm.measure_voltage(mode).await?);
            dmm.close().await?;
        }
        Some(("dmm-current", args)) => {
            let mode = args.get_one::<MeasureMode>("mode").copied().unwrap_or_default();
            let mut dmm = Multimeter::new(session);
            println!("Current ({}): {} A", mode, dmm.measure_current(mode).await?);
            dmm.close().await?;
        }
        // Power supply
        Some(("psu-on", args)) => {
            let mut psu = PowerSupply::new(session);
            psu.turn_on(channel(args)).await?;
            println!("OK");
            psu.close().await?;
        }
        Some(("psu-off", args)) => {
            let mut psu = PowerSupply::new(session);
            psu.turn_off(channel(args)).await?;
            println!("OK");
            psu.close().await?;
        }
        Some(("psu-output", args)) => {
            let chan = channel(args);
            let mut psu = PowerSupply::new(session);
            let state = psu.output_state(chan).await?;
            println!("CH{}: {}", chan, if state { "ON" } else { "OFF" });
            psu.close().await?;
        }
        Some(("psu-voltage", args)) => {
            let mut psu = PowerSupply::new(session);
            if let Some(volts) = args.get_one::<f64>("volts") {
                let max_current = args.get_one::<f64>("max-current").copied();
                psu.set_voltage(*volts, max_current, channel(args)).await?;
                println!("OK");
            }
            psu.close().await?;
        }
        Some(("psu-current", args)) => {
            let mut psu = PowerSupply::new(session);
            if let Some(amps) = args.get_one::<f64>("amps") {
                let max_voltage = args.get_one::<f64>("max-voltage").copied();
                psu.set_current(*amps, max_voltage, channel(args)).await?;
                println!("OK");
            }
            psu.close().await?;
        }
        Some(("psu-ovp", args)) => {
            let chan = channel(args);
            let mut psu = PowerSupply::new(session);
            if let Some(volts) = args.get_one::<f64>("volts") {
                psu.set_ovp(*volts, chan).await?;
            }
            if let Some(state) = args.get_one::<bool>("state") {
                psu.toggle_ovp(*state, chan).await?;
            }
            println!("OK");
            psu.close().await?;
        }
        Some(("psu-ocp", args)) => {
            let chan = channel(args);
            let mut psu = PowerSupply::new(session);
            if let Some(amps) = args.get_one::<f64>("amps") {
                psu.set_ocp(*amps, chan).await?;
            }
            if let Some(state) = args.get_one::<bool>("state") {
                psu.toggle_ocp(*state, chan).await?;
            }
            println!("OK");
            psu.close().await?;
        }
        Some(("psu-measure", args)) => {
            let chan = channel(args);
            let mut psu = PowerSupply::new(session);
            println!("Voltage: {} V", psu.measure_voltage(chan).await?);
            println!("Current: {} A", psu.measure_current(chan).await?);
            println!("Power: {} W", psu.measure_power(chan).await?);
            psu.close().await?;
        }
        _ => {
            unreachable!("subcommand is required")
        }
    }

    Ok(())
}
