//! `taleweave` command-line entry point

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use taleweave_server::settings::Settings;
use taleweave_server::simulator::run_simulator;
use taleweave_server::telemetry;

fn cli() -> Command {
    Command::new("taleweave")
        .version(taleweave_core::VERSION)
        .about("Taleweave room orchestrator")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML settings file with [engine] and [simulation] tables"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Fill rooms with bots and check every artifact is stored")
                .arg(
                    Arg::new("rooms")
                        .long("rooms")
                        .value_parser(value_parser!(usize))
                        .help("Number of rooms to fill"),
                )
                .arg(
                    Arg::new("capacity")
                        .long("capacity")
                        .value_parser(value_parser!(u32))
                        .help("Seats per room"),
                )
                .arg(
                    Arg::new("rounds")
                        .long("rounds")
                        .value_parser(value_parser!(u32))
                        .help("Turns each bot takes before leaving"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("drop-rate")
                        .long("drop-rate")
                        .value_parser(value_parser!(f64))
                        .help("Chance a bot drops and reconnects instead of taking its turn"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .value_parser(value_parser!(PathBuf))
                        .help("Append artifacts to this JSONL file"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the report as JSON"),
                ),
        )
        .subcommand(
            Command::new("check-config")
                .about("Validate the settings file and print the effective configuration"),
        )
}

/// Command-line values take precedence over the settings file
fn apply_overrides(settings: &mut Settings, args: &ArgMatches) {
    if let Some(capacity) = args.get_one::<u32>("capacity") {
        settings.engine.capacity = *capacity;
    }
    let sim = &mut settings.simulation;
    if let Some(rooms) = args.get_one::<usize>("rooms") {
        sim.rooms = *rooms;
    }
    if let Some(rounds) = args.get_one::<u32>("rounds") {
        sim.rounds = *rounds;
    }
    if let Some(seed) = args.get_one::<u64>("seed") {
        sim.seed = *seed;
    }
    if let Some(rate) = args.get_one::<f64>("drop-rate") {
        sim.drop_rate = *rate;
    }
    if let Some(out) = args.get_one::<PathBuf>("out") {
        sim.out = Some(out.clone());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    telemetry::init(matches.get_flag("log-json"));

    let mut settings = Settings::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;

    match matches.subcommand() {
        Some(("simulate", args)) => {
            apply_overrides(&mut settings, args);
            let engine = settings.simulation_engine();
            engine.validate().context("invalid engine configuration")?;

            let report = run_simulator(engine, settings.simulation).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        Some(("check-config", _)) => {
            settings
                .engine
                .validate()
                .context("invalid engine configuration")?;
            println!("{}", toml::to_string_pretty(&settings)?);
        }
        _ => {
            cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
