use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use log::{error, info};
use std::path::Path;

use SchemSim::cli::{self, CliArgs};
use SchemSim::simulator::{Simulator, SimulatorConfig};

fn main() {
    let matches = create_cli().get_matches();

    let level = cli::log_level(matches.get_count("verbose"));
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run_application(&matches) {
        error!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

fn create_cli() -> Command {
    Command::new("SchemSim")
        .version(SchemSim::VERSION)
        .about("A logic-level transistor schematic simulator written in Rust")
        .arg(
            Arg::new("input")
                .help("Schematic file: editor save (.json) or text netlist")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output file for simulation results"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .value_name("FORMAT")
                .default_value("csv")
                .value_parser(["csv", "json"])
                .help("Output format"),
        )
        .arg(
            Arg::new("signals")
                .short('s')
                .long("signals")
                .value_name("BITS")
                .help("Input signals in INPUT order, e.g. 1,0,1 (overrides the saved vector)"),
        )
        .arg(
            Arg::new("single-pass")
                .long("single-pass")
                .action(ArgAction::SetTrue)
                .help("Resolve with a single pass instead of iterating to a fixed point"),
        )
        .arg(
            Arg::new("halt-on-short")
                .long("halt-on-short")
                .action(ArgAction::SetTrue)
                .help("Stop the whole resolution at the first short circuit"),
        )
        .arg(
            Arg::new("reference")
                .long("reference")
                .action(ArgAction::SetTrue)
                .help("Same as --single-pass --halt-on-short"),
        )
        .arg(
            Arg::new("truth-table")
                .short('t')
                .long("truth-table")
                .action(ArgAction::SetTrue)
                .help("Enumerate every input combination"),
        )
        .arg(
            Arg::new("input-vector")
                .long("input-vector")
                .action(ArgAction::SetTrue)
                .help("Label inputs as a vector (I0, I1, ...)"),
        )
        .arg(
            Arg::new("output-vector")
                .long("output-vector")
                .action(ArgAction::SetTrue)
                .help("Label outputs as a vector (Y0, Y1, ...)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .help("Increase verbosity level"),
        )
}

fn run_application(matches: &ArgMatches) -> anyhow::Result<()> {
    let args = CliArgs::from_matches(matches)?;

    info!("{}", "Starting SchemSim".green().bold());
    info!("Input file: {}", args.input_file.bright_blue());

    if !Path::new(&args.input_file).exists() {
        return Err(anyhow::anyhow!("Input file '{}' not found", args.input_file));
    }

    let config = SimulatorConfig {
        resolver: args.resolver,
        options: args.options.clone(),
        ..SimulatorConfig::default()
    };

    let mut simulator = Simulator::with_config(config);
    simulator.load_schematic(&args.input_file)?;

    if let Some(signals) = args.signals.clone() {
        simulator.set_input_signals(signals)?;
    }

    simulator.run()?;

    if args.truth_table {
        simulator.run_truth_table()?;
    }

    if let Some(output_file) = args.output_file {
        simulator.export_results(&output_file, args.output_format)?;
        info!("Results exported to: {}", output_file.bright_green());
    } else {
        simulator.print_summary();
    }

    info!("{}", "Simulation completed successfully!".green().bold());
    Ok(())
}
