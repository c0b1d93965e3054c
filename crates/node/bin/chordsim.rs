use chordsim_core::sim::Timestamp;
use chordsim_node::config::SimulationConfig;
use chordsim_node::config::DEFAULT_CONFIG_LOCATION;
use chordsim_node::driver::ChurnDriver;
use chordsim_node::logging::init_logging;
use chordsim_node::logging::LogLevel;
use chordsim_node::report;
use chordsim_node::util;
use clap::Args;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser, Debug)]
#[command(about, version, author)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, default_value_t = LogLevel::Info, value_enum, env)]
    log_level: LogLevel,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    #[command(about = "Writes a default simulation config.")]
    Init(InitCommand),
    #[command(about = "Runs a simulation and exports its lookups as CSV.")]
    Run(RunCommand),
    #[command(about = "Prints the state of the ring at a point of virtual time as JSON.")]
    Inspect(InspectCommand),
}

#[derive(Args, Debug)]
struct InitCommand {
    #[arg(
        long,
        default_value = DEFAULT_CONFIG_LOCATION,
        help = "The location of config file"
    )]
    pub location: String,
}

#[derive(Args, Debug)]
struct RunCommand {
    #[arg(
        long,
        short = 'c',
        default_value = DEFAULT_CONFIG_LOCATION,
        help = "Simulation config file",
        env = "CHORDSIM_CONFIG"
    )]
    pub config: String,

    #[arg(
        long,
        short = 'o',
        help = "CSV report location. If not provided, use output in config file or a timestamped file"
    )]
    pub output: Option<String>,

    #[arg(long, help = "Virtual time to stop at. If not provided, use end_time_ms in config file")]
    pub end_time_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct InspectCommand {
    #[arg(
        long,
        short = 'c',
        default_value = DEFAULT_CONFIG_LOCATION,
        help = "Simulation config file",
        env = "CHORDSIM_CONFIG"
    )]
    pub config: String,

    #[arg(long, help = "Virtual time of the snapshot")]
    pub at_ms: u64,
}

fn run(args: RunCommand) -> anyhow::Result<()> {
    let mut config = SimulationConfig::read_fs(args.config.as_str())?;
    if let Some(output) = args.output {
        config.output = Some(output);
    }
    if let Some(end_time_ms) = args.end_time_ms {
        config.end_time_ms = end_time_ms;
    }
    tracing::info!("chordsim {}, seed {}", util::build_version(), config.seed);

    let output = config.output.clone();
    let mut driver = ChurnDriver::new(config)?;
    let summary = driver.run()?;
    report::log_summary(&summary);
    let path = report::write_report(driver.network().lookups(), output.as_deref())?;
    println!("Lookup report saved to: {}", path.display());
    Ok(())
}

fn inspect(args: InspectCommand) -> anyhow::Result<()> {
    let config = SimulationConfig::read_fs(args.config.as_str())?;
    let mut driver = ChurnDriver::new(config)?;
    driver.run_until(Timestamp::from_millis(args.at_ms))?;
    println!("{}", serde_json::to_string_pretty(&driver.network().inspect())?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match cli.command {
        Command::Init(args) => {
            let p = SimulationConfig::default().write_fs(args.location.as_str())?;
            println!("Your config file has saved to: {}", p);
            Ok(())
        }
        Command::Run(args) => run(args),
        Command::Inspect(args) => inspect(args),
    }
}
