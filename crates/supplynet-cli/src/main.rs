use clap::{Args, Parser, Subcommand};
use log::{LevelFilter, info};
use std::path::PathBuf;

use supplynet_model::{Model, Network, NetworkFlowModelBuilder, Tier, scenarios};
use supplynet_solver::{SolutionStatus, Solver};

#[derive(Parser)]
#[command(name = "supplynet")]
#[command(about = "Least-cost flow planning for three-tier supply networks", long_about = None)]
struct Cli {
    /// Log model construction and solver progress
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct NetworkArgs {
    /// Built-in scenario (fashion, coffee)
    #[arg(short, long)]
    scenario: Option<String>,
    /// JSON network definition
    #[arg(short, long)]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and solve a network, then print the optimal cost
    Solve {
        #[command(flatten)]
        network: NetworkArgs,
        /// Forbid all flow on an edge after the first solve (FROM:TO)
        #[arg(long, value_parser = parse_edge)]
        forbid: Vec<(String, String)>,
        /// Cap the flow on an edge after the first solve (FROM:TO=MAX)
        #[arg(long, value_parser = parse_cap)]
        cap: Vec<(String, String, f64)>,
        /// Print the flow plan
        #[arg(short, long)]
        plan: bool,
    },
    /// Validate a network without solving it
    Check {
        #[command(flatten)]
        network: NetworkArgs,
    },
    /// Print a built-in scenario as JSON
    Export {
        /// Scenario name
        scenario: String,
    },
}

fn parse_edge(s: &str) -> Result<(String, String), String> {
    match s.split_once(':') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok((from.to_string(), to.to_string())),
        _ => Err(format!("expected FROM:TO, got {}", s)),
    }
}

fn parse_cap(s: &str) -> Result<(String, String, f64), String> {
    let (edge, max) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected FROM:TO=MAX, got {}", s))?;
    let (from, to) = parse_edge(edge)?;
    let max: f64 = max.parse().map_err(|e| format!("invalid cap {}: {}", max, e))?;
    Ok((from, to, max))
}

fn load_network(args: &NetworkArgs) -> Network {
    if let Some(ref name) = args.scenario {
        return match scenarios::by_name(name) {
            Some(network) => network,
            None => {
                eprintln!("Unknown scenario: {} (available: {})", name, scenarios::NAMES.join(", "));
                std::process::exit(1);
            }
        };
    }

    let Some(ref file) = args.file else {
        eprintln!("Either --scenario or --file is required");
        std::process::exit(1);
    };

    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::from_str(&source) {
        Ok(network) => network,
        Err(e) => {
            eprintln!("Invalid network file {}: {}", file.display(), e);
            std::process::exit(1);
        }
    }
}

fn build(network: &Network) -> Model {
    match NetworkFlowModelBuilder::new().build(network) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Build error: {}", e);
            std::process::exit(1);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Solve { network, forbid, cap, plan } => {
            let network = load_network(&network);
            let mut model = build(&network);
            let solver = Solver::new();

            model.solve(&solver);

            if !forbid.is_empty() || !cap.is_empty() {
                for (from, to) in &forbid {
                    if let Err(e) = model.forbid_edge(from, to) {
                        eprintln!("Cannot forbid {}:{}: {}", from, to, e);
                        std::process::exit(1);
                    }
                }
                for (from, to, max) in &cap {
                    if let Err(e) = model.cap_edge(from, to, *max) {
                        eprintln!("Cannot cap {}:{}: {}", from, to, e);
                        std::process::exit(1);
                    }
                }
                info!("Resolving {} with {} added constraints", model.name(), forbid.len() + cap.len());
                model.solve(&solver);
            }

            match model.status() {
                Some(SolutionStatus::Optimal) => {
                    let cost = model.objective_value().unwrap_or(f64::NAN);
                    println!("Optimal cost: {}", cost);

                    if plan {
                        match model.flow_plan() {
                            Ok(flow_plan) => {
                                println!();
                                print!("{}", flow_plan);
                            }
                            Err(e) => {
                                eprintln!("Cannot report flows: {}", e);
                                std::process::exit(1);
                            }
                        }
                    }
                }
                Some(status) => {
                    println!("Not solved to optimality. Optimization status: {}", status);
                    if let Some(message) = model.solution().and_then(|s| s.message.as_deref()) {
                        println!("{}", message);
                    }
                    std::process::exit(1);
                }
                None => {
                    println!("Not solved. Model state: {}", model.state());
                    std::process::exit(1);
                }
            }
        }
        Commands::Check { network } => {
            let network = load_network(&network);
            let model = build(&network);

            println!("✓ {} is valid", network.name);
            println!("  {} sources", network.count(Tier::Source));
            println!("  {} hubs", network.count(Tier::Hub));
            println!("  {} sinks", network.count(Tier::Sink));
            println!("  {} edges", network.edges.len());
            println!("  {} commodities", network.commodities.len());
            println!("  {} variables", model.problem().num_variables());
            println!("  {} constraints", model.problem().num_constraints());
        }
        Commands::Export { scenario } => match scenarios::by_name(&scenario) {
            Some(network) => match serde_json::to_string_pretty(&network) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing {}: {}", scenario, e);
                    std::process::exit(1);
                }
            },
            None => {
                eprintln!("Unknown scenario: {} (available: {})", scenario, scenarios::NAMES.join(", "));
                std::process::exit(1);
            }
        },
    }
}
