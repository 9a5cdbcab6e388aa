//! ke-reasoner
//!
//! Command-line interface for backward and forward chaining over rule files.
//!
//! Rule files hold one rule per paragraph: antecedent triples, a `->` line,
//! consequent triples. A rule with an empty antecedent and a ground
//! consequent states facts.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use ke_reasoner::{
    logging, BindingSet, LogLevel, MatchStrategy, OutputFormat, Reasoner, ReasonerConfig, ReasonerError,
    ReasonerPlan,
};

const VERSION: &str = concat!(env!("KE_REASONER_VERSION"), " (", env!("KE_REASONER_TARGET"), ")");

#[derive(Parser)]
#[command(name = "ke-reasoner")]
#[command(version = VERSION)]
#[command(about = "Backward and forward chaining rule engine over RDF triple patterns", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to the standard search paths)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Reasoning profile: default, strict, exhaustive, debug or a custom one
    #[arg(long, global = true)]
    profile: Option<String>,

    /// How rule patterns are matched against each other
    #[arg(long, global = true, value_enum)]
    strategy: Option<StrategyArg>,

    /// Invoke handlers inline instead of through the task board
    #[arg(long = "no-task-board", global = true)]
    no_task_board: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    format: Option<FormatArg>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Answer a goal pattern by backward chaining
    Query {
        /// Rule files to load
        #[arg(long = "rules", value_name = "RULES", required = true)]
        rules: Vec<PathBuf>,

        /// Goal graph pattern, e.g. "?x <isAncestorOf> ?y"
        #[arg(long)]
        goal: String,

        /// Bindings constraining the goal, e.g. "x=<barry>|x=<janny>"
        #[arg(long, default_value = "")]
        bindings: String,

        /// Print the reasoning graph to stderr
        #[arg(long = "show-plan")]
        show_plan: bool,
    },

    /// Push premise bindings through every rule that can consume them
    Forward {
        #[arg(long = "rules", value_name = "RULES", required = true)]
        rules: Vec<PathBuf>,

        /// Premise graph pattern
        #[arg(long)]
        premise: String,

        /// Bindings of the premise pattern
        #[arg(long)]
        bindings: String,

        #[arg(long = "show-plan")]
        show_plan: bool,
    },

    /// Print the rules and their dependencies as GraphViz
    Graph {
        #[arg(long = "rules", value_name = "RULES", required = true)]
        rules: Vec<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        /// Print a commented default configuration file instead
        #[arg(long)]
        init: bool,

        /// List the available profiles
        #[arg(long)]
        profiles: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    /// Every consistent partial match
    All,
    /// Only maximal matches
    Biggest,
    /// Only matches covering the whole antecedent
    Full,
}

impl From<StrategyArg> for MatchStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::All => MatchStrategy::FindAllMatches,
            StrategyArg::Biggest => MatchStrategy::FindOnlyBiggestMatches,
            StrategyArg::Full => MatchStrategy::FindOnlyFullMatches,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    /// One binding per line
    Text,
    /// JSON array of objects
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let code = err
                .downcast_ref::<ReasonerError>()
                .map_or(1, ReasonerError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = effective_config(&cli)?;

    logging::init(config.general.log_level)?;

    match cli.command {
        Command::Query { rules, goal, bindings, show_plan } => {
            let mut reasoner = load_reasoner(config.clone(), &rules)?;
            let goal = reasoner.parse_pattern(&goal).context("Invalid goal pattern")?;
            let bindings = reasoner.parse_bindings(&bindings).context("Invalid bindings")?;

            let mut plan = reasoner.backward_plan(goal)?;
            plan.run(&bindings).await?;
            if show_plan {
                eprint!("{}", plan);
            }

            let results = plan.get_results()?;
            print_bindings(&results, config.general.format)?;
        }

        Command::Forward { rules, premise, bindings, show_plan } => {
            let mut reasoner = load_reasoner(config.clone(), &rules)?;
            let premise = reasoner.parse_pattern(&premise).context("Invalid premise pattern")?;
            let bindings = reasoner.parse_bindings(&bindings).context("Invalid bindings")?;

            let plan = reasoner.publish(premise, &bindings).await?;
            if show_plan {
                eprint!("{}", plan);
            }
            print_derived(&plan, config.general.format)?;
        }

        Command::Graph { rules } => {
            let mut reasoner = load_reasoner(config.clone(), &rules)?;
            let strategy = config.reasoning.match_strategy;
            println!("{}", reasoner.store_mut().to_graphviz(strategy)?);
        }

        Command::Config { init, profiles } => {
            if init {
                print!("{}", ReasonerConfig::default_config_content());
            } else if profiles {
                for (name, description) in config.available_profiles() {
                    println!("{:<12} {}", name, description);
                }
            } else {
                print!("{}", config.to_toml()?);
            }
        }
    }

    Ok(())
}

/// Config file, then profile, then command-line flags
fn effective_config(cli: &Cli) -> Result<ReasonerConfig> {
    let mut config = match &cli.config {
        Some(path) => ReasonerConfig::load_from_file(path)?,
        None => ReasonerConfig::load()?,
    };

    if let Some(profile) = &cli.profile {
        config.apply_profile(profile)?;
    }
    if let Some(strategy) = cli.strategy {
        config.reasoning.match_strategy = strategy.into();
    }
    if cli.no_task_board {
        config.reasoning.use_task_board = false;
    }
    if let Some(format) = cli.format {
        config.general.format = format.into();
    }
    if cli.quiet {
        config.general.log_level = LogLevel::Quiet;
    } else if cli.verbose {
        config.general.log_level = LogLevel::Verbose;
    }

    Ok(config)
}

fn load_reasoner(config: ReasonerConfig, rules: &[PathBuf]) -> Result<Reasoner> {
    let mut reasoner = Reasoner::with_config(config);
    for path in rules {
        reasoner
            .load_rules_from_file(path)
            .with_context(|| format!("Failed to load rules: {}", path.display()))?;
    }
    Ok(reasoner)
}

fn print_bindings(bindings: &BindingSet, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", bindings),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(bindings)?),
    }
    Ok(())
}

/// What every rule in a forward plan produced
fn print_derived(plan: &ReasonerPlan, format: OutputFormat) -> Result<()> {
    let start = plan.start_node().id();
    let derived: BTreeMap<String, &BindingSet> = plan
        .nodes()
        .filter(|node| node.id() != start && !node.output().is_empty())
        .map(|node| (node.rule().display_name(), node.output()))
        .collect();

    match format {
        OutputFormat::Text => {
            for (rule, bindings) in &derived {
                println!("# {}", rule);
                print!("{}", bindings);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&derived)?),
    }
    Ok(())
}
