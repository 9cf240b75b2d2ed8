//! Command-line interface for the congruence lattice toolkit

use clap::{Parser, Subcommand, ValueEnum};
use num_bigint::BigInt;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

use congruence_lattice::utils::generator::planted_instance;
use congruence_lattice::utils::instance::Instance;
use congruence_lattice::utils::transcript::{key_string, protocol_modulus, KEY_BITS};
use congruence_lattice::{
    kernel_lattice, validate_features, CVPSolver, CVPSolverParams, LLLParams, LLLReducer, Lattice,
    LatticeVector, ModularSolver, ReductionStrategy, SVPSolver, SVPSolverParams, SolverConfig,
};

/// Small solutions of linear congruences via lattice reduction
#[derive(Parser, Debug)]
#[clap(name = "congruence_lattice")]
#[clap(about = "Lattice toolkit recovering small solutions of A x = c (mod m)")]
#[clap(version)]
struct Args {
    /// Input file: a JSON instance for solve/kernel, a lattice file otherwise
    #[clap(short, long, global = true)]
    input: Option<PathBuf>,

    /// Output file for results
    #[clap(short, long, global = true)]
    output: Option<PathBuf>,

    /// Operation to run
    #[clap(subcommand)]
    command: Commands,

    /// Enable verbose logging (same as --log-level debug)
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Set logging level (error, warn, info, debug, trace)
    #[clap(long, default_value = "info", global = true)]
    log_level: String,

    /// Output format
    #[clap(long, value_enum, default_value = "plain", global = true)]
    format: OutputFormat,

    /// Solver configuration (JSON-serialized SolverConfig)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Try every reduction candidate in SVP/CVP searches
    #[clap(long, global = true)]
    thorough: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Solve the instance for a small solution
    Solve {
        /// Solver to use
        #[clap(long, value_enum, default_value = "small-lgs2")]
        method: SolveMethod,

        /// Near-solution to correct (comma-separated), for the truncated solver
        #[clap(long)]
        near: Option<String>,
    },

    /// LLL reduction of a lattice
    Reduce {
        /// LLL delta parameter (0.25 < delta < 1.0)
        #[clap(long, default_value = "0.99")]
        delta: f64,

        /// LLL eta parameter (0.5 < eta < sqrt(delta)), floating-point strategy only
        #[clap(long, default_value = "0.51")]
        eta: f64,

        /// Arithmetic used for the reduction
        #[clap(long, value_enum, default_value = "exact")]
        strategy: StrategyCli,
    },

    /// Approximate a shortest nonzero vector
    Svp,

    /// Approximate the closest lattice vector to a target
    Cvp {
        /// Target vector (comma-separated integers)
        #[clap(long)]
        target: String,
    },

    /// Generators of the kernel lattice of the instance matrix
    Kernel {
        /// Modulus overriding the instance's
        #[clap(long)]
        modulus: Option<String>,
    },

    /// Generate a random instance with a planted small solution
    Generate {
        /// Number of equations
        #[clap(long, default_value = "39")]
        rows: usize,

        /// Number of unknowns
        #[clap(long, default_value = "40")]
        cols: usize,

        /// Bit size of the planted solution entries
        #[clap(long, default_value_t = KEY_BITS)]
        solution_bits: u64,

        /// Bit size of the coefficients
        #[clap(long, default_value_t = KEY_BITS)]
        coefficient_bits: u64,

        /// Modulus; defaults to the protocol modulus
        #[clap(long)]
        modulus: Option<String>,

        /// Seed for reproducible generation
        #[clap(long, default_value = "0")]
        seed: u64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SolveMethod {
    SmallLgs,
    SmallLgs2,
    Truncated,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StrategyCli {
    Exact,
    FloatingPoint,
}

impl From<StrategyCli> for ReductionStrategy {
    fn from(value: StrategyCli) -> Self {
        match value {
            StrategyCli::Exact => ReductionStrategy::Exact,
            StrategyCli::FloatingPoint => ReductionStrategy::FloatingPoint,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Plain,
    Json,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args)?;
    validate_features()?;

    let command = args.command.clone();

    // Handle commands
    match command {
        Commands::Solve { method, near } => run_solve(&args, method, near)?,
        Commands::Reduce { delta, eta, strategy } => run_reduce(&args, delta, eta, strategy)?,
        Commands::Svp => run_svp(&args)?,
        Commands::Cvp { target } => run_cvp(&args, &target)?,
        Commands::Kernel { modulus } => run_kernel(&args, modulus)?,
        Commands::Generate {
            rows,
            cols,
            solution_bits,
            coefficient_bits,
            modulus,
            seed,
        } => run_generate(&args, rows, cols, solution_bits, coefficient_bits, modulus, seed)?,
    }

    Ok(())
}

fn setup_logging(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    use env_logger::Builder;
    use log::LevelFilter;

    let level_filter = if args.verbose {
        LevelFilter::Debug
    } else {
        match args.log_level.as_str() {
            "error" => LevelFilter::Error,
            "warn" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Info,
        }
    };

    let mut builder = Builder::from_default_env();
    builder.filter_level(level_filter);
    builder.try_init()?;

    Ok(())
}

fn solver_config(args: &Args) -> Result<SolverConfig, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => SolverConfig::from_file(path)?,
        None if args.thorough => SolverConfig::thorough(),
        None => SolverConfig::default(),
    };
    Ok(config)
}

fn require_input(args: &Args) -> Result<&PathBuf, Box<dyn std::error::Error>> {
    args.input
        .as_ref()
        .ok_or_else(|| "this command needs an input file (--input)".into())
}

fn load_instance(args: &Args) -> Result<Instance, Box<dyn std::error::Error>> {
    Ok(Instance::load(require_input(args)?)?)
}

fn load_lattice(args: &Args) -> Result<Lattice, Box<dyn std::error::Error>> {
    Ok(Lattice::load_from_file(require_input(args)?)?)
}

fn parse_integer(text: &str) -> Result<BigInt, Box<dyn std::error::Error>> {
    text.trim()
        .parse::<BigInt>()
        .map_err(|e| format!("invalid integer '{}': {}", text, e).into())
}

fn parse_vector(text: &str) -> Result<LatticeVector, Box<dyn std::error::Error>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(parse_integer)
        .collect::<Result<Vec<_>, _>>()
        .map(LatticeVector::new)
}

fn run_solve(
    args: &Args,
    method: SolveMethod,
    near: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let instance = load_instance(args)?;
    let solver = ModularSolver::with_config(solver_config(args)?);
    log::info!(
        "Solving a {}x{} system with {:?}",
        instance.a.rows(),
        instance.a.cols(),
        method
    );

    let start_time = Instant::now();
    let solution = match method {
        SolveMethod::SmallLgs => {
            solver.small_lgs(&instance.a, instance.target.as_ref(), instance.modulus.as_ref())?
        }
        SolveMethod::SmallLgs2 => {
            let modulus = instance
                .modulus
                .as_ref()
                .ok_or("small-lgs2 needs a modulus in the instance")?;
            solver.small_lgs2(&instance.a, instance.target.as_ref(), modulus)?
        }
        SolveMethod::Truncated => {
            let modulus = instance
                .modulus
                .as_ref()
                .ok_or("truncated needs a modulus in the instance")?;
            let near = near.ok_or("truncated needs a near-solution (--near)")?;
            solver.truncated_lgs(&instance.a, &parse_vector(&near)?, modulus)?
        }
    };
    let execution_time = start_time.elapsed();

    let verified = match method {
        SolveMethod::Truncated => None,
        _ => Some(instance.verify(&solution)?),
    };
    let matches_known = instance.solution.as_ref().map(|known| *known == solution);
    log::info!("Solved in {:?}", execution_time);

    save_result(
        args,
        &VectorReport {
            label: "solution",
            vector: solution,
            execution_time,
            verified,
            matches_known,
        },
    )
}

fn run_reduce(
    args: &Args,
    delta: f64,
    eta: f64,
    strategy: StrategyCli,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("Running LLL reduction with delta={}, eta={}, strategy={:?}", delta, eta, strategy);

    let lattice = load_lattice(args)?;
    let params = LLLParams {
        delta,
        eta,
        strategy: strategy.into(),
        ..Default::default()
    };

    let start_time = Instant::now();
    let (reduced, stats) = LLLReducer::with_params(params).reduce_with_stats(&lattice)?;
    let execution_time = start_time.elapsed();

    log::info!(
        "LLL reduction completed in {:?}: rank {}, {} swaps",
        execution_time,
        stats.rank,
        stats.swaps
    );
    save_result(args, &LatticeReport { lattice: reduced })
}

fn run_svp(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let lattice = load_lattice(args)?;
    let config = solver_config(args)?;
    let result = SVPSolver::with_params(SVPSolverParams::with_reduction(config.reduction)).solve(&lattice)?;
    log::info!(
        "Shortest vector of norm {:.3} from {} candidates",
        result.norm,
        result.candidates_examined
    );

    save_result(
        args,
        &VectorReport {
            label: "shortest",
            vector: result.solution,
            execution_time: std::time::Duration::from_secs_f64(result.execution_time),
            verified: None,
            matches_known: None,
        },
    )
}

fn run_cvp(args: &Args, target: &str) -> Result<(), Box<dyn std::error::Error>> {
    let lattice = load_lattice(args)?;
    let target = parse_vector(target)?;
    let config = solver_config(args)?;
    let params = CVPSolverParams {
        reduction: config.reduction,
        ..Default::default()
    };

    let result = CVPSolver::with_params(params)
        .solve(&lattice, &target)?
        .ok_or("lattice has no nonzero generator")?;
    log::info!(
        "Closest vector at distance {:.3} via {}",
        result.distance,
        result.algorithm
    );

    save_result(
        args,
        &VectorReport {
            label: "closest",
            vector: result.closest_vector,
            execution_time: std::time::Duration::from_secs_f64(result.execution_time),
            verified: None,
            matches_known: None,
        },
    )
}

fn run_kernel(args: &Args, modulus: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let instance = load_instance(args)?;
    let modulus = match modulus {
        Some(text) => Some(parse_integer(&text)?),
        None => instance.modulus.clone(),
    };
    let lattice = kernel_lattice(&instance.a, modulus.as_ref())?;
    log::info!("Kernel lattice with {} generators", lattice.num_generators());
    save_result(args, &LatticeReport { lattice })
}

fn run_generate(
    args: &Args,
    rows: usize,
    cols: usize,
    solution_bits: u64,
    coefficient_bits: u64,
    modulus: Option<String>,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let modulus = match modulus {
        Some(text) => parse_integer(&text)?,
        None => protocol_modulus(),
    };
    let instance = planted_instance(rows, cols, solution_bits, coefficient_bits, &modulus, seed)?;
    log::info!("Generated a {}x{} instance with seed {}", rows, cols, seed);
    save_result(args, &InstanceReport { instance })
}

trait SerializableResult {
    fn serialize(&self, format: OutputFormat) -> Result<String, Box<dyn std::error::Error>>;
}

fn save_result(args: &Args, result: &dyn SerializableResult) -> Result<(), Box<dyn std::error::Error>> {
    let content = result.serialize(args.format)?;
    match args.output {
        Some(ref path) => std::fs::write(path, content)
            .map_err(|e| format!("Failed to write output to {}: {}", path.display(), e).into()),
        None => {
            // Print to stdout
            println!("{}", content);
            Ok(())
        }
    }
}

struct VectorReport {
    label: &'static str,
    vector: LatticeVector,
    execution_time: std::time::Duration,
    verified: Option<bool>,
    matches_known: Option<bool>,
}

impl SerializableResult for VectorReport {
    fn serialize(&self, format: OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
        match format {
            OutputFormat::Plain => {
                let mut output = key_string(&self.vector);
                if let Some(verified) = self.verified {
                    output.push_str(&format!("\n# satisfies system: {}", verified));
                }
                if let Some(matches) = self.matches_known {
                    output.push_str(&format!("\n# matches known solution: {}", matches));
                }
                Ok(output)
            }
            OutputFormat::Json => {
                #[derive(Serialize)]
                struct VectorJson<'a> {
                    kind: &'a str,
                    vector: Vec<String>,
                    execution_time_ms: f64,
                    #[serde(skip_serializing_if = "Option::is_none")]
                    verified: Option<bool>,
                    #[serde(skip_serializing_if = "Option::is_none")]
                    matches_known: Option<bool>,
                }

                let json = VectorJson {
                    kind: self.label,
                    vector: self.vector.as_slice().iter().map(|v| v.to_string()).collect(),
                    execution_time_ms: self.execution_time.as_secs_f64() * 1000.0,
                    verified: self.verified,
                    matches_known: self.matches_known,
                };
                Ok(serde_json::to_string_pretty(&json)?)
            }
        }
    }
}

struct LatticeReport {
    lattice: Lattice,
}

impl SerializableResult for LatticeReport {
    fn serialize(&self, format: OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
        match format {
            OutputFormat::Plain => Ok(self.lattice.to_fplll_format()),
            OutputFormat::Json => {
                let rows: Vec<Vec<String>> = self
                    .lattice
                    .basis()
                    .row_iter()
                    .map(|row| row.iter().map(|v| v.to_string()).collect())
                    .collect();
                Ok(serde_json::to_string_pretty(&rows)?)
            }
        }
    }
}

struct InstanceReport {
    instance: Instance,
}

impl SerializableResult for InstanceReport {
    // instances are always written as JSON so they can be read back with --input
    fn serialize(&self, _format: OutputFormat) -> Result<String, Box<dyn std::error::Error>> {
        Ok(self.instance.to_json()?)
    }
}
