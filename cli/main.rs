#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use oncotwin::config::SimulationConfig;
use oncotwin::exponential::{ExponentialProjection, project};
use oncotwin::metrics::{ProgressionMetrics, trajectory_metrics};
use oncotwin::patient::PatientFeatures;
use oncotwin::patient::record::PatientRecord;
use oncotwin::simulator::MONTHS_PER_YEAR;
use oncotwin::{ProgressionSimulator, SimulationMode, TreatmentPlan};

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeCli {
    Markov,
    Exponential,
}

impl From<ModeCli> for SimulationMode {
    fn from(mode: ModeCli) -> Self {
        match mode {
            ModeCli::Markov => SimulationMode::Markov,
            ModeCli::Exponential => SimulationMode::Exponential,
        }
    }
}

/// Options shared by every command that reads a patient record.
#[derive(Args)]
pub struct PatientArgs {
    /// Path to a JSON patient record
    #[arg(value_name = "PATIENT_JSON")]
    pub patient: PathBuf,

    /// Treatment type (surgery, radiation, chemotherapy, hormone_therapy, targeted_therapy).
    /// Overrides any treatment_plan embedded in the record.
    #[arg(long)]
    pub treatment: Option<String>,

    /// Reject records with missing required fields instead of defaulting them
    #[arg(long)]
    pub strict: bool,

    /// Path to a TOML run configuration (defaults to $ONCOTWIN_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub patient: PatientArgs,

    /// Months to simulate
    #[arg(long)]
    pub months: Option<u32>,

    /// Number of Monte Carlo trajectories
    #[arg(long)]
    pub simulations: Option<usize>,

    /// Simulation model
    #[arg(long, value_enum)]
    pub mode: Option<ModeCli>,

    /// Seed for the random number generator
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args)]
pub struct SurvivalArgs {
    #[command(flatten)]
    pub patient: PatientArgs,

    /// Number of whole years on the curve
    #[arg(long)]
    pub years: Option<u32>,

    /// Number of Monte Carlo trajectories per time point
    #[arg(long)]
    pub simulations: Option<usize>,

    /// Seed for the random number generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output TSV path
    #[arg(long, default_value = "survival.tsv")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct ProjectArgs {
    #[command(flatten)]
    pub patient: PatientArgs,

    /// Months to project
    #[arg(long)]
    pub months: Option<u32>,
}

#[derive(Parser)]
#[command(
    name = "oncotwin",
    about = "Breast-cancer progression and treatment-response simulator",
    long_about = "Projects disease-state occupancy for a patient with a risk- and \
                 treatment-adjusted Markov model or a deterministic exponential heuristic."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Project state occupancy at a time horizon
    #[command(about = "Simulate disease progression (prints JSON state probabilities)")]
    Simulate(SimulateArgs),

    /// Estimate yearly survival with the Markov model
    #[command(about = "Estimate a survival curve (outputs: survival.tsv)")]
    Survival(SurvivalArgs),

    /// Exponential tumor-growth projection with summary metrics
    #[command(about = "Project tumor growth and survival (prints JSON)")]
    Project(ProjectArgs),

    /// Print the adjusted transition matrix
    #[command(about = "Print the patient's adjusted transition matrix (JSON)")]
    Matrix(PatientArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

struct LoadedPatient {
    features: PatientFeatures,
    plan: Option<TreatmentPlan>,
    config: SimulationConfig,
}

fn load_patient(args: &PatientArgs) -> Result<LoadedPatient, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::from_env()?,
    };
    config.validate()?;

    let record = read_record(&args.patient)?;
    record.validate(args.strict)?;
    let missing = record.missing_fields();
    if !missing.is_empty() {
        log::warn!("Defaulting missing patient fields: {}", missing.join(", "));
    }

    let plan = match &args.treatment {
        Some(treatment_type) => Some(TreatmentPlan::new(treatment_type.as_str())),
        None => record.treatment_plan.clone(),
    };

    Ok(LoadedPatient {
        features: record.normalize(),
        plan,
        config,
    })
}

fn read_record(path: &Path) -> Result<PatientRecord, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read patient record {}: {err}", path.display()))?;
    let record = serde_json::from_str(&text)
        .map_err(|err| format!("Failed to parse patient record {}: {err}", path.display()))?;
    Ok(record)
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_patient(&args.patient)?;
    let config = &loaded.config;

    let mode = match args.mode {
        Some(mode) => mode.into(),
        None => config.simulation_mode()?,
    };
    let months = args.months.unwrap_or(config.months);
    let n_simulations = args.simulations.unwrap_or(config.n_simulations);
    if mode == SimulationMode::Markov {
        config.check_simulation_count(n_simulations)?;
    }

    let simulator = ProgressionSimulator::new(mode);
    let mut rng = seeded_rng(args.seed.or(config.seed));
    let result = simulator.simulate_progression(
        &loaded.features,
        loaded.plan.as_ref(),
        months,
        n_simulations,
        &mut rng,
    )?;
    print_json(&result)
}

pub fn survival(args: SurvivalArgs) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_patient(&args.patient)?;
    let config = &loaded.config;

    let years = args.years.unwrap_or(config.survival_years);
    config.check_survival_years(years)?;
    let n_simulations = args.simulations.unwrap_or(config.n_simulations);
    config.check_simulation_count(n_simulations)?;

    let simulator = ProgressionSimulator::new(SimulationMode::Markov);
    let mut rng = seeded_rng(args.seed.or(config.seed));
    let curve = simulator.survival_curve(
        &loaded.features,
        loaded.plan.as_ref(),
        years,
        n_simulations,
        &mut rng,
    )?;

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(&args.output)?;
    writer.write_record(["year", "months", "survival"])?;
    for (year, survival) in &curve {
        writer.write_record([
            year.to_string(),
            (year * MONTHS_PER_YEAR).to_string(),
            format!("{survival:.6}"),
        ])?;
    }
    writer.flush()?;
    println!("Survival curve written to {}", args.output.display());
    Ok(())
}

#[derive(Serialize)]
struct ProjectionReport {
    #[serde(flatten)]
    projection: ExponentialProjection,
    metrics: ProgressionMetrics,
}

pub fn project_growth(args: ProjectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_patient(&args.patient)?;
    let months = args.months.unwrap_or(loaded.config.months);
    let projection = project(&loaded.features, months);
    let metrics = trajectory_metrics(&projection.tumor_sizes_mm);
    print_json(&ProjectionReport {
        projection,
        metrics,
    })
}

pub fn matrix(args: PatientArgs) -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_patient(&args)?;
    let matrix = ProgressionSimulator::new(SimulationMode::Markov)
        .markov_matrix(&loaded.features, loaded.plan.as_ref());
    print_json(&matrix.to_nested_map())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Simulate(args)) => simulate(args),
        Some(Commands::Survival(args)) => survival(args),
        Some(Commands::Project(args)) => project_growth(args),
        Some(Commands::Matrix(args)) => matrix(args),
        Some(Commands::Version) => {
            println!("oncotwin {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
