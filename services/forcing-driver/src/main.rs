//! Forcing assembly driver.
//!
//! - `check` loads a configuration, verifies every static input the selected
//!   options need and summarises each product and the grid decomposition
//! - `plan` walks an output window and reports the input brackets each
//!   product would use, without decoding anything

mod plan;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use forcing_engine::{
    configured_steps, init_forcings, parse_time, CycleBracketResolver, DomainDecomposition,
    ForcingConfig, ForcingError, GridMetadata, OutputClock,
};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "forcing-driver")]
#[command(about = "Check and dry-run forcing assembly configurations", long_about = None)]
struct Cli {
    /// Forcing configuration file
    #[arg(short, long, env = "FORCING_CONFIG", default_value = "config/forcing.yaml")]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate the configuration and static inputs
    Check {
        /// Number of processes the model grid is split across
        #[arg(short, long, default_value = "1")]
        ranks: usize,
    },

    /// Show the input brackets for every output time in a window
    Plan {
        /// First output time (RFC 3339 or YYYYMMDDHHMM)
        #[arg(short, long)]
        start: String,

        /// Last output time
        #[arg(short, long)]
        end: String,

        /// Forecast cycle to read from (default: start)
        #[arg(long)]
        cycle: Option<String>,

        /// Output format: table (default), json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli) {
        // Configuration errors exit with 2, processing errors with 1.
        let code = match e.downcast_ref::<ForcingError>() {
            Some(fe) => {
                error!(category = ?fe.category(), error = %fe, "Forcing driver failed");
                match fe.category() {
                    forcing_engine::ErrorCategory::Configuration => 2,
                    forcing_engine::ErrorCategory::Processing => 1,
                }
            }
            None => {
                error!(error = %e, "Forcing driver failed");
                1
            }
        };
        eprintln!("Error: {:#}", e);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ForcingConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    match cli.command {
        Commands::Check { ranks } => check(&config, ranks),
        Commands::Plan {
            start,
            end,
            cycle,
            output,
        } => {
            let start = parse_time(&start)?;
            let end = parse_time(&end)?;
            let cycle = cycle.as_deref().map(parse_time).transpose()?.unwrap_or(start);
            plan(&config, start, end, cycle, &output)
        }
    }
}

fn check(config: &ForcingConfig, ranks: usize) -> Result<()> {
    let (nx, ny) = (config.grid.nx_global, config.grid.ny_global);

    println!("Grid: {} x {} split across {} process(es)", nx, ny, ranks);
    for rank in 0..ranks {
        let slab = GridMetadata::decompose(nx, ny, DomainDecomposition { rank, size: ranks })?;
        println!(
            "  rank {:>3}: rows {}..{} ({} rows)",
            rank, slab.y_lower_bound, slab.y_upper_bound, slab.ny_local
        );
    }

    let grid = GridMetadata::decompose(nx, ny, DomainDecomposition { rank: 0, size: ranks })?;
    let states = init_forcings(config, &grid)?;
    info!(products = states.len(), "Configuration check passed");

    println!();
    println!("Products ({}):", states.len());
    for (key, state) in &states {
        let spec = state.spec();
        println!("  [{:>2}] {} ({:?}, {})", key.code(), spec.name, spec.kind, spec.encoding);
        println!("       input:         {}", state.input_dir.join(&state.file_template).display());
        println!(
            "       horizon:       {} min, cycle offset {} min, output every {} min",
            state.forecast_horizon_minutes,
            state.cycle_offset_minutes,
            state.output_frequency_minutes
        );
        println!(
            "       interpolation: {:?}, regrid {:?}",
            state.options.temporal_interpolation, state.options.regrid
        );
        let steps = configured_steps(&state.options);
        if !steps.is_empty() {
            println!("       post-process:  {:?}", steps);
        }
        if let Some(path) = &state.auxiliary().lapse_rate_grid {
            println!("       lapse rates:   {}", path.display());
        }
    }

    println!();
    println!("OK");
    Ok(())
}

fn plan(
    config: &ForcingConfig,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cycle: DateTime<Utc>,
    output: &str,
) -> Result<()> {
    let grid = GridMetadata::serial(config.grid.nx_global, config.grid.ny_global);
    let mut states = init_forcings(config, &grid)?;
    let clock = OutputClock::new(start, end, config.output_frequency_minutes)?;
    let resolver = CycleBracketResolver::new(cycle);

    info!(start = %start, end = %end, cycle = %resolver.forecast_cycle(), steps = clock.remaining(), "Planning output window");
    let entries = plan::plan_window(&mut states, &resolver, &DomainDecomposition::serial(), clock)?;

    match output {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => print!("{}", plan::format_table(&entries)),
    }

    let skipped = entries.iter().filter(|e| !e.ready).count();
    let regrids: usize = entries.iter().map(plan::PlanEntry::regrid_count).sum();
    info!(entries = entries.len(), skipped = skipped, regrids = regrids, "Plan complete");
    Ok(())
}
