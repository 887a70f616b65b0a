use clap::Parser;
use relaxer::config::{Fill, RunConfig};
use relaxer::error::Result;
use relaxer::grid::Grid;
use relaxer::output;
use relaxer::solver::distributed::{self, RelaxOutcome};
use relaxer::solver::serial;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Relax a square grid to a steady state across cooperating workers
#[derive(Parser)]
#[command(name = "relaxer", version)]
struct Cli {
    /// Size of the square grid
    #[arg(short = 's', long, default_value_t = 100)]
    size: usize,

    /// Stop once no cell changes by more than this between sweeps
    #[arg(short = 'p', long, default_value_t = 1.5)]
    precision: f64,

    /// Fill the grid randomly with this seed (0 uses the current time)
    /// instead of the fixed boundary pattern
    #[arg(short = 'r', long)]
    seed: Option<u64>,

    /// Log progress and print the initial and final grids
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Check the result against a single-grid serial relaxation
    #[arg(short = 'c', long)]
    check: bool,

    /// Number of in-process workers
    #[arg(short = 'w', long, default_value_t = 4)]
    workers: usize,

    /// Give up after this many sweeps
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Write the final grid as CSV to this file
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Print performance stats to stderr
    #[arg(long)]
    stats: bool,

    /// Run as one rank of an MPI world instead of spawning threads
    #[cfg(feature = "distributed")]
    #[arg(long)]
    mpi: bool,
}

impl Cli {
    fn config(&self) -> RunConfig {
        RunConfig {
            size: self.size,
            precision: self.precision,
            workers: self.workers,
            fill: match self.seed {
                Some(seed) => Fill::Random { seed },
                None => Fill::Pattern,
            },
            check: self.check,
            verbose: self.verbose,
            max_iterations: self.max_iterations,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("relaxer=debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config();
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        std::process::exit(2);
    }

    let start = Instant::now();

    if try_run_mpi(&cli, &config, start) {
        return;
    }

    let initial = config.initial_grid().unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1);
    });
    let reference = initial.clone();
    show_initial(&config, &initial);

    let outcome = distributed::run_threaded(&config, initial).unwrap_or_else(|e| {
        eprintln!("Relaxation error: {}", e);
        std::process::exit(1);
    });

    report(&cli, &config, &reference, outcome, start, config.workers).unwrap_or_else(|e| {
        eprintln!("Output error: {}", e);
        std::process::exit(1);
    });
}

#[cfg(not(feature = "distributed"))]
fn try_run_mpi(_cli: &Cli, _config: &RunConfig, _start: Instant) -> bool {
    false
}

/// Run as one MPI rank when `--mpi` was given. Returns false otherwise.
#[cfg(feature = "distributed")]
fn try_run_mpi(cli: &Cli, config: &RunConfig, start: Instant) -> bool {
    use relaxer::solver::comm::CommunicationBackend;
    use relaxer::solver::comm_mpi::MpiComm;

    if !cli.mpi {
        return false;
    }

    let _universe = mpi::initialize().unwrap_or_else(|| {
        eprintln!("MPI initialization failed");
        std::process::exit(1);
    });
    let comm = MpiComm::new();

    let initial = if comm.rank() == 0 {
        let grid = config.initial_grid().unwrap_or_else(|e| {
            eprintln!("{}", e);
            std::process::exit(1);
        });
        show_initial(config, &grid);
        Some(grid)
    } else {
        None
    };
    let reference = initial.clone();

    let outcome = distributed::run_worker(&comm, config, initial).unwrap_or_else(|e| {
        eprintln!("Relaxation error (rank {}): {}", comm.rank(), e);
        std::process::exit(1);
    });

    if let Some(reference) = reference {
        report(cli, config, &reference, outcome, start, comm.num_ranks()).unwrap_or_else(|e| {
            eprintln!("Output error: {}", e);
            std::process::exit(1);
        });
    }
    true
}

fn show_initial(config: &RunConfig, initial: &Grid) {
    if !config.verbose {
        return;
    }
    println!(
        "Starting to relax {} square array to precision {}.",
        config.size, config.precision
    );
    println!("Initial array:");
    let _ = output::write_grid(initial, &mut io::stdout().lock());
}

/// Coordinator-side reporting once the run has finished.
fn report(
    cli: &Cli,
    config: &RunConfig,
    initial: &Grid,
    mut outcome: RelaxOutcome,
    start: Instant,
    workers: usize,
) -> Result<()> {
    let Some(grid) = outcome.grid.take() else {
        return Ok(());
    };
    let mut stdout = io::stdout().lock();

    if config.verbose {
        writeln!(stdout, "Parallel result:")?;
        output::write_grid(&grid, &mut stdout)?;
    }

    if config.check {
        let check_start = Instant::now();
        let (expected, _) = serial::relax(initial, config.precision, config.max_iterations)?;
        let matched = serial::matches(&grid, &expected, config.precision);
        outcome.stats.add_phase("Serial check", check_start.elapsed());
        writeln!(
            stdout,
            "Parallel result {} the serial result",
            if matched { "matched" } else { "didn't match" }
        )?;
    }

    if let Some(path) = &cli.output {
        let mut writer = BufWriter::new(File::create(path)?);
        output::write_grid_csv(&grid, &mut writer)?;
        writer.flush()?;
    }

    writeln!(
        stdout,
        "Relaxed {} square matrix in {:.6} seconds (workers: {}, iterations: {})",
        config.size,
        start.elapsed().as_secs_f64(),
        workers,
        outcome.iterations
    )?;

    if cli.stats {
        outcome.stats.display();
    }
    Ok(())
}
