//! Gin rummy self-play trainer binary.
//!
//! Usage:
//!   cargo run --release --bin train_gin -- [OPTIONS]
//!
//! Options:
//!   --config <FILE>       JSON file with `trainer` and `game` sections (optional)
//!   --rounds <N>          Rounds to run
//!   --iterations <N>      Training episodes per round
//!   --eval <N>            Evaluation episodes per round (0 disables)
//!   --threads <N>         Number of threads (default: auto)
//!   --seed <N>            Random seed (optional)
//!   --policy <FILE>       Where to write the average policy each round
//!   --checkpoint <FILE>   Where to write the checkpoint each round
//!   --import <FILE>       Seed strategy weights from a policy file
//!
//! Training resumes from the checkpoint file when it already exists.
//! Set `RUST_LOG=info` (or `debug`) for per-round logging.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use serde::Deserialize;

use gin_solver::cfr::{PolicyTable, SolverError, Trainer, TrainerConfig};
use gin_solver::games::gin::{GinConfig, GinRummy};

/// Contents of the `--config` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunConfig {
    trainer: TrainerConfig,
    game: GinConfig,
}

#[derive(Debug, Default)]
struct Args {
    config_file: Option<PathBuf>,
    rounds: Option<u32>,
    iterations: Option<u64>,
    eval: Option<u64>,
    threads: Option<usize>,
    seed: Option<u64>,
    policy: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
    import: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned();
        match args[i].as_str() {
            "--config" | "-c" => parsed.config_file = value.map(PathBuf::from),
            "--rounds" | "-r" => parsed.rounds = value.and_then(|v| v.parse().ok()),
            "--iterations" | "-i" => parsed.iterations = value.and_then(|v| v.parse().ok()),
            "--eval" | "-e" => parsed.eval = value.and_then(|v| v.parse().ok()),
            "--threads" | "-t" => parsed.threads = value.and_then(|v| v.parse().ok()),
            "--seed" | "-s" => parsed.seed = value.and_then(|v| v.parse().ok()),
            "--policy" | "-p" => parsed.policy = value.map(PathBuf::from),
            "--checkpoint" => parsed.checkpoint = value.map(PathBuf::from),
            "--import" => parsed.import = value.map(PathBuf::from),
            "--help" | "-h" => {
                print_help();
                return None;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_help();
                return None;
            }
        }
        i += 2;
    }

    Some(parsed)
}

fn load_config(args: &Args) -> Result<(TrainerConfig, GinConfig), SolverError> {
    let run = match &args.config_file {
        Some(path) => {
            println!("Loading configuration from: {}", path.display());
            serde_json::from_str::<RunConfig>(&fs::read_to_string(path)?)?
        }
        None => RunConfig::default(),
    };

    let mut trainer = run.trainer;
    if let Some(rounds) = args.rounds {
        trainer = trainer.with_rounds(rounds);
    }
    if let Some(iterations) = args.iterations {
        trainer = trainer.with_iterations_per_round(iterations);
    }
    if let Some(eval) = args.eval {
        trainer = trainer.with_eval_iterations(eval);
    }
    if let Some(threads) = args.threads {
        trainer = trainer.with_threads(threads);
    }
    if let Some(seed) = args.seed {
        trainer = trainer.with_seed(seed);
    }
    if args.policy.is_some() {
        trainer.policy_path = args.policy.clone();
    }
    if args.checkpoint.is_some() {
        trainer.checkpoint_path = args.checkpoint.clone();
    }

    run.game.validate()?;
    Ok((trainer, run.game))
}

fn run(args: Args) -> Result<(), SolverError> {
    let (config, rules) = load_config(&args)?;

    println!("=================================================");
    println!("  Gin Rummy Self-Play Trainer");
    println!("=================================================");
    println!();
    println!("Rounds: {}", config.rounds);
    println!("Episodes per round: {}", config.iterations_per_round);
    println!("Evaluation episodes: {}", config.eval_iterations);
    if let Some(seed) = config.seed {
        println!("Seed: {}", seed);
    }
    println!("Knock limit: {}, gin bonus: {}, undercut bonus: {}", rules.knock_limit, rules.gin_bonus, rules.undercut_bonus);
    println!();

    let checkpoint = config.checkpoint_path.clone();
    let mut trainer = Trainer::new(GinRummy::with_config(rules), config)?;
    println!("Threads: {}", trainer.num_threads());

    match &checkpoint {
        Some(path) if path.exists() => trainer.resume(path)?,
        _ => {}
    }
    if let Some(path) = &args.import {
        let policy = PolicyTable::load(path)?;
        let seeded = trainer.import_policy(policy);
        println!("Imported {} infosets from {}", seeded, path.display());
    }

    let start = Instant::now();
    let stats = trainer.run().clone();

    println!();
    println!("Training complete!");
    println!("Total time: {:.2}s", start.elapsed().as_secs_f64());
    println!("Episodes: {} ({} aborted)", stats.iterations, stats.aborted_episodes);
    println!("Info sets: {}", stats.info_sets);
    println!("Table memory: ~{} KB", trainer.table().memory_usage() / 1024);
    println!("Average speed: {:.0} episodes/second", stats.iterations_per_second);
    println!("Mean root estimate: {:+.4}", stats.mean_estimate());

    if let Some(point) = stats.last_evaluation() {
        if let Some(u) = point.average_utility {
            println!("Last evaluation vs baseline: {:+.4}", u);
        }
        if let Some(c) = point.convergence {
            println!("Last convergence indicator: {:.3}", c);
        }
    }

    Ok(())
}

fn print_help() {
    println!("Gin Rummy Self-Play Trainer");
    println!();
    println!("Usage: train_gin [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>      JSON file with `trainer` and `game` sections");
    println!("  -r, --rounds <N>         Rounds to run");
    println!("  -i, --iterations <N>     Training episodes per round");
    println!("  -e, --eval <N>           Evaluation episodes per round (0 disables)");
    println!("  -t, --threads <N>        Number of threads (default: auto)");
    println!("  -s, --seed <N>           Random seed");
    println!("  -p, --policy <FILE>      Average policy output, rewritten each round");
    println!("      --checkpoint <FILE>  Checkpoint output; resumed from if present");
    println!("      --import <FILE>      Seed strategy weights from a policy file");
    println!("  -h, --help               Print help");
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match parse_args() {
        Some(args) => args,
        None => return ExitCode::SUCCESS,
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
