use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{error, info};

use measure::runtime::boot::{init_logging, Timer};
use measure::sampling::build_model;
use measure::{LineFilter, MeasureAccuracy, MeasureConfig, MemoryLineStore, TaskPool, TrainSampleMethod};

#[derive(Parser)]
#[command(name = "measure")]
#[command(version)]
#[command(about = "Measure accuracy of CRF-based log template estimation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one measurement and print its report
    Run {
        /// Config file (default: measure.toml or config/measure.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also write per-trial results as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Run several measurements through a bounded pool
    Multi {
        /// Config files, one measurement each
        #[arg(required = true)]
        configs: Vec<PathBuf>,

        /// Concurrent measurements (default: parallelism of the first config)
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Directory receiving one result_<name> report per config
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Train a model on lines sampled from the corpus
    MakeModel {
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Selection rules, e.g. "host=web01, end_date=2020-01-31"
        #[arg(long, default_value = "")]
        rules: String,

        #[arg(long, default_value_t = 1000)]
        size: usize,

        /// all | random
        #[arg(long, default_value = "random")]
        method: TrainSampleMethod,

        /// Model path (default: miner.crf.model_filename)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> Result<MeasureConfig> {
    let conf = match path {
        Some(p) => MeasureConfig::from_file(p).with_context(|| format!("loading {}", p.display()))?,
        None => MeasureConfig::load()?,
    };
    conf.validate()?;
    Ok(conf)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config, json } => run(config, json).await,
        Commands::Multi {
            configs,
            parallel,
            output_dir,
        } => multi(configs, parallel, output_dir).await,
        Commands::MakeModel {
            config,
            rules,
            size,
            method,
            output,
        } => make_model(config, rules, size, method, output),
    }
}

async fn run(config: Option<PathBuf>, json: Option<PathBuf>) -> Result<()> {
    let conf = load_config(config.as_deref())?;
    init_logging(&conf.logging);

    let timer = Timer::start("measure-crf");
    let measure = tokio::task::spawn_blocking(move || MeasureAccuracy::run(conf))
        .await
        .context("measurement task failed")??;
    println!("{}", measure.info());
    println!();
    println!("{}", measure.result()?);

    if let Some(path) = json {
        let encoded = serde_json::to_string_pretty(measure.results())?;
        std::fs::write(&path, encoded).with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote trial results");
    }
    timer.stop();
    Ok(())
}

async fn multi(paths: Vec<PathBuf>, parallel: Option<usize>, output_dir: PathBuf) -> Result<()> {
    let mut confs = Vec::with_capacity(paths.len());
    for path in &paths {
        confs.push(load_config(Some(path))?);
    }
    let Some(first) = confs.first() else {
        bail!("No configuration file is given");
    };
    init_logging(&first.logging);
    let limit = parallel.unwrap_or(first.parallelism);

    let mut models = HashSet::new();
    for (path, conf) in paths.iter().zip(&confs) {
        if !models.insert(conf.trial_model_path(0)) {
            bail!(
                "{} shares its model file with another config; results would overwrite each other",
                path.display()
            );
        }
    }

    let jobs = paths
        .iter()
        .zip(confs)
        .map(|(path, conf)| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let job = move || -> measure::Result<String> {
                let measure = MeasureAccuracy::run(conf)?;
                Ok(format!("{}\n\n{}\n", measure.info(), measure.result()?))
            };
            (name, job)
        })
        .collect();

    let timer = Timer::start("measure-crf-multi");
    let pool = TaskPool::new(limit);
    info!(limit = pool.limit(), "task pool ready");
    let outcomes = pool.run(jobs).await?;
    std::fs::create_dir_all(&output_dir)?;

    let mut failed = 0usize;
    for (name, outcome) in outcomes {
        match outcome {
            Ok(report) => {
                let path = output_dir.join(format!("result_{}", name));
                std::fs::write(&path, report).with_context(|| format!("writing {}", path.display()))?;
                println!("> {}", path.display());
            }
            Err(e) => {
                error!(config = %name, error = %e, "measurement failed");
                failed += 1;
            }
        }
    }
    timer.stop();

    if failed > 0 {
        bail!("{} of {} measurements failed", failed, paths.len());
    }
    Ok(())
}

fn make_model(
    config: Option<PathBuf>,
    rules: String,
    size: usize,
    method: TrainSampleMethod,
    output: Option<PathBuf>,
) -> Result<()> {
    let conf = load_config(config.as_deref())?;
    init_logging(&conf.logging);

    let filter = LineFilter::parse(&rules)?;
    let store = MemoryLineStore::from_corpus(&conf.corpus_path)?.with_areas(conf.areas.clone());
    let pool = store.select(&filter)?;
    let model = output.unwrap_or_else(|| PathBuf::from(&conf.miner.crf.model_filename));
    let mut rng = ChaCha8Rng::seed_from_u64(conf.seed);

    let path = build_model(&conf.miner.crf, &model, &pool, size, method, &mut rng)?;
    println!("> {}", path.display());
    Ok(())
}
