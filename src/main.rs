use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use log::{error, info};
use serde::Serialize;

use mlp_infer::{EvalReport, Execution, InferConfig, Kernel, Mlp, Mnist, Split, metrics};

const NUM_CLASSES: usize = 10;

/// Classify the MNIST test split with a pre-trained HBNN model.
#[derive(Debug, Parser)]
#[command(name = "mlp-infer", version, about)]
struct Args {
    /// Path to the HBNN weight file.
    #[arg(long, default_value = "scripts/mnist_mlp.bin")]
    model: PathBuf,

    /// Directory holding the raw MNIST IDX files.
    #[arg(long, default_value = "data/MNIST/raw")]
    data: PathBuf,

    /// Width of the hidden layer.
    #[arg(long, default_value_t = 128)]
    hidden: usize,

    /// Dot-product kernel: auto, scalar, lanes, avx2 or neon.
    #[arg(long, default_value = "auto")]
    kernel: Kernel,

    /// serial or parallel.
    #[arg(long, default_value = "parallel")]
    execution: Execution,

    /// Worker threads for parallel execution (defaults to one per core).
    #[arg(long)]
    threads: Option<usize>,

    /// Print a JSON summary on stdout instead of logging it.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    kernel: String,
    execution: String,
    elapsed_ms: f64,
    #[serde(flatten)]
    eval: EvalReport,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> mlp_infer::Result<()> {
    #[cfg(feature = "parallel")]
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| mlp_infer::Error::InvalidConfig(format!("thread pool: {e}")))?;
    }
    #[cfg(not(feature = "parallel"))]
    if args.threads.is_some() {
        log::warn!("--threads ignored: built without the `parallel` feature");
    }

    info!("loading MNIST test split from {}", args.data.display());
    let dataset = Mnist::load(&args.data, Split::Test)?;

    let config = InferConfig {
        kernel: args.kernel,
        execution: args.execution,
    };
    let mut mlp =
        Mlp::new(&[dataset.images.features(), args.hidden, NUM_CLASSES])?.with_config(config)?;
    info!("loading model from {}", args.model.display());
    mlp.load(&args.model)?;

    let n = dataset.len();
    let mut classes = Vec::with_capacity(n);
    let start = Instant::now();
    mlp.classify_batch(n, dataset.images.as_slice(), &mut classes)?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let eval = metrics::evaluate(&classes, &dataset.labels, NUM_CLASSES)?;
    if args.json {
        let summary = Summary {
            kernel: config.kernel.to_string(),
            execution: config.execution.to_string(),
            elapsed_ms,
            eval,
        };
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| mlp_infer::Error::InvalidData(format!("failed to render summary: {e}")))?;
        println!("{json}");
    } else {
        info!(
            "kernel={} execution={} samples={} elapsed_ms={elapsed_ms:.3} accuracy={:.4}",
            config.kernel, config.execution, eval.samples, eval.accuracy
        );
    }
    Ok(())
}
