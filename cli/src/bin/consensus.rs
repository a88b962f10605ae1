use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use consensus::{load_mask_stack, ContourSet, DecisionMode, LabelPipeline, SimilarityMetrics};
use consensus_cli::AggregationJob;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build consensus boundary labels from a job file
    Aggregate {
        /// Path to the TOML or JSON job file
        #[arg(short, long)]
        job: PathBuf,
        /// Override the decision mode from the job file
        #[arg(long)]
        mode: Option<DecisionMode>,
    },
    /// Compare predicted boundary masks against ground truth
    Evaluate {
        /// Ground-truth boundary images, one per slice
        #[arg(short, long, num_args = 1.., required = true)]
        truth: Vec<PathBuf>,
        /// Predicted boundary images, same order as --truth
        #[arg(short, long, num_args = 1.., required = true)]
        prediction: Vec<PathBuf>,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the JSON schema of the job file
    Schema,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Aggregate { job, mode } => aggregate(job, *mode)?,
        Commands::Evaluate { truth, prediction, output } => evaluate(truth, prediction, output.as_deref())?,
        Commands::Schema => {
            let schema = schemars::schema_for!(AggregationJob);
            println!("{}", serde_json::to_string_pretty(&schema)?);
        }
    }

    Ok(())
}

fn aggregate(job_path: &Path, mode: Option<DecisionMode>) -> Result<()> {
    let mut job = AggregationJob::from_file(job_path)?;
    if let Some(mode) = mode {
        job.consensus.mode = mode;
    }
    let base_dir = job_path.parent().unwrap_or_else(|| Path::new("."));

    let pipeline = LabelPipeline::builder()
        .with_config(&job.consensus)?
        .border_width(job.border_width()?)
        .pixel_size(job.pixel_size())
        .build();
    info!("{}", pipeline.info());

    let mut slices = Vec::with_capacity(job.slices.len());
    let mut unreadable = 0;
    for entry in &job.slices {
        match job.load_slice(entry, base_dir) {
            Ok(slice) => slices.push(slice),
            Err(e) => {
                error!("Could not read annotations for slice '{}': {}", entry.name, e);
                unreadable += 1;
            }
        }
    }

    let report = pipeline.process_batch(&slices);
    let output_dir = base_dir.join(&job.output_dir);

    for label in &report.labels {
        let path = label.save(&output_dir)?;
        info!("Saved label '{}' -> {}", label.name, path.display());

        if job.export_contours {
            let contours = pipeline.reconstructor().mask_contours(&label.interior)?;
            let set = ContourSet::new(label.name.clone(), contours, label.width(), label.height());
            set.save_geojson(output_dir.join(format!("{}.geojson", label.name)))?;
        }
    }

    info!(
        "Built {} of {} labels",
        report.labels.len(),
        job.slices.len()
    );
    if report.missing_count() > 0 {
        warn!(
            "{} slices had no annotators: {}",
            report.missing_count(),
            report.missing().collect::<Vec<_>>().join(", ")
        );
    }
    if report.malformed_count() > 0 {
        warn!(
            "{} slices had malformed annotations: {}",
            report.malformed_count(),
            report.malformed().collect::<Vec<_>>().join(", ")
        );
    }
    if report.other_count() > 0 || unreadable > 0 {
        warn!("{} slices failed for other reasons", report.other_count() + unreadable);
    }

    Ok(())
}

fn evaluate(truth: &[PathBuf], prediction: &[PathBuf], output: Option<&Path>) -> Result<()> {
    if truth.len() != prediction.len() {
        return Err(eyre!(
            "{} truth slices but {} prediction slices",
            truth.len(),
            prediction.len()
        ));
    }

    let truth = load_mask_stack(truth)?;
    let prediction = load_mask_stack(prediction)?;
    let report = SimilarityMetrics::default().evaluate(&truth, &prediction)?;
    let json = serde_json::to_string_pretty(&report)?;

    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            info!("Wrote evaluation report to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
