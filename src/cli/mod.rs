//! autoop CLI Module
//!
//! Command-line interface for registering datasets, training pipelines and
//! predicting with saved ones.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifact::{ArtifactStore, AutoMLSystem, Storage};
use crate::dataset::Dataset;
use crate::features::{detect_feature_types, Feature};
use crate::metrics::{Metric, MetricKind};
use crate::pipeline::{MetricScore, Pipeline, PipelineConfig, RestoredPipeline};
use crate::training::{Hyperparameters, ModelKind, TaskKind};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "autoop")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Tabular AutoML pipelines with a local artifact store")]
#[command(long_about = None)]
pub struct Cli {
    /// Assets root (overrides the config file and AUTOOP_ASSETS)
    #[arg(long, global = true)]
    pub assets: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage registered datasets
    Datasets {
        #[command(subcommand)]
        action: DatasetAction,
    },

    /// Show the detected kind of every column
    Detect {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Train and evaluate a pipeline
    Train {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long)]
        target: String,

        /// Comma-separated input columns (default: every other detected column)
        #[arg(short, long, value_delimiter = ',')]
        inputs: Vec<String>,

        /// Model (linear, elastic_net, logistic, knn, nearest_centroid, random_forest)
        #[arg(short, long)]
        model: String,

        /// Metric, repeatable (default: every metric for the model's task)
        #[arg(long = "metric")]
        metrics: Vec<String>,

        /// Train fraction in (0, 1)
        #[arg(long)]
        split: Option<f64>,

        /// Hyperparameter as key=value, repeatable
        #[arg(long = "param")]
        params: Vec<String>,

        /// Save the pipeline's artifacts under this name
        #[arg(long)]
        save: Option<String>,
    },

    /// Manage stored artifacts
    Artifacts {
        #[command(subcommand)]
        action: ArtifactAction,
    },

    /// Predict with a saved pipeline
    Predict {
        /// Name the pipeline was saved under
        #[arg(short, long)]
        pipeline: String,

        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// List available models and metrics
    Models,
}

#[derive(Subcommand)]
pub enum DatasetAction {
    /// Register a CSV file
    Add {
        #[arg(short, long)]
        file: PathBuf,

        /// Dataset name (default: file stem)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List registered datasets
    List,
}

#[derive(Subcommand)]
pub enum ArtifactAction {
    /// List artifacts
    List {
        /// Only this type tag
        #[arg(short = 't', long = "type")]
        type_tag: Option<String>,
    },
    /// Delete an artifact by id
    Delete { id: String },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    step_run("Loading data");
    let start = Instant::now();
    let dataset = Dataset::from_csv_path(path)?;
    let df = dataset.read()?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        df.height(),
        df.width(),
        start.elapsed()
    ));
    Ok(dataset)
}

pub fn cmd_datasets<S: Storage>(system: &AutoMLSystem<S>, action: &DatasetAction) -> anyhow::Result<()> {
    match action {
        DatasetAction::Add { file, name } => {
            section("Add dataset");
            let mut dataset = load_dataset(file)?;
            if let Some(name) = name {
                dataset = Dataset::from_csv_bytes(
                    name.clone(),
                    format!("datasets/{}.csv", name),
                    dataset.bytes().to_vec(),
                );
            }
            let id = system.add_dataset(&dataset)?;
            step_ok(&format!("registered {} {}", dataset.name().white().bold(), dim(&id)));
        }
        DatasetAction::List => {
            section("Datasets");
            let datasets = system.datasets()?;
            if datasets.is_empty() {
                println!("  {}", muted("no datasets registered"));
            }
            for dataset in datasets {
                println!(
                    "  {:<24} {:<32} {} {}",
                    dataset.name().white(),
                    muted(dataset.asset_path()),
                    dim(dataset.version()),
                    dim(&format!("{} bytes", dataset.bytes().len()))
                );
            }
        }
    }
    println!();
    Ok(())
}

pub fn cmd_detect(data_path: &Path) -> anyhow::Result<()> {
    section("Detect");
    let dataset = load_dataset(data_path)?;
    let columns: Vec<String> = dataset
        .read()?
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();
    let features = detect_feature_types(&dataset)?;

    println!();
    for column in &columns {
        match features.iter().find(|f| &f.name == column) {
            Some(feature) => kv(column, &feature.kind.to_string()),
            None => println!("  {:<16} {}", muted(column), "skipped".yellow()),
        }
    }
    println!();
    Ok(())
}

fn select_inputs(features: &[Feature], target: &str, requested: &[String]) -> anyhow::Result<Vec<Feature>> {
    if requested.is_empty() {
        return Ok(features.iter().filter(|f| f.name != target).cloned().collect());
    }
    requested
        .iter()
        .map(|name| {
            features
                .iter()
                .find(|f| &f.name == name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("input column '{}' was not detected", name))
        })
        .collect()
}

fn print_scores(title: &str, scores: &[MetricScore]) {
    println!();
    println!("  {}", title.white().bold());
    for score in scores {
        println!(
            "  {:<24} {}",
            muted(score.kind.display_name()),
            format!("{:.4}", score.value).white().bold()
        );
    }
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_train<S: Storage>(
    system: &AutoMLSystem<S>,
    data_path: &Path,
    target: &str,
    inputs: &[String],
    model_name: &str,
    metric_names: &[String],
    split: Option<f64>,
    params: &[String],
    save: Option<&str>,
) -> anyhow::Result<()> {
    section("Train");
    let dataset = load_dataset(data_path)?;

    let kind: ModelKind = model_name.parse()?;
    let mut hyperparameters = Hyperparameters::new();
    for raw in params {
        let (key, value) = Hyperparameters::parse_assignment(raw)?;
        hyperparameters.set(key, value);
    }
    let model = system.models().lookup_with(kind, &hyperparameters)?;

    let metric_kinds: Vec<MetricKind> = if metric_names.is_empty() {
        system.metrics().for_task(kind.task_kind())
    } else {
        metric_names
            .iter()
            .map(|m| m.parse::<MetricKind>())
            .collect::<crate::error::Result<Vec<_>>>()?
    };
    let metrics: Vec<Box<dyn Metric>> = metric_kinds
        .iter()
        .map(|k| system.metrics().lookup(*k))
        .collect::<crate::error::Result<Vec<_>>>()?;

    step_run("Detecting features");
    let features = detect_feature_types(&dataset)?;
    step_done(&format!("{} usable columns", features.len()));

    let target_feature = features
        .iter()
        .find(|f| f.name == target)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("target column '{}' was not detected", target))?;
    let input_features = select_inputs(&features, target, inputs)?;

    let config = PipelineConfig::new(dataset, target_feature, model)
        .with_input_features(input_features)
        .with_metrics(metrics)
        .with_split(split.unwrap_or(system.config().default_split));
    let mut pipeline = Pipeline::new(config)?;

    step_run(&format!("Training {}", kind.display_name().cyan()));
    let start = Instant::now();
    let result = pipeline.execute()?;
    step_done(&format!("{:?}", start.elapsed()));

    print_scores("Test", &result.metrics);
    print_scores("Train", &result.train_metrics);

    if let Some(name) = save {
        println!();
        let artifacts = pipeline.artifacts(name)?;
        for artifact in &artifacts {
            system.registry().put(artifact)?;
        }
        step_ok(&format!("saved {} artifacts as {}", artifacts.len(), name.white().bold()));
    }
    println!();
    Ok(())
}

pub fn cmd_artifacts<S: Storage>(system: &AutoMLSystem<S>, action: &ArtifactAction) -> anyhow::Result<()> {
    match action {
        ArtifactAction::List { type_tag } => {
            section("Artifacts");
            let entries = system.registry().entries(type_tag.as_deref())?;
            if entries.is_empty() {
                println!("  {}", muted("no artifacts"));
            }
            for (id, entry) in entries {
                println!(
                    "  {:<32} {:<18} {} {}",
                    entry.name.white(),
                    accent(&entry.type_tag),
                    dim(&entry.version),
                    dim(&id)
                );
            }
        }
        ArtifactAction::Delete { id } => {
            section("Delete artifact");
            system.registry().delete(id)?;
            step_ok(&format!("deleted {}", dim(id)));
        }
    }
    println!();
    Ok(())
}

pub fn cmd_predict<S: Storage>(system: &AutoMLSystem<S>, pipeline_name: &str, data_path: &Path) -> anyhow::Result<()> {
    section("Predict");

    step_run(&format!("Restoring {}", pipeline_name.cyan()));
    let artifacts = system.registry().find_by_tag(pipeline_name)?;
    if artifacts.is_empty() {
        anyhow::bail!("no saved pipeline named '{}'", pipeline_name);
    }
    let restored = RestoredPipeline::from_artifacts_with(&artifacts, system.models())?;
    step_done(&format!("{} artifacts", artifacts.len()));

    let dataset = load_dataset(data_path)?;
    let labels = restored.predict_labels(&dataset)?;

    println!();
    println!("  {}", muted(&restored.manifest().target_feature.name));
    for label in labels {
        println!("  {}", label.white());
    }
    println!();
    Ok(())
}

pub fn cmd_models<S: Storage>(system: &AutoMLSystem<S>) -> anyhow::Result<()> {
    for task in [TaskKind::Classification, TaskKind::Regression] {
        section(&format!("{} ({} target)", task, match task {
            TaskKind::Classification => "categorical",
            TaskKind::Regression => "numerical",
        }));
        for kind in system.models().for_task(task) {
            println!("  {:<32} {}", kind.display_name().white(), dim(kind.slug()));
        }
        let metrics: Vec<&str> = system
            .metrics()
            .for_task(task)
            .iter()
            .map(|m| m.display_name())
            .collect();
        println!("  {:<32} {}", muted("metrics"), metrics.join(", "));
    }
    println!();
    Ok(())
}
