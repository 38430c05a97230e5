//! CLI subcommand handlers.

use crate::{Commands, ConfigAction, DataArgs};
use anyhow::Context;
use foldwise_core::config::{load_config, user_config_path};
use foldwise_core::estimator::{ConstantClassifier, KNearestClassifier, Pipeline, Standardize};
use foldwise_core::tuning::{
    MetricSummary, RecordStore, Simpler, TuningRun, rank, select_by_one_std_err, summarize,
    summarize_by_fold, top_n,
};
use foldwise_core::{DataSourceType, Dataset, Estimator, Metric, TuningConfig};
use std::path::Path;

/// Built-in estimators selectable from the command line.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    /// k-nearest-neighbour classifier, tuned on `neighbors`
    Knn,
    /// Majority-class baseline
    Constant,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplerArg {
    Smaller,
    Larger,
}

impl From<SimplerArg> for Simpler {
    fn from(arg: SimplerArg) -> Self {
        match arg {
            SimplerArg::Smaller => Simpler::Smaller,
            SimplerArg::Larger => Simpler::Larger,
        }
    }
}

/// Handle a CLI subcommand.
pub fn handle_command(command: Commands, config_path: Option<&Path>) -> anyhow::Result<()> {
    match command {
        Commands::Split {
            data,
            fraction,
            stratify,
            seed,
        } => {
            let dataset = load_dataset(&data)?;
            let split = foldwise_core::split(dataset.view(), fraction, stratify.as_deref(), seed)?;
            println!("{}", serde_json::to_string_pretty(&split)?);
            Ok(())
        }
        Commands::Folds {
            data,
            folds,
            repeats,
            stratify,
            seed,
        } => {
            let dataset = load_dataset(&data)?;
            let resamples = foldwise_core::repeated_kfold(
                dataset.view(),
                folds,
                repeats,
                stratify.as_deref(),
                seed,
            )?;
            println!("{}", serde_json::to_string_pretty(&resamples)?);
            Ok(())
        }
        Commands::Grid => {
            let config = load(config_path)?;
            let configurations = config.space.build(config.seed)?;
            for (i, configuration) in configurations.iter().enumerate() {
                println!("{i:>4}  {}  {configuration}", configuration.id());
            }
            Ok(())
        }
        Commands::Tune {
            data,
            estimator,
            standardize,
            records,
            report,
        } => {
            let config = load(config_path)?;
            let dataset = load_dataset(&data)?;
            let args = TuneOutput {
                records: records.as_deref(),
                report: report.as_deref(),
            };
            match (estimator, standardize) {
                (EstimatorKind::Knn, false) => tune(&dataset, &KNearestClassifier, config, args),
                (EstimatorKind::Knn, true) => tune(
                    &dataset,
                    &Pipeline::new(Standardize, KNearestClassifier),
                    config,
                    args,
                ),
                (EstimatorKind::Constant, false) => {
                    tune(&dataset, &ConstantClassifier, config, args)
                }
                (EstimatorKind::Constant, true) => tune(
                    &dataset,
                    &Pipeline::new(Standardize, ConstantClassifier),
                    config,
                    args,
                ),
            }
        }
        Commands::Summarize { records, by_fold } => {
            let records = RecordStore::load(&records)
                .with_context(|| format!("Failed to read records from {}", records.display()))?;
            if by_fold {
                for s in summarize_by_fold(&records) {
                    println!("{:<16} {:<10} mean={:.6} n={}", s.fold_id, s.metric, s.mean, s.n);
                }
            } else {
                print_summaries(&summarize(&records));
            }
            Ok(())
        }
        Commands::Select {
            records,
            metric,
            top,
            one_std_err,
            simpler,
        } => {
            let metric: Metric = metric.parse().map_err(anyhow::Error::msg)?;
            let records = RecordStore::load(&records)
                .with_context(|| format!("Failed to read records from {}", records.display()))?;
            let summaries = summarize(&records);
            let direction = metric.direction();
            print_summaries(&top_n(&summaries, metric, direction, top)?);

            let chosen = match one_std_err {
                Some(param) => {
                    select_by_one_std_err(&summaries, metric, direction, &param, simpler.into())?
                        .summary
                }
                None => rank(&summaries, metric, direction)?.remove(0),
            };
            println!();
            println!(
                "Selected: #{} [{}] {}",
                chosen.config_index, chosen.config_id, chosen.configuration
            );
            Ok(())
        }
        Commands::Config { action } => handle_config(action, config_path),
    }
}

fn handle_config(action: ConfigAction, config_path: Option<&Path>) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { path } => {
            let path = path
                .or_else(user_config_path)
                .context("Could not determine a configuration directory")?;
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml_str = toml::to_string_pretty(&TuningConfig::default())?;
            std::fs::write(&path, toml_str)?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(config_path)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load(config_path: Option<&Path>) -> anyhow::Result<TuningConfig> {
    load_config(config_path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

pub(crate) fn load_dataset(args: &DataArgs) -> anyhow::Result<Dataset> {
    let source = DataSourceType::from_path(&args.data);
    let dataset = source
        .load(&args.outcome)
        .with_context(|| format!("Failed to load dataset from {}", args.data.display()))?;
    if args.predictors.is_empty() {
        return Ok(dataset);
    }
    let names: Vec<&str> = args.predictors.iter().map(String::as_str).collect();
    Ok(dataset.with_predictors(&names)?)
}

struct TuneOutput<'a> {
    records: Option<&'a Path>,
    report: Option<&'a Path>,
}

fn tune<E: Estimator>(
    dataset: &Dataset,
    estimator: &E,
    config: TuningConfig,
    output: TuneOutput<'_>,
) -> anyhow::Result<()> {
    let outcome = TuningRun::new(config).execute(dataset, estimator)?;

    if let Some(path) = output.records {
        RecordStore::save(path, &outcome.records)?;
        tracing::info!(path = %path.display(), records = outcome.records.len(), "Wrote metric records");
    }
    let json = serde_json::to_string_pretty(&outcome.report)?;
    match output.report {
        Some(path) => {
            std::fs::write(path, json)?;
            let report = &outcome.report;
            eprintln!(
                "Best: #{} {} ({} = {:.4} ± {:.4}); report written to {}",
                report.selection.summary.config_index,
                report.selection.configuration,
                report.primary_metric,
                report.selection.summary.mean,
                report.selection.summary.std_err,
                path.display()
            );
        }
        None => println!("{json}"),
    }
    if !outcome.report.failures.is_empty() {
        eprintln!(
            "{} resample fit(s) failed; see the report for details",
            outcome.report.failures.len()
        );
    }
    Ok(())
}

fn print_summaries(summaries: &[MetricSummary]) {
    println!(
        "{:>4}  {:<12}  {:<10}  {:>10}  {:>10}  {:>3}  configuration",
        "#", "id", "metric", "mean", "std_err", "n"
    );
    for s in summaries {
        println!(
            "{:>4}  {:<12}  {:<10}  {:>10.6}  {:>10.6}  {:>3}  {}",
            s.config_index, s.config_id, s.metric, s.mean, s.std_err, s.n, s.configuration
        );
    }
}
