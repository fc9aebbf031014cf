//! Command-line interface

use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

use crate::config::TrainingConfig;
use crate::training::{Trainer, TrainingReport};

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<22} {}", muted(key), val.white());
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

#[derive(Parser)]
#[command(name = "tabular-knn", version, about = "Train a k-nearest-neighbour classifier on a schema-described CSV")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run preprocessing, rebalancing and model fitting, then save the artifacts
    Train(TrainArgs),
}

/// Path overrides for a training run. Unset paths derive from `--root`.
#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// Root of the inputs/outputs tree (defaults to $MODEL_INPUTS_OUTPUTS or ./model_inputs_outputs)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Tune k and neighbor weighting with stratified k-fold before the final fit
    #[arg(long)]
    pub run_tuning: bool,

    #[arg(long)]
    pub input_schema_dir: Option<PathBuf>,
    #[arg(long)]
    pub saved_schema_dir: Option<PathBuf>,
    #[arg(long)]
    pub model_config_file: Option<PathBuf>,
    #[arg(long)]
    pub train_dir: Option<PathBuf>,
    #[arg(long)]
    pub preprocessing_config_file: Option<PathBuf>,
    #[arg(long)]
    pub preprocessing_dir: Option<PathBuf>,
    #[arg(long)]
    pub predictor_dir: Option<PathBuf>,
    #[arg(long)]
    pub default_hyperparameters_file: Option<PathBuf>,
    #[arg(long)]
    pub hpt_config_file: Option<PathBuf>,
    #[arg(long)]
    pub hpt_results_dir: Option<PathBuf>,
    #[arg(long)]
    pub explainer_config_file: Option<PathBuf>,
    #[arg(long)]
    pub explainer_dir: Option<PathBuf>,
    #[arg(long)]
    pub train_error_file: Option<PathBuf>,
}

impl TrainArgs {
    /// Build the training configuration, applying every override that was given
    pub fn into_config(self) -> TrainingConfig {
        let mut config = match self.root {
            Some(root) => TrainingConfig::from_root(root),
            None => TrainingConfig::new(),
        }
        .with_run_tuning(self.run_tuning);

        let paths = &mut config.paths;
        let overrides = [
            (self.input_schema_dir, &mut paths.input_schema_dir),
            (self.saved_schema_dir, &mut paths.saved_schema_dir),
            (self.model_config_file, &mut paths.model_config_file),
            (self.train_dir, &mut paths.train_dir),
            (self.preprocessing_config_file, &mut paths.preprocessing_config_file),
            (self.preprocessing_dir, &mut paths.preprocessing_dir),
            (self.predictor_dir, &mut paths.predictor_dir),
            (self.default_hyperparameters_file, &mut paths.default_hyperparameters_file),
            (self.hpt_config_file, &mut paths.hpt_config_file),
            (self.hpt_results_dir, &mut paths.hpt_results_dir),
            (self.explainer_config_file, &mut paths.explainer_config_file),
            (self.explainer_dir, &mut paths.explainer_dir),
            (self.train_error_file, &mut paths.train_error_file),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }

        config
    }
}

pub fn cmd_train(args: TrainArgs) -> anyhow::Result<TrainingReport> {
    let config = args.into_config();
    section("Train");
    kv("train data", &config.paths.train_dir.display().to_string());
    kv("predictor", &config.paths.predictor_dir.display().to_string());

    let report = Trainer::new(config).run()?;

    print_report(&report);
    Ok(report)
}

fn print_report(report: &TrainingReport) {
    step_ok(&format!(
        "loaded {} rows, {} after preprocessing, {} after rebalancing",
        report.rows_loaded, report.rows_after_pipeline, report.rows_after_rebalance
    ));
    step_ok(&format!(
        "fitted k={} ({:?} weights) on {} features{}",
        report.hyperparameters.n_neighbors,
        report.hyperparameters.weights,
        report.feature_names.len(),
        if report.tuned { ", tuned" } else { "" }
    ));

    section("Classes");
    for (class, before) in &report.class_counts_before {
        let after = report.class_counts_after.get(class).copied().unwrap_or(0);
        kv(class, &format!("{} → {}", before, after));
    }
    println!();
    kv("elapsed", &format!("{:.2}s", report.elapsed_secs));
    println!();
}
