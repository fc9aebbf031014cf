//! Pipeline executor
//!
//! Runs stages in order, threading the feature table and labels through each
//! one. Label-mutating stages replace the labels together with the table.

use crate::error::{Result, TabularError};
use crate::schema::Schema;
use crate::utils::frame::has_column;
use polars::prelude::{DataFrame, Series};
use std::time::Instant;
use tracing::{debug, info};

use super::stage::{Stage, StageScope, Transform};

/// Execute `stages` over `features` and `labels`.
///
/// Every stage is checked for scope/transform agreement before any of them
/// runs. Rows of the table and the labels stay aligned after every stage.
pub fn run(
    features: DataFrame,
    labels: Series,
    schema: &Schema,
    stages: &[Stage],
) -> Result<(DataFrame, Series)> {
    check_alignment(&features, &labels, None)?;
    for stage in stages {
        stage.validate()?;
    }

    info!(
        stages = stages.len(),
        rows = features.height(),
        columns = features.width(),
        "Running preprocessing pipeline"
    );

    let mut features = features;
    let mut labels = labels;

    for stage in stages {
        let start = Instant::now();

        if let StageScope::Column(column) = stage.scope() {
            if !has_column(&features, column) {
                debug!(stage = stage.name(), column = %column, "Column no longer present, skipping stage");
                continue;
            }
        }

        let (next_features, next_labels) =
            apply(stage, features, labels, schema).map_err(|e| wrap(stage, e))?;
        if next_features.width() == 0 && !next_labels.is_empty() {
            return Err(TabularError::DataError(format!(
                "stage '{}' removed every feature column",
                stage.name()
            )));
        }
        check_alignment(&next_features, &next_labels, Some(stage))?;

        debug!(
            stage = stage.name(),
            column = stage.scope().column().unwrap_or("-"),
            rows = next_features.height(),
            columns = next_features.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Stage complete"
        );

        features = next_features;
        labels = next_labels;
    }

    info!(
        rows = features.height(),
        columns = features.width(),
        "Preprocessing pipeline complete"
    );

    Ok((features, labels))
}

fn apply(
    stage: &Stage,
    features: DataFrame,
    labels: Series,
    schema: &Schema,
) -> Result<(DataFrame, Series)> {
    match (stage.scope(), stage.transform()) {
        (StageScope::Table, Transform::Table(f)) => Ok((f(features)?, labels)),
        (StageScope::Schema, Transform::Schema(f)) => Ok((f(features, schema)?, labels)),
        (StageScope::Column(column), Transform::Column(f)) => Ok((f(features, column)?, labels)),
        (StageScope::Column(column), Transform::ColumnWithLabels(f)) => f(features, column, labels),
        // validate() rejects every other pairing up front
        _ => Err(TabularError::ConfigError(format!(
            "stage '{}' has mismatched scope and transform",
            stage.name()
        ))),
    }
}

fn wrap(stage: &Stage, error: TabularError) -> TabularError {
    TabularError::StageExecution {
        stage: stage.name().to_string(),
        column: stage.scope().column().map(str::to_string),
        source: Box::new(error),
    }
}

fn check_alignment(features: &DataFrame, labels: &Series, stage: Option<&Stage>) -> Result<()> {
    if features.height() == labels.len() {
        return Ok(());
    }
    let context = match stage {
        Some(stage) => format!(" after stage '{}'", stage.name()),
        None => String::new(),
    };
    Err(TabularError::DataError(format!(
        "feature table has {} rows but labels have {}{}",
        features.height(),
        labels.len(),
        context
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Feature, Schema};
    use polars::prelude::*;

    fn schema() -> Schema {
        Schema::new("y", vec![Feature::numeric("a"), Feature::numeric("b")]).unwrap()
    }

    fn data() -> (DataFrame, Series) {
        let df = df! {
            "a" => &[1.0, 2.0, 3.0, 4.0],
            "b" => &[10.0, 20.0, 30.0, 40.0],
        }
        .unwrap();
        let labels = Series::new("y".into(), &["p", "q", "p", "q"]);
        (df, labels)
    }

    fn double(df: DataFrame, column: &str) -> Result<DataFrame> {
        let mut df = df;
        let doubled: Float64Chunked = df
            .column(column)?
            .f64()?
            .into_iter()
            .map(|v| v.map(|x| x * 2.0))
            .collect();
        df.with_column(doubled.with_name(column.into()).into_series())?;
        Ok(df)
    }

    #[test]
    fn test_stages_run_in_order() {
        let (df, labels) = data();
        let stages = vec![
            Stage::column("double", "a", double),
            Stage::table("drop_b", |df: DataFrame| Ok(df.drop("b")?)),
            Stage::schema("check_schema", |df, schema: &Schema| {
                assert_eq!(schema.target(), "y");
                Ok(df)
            }),
        ];

        let (out, out_labels) = run(df, labels, &schema(), &stages).unwrap();
        assert_eq!(out.get_column_names_str(), vec!["a"]);
        let a: Vec<Option<f64>> = out.column("a").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(a, vec![Some(2.0), Some(4.0), Some(6.0), Some(8.0)]);
        assert_eq!(out_labels.len(), 4);
    }

    #[test]
    fn test_label_mutating_stage_keeps_alignment() {
        let (df, labels) = data();
        let stages = vec![Stage::column_with_labels("head", "a", |df: DataFrame, _: &str, labels: Series| {
            Ok((df.head(Some(2)), labels.head(Some(2))))
        })];

        let (out, out_labels) = run(df, labels, &schema(), &stages).unwrap();
        assert_eq!(out.height(), 2);
        assert_eq!(out_labels.len(), 2);
    }

    #[test]
    fn test_misaligned_stage_is_data_error() {
        let (df, labels) = data();
        let stages = vec![Stage::table("drop_row", |df: DataFrame| Ok(df.head(Some(3))))];

        let err = run(df, labels, &schema(), &stages).unwrap_err();
        assert!(matches!(err, TabularError::DataError(msg) if msg.contains("drop_row")));
    }

    #[test]
    fn test_stage_dropping_every_column_is_data_error() {
        let (df, labels) = data();
        let stages = vec![Stage::table("drop_all", |df: DataFrame| Ok(df.drop_many(["a", "b"])))];

        let err = run(df, labels, &schema(), &stages).unwrap_err();
        assert!(matches!(&err, TabularError::DataError(msg) if msg.contains("drop_all")));
        assert!(err.to_string().contains("removed every feature column"));
    }

    #[test]
    fn test_mismatched_stage_rejected_before_running() {
        let (df, labels) = data();
        let stages = vec![
            Stage::table("panic_if_run", |_| panic!("must not run")),
            Stage::new("bad", StageScope::Schema, Transform::table(Ok)),
        ];

        let err = run(df, labels, &schema(), &stages).unwrap_err();
        assert!(matches!(err, TabularError::ConfigError(_)));
    }

    #[test]
    fn test_failure_names_stage_and_column() {
        let (df, labels) = data();
        let stages = vec![Stage::column("explode", "b", |_, _| {
            Err(TabularError::DataError("boom".to_string()))
        })];

        let err = run(df, labels, &schema(), &stages).unwrap_err();
        match &err {
            TabularError::StageExecution { stage, column, source } => {
                assert_eq!(stage, "explode");
                assert_eq!(column.as_deref(), Some("b"));
                assert!(matches!(**source, TabularError::DataError(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_missing_column_is_skipped() {
        let (df, labels) = data();
        let stages = vec![
            Stage::table("drop_a", |df: DataFrame| Ok(df.drop("a")?)),
            Stage::column("double", "a", double),
        ];

        let (out, _) = run(df, labels, &schema(), &stages).unwrap();
        assert_eq!(out.get_column_names_str(), vec!["b"]);
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let (df, labels) = data();
        let (out, out_labels) = run(df.clone(), labels.clone(), &schema(), &[]).unwrap();
        assert!(out.equals(&df));
        assert!(out_labels.equals(&labels));
    }
}
