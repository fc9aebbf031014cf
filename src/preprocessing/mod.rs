//! Data preprocessing module
//!
//! A preprocessing pipeline is an ordered list of [`Stage`]s. Each stage is a
//! transformation tagged with the scope it runs in:
//! - `NONE`: once over the whole feature table
//! - `SCHEMA`: once over the whole table, with the schema
//! - `COLUMN`: once for a named column; label-mutating column stages may drop
//!   rows and return the reduced labels alongside the table
//!
//! [`StageRegistry`] builds the pipeline for a schema and [`executor::run`]
//! threads the data through it.

mod config;
mod scaler;
mod stage;
pub mod executor;
pub mod registry;
pub mod transforms;

pub use config::PreprocessingConfig;
pub use executor::run;
pub use registry::{build_pipeline, PipelinePlan, StageRegistry, PIPELINE_FILE_NAME};
pub use scaler::{Scaler, ScalerParams, ScalerType};
pub use stage::{ScopeTag, Stage, StageScope, StageSpec, Transform};
pub use transforms::ImputeStrategy;
