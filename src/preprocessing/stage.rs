//! Pipeline stage descriptors
//!
//! A [`Stage`] pairs a transformation with the scope it must be invoked in.
//! The scope and the transform signature are both plain data, so the executor
//! can dispatch on them without looking at stage names.

use crate::error::{Result, TabularError};
use crate::schema::Schema;
use polars::prelude::{DataFrame, Series};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Whole-table transformation
pub type TableFn = Arc<dyn Fn(DataFrame) -> Result<DataFrame> + Send + Sync>;

/// Transformation that needs the schema
pub type SchemaFn = Arc<dyn Fn(DataFrame, &Schema) -> Result<DataFrame> + Send + Sync>;

/// Transformation of a single named column
pub type ColumnFn = Arc<dyn Fn(DataFrame, &str) -> Result<DataFrame> + Send + Sync>;

/// Column transformation that may drop rows and therefore rewrites the labels
pub type LabelledColumnFn =
    Arc<dyn Fn(DataFrame, &str, Series) -> Result<(DataFrame, Series)> + Send + Sync>;

/// Scope tag as written in stage plans: `NONE`, `SCHEMA` or `COLUMN`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScopeTag {
    None,
    Schema,
    Column,
}

impl ScopeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeTag::None => "NONE",
            ScopeTag::Schema => "SCHEMA",
            ScopeTag::Column => "COLUMN",
        }
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeTag {
    type Err = TabularError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(ScopeTag::None),
            "SCHEMA" => Ok(ScopeTag::Schema),
            "COLUMN" => Ok(ScopeTag::Column),
            other => Err(TabularError::ConfigError(format!("unrecognized scope tag '{}'", other))),
        }
    }
}

/// How a stage is invoked
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageScope {
    /// Applied once to the whole table
    Table,
    /// Applied once to the whole table, with the schema
    Schema,
    /// Applied to the named column
    Column(String),
}

impl StageScope {
    /// Build a scope from a tag and an optional column name
    pub fn from_tag(tag: ScopeTag, column: Option<&str>) -> Result<Self> {
        match (tag, column) {
            (ScopeTag::None, None) => Ok(StageScope::Table),
            (ScopeTag::Schema, None) => Ok(StageScope::Schema),
            (ScopeTag::Column, Some(c)) if !c.trim().is_empty() => Ok(StageScope::Column(c.to_string())),
            (ScopeTag::Column, _) => Err(TabularError::ConfigError(
                "COLUMN scope requires a column name".to_string(),
            )),
            (tag, Some(c)) => Err(TabularError::ConfigError(format!(
                "{} scope does not take a column (got '{}')",
                tag, c
            ))),
        }
    }

    pub fn tag(&self) -> ScopeTag {
        match self {
            StageScope::Table => ScopeTag::None,
            StageScope::Schema => ScopeTag::Schema,
            StageScope::Column(_) => ScopeTag::Column,
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            StageScope::Column(c) => Some(c.as_str()),
            _ => None,
        }
    }
}

/// A transformation together with its call signature
#[derive(Clone)]
pub enum Transform {
    Table(TableFn),
    Schema(SchemaFn),
    Column(ColumnFn),
    /// Column-scoped and label-mutating
    ColumnWithLabels(LabelledColumnFn),
}

impl Transform {
    pub fn table<F>(f: F) -> Self
    where
        F: Fn(DataFrame) -> Result<DataFrame> + Send + Sync + 'static,
    {
        Transform::Table(Arc::new(f))
    }

    pub fn schema<F>(f: F) -> Self
    where
        F: Fn(DataFrame, &Schema) -> Result<DataFrame> + Send + Sync + 'static,
    {
        Transform::Schema(Arc::new(f))
    }

    pub fn column<F>(f: F) -> Self
    where
        F: Fn(DataFrame, &str) -> Result<DataFrame> + Send + Sync + 'static,
    {
        Transform::Column(Arc::new(f))
    }

    pub fn column_with_labels<F>(f: F) -> Self
    where
        F: Fn(DataFrame, &str, Series) -> Result<(DataFrame, Series)> + Send + Sync + 'static,
    {
        Transform::ColumnWithLabels(Arc::new(f))
    }

    /// Scope tag this transform's signature requires
    pub fn scope_tag(&self) -> ScopeTag {
        match self {
            Transform::Table(_) => ScopeTag::None,
            Transform::Schema(_) => ScopeTag::Schema,
            Transform::Column(_) | Transform::ColumnWithLabels(_) => ScopeTag::Column,
        }
    }

    pub fn mutates_labels(&self) -> bool {
        matches!(self, Transform::ColumnWithLabels(_))
    }

    fn kind(&self) -> &'static str {
        match self {
            Transform::Table(_) => "table",
            Transform::Schema(_) => "schema",
            Transform::Column(_) => "column",
            Transform::ColumnWithLabels(_) => "column+labels",
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform::{}", self.kind())
    }
}

/// Serializable description of a stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    /// Scope tag, parsed with [`ScopeTag::from_str`]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

impl StageSpec {
    pub fn new(name: impl Into<String>, scope: ScopeTag, column: Option<&str>) -> Self {
        Self {
            name: name.into(),
            scope: scope.to_string(),
            column: column.map(str::to_string),
        }
    }
}

/// One step of a preprocessing pipeline
#[derive(Debug, Clone)]
pub struct Stage {
    name: String,
    scope: StageScope,
    transform: Transform,
}

impl Stage {
    /// Create a stage without checking that scope and transform agree.
    /// The executor rejects inconsistent stages before running anything.
    pub fn new(name: impl Into<String>, scope: StageScope, transform: Transform) -> Self {
        Self {
            name: name.into(),
            scope,
            transform,
        }
    }

    pub fn table<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(DataFrame) -> Result<DataFrame> + Send + Sync + 'static,
    {
        Self::new(name, StageScope::Table, Transform::table(f))
    }

    pub fn schema<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(DataFrame, &Schema) -> Result<DataFrame> + Send + Sync + 'static,
    {
        Self::new(name, StageScope::Schema, Transform::schema(f))
    }

    pub fn column<F>(name: impl Into<String>, column: impl Into<String>, f: F) -> Self
    where
        F: Fn(DataFrame, &str) -> Result<DataFrame> + Send + Sync + 'static,
    {
        Self::new(name, StageScope::Column(column.into()), Transform::column(f))
    }

    pub fn column_with_labels<F>(name: impl Into<String>, column: impl Into<String>, f: F) -> Self
    where
        F: Fn(DataFrame, &str, Series) -> Result<(DataFrame, Series)> + Send + Sync + 'static,
    {
        Self::new(
            name,
            StageScope::Column(column.into()),
            Transform::column_with_labels(f),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &StageScope {
        &self.scope
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn mutates_labels(&self) -> bool {
        self.transform.mutates_labels()
    }

    /// Check that the declared scope matches the transform's signature
    pub fn validate(&self) -> Result<()> {
        if self.scope.tag() != self.transform.scope_tag() {
            return Err(TabularError::ConfigError(format!(
                "stage '{}' declares scope {} but its transform is {}-scoped",
                self.name,
                self.scope.tag(),
                self.transform.scope_tag()
            )));
        }
        Ok(())
    }

    pub fn spec(&self) -> StageSpec {
        StageSpec::new(self.name.clone(), self.scope.tag(), self.scope.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_tag_parse() {
        assert_eq!("none".parse::<ScopeTag>().unwrap(), ScopeTag::None);
        assert_eq!(" Schema ".parse::<ScopeTag>().unwrap(), ScopeTag::Schema);
        assert_eq!("COLUMN".parse::<ScopeTag>().unwrap(), ScopeTag::Column);

        let err = "row".parse::<ScopeTag>().unwrap_err();
        assert!(matches!(err, TabularError::ConfigError(msg) if msg.contains("ROW")));
    }

    #[test]
    fn test_scope_from_tag() {
        assert_eq!(StageScope::from_tag(ScopeTag::None, None).unwrap(), StageScope::Table);
        assert_eq!(
            StageScope::from_tag(ScopeTag::Column, Some("age")).unwrap(),
            StageScope::Column("age".to_string())
        );
        assert!(StageScope::from_tag(ScopeTag::Column, None).is_err());
        assert!(StageScope::from_tag(ScopeTag::Schema, Some("age")).is_err());
    }

    #[test]
    fn test_stage_validate() {
        let ok = Stage::column("noop", "a", |df, _| Ok(df));
        assert!(ok.validate().is_ok());
        assert!(!ok.mutates_labels());

        let bad = Stage::new("noop", StageScope::Schema, Transform::table(Ok));
        assert!(matches!(bad.validate(), Err(TabularError::ConfigError(_))));
    }

    #[test]
    fn test_label_mutating_flag_is_data() {
        let stage = Stage::column_with_labels("drop_rows", "a", |df, _, labels| Ok((df, labels)));
        assert!(stage.mutates_labels());
        assert_eq!(stage.spec(), StageSpec::new("drop_rows", ScopeTag::Column, Some("a")));
    }
}
