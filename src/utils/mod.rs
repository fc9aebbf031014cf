//! Utility functions and types

pub mod data_loader;
pub mod error_log;
pub mod frame;

pub use data_loader::{read_csv_in_directory, DataLoader};
pub use error_log::{log_error, read_error_log, ErrorRecord};
pub use frame::{column_names, from_feature_matrix, to_feature_matrix, LabelEncoding};
