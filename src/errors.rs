use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub(crate) enum Error {
    #[error("unknown join mode {name}, expected 'intersection' or 'union'")]
    UnknownJoinMode { name: String },
    #[error("unknown copy-number style {name}, expected 'empty' or 'header-only'")]
    UnknownCnvStyle { name: String },
    #[error("required column {column} missing from {path}")]
    MissingColumn { column: String, path: PathBuf },
    #[error("invalid value {value:?} in column {column} at {path}:{line}")]
    InvalidValue {
        column: String,
        value: String,
        path: PathBuf,
        line: usize,
    },
    #[error("allele frequency {value} at {path}:{line} is not within [0, 1]")]
    InvalidFrequency {
        value: f64,
        path: PathBuf,
        line: usize,
    },
    #[error("allele frequency {value} is not within [0, 1]")]
    FrequencyOutOfRange { value: f64 },
    #[error("got {frequencies} frequencies but {depths} depths; vectors must have equal length")]
    LengthMismatch { frequencies: usize, depths: usize },
    #[error("cannot resample an empty site vector")]
    EmptySites,
    #[error("total depth is zero, nothing to resample")]
    ZeroCoverage,
    #[error("replicate index {replicate} out of range, table holds {available} replicates")]
    ReplicateOutOfRange { replicate: usize, available: usize },
}

pub(crate) fn invalid_value(column: &str, value: &str, path: &std::path::Path, line: usize) -> Error {
    Error::InvalidValue {
        column: column.to_owned(),
        value: value.to_owned(),
        path: path.to_owned(),
        line,
    }
}
