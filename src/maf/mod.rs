//! Reading, joining and modelling of MAF-derived mutation tables.

pub mod aggregate;
pub(crate) mod schema;
pub mod table;

pub use self::aggregate::{aggregate, JoinMode};
pub use self::table::{MutationKey, MutationRow, MutationTable, Observation, SampleSource};
