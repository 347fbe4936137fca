//! Preparation of multi-sample tumor mutation calls for phylogenetic inference.
//!
//! Given per-sample MAF tables (solid tissue, liquid biopsy, germline control),
//! phylostrap reconciles the variant calls into one canonical mutation table,
//! removes germline variants, and generates coverage-preserving bootstrap
//! replicates of the observed read depths and allele frequencies. Each
//! replicate is exported as an SSM record set (plus a copy-number companion
//! file) suitable for downstream phylogenetic inference engines such as
//! PhyloWGS.

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate strum_macros;

pub mod bootstrap;
pub mod cli;
pub mod constants;
pub(crate) mod errors;
pub mod export;
pub mod maf;
pub mod pipeline;
pub(crate) mod utils;
