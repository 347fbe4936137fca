// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The replicate exporter: conversion of table rows into SSM record sets
//! for the downstream inference engine, plus the copy-number companion
//! artifact expected next to each record set.

use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use itertools::Itertools;

use crate::bootstrap::BootstrapTable;
use crate::constants;
use crate::errors;
use crate::maf::{MutationKey, Observation, SampleSource};
use crate::utils;

/// One exported SSM record. `a` holds reference read counts, `d` total
/// depths; with two sources both are comma-joined pairs ordered blood,
/// tissue. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
struct SsmRecord {
    id: String,
    gene: String,
    a: String,
    d: String,
    mu_r: f64,
    mu_v: f64,
}

/// Flavor of the copy-number companion file. Both occur in the wild and
/// downstream callers tolerate either.
#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "kebab_case")]
pub enum CnvStyle {
    Empty,
    HeaderOnly,
}

impl CnvStyle {
    pub fn parse(name: &str) -> Result<Self> {
        CnvStyle::from_str(name).map_err(|_| {
            errors::Error::UnknownCnvStyle {
                name: name.to_owned(),
            }
            .into()
        })
    }
}

#[derive(Debug, Clone, Copy, Default, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ExportStats {
    /// Records written to the artifact.
    written: usize,
    /// Rows without a usable source observation, excluded from the artifact.
    skipped: usize,
}

/// Per-row source values, resolved once per (row, replicate).
enum SourceValues {
    Single(Observation),
    Dual {
        blood: Observation,
        tissue: Observation,
    },
}

impl SourceValues {
    fn resolve(blood: Option<Observation>, tissue: Option<Observation>) -> Option<Self> {
        match (blood, tissue) {
            (Some(blood), Some(tissue)) => Some(SourceValues::Dual { blood, tissue }),
            (Some(observation), None) | (None, Some(observation)) => {
                Some(SourceValues::Single(observation))
            }
            (None, None) => None,
        }
    }

    fn reference_reads(&self) -> String {
        match self {
            SourceValues::Single(observation) => reference_reads(observation).to_string(),
            SourceValues::Dual { blood, tissue } => [blood, tissue]
                .iter()
                .map(|observation| reference_reads(observation))
                .join(","),
        }
    }

    fn depths(&self) -> String {
        match self {
            SourceValues::Single(observation) => observation.depth.to_string(),
            SourceValues::Dual { blood, tissue } => [blood, tissue]
                .iter()
                .map(|observation| observation.depth)
                .join(","),
        }
    }
}

/// Number of reads supporting the reference allele, rounded half to even
/// (the convention of the original exports; applied uniformly to original
/// and bootstrap record sets so both stay comparable).
fn reference_reads(observation: &Observation) -> u64 {
    round_half_to_even(f64::from(observation.depth) * (1.0 - observation.vaf))
}

fn round_half_to_even(value: f64) -> u64 {
    let floor = value.floor();
    let fraction = value - floor;
    let floor = floor as u64;
    if fraction > 0.5 {
        floor + 1
    } else if fraction < 0.5 {
        floor
    } else if floor % 2 == 0 {
        floor
    } else {
        floor + 1
    }
}

/// Gene label of a record: the symbolic name when present, otherwise
/// chromosome and start position.
fn gene_label(key: &MutationKey) -> String {
    match &key.hugo_symbol {
        Some(symbol) if !symbol.is_empty() => symbol.clone(),
        _ => format!("{}_{}", key.chromosome, key.start_position),
    }
}

pub fn ssm_filename(replicate: Option<usize>) -> String {
    match replicate {
        None => "ssm_data_original.txt".to_owned(),
        Some(replicate) => format!("ssm_data_bootstrap{}.txt", replicate),
    }
}

pub fn cnv_filename(replicate: Option<usize>) -> String {
    match replicate {
        None => "cnv_data_original.txt".to_owned(),
        Some(replicate) => format!("cnv_data_bootstrap{}.txt", replicate),
    }
}

/// Write the SSM record set of one replicate (or of the original
/// observations, with `replicate = None`) as a tab-delimited artifact.
/// Record ids are positions within this record set. The table itself is
/// never mutated, so repeated exports are byte-identical.
pub fn write_ssm(
    table: &BootstrapTable,
    replicate: Option<usize>,
    path: &Path,
) -> Result<ExportStats> {
    table.ensure_replicate(replicate)?;

    let mut stats = ExportStats::default();
    utils::write_atomic(path, |file| {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(file);
        for row in 0..table.table().len() {
            let blood = table.observation(SampleSource::Blood, row, replicate);
            let tissue = table.observation(SampleSource::Tissue, row, replicate);
            let values = match SourceValues::resolve(blood, tissue) {
                Some(values) => values,
                None => {
                    stats.skipped += 1;
                    continue;
                }
            };
            writer.serialize(SsmRecord {
                id: format!("s{}", stats.written),
                gene: gene_label(&table.table().rows()[row].key),
                a: values.reference_reads(),
                d: values.depths(),
                mu_r: constants::MU_R,
                mu_v: constants::MU_V,
            })?;
            stats.written += 1;
        }
        writer.flush()?;
        Ok(())
    })?;

    if stats.skipped > 0 {
        warn!(
            "skipped {} of {} rows without a usable observation while writing {}",
            stats.skipped,
            table.table().len(),
            path.display()
        );
    }

    Ok(stats)
}

/// Write the copy-number companion artifact.
pub fn write_cnv(path: &Path, style: CnvStyle) -> Result<()> {
    utils::write_atomic(path, |file| {
        if style == CnvStyle::HeaderOnly {
            writeln!(file, "{}", constants::CNV_HEADER)?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::maf::{MutationRow, MutationTable};

    fn key(symbol: Option<&str>, chromosome: &str, position: u64) -> MutationKey {
        MutationKey {
            hugo_symbol: symbol.map(|s| s.to_owned()),
            entrez_gene_id: "0".to_owned(),
            ncbi_build: "GRCh38".to_owned(),
            chromosome: chromosome.to_owned(),
            start_position: position,
            end_position: position,
            reference_allele: "A".to_owned(),
            observed_allele: "T".to_owned(),
        }
    }

    fn observation(vaf: f64, depth: u32) -> Option<Observation> {
        Some(Observation { vaf, depth })
    }

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(round_half_to_even(2.3), 2);
        assert_eq!(round_half_to_even(2.7), 3);
        assert_eq!(round_half_to_even(0.5), 0);
        assert_eq!(round_half_to_even(1.5), 2);
        assert_eq!(round_half_to_even(2.5), 2);
        assert_eq!(round_half_to_even(3.0), 3);
    }

    #[test]
    fn test_dual_source_fields_are_blood_first() {
        let values = SourceValues::resolve(observation(0.1, 50), observation(0.2, 100)).unwrap();
        assert_eq!(values.reference_reads(), "45,80");
        assert_eq!(values.depths(), "50,100");
    }

    #[test]
    fn test_gene_label_fallback() {
        assert_eq!(gene_label(&key(Some("TP53"), "17", 7578406)), "TP53");
        assert_eq!(gene_label(&key(None, "17", 7578406)), "17_7578406");
    }

    #[test]
    fn test_rows_without_observation_are_skipped() {
        let rows = vec![
            MutationRow {
                key: key(Some("A"), "1", 100),
                tissue: observation(0.2, 100),
                blood: None,
            },
            MutationRow {
                key: key(Some("B"), "1", 200),
                tissue: None,
                blood: None,
            },
        ];
        let table = BootstrapTable::original_only(MutationTable::new(rows, true));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ssm_data_original.txt");
        let stats = write_ssm(&table, None, &path).unwrap();
        assert_eq!(stats.written(), 1);
        assert_eq!(stats.skipped(), 1);

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "id\tgene\ta\td\tmu_r\tmu_v");
        assert_eq!(lines[1], "s0\tA\t80\t100\t0.999\t0.499");
    }

    #[test]
    fn test_export_is_deterministic() {
        let rows = vec![MutationRow {
            key: key(Some("KRAS"), "12", 25398284),
            tissue: observation(0.35, 140),
            blood: observation(0.02, 250),
        }];
        let table = BootstrapTable::original_only(MutationTable::new(rows, true));
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        write_ssm(&table, None, &first).unwrap();
        write_ssm(&table, None, &second).unwrap();
        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_cnv_styles() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("cnv_empty.txt");
        let with_header = dir.path().join("cnv_header.txt");
        write_cnv(&empty, CnvStyle::Empty).unwrap();
        write_cnv(&with_header, CnvStyle::HeaderOnly).unwrap();
        assert_eq!(fs::metadata(&empty).unwrap().len(), 0);
        assert_eq!(
            fs::read_to_string(&with_header).unwrap(),
            format!("{}\n", constants::CNV_HEADER)
        );
    }

    #[test]
    fn test_cnv_style_parsing() {
        assert_eq!(CnvStyle::parse("empty").unwrap(), CnvStyle::Empty);
        assert_eq!(CnvStyle::parse("header-only").unwrap(), CnvStyle::HeaderOnly);
        assert!(CnvStyle::parse("full").is_err());
    }
}
