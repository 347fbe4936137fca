// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The canonical mutation table and its on-disk representations.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Result};

use crate::errors;
use crate::maf::schema::{ObservationColumns, TableSchema};
use crate::utils;

/// A sequencing sample source. The column suffixes follow the MAF conversion
/// naming: `cf` for cell-free DNA from blood plasma, `st` for solid tissue.
#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum SampleSource {
    Blood,
    Tissue,
}

impl SampleSource {
    pub(crate) fn column_suffix(&self) -> &'static str {
        match self {
            SampleSource::Blood => "cf",
            SampleSource::Tissue => "st",
        }
    }
}

/// One source observation: variant allele frequency and total read depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub vaf: f64,
    pub depth: u32,
}

/// The eight columns that identify a candidate somatic variant across
/// sample tables. Rows sharing this key refer to the same physical mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationKey {
    pub hugo_symbol: Option<String>,
    pub entrez_gene_id: String,
    pub ncbi_build: String,
    pub chromosome: String,
    pub start_position: u64,
    pub end_position: u64,
    pub reference_allele: String,
    pub observed_allele: String,
}

impl MutationKey {
    pub(crate) fn from_record(
        record: &csv::StringRecord,
        schema: &TableSchema,
        path: &Path,
        line: usize,
    ) -> Result<Self> {
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .unwrap_or("")
                .trim()
                .to_owned()
        };

        let start_field = record.get(schema.start_position).unwrap_or("");
        let start_position = parse_position(start_field, "Start_Position", path, line)?;
        let end_position = match schema.end_position {
            // assume a single-base variant when the end column is absent or empty
            Some(idx) if !utils::is_missing(record.get(idx).unwrap_or("")) => {
                parse_position(record.get(idx).unwrap_or(""), "End_Position", path, line)?
            }
            _ => start_position,
        };

        let hugo_symbol = field(schema.hugo_symbol);

        Ok(MutationKey {
            hugo_symbol: if utils::is_missing(&hugo_symbol) {
                None
            } else {
                Some(hugo_symbol)
            },
            entrez_gene_id: field(schema.entrez_gene_id),
            ncbi_build: field(schema.ncbi_build),
            chromosome: field(Some(schema.chromosome)),
            start_position,
            end_position,
            reference_allele: field(schema.reference_allele),
            observed_allele: field(schema.observed_allele),
        })
    }
}

/// One row of the canonical mutation table: identity key plus up to two
/// source observations. At least one observation column pair is guaranteed
/// by schema resolution, but either value may be missing for a given row.
#[derive(Debug, Clone)]
pub struct MutationRow {
    pub key: MutationKey,
    pub tissue: Option<Observation>,
    pub blood: Option<Observation>,
}

impl MutationRow {
    pub fn observation(&self, source: SampleSource) -> Option<Observation> {
        match source {
            SampleSource::Blood => self.blood,
            SampleSource::Tissue => self.tissue,
        }
    }
}

/// The canonical mutation table. Row position is dense and 0-based; it is
/// the id namespace for exported records.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct MutationTable {
    #[getset(get = "pub")]
    rows: Vec<MutationRow>,
    /// Whether the table carries observation columns for both sources.
    #[getset(get_copy = "pub")]
    dual_source: bool,
}

impl MutationTable {
    pub(crate) fn new(rows: Vec<MutationRow>, dual_source: bool) -> Self {
        MutationTable { rows, dual_source }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sample sources covered by this table's observation columns.
    pub fn sources(&self) -> Vec<SampleSource> {
        if self.dual_source {
            vec![SampleSource::Blood, SampleSource::Tissue]
        } else {
            vec![SampleSource::Tissue]
        }
    }

    /// Read a merged (aggregated) mutation table from a comma-delimited file.
    pub fn from_merged_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let schema = TableSchema::resolve_merged(&headers, path)?;
        let dual_source = schema.blood.is_some();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let line = i + 2;
            let key = MutationKey::from_record(&record, &schema, path, line)?;
            let tissue = match &schema.tissue {
                Some(columns) => parse_observation(&record, columns, path, line)?,
                None => None,
            };
            let blood = match &schema.blood {
                Some(columns) => parse_observation(&record, columns, path, line)?,
                None => None,
            };
            rows.push(MutationRow { key, tissue, blood });
        }
        debug!("read {} mutations from {}", rows.len(), path.display());

        Ok(MutationTable::new(rows, dual_source))
    }
}

/// Read one per-sample MAF (tab-delimited), keeping input order.
pub(crate) fn read_maf(path: &Path) -> Result<Vec<(MutationKey, Option<Observation>)>> {
    let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_path(path)?;
    let headers = reader.headers()?.clone();
    let schema = TableSchema::resolve_maf(&headers, path)?;
    let columns = match schema.tissue {
        Some(columns) => columns,
        None => bail!(errors::Error::MissingColumn {
            column: "Variant_Frequencies".to_owned(),
            path: path.to_owned(),
        }),
    };

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let line = i + 2;
        let key = MutationKey::from_record(&record, &schema, path, line)?;
        let observation = parse_observation(&record, &columns, path, line)?;
        rows.push((key, observation));
    }
    debug!("read {} calls from {}", rows.len(), path.display());

    Ok(rows)
}

/// Read the germline control MAF. Only the identity of each call matters
/// here, so observation columns are ignored.
pub(crate) fn read_maf_keys(path: &Path) -> Result<HashSet<MutationKey>> {
    let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_path(path)?;
    let headers = reader.headers()?.clone();
    let schema = TableSchema::resolve_maf(&headers, path)?;

    let mut keys = HashSet::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        keys.insert(MutationKey::from_record(&record, &schema, path, i + 2)?);
    }

    Ok(keys)
}

pub(crate) fn parse_observation(
    record: &csv::StringRecord,
    columns: &ObservationColumns,
    path: &Path,
    line: usize,
) -> Result<Option<Observation>> {
    let vaf_field = record.get(columns.vaf).unwrap_or("");
    let depth_field = record.get(columns.depth).unwrap_or("");
    // a source observation exists only if both values are present
    if utils::is_missing(vaf_field) || utils::is_missing(depth_field) {
        return Ok(None);
    }

    let vaf: f64 = vaf_field
        .trim()
        .parse()
        .map_err(|_| errors::invalid_value("Variant_Frequencies", vaf_field, path, line))?;
    if !vaf.is_finite() {
        return Ok(None);
    }
    if !(0.0..=1.0).contains(&vaf) {
        bail!(errors::Error::InvalidFrequency {
            value: vaf,
            path: path.to_owned(),
            line,
        });
    }

    // pandas exports integer depth columns as floats once missing values
    // appear, hence the detour via f64
    let depth: f64 = depth_field
        .trim()
        .parse()
        .map_err(|_| errors::invalid_value("Total_Depth", depth_field, path, line))?;
    if !depth.is_finite() {
        return Ok(None);
    }
    if depth < 0.0 {
        bail!(errors::invalid_value("Total_Depth", depth_field, path, line));
    }

    Ok(Some(Observation {
        vaf,
        depth: depth.round() as u32,
    }))
}

fn parse_position(field: &str, column: &str, path: &Path, line: usize) -> Result<u64> {
    let trimmed = field.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return Ok(value);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value as u64),
        _ => bail!(errors::invalid_value(column, field, path, line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use approx::assert_relative_eq;

    fn observation_record(vaf: &str, depth: &str) -> csv::StringRecord {
        csv::StringRecord::from(vec![vaf, depth])
    }

    fn columns() -> ObservationColumns {
        ObservationColumns { vaf: 0, depth: 1 }
    }

    #[test]
    fn test_parse_observation() {
        let obs =
            parse_observation(&observation_record("0.25", "100"), &columns(), Path::new("t"), 2)
                .unwrap()
                .unwrap();
        assert_eq!(obs.depth, 100);
        assert_relative_eq!(obs.vaf, 0.25);
    }

    #[test]
    fn test_parse_observation_float_depth() {
        let obs =
            parse_observation(&observation_record("0.5", "80.0"), &columns(), Path::new("t"), 2)
                .unwrap()
                .unwrap();
        assert_eq!(obs.depth, 80);
    }

    #[test]
    fn test_parse_observation_missing() {
        assert!(
            parse_observation(&observation_record("", "100"), &columns(), Path::new("t"), 2)
                .unwrap()
                .is_none()
        );
        assert!(
            parse_observation(&observation_record("0.2", "NA"), &columns(), Path::new("t"), 2)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_parse_observation_invalid_frequency() {
        assert!(
            parse_observation(&observation_record("1.5", "100"), &columns(), Path::new("t"), 2)
                .is_err()
        );
    }

    #[test]
    fn test_from_merged_csv_single_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "Hugo_Symbol,Chromosome,Start_Position,Variant_Frequencies,Total_Depth"
        )
        .unwrap();
        writeln!(f, "TP53,17,7578406,0.4,120").unwrap();
        writeln!(f, ",3,178936091,0.1,90").unwrap();
        drop(f);

        let table = MutationTable::from_merged_csv(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert!(!table.dual_source());
        assert_eq!(
            table.rows()[0].key.hugo_symbol.as_deref(),
            Some("TP53")
        );
        assert!(table.rows()[1].key.hugo_symbol.is_none());
        // end position defaults to start when the column is absent
        assert_eq!(table.rows()[0].key.end_position, 7578406);
        assert_eq!(table.rows()[1].tissue.unwrap().depth, 90);
    }

    #[test]
    fn test_from_merged_csv_dual_source_with_missing_blood() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merged.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(
            f,
            "Hugo_Symbol,Chromosome,Start_Position,Variant_Frequencies_st,Variant_Frequencies_cf,Total_Depth_st,Total_Depth_cf"
        )
        .unwrap();
        writeln!(f, "KRAS,12,25398284,0.3,0.05,150,220").unwrap();
        writeln!(f, "BRAF,7,140453136,0.2,,180,").unwrap();
        drop(f);

        let table = MutationTable::from_merged_csv(&path).unwrap();
        assert!(table.dual_source());
        assert!(table.rows()[0].blood.is_some());
        assert!(table.rows()[1].blood.is_none());
        assert!(table.rows()[1].tissue.is_some());
    }
}
