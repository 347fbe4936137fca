//! Column-schema resolution for MAF-derived tables.
//!
//! Input tables use a recognized set of column names with a few historical
//! alternatives (`Hugo_Symbol` vs `Gene`, `Start_Position` vs `Position`,
//! `MutVAF`/`DOR` for frequency and depth). Resolution happens once per
//! table and yields fixed column indices, so per-row parsing never has to
//! branch on column presence.

use std::path::Path;

use anyhow::{bail, Result};

use crate::errors;
use crate::maf::table::SampleSource;

const GENE_SYMBOL_COLUMNS: &[&str] = &["Hugo_Symbol", "Gene"];
const ENTREZ_COLUMNS: &[&str] = &["Entrez_Gene_Id"];
const BUILD_COLUMNS: &[&str] = &["NCBI_Build"];
const CHROMOSOME_COLUMNS: &[&str] = &["Chromosome"];
const START_COLUMNS: &[&str] = &["Start_Position", "Position"];
const END_COLUMNS: &[&str] = &["End_Position"];
const REFERENCE_COLUMNS: &[&str] = &["Reference_Allele"];
const OBSERVED_COLUMNS: &[&str] = &["Allele"];
const FREQUENCY_COLUMNS: &[&str] = &["Variant_Frequencies", "MutVAF"];
const DEPTH_COLUMNS: &[&str] = &["Total_Depth", "DOR"];

#[derive(Debug, Clone, Copy)]
pub(crate) struct ObservationColumns {
    pub(crate) vaf: usize,
    pub(crate) depth: usize,
}

/// Resolved column indices of one input table.
#[derive(Debug, Clone)]
pub(crate) struct TableSchema {
    pub(crate) hugo_symbol: Option<usize>,
    pub(crate) entrez_gene_id: Option<usize>,
    pub(crate) ncbi_build: Option<usize>,
    pub(crate) chromosome: usize,
    pub(crate) start_position: usize,
    pub(crate) end_position: Option<usize>,
    pub(crate) reference_allele: Option<usize>,
    pub(crate) observed_allele: Option<usize>,
    pub(crate) tissue: Option<ObservationColumns>,
    pub(crate) blood: Option<ObservationColumns>,
}

fn find(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| names.contains(&header.trim()))
}

fn find_exact(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|header| header.trim() == name)
}

fn require(headers: &csv::StringRecord, names: &[&str], path: &Path) -> Result<usize> {
    match find(headers, names) {
        Some(idx) => Ok(idx),
        None => bail!(errors::Error::MissingColumn {
            column: names[0].to_owned(),
            path: path.to_owned(),
        }),
    }
}

/// Look up the frequency/depth column pair, either suffixed by sample source
/// (merged tables) or under the plain single-source names.
fn observation_columns(
    headers: &csv::StringRecord,
    suffix: Option<&str>,
) -> Option<ObservationColumns> {
    let (vaf, depth) = match suffix {
        Some(suffix) => (
            find_exact(headers, &format!("Variant_Frequencies_{}", suffix)),
            find_exact(headers, &format!("Total_Depth_{}", suffix)),
        ),
        None => (
            find(headers, FREQUENCY_COLUMNS),
            find(headers, DEPTH_COLUMNS),
        ),
    };
    match (vaf, depth) {
        (Some(vaf), Some(depth)) => Some(ObservationColumns { vaf, depth }),
        _ => None,
    }
}

impl TableSchema {
    /// Strict resolution for per-sample MAF inputs. All eight identity
    /// columns are required since they form the join key.
    pub(crate) fn resolve_maf(headers: &csv::StringRecord, path: &Path) -> Result<Self> {
        Ok(TableSchema {
            hugo_symbol: Some(require(headers, GENE_SYMBOL_COLUMNS, path)?),
            entrez_gene_id: Some(require(headers, ENTREZ_COLUMNS, path)?),
            ncbi_build: Some(require(headers, BUILD_COLUMNS, path)?),
            chromosome: require(headers, CHROMOSOME_COLUMNS, path)?,
            start_position: require(headers, START_COLUMNS, path)?,
            end_position: Some(require(headers, END_COLUMNS, path)?),
            reference_allele: Some(require(headers, REFERENCE_COLUMNS, path)?),
            observed_allele: Some(require(headers, OBSERVED_COLUMNS, path)?),
            tissue: observation_columns(headers, None),
            blood: None,
        })
    }

    /// Lenient resolution for merged tables. Identity columns other than
    /// chromosome and start position are labels at this stage and may be
    /// absent; observation columns may be suffixed per source or plain for
    /// single-source tables. At least one source must be present.
    pub(crate) fn resolve_merged(headers: &csv::StringRecord, path: &Path) -> Result<Self> {
        let blood = observation_columns(headers, Some(SampleSource::Blood.column_suffix()));
        let tissue = observation_columns(headers, Some(SampleSource::Tissue.column_suffix()))
            .or_else(|| observation_columns(headers, None));
        if tissue.is_none() && blood.is_none() {
            bail!(errors::Error::MissingColumn {
                column: FREQUENCY_COLUMNS[0].to_owned(),
                path: path.to_owned(),
            });
        }

        Ok(TableSchema {
            hugo_symbol: find(headers, GENE_SYMBOL_COLUMNS),
            entrez_gene_id: find(headers, ENTREZ_COLUMNS),
            ncbi_build: find(headers, BUILD_COLUMNS),
            chromosome: require(headers, CHROMOSOME_COLUMNS, path)?,
            start_position: require(headers, START_COLUMNS, path)?,
            end_position: find(headers, END_COLUMNS),
            reference_allele: find(headers, REFERENCE_COLUMNS),
            observed_allele: find(headers, OBSERVED_COLUMNS),
            tissue,
            blood,
        })
    }
}
