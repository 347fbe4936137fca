// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The bootstrap resampling engine.
//!
//! For each sample source, read depths are resampled per replicate with one
//! multinomial draw of the source's total coverage over the per-site depth
//! proportions, so that the summed depth of every replicate equals the
//! original total. Allele frequencies are then redrawn per site and replicate
//! from a binomial with the new depth and the original frequency.
//!
//! Zero-depth sites would break the downstream frequency ratio, so the full
//! multinomial draw is repeated while any are present, up to
//! [`constants::MAX_MULTINOMIAL_ATTEMPTS`] times; after that, remaining zeros
//! are floored to one read. Flooring biases the affected replicates' total
//! coverage by a few reads, which is accepted and surfaced through
//! [`Resampled::forced_sites`].

use anyhow::{bail, Result};
use ndarray::Array2;
use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Binomial;

use crate::constants;
use crate::errors;
use crate::maf::{MutationTable, Observation, SampleSource};
use crate::utils;

/// Resampled depth and frequency matrices of one sample source, oriented
/// sites × replicates.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct Resampled {
    #[getset(get = "pub")]
    frequencies: Array2<f64>,
    #[getset(get = "pub")]
    depths: Array2<u32>,
    /// Number of cells whose depth was forced to one read after the draw
    /// attempts were exhausted.
    #[getset(get_copy = "pub")]
    forced_sites: usize,
}

/// Draw `num_replicates` coverage-preserving bootstrap replicates of the
/// given per-site frequency and depth vectors. Reproducibility is the
/// caller's responsibility: pass a seeded rng.
pub fn resample<R: Rng>(
    frequencies: &[f64],
    depths: &[u32],
    num_replicates: usize,
    rng: &mut R,
) -> Result<Resampled> {
    if frequencies.len() != depths.len() {
        bail!(errors::Error::LengthMismatch {
            frequencies: frequencies.len(),
            depths: depths.len(),
        });
    }
    if frequencies.is_empty() {
        bail!(errors::Error::EmptySites);
    }
    for &vaf in frequencies {
        if !vaf.is_finite() || !(0.0..=1.0).contains(&vaf) {
            bail!(errors::Error::FrequencyOutOfRange { value: vaf });
        }
    }
    let total: u64 = depths.iter().map(|&depth| u64::from(depth)).sum();
    if total == 0 {
        bail!(errors::Error::ZeroCoverage);
    }
    let sites = depths.len();
    let proportions: Vec<f64> = depths
        .iter()
        .map(|&depth| depth as f64 / total as f64)
        .collect();

    let mut attempt = 0;
    let (depth_matrix, forced_sites) = loop {
        attempt += 1;
        let candidate = multinomial_matrix(&proportions, total, num_replicates, rng)?;
        if candidate.iter().all(|&depth| depth > 0) {
            break (candidate, 0);
        }
        if attempt >= constants::MAX_MULTINOMIAL_ATTEMPTS {
            let mut candidate = candidate;
            let forced = candidate
                .iter_mut()
                .filter(|depth| **depth == 0)
                .map(|depth| *depth = 1)
                .count();
            warn!(
                "{} site/replicate cells still had zero depth after {} multinomial draws, \
                 forcing them to one read",
                forced, attempt
            );
            break (candidate, forced);
        }
    };

    let mut frequency_matrix = Array2::zeros((sites, num_replicates));
    for site in 0..sites {
        let vaf = frequencies[site];
        for replicate in 0..num_replicates {
            let depth = u64::from(depth_matrix[(site, replicate)]);
            let reads = if vaf <= 0.0 {
                0.0
            } else if vaf >= 1.0 {
                depth as f64
            } else {
                Binomial::new(vaf, depth)?.sample(rng)
            };
            frequency_matrix[(site, replicate)] = reads / depth as f64;
        }
    }

    Ok(Resampled {
        frequencies: frequency_matrix,
        depths: depth_matrix,
        forced_sites,
    })
}

fn multinomial_matrix<R: Rng>(
    proportions: &[f64],
    total: u64,
    num_replicates: usize,
    rng: &mut R,
) -> Result<Array2<u32>> {
    let mut matrix = Array2::zeros((proportions.len(), num_replicates));
    for replicate in 0..num_replicates {
        let counts = multinomial_draw(proportions, total, rng)?;
        for (site, count) in counts.into_iter().enumerate() {
            matrix[(site, replicate)] = count;
        }
    }

    Ok(matrix)
}

/// One multinomial draw of size `total`, realized as the conditional
/// binomial chain (the same scheme numpy uses): site i receives a binomial
/// share of the still unassigned reads, the last site absorbs the rest.
fn multinomial_draw<R: Rng>(proportions: &[f64], total: u64, rng: &mut R) -> Result<Vec<u32>> {
    let sites = proportions.len();
    let mut counts = vec![0u32; sites];
    let mut remaining = total;
    let mut remaining_mass = 1.0f64;

    for site in 0..sites {
        if site == sites - 1 {
            counts[site] = remaining as u32;
            break;
        }
        if remaining == 0 {
            break;
        }
        let conditional = if remaining_mass > 0.0 {
            (proportions[site] / remaining_mass).min(1.0)
        } else {
            1.0
        };
        let share = if conditional >= 1.0 {
            remaining
        } else if conditional <= 0.0 {
            0
        } else {
            let reads: f64 = Binomial::new(conditional, remaining)?.sample(rng);
            reads as u64
        };
        counts[site] = share as u32;
        remaining -= share;
        remaining_mass -= proportions[site];
    }

    Ok(counts)
}

/// Bootstrap matrices of one sample source, covering the subset of table
/// rows that carry an observation for that source. Rows without one stay
/// missing in every replicate.
#[derive(Debug, Clone)]
pub struct SourceReplicates {
    resampled: Resampled,
    /// table row index -> matrix row
    positions: Vec<Option<usize>>,
}

impl SourceReplicates {
    fn generate<R: Rng>(
        table: &MutationTable,
        source: SampleSource,
        num_replicates: usize,
        rng: &mut R,
    ) -> Result<Option<Self>> {
        let mut row_indices = Vec::new();
        let mut frequencies = Vec::new();
        let mut depths = Vec::new();
        for (row, record) in table.rows().iter().enumerate() {
            if let Some(observation) = record.observation(source) {
                row_indices.push(row);
                frequencies.push(observation.vaf);
                depths.push(observation.depth);
            }
        }
        if row_indices.is_empty() {
            debug!("no {} observations present, skipping resampling", source);
            return Ok(None);
        }

        let resampled = resample(&frequencies, &depths, num_replicates, rng)?;

        let mut positions = vec![None; table.len()];
        for (site, &row) in row_indices.iter().enumerate() {
            positions[row] = Some(site);
        }

        Ok(Some(SourceReplicates {
            resampled,
            positions,
        }))
    }

    /// Resampled observation of a table row in the given replicate
    /// (0-based), if the row participates in this source.
    pub(crate) fn observation(&self, row: usize, replicate: usize) -> Option<Observation> {
        self.positions[row].map(|site| Observation {
            vaf: self.resampled.frequencies[(site, replicate)],
            depth: self.resampled.depths[(site, replicate)],
        })
    }

    pub(crate) fn forced_sites(&self) -> usize {
        self.resampled.forced_sites
    }
}

/// The canonical mutation table augmented with `num_replicates` bootstrap
/// replicates per present sample source. The base table is kept as is; the
/// replicate matrices are appended alongside it.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct BootstrapTable {
    #[getset(get = "pub")]
    table: MutationTable,
    #[getset(get_copy = "pub")]
    num_replicates: usize,
    tissue: Option<SourceReplicates>,
    blood: Option<SourceReplicates>,
}

impl BootstrapTable {
    /// Resample every present sample source independently. The sources share
    /// the rng sequentially (tissue first), so a fixed seed reproduces the
    /// full table.
    pub fn generate<R: Rng>(
        table: MutationTable,
        num_replicates: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let tissue = SourceReplicates::generate(&table, SampleSource::Tissue, num_replicates, rng)?;
        let blood = if table.dual_source() {
            SourceReplicates::generate(&table, SampleSource::Blood, num_replicates, rng)?
        } else {
            None
        };

        Ok(BootstrapTable {
            table,
            num_replicates,
            tissue,
            blood,
        })
    }

    /// Wrap a table without generating replicates, for exporting the
    /// unresampled record set alone.
    pub fn original_only(table: MutationTable) -> Self {
        BootstrapTable {
            table,
            num_replicates: 0,
            tissue: None,
            blood: None,
        }
    }

    pub(crate) fn replicates(&self, source: SampleSource) -> Option<&SourceReplicates> {
        match source {
            SampleSource::Tissue => self.tissue.as_ref(),
            SampleSource::Blood => self.blood.as_ref(),
        }
    }

    /// Total number of forced zero-depth floors across all sources.
    pub fn forced_sites(&self) -> usize {
        self.tissue.as_ref().map_or(0, SourceReplicates::forced_sites)
            + self.blood.as_ref().map_or(0, SourceReplicates::forced_sites)
    }

    pub fn ensure_replicate(&self, replicate: Option<usize>) -> Result<()> {
        if let Some(replicate) = replicate {
            if replicate == 0 || replicate > self.num_replicates {
                bail!(errors::Error::ReplicateOutOfRange {
                    replicate,
                    available: self.num_replicates,
                });
            }
        }

        Ok(())
    }

    /// Observation of `(source, row)` under the given replicate; `None`
    /// selects the original observation, `Some(i)` the 1-based replicate i.
    pub(crate) fn observation(
        &self,
        source: SampleSource,
        row: usize,
        replicate: Option<usize>,
    ) -> Option<Observation> {
        match replicate {
            None => self.table.rows()[row].observation(source),
            Some(replicate) => self
                .replicates(source)
                .and_then(|replicates| replicates.observation(row, replicate - 1)),
        }
    }

    /// Write the augmented table (original columns plus all replicate
    /// columns) as a comma-delimited artifact.
    pub fn write_csv(&self, path: &std::path::Path) -> Result<()> {
        utils::write_atomic(path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            writer.write_record(self.csv_header())?;
            for row in 0..self.table.len() {
                writer.write_record(self.csv_row(row))?;
            }
            writer.flush()?;
            Ok(())
        })
    }

    fn source_column(&self, name: &str, source: SampleSource) -> String {
        if self.table.dual_source() {
            format!("{}_{}", name, source.column_suffix())
        } else {
            name.to_owned()
        }
    }

    fn csv_header(&self) -> Vec<String> {
        let mut header: Vec<String> = [
            "Hugo_Symbol",
            "Entrez_Gene_Id",
            "NCBI_Build",
            "Chromosome",
            "Start_Position",
            "End_Position",
            "Reference_Allele",
            "Allele",
        ]
        .iter()
        .map(|name| (*name).to_owned())
        .collect();

        if self.table.dual_source() {
            header.push("Variant_Frequencies_st".to_owned());
            header.push("Variant_Frequencies_cf".to_owned());
            header.push("Total_Depth_st".to_owned());
            header.push("Total_Depth_cf".to_owned());
        } else {
            header.push("Variant_Frequencies".to_owned());
            header.push("Total_Depth".to_owned());
        }

        for source in [SampleSource::Tissue, SampleSource::Blood] {
            if self.replicates(source).is_none() {
                continue;
            }
            for replicate in 1..=self.num_replicates {
                header.push(format!(
                    "{}_bootstrap_{}",
                    self.source_column("Variant_Frequencies", source),
                    replicate
                ));
            }
            for replicate in 1..=self.num_replicates {
                header.push(format!(
                    "{}_bootstrap_{}",
                    self.source_column("Total_Depth", source),
                    replicate
                ));
            }
        }

        header
    }

    fn csv_row(&self, row: usize) -> Vec<String> {
        let record = &self.table.rows()[row];
        let key = &record.key;
        let format_vaf =
            |observation: Option<Observation>| observation.map_or_else(String::new, |obs| obs.vaf.to_string());
        let format_depth =
            |observation: Option<Observation>| observation.map_or_else(String::new, |obs| obs.depth.to_string());

        let mut fields = vec![
            key.hugo_symbol.clone().unwrap_or_default(),
            key.entrez_gene_id.clone(),
            key.ncbi_build.clone(),
            key.chromosome.clone(),
            key.start_position.to_string(),
            key.end_position.to_string(),
            key.reference_allele.clone(),
            key.observed_allele.clone(),
        ];

        if self.table.dual_source() {
            fields.push(format_vaf(record.tissue));
            fields.push(format_vaf(record.blood));
            fields.push(format_depth(record.tissue));
            fields.push(format_depth(record.blood));
        } else {
            fields.push(format_vaf(record.tissue));
            fields.push(format_depth(record.tissue));
        }

        for source in [SampleSource::Tissue, SampleSource::Blood] {
            let replicates = match self.replicates(source) {
                Some(replicates) => replicates,
                None => continue,
            };
            for replicate in 0..self.num_replicates {
                fields.push(format_vaf(replicates.observation(row, replicate)));
            }
            for replicate in 0..self.num_replicates {
                fields.push(format_depth(replicates.observation(row, replicate)));
            }
        }

        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::maf::{MutationKey, MutationRow};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(48074578)
    }

    #[test]
    fn test_coverage_is_preserved() {
        let frequencies = [0.1, 0.2, 0.3];
        let depths = [100, 200, 300];
        let resampled = resample(&frequencies, &depths, 50, &mut rng()).unwrap();
        assert_eq!(resampled.forced_sites(), 0);
        assert_eq!(resampled.depths().dim(), (3, 50));
        for replicate in resampled.depths().columns() {
            assert_eq!(replicate.iter().map(|&d| u64::from(d)).sum::<u64>(), 600);
        }
    }

    #[test]
    fn test_frequencies_are_valid_ratios() {
        let frequencies = [0.0, 0.5, 1.0];
        let depths = [50, 80, 120];
        let resampled = resample(&frequencies, &depths, 20, &mut rng()).unwrap();
        for site in 0..3 {
            for replicate in 0..20 {
                let vaf = resampled.frequencies()[(site, replicate)];
                assert!((0.0..=1.0).contains(&vaf));
                assert!(resampled.depths()[(site, replicate)] >= 1);
            }
        }
        // degenerate frequencies stay degenerate
        for replicate in 0..20 {
            assert_eq!(resampled.frequencies()[(0, replicate)], 0.0);
            assert_eq!(resampled.frequencies()[(2, replicate)], 1.0);
        }
    }

    #[test]
    fn test_zero_depth_sites_are_floored() {
        // site 0 holds one read in a thousand; each attempt leaves it at
        // zero somewhere among the replicates, so the floor kicks in
        let frequencies = [0.5, 0.5];
        let depths = [1, 1000];
        let resampled = resample(&frequencies, &depths, 40, &mut rng()).unwrap();
        assert!(resampled.forced_sites() > 0);
        assert!(resampled.depths().iter().all(|&depth| depth >= 1));
    }

    #[test]
    fn test_single_site_takes_full_coverage() {
        let resampled = resample(&[0.25], &[600], 10, &mut rng()).unwrap();
        for replicate in 0..10 {
            assert_eq!(resampled.depths()[(0, replicate)], 600);
        }
    }

    #[test]
    fn test_input_validation() {
        let mut rng = rng();
        assert!(resample(&[0.1], &[10, 20], 5, &mut rng).is_err());
        assert!(resample(&[], &[], 5, &mut rng).is_err());
        assert!(resample(&[0.1, 0.2], &[0, 0], 5, &mut rng).is_err());
        assert!(resample(&[1.5], &[10], 5, &mut rng).is_err());
    }

    #[test]
    fn test_seed_reproducibility() {
        let frequencies = [0.1, 0.4];
        let depths = [30, 70];
        let a = resample(&frequencies, &depths, 10, &mut rng()).unwrap();
        let b = resample(&frequencies, &depths, 10, &mut rng()).unwrap();
        assert_eq!(a.depths(), b.depths());
        assert_eq!(a.frequencies(), b.frequencies());
    }

    fn key(symbol: &str, position: u64) -> MutationKey {
        MutationKey {
            hugo_symbol: Some(symbol.to_owned()),
            entrez_gene_id: "0".to_owned(),
            ncbi_build: "GRCh38".to_owned(),
            chromosome: "1".to_owned(),
            start_position: position,
            end_position: position,
            reference_allele: "A".to_owned(),
            observed_allele: "T".to_owned(),
        }
    }

    #[test]
    fn test_rows_without_source_observation_stay_missing() {
        let rows = vec![
            MutationRow {
                key: key("A", 1),
                tissue: Some(Observation { vaf: 0.2, depth: 100 }),
                blood: Some(Observation { vaf: 0.1, depth: 50 }),
            },
            MutationRow {
                key: key("B", 2),
                tissue: Some(Observation { vaf: 0.3, depth: 200 }),
                blood: None,
            },
        ];
        let table = MutationTable::new(rows, true);
        let augmented = BootstrapTable::generate(table, 5, &mut rng()).unwrap();
        for replicate in 1..=5 {
            assert!(augmented
                .observation(SampleSource::Blood, 1, Some(replicate))
                .is_none());
            assert!(augmented
                .observation(SampleSource::Tissue, 1, Some(replicate))
                .is_some());
        }
        // blood coverage invariant holds over the single participating row
        for replicate in 1..=5 {
            let obs = augmented
                .observation(SampleSource::Blood, 0, Some(replicate))
                .unwrap();
            assert_eq!(obs.depth, 50);
        }
    }

    #[test]
    fn test_ensure_replicate_bounds() {
        let table = MutationTable::new(vec![], false);
        let augmented = BootstrapTable::original_only(table);
        assert!(augmented.ensure_replicate(None).is_ok());
        assert!(augmented.ensure_replicate(Some(1)).is_err());
    }
}
