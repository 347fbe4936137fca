// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! The mutation set aggregator: cross-sample join of tissue and blood calls
//! followed by germline filtering.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use anyhow::Result;

use crate::errors;
use crate::maf::table::{self, MutationKey, MutationRow, MutationTable, Observation};

/// How tissue and blood calls are reconciled into one mutation set.
#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Keep mutations called in both samples (inner join).
    #[strum(to_string = "intersection", serialize = "common", serialize = "inner")]
    Intersection,
    /// Keep mutations called in either sample (outer join).
    #[strum(to_string = "union", serialize = "outer")]
    Union,
}

impl JoinMode {
    /// Parse a mode name as given on the command line.
    pub fn parse(name: &str) -> Result<Self> {
        JoinMode::from_str(name).map_err(|_| {
            errors::Error::UnknownJoinMode {
                name: name.to_owned(),
            }
            .into()
        })
    }
}

/// Join the blood and tissue call sets on the mutation identity key and
/// remove every mutation whose key occurs in the germline control
/// (anti-join). The blood table is the left side of the join: output rows
/// follow blood input order, with tissue-only rows appended in tissue input
/// order under a union join. Row positions are dense afterwards.
///
/// An empty result is a valid terminal state, to be signalled by the caller.
pub fn aggregate(
    blood: &[(MutationKey, Option<Observation>)],
    tissue: &[(MutationKey, Option<Observation>)],
    germline: &HashSet<MutationKey>,
    mode: JoinMode,
) -> MutationTable {
    // first occurrence wins for duplicate keys within one sample
    let mut tissue_by_key: HashMap<&MutationKey, Option<Observation>> = HashMap::new();
    for (key, observation) in tissue {
        tissue_by_key.entry(key).or_insert(*observation);
    }

    let mut rows = Vec::new();
    for (key, blood_observation) in blood {
        if germline.contains(key) {
            continue;
        }
        match tissue_by_key.get(key) {
            Some(tissue_observation) => rows.push(MutationRow {
                key: key.clone(),
                tissue: *tissue_observation,
                blood: *blood_observation,
            }),
            None => {
                if mode == JoinMode::Union {
                    rows.push(MutationRow {
                        key: key.clone(),
                        tissue: None,
                        blood: *blood_observation,
                    });
                }
            }
        }
    }

    if mode == JoinMode::Union {
        let blood_keys: HashSet<&MutationKey> = blood.iter().map(|(key, _)| key).collect();
        for (key, tissue_observation) in tissue {
            if germline.contains(key) || blood_keys.contains(key) {
                continue;
            }
            rows.push(MutationRow {
                key: key.clone(),
                tissue: *tissue_observation,
                blood: None,
            });
        }
    }

    MutationTable::new(rows, true)
}

/// Convenience wrapper reading the three MAF inputs from disk.
pub fn aggregate_from_files(
    blood: &Path,
    tissue: &Path,
    germline: &Path,
    mode: JoinMode,
) -> Result<MutationTable> {
    let blood_calls = table::read_maf(blood)?;
    let tissue_calls = table::read_maf(tissue)?;
    let germline_keys = table::read_maf_keys(germline)?;
    info!(
        "aggregating {} blood and {} tissue calls against {} germline keys ({} join)",
        blood_calls.len(),
        tissue_calls.len(),
        germline_keys.len(),
        mode
    );

    Ok(aggregate(&blood_calls, &tissue_calls, &germline_keys, mode))
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn observation(vaf: f64, depth: u32) -> Option<Observation> {
        Some(Observation { vaf, depth })
    }

    /// tissue {A,B,C}, blood {B,C,D}, germline {C}
    fn fixtures() -> (
        Vec<(MutationKey, Option<Observation>)>,
        Vec<(MutationKey, Option<Observation>)>,
        HashSet<MutationKey>,
    ) {
        let tissue = vec![
            (key("A", 100), observation(0.1, 50)),
            (key("B", 200), observation(0.2, 60)),
            (key("C", 300), observation(0.3, 70)),
        ];
        let blood = vec![
            (key("B", 200), observation(0.05, 120)),
            (key("C", 300), observation(0.06, 130)),
            (key("D", 400), observation(0.07, 140)),
        ];
        let mut germline = HashSet::new();
        germline.insert(key("C", 300));
        (blood, tissue, germline)
    }

    #[test]
    fn test_intersection() {
        let (blood, tissue, germline) = fixtures();
        let result = aggregate(&blood, &tissue, &germline, JoinMode::Intersection);
        assert_eq!(result.len(), 1);
        assert_eq!(result.rows()[0].key.hugo_symbol.as_deref(), Some("B"));
        assert!(result.rows()[0].tissue.is_some());
        assert!(result.rows()[0].blood.is_some());
    }

    #[test]
    fn test_union() {
        let (blood, tissue, germline) = fixtures();
        let result = aggregate(&blood, &tissue, &germline, JoinMode::Union);
        let symbols: Vec<_> = result
            .rows()
            .iter()
            .map(|row| row.key.hugo_symbol.clone().unwrap())
            .collect();
        // blood order first, then tissue-only rows
        assert_eq!(symbols, vec!["B", "D", "A"]);
        let a = &result.rows()[2];
        assert!(a.blood.is_none());
        assert!(a.tissue.is_some());
    }

    #[test]
    fn test_germline_removed_regardless_of_source_presence() {
        let (blood, tissue, germline) = fixtures();
        for mode in [JoinMode::Intersection, JoinMode::Union] {
            let result = aggregate(&blood, &tissue, &germline, mode);
            assert!(result
                .rows()
                .iter()
                .all(|row| row.key.hugo_symbol.as_deref() != Some("C")));
        }
    }

    #[test]
    fn test_empty_result_is_valid() {
        let (blood, _, _) = fixtures();
        let germline: HashSet<_> = blood.iter().map(|(key, _)| key.clone()).collect();
        let result = aggregate(&blood, &[], &germline, JoinMode::Union);
        assert!(result.is_empty());
    }

    #[test]
    fn test_join_mode_parsing() {
        assert_eq!(JoinMode::parse("intersection").unwrap(), JoinMode::Intersection);
        assert_eq!(JoinMode::parse("common").unwrap(), JoinMode::Intersection);
        assert_eq!(JoinMode::parse("union").unwrap(), JoinMode::Union);
        assert_eq!(JoinMode::parse("outer").unwrap(), JoinMode::Union);
        assert!(JoinMode::parse("sideways").is_err());
    }
}
