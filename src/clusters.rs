use crate::{error::MalformedInputError, open};
use anyhow::Result;
use clap::{builder::PossibleValue, ValueEnum};
use log::info;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, io::BufRead, path::Path};

/// Cluster ID to member sequence IDs, in order of appearance.
/// Duplicate members are kept.
pub type ClusterMap = BTreeMap<String, Vec<String>>;

/// Column layout of a two-column cluster assignment file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColumnOrder {
    /// `cluster_id<TAB>sequence_id`, e.g., MMseqs2 `*_cluster.tsv`
    ClusterFirst,
    /// `sequence_id<TAB>cluster_id`
    SequenceFirst,
}

impl ValueEnum for ColumnOrder {
    fn value_variants<'a>() -> &'a [Self] {
        &[ColumnOrder::ClusterFirst, ColumnOrder::SequenceFirst]
    }

    fn to_possible_value<'a>(&self) -> Option<PossibleValue> {
        Some(match self {
            ColumnOrder::ClusterFirst => PossibleValue::new("cluster-first"),
            ColumnOrder::SequenceFirst => PossibleValue::new("sequence-first"),
        })
    }
}

impl ColumnOrder {
    /// Returns `(cluster_id, sequence_id)`
    fn split<'a>(&self, first: &'a str, second: &'a str) -> (&'a str, &'a str) {
        match self {
            ColumnOrder::ClusterFirst => (first, second),
            ColumnOrder::SequenceFirst => (second, first),
        }
    }
}

// --------------------------------------------------
/// Parse a cluster assignment stream. Any non-blank line without
/// exactly two tab-separated fields fails with `MalformedInputError`.
pub fn parse_clusters(
    reader: impl BufRead,
    column_order: ColumnOrder,
) -> Result<ClusterMap> {
    let mut clusters = ClusterMap::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<_> = line.split('\t').map(str::trim).collect();
        match fields[..] {
            [first, second] if !first.is_empty() && !second.is_empty() => {
                let (cluster_id, sequence_id) =
                    column_order.split(first, second);
                clusters
                    .entry(cluster_id.to_string())
                    .or_default()
                    .push(sequence_id.to_string());
            }
            _ => {
                return Err(MalformedInputError {
                    line: i + 1,
                    found: fields.iter().filter(|f| !f.is_empty()).count(),
                }
                .into())
            }
        }
    }

    Ok(clusters)
}

// --------------------------------------------------
pub fn read_clusters(path: &Path, column_order: ColumnOrder) -> Result<ClusterMap> {
    info!(
        r#"Reading clusters from "{}" ({column_order:?})"#,
        path.display()
    );
    let clusters = parse_clusters(open(path)?, column_order)
        .map_err(|e| e.context(format!("{}", path.display())))?;
    info!("Parsed {} clusters", clusters.len());
    Ok(clusters)
}
