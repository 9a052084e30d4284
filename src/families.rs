use crate::{
    catalog::GenomeLookup, clusters::ClusterMap, error::UnknownSequenceError,
};
use log::{debug, warn};
use std::collections::{BTreeMap, HashSet};

/// One sequence from every genome, keyed by genome ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrthologFamily {
    pub cluster_id: String,
    pub members: BTreeMap<String, String>,
}

/// Every member of a sufficiently large cluster, genomes may repeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParalogFamily {
    pub cluster_id: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Family {
    Ortholog(OrthologFamily),
    Paralog(ParalogFamily),
}

impl Family {
    pub fn cluster_id(&self) -> &str {
        match self {
            Family::Ortholog(fam) => &fam.cluster_id,
            Family::Paralog(fam) => &fam.cluster_id,
        }
    }

    /// Member sequence IDs in output order
    pub fn sequence_ids(&self) -> Vec<&str> {
        match self {
            Family::Ortholog(fam) => {
                fam.members.values().map(String::as_str).collect()
            }
            Family::Paralog(fam) => {
                fam.members.iter().map(String::as_str).collect()
            }
        }
    }
}

/// Ortholog families plus the clusters dropped for unknown members
#[derive(Debug, Default)]
pub struct OrthologSelection {
    pub families: Vec<OrthologFamily>,
    pub excluded: Vec<UnknownSequenceError>,
}

// --------------------------------------------------
/// Select clusters holding exactly one sequence from each of the
/// `total_genome_count` genomes. A cluster that is one-to-one but misses
/// a genome is rejected, as is any cluster with a repeated genome or a
/// genome absent from the accession table.
pub fn select_ortholog_families(
    clusters: &ClusterMap,
    genome_lookup: &impl GenomeLookup,
    total_genome_count: usize,
) -> OrthologSelection {
    let mut selection = OrthologSelection::default();

    'clusters: for (cluster_id, sequences) in clusters {
        let mut members: BTreeMap<String, String> = BTreeMap::new();
        let mut outside = None;
        for sequence_id in sequences {
            match genome_lookup.lookup(sequence_id) {
                Some(rec) => {
                    if !genome_lookup.is_known_genome(&rec.genome_id) {
                        outside.get_or_insert(rec.genome_id.as_str());
                    }
                    members
                        .entry(rec.genome_id.clone())
                        .or_insert_with(|| sequence_id.clone());
                }
                _ => {
                    let err = UnknownSequenceError {
                        cluster_id: cluster_id.clone(),
                        sequence_id: sequence_id.clone(),
                    };
                    warn!("{err}");
                    selection.excluded.push(err);
                    continue 'clusters;
                }
            }
        }

        if let Some(genome_id) = outside {
            debug!(
                r#"Cluster {cluster_id}: genome "{genome_id}" is not in the accession table"#
            );
        } else if members.len() == sequences.len()
            && members.len() == total_genome_count
        {
            debug!("Ortholog family {cluster_id}");
            selection.families.push(OrthologFamily {
                cluster_id: cluster_id.clone(),
                members,
            });
        } else {
            debug!(
                "Cluster {cluster_id}: {} sequences cover {} of {total_genome_count} genomes",
                sequences.len(),
                genome_coverage(sequences, genome_lookup)
            );
        }
    }

    selection
}

// --------------------------------------------------
/// Select every cluster with at least `min_size` members, verbatim.
pub fn select_paralog_families(
    clusters: &ClusterMap,
    min_size: usize,
) -> Vec<ParalogFamily> {
    clusters
        .iter()
        .filter(|(_, sequences)| sequences.len() >= min_size)
        .map(|(cluster_id, sequences)| ParalogFamily {
            cluster_id: cluster_id.clone(),
            members: sequences.clone(),
        })
        .collect()
}

// --------------------------------------------------
/// Split off clusters that reference sequences missing from the
/// catalog. Each dropped cluster is reported once, with the first
/// unknown member.
pub fn resolve_clusters(
    clusters: &ClusterMap,
    genome_lookup: &impl GenomeLookup,
) -> (ClusterMap, Vec<UnknownSequenceError>) {
    let mut resolved = ClusterMap::new();
    let mut excluded = vec![];
    for (cluster_id, sequences) in clusters {
        match sequences
            .iter()
            .find(|id| genome_lookup.lookup(id).is_none())
        {
            Some(sequence_id) => {
                let err = UnknownSequenceError {
                    cluster_id: cluster_id.clone(),
                    sequence_id: sequence_id.clone(),
                };
                warn!("{err}");
                excluded.push(err);
            }
            _ => {
                resolved.insert(cluster_id.clone(), sequences.clone());
            }
        }
    }
    (resolved, excluded)
}

/// Distinct genomes represented in a cluster, unknown members ignored
pub fn genome_coverage(
    sequences: &[String],
    genome_lookup: &impl GenomeLookup,
) -> usize {
    sequences
        .iter()
        .filter_map(|id| genome_lookup.lookup(id))
        .map(|rec| rec.genome_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

// --------------------------------------------------
#[cfg(test)]
mod tests {
    use super::{
        genome_coverage, resolve_clusters, select_ortholog_families,
        select_paralog_families, Family, OrthologFamily, ParalogFamily,
    };
    use crate::{
        catalog::{GenomeCatalog, GenomeRecord},
        clusters::ClusterMap,
        error::UnknownSequenceError,
    };
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn catalog(pairs: &[(&str, &str)], genomes: &[&str]) -> GenomeCatalog {
        GenomeCatalog::from_records(
            pairs.iter().map(|(seq, genome)| GenomeRecord {
                sequence_id: seq.to_string(),
                genome_id: genome.to_string(),
                genome_name: format!("Name of {genome}"),
                sequence: "MKV".to_string(),
            }),
            genomes
                .iter()
                .map(|g| (g.to_string(), format!("Name of {g}")))
                .collect(),
        )
    }

    fn clusters(pairs: &[(&str, &[&str])]) -> ClusterMap {
        pairs
            .iter()
            .map(|(k, v)| {
                (k.to_string(), v.iter().map(|s| s.to_string()).collect())
            })
            .collect()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let clusters = clusters(&[("c1", &["s1", "s2"]), ("c2", &["s1", "s3"])]);
        let catalog =
            catalog(&[("s1", "g1"), ("s2", "g2"), ("s3", "g1")], &["g1", "g2"]);

        let selection = select_ortholog_families(&clusters, &catalog, 2);
        assert!(selection.excluded.is_empty());
        assert_eq!(
            selection.families,
            vec![OrthologFamily {
                cluster_id: "c1".to_string(),
                members: BTreeMap::from([
                    ("g1".to_string(), "s1".to_string()),
                    ("g2".to_string(), "s2".to_string()),
                ]),
            }]
        );
        assert_eq!(genome_coverage(&clusters["c2"], &catalog), 1);

        for min_size in 0..=2 {
            let paralogs = select_paralog_families(&clusters, min_size);
            assert!(paralogs.iter().any(|fam| fam.cluster_id == "c2"));
        }
    }

    #[test]
    fn test_partial_coverage_rejected() {
        // One sequence per genome, but g3 is missing
        let clusters = clusters(&[("c1", &["s1", "s2"])]);
        let catalog =
            catalog(&[("s1", "g1"), ("s2", "g2")], &["g1", "g2", "g3"]);
        let selection = select_ortholog_families(&clusters, &catalog, 3);
        assert!(selection.families.is_empty());
    }

    #[test]
    fn test_duplicate_genome_rejected() {
        // Three sequences for three genomes, but g1 twice and g3 absent
        let clusters = clusters(&[("c1", &["s1", "s2", "s3"])]);
        let catalog = catalog(
            &[("s1", "g1"), ("s2", "g2"), ("s3", "g1")],
            &["g1", "g2", "g3"],
        );
        let selection = select_ortholog_families(&clusters, &catalog, 3);
        assert!(selection.families.is_empty());
    }

    #[test]
    fn test_genome_outside_accessions_rejected() {
        // g4 has a proteome but no accession, g3 is left uncovered
        let clusters = clusters(&[
            ("c1", &["s1", "s2", "s4"]),
            ("c2", &["s1", "s2", "s3"]),
        ]);
        let catalog = catalog(
            &[("s1", "g1"), ("s2", "g2"), ("s3", "g3"), ("s4", "g4")],
            &["g1", "g2", "g3"],
        );
        let selection = select_ortholog_families(&clusters, &catalog, 3);
        assert!(selection.excluded.is_empty());
        assert_eq!(selection.families.len(), 1);

        let family = &selection.families[0];
        assert_eq!(family.cluster_id, "c2");
        assert_eq!(
            family.members.keys().collect::<Vec<_>>(),
            vec!["g1", "g2", "g3"]
        );
    }

    #[test]
    fn test_duplicate_sequence_rejected() {
        let clusters = clusters(&[("c1", &["s1", "s1"])]);
        let catalog = catalog(&[("s1", "g1"), ("s2", "g2")], &["g1", "g2"]);
        let selection = select_ortholog_families(&clusters, &catalog, 2);
        assert!(selection.families.is_empty());
    }

    #[test]
    fn test_removing_any_member_breaks_ortholog() {
        let members = ["s1", "s2", "s3", "s4"];
        let catalog = catalog(
            &[("s1", "g1"), ("s2", "g2"), ("s3", "g3"), ("s4", "g4")],
            &["g1", "g2", "g3", "g4"],
        );
        let full = clusters(&[("c1", &members)]);
        assert_eq!(
            select_ortholog_families(&full, &catalog, 4).families.len(),
            1
        );

        for skip in 0..members.len() {
            let partial: Vec<&str> = members
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, s)| *s)
                .collect();
            let partial = clusters(&[("c1", &partial)]);
            assert!(select_ortholog_families(&partial, &catalog, 4)
                .families
                .is_empty());
        }
    }

    #[test]
    fn test_unknown_sequence_excluded() {
        let clusters = clusters(&[
            ("c1", &["s1", "s2"]),
            ("c2", &["s1", "s9"]),
            ("c3", &["s8"]),
        ]);
        let catalog = catalog(&[("s1", "g1"), ("s2", "g2")], &["g1", "g2"]);

        let selection = select_ortholog_families(&clusters, &catalog, 2);
        assert_eq!(selection.families.len(), 1);
        assert_eq!(selection.families[0].cluster_id, "c1");
        // Every member is looked up, whatever the cluster size
        assert_eq!(
            selection.excluded,
            vec![
                UnknownSequenceError {
                    cluster_id: "c2".to_string(),
                    sequence_id: "s9".to_string(),
                },
                UnknownSequenceError {
                    cluster_id: "c3".to_string(),
                    sequence_id: "s8".to_string(),
                },
            ]
        );

        let (resolved, excluded) = resolve_clusters(&clusters, &catalog);
        assert_eq!(resolved.keys().collect::<Vec<_>>(), vec!["c1"]);
        assert_eq!(
            excluded
                .iter()
                .map(|e| (e.cluster_id.as_str(), e.sequence_id.as_str()))
                .collect::<Vec<_>>(),
            vec![("c2", "s9"), ("c3", "s8")]
        );
    }

    #[test]
    fn test_paralog_min_size_boundary() {
        let clusters = clusters(&[
            ("c1", &["s1"]),
            ("c2", &["s1", "s2"]),
            ("c3", &["s1", "s2", "s3"]),
        ]);

        let ids = |min_size| {
            select_paralog_families(&clusters, min_size)
                .into_iter()
                .map(|fam| fam.cluster_id)
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(1), vec!["c1", "c2", "c3"]);
        assert_eq!(ids(2), vec!["c2", "c3"]);
        assert_eq!(ids(3), vec!["c3"]);
        assert!(ids(4).is_empty());
    }

    #[test]
    fn test_paralog_keeps_duplicates_verbatim() {
        let clusters = clusters(&[("c1", &["s2", "s1", "s2"])]);
        assert_eq!(
            select_paralog_families(&clusters, 3),
            vec![ParalogFamily {
                cluster_id: "c1".to_string(),
                members: vec!["s2".into(), "s1".into(), "s2".into()],
            }]
        );
    }

    #[test]
    fn test_ortholog_satisfies_paralog_threshold() {
        let clusters = clusters(&[("c1", &["s1", "s2", "s3"])]);
        let catalog = catalog(
            &[("s1", "g1"), ("s2", "g2"), ("s3", "g3")],
            &["g1", "g2", "g3"],
        );
        let orthologs = select_ortholog_families(&clusters, &catalog, 3);
        assert_eq!(orthologs.families.len(), 1);
        for min_size in 0..=3 {
            assert_eq!(select_paralog_families(&clusters, min_size).len(), 1);
        }
    }

    #[test]
    fn test_family_accessors() {
        let ortholog = Family::Ortholog(OrthologFamily {
            cluster_id: "c1".to_string(),
            members: BTreeMap::from([
                ("g2".to_string(), "s1".to_string()),
                ("g1".to_string(), "s2".to_string()),
            ]),
        });
        assert_eq!(ortholog.cluster_id(), "c1");
        assert_eq!(ortholog.sequence_ids(), vec!["s2", "s1"]);

        let paralog = Family::Paralog(ParalogFamily {
            cluster_id: "c2".to_string(),
            members: vec!["s3".into(), "s3".into()],
        });
        assert_eq!(paralog.cluster_id(), "c2");
        assert_eq!(paralog.sequence_ids(), vec!["s3", "s3"]);
    }
}
