use crate::open;
use anyhow::{bail, Result};
use kseq::parse_reader;
use log::{debug, info, warn};
use std::{
    collections::{BTreeMap, HashMap},
    io::BufRead,
    path::Path,
};

/// Display name for genomes missing from the accession file
pub const UNKNOWN_GENOME: &str = "Unknown";

/// One protein sequence and the genome it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenomeRecord {
    pub sequence_id: String,
    pub genome_id: String,
    pub genome_name: String,
    pub sequence: String,
}

/// Read-only view of the genome catalog used by the family engines.
pub trait GenomeLookup {
    fn lookup(&self, sequence_id: &str) -> Option<&GenomeRecord>;

    /// Number of distinct genomes the run was asked to cover
    fn total_genome_count(&self) -> usize;

    /// True when `genome_id` is listed in the accession table
    fn is_known_genome(&self, genome_id: &str) -> bool;
}

#[derive(Debug, Default)]
pub struct GenomeCatalog {
    records: HashMap<String, GenomeRecord>,
    genome_names: BTreeMap<String, String>,
}

impl GenomeLookup for GenomeCatalog {
    fn lookup(&self, sequence_id: &str) -> Option<&GenomeRecord> {
        self.records.get(sequence_id)
    }

    fn total_genome_count(&self) -> usize {
        self.genome_names.len()
    }

    fn is_known_genome(&self, genome_id: &str) -> bool {
        self.genome_names.contains_key(genome_id)
    }
}

impl GenomeCatalog {
    /// Build a catalog from records already in memory. `genome_names`
    /// is the accession table and defines the total genome count.
    pub fn from_records(
        records: impl IntoIterator<Item = GenomeRecord>,
        genome_names: BTreeMap<String, String>,
    ) -> Self {
        GenomeCatalog {
            records: records
                .into_iter()
                .map(|rec| (rec.sequence_id.clone(), rec))
                .collect(),
            genome_names,
        }
    }

    /// Load the accession table and every `*.faa` proteome in `proteomes`.
    pub fn load(accessions: &Path, proteomes: &Path) -> Result<Self> {
        info!(r#"Loading accessions from "{}""#, accessions.display());
        let genome_names = read_accessions(open(accessions)?)?;
        if genome_names.is_empty() {
            bail!(r#"No accessions found in "{}""#, accessions.display());
        }

        let mut records: HashMap<String, GenomeRecord> = HashMap::new();
        for path in crate::list_files(proteomes, "faa")? {
            let genome_id = match path.file_stem() {
                Some(stem) => stem.to_string_lossy().to_string(),
                _ => bail!("Cannot get genome ID from {}", path.display()),
            };
            let genome_name = match genome_names.get(&genome_id) {
                Some(name) => name.clone(),
                _ => {
                    warn!(r#"Genome "{genome_id}" is not in the accession file"#);
                    UNKNOWN_GENOME.to_string()
                }
            };

            let mut reader = parse_reader(open(&path)?)?;
            let mut count = 0;
            while let Some(rec) = reader.iter_record()? {
                if rec.seq().is_empty() {
                    bail!(
                        r#"Sequence "{}" in "{}" is empty"#,
                        rec.head(),
                        path.display()
                    );
                }
                let sequence_id = rec.head().to_string();
                if let Some(prev) = records.get(&sequence_id) {
                    bail!(
                        r#"Duplicate sequence ID "{sequence_id}" in "{}" (already in genome "{}")"#,
                        path.display(),
                        prev.genome_id
                    );
                }
                records.insert(
                    sequence_id.clone(),
                    GenomeRecord {
                        sequence_id,
                        genome_id: genome_id.clone(),
                        genome_name: genome_name.clone(),
                        sequence: rec.seq().to_string(),
                    },
                );
                count += 1;
            }
            debug!("{genome_id}: {count} sequences");
        }

        info!(
            "Loaded {} sequences for {} genomes",
            records.len(),
            genome_names.len()
        );

        Ok(GenomeCatalog {
            records,
            genome_names,
        })
    }

    pub fn num_sequences(&self) -> usize {
        self.records.len()
    }
}

// --------------------------------------------------
/// Parse `accession;display name` lines. The name is optional.
fn read_accessions(reader: impl BufRead) -> Result<BTreeMap<String, String>> {
    let mut names = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        let mut parts = line.trim().splitn(2, ';');
        let accession = parts.next().unwrap_or_default().trim();
        if accession.is_empty() {
            continue;
        }
        let name = match parts.next().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => UNKNOWN_GENOME,
        };
        names.insert(accession.to_string(), name.to_string());
    }
    Ok(names)
}
