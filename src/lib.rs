pub mod catalog;
pub mod clusters;
pub mod config;
pub mod error;
pub mod families;
pub mod jobs;
pub mod labels;
pub mod support;
pub mod trees;
pub mod writer;

use crate::{
    catalog::{GenomeCatalog, GenomeLookup},
    clusters::{read_clusters, ColumnOrder},
    config::Config,
    families::{
        resolve_clusters, select_ortholog_families, select_paralog_families,
        Family,
    },
    jobs::{run_jobs, JobSummary, Tool},
    labels::disambiguate_labels,
    support::{SupportFilter, UnsupportedTrees},
    trees::{write_report, CollectSummary, TreeCollector},
    writer::{write_family, write_manifest},
};
use anyhow::{anyhow, bail, Result};
use clap::{builder::PossibleValue, Args, Parser, Subcommand, ValueEnum};
use csv::WriterBuilder;
use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};
use walkdir::WalkDir;

/// Protein family and gene tree toolkit for comparative genomics
#[derive(Debug, Parser)]
#[command(author, version, about, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output directory
    #[arg(
        short,
        long,
        global = true,
        value_name = "OUTDIR",
        default_value = "famtree-out"
    )]
    pub outdir: PathBuf,

    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, global = true)]
    pub log: Option<LogLevel>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Select ortholog and paralog families from sequence clusters
    Families(FamiliesArgs),

    /// Align every family file with MAFFT
    Align(AlignArgs),

    /// Make duplicated labels in alignments unique
    Disambiguate(DisambiguateArgs),

    /// Infer one tree per alignment with IQ-TREE
    Trees(TreesArgs),

    /// Merge per-family trees into one corpus
    Merge(MergeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct FamiliesArgs {
    /// Cluster assignments, two tab-separated columns
    #[arg(long, value_name = "CLUSTERS")]
    pub clusters: PathBuf,

    /// Accession file, "accession;name" per line
    #[arg(long, value_name = "ACCESSIONS")]
    pub accessions: PathBuf,

    /// Directory of "{accession}.faa" proteomes
    #[arg(long, value_name = "PROTEOMES")]
    pub proteomes: PathBuf,

    /// Column layout of the cluster file
    #[arg(long, value_name = "ORDER")]
    pub column_order: Option<ColumnOrder>,

    /// Minimum number of sequences in a paralog family
    #[arg(short, long, value_name = "SIZE")]
    pub min_cluster_size: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct AlignArgs {
    /// Directory of family FASTA files
    #[arg(long, value_name = "FAMILIES")]
    pub families: PathBuf,

    /// Number of concurrent alignment jobs
    #[arg(short, long, value_name = "WORKERS")]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct DisambiguateArgs {
    /// Directory of aligned FASTA files
    #[arg(long, value_name = "ALIGNMENTS")]
    pub alignments: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct TreesArgs {
    /// Directory of aligned FASTA files
    #[arg(long, value_name = "ALIGNMENTS")]
    pub alignments: PathBuf,

    /// Number of bootstrap replicates, 0 for none
    #[arg(short, long, value_name = "REPLICATES")]
    pub bootstrap: Option<u32>,

    /// Substitution model
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Number of concurrent tree jobs
    #[arg(short, long, value_name = "WORKERS")]
    pub workers: Option<usize>,

    /// CPU cores shared among the jobs
    #[arg(long, value_name = "CORES")]
    pub cpu_cores: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct MergeArgs {
    /// Directory of per-family tree files
    #[arg(long, value_name = "TREES")]
    pub trees: PathBuf,

    /// Discard trees with mean support below this value
    #[arg(long, value_name = "SUPPORT")]
    pub min_support: Option<f64>,

    /// Handling of trees without support values
    #[arg(long, value_name = "POLICY")]
    pub unsupported: Option<UnsupportedTrees>,

    /// Extension of the tree files
    #[arg(short, long, value_name = "EXT")]
    pub extension: Option<String>,

    /// Remove "_N" label counters from merged trees
    #[arg(long)]
    pub strip_counters: bool,
}

#[derive(Debug, Clone)]
pub enum LogLevel {
    Info,
    Debug,
}

impl ValueEnum for LogLevel {
    fn value_variants<'a>() -> &'a [Self] {
        &[LogLevel::Info, LogLevel::Debug]
    }

    fn to_possible_value<'a>(&self) -> Option<PossibleValue> {
        Some(match self {
            LogLevel::Info => PossibleValue::new("info"),
            LogLevel::Debug => PossibleValue::new("debug"),
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FamilySummary {
    pub genomes: usize,
    pub sequences: usize,
    pub clusters_parsed: usize,
    pub clusters_excluded: usize,
    pub ortholog_families: usize,
    pub paralog_families: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DisambiguateSummary {
    pub files: usize,
    pub relabeled: usize,
}

// --------------------------------------------------
pub fn families(
    outdir: &Path,
    config: &Config,
    args: FamiliesArgs,
) -> Result<FamilySummary> {
    let start = Instant::now();
    let column_order = args
        .column_order
        .or(config.families.column_order)
        .ok_or_else(|| {
            anyhow!(
                r#"Column order of "{}" must be set with --column-order or in the config file"#,
                args.clusters.display()
            )
        })?;
    let min_size = args
        .min_cluster_size
        .unwrap_or(config.families.min_cluster_size);

    let catalog = GenomeCatalog::load(&args.accessions, &args.proteomes)?;
    let total_genomes = catalog.total_genome_count();
    println!(
        "Loaded {} sequences from {} genomes",
        catalog.num_sequences(),
        total_genomes
    );

    let clusters = read_clusters(&args.clusters, column_order)?;
    println!("Parsed {} clusters", clusters.len());

    let (resolved, excluded) = resolve_clusters(&clusters, &catalog);
    let selection = select_ortholog_families(&resolved, &catalog, total_genomes);
    let orthologs: Vec<Family> =
        selection.families.into_iter().map(Family::Ortholog).collect();
    let paralogs: Vec<Family> = select_paralog_families(&resolved, min_size)
        .into_iter()
        .map(Family::Paralog)
        .collect();

    fs::create_dir_all(outdir)?;
    let mut wtr = WriterBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .from_path(outdir.join("excluded_clusters.tsv"))?;
    for err in excluded.iter().chain(&selection.excluded) {
        wtr.serialize(err)?;
    }
    wtr.flush()?;

    for (name, selected) in [("orthologs", &orthologs), ("paralogs", &paralogs)] {
        let family_dir = outdir.join("families").join(name);
        fs::create_dir_all(&family_dir)?;
        for family in selected {
            write_family(family, &catalog, &family_dir)?;
        }

        let manifest = outdir.join(format!("clusters_{name}.txt"));
        write_manifest(selected, &manifest)?;
        info!(
            r#"Wrote {} {name} to "{}""#,
            selected.len(),
            family_dir.display()
        );
    }

    let summary = FamilySummary {
        genomes: total_genomes,
        sequences: catalog.num_sequences(),
        clusters_parsed: clusters.len(),
        clusters_excluded: excluded.len() + selection.excluded.len(),
        ortholog_families: orthologs.len(),
        paralog_families: paralogs.len(),
    };
    write_summary(&outdir.join("families_summary.json"), &summary)?;

    println!("Clusters parsed   : {}", summary.clusters_parsed);
    println!("Clusters excluded : {}", summary.clusters_excluded);
    println!("Ortholog families : {}", summary.ortholog_families);
    println!(
        "Paralog families  : {} (min size {min_size})",
        summary.paralog_families
    );
    println!(
        r#"Finished in {} seconds, see output in "{}""#,
        start.elapsed().as_secs(),
        outdir.display()
    );

    Ok(summary)
}

// --------------------------------------------------
pub fn align(outdir: &Path, config: &Config, args: AlignArgs) -> Result<JobSummary> {
    let mafft = Tool::resolve(&config.tools.mafft)?;
    let inputs = list_files(&args.families, "fasta")?;
    let aln_dir = outdir.join("alignments");
    fs::create_dir_all(&aln_dir)?;

    let workers = args.workers.unwrap_or(config.align.workers);
    println!("Aligning {} families on {workers} workers", inputs.len());

    let outcomes = run_jobs(&inputs, workers, |input| {
        let res = mafft.run(&[
            "--quiet".to_string(),
            "--auto".to_string(),
            input.to_string_lossy().to_string(),
        ])?;
        let outfile =
            aln_dir.join(format!("{}_aligned.fasta", family_stem(input)?));
        let mut output = open_for_write(&outfile)?;
        output.write_all(&res.stdout)?;
        output.flush()?;
        Ok(outfile)
    })?;

    finish_jobs(outdir, "align", &outcomes)
}

// --------------------------------------------------
pub fn disambiguate(
    outdir: &Path,
    _config: &Config,
    args: DisambiguateArgs,
) -> Result<DisambiguateSummary> {
    let inputs = list_files(&args.alignments, "fasta")?;
    let mod_dir = outdir.join("modified");
    fs::create_dir_all(&mod_dir)?;

    let mut summary = DisambiguateSummary {
        files: inputs.len(),
        ..Default::default()
    };
    for input in &inputs {
        let text = fs::read_to_string(input)
            .map_err(|e| anyhow!("Cannot read {}: {e}", input.display()))?;
        let modified = disambiguate_labels(&text);
        if modified != text {
            debug!(r#"Relabeled "{}""#, input.display());
            summary.relabeled += 1;
        }
        let outfile =
            mod_dir.join(format!("{}_modified.fasta", family_stem(input)?));
        let mut output = open_for_write(&outfile)?;
        output.write_all(modified.as_bytes())?;
        output.flush()?;
    }

    write_summary(&outdir.join("disambiguate_summary.json"), &summary)?;
    println!(
        r#"Relabeled {} of {} alignments into "{}""#,
        summary.relabeled,
        summary.files,
        mod_dir.display()
    );
    Ok(summary)
}

// --------------------------------------------------
pub fn trees(outdir: &Path, config: &Config, args: TreesArgs) -> Result<JobSummary> {
    let iqtree = Tool::resolve(&config.tools.iqtree)?;
    let inputs = list_files(&args.alignments, "fasta")?;

    let bootstrap = args.bootstrap.unwrap_or(config.trees.bootstrap);
    let model = args.model.unwrap_or_else(|| config.trees.model.clone());
    let workers = args.workers.unwrap_or(config.trees.workers);
    let mut config = config.clone();
    if let Some(cores) = args.cpu_cores {
        config.trees.cpu_cores = cores;
    }
    let cores = config.cores_per_job(workers);

    let tree_dir = outdir.join(if bootstrap > 0 { "trees_boot" } else { "trees" });
    fs::create_dir_all(&tree_dir)?;
    println!(
        "Inferring {} trees on {workers} workers with {cores} cores each",
        inputs.len()
    );

    let outcomes = run_jobs(&inputs, workers, |input| {
        let stem = family_stem(input)?;
        let prefix = tree_dir.join(&stem);
        let mut iqtree_args = vec![
            "-s".to_string(),
            input.to_string_lossy().to_string(),
            "-T".to_string(),
            cores.to_string(),
            "-pre".to_string(),
            prefix.to_string_lossy().to_string(),
            "-m".to_string(),
            model.clone(),
            "-quiet".to_string(),
        ];
        if bootstrap > 0 {
            iqtree_args.extend_from_slice(&["-b".to_string(), bootstrap.to_string()]);
        }
        iqtree.run(&iqtree_args)?;

        // Cluster IDs often contain dots, so no `with_extension`
        let treefile = tree_dir.join(format!("{stem}.treefile"));
        if !treefile.exists() {
            bail!("Failed to find expected tree file {}", treefile.display());
        }
        Ok(treefile)
    })?;

    finish_jobs(outdir, "trees", &outcomes)
}

// --------------------------------------------------
pub fn merge(outdir: &Path, config: &Config, args: MergeArgs) -> Result<CollectSummary> {
    let filter = args
        .min_support
        .or(config.trees.min_support)
        .map(|threshold| SupportFilter {
            threshold,
            unsupported: args.unsupported.unwrap_or(config.trees.unsupported),
        });
    let collector = TreeCollector {
        extension: args
            .extension
            .unwrap_or_else(|| config.trees.extension.clone()),
        filter,
        strip_counters: args.strip_counters,
    };

    fs::create_dir_all(outdir)?;
    let outfile = outdir.join(collector.output_name());
    let summary = collector.collect(&args.trees, &outfile)?;
    write_report(&summary.reports, &outdir.join("trees_report.tsv"))?;
    write_summary(&outdir.join("merge_summary.json"), &summary)?;

    println!("Tree files     : {}", summary.files);
    println!("Trees merged   : {}", summary.merged);
    println!("Trees discarded: {}", summary.discarded);
    println!("Files skipped  : {}", summary.skipped);
    println!(r#"Corpus written to "{}""#, outfile.display());

    Ok(summary)
}

// --------------------------------------------------
fn finish_jobs(
    outdir: &Path,
    name: &str,
    outcomes: &[jobs::JobOutcome],
) -> Result<JobSummary> {
    let failed: Vec<_> = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().err().map(|e| (&o.input, e)))
        .collect();
    for (input, e) in &failed {
        println!("Failed {}: {e:#}", input.display());
    }

    let summary = JobSummary::from_outcomes(outcomes);
    write_summary(&outdir.join(format!("{name}_summary.json")), &summary)?;
    println!(
        "{} jobs: {} succeeded, {} failed{}",
        summary.jobs,
        summary.succeeded,
        summary.failed,
        if failed.is_empty() {
            String::new()
        } else {
            format!(
                " ({})",
                failed
                    .iter()
                    .map(|(input, _)| input.display().to_string())
                    .join(", ")
            )
        }
    );
    Ok(summary)
}

// --------------------------------------------------
/// Cluster ID behind a family, alignment or tree file name, e.g.,
/// "c1" for "c1_aligned_modified.fasta"
pub fn family_stem(path: &Path) -> Result<String> {
    let stem = match path.file_stem() {
        Some(stem) => stem.to_string_lossy().to_string(),
        _ => bail!("Cannot get filename from {}", path.display()),
    };
    let stem = stem.strip_suffix("_modified").unwrap_or(&stem);
    let stem = stem.strip_suffix("_aligned").unwrap_or(stem);
    Ok(stem.to_string())
}

// --------------------------------------------------
/// Regular files in `dir` with the given extension, sorted by name
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!(r#""{}" is not a directory"#, dir.display());
    }

    let mut files = vec![];
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

// --------------------------------------------------
fn write_summary(outfile: &Path, summary: &impl Serialize) -> Result<()> {
    let mut output = open_for_write(outfile)?;
    serde_json::to_writer_pretty(&mut output, summary)?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

// --------------------------------------------------
pub fn open(filename: &Path) -> Result<Box<dyn BufRead>> {
    Ok(Box::new(BufReader::new(File::open(filename).map_err(
        |e| anyhow!("Cannot read {}: {e}", filename.display()),
    )?)))
}

// --------------------------------------------------
pub fn open_for_write(filename: &Path) -> Result<Box<dyn Write>> {
    Ok(Box::new(BufWriter::new(File::create(filename).map_err(
        |e| anyhow!("Cannot write {}: {e}", filename.display()),
    )?)))
}
