use crate::{
    labels::strip_label_counters, list_files, open, open_for_write,
    support::SupportFilter,
};
use anyhow::Result;
use csv::WriterBuilder;
use log::{debug, info, warn};
use serde::Serialize;
use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

pub const ALL_TREES: &str = "all_trees.txt";
pub const ALL_TREES_BOOTSTRAP: &str = "all_trees_bootstrap.txt";

/// Gathers the first line of each per-family tree file into one corpus
#[derive(Debug, Clone)]
pub struct TreeCollector {
    /// Extension of the tree files, e.g., "treefile"
    pub extension: String,
    pub filter: Option<SupportFilter>,
    pub strip_counters: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeStatus {
    Merged,
    Discarded,
    Skipped,
}

/// One row of the per-file report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeReport {
    pub file: String,
    pub status: TreeStatus,
    pub support_values: Option<usize>,
    pub score: Option<f64>,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CollectSummary {
    pub files: usize,
    pub merged: usize,
    pub discarded: usize,
    pub skipped: usize,
    #[serde(skip)]
    pub reports: Vec<TreeReport>,
}

impl Default for TreeCollector {
    fn default() -> Self {
        TreeCollector {
            extension: "treefile".to_string(),
            filter: None,
            strip_counters: false,
        }
    }
}

impl TreeCollector {
    /// Corpus file name for this configuration
    pub fn output_name(&self) -> &'static str {
        match self.filter {
            Some(_) => ALL_TREES_BOOTSTRAP,
            _ => ALL_TREES,
        }
    }

    // --------------------------------------------------
    /// Merge every tree file in `indir`, sorted by file name, into
    /// `outfile`, one tree per line. Empty or unreadable files are
    /// skipped and reported, never fatal.
    pub fn collect(&self, indir: &Path, outfile: &Path) -> Result<CollectSummary> {
        info!(
            r#"Collecting "*.{}" trees from "{}""#,
            self.extension,
            indir.display()
        );

        let files = list_files(indir, &self.extension)?;
        let mut summary = CollectSummary {
            files: files.len(),
            ..Default::default()
        };

        let mut output = open_for_write(outfile)?;
        for file in &files {
            let report = match first_line(file) {
                Ok(Some(tree)) => {
                    let tree = if self.strip_counters {
                        strip_label_counters(&tree)
                    } else {
                        tree
                    };
                    self.consider(file, &tree, &mut output)?
                }
                Ok(None) => skipped(file, "empty file".to_string()),
                Err(e) => skipped(file, e.to_string()),
            };

            match report.status {
                TreeStatus::Merged => summary.merged += 1,
                TreeStatus::Discarded => summary.discarded += 1,
                TreeStatus::Skipped => summary.skipped += 1,
            }
            summary.reports.push(report);
        }
        output.flush()?;

        info!(
            "Merged {} of {} trees into \"{}\" ({} discarded, {} skipped)",
            summary.merged,
            summary.files,
            outfile.display(),
            summary.discarded,
            summary.skipped
        );

        Ok(summary)
    }

    fn consider(
        &self,
        file: &Path,
        tree: &str,
        output: &mut impl Write,
    ) -> Result<TreeReport> {
        let mut report = TreeReport {
            file: file_name(file),
            status: TreeStatus::Merged,
            support_values: None,
            score: None,
            reason: String::new(),
        };

        if let Some(filter) = &self.filter {
            let assessment = filter.assess(tree);
            report.support_values = Some(assessment.num_values);
            report.score = Some(assessment.score);
            if !assessment.retain {
                debug!(
                    "Discarding {} (support {:0.02} < {})",
                    report.file, assessment.score, filter.threshold
                );
                report.status = TreeStatus::Discarded;
                report.reason = format!(
                    "support {:0.02} below threshold {}",
                    assessment.score, filter.threshold
                );
                return Ok(report);
            }
        }

        writeln!(output, "{tree}")?;
        Ok(report)
    }
}

// --------------------------------------------------
/// Write the per-file report as a tab-delimited file
pub fn write_report(reports: &[TreeReport], outfile: &PathBuf) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(true)
        .delimiter(b'\t')
        .from_path(outfile)?;
    for report in reports {
        wtr.serialize(report)?;
    }
    wtr.flush()?;
    Ok(())
}

// --------------------------------------------------
fn first_line(path: &Path) -> Result<Option<String>> {
    let mut line = String::new();
    open(path)?.read_line(&mut line)?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

fn skipped(file: &Path, reason: String) -> TreeReport {
    warn!("Skipping \"{}\": {reason}", file.display());
    TreeReport {
        file: file_name(file),
        status: TreeStatus::Skipped,
        support_values: None,
        score: None,
        reason,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
