use clap::{builder::PossibleValue, ValueEnum};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// Integer support right after a closing internal node, before its
// branch length, e.g., the "95" in "(A:1,B:2)95:0.1"
static SUPPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\)(\d+):").unwrap());

/// What to do with trees that carry no support values at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnsupportedTrees {
    /// Score them as 0.0 like any other tree
    #[default]
    Score,
    /// Keep them whatever the threshold
    Exempt,
}

impl ValueEnum for UnsupportedTrees {
    fn value_variants<'a>() -> &'a [Self] {
        &[UnsupportedTrees::Score, UnsupportedTrees::Exempt]
    }

    fn to_possible_value<'a>(&self) -> Option<PossibleValue> {
        Some(match self {
            UnsupportedTrees::Score => PossibleValue::new("score"),
            UnsupportedTrees::Exempt => PossibleValue::new("exempt"),
        })
    }
}

// --------------------------------------------------
pub fn support_values(tree: &str) -> Vec<f64> {
    SUPPORT
        .captures_iter(tree)
        .filter_map(|caps| caps[1].parse::<f64>().ok())
        .collect()
}

// --------------------------------------------------
/// Mean of the internal-node support values, 0.0 when there are none
pub fn support_score(tree: &str) -> f64 {
    mean(&support_values(tree))
}

// --------------------------------------------------
pub fn should_retain(tree: &str, threshold: f64) -> bool {
    support_score(tree) >= threshold
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        0.
    } else {
        vals.iter().sum::<f64>() / vals.len() as f64
    }
}

/// Verdict for a single tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub num_values: usize,
    pub score: f64,
    pub retain: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportFilter {
    pub threshold: f64,
    pub unsupported: UnsupportedTrees,
}

impl SupportFilter {
    pub fn assess(&self, tree: &str) -> Assessment {
        let vals = support_values(tree);
        let score = mean(&vals);
        let retain = match (vals.is_empty(), self.unsupported) {
            (true, UnsupportedTrees::Exempt) => true,
            _ => score >= self.threshold,
        };
        Assessment {
            num_values: vals.len(),
            score,
            retain,
        }
    }
}
