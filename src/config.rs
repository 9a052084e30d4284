use crate::{clusters::ColumnOrder, support::UnsupportedTrees};
use anyhow::{anyhow, Result};
use log::debug;
use serde::Deserialize;
use std::{fs, path::Path};

/// Settings read from the optional TOML config file. Command-line
/// arguments take precedence over anything set here.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub families: FamiliesConfig,
    pub align: AlignConfig,
    pub tools: ToolsConfig,
    pub trees: TreesConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FamiliesConfig {
    /// Never defaulted, the layout must be stated
    pub column_order: Option<ColumnOrder>,
    pub min_cluster_size: usize,
}

impl Default for FamiliesConfig {
    fn default() -> Self {
        FamiliesConfig {
            column_order: None,
            min_cluster_size: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlignConfig {
    pub workers: usize,
}

impl Default for AlignConfig {
    fn default() -> Self {
        AlignConfig { workers: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolsConfig {
    pub mafft: String,
    pub iqtree: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        ToolsConfig {
            mafft: "mafft".to_string(),
            iqtree: "iqtree".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreesConfig {
    pub model: String,
    pub bootstrap: u32,
    pub workers: usize,
    pub cpu_cores: usize,
    pub extension: String,
    pub min_support: Option<f64>,
    pub unsupported: UnsupportedTrees,
}

impl Default for TreesConfig {
    fn default() -> Self {
        TreesConfig {
            model: "WAG+I".to_string(),
            bootstrap: 0,
            workers: 4,
            cpu_cores: num_cpus::get(),
            extension: "treefile".to_string(),
            min_support: None,
            unsupported: UnsupportedTrees::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| anyhow!("Invalid config {}: {e}", path.display()))?;
        debug!("config = {config:#?}");
        Ok(config)
    }

    /// Defaults unless a config file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            _ => Ok(Config::default()),
        }
    }

    /// CPU cores handed to each of `workers` concurrent tree jobs
    pub fn cores_per_job(&self, workers: usize) -> usize {
        (self.trees.cpu_cores / workers.max(1)).max(1)
    }
}

// --------------------------------------------------
#[cfg(test)]
mod tests {
    use super::Config;
    use crate::{clusters::ColumnOrder, support::UnsupportedTrees};
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::{fs, path::Path};
    use tempfile::tempdir;

    #[test]
    fn test_defaults() -> Result<()> {
        let config = Config::load(None)?;
        assert_eq!(config.families.column_order, None);
        assert_eq!(config.families.min_cluster_size, 2);
        assert_eq!(config.tools.mafft, "mafft");
        assert_eq!(config.align.workers, 4);
        assert_eq!(config.trees.model, "WAG+I");
        assert_eq!(config.trees.extension, "treefile");
        assert_eq!(config.trees.unsupported, UnsupportedTrees::Score);
        Ok(())
    }

    #[test]
    fn test_from_file() -> Result<()> {
        let config = Config::load(Some(Path::new("tests/inputs/famtree.toml")))?;
        assert_eq!(
            config.families.column_order,
            Some(ColumnOrder::ClusterFirst)
        );
        assert_eq!(config.families.min_cluster_size, 3);
        assert_eq!(config.trees.min_support, Some(70.));
        assert_eq!(config.trees.unsupported, UnsupportedTrees::Exempt);
        assert_eq!(config.trees.workers, 2);
        assert_eq!(config.align.workers, 3);
        // Unset keys keep their defaults
        assert_eq!(config.tools.iqtree, "iqtree");
        Ok(())
    }

    #[test]
    fn test_partial_and_invalid() -> Result<()> {
        let dir = tempdir()?;
        let partial = dir.path().join("partial.toml");
        fs::write(&partial, "[families]\ncolumn_order = \"sequence-first\"\n")?;
        let config = Config::from_file(&partial)?;
        assert_eq!(
            config.families.column_order,
            Some(ColumnOrder::SequenceFirst)
        );
        assert_eq!(config.trees.bootstrap, 0);

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[families]\ncolumn_order = \"sideways\"\n")?;
        let res = Config::from_file(&bad);
        assert!(res.is_err());
        assert!(res.unwrap_err().to_string().starts_with("Invalid config"));

        let unknown = dir.path().join("unknown.toml");
        fs::write(&unknown, "[families]\nmin_size = 3\n")?;
        assert!(Config::from_file(&unknown).is_err());
        Ok(())
    }

    #[test]
    fn test_cores_per_job() {
        let mut config = Config::default();
        config.trees.cpu_cores = 8;
        assert_eq!(config.cores_per_job(4), 2);
        assert_eq!(config.cores_per_job(3), 2);
        assert_eq!(config.cores_per_job(16), 1);
        assert_eq!(config.cores_per_job(0), 8);
    }
}
