use crate::error::ExternalToolError;
use anyhow::{anyhow, Result};
use log::{info, warn};
use rayon::prelude::*;
use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

/// Result of one independent per-file job
#[derive(Debug)]
pub struct JobOutcome {
    pub input: PathBuf,
    pub result: Result<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct JobSummary {
    pub jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl JobSummary {
    pub fn from_outcomes(outcomes: &[JobOutcome]) -> Self {
        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        JobSummary {
            jobs: outcomes.len(),
            succeeded: outcomes.len() - failed,
            failed,
        }
    }
}

// --------------------------------------------------
/// Run `job` once per input on a pool of `workers` threads. A failing
/// job is logged and recorded in its outcome; the others carry on.
/// Outcomes come back in input order.
pub fn run_jobs<F>(inputs: &[PathBuf], workers: usize, job: F) -> Result<Vec<JobOutcome>>
where
    F: Fn(&Path) -> Result<PathBuf> + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()?;

    let outcomes: Vec<JobOutcome> = pool.install(|| {
        inputs
            .par_iter()
            .map(|input| {
                let result = job(input);
                if let Err(e) = &result {
                    warn!(r#"Job for "{}" failed: {e:#}"#, input.display());
                }
                JobOutcome {
                    input: input.clone(),
                    result,
                }
            })
            .collect()
    });

    let summary = JobSummary::from_outcomes(&outcomes);
    info!(
        "{} jobs on {} workers: {} succeeded, {} failed",
        summary.jobs,
        workers.max(1),
        summary.succeeded,
        summary.failed
    );

    Ok(outcomes)
}

/// An external program found on the PATH or at an explicit location
#[derive(Debug, Clone)]
pub struct Tool {
    pub path: PathBuf,
}

impl Tool {
    pub fn resolve(program: &str) -> Result<Self> {
        let path = which::which(program)
            .map_err(|e| anyhow!(r#"Cannot find "{program}": {e}"#))?;
        Ok(Tool { path })
    }

    // --------------------------------------------------
    /// Run to completion, failing with `ExternalToolError` on a
    /// non-zero exit.
    pub fn run(&self, args: &[String]) -> Result<Output> {
        let invocation = format!("{} {}", self.path.display(), args.join(" "));
        info!(r#"Running "{invocation}""#);

        let res = Command::new(&self.path)
            .args(args)
            .output()
            .map_err(|e| anyhow!(r#"Cannot run "{invocation}": {e}"#))?;

        if !res.status.success() {
            return Err(ExternalToolError {
                invocation,
                code: res.status.code(),
                stderr: String::from_utf8_lossy(&res.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(res)
    }
}

// --------------------------------------------------
#[cfg(test)]
mod tests {
    use super::{run_jobs, JobSummary, Tool};
    use crate::error::ExternalToolError;
    use anyhow::{bail, Result};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_run_jobs_isolates_failures() -> Result<()> {
        let inputs: Vec<PathBuf> =
            (0..20).map(|i| PathBuf::from(format!("f{i:02}.fa"))).collect();

        let outcomes = run_jobs(&inputs, 4, |input| {
            if input.to_string_lossy().contains('3') {
                bail!("no good");
            }
            Ok(input.with_extension("out"))
        })?;

        assert_eq!(
            outcomes.iter().map(|o| o.input.clone()).collect::<Vec<_>>(),
            inputs
        );
        assert_eq!(
            JobSummary::from_outcomes(&outcomes),
            JobSummary {
                jobs: 20,
                succeeded: 18,
                failed: 2,
            }
        );
        assert_eq!(
            outcomes[0].result.as_ref().ok(),
            Some(&PathBuf::from("f00.out"))
        );
        Ok(())
    }

    #[test]
    fn test_run_jobs_width_does_not_matter() -> Result<()> {
        let inputs: Vec<PathBuf> =
            (0..10).map(|i| PathBuf::from(format!("{i}"))).collect();
        let results = |workers| -> Result<Vec<String>> {
            Ok(run_jobs(&inputs, workers, |p| Ok(p.join("x")))?
                .into_iter()
                .flat_map(|o| o.result.ok())
                .map(|p| p.display().to_string())
                .collect())
        };
        assert_eq!(results(1)?, results(8)?);
        assert_eq!(results(0)?.len(), 10);
        Ok(())
    }

    #[test]
    fn test_resolve_missing_tool() {
        let res = Tool::resolve("famtree-no-such-program");
        assert!(res.is_err());
        assert!(res
            .unwrap_err()
            .to_string()
            .starts_with(r#"Cannot find "famtree-no-such-program""#));
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_failure() -> Result<()> {
        let tool = Tool::resolve("sh")?;
        let res = tool.run(&["-c".to_string(), "echo oops >&2; exit 3".to_string()]);
        assert!(res.is_err());
        let err = res.unwrap_err();
        let err = err.downcast_ref::<ExternalToolError>();
        assert_eq!(err.map(|e| e.code), Some(Some(3)));
        assert_eq!(err.map(|e| e.stderr.as_str()), Some("oops"));

        let out = tool.run(&["-c".to_string(), "echo fine".to_string()])?;
        assert_eq!(String::from_utf8(out.stdout)?, "fine\n");
        Ok(())
    }
}
