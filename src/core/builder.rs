//! Solution builds through `cbuild`
//!
//! A build compiles either one resolved context or, for a clean build with
//! no filters, every context of the solution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::build_env::Toolchain;
use super::context::{BuildContext, ContextFilter};
use crate::error::ToolError;
use crate::infra::process::ToolCommand;

/// What to compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Solution descriptor
    pub solution_file: PathBuf,
    /// Context to build; every context when `None`
    pub context: Option<BuildContext>,
    /// Pass `--rebuild`
    pub rebuild: bool,
}

impl BuildPlan {
    /// Build a single context
    pub fn for_context(solution_file: &Path, context: BuildContext, rebuild: bool) -> Self {
        Self {
            solution_file: solution_file.to_path_buf(),
            context: Some(context),
            rebuild,
        }
    }

    /// Rebuild every context of the solution
    pub fn all_contexts(solution_file: &Path) -> Self {
        Self {
            solution_file: solution_file.to_path_buf(),
            context: None,
            rebuild: true,
        }
    }

    /// `cbuild` arguments
    pub fn args(&self) -> Vec<OsString> {
        let mut args = vec![self.solution_file.clone().into_os_string(), "--packs".into()];
        if let Some(context) = &self.context {
            args.push("--context".into());
            args.push(context.to_string().into());
        }
        if self.rebuild {
            args.push("--rebuild".into());
        }
        args
    }
}

/// Whether a build should skip context selection and rebuild everything
pub fn builds_all_contexts(clean: bool, filter: &ContextFilter) -> bool {
    clean && filter.target.is_none() && filter.project.is_none()
}

/// Finished build
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// Combined `cbuild` output
    pub log: String,
    /// Wall-clock duration
    pub duration: Duration,
}

/// Runs `cbuild` with the configured toolchain
#[derive(Debug, Clone, Copy)]
pub struct Builder<'a> {
    toolchain: &'a Toolchain,
}

impl<'a> Builder<'a> {
    /// Create a builder for `toolchain`
    pub fn new(toolchain: &'a Toolchain) -> Self {
        Self { toolchain }
    }

    /// The invocation for `plan`, run from the solution root
    pub fn command(&self, plan: &BuildPlan, solution_root: &Path) -> ToolCommand {
        self.toolchain
            .cbuild(self.toolchain.build_timeout)
            .args(plan.args())
            .current_dir(solution_root)
    }

    /// Compile; a failing build returns the compiler output verbatim
    pub async fn build(
        &self,
        plan: &BuildPlan,
        solution_root: &Path,
    ) -> Result<BuildOutput, ToolError> {
        match &plan.context {
            Some(ctx) => tracing::info!("Building {ctx}"),
            None => tracing::info!("Building all contexts"),
        }
        let start = Instant::now();
        let out = self.command(plan, solution_root).run().await?;
        let duration = start.elapsed();
        tracing::debug!("cbuild finished in {:.1}s", duration.as_secs_f64());
        Ok(BuildOutput {
            log: out.output,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toolchain() -> Toolchain {
        Toolchain {
            toolbox_dir: None,
            gcc_dir: None,
            pack_root: None,
            build_timeout: Duration::from_secs(5),
            list_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_single_context_args() {
        let ctx = BuildContext::new("blinky", "debug", "E7-HE");
        let plan = BuildPlan::for_context(Path::new("app.csolution.yml"), ctx, false);
        assert_eq!(
            plan.args(),
            vec![
                OsString::from("app.csolution.yml"),
                "--packs".into(),
                "--context".into(),
                "blinky.debug+E7-HE".into(),
            ]
        );
    }

    #[test]
    fn test_clean_all_args() {
        let plan = BuildPlan::all_contexts(Path::new("app.csolution.yml"));
        assert_eq!(
            plan.args(),
            vec![
                OsString::from("app.csolution.yml"),
                "--packs".into(),
                "--rebuild".into(),
            ]
        );
    }

    #[test]
    fn test_builds_all_only_without_filters() {
        let none = ContextFilter::default();
        let targeted = ContextFilter {
            target: Some("E7-HE".to_string()),
            project: None,
        };
        assert!(builds_all_contexts(true, &none));
        assert!(!builds_all_contexts(false, &none));
        assert!(!builds_all_contexts(true, &targeted));
    }

    #[test]
    fn test_command_runs_from_solution_root() {
        let tc = toolchain();
        let plan = BuildPlan::all_contexts(Path::new("/work/app.csolution.yml"));
        let cmd = Builder::new(&tc).command(&plan, Path::new("/work"));
        assert_eq!(cmd.program_name(), "cbuild");
        assert_eq!(cmd.get_args().len(), 3);
    }
}
