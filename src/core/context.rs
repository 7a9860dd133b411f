//! Build context resolution
//!
//! A build context names one buildable unit of a CMSIS solution as
//! `<project>.<build-type>+<target>`. Contexts are listed by
//! `cbuild list contexts`, narrowed by the user's filters and resolved to
//! exactly one, asking the [`Selector`] only when several remain.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use super::build_env::Toolchain;
use super::selector::Selector;
use crate::error::ContextError;

/// One buildable unit of a solution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildContext {
    /// Project name
    pub project: String,
    /// Build type (`debug`, `release`)
    pub build_type: String,
    /// Target type (`E7-HE`)
    pub target: String,
}

impl BuildContext {
    /// Create a context from its parts
    pub fn new(project: &str, build_type: &str, target: &str) -> Self {
        Self {
            project: project.to_string(),
            build_type: build_type.to_string(),
            target: target.to_string(),
        }
    }
}

impl fmt::Display for BuildContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}+{}", self.project, self.build_type, self.target)
    }
}

impl FromStr for BuildContext {
    type Err = ContextError;

    /// Exactly one `+`; the last `.` before it splits project and build type
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ContextError::Invalid {
            context: s.to_string(),
        };

        let (left, target) = s.split_once('+').ok_or_else(invalid)?;
        if target.contains('+') || target.is_empty() {
            return Err(invalid());
        }
        let (project, build_type) = left.rsplit_once('.').ok_or_else(invalid)?;
        if project.is_empty() || build_type.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(project, build_type, target))
    }
}

/// Filters narrowing the listed contexts
#[derive(Debug, Clone, Default)]
pub struct ContextFilter {
    /// Keep contexts whose target equals this
    pub target: Option<String>,
    /// Keep contexts whose string starts with this
    pub project: Option<String>,
}

impl ContextFilter {
    /// Whether `context` survives both filters
    pub fn matches(&self, context: &BuildContext) -> bool {
        if let Some(target) = self.target.as_deref().filter(|t| !t.is_empty()) {
            if context.target != target {
                return false;
            }
        }
        if let Some(project) = self.project.as_deref().filter(|p| !p.is_empty()) {
            if !context.to_string().starts_with(project) {
                return false;
            }
        }
        true
    }

    fn nothing_listed(&self) -> ContextError {
        ContextError::Empty {
            project_filter: self.project.clone().unwrap_or_default(),
            target_filter: self.target.clone().unwrap_or_default(),
        }
    }

    fn no_match(&self) -> ContextError {
        ContextError::NoMatch {
            project_filter: self.project.clone().unwrap_or_default(),
            target_filter: self.target.clone().unwrap_or_default(),
        }
    }
}

/// Parse `cbuild list contexts` output, one context per line
///
/// Lines that are not context strings are skipped.
pub fn parse_context_list(output: &str) -> Vec<BuildContext> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|line| match line.parse::<BuildContext>() {
            Ok(ctx) => Some(ctx),
            Err(_) => {
                tracing::debug!("Ignoring non-context line from cbuild: {line}");
                None
            }
        })
        .collect()
}

/// Narrow `contexts` with `filter` and resolve to exactly one
///
/// Order is preserved as reported by the tool. Several survivors go to the
/// selector; batch selectors turn that into an ambiguity error.
pub fn resolve_from_list(
    contexts: &[BuildContext],
    filter: &ContextFilter,
    selector: &dyn Selector,
) -> Result<BuildContext, ContextError> {
    if contexts.is_empty() {
        return Err(filter.nothing_listed());
    }
    let candidates: Vec<&BuildContext> = contexts.iter().filter(|c| filter.matches(c)).collect();

    match candidates.as_slice() {
        [] => Err(filter.no_match()),
        [only] => {
            tracing::info!("Resolved build context: {only}");
            Ok((*only).clone())
        }
        many => {
            let names: Vec<String> = many.iter().map(ToString::to_string).collect();
            let index = selector.select("build context", &names)?;
            Ok(many[index].clone())
        }
    }
}

/// Lists and resolves contexts of a solution through `cbuild`
pub struct ContextResolver<'a> {
    toolchain: &'a Toolchain,
}

impl<'a> ContextResolver<'a> {
    /// Create a resolver using the given toolchain environment
    pub fn new(toolchain: &'a Toolchain) -> Self {
        Self { toolchain }
    }

    /// Every context the solution declares, in tool order
    ///
    /// An empty listing is not an error here; resolution reports it along
    /// with the filters in use.
    pub async fn list(&self, solution_file: &Path) -> Result<Vec<BuildContext>, ContextError> {
        let out = self
            .toolchain
            .cbuild(self.toolchain.list_timeout)
            .args(["list", "contexts"])
            .arg(solution_file)
            .run()
            .await?;

        let contexts = parse_context_list(&out.output);
        if contexts.is_empty() {
            tracing::warn!("cbuild listed no contexts for {}", solution_file.display());
        }
        Ok(contexts)
    }

    /// List, filter and resolve to a single context
    pub async fn resolve(
        &self,
        solution_file: &Path,
        filter: &ContextFilter,
        selector: &dyn Selector,
    ) -> Result<BuildContext, ContextError> {
        let contexts = self.list(solution_file).await?;
        resolve_from_list(&contexts, filter, selector)
    }
}
