use std::{path::Path, sync::Arc};

use anyhow::Context;
use throwscope::{
    analysis::{AnalysisOutcome, ExceptionFinder},
    docs::XmlDocProvider,
    metadata::identity::MethodId,
    program::Program,
    CancellationToken,
};

use crate::app::PolicyArgs;

/// Load a JSON program description.
pub fn load_program(path: &Path) -> anyhow::Result<Arc<Program>> {
    let program = Program::from_file(path)
        .with_context(|| format!("failed to load program: {}", path.display()))?;
    log::debug!(
        "{}: {} methods in {} types",
        path.display(),
        program.method_count(),
        program.classes().count()
    );
    Ok(Arc::new(program))
}

/// Create a finder over `program` configured by the policy flags.
///
/// Exception names in the documentation files resolve against the program first.
pub fn build_finder(program: &Arc<Program>, policy: &PolicyArgs) -> ExceptionFinder {
    let finder = ExceptionFinder::new(program.clone(), policy.options());
    if policy.xmldoc.is_empty() {
        return finder;
    }

    let resolver = Arc::clone(program);
    let docs = XmlDocProvider::from_files(&policy.xmldoc)
        .with_resolver(move |name| resolver.find_type(name));
    log::info!("{} documented members loaded", docs.len());
    finder.with_documentation(Arc::new(docs))
}

/// Run `analysis` and log what it completed.
///
/// The token is cancelled from the Ctrl-C handler while the pass runs.
pub fn run_analysis<F>(
    finder: &ExceptionFinder,
    token: &CancellationToken,
    analysis: F,
) -> anyhow::Result<AnalysisOutcome>
where
    F: FnOnce(&ExceptionFinder, &CancellationToken) -> throwscope::Result<AnalysisOutcome>,
{
    let outcome = analysis(finder, token).context("analysis failed")?;
    log::debug!(
        "{} methods completed (generation {})",
        outcome.completed.len(),
        outcome.generation
    );
    Ok(outcome)
}

/// The method name as `Namespace.Type::Name`, or the id when the program does not know it.
pub fn method_name(program: &Program, method: MethodId) -> String {
    program
        .method_desc(&method)
        .map_or_else(|| method.to_string(), |desc| desc.full_name())
}
