//! Analysis configuration
//!
//! These switches decide which callees the analysis descends into and where exception
//! information comes from. Filtering decisions are baked into cached results, so
//! replacing the options of an [`crate::analysis::ExceptionFinder`] resets its cache.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How documented exceptions are combined with exceptions found by interpretation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DocumentationMode {
    /// Ignore documentation, interpret byte code only
    Never,
    /// Use documentation when it lists anything for the method, interpret otherwise
    Prefer,
    /// Interpret and add documented exceptions on top
    #[default]
    Combine,
    /// Use documentation only, never interpret
    Only,
}

/// Configuration for an exception-flow analysis
///
/// The defaults analyze everything outside the framework, relying on documentation for
/// the framework itself when it is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct AnalysisOptions {
    /// Descend into types whose namespace matches one of `framework_prefixes`
    pub include_framework: bool,

    /// Namespace prefixes identifying framework types (`System` matches `System` and
    /// `System.IO`, not `SystemX`)
    pub framework_prefixes: Vec<String>,

    /// For included framework members, use documented exceptions only regardless of
    /// `documentation_mode`
    pub framework_documented_only: bool,

    /// Only descend into callees declared by the caller's own type
    pub same_class_only: bool,

    /// Only descend into callees declared in the caller's own assembly
    pub same_assembly_only: bool,

    /// Skip event `add_`/`remove_` accessors
    pub ignore_event_methods: bool,

    /// Class analysis also covers nested types
    pub include_nested_types: bool,

    /// Source of exception information (default: combine)
    pub documentation_mode: DocumentationMode,

    /// Number of completed methods collected before a change notification is flushed
    /// (default: 64)
    pub notification_batch_size: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_framework: false,
            framework_prefixes: vec![
                "System".to_string(),
                "Microsoft".to_string(),
                "Mono".to_string(),
            ],
            framework_documented_only: true,
            same_class_only: false,
            same_assembly_only: false,
            ignore_event_methods: true,
            include_nested_types: false,
            documentation_mode: DocumentationMode::Combine,
            notification_batch_size: 64,
        }
    }
}

impl AnalysisOptions {
    /// Creates a configuration restricted to the caller's own assembly
    #[must_use]
    pub fn local() -> Self {
        Self {
            same_assembly_only: true,
            ..Self::default()
        }
    }

    /// Creates a configuration that interprets everything it can reach, framework included
    ///
    /// Considerably slower on real programs since every framework call is followed.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            include_framework: true,
            framework_documented_only: false,
            ignore_event_methods: false,
            include_nested_types: true,
            documentation_mode: DocumentationMode::Never,
            ..Self::default()
        }
    }

    /// Creates a configuration that trusts documentation alone
    #[must_use]
    pub fn documented() -> Self {
        Self {
            include_framework: true,
            documentation_mode: DocumentationMode::Only,
            ..Self::default()
        }
    }

    /// Returns `true` if `namespace` belongs to the framework
    #[must_use]
    pub fn is_framework_namespace(&self, namespace: &str) -> bool {
        self.framework_prefixes.iter().any(|prefix| {
            namespace == prefix
                || namespace
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Batch size with a floor of one
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.notification_batch_size.max(1)
    }
}
