//! Policy filter deciding which members the analysis descends into.
//!
//! The filter is a pure function of the member's declaration, the type referencing it,
//! and the [`AnalysisOptions`]. It is re-evaluated at every call site.

use strum::Display;

use crate::{
    analysis::options::AnalysisOptions,
    metadata::{member::MethodDesc, types::TypeRef},
};

/// Why a member is not analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SkipReason {
    /// Declared in a framework namespace and the framework is excluded
    Framework,
    /// Declared by another type while only the same class is analyzed
    OtherClass,
    /// Declared in another assembly while only the same assembly is analyzed
    OtherAssembly,
    /// An event `add_`/`remove_` accessor
    EventAccessor,
}

/// Outcome of the policy filter for one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyDecision {
    /// Analyze according to the configured documentation mode
    Analyze,
    /// Analyze, but use documented exceptions only
    DocumentedOnly,
    /// Do not descend
    Skip(SkipReason),
}

/// Decides whether a type's members may be analyzed from `referencing`.
///
/// # Arguments
///
/// * `declaring` - The type declaring the member
/// * `referencing` - The type of the caller, `None` for an analysis root
/// * `options` - Active configuration
#[must_use]
pub fn evaluate_type(
    declaring: &TypeRef,
    referencing: Option<&TypeRef>,
    options: &AnalysisOptions,
) -> PolicyDecision {
    let framework = options.is_framework_namespace(&declaring.namespace);
    if framework && !options.include_framework {
        return PolicyDecision::Skip(SkipReason::Framework);
    }

    if let Some(referencing) = referencing {
        if options.same_class_only && declaring != referencing {
            return PolicyDecision::Skip(SkipReason::OtherClass);
        }
        if options.same_assembly_only && declaring.assembly != referencing.assembly {
            return PolicyDecision::Skip(SkipReason::OtherAssembly);
        }
    }

    if framework && options.framework_documented_only {
        PolicyDecision::DocumentedOnly
    } else {
        PolicyDecision::Analyze
    }
}

/// Decides whether `method` may be analyzed from `referencing`.
///
/// Applies [`evaluate_type`] to the declaring type and additionally excludes event
/// accessors when configured.
#[must_use]
pub fn evaluate(
    method: &MethodDesc,
    referencing: Option<&TypeRef>,
    options: &AnalysisOptions,
) -> PolicyDecision {
    if options.ignore_event_methods && method.is_event_accessor() {
        return PolicyDecision::Skip(SkipReason::EventAccessor);
    }
    evaluate_type(&method.declaring_type, referencing, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{metadata::member::MethodKind, test::method_id};

    fn method(type_name: &str, assembly: &str, name: &str) -> MethodDesc {
        MethodDesc::new(method_id(1), TypeRef::parse(assembly, type_name), name)
    }

    #[test]
    fn test_framework_excluded_by_default() {
        let options = AnalysisOptions::default();
        let open = method("System.IO.File", "mscorlib", "Open");
        let caller = TypeRef::parse("App", "App.Program");

        assert_eq!(
            evaluate(&open, Some(&caller), &options),
            PolicyDecision::Skip(SkipReason::Framework)
        );
    }

    #[test]
    fn test_framework_documented_only() {
        let options = AnalysisOptions {
            include_framework: true,
            ..AnalysisOptions::default()
        };
        let open = method("System.IO.File", "mscorlib", "Open");
        assert_eq!(
            evaluate(&open, None, &options),
            PolicyDecision::DocumentedOnly
        );

        let options = AnalysisOptions {
            framework_documented_only: false,
            ..options
        };
        assert_eq!(evaluate(&open, None, &options), PolicyDecision::Analyze);
    }

    #[test]
    fn test_same_class_and_assembly() {
        let caller = TypeRef::parse("App", "App.Program");
        let helper = method("App.Helper", "App", "Run");
        let lib = method("Lib.Parser", "Lib", "Parse");

        let options = AnalysisOptions {
            same_class_only: true,
            ..AnalysisOptions::default()
        };
        assert_eq!(
            evaluate(&helper, Some(&caller), &options),
            PolicyDecision::Skip(SkipReason::OtherClass)
        );
        assert_eq!(evaluate(&helper, None, &options), PolicyDecision::Analyze);

        let options = AnalysisOptions::local();
        assert_eq!(
            evaluate(&helper, Some(&caller), &options),
            PolicyDecision::Analyze
        );
        assert_eq!(
            evaluate(&lib, Some(&caller), &options),
            PolicyDecision::Skip(SkipReason::OtherAssembly)
        );
    }

    #[test]
    fn test_event_accessors() {
        let mut add = method("App.Widget", "App", "add_Changed");
        add.kind = MethodKind::EventAdd;

        let options = AnalysisOptions::default();
        let decision = evaluate(&add, None, &options);
        assert_eq!(decision, PolicyDecision::Skip(SkipReason::EventAccessor));

        let options = AnalysisOptions {
            ignore_event_methods: false,
            ..options
        };
        assert_eq!(evaluate(&add, None, &options), PolicyDecision::Analyze);
    }
}
