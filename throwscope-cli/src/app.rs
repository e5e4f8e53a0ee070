use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use throwscope::analysis::{AnalysisOptions, DocumentationMode};

/// throwscope - which exceptions can escape a .NET method, and how they get there
#[derive(Debug, Parser)]
#[command(name = "throwscope", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Parser)]
pub struct GlobalOptions {
    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Analysis policy switches shared by the analysing subcommands.
#[derive(Debug, Clone, Args)]
pub struct PolicyArgs {
    /// Descend into framework methods.
    #[arg(long)]
    pub include_framework: bool,

    /// Namespace prefixes treated as framework (replaces System, Microsoft, Mono).
    #[arg(long, value_name = "PREFIX", num_args = 1..)]
    pub framework_prefix: Vec<String>,

    /// Only descend into methods of the caller's own class.
    #[arg(long)]
    pub same_class: bool,

    /// Only descend into methods of the caller's own assembly.
    #[arg(long)]
    pub same_assembly: bool,

    /// Analyse event add/remove accessors as well.
    #[arg(long)]
    pub keep_events: bool,

    /// Include nested types in class analysis.
    #[arg(long)]
    pub nested: bool,

    /// Use of documented exceptions: never, prefer, combine or only.
    #[arg(long, value_name = "MODE")]
    pub docs: Option<DocumentationMode>,

    /// XML documentation files to read documented exceptions from.
    #[arg(long, value_name = "FILE", num_args = 1..)]
    pub xmldoc: Vec<PathBuf>,
}

impl PolicyArgs {
    /// The analysis options selected on the command line.
    pub fn options(&self) -> AnalysisOptions {
        let mut options = AnalysisOptions {
            include_framework: self.include_framework,
            same_class_only: self.same_class,
            same_assembly_only: self.same_assembly,
            ignore_event_methods: !self.keep_events,
            include_nested_types: self.nested,
            ..AnalysisOptions::default()
        };
        if !self.framework_prefix.is_empty() {
            options.framework_prefixes = self.framework_prefix.clone();
        }
        if let Some(mode) = self.docs {
            options.documentation_mode = mode;
        }
        options
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the exceptions escaping a method and the methods it calls.
    Analyze {
        /// Path to the JSON program description.
        #[arg(value_name = "PROGRAM")]
        path: PathBuf,

        /// Method to analyse, by token or as Namespace.Type::Name.
        #[arg(long, value_name = "TOKEN|NAME")]
        method: String,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Analyse every member of a type and show the aggregated result.
    Class {
        /// Path to the JSON program description.
        #[arg(value_name = "PROGRAM")]
        path: PathBuf,

        /// Full name of the type (Namespace.Outer/Inner for nested types).
        #[arg(long, value_name = "NAME")]
        r#type: String,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// Show the shortest call chain from one method to another.
    Path {
        /// Path to the JSON program description.
        #[arg(value_name = "PROGRAM")]
        path: PathBuf,

        /// Method the chain starts at.
        #[arg(long, value_name = "TOKEN|NAME")]
        from: String,

        /// Method the chain ends at.
        #[arg(long, value_name = "TOKEN|NAME")]
        to: String,

        /// Only follow calls carrying this exception type thrown by the target.
        #[arg(long, value_name = "TYPE")]
        exception: Option<String>,

        #[command(flatten)]
        policy: PolicyArgs,
    },

    /// List method declarations with their tokens.
    Methods {
        /// Path to the JSON program description.
        #[arg(value_name = "PROGRAM")]
        path: PathBuf,

        /// Filter by declaring type name.
        #[arg(long, value_name = "NAME")]
        r#type: Option<String>,
    },
}
