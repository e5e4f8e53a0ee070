use std::path::Path;

use serde::Serialize;
use throwscope::{analysis::Unhandled, program::Program, CancellationToken};

use crate::{
    app::{GlobalOptions, PolicyArgs},
    commands::common::{build_finder, load_program, method_name, run_analysis},
    output::{il_offset, print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct EscapingException {
    pub exception_type: String,
    pub thrower: String,
    pub throw_offset: String,
    pub site: String,
    pub origin: String,
}

impl EscapingException {
    pub fn new(program: &Program, unhandled: &Unhandled) -> Self {
        EscapingException {
            exception_type: unhandled.thrown.exception_type.fullname(),
            thrower: method_name(program, unhandled.thrown.method),
            throw_offset: il_offset(unhandled.thrown.offset),
            site: il_offset(unhandled.site),
            origin: unhandled.thrown.origin.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeOutput {
    method: String,
    token: String,
    unhandled: Vec<EscapingException>,
    calls: Vec<String>,
    analyzed: usize,
}

pub fn run(
    path: &Path,
    method: &str,
    policy: &PolicyArgs,
    token: &CancellationToken,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let program = load_program(path)?;
    let id = program.find_method(method)?;
    let finder = build_finder(&program, policy);

    let outcome = run_analysis(&finder, token, |finder, token| finder.analyze(id, token))?;

    let mut unhandled: Vec<EscapingException> = finder
        .unhandled(id)?
        .unwrap_or_default()
        .iter()
        .map(|u| EscapingException::new(&program, u))
        .collect();
    unhandled.sort_by(|a, b| {
        a.exception_type
            .cmp(&b.exception_type)
            .then_with(|| a.site.cmp(&b.site))
    });

    let calls = finder
        .called_methods(id)?
        .unwrap_or_default()
        .into_iter()
        .map(|callee| method_name(&program, callee))
        .collect();

    let output = AnalyzeOutput {
        method: method_name(&program, id),
        token: id.token.to_string(),
        unhandled,
        calls,
        analyzed: outcome.completed.len(),
    };

    print_output(&output, opts, |out| {
        println!("{} ({})", out.method, out.token);
        println!("  {} methods analyzed", out.analyzed);

        println!();
        if out.unhandled.is_empty() {
            println!("No unhandled exceptions.");
        } else {
            println!("Unhandled exceptions ({}):", out.unhandled.len());
            print_escaping(&out.unhandled);
        }

        if !out.calls.is_empty() {
            println!();
            println!("Calls ({}):", out.calls.len());
            for callee in &out.calls {
                println!("  {callee}");
            }
        }
    })
}

pub fn print_escaping(exceptions: &[EscapingException]) {
    let mut tw = TabWriter::new(vec![
        ("Site", Align::Left),
        ("Exception", Align::Left),
        ("Thrown by", Align::Left),
        ("At", Align::Left),
        ("Origin", Align::Left),
    ])
    .indent("  ");
    for e in exceptions {
        tw.row(vec![
            e.site.clone(),
            e.exception_type.clone(),
            e.thrower.clone(),
            e.throw_offset.clone(),
            e.origin.clone(),
        ]);
    }
    tw.print();
}
