use std::path::Path;

use serde::Serialize;
use throwscope::CancellationToken;

use crate::{
    app::{GlobalOptions, PolicyArgs},
    commands::{
        analyze::{print_escaping, EscapingException},
        common::{build_finder, load_program, method_name, run_analysis},
    },
    output::print_output,
};

#[derive(Debug, Serialize)]
struct MemberOutput {
    method: String,
    unhandled: Vec<EscapingException>,
}

#[derive(Debug, Serialize)]
struct ClassOutput {
    class: String,
    exceptions: Vec<String>,
    members: Vec<MemberOutput>,
    calls: usize,
}

pub fn run(
    path: &Path,
    type_name: &str,
    policy: &PolicyArgs,
    token: &CancellationToken,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let program = load_program(path)?;
    let class = program.find_class(type_name)?;
    let finder = build_finder(&program, policy);

    run_analysis(&finder, token, |finder, token| {
        finder.analyze_class(class, token)
    })?;

    let entry = finder
        .class_entry(class)
        .ok_or_else(|| anyhow::anyhow!("no result recorded for {type_name}"))?;

    let mut exceptions: Vec<String> = entry
        .unhandled_exceptions()?
        .iter()
        .map(|thrown| thrown.exception_type.fullname())
        .collect();
    exceptions.sort();
    exceptions.dedup();

    let mut members = Vec::new();
    for member in entry.members()? {
        let unhandled = finder
            .unhandled(member)?
            .unwrap_or_default()
            .iter()
            .map(|u| EscapingException::new(&program, u))
            .collect();
        members.push(MemberOutput {
            method: method_name(&program, member),
            unhandled,
        });
    }

    let output = ClassOutput {
        class: type_name.to_string(),
        exceptions,
        members,
        calls: entry.called_methods()?.len(),
    };

    print_output(&output, opts, |out| {
        println!(
            "{}: {} members, {} distinct callees",
            out.class,
            out.members.len(),
            out.calls
        );
        if out.exceptions.is_empty() {
            println!("No unhandled exceptions.");
            return;
        }

        println!("Unhandled exceptions:");
        for name in &out.exceptions {
            println!("  {name}");
        }
        for member in out.members.iter().filter(|m| !m.unhandled.is_empty()) {
            println!();
            println!("{}:", member.method);
            print_escaping(&member.unhandled);
        }
    })
}
