use std::path::Path;

use serde::Serialize;
use throwscope::CancellationToken;

use crate::{
    app::{GlobalOptions, PolicyArgs},
    commands::common::{build_finder, load_program, method_name, run_analysis},
    output::{il_offset, print_output, Align, TabWriter},
};

pub struct PathQuery<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub exception: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Hop {
    method: String,
    /// Offsets in this method calling the next hop
    call_sites: Vec<String>,
}

#[derive(Debug, Serialize)]
struct PathOutput {
    from: String,
    to: String,
    exception: Option<String>,
    path: Vec<Hop>,
}

pub fn run(
    path: &Path,
    query: &PathQuery<'_>,
    policy: &PolicyArgs,
    token: &CancellationToken,
    opts: &GlobalOptions,
) -> anyhow::Result<()> {
    let program = load_program(path)?;
    let from = program.find_method(query.from)?;
    let to = program.find_method(query.to)?;
    let finder = build_finder(&program, policy);

    run_analysis(&finder, token, |finder, token| finder.analyze(from, token))?;

    let chain = match query.exception {
        None => finder.find_shortest_path(from, to)?,
        Some(name) => {
            let thrown = finder
                .unhandled_exceptions(to)?
                .unwrap_or_default()
                .into_iter()
                .find(|thrown| thrown.method == to && thrown.exception_type.fullname() == name);
            match thrown {
                Some(thrown) => finder.find_exception_path(from, &thrown)?,
                None => {
                    log::info!("{} does not throw {name} itself", query.to);
                    Vec::new()
                }
            }
        }
    };

    let mut hops = Vec::with_capacity(chain.len());
    for (index, method) in chain.iter().enumerate() {
        let call_sites = match chain.get(index + 1) {
            Some(next) => finder
                .call_sites(*method, *next)?
                .into_iter()
                .map(il_offset)
                .collect(),
            None => Vec::new(),
        };
        hops.push(Hop {
            method: method_name(&program, *method),
            call_sites,
        });
    }

    let output = PathOutput {
        from: method_name(&program, from),
        to: method_name(&program, to),
        exception: query.exception.map(str::to_string),
        path: hops,
    };

    print_output(&output, opts, |out| {
        if out.path.is_empty() {
            println!("No call chain from {} to {}.", out.from, out.to);
            return;
        }

        let mut tw = TabWriter::new(vec![
            ("#", Align::Right),
            ("Method", Align::Left),
            ("Calls next at", Align::Left),
        ]);
        for (index, hop) in out.path.iter().enumerate() {
            tw.row(vec![
                index.to_string(),
                hop.method.clone(),
                hop.call_sites.join(", "),
            ]);
        }
        tw.print();
    })
}
