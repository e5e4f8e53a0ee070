use std::path::Path;

use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_program,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct MethodEntry {
    token: String,
    kind: String,
    modifiers: String,
    declaring_type: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct MethodsOutput {
    methods: Vec<MethodEntry>,
    count: usize,
}

pub fn run(path: &Path, type_filter: Option<&str>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let program = load_program(path)?;

    let mut methods: Vec<_> = program
        .methods()
        .filter(|method| {
            type_filter.map_or(true, |filter| {
                method
                    .declaring_type
                    .fullname()
                    .to_lowercase()
                    .contains(&filter.to_lowercase())
            })
        })
        .collect();
    methods.sort_by_key(|method| method.id);

    let methods: Vec<MethodEntry> = methods
        .into_iter()
        .map(|method| MethodEntry {
            token: method.id.token.to_string(),
            kind: method.kind.to_string(),
            modifiers: method.modifiers.to_string(),
            declaring_type: method.declaring_type.fullname(),
            name: method.name.clone(),
        })
        .collect();

    let output = MethodsOutput {
        count: methods.len(),
        methods,
    };

    print_output(&output, opts, |out| {
        let mut tw = TabWriter::new(vec![
            ("Token", Align::Left),
            ("Kind", Align::Left),
            ("Modifiers", Align::Left),
            ("Type", Align::Left),
            ("Method", Align::Left),
        ]);
        for e in &out.methods {
            tw.row(vec![
                e.token.clone(),
                e.kind.clone(),
                e.modifiers.clone(),
                e.declaring_type.clone(),
                e.name.clone(),
            ]);
        }
        tw.print();
        println!("\n{} methods", out.count);
    })
}
