//! Loading programs from JSON descriptions and analysing them.

use std::sync::Arc;

use throwscope::prelude::*;

const INVENTORY: &str = r#"{
    "types": [
        {
            "assembly": "Shop",
            "name": "Shop.Inventory",
            "methods": [
                {
                    "name": "Take",
                    "parameters": ["System.String"],
                    "body": [
                        { "op": "ldarg.1" },
                        { "op": "brtrue.s", "target": "known" },
                        { "op": "newobj", "method": "System.ArgumentNullException::.ctor" },
                        { "op": "throw" },
                        { "label": "known" },
                        { "op": "ldarg.0" },
                        { "op": "call", "method": "Shop.Inventory::Reserve" },
                        { "op": "ret" }
                    ]
                },
                {
                    "name": "Reserve",
                    "body": [
                        { "label": "try" },
                        { "op": "newobj", "method": "Shop.OutOfStockException::.ctor" },
                        { "op": "throw" },
                        { "label": "handler" },
                        { "op": "pop" },
                        { "op": "newobj", "method": "System.InvalidOperationException::.ctor" },
                        { "op": "throw" },
                        { "label": "end" }
                    ],
                    "handlers": [{
                        "kind": "catch",
                        "catch_type": "System.IO.IOException",
                        "try": ["try", "handler"],
                        "handler": ["handler", "end"]
                    }]
                }
            ]
        },
        {
            "assembly": "Shop",
            "name": "Shop.OutOfStockException",
            "base": "System.InvalidOperationException",
            "methods": [{ "name": ".ctor" }]
        }
    ]
}"#;

fn load() -> Program {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.json");
    std::fs::write(&path, INVENTORY).unwrap();
    Program::from_file(&path).unwrap()
}

#[test]
fn test_load_and_analyze() {
    let program = load();
    let take = program.find_method("Shop.Inventory::Take").unwrap();
    let reserve = program.find_method("Shop.Inventory::Reserve").unwrap();
    let ctor = program.find_method("Shop.OutOfStockException::.ctor").unwrap();

    let finder = ExceptionFinder::new(Arc::new(program), AnalysisOptions::default());
    finder.analyze(take, &CancellationToken::new()).unwrap();

    let mut escaping: Vec<String> = finder
        .unhandled_exceptions(take)
        .unwrap()
        .unwrap()
        .into_iter()
        .map(|thrown| thrown.exception_type.fullname())
        .collect();
    escaping.sort();
    // OutOfStockException is not an IOException, so it escapes Reserve too
    assert_eq!(
        escaping,
        vec![
            "Shop.OutOfStockException",
            "System.ArgumentNullException",
            "System.InvalidOperationException",
        ]
    );
    assert_eq!(finder.called_methods(take).unwrap(), Some(vec![reserve]));
    assert_eq!(finder.called_methods(reserve).unwrap(), Some(vec![ctor]));
    assert_eq!(
        finder.find_shortest_path(take, reserve).unwrap(),
        vec![take, reserve]
    );
}

#[test]
fn test_user_exception_hierarchy() {
    let program = load();
    let own = program.find_type("Shop.OutOfStockException").unwrap();
    let base = program.base_type(&own).unwrap();
    assert_eq!(base.fullname(), "System.InvalidOperationException");
    assert_eq!(base.assembly, "mscorlib");
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Program::from_file(dir.path().join("absent.json")),
        Err(Error::FileError(_))
    ));
}

#[test]
fn test_bad_label() {
    let text = r#"{ "types": [{ "assembly": "A", "name": "A.B", "methods": [
        { "name": "Run", "body": [{ "op": "br", "target": "nowhere" }] }
    ]}]}"#;
    assert!(matches!(
        Program::from_json(text),
        Err(Error::UndefinedLabel(_))
    ));

    let text = r#"{ "types": [{ "assembly": "A", "name": "A.B", "methods": [
        { "name": "Run", "body": [{ "op": "frobnicate" }] }
    ]}]}"#;
    assert!(matches!(
        Program::from_json(text),
        Err(Error::InvalidMnemonic(_))
    ));
}
