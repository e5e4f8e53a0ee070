//! End-to-end exception-flow analysis through the public API.

use std::{
    sync::{mpsc, Arc, Barrier},
    thread,
};

use throwscope::{
    analysis::{AnalysisState, ExceptionOrigin, MAX_CALL_DEPTH},
    prelude::*,
};

fn framework_type(name: &str) -> TypeRef {
    TypeRef::parse("mscorlib", name)
}

fn finder(program: Program) -> ExceptionFinder {
    ExceptionFinder::new(Arc::new(program), AnalysisOptions::default())
}

fn escaping_types(finder: &ExceptionFinder, method: MethodId) -> Vec<String> {
    let mut types: Vec<String> = finder
        .unhandled_exceptions(method)
        .unwrap()
        .expect("method is complete")
        .into_iter()
        .map(|thrown| thrown.exception_type.fullname())
        .collect();
    types.sort();
    types
}

/// `try { throw new <thrown>(); } catch (<caught>) { }`
fn guarded_throw(thrown: &str, caught: &str) -> (Program, MethodId) {
    let mut builder = ProgramBuilder::with_framework();
    let ctor = builder.constructor_of(thrown).unwrap();
    let class = builder.class("App", "App.Guard", "System.Object");
    let method = builder
        .method(class, "Run")
        .body(|b| {
            b.try_catch(
                |b| {
                    b.newobj(ctor)?;
                    b.throw()
                },
                framework_type(caught),
                |b| b.pop(),
            )?;
            b.ret()
        })
        .unwrap();
    (builder.build().unwrap(), method)
}

#[test]
fn test_handler_suppression() {
    let (program, run) = guarded_throw("System.ArgumentException", "System.ArgumentException");
    let finder = finder(program);
    finder.analyze(run, &CancellationToken::new()).unwrap();
    assert!(escaping_types(&finder, run).is_empty());

    let (program, run) =
        guarded_throw("System.InvalidOperationException", "System.ArgumentException");
    let finder = self::finder(program);
    finder.analyze(run, &CancellationToken::new()).unwrap();
    assert_eq!(
        escaping_types(&finder, run),
        vec!["System.InvalidOperationException"]
    );
}

#[test]
fn test_subtype_suppression_inside_try_only() {
    let mut builder = ProgramBuilder::with_framework();
    let fnf = builder
        .constructor_of("System.IO.FileNotFoundException")
        .unwrap();
    let class = builder.class("App", "App.Store", "System.Object");
    let open = builder
        .method(class, "Open")
        .body(|b| {
            b.try_catch(
                |b| {
                    b.newobj(fnf)?;
                    b.throw()
                },
                framework_type("System.IO.IOException"),
                |b| b.pop(),
            )?;
            b.newobj(fnf)?;
            b.throw()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());
    finder.analyze(open, &CancellationToken::new()).unwrap();

    // newobj, throw, leave | pop, leave | newobj, throw
    let unhandled = finder.unhandled(open).unwrap().unwrap();
    assert_eq!(unhandled.len(), 1);
    assert_eq!(unhandled[0].site, 22);
    assert_eq!(unhandled[0].thrown.offset, 22);
    assert_eq!(unhandled[0].thrown.origin, ExceptionOrigin::Thrown);
    assert_eq!(
        unhandled[0].thrown.exception_type,
        framework_type("System.IO.FileNotFoundException")
    );
}

#[test]
fn test_propagation_through_call_site() {
    let mut builder = ProgramBuilder::with_framework();
    let ioe = builder
        .constructor_of("System.InvalidOperationException")
        .unwrap();
    let class = builder.class("App", "App.Service", "System.Object");
    let b_method = builder
        .method(class, "B")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(ioe)?;
            b.throw()
        })
        .unwrap();
    let a_method = builder
        .method(class, "A")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.nop()?;
            b.call(b_method)?;
            b.ret()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());

    let outcome = finder.analyze(a_method, &CancellationToken::new()).unwrap();
    assert_eq!(outcome.completed, vec![b_method, a_method]);

    let unhandled = finder.unhandled(a_method).unwrap().unwrap();
    assert_eq!(unhandled.len(), 1);
    assert_eq!(unhandled[0].site, 1);
    assert_eq!(unhandled[0].thrown.method, b_method);
    assert_eq!(unhandled[0].thrown.offset, 5);

    assert_eq!(finder.called_methods(a_method).unwrap(), Some(vec![b_method]));
    assert_eq!(finder.call_sites(a_method, b_method).unwrap(), vec![1]);
    assert_eq!(
        finder.escape_offsets(a_method, &unhandled[0].thrown).unwrap(),
        vec![1]
    );
}

#[test]
fn test_catch_around_call_site() {
    let mut builder = ProgramBuilder::with_framework();
    let ioe = builder
        .constructor_of("System.InvalidOperationException")
        .unwrap();
    let class = builder.class("App", "App.Service", "System.Object");
    let fail = builder
        .method(class, "Fail")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(ioe)?;
            b.throw()
        })
        .unwrap();
    let safe = builder
        .method(class, "Safe")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.try_catch(|b| b.call(fail), framework_type("System.Exception"), |b| b.pop())?;
            b.ret()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());
    finder.analyze(safe, &CancellationToken::new()).unwrap();

    assert!(escaping_types(&finder, safe).is_empty());
    assert_eq!(finder.called_methods(safe).unwrap(), Some(vec![fail]));
    assert_eq!(
        escaping_types(&finder, fail),
        vec!["System.InvalidOperationException"]
    );
}

#[test]
fn test_rethrow_uses_catch_type() {
    let mut builder = ProgramBuilder::with_framework();
    let ctor = builder.constructor_of("System.ArgumentNullException").unwrap();
    let class = builder.class("App", "App.Guard", "System.Object");
    let run = builder
        .method(class, "Run")
        .body(|b| {
            b.try_catch(
                |b| {
                    b.newobj(ctor)?;
                    b.throw()
                },
                framework_type("System.ArgumentException"),
                |b| b.rethrow(),
            )?;
            b.ret()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());
    finder.analyze(run, &CancellationToken::new()).unwrap();

    let escaping = finder.unhandled_exceptions(run).unwrap().unwrap();
    assert_eq!(escaping.len(), 1);
    assert_eq!(escaping[0].origin, ExceptionOrigin::Rethrown);
    assert_eq!(
        escaping[0].exception_type,
        framework_type("System.ArgumentException")
    );
}

#[test]
fn test_mutual_recursion_terminates() {
    let mut builder = ProgramBuilder::with_framework();
    let ioe = builder
        .constructor_of("System.IO.IOException")
        .unwrap();
    let class = builder.class("App", "App.Ping", "System.Object");
    let ping = builder
        .method(class, "Ping")
        .modifiers(MethodModifiers::STATIC)
        .declare()
        .unwrap();
    let pong = builder
        .method(class, "Pong")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.call(ping)?;
            b.newobj(ioe)?;
            b.throw()
        })
        .unwrap();
    builder
        .set_body(ping, |b| {
            b.call(pong)?;
            b.ret()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());

    finder.analyze(ping, &CancellationToken::new()).unwrap();

    assert_eq!(finder.state(ping), AnalysisState::Complete);
    assert_eq!(finder.state(pong), AnalysisState::Complete);
    assert_eq!(escaping_types(&finder, ping), vec!["System.IO.IOException"]);
    assert_eq!(escaping_types(&finder, pong), vec!["System.IO.IOException"]);
    assert_eq!(finder.called_methods(pong).unwrap(), Some(vec![ping]));
}

#[test]
fn test_idempotence() {
    let mut builder = ProgramBuilder::with_framework();
    let ane = builder.constructor_of("System.ArgumentNullException").unwrap();
    let class = builder.class("App", "App.Service", "System.Object");
    let check = builder
        .method(class, "Check")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(ane)?;
            b.throw()
        })
        .unwrap();
    let run = builder
        .method(class, "Run")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.call(check)?;
            b.call(check)?;
            b.ret()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());
    let token = CancellationToken::new();

    finder.analyze(run, &token).unwrap();
    let first = (
        finder.unhandled(run).unwrap(),
        finder.called_methods(run).unwrap(),
    );

    let again = finder.analyze(run, &token).unwrap();
    assert!(again.completed.is_empty());
    let second = (
        finder.unhandled(run).unwrap(),
        finder.called_methods(run).unwrap(),
    );
    assert_eq!(first, second);

    // one exception, two call sites
    assert_eq!(finder.unhandled_exceptions(run).unwrap().unwrap().len(), 1);
    assert_eq!(first.0.unwrap().len(), 2);
}

/// `System.Text.Encoder::Convert` throws; `App.Codec::Encode` calls it.
fn framework_callee() -> (Program, MethodId, MethodId) {
    let mut builder = ProgramBuilder::with_framework();
    let nse = builder.constructor_of("System.NotSupportedException").unwrap();
    let encoder = builder.class("mscorlib", "System.Text.Encoder", "System.Object");
    let convert = builder
        .method(encoder, "Convert")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(nse)?;
            b.throw()
        })
        .unwrap();
    let codec = builder.class("App", "App.Codec", "System.Object");
    let encode = builder
        .method(codec, "Encode")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.call(convert)?;
            b.ret()
        })
        .unwrap();
    (builder.build().unwrap(), encode, convert)
}

#[test]
fn test_framework_excluded_by_default() {
    let (program, encode, convert) = framework_callee();
    let finder = finder(program);
    finder.analyze(encode, &CancellationToken::new()).unwrap();

    assert_eq!(finder.called_methods(encode).unwrap(), Some(Vec::new()));
    assert!(escaping_types(&finder, encode).is_empty());
    assert_eq!(finder.state(convert), AnalysisState::NotStarted);
}

#[test]
fn test_framework_included() {
    let (program, encode, convert) = framework_callee();
    let finder = ExceptionFinder::new(Arc::new(program), AnalysisOptions::thorough());
    finder.analyze(encode, &CancellationToken::new()).unwrap();

    assert_eq!(finder.called_methods(encode).unwrap(), Some(vec![convert]));
    assert_eq!(
        escaping_types(&finder, encode),
        vec!["System.NotSupportedException"]
    );
}

#[test]
fn test_same_assembly_only() {
    let mut builder = ProgramBuilder::with_framework();
    let ioe = builder
        .constructor_of("System.InvalidOperationException")
        .unwrap();
    let library = builder.class("Lib", "Lib.Parser", "System.Object");
    let parse = builder
        .method(library, "Parse")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(ioe)?;
            b.throw()
        })
        .unwrap();
    let app = builder.class("App", "App.Main", "System.Object");
    let main = builder
        .method(app, "Main")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.call(parse)?;
            b.ret()
        })
        .unwrap();
    let program = Arc::new(builder.build().unwrap());

    let local = ExceptionFinder::new(program.clone(), AnalysisOptions::local());
    local.analyze(main, &CancellationToken::new()).unwrap();
    assert_eq!(local.called_methods(main).unwrap(), Some(Vec::new()));

    let global = ExceptionFinder::new(program, AnalysisOptions::default());
    global.analyze(main, &CancellationToken::new()).unwrap();
    assert_eq!(
        escaping_types(&global, main),
        vec!["System.InvalidOperationException"]
    );
}

#[test]
fn test_reset_invalidates() {
    let mut builder = ProgramBuilder::with_framework();
    let ioe = builder
        .constructor_of("System.InvalidOperationException")
        .unwrap();
    let class = builder.class("App", "App.Service", "System.Object");
    let fail = builder
        .method(class, "Fail")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(ioe)?;
            b.throw()
        })
        .unwrap();
    let run = builder
        .method(class, "Run")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.call(fail)?;
            b.ret()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());
    let token = CancellationToken::new();

    finder.analyze(run, &token).unwrap();
    let before = finder.unhandled(run).unwrap();
    let generation = finder.generation();

    finder.reset().unwrap();
    assert_eq!(finder.state(run), AnalysisState::NotStarted);
    assert_eq!(finder.state(fail), AnalysisState::NotStarted);
    assert_eq!(finder.unhandled_exceptions(run).unwrap(), None);
    assert!(finder.generation() > generation);

    let outcome = finder.analyze(run, &token).unwrap();
    assert_eq!(outcome.completed, vec![fail, run]);
    assert_eq!(outcome.generation, finder.generation());
    assert_eq!(finder.unhandled(run).unwrap(), before);
}

#[test]
fn test_set_options_resets() {
    let (program, encode, convert) = framework_callee();
    let finder = finder(program);
    let token = CancellationToken::new();

    finder.analyze(encode, &token).unwrap();
    assert!(escaping_types(&finder, encode).is_empty());

    finder.set_options(AnalysisOptions::thorough()).unwrap();
    assert_eq!(finder.state(encode), AnalysisState::NotStarted);
    assert_eq!(finder.options().unwrap(), AnalysisOptions::thorough());

    finder.analyze(encode, &token).unwrap();
    assert_eq!(finder.called_methods(encode).unwrap(), Some(vec![convert]));
}

#[test]
fn test_cancelled_pass_is_not_complete() {
    let (program, encode, _) = framework_callee();
    let finder = finder(program);
    let token = CancellationToken::new();
    token.cancel();

    assert!(matches!(
        finder.analyze(encode, &token),
        Err(Error::Cancelled)
    ));
    assert_ne!(finder.state(encode), AnalysisState::Complete);
    assert_eq!(finder.unhandled_exceptions(encode).unwrap(), None);

    finder.analyze(encode, &CancellationToken::new()).unwrap();
    assert_eq!(finder.state(encode), AnalysisState::Complete);
}

#[test]
fn test_nested_catch_regions() {
    // try { try { throw new IOException(); } catch (ArgumentException) { } }
    // catch (IOException) { }
    let mut builder = ProgramBuilder::with_framework();
    let io = builder.constructor_of("System.IO.IOException").unwrap();
    let class = builder.class("App", "App.Nested", "System.Object");
    let run = builder
        .method(class, "Run")
        .body(|b| {
            b.try_catch(
                |b| {
                    b.try_catch(
                        |b| {
                            b.newobj(io)?;
                            b.throw()
                        },
                        framework_type("System.ArgumentException"),
                        |b| b.pop(),
                    )
                },
                framework_type("System.IO.IOException"),
                |b| b.pop(),
            )?;
            b.ret()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());
    finder.analyze(run, &CancellationToken::new()).unwrap();

    // the inner region does not match, the outer one does
    assert!(escaping_types(&finder, run).is_empty());
}

#[test]
fn test_finally_does_not_catch() {
    let mut builder = ProgramBuilder::with_framework();
    let io = builder.constructor_of("System.IO.IOException").unwrap();
    let class = builder.class("App", "App.Cleanup", "System.Object");
    let run = builder
        .method(class, "Run")
        .body(|b| {
            b.try_finally(
                |b| {
                    b.newobj(io)?;
                    b.throw()
                },
                |b| b.nop(),
            )?;
            b.ret()
        })
        .unwrap();
    let finder = finder(builder.build().unwrap());
    finder.analyze(run, &CancellationToken::new()).unwrap();

    assert_eq!(escaping_types(&finder, run), vec!["System.IO.IOException"]);
}

#[test]
fn test_bodyless_method_completes_empty() {
    let mut builder = ProgramBuilder::with_framework();
    let class = builder.class("App", "App.Native", "System.Object");
    let native = builder
        .method(class, "Beep")
        .modifiers(MethodModifiers::STATIC | MethodModifiers::PINVOKE)
        .declare()
        .unwrap();
    let finder = finder(builder.build().unwrap());

    let outcome = finder.analyze(native, &CancellationToken::new()).unwrap();
    assert_eq!(outcome.completed, vec![native]);
    assert_eq!(finder.unhandled_exceptions(native).unwrap(), Some(Vec::new()));
}

#[test]
fn test_unknown_method() {
    let finder = finder(ProgramBuilder::with_framework().build().unwrap());
    let missing = MethodId::new(
        ModuleId::from_name("App"),
        Token::from_parts(Token::METHOD_DEF, 99),
    );
    assert!(matches!(
        finder.analyze(missing, &CancellationToken::new()),
        Err(Error::MemberNotFound(_))
    ));
}

#[test]
fn test_notifications_are_batched() {
    let mut builder = ProgramBuilder::with_framework();
    let class = builder.class("App", "App.Chain", "System.Object");
    let mut previous = None;
    let mut methods = Vec::new();
    for name in ["E", "D", "C", "B", "A"] {
        let callee = previous;
        let id = builder
            .method(class, name)
            .modifiers(MethodModifiers::STATIC)
            .body(|b| {
                if let Some(callee) = callee {
                    b.call(callee)?;
                }
                b.ret()
            })
            .unwrap();
        methods.push(id);
        previous = Some(id);
    }
    let root = methods[4];

    let (tx, rx) = mpsc::channel();
    let options = AnalysisOptions {
        notification_batch_size: 2,
        ..AnalysisOptions::default()
    };
    let finder =
        ExceptionFinder::new(Arc::new(builder.build().unwrap()), options).with_sink(Arc::new(tx));
    finder.analyze(root, &CancellationToken::new()).unwrap();
    drop(finder);

    let batches: Vec<Vec<MethodId>> = rx.iter().collect();
    assert_eq!(
        batches.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![2, 2, 1]
    );
    assert_eq!(batches.concat(), methods);
}

#[test]
fn test_class_analysis() {
    let mut builder = ProgramBuilder::with_framework();
    let io = builder.constructor_of("System.IO.IOException").unwrap();
    let ane = builder.constructor_of("System.ArgumentNullException").unwrap();
    let store = builder.class("App", "App.Store", "System.Object");
    let open = builder
        .method(store, "Open")
        .body(|b| {
            b.newobj(io)?;
            b.throw()
        })
        .unwrap();
    let close = builder
        .method(store, "Close")
        .body(|b| {
            b.newobj(ane)?;
            b.throw()
        })
        .unwrap();
    let cursor = builder.nested_class(store, "Cursor", "System.Object").unwrap();
    let next = builder
        .method(cursor, "Next")
        .body(|b| {
            b.newobj(io)?;
            b.throw()
        })
        .unwrap();
    let program = Arc::new(builder.build().unwrap());

    let finder = ExceptionFinder::new(program.clone(), AnalysisOptions::default());
    finder.analyze_class(store, &CancellationToken::new()).unwrap();
    let entry = finder.class_entry(store).unwrap();
    assert!(entry.is_complete());
    assert_eq!(entry.members().unwrap(), vec![open, close]);
    assert_eq!(entry.unhandled_exceptions().unwrap().len(), 2);
    assert_eq!(finder.state(next), AnalysisState::NotStarted);

    let options = AnalysisOptions {
        include_nested_types: true,
        ..AnalysisOptions::default()
    };
    let nested = ExceptionFinder::new(program, options);
    nested.analyze_class(store, &CancellationToken::new()).unwrap();
    let entry = nested.class_entry(store).unwrap();
    assert_eq!(entry.members().unwrap(), vec![open, close, next]);
    assert_eq!(entry.unhandled_exceptions().unwrap().len(), 3);
}

/// A chain of `len` static methods where each calls the previous one and the first throws
/// a new `IOException`.
///
/// Returns the ids in call order, the root first.
fn call_chain(len: usize) -> (Program, Vec<MethodId>) {
    let mut builder = ProgramBuilder::with_framework();
    let io = builder.constructor_of("System.IO.IOException").unwrap();
    let class = builder.class("App", "App.Pipeline", "System.Object");
    let mut methods = Vec::with_capacity(len);
    for index in 0..len {
        let callee = methods.last().copied();
        let id = builder
            .method(class, &format!("Stage{index}"))
            .modifiers(MethodModifiers::STATIC)
            .body(|b| match callee {
                Some(callee) => {
                    b.call(callee)?;
                    b.ret()
                }
                None => {
                    b.newobj(io)?;
                    b.throw()
                }
            })
            .unwrap();
        methods.push(id);
    }
    methods.reverse();
    (builder.build().unwrap(), methods)
}

#[test]
fn test_concurrent_readers() {
    let (program, methods) = call_chain(3);
    let (tx, rx) = mpsc::channel();
    let resume = Arc::new(Barrier::new(2));
    let sink = {
        let resume = Arc::clone(&resume);
        move |batch: &[MethodId]| {
            tx.send(batch.to_vec()).unwrap();
            resume.wait();
        }
    };
    let options = AnalysisOptions {
        notification_batch_size: 1,
        ..AnalysisOptions::default()
    };
    let finder = Arc::new(
        ExceptionFinder::new(Arc::new(program), options).with_sink(Arc::new(sink)),
    );

    let root = methods[0];
    let worker = {
        let finder = Arc::clone(&finder);
        thread::spawn(move || finder.analyze(root, &CancellationToken::new()))
    };

    // The worker is parked in the sink while each batch is read.
    let mut seen = Vec::new();
    for _ in 0..methods.len() {
        let batch = rx.recv().unwrap();
        for &id in &batch {
            assert_eq!(finder.state(id), AnalysisState::Complete);
            assert_eq!(escaping_types(&finder, id), vec!["System.IO.IOException"]);
        }
        seen.extend(batch);
        if !seen.contains(&root) {
            assert_eq!(finder.state(root), AnalysisState::Analysing);
            assert_eq!(finder.unhandled_exceptions(root).unwrap(), None);
        }
        resume.wait();
    }

    let outcome = worker.join().unwrap().unwrap();
    assert_eq!(outcome.completed, seen);
    assert_eq!(seen, methods.iter().rev().copied().collect::<Vec<_>>());
}

#[test]
fn test_cancel_during_pass() {
    let (program, methods) = call_chain(3);
    let token = CancellationToken::new();
    let sink = {
        let token = token.clone();
        move |_: &[MethodId]| token.cancel()
    };
    let options = AnalysisOptions {
        notification_batch_size: 1,
        ..AnalysisOptions::default()
    };
    let finder = ExceptionFinder::new(Arc::new(program), options).with_sink(Arc::new(sink));

    let (a, b, c) = (methods[0], methods[1], methods[2]);
    assert!(matches!(finder.analyze(a, &token), Err(Error::Cancelled)));

    // The innermost method finished before the token fired; its callers did not.
    assert_eq!(finder.state(c), AnalysisState::Complete);
    assert_eq!(escaping_types(&finder, c), vec!["System.IO.IOException"]);
    for method in [a, b] {
        assert_eq!(finder.state(method), AnalysisState::NotStarted);
        assert_eq!(finder.unhandled_exceptions(method).unwrap(), None);
        assert_eq!(finder.called_methods(method).unwrap(), None);
    }

    let outcome = finder.analyze(a, &CancellationToken::new()).unwrap();
    assert_eq!(outcome.completed, vec![b, a]);
    assert_eq!(escaping_types(&finder, a), vec!["System.IO.IOException"]);
}

#[test]
fn test_long_call_chain_on_default_thread() {
    let (program, methods) = call_chain(1000);
    let finder = finder(program);
    let root = methods[0];

    let worker = thread::spawn(move || {
        let outcome = finder.analyze(root, &CancellationToken::new());
        (finder, outcome)
    });
    let (finder, outcome) = worker.join().unwrap();

    assert_eq!(outcome.unwrap().completed.len(), 1000);
    assert_eq!(finder.state(root), AnalysisState::Complete);
    let escaping = finder.unhandled_exceptions(root).unwrap().unwrap();
    assert_eq!(escaping.len(), 1);
    assert_eq!(escaping[0].method, methods[999]);
    assert_eq!(
        escaping[0].exception_type.fullname(),
        "System.IO.IOException"
    );
}

#[test]
fn test_call_chain_too_deep() {
    let (program, methods) = call_chain(MAX_CALL_DEPTH + 76);
    let finder = finder(program);
    let root = methods[0];

    assert!(matches!(
        finder.analyze(root, &CancellationToken::new()),
        Err(Error::RecursionLimit(MAX_CALL_DEPTH))
    ));
    assert_eq!(finder.state(root), AnalysisState::NotStarted);
    assert_eq!(finder.unhandled_exceptions(root).unwrap(), None);
    let stats = finder.stats().unwrap();
    assert_eq!(stats.complete, 0);
    assert_eq!(stats.analysing, 0);
}

#[test]
fn test_same_class_only() {
    let mut builder = ProgramBuilder::with_framework();
    let ae = builder.constructor_of("System.ArgumentException").unwrap();
    let io = builder.constructor_of("System.IO.IOException").unwrap();
    let journal = builder.class("App", "App.Journal", "System.Object");
    let write = builder
        .method(journal, "Write")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(io)?;
            b.throw()
        })
        .unwrap();
    let service = builder.class("App", "App.Service", "System.Object");
    let validate = builder
        .method(service, "Validate")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.newobj(ae)?;
            b.throw()
        })
        .unwrap();
    let run = builder
        .method(service, "Run")
        .modifiers(MethodModifiers::STATIC)
        .body(|b| {
            b.call(validate)?;
            b.call(write)?;
            b.ret()
        })
        .unwrap();
    let program = Arc::new(builder.build().unwrap());

    let options = AnalysisOptions {
        same_class_only: true,
        ..AnalysisOptions::default()
    };
    let own_class = ExceptionFinder::new(program.clone(), options);
    own_class.analyze(run, &CancellationToken::new()).unwrap();
    assert_eq!(own_class.called_methods(run).unwrap(), Some(vec![validate]));
    assert_eq!(
        escaping_types(&own_class, run),
        vec!["System.ArgumentException"]
    );
    assert_eq!(own_class.state(write), AnalysisState::NotStarted);

    let global = ExceptionFinder::new(program, AnalysisOptions::default());
    global.analyze(run, &CancellationToken::new()).unwrap();
    assert_eq!(global.called_methods(run).unwrap(), Some(vec![validate, write]));
    assert_eq!(
        escaping_types(&global, run),
        vec!["System.ArgumentException", "System.IO.IOException"]
    );
}

#[test]
fn test_event_accessors_ignored() {
    let mut builder = ProgramBuilder::with_framework();
    let ioe = builder
        .constructor_of("System.InvalidOperationException")
        .unwrap();
    let button = builder.class("App", "App.Button", "System.Object");
    let add_click = builder
        .method(button, "add_Click")
        .kind(MethodKind::EventAdd)
        .body(|b| {
            b.newobj(ioe)?;
            b.throw()
        })
        .unwrap();
    let form = builder.class("App", "App.Form", "System.Object");
    let wire = builder
        .method(form, "Wire")
        .body(|b| {
            b.ldnull()?;
            b.callvirt(add_click)?;
            b.ret()
        })
        .unwrap();
    let program = Arc::new(builder.build().unwrap());

    let ignoring = ExceptionFinder::new(program.clone(), AnalysisOptions::default());
    ignoring.analyze(wire, &CancellationToken::new()).unwrap();
    assert_eq!(ignoring.called_methods(wire).unwrap(), Some(Vec::new()));
    assert!(escaping_types(&ignoring, wire).is_empty());
    assert_eq!(ignoring.state(add_click), AnalysisState::NotStarted);

    let options = AnalysisOptions {
        ignore_event_methods: false,
        ..AnalysisOptions::default()
    };
    let keeping = ExceptionFinder::new(program, options);
    keeping.analyze(wire, &CancellationToken::new()).unwrap();
    assert_eq!(keeping.called_methods(wire).unwrap(), Some(vec![add_click]));
    assert_eq!(
        escaping_types(&keeping, wire),
        vec!["System.InvalidOperationException"]
    );
}
