//! End-to-end build scenarios: the hello executable, config merging
//! across dependency edges, and Windows response files.

use busy::core::build::{generate, OpKind, ParamKind};

use crate::support::{evaluated, linux_gcc, project, run, win32_msvc, MockExecutor};

#[test]
fn hello_executable_end_to_end() {
    let p = project(&[
        ("main.cpp", "int main() { return 0; }\n"),
        ("BUSY", "let hello ! : Executable { .sources += ./main.cpp }\n"),
    ]);
    let executor = MockExecutor::default();
    let (session, log, ok) = run(linux_gcc(p.path()), &executor);
    assert!(ok);
    assert_eq!(log.finished, vec![true]);
    // Marker + compile + link in the progress total, two executions.
    assert_eq!(log.total, 3);
    assert_eq!(log.results.len(), 2);
    assert!(log.results.iter().all(|r| r.success));
    assert!(log
        .descriptions
        .iter()
        .any(|d| d.contains("# running hello")));

    let outputs = executor.executed_outputs();
    assert!(outputs[0].ends_with("build/hello/main.o"));
    assert!(outputs[1].ends_with("build/hello/hello"));

    // The link consumed exactly the compile output.
    let calls = executor.calls.lock().unwrap();
    let (compiler, compile_args) = &calls[0];
    assert_eq!(compiler, "g++");
    assert!(compile_args.contains(&"-c".to_string()));
    let (linker, link_args) = &calls[1];
    assert_eq!(linker, "g++");
    assert!(link_args.iter().any(|a| a.ends_with("main.o")));

    // Artifacts actually exist under the build root.
    assert!(session
        .params
        .root_build_dir
        .join("hello/hello")
        .is_file());
}

#[test]
fn public_config_reaches_dependent_compiles() {
    let p = project(&[
        ("a.cpp", "\n"),
        ("b.cpp", "\n"),
        (
            "BUSY",
            "let a : Library { .sources += ./a.cpp; public .defines += \"X=1\" }\n\
             let b ! : Executable { .sources += ./b.cpp; .deps += a }\n",
        ),
    ]);
    let executor = MockExecutor::default();
    let (_, _, ok) = run(linux_gcc(p.path()), &executor);
    assert!(ok);

    let calls = executor.calls.lock().unwrap();
    let b_compile = calls
        .iter()
        .find(|(_, args)| args.iter().any(|a| a.ends_with("b.cpp")))
        .expect("b.cpp was compiled");
    assert!(b_compile.1.contains(&"-DX=1".to_string()));
}

#[test]
fn public_define_uses_msvc_spelling_on_msvc() {
    let p = project(&[
        ("a.cpp", "\n"),
        ("b.cpp", "\n"),
        (
            "BUSY",
            "let a : Library { .sources += ./a.cpp; public .defines += \"X=1\" }\n\
             let b ! : Executable { .sources += ./b.cpp; .deps += a }\n",
        ),
    ]);
    let executor = MockExecutor::default();
    let (_, _, ok) = run(win32_msvc(p.path()), &executor);
    assert!(ok);
    let calls = executor.calls.lock().unwrap();
    let b_compile = calls
        .iter()
        .find(|(_, args)| args.iter().any(|a| a.ends_with("b.cpp")))
        .expect("b.cpp was compiled");
    assert!(b_compile.1.contains(&"/DX=1".to_string()));
}

#[test]
fn windows_link_goes_through_a_response_file() {
    // Enough long-named sources that the inline argument string would
    // pass the command-line limit if it were ever assembled.
    let mut files: Vec<(String, String)> = Vec::new();
    let mut busy = String::new();
    busy.push_str("let app ! : Executable {\n");
    for i in 0..400 {
        let name = format!("translation_unit_with_a_fairly_long_name_{:03}.cpp", i);
        busy.push_str(&format!("    .sources += ./{}\n", name));
        files.push((name, "\n".to_string()));
    }
    busy.push_str("}\n");
    files.push(("BUSY".to_string(), busy));
    let file_refs: Vec<(&str, &str)> = files
        .iter()
        .map(|(a, b)| (a.as_str(), b.as_str()))
        .collect();
    let p = project(&file_refs);

    let executor = MockExecutor::default();
    let (session, _, ok) = run(win32_msvc(p.path()), &executor);
    assert!(ok);

    let calls = executor.calls.lock().unwrap();
    let (_, link_args) = calls
        .iter()
        .find(|(_, args)| args.iter().any(|a| a.starts_with("/out:")))
        .expect("link ran");
    let at_arg = link_args
        .iter()
        .find(|a| a.starts_with('@'))
        .expect("arguments reference the response file");

    // The objects are only in the response file, never inline.
    assert!(!link_args.iter().any(|a| a.ends_with(".obj")));

    let rsp_path = &at_arg[1..];
    assert!(rsp_path.ends_with("app.rsp"));
    let bytes = std::fs::read_to_string(rsp_path).unwrap();
    let inputs: Vec<&str> = bytes.split(' ').collect();
    assert_eq!(inputs.len(), 400);
    assert!(inputs.iter().all(|i| i.ends_with(".obj")));
    assert!(bytes.len() > 20_000, "the inline line was genuinely long");
    assert!(rsp_path.starts_with(
        session.params.root_build_dir.join("app").to_str().unwrap()
    ));
}

#[test]
fn operation_list_satisfies_the_group_invariants() {
    let p = project(&[
        ("a.cpp", "\n"),
        ("b.cpp", "\n"),
        ("c.cpp", "\n"),
        (
            "BUSY",
            "let a : Library { .sources += ./a.cpp }\n\
             let b : Library { .sources += ./b.cpp; .deps += a }\n\
             let c ! : Executable { .sources += ./c.cpp; .deps += b }\n",
        ),
    ]);
    let mut session = evaluated(linux_gcc(p.path()));
    let list = generate(&mut session).unwrap();

    let mut last = 0;
    for op in &list.ops {
        assert!(op.group >= last);
        last = op.group;
    }

    // Non-marker operations have exactly one outfile and at least one
    // infile.
    for op in &list.ops {
        if op.op == OpKind::EnteringProduct {
            continue;
        }
        assert_eq!(op.get_params(ParamKind::OutFile).count(), 1, "{:?}", op.op);
        assert!(op.infiles().count() >= 1, "{:?}", op.op);
    }
}
