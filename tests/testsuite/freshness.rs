//! Incremental-build behavior: idempotence and minimal recompilation
//! after touching a source.

use filetime::FileTime;

use crate::support::{linux_gcc, project, run, MockExecutor};

fn fixture() -> tempfile::TempDir {
    project(&[
        ("a.cpp", "int a() { return 1; }\n"),
        ("a2.cpp", "int a2() { return 2; }\n"),
        ("b.cpp", "int main() { return 0; }\n"),
        (
            "BUSY",
            "let a : Library { .sources += ./a.cpp ./a2.cpp }\n\
             let b ! : Executable { .sources += ./b.cpp; .deps += a }\n",
        ),
    ])
}

#[test]
fn second_run_has_zero_due_operations() {
    let p = fixture();
    let executor = MockExecutor::default();
    let (_, first, ok) = run(linux_gcc(p.path()), &executor);
    assert!(ok);
    // 3 compiles, 1 archive, 1 link.
    assert_eq!(first.results.len(), 5);

    let executor = MockExecutor::default();
    let (_, second, ok) = run(linux_gcc(p.path()), &executor);
    assert!(ok);
    assert_eq!(second.results.len(), 0, "nothing was due");
    assert_eq!(second.finished, vec![true]);
    // Progress still covered the whole list.
    assert_eq!(second.total, first.total);
}

#[test]
fn touching_one_source_redoes_its_compile_and_the_dependent_links() {
    let p = fixture();
    let executor = MockExecutor::default();
    let (_, _, ok) = run(linux_gcc(p.path()), &executor);
    assert!(ok);

    // Make one library source strictly newer than its object.
    let touched = p.path().join("a.cpp");
    let future = FileTime::from_unix_time(
        FileTime::now().unix_seconds() + 60,
        0,
    );
    filetime::set_file_mtime(&touched, future).unwrap();

    let executor = MockExecutor::default();
    let (_, log, ok) = run(linux_gcc(p.path()), &executor);
    assert!(ok);

    let outputs = executor.executed_outputs();
    assert_eq!(
        log.results.len(),
        3,
        "compile of a.cpp, archive of a, link of b; got {:?}",
        outputs
    );
    assert!(outputs[0].ends_with("a/a.o"));
    assert!(outputs[1].ends_with("a/liba.a"));
    assert!(outputs[2].ends_with("b/b"));
    // The untouched sibling was not recompiled.
    assert!(!outputs.iter().any(|o| o.ends_with("a2.o")));
}
