//! Module-tree resolution: cycles, idempotent sub-module binding, and
//! build-directory mirroring.

use busy::core::build::generate;
use busy::ops;

use crate::support::{evaluated, linux_gcc, project};

#[test]
fn cyclic_modules_are_reported_but_not_fatal() {
    let p = project(&[
        ("BUSY", "submod a = ./a\nsubmod other = ./other\n"),
        ("a/BUSY", "submod b = ./b\n"),
        ("a/b/BUSY", "submod back = ../../a\n"),
        ("other/ok.cpp", "\n"),
        ("other/BUSY", "let ok ! : Library { .sources += ./ok.cpp }\n"),
    ]);
    let session = ops::parse_project(linux_gcc(p.path())).unwrap();
    let text = session.errors.to_string_lossy();
    assert!(text.contains("cyclic modules"), "{}", text);
    assert!(text.contains("back"), "names the offending edge: {}", text);
    // The unrelated module evaluated fine.
    assert!(session.find_product("ok").is_some());
}

#[test]
fn a_diamond_of_submodules_loads_each_module_once() {
    let p = project(&[
        (
            "BUSY",
            "submod left = ./left\nsubmod right = ./right\n",
        ),
        ("left/BUSY", "submod shared = ../shared\n"),
        ("right/BUSY", "submod shared = ../shared\n"),
        ("shared/lib.cpp", "\n"),
        ("shared/BUSY", "let shared ! : Library { .sources += ./lib.cpp }\n"),
    ]);
    let session = evaluated(linux_gcc(p.path()));
    let files = ops::build_system_files(&session);
    // Root, left, right, shared; shared appears once despite two
    // references.
    assert_eq!(files.len(), 4);
}

#[test]
fn submodule_products_build_under_their_relative_dir() {
    let p = project(&[
        ("BUSY", "submod sub = ./sub\n"),
        ("sub/x.cpp", "\n"),
        ("sub/BUSY", "let x ! : Library { .sources += ./x.cpp }\n"),
    ]);
    let mut session = evaluated(linux_gcc(p.path()));
    let list = generate(&mut session).unwrap();
    let archive = list
        .ops
        .iter()
        .find_map(|op| op.outfile().filter(|o| o.ends_with(".a")))
        .expect("the library was archived");
    assert!(
        archive.ends_with("build/sub/x/libx.a"),
        "artifact placed under the module subpath: {}",
        archive
    );
}

#[test]
fn duplicate_declarations_in_one_module_are_rejected() {
    let p = project(&[(
        "BUSY",
        "let x : Library {}\nlet x : Executable {}\n",
    )]);
    let session = ops::parse_project(linux_gcc(p.path())).unwrap();
    assert!(session
        .errors
        .to_string_lossy()
        .contains("duplicate declaration of `x`"));
}

#[test]
fn missing_submodule_directory_is_a_resolve_error() {
    let p = project(&[("BUSY", "submod gone = ./nowhere\n")]);
    let session = ops::parse_project(linux_gcc(p.path())).unwrap();
    assert!(session
        .errors
        .to_string_lossy()
        .contains("submodule directory does not exist"));
}
