//! High-level entry points tying the phases together: evaluate a
//! project, build it, list its products, clean its outputs. The CLI
//! is a thin shell over these.

use std::path::{Path, PathBuf};

use crate::core::build::{self, BuildConfig, DepSnapshot, Executor, Reporter};
use crate::core::classes::BuiltinKind;
use crate::core::eval::evaluate;
use crate::core::session::{BuildParams, Session};
use crate::util::errors::Location;
use crate::util::{BusyResult, CancelToken};

/// Evaluate the description tree under the session parameters. The
/// session's error list carries everything that went wrong; the
/// caller decides whether to stop at this phase boundary.
pub fn parse_project(params: BuildParams) -> BusyResult<Session> {
    let mut session = Session::new(params);
    evaluate(&mut session)?;
    Ok(session)
}

/// Generate and run the build. Returns the overall success flag.
pub fn build_project(
    session: &mut Session,
    config: &BuildConfig,
    snapshot: Option<DepSnapshot>,
    reporter: &mut dyn Reporter,
    executor: &dyn Executor,
    cancel: &CancelToken,
) -> BusyResult<bool> {
    build::run_build(session, config, snapshot, reporter, executor, cancel)
}

/// One row of `busy targets`.
#[derive(Debug)]
pub struct TargetInfo {
    pub name: String,
    pub qualident: String,
    pub kind: BuiltinKind,
    pub exported: bool,
    pub runnable: bool,
    pub loc: Location,
}

pub fn list_targets(session: &Session) -> Vec<TargetInfo> {
    let mut out = Vec::new();
    for id in session.all_products() {
        let Some(rec) = session.table.resolve(id) else {
            continue;
        };
        let Some(var) = rec.as_var() else { continue };
        let kind = session
            .builtins
            .builtin_kind(&session.table, var.ty)
            .unwrap_or(BuiltinKind::Config);
        let runnable = var
            .inst
            .as_ref()
            .map(|inst| inst.is_runnable())
            .unwrap_or(false);
        out.push(TargetInfo {
            name: rec.name.to_string(),
            qualident: session.decl_path(id),
            kind,
            exported: var.exported,
            runnable,
            loc: rec.loc.clone(),
        });
    }
    out
}

/// Every BUSY file of the session, root first (the build-system file
/// set an embedding host watches for changes).
pub fn build_system_files(session: &Session) -> Vec<PathBuf> {
    fn walk(session: &Session, module: crate::core::refs::Reference, out: &mut Vec<PathBuf>) {
        if let Some(m) = session.table.resolve(module).and_then(|r| r.as_module()) {
            out.push(m.file.clone());
            for &child in &m.children {
                if session
                    .table
                    .resolve(child)
                    .map(|r| r.as_module().is_some())
                    .unwrap_or(false)
                {
                    walk(session, child, out);
                }
            }
        }
    }
    let mut out = Vec::new();
    walk(session, session.root, &mut out);
    out
}

/// Remove everything a generation pass would produce: outputs and the
/// response files next to them. Returns how many files went away.
pub fn clean_project(session: &mut Session) -> BusyResult<usize> {
    let list = build::generate(session)?;
    let mut removed = 0;
    for output in &list.outputs {
        removed += remove_if_present(output);
        removed += remove_if_present(&build::invoke::response_file_path(output));
    }
    Ok(removed)
}

fn remove_if_present(path: &Path) -> usize {
    if path.is_file() && std::fs::remove_file(path).is_ok() {
        log::debug!("removed {}", path.display());
        1
    } else {
        0
    }
}
