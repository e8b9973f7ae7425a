//! The build-description evaluator: loads the module tree, turns
//! parsed statements into registered records with resolved values,
//! applies parameter overrides, and hands over to the config merger.
//!
//! This replaces the embedded script interpreter of the original
//! design; BUSY is declarative with a closed set of operations, so a
//! direct AST walk with a narrow primitive surface (module loading,
//! `isa`, path joining) covers it.

use std::path::{Path, PathBuf};

use crate::core::module::{find_busy_file, relative_dir, LoadState, LoadTracker};
use crate::core::product::merge_session;
use crate::core::refs::{
    ClassData, Entry, ModuleData, Payload, Record, Reference, Value, VarData,
};
use crate::core::session::Session;
use crate::core::interning::InternedString;
use crate::syntax::ast::{File, RawEntry, RawValue, Stmt};
use crate::syntax::parse_file;
use crate::util::errors::{ErrorKind, Location};
use crate::util::{paths, BusyResult};

/// Evaluate the whole session: locate the root BUSY file, load the
/// module tree, apply overrides, merge. Recoverable problems land in
/// `session.errors`; the return value says whether the description is
/// usable for command generation.
pub fn evaluate(session: &mut Session) -> BusyResult<bool> {
    let root_dir = session.params.root_source_dir.clone();
    let mut tracker = LoadTracker::new();
    let root = load_module(session, &mut tracker, &root_dir, Reference::NONE, None)?;
    match root {
        Some(id) => session.root = id,
        None => return Ok(false),
    }

    apply_overrides(session)?;
    merge_session(session)?;
    Ok(!session.errors.has_errors())
}

fn load_module(
    session: &mut Session,
    tracker: &mut LoadTracker,
    dir: &Path,
    owner: Reference,
    submod: Option<(&str, &Location)>,
) -> BusyResult<Option<Reference>> {
    let (canon, state) = tracker.enter(dir)?;
    match state {
        LoadState::Loaded(id) => return Ok(Some(id)),
        LoadState::Cycle => {
            let (name, loc) = submod.expect("the root module cannot be its own parent");
            session.errors.error(
                ErrorKind::Resolve,
                Some(loc.clone()),
                format!(
                    "cyclic modules: `{}` ({}) is already being loaded from {}",
                    name,
                    canon.display(),
                    tracker.current().unwrap_or(&canon).display()
                ),
            );
            return Ok(None);
        }
        LoadState::Fresh => {}
    }

    let file = match find_busy_file(&canon) {
        Some(f) => f,
        None => {
            let loc = submod.map(|(_, l)| l.clone());
            session.errors.error(
                ErrorKind::Resolve,
                loc,
                format!("no BUSY file in `{}`", canon.display()),
            );
            tracker.abandon(&canon);
            return Ok(None);
        }
    };

    let text = match paths::read(&file) {
        Ok(t) => t,
        Err(e) => {
            session.errors.error(
                ErrorKind::File,
                Some(Location::new(file.clone(), 0, 0)),
                e.to_string(),
            );
            tracker.abandon(&canon);
            return Ok(None);
        }
    };

    let ast: File = match parse_file(&text) {
        Ok(ast) => ast,
        Err(e) => {
            session.errors.error(
                ErrorKind::Parse,
                Some(Location::new(file.clone(), e.row, e.col)),
                e.msg,
            );
            tracker.abandon(&canon);
            return Ok(None);
        }
    };

    let name = match submod {
        Some((name, _)) => name.to_string(),
        None => canon
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string()),
    };
    let parent_rdir = session
        .table
        .resolve(owner)
        .and_then(|r| r.as_module())
        .map(|m| m.rdir.clone())
        .unwrap_or_default();
    let rdir = if owner.is_none() {
        PathBuf::new()
    } else {
        let root_dir = session.params.root_source_dir.clone();
        let root_canon = root_dir.canonicalize().unwrap_or(root_dir);
        relative_dir(&canon, &root_canon, &parent_rdir, &name)
    };

    let record = Record {
        name: InternedString::new(&name),
        owner,
        loc: submod
            .map(|(_, l)| l.clone())
            .unwrap_or_else(|| Location::new(file.clone(), 0, 0)),
        payload: Payload::Module(ModuleData {
            dir: canon.clone(),
            file: file.clone(),
            rdir,
            children: Vec::new(),
        }),
    };
    let id = match session.table.register(record) {
        Ok(id) => id,
        Err(dup) => {
            session.errors.error(
                ErrorKind::Resolve,
                Some(dup.loc.clone()),
                format!(
                    "{} (previously declared at {})",
                    dup, dup.previous
                ),
            );
            tracker.abandon(&canon);
            return Ok(None);
        }
    };

    log::debug!("loaded module `{}` from {}", name, file.display());
    for stmt in &ast.stmts {
        eval_stmt(session, tracker, id, &canon, &file, stmt)?;
    }
    tracker.finish(canon, id);
    Ok(Some(id))
}

fn eval_stmt(
    session: &mut Session,
    tracker: &mut LoadTracker,
    module: Reference,
    dir: &Path,
    file: &Path,
    stmt: &Stmt,
) -> BusyResult<()> {
    match stmt {
        Stmt::Submod(s) => {
            let loc = Location::new(file, s.row, s.col);
            let sub_dir = paths::join_normalized(dir, Path::new(&s.path));
            if !sub_dir.is_dir() {
                session.errors.error(
                    ErrorKind::Resolve,
                    Some(loc),
                    format!("submodule directory does not exist: {}", sub_dir.display()),
                );
                return Ok(());
            }
            load_module(session, tracker, &sub_dir, module, Some((&s.name, &loc)))?;
        }
        Stmt::Class(c) => {
            let loc = Location::new(file, c.row, c.col);
            let Some(base) = resolve_class(session, module, &c.base, &loc) else {
                return Ok(());
            };
            let defaults = resolve_body(session, module, dir, file, &c.body);
            let record = Record {
                name: InternedString::new(&c.name),
                owner: module,
                loc: loc.clone(),
                payload: Payload::Class(ClassData { base, defaults }),
            };
            if let Err(dup) = session.table.register(record) {
                session.errors.error(
                    ErrorKind::Resolve,
                    Some(loc),
                    format!("{} (previously declared at {})", dup, dup.previous),
                );
            }
        }
        Stmt::Let(l) => {
            let loc = Location::new(file, l.row, l.col);
            let Some(ty) = resolve_class(session, module, &l.ty, &loc) else {
                return Ok(());
            };
            let body = resolve_body(session, module, dir, file, &l.body);
            let record = Record {
                name: InternedString::new(&l.name),
                owner: module,
                loc: loc.clone(),
                payload: Payload::Var(VarData {
                    ty,
                    exported: l.exported,
                    body,
                    inst: None,
                }),
            };
            if let Err(dup) = session.table.register(record) {
                session.errors.error(
                    ErrorKind::Resolve,
                    Some(loc),
                    format!("{} (previously declared at {})", dup, dup.previous),
                );
            }
        }
    }
    Ok(())
}

/// Resolve a (possibly dotted) class name: built-ins first, then
/// user classes up the module chain, then submodule navigation.
fn resolve_class(
    session: &mut Session,
    module: Reference,
    path: &[String],
    loc: &Location,
) -> Option<Reference> {
    if path.len() == 1 {
        if let Some(b) = session.builtins.by_name(&path[0]) {
            return Some(b);
        }
    }
    match resolve_ident(session, module, path) {
        Some(id)
            if session
                .table
                .resolve(id)
                .map(|r| r.as_class().is_some())
                .unwrap_or(false) =>
        {
            Some(id)
        }
        Some(_) => {
            session.errors.error(
                ErrorKind::Type,
                Some(loc.clone()),
                format!("`{}` is not a class", path.join(".")),
            );
            None
        }
        None => {
            session.errors.error(
                ErrorKind::Resolve,
                Some(loc.clone()),
                format!("unknown class `{}`", path.join(".")),
            );
            None
        }
    }
}

/// Lexical scope lookup: the current module's declarations, then each
/// enclosing module's, with dotted tails navigating into submodules.
fn resolve_ident(session: &Session, module: Reference, path: &[String]) -> Option<Reference> {
    let mut scope = module;
    loop {
        if let Some(first) = session.table.find_child(scope, &path[0]) {
            let mut cur = first;
            for part in &path[1..] {
                cur = session.table.find_child(cur, part)?;
            }
            return Some(cur);
        }
        let owner = session.table.owner(scope);
        if owner.is_none() {
            return None;
        }
        scope = owner;
    }
}

fn resolve_body(
    session: &mut Session,
    module: Reference,
    dir: &Path,
    file: &Path,
    body: &[RawEntry],
) -> Vec<Entry> {
    let mut out = Vec::new();
    for raw in body {
        let loc = Location::new(file, raw.row, raw.col);
        let mut values = Vec::new();
        for value in &raw.values {
            match resolve_value(session, module, dir, value) {
                Ok(v) => values.push(v),
                Err(msg) => {
                    session
                        .errors
                        .error(ErrorKind::Resolve, Some(loc.clone()), msg);
                }
            }
        }
        out.push(Entry {
            field: InternedString::new(&raw.field),
            op: raw.op,
            values,
            public: raw.public,
            loc,
        });
    }
    out
}

fn resolve_value(
    session: &Session,
    module: Reference,
    dir: &Path,
    value: &RawValue,
) -> Result<Value, String> {
    Ok(match value {
        RawValue::Str(s) => Value::Str(s.clone()),
        RawValue::Int(i) => Value::Int(*i),
        RawValue::Real(r) => Value::Real(*r),
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Symbol(s) => Value::Symbol(InternedString::new(s)),
        RawValue::Path(p) => Value::Path(paths::join_normalized(dir, Path::new(p))),
        RawValue::Ident(path) => match resolve_ident(session, module, path) {
            Some(id) => Value::Object(id),
            None => return Err(format!("unknown identifier `{}`", path.join("."))),
        },
    })
}

/// Apply the parameter mini-language overrides: each designator names
/// a declaration (navigated from the root module) plus a field, and
/// the value replaces that field before merging.
fn apply_overrides(session: &mut Session) -> BusyResult<()> {
    let overrides = session.params.params.clone();
    let root_dir = session.params.root_source_dir.clone();
    for over in &overrides {
        if over.desig.len() < 2 {
            session.errors.error(
                ErrorKind::Resolve,
                None,
                format!(
                    "parameter `{}` does not name a declaration field",
                    over.desig.join(".")
                ),
            );
            continue;
        }
        let (field, decl_path) = over.desig.split_last().unwrap();
        let Some(decl) = resolve_ident(session, session.root, decl_path) else {
            session.errors.error(
                ErrorKind::Resolve,
                None,
                format!("parameter target `{}` not found", decl_path.join(".")),
            );
            continue;
        };
        let value = match resolve_value(session, session.root, &root_dir, &over.value) {
            Ok(v) => v,
            Err(msg) => {
                session.errors.error(ErrorKind::Resolve, None, msg);
                continue;
            }
        };
        let entry = Entry {
            field: InternedString::new(field),
            op: crate::core::refs::AssignOp::Set,
            values: vec![value],
            public: false,
            loc: Location::default(),
        };
        match &mut session.table.get_mut(decl)?.payload {
            Payload::Var(v) => v.body.push(entry),
            _ => {
                session.errors.error(
                    ErrorKind::Type,
                    None,
                    format!("parameter target `{}` is not a declaration", decl_path.join(".")),
                );
            }
        }
    }
    Ok(())
}
