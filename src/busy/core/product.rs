use std::collections::HashMap;
use std::path::PathBuf;

use indexmap::IndexSet;

use crate::core::classes::BuiltinKind;
use crate::core::interning::InternedString;
use crate::core::refs::{AssignOp, Entry, Payload, Reference, Value};
use crate::core::session::Session;
use crate::util::errors::{ErrorKind, Location};
use crate::util::{internal, BusyResult};

/// The field set a merged product or config instance carries. Set
/// fields keep insertion order and drop later duplicates; scalar
/// fields are last-wins.
#[derive(Clone, Debug, Default)]
pub struct FieldBag {
    pub sources: IndexSet<PathBuf>,
    pub include_dirs: IndexSet<PathBuf>,
    pub defines: IndexSet<String>,
    pub cflags: IndexSet<String>,
    pub cxxflags: IndexSet<String>,
    pub ldflags: IndexSet<String>,
    pub lib_dirs: IndexSet<PathBuf>,
    pub lib_names: IndexSet<String>,
    pub lib_files: IndexSet<PathBuf>,
    pub frameworks: IndexSet<String>,
    pub def_file: Option<PathBuf>,
    /// Artifact base name override; defaults to the declaration name.
    pub name: Option<String>,
    /// Destination directory for `Copy` products; defaults to the
    /// product's own build directory.
    pub to: Option<PathBuf>,
    /// Script arguments, ordered, duplicates preserved.
    pub args: Vec<String>,
}

impl FieldBag {
    /// Append everything from `other`, preserving first occurrences.
    fn absorb(&mut self, other: &FieldBag) {
        self.sources.extend(other.sources.iter().cloned());
        self.include_dirs.extend(other.include_dirs.iter().cloned());
        self.defines.extend(other.defines.iter().cloned());
        self.cflags.extend(other.cflags.iter().cloned());
        self.cxxflags.extend(other.cxxflags.iter().cloned());
        self.ldflags.extend(other.ldflags.iter().cloned());
        self.lib_dirs.extend(other.lib_dirs.iter().cloned());
        self.lib_names.extend(other.lib_names.iter().cloned());
        self.lib_files.extend(other.lib_files.iter().cloned());
        self.frameworks.extend(other.frameworks.iter().cloned());
        if other.def_file.is_some() {
            self.def_file = other.def_file.clone();
        }
        if other.name.is_some() {
            self.name = other.name.clone();
        }
        if other.to.is_some() {
            self.to = other.to.clone();
        }
        self.args.extend(other.args.iter().cloned());
    }
}

/// A product declaration after merging: its own initializer, the
/// referenced configs, and the publicly exported parts of every
/// dependency, folded in that order.
#[derive(Clone, Debug)]
pub struct ProductInst {
    pub kind: BuiltinKind,
    pub fields: FieldBag,
    /// The publicly tagged subset, i.e. what dependents import. Public
    /// entries stay public across edges, so exports are transitive.
    pub exported: FieldBag,
    pub deps: Vec<Reference>,
    pub configs: Vec<Reference>,
    pub use_deps: Vec<InternedString>,
    /// Set when a declared source file is missing; the generator
    /// refuses errored products.
    pub errored: bool,
}

impl ProductInst {
    /// An `Executable` with neither sources nor `use_deps` is a valid
    /// declaration but nothing to run.
    pub fn is_runnable(&self) -> bool {
        self.kind == BuiltinKind::Executable
            && (!self.fields.sources.is_empty() || !self.use_deps.is_empty())
    }
}

/// Compute merged instances for every config and product declaration,
/// dependency-first, and store them on the records. Evaluation errors
/// (unknown fields, bad value types, missing sources, dependency
/// cycles) accumulate on the session; the walk keeps going.
pub fn merge_session(session: &mut Session) -> BusyResult<()> {
    let products = session.all_products();
    let order = topo_order(session, &products)?;

    // Configs first: they never depend on products.
    let configs: Vec<Reference> = session
        .table
        .iter()
        .filter(|(_, r)| {
            r.as_var()
                .map(|v| {
                    session.builtins.builtin_kind(&session.table, v.ty)
                        == Some(BuiltinKind::Config)
                })
                .unwrap_or(false)
        })
        .map(|(id, _)| id)
        .collect();

    let mut done: HashMap<Reference, ProductInst> = HashMap::new();
    for id in configs {
        merge_one(session, id, &mut done)?;
    }
    for id in order {
        merge_one(session, id, &mut done)?;
    }

    for (id, inst) in done {
        match &mut session.table.get_mut(id)?.payload {
            Payload::Var(v) => v.inst = Some(inst),
            _ => return Err(internal(format!("merged non-declaration {}", id))),
        }
    }
    Ok(())
}

fn merge_one(
    session: &mut Session,
    id: Reference,
    done: &mut HashMap<Reference, ProductInst>,
) -> BusyResult<()> {
    if done.contains_key(&id) {
        return Ok(());
    }
    let rec = session.table.get(id)?;
    let var = rec
        .as_var()
        .ok_or_else(|| internal(format!("{} is not a declaration", id)))?;
    let decl_loc = rec.loc.clone();
    let ty = var.ty;
    let body = var.body.clone();
    let kind = session
        .builtins
        .builtin_kind(&session.table, ty)
        .unwrap_or(BuiltinKind::Config);

    // Seed with the class default chain, base first, then the
    // declaration's own body.
    let mut entries: Vec<Entry> = Vec::new();
    let mut chain = Vec::new();
    let mut cls = ty;
    while let Some(c) = session.table.resolve(cls).and_then(|r| r.as_class()) {
        chain.push(cls);
        cls = c.base;
    }
    for &cls in chain.iter().rev() {
        if let Some(c) = session.table.resolve(cls).and_then(|r| r.as_class()) {
            entries.extend(c.defaults.iter().cloned());
        }
    }
    entries.extend(body);

    let mut inst = ProductInst {
        kind,
        fields: FieldBag::default(),
        exported: FieldBag::default(),
        deps: Vec::new(),
        configs: Vec::new(),
        use_deps: Vec::new(),
        errored: false,
    };

    let mut issues: Vec<(ErrorKind, Location, String)> = Vec::new();
    for entry in &entries {
        apply_entry(session, entry, &mut inst, &mut issues);
    }

    // Referenced configs, in order of appearance.
    for cfg in inst.configs.clone() {
        merge_one(session, cfg, done)?;
        if let Some(cinst) = done.get(&cfg) {
            inst.fields.absorb(&cinst.fields);
            inst.exported.absorb(&cinst.exported);
        }
    }

    // Publicly exported parts of each dependency, depth-first. The
    // dependency's own exports already contain its transitive ones.
    for dep in inst.deps.clone() {
        merge_one(session, dep, done)?;
        if let Some(dinst) = done.get(&dep) {
            let mut public = dinst.exported.clone();
            // Sources never flow across edges.
            public.sources.clear();
            inst.fields.absorb(&public);
            inst.exported.absorb(&public);
        }
    }

    // Every source must be a regular file right now.
    for src in &inst.fields.sources {
        if !src.is_file() {
            issues.push((
                ErrorKind::File,
                decl_loc.clone(),
                format!("source file does not exist: {}", src.display()),
            ));
            inst.errored = true;
        }
    }

    for (kind, loc, msg) in issues {
        session.errors.error(kind, Some(loc), msg);
    }
    done.insert(id, inst);
    Ok(())
}

fn apply_entry(
    session: &Session,
    entry: &Entry,
    inst: &mut ProductInst,
    issues: &mut Vec<(ErrorKind, Location, String)>,
) {
    let table = &session.table;
    let mut bad = |msg: String| issues.push((ErrorKind::Type, entry.loc.clone(), msg));

    macro_rules! set_field {
        ($field:ident, $extract:ident) => {{
            if entry.op == AssignOp::Set {
                inst.fields.$field.clear();
                if entry.public {
                    inst.exported.$field.clear();
                }
            }
            for value in &entry.values {
                match $extract(value) {
                    Some(v) => {
                        inst.fields.$field.insert(v.clone());
                        if entry.public {
                            inst.exported.$field.insert(v);
                        }
                    }
                    None => bad(format!(
                        "field `{}` cannot hold {}",
                        entry.field,
                        value.describe()
                    )),
                }
            }
        }};
    }

    fn as_path(v: &Value) -> Option<PathBuf> {
        match v {
            Value::Path(p) => Some(p.clone()),
            _ => None,
        }
    }
    fn as_str(v: &Value) -> Option<String> {
        match v {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    match entry.field.as_str() {
        "sources" => set_field!(sources, as_path),
        "include_dirs" => set_field!(include_dirs, as_path),
        "defines" => set_field!(defines, as_str),
        "cflags" => set_field!(cflags, as_str),
        "cxxflags" => set_field!(cxxflags, as_str),
        "ldflags" => set_field!(ldflags, as_str),
        "lib_dirs" => set_field!(lib_dirs, as_path),
        "lib_names" => set_field!(lib_names, as_str),
        "lib_files" => set_field!(lib_files, as_path),
        "frameworks" => set_field!(frameworks, as_str),
        "def_file" => match entry.values.as_slice() {
            [Value::Path(p)] => inst.fields.def_file = Some(p.clone()),
            _ => bad("field `def_file` takes a single path".to_string()),
        },
        "name" => match entry.values.as_slice() {
            [Value::Str(s)] => inst.fields.name = Some(s.clone()),
            _ => bad("field `name` takes a single string".to_string()),
        },
        "to" => match entry.values.as_slice() {
            [Value::Path(p)] => inst.fields.to = Some(p.clone()),
            _ => bad("field `to` takes a single path".to_string()),
        },
        "args" => {
            for value in &entry.values {
                match value {
                    Value::Str(s) => inst.fields.args.push(s.clone()),
                    other => bad(format!(
                        "field `args` cannot hold {}",
                        other.describe()
                    )),
                }
            }
        }
        "deps" => {
            for value in &entry.values {
                match value {
                    Value::Object(dep)
                        if crate::core::classes::var_isa(
                            table,
                            *dep,
                            session.builtins.product,
                        ) =>
                    {
                        if !inst.deps.contains(dep) {
                            inst.deps.push(*dep);
                        }
                    }
                    other => bad(format!(
                        "field `deps` expects product references, found {}",
                        other.describe()
                    )),
                }
            }
        }
        "configs" => {
            for value in &entry.values {
                match value {
                    Value::Object(cfg)
                        if session
                            .builtins
                            .builtin_kind(
                                table,
                                table
                                    .resolve(*cfg)
                                    .and_then(|r| r.as_var())
                                    .map(|v| v.ty)
                                    .unwrap_or(Reference::NONE),
                            )
                            == Some(BuiltinKind::Config) =>
                    {
                        if !inst.configs.contains(cfg) {
                            inst.configs.push(*cfg);
                        }
                    }
                    other => bad(format!(
                        "field `configs` expects Config references, found {}",
                        other.describe()
                    )),
                }
            }
        }
        "use_deps" => {
            for value in &entry.values {
                match value {
                    Value::Symbol(s) => {
                        if !inst.use_deps.contains(s) {
                            inst.use_deps.push(*s);
                        }
                    }
                    other => bad(format!(
                        "field `use_deps` expects symbols, found {}",
                        other.describe()
                    )),
                }
            }
        }
        other => {
            bad(format!("assignment into undeclared field `{}`", other));
        }
    }
}

/// Topological order over the product set; reports a `Resolve` error
/// and drops the back edge when the dependency graph has a cycle.
fn topo_order(session: &mut Session, products: &[Reference]) -> BusyResult<Vec<Reference>> {
    // Dependency edges come straight from the (unresolved) bodies so
    // ordering is available before merging.
    let mut edges: HashMap<Reference, Vec<Reference>> = HashMap::new();
    for &p in products {
        let var = session
            .table
            .get(p)?
            .as_var()
            .ok_or_else(|| internal(format!("{} is not a declaration", p)))?;
        let mut deps = Vec::new();
        for entry in &var.body {
            if entry.field.as_str() == "deps" {
                for value in &entry.values {
                    if let Value::Object(d) = value {
                        deps.push(*d);
                    }
                }
            }
        }
        edges.insert(p, deps);
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }
    let mut marks: HashMap<Reference, Mark> = products.iter().map(|&p| (p, Mark::White)).collect();
    let mut order = Vec::new();
    let mut cycles = Vec::new();

    fn visit(
        node: Reference,
        edges: &HashMap<Reference, Vec<Reference>>,
        marks: &mut HashMap<Reference, Mark>,
        order: &mut Vec<Reference>,
        cycles: &mut Vec<(Reference, Reference)>,
    ) {
        marks.insert(node, Mark::Grey);
        if let Some(deps) = edges.get(&node) {
            for &dep in deps {
                match marks.get(&dep) {
                    Some(Mark::White) => visit(dep, edges, marks, order, cycles),
                    Some(Mark::Grey) => cycles.push((node, dep)),
                    _ => {}
                }
            }
        }
        marks.insert(node, Mark::Black);
        order.push(node);
    }

    for &p in products {
        if marks.get(&p) == Some(&Mark::White) {
            visit(p, &edges, &mut marks, &mut order, &mut cycles);
        }
    }

    for (from, to) in cycles {
        let from_name = session.decl_path(from);
        let to_name = session.decl_path(to);
        let loc = session.table.get(from)?.loc.clone();
        session.errors.error(
            ErrorKind::Resolve,
            Some(loc),
            format!("dependency cycle between `{}` and `{}`", from_name, to_name),
        );
    }
    Ok(order)
}
