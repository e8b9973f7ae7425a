use serde::Serialize;

use crate::core::interning::InternedString;
use crate::core::refs::{ClassData, Payload, Record, RecordKind, RefTable, Reference};
use crate::util::errors::Location;

/// The closed set of built-in product kinds the command generator
/// dispatches on. User-defined subclasses are mapped to their nearest
/// built-in ancestor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum BuiltinKind {
    Executable,
    Library,
    Dll,
    Copy,
    Moc,
    Rcc,
    Uic,
    Script,
    Config,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 9] = [
        BuiltinKind::Executable,
        BuiltinKind::Library,
        BuiltinKind::Dll,
        BuiltinKind::Copy,
        BuiltinKind::Moc,
        BuiltinKind::Rcc,
        BuiltinKind::Uic,
        BuiltinKind::Script,
        BuiltinKind::Config,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::Executable => "Executable",
            BuiltinKind::Library => "Library",
            BuiltinKind::Dll => "Dll",
            BuiltinKind::Copy => "Copy",
            BuiltinKind::Moc => "Moc",
            BuiltinKind::Rcc => "Rcc",
            BuiltinKind::Uic => "Uic",
            BuiltinKind::Script => "Script",
            BuiltinKind::Config => "Config",
        }
    }

    /// Whether instances can appear in `deps` lists and produce build
    /// operations (everything except `Config`).
    pub fn is_product(self) -> bool {
        self != BuiltinKind::Config
    }
}

/// References of the built-in class hierarchy, registered once per
/// session. `Product` is the root; the nine kinds above are its direct
/// subclasses.
#[derive(Debug, Clone)]
pub struct Builtins {
    pub product: Reference,
    kinds: [(BuiltinKind, Reference); 9],
}

impl Builtins {
    pub fn register(table: &mut RefTable) -> Builtins {
        let mut class = |name: &str, base: Reference| -> Reference {
            table
                .register(Record {
                    name: InternedString::new(name),
                    owner: Reference::NONE,
                    loc: Location::default(),
                    payload: Payload::Class(ClassData {
                        base,
                        defaults: Vec::new(),
                    }),
                })
                .expect("built-in classes have no enclosing module")
        };
        let product = class("Product", Reference::NONE);
        let kinds = BuiltinKind::ALL.map(|k| (k, class(k.name(), product)));
        Builtins { product, kinds }
    }

    pub fn class_of(&self, kind: BuiltinKind) -> Reference {
        self.kinds
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| *r)
            .expect("all kinds are registered")
    }

    /// Resolve a built-in class by its source-level name.
    pub fn by_name(&self, name: &str) -> Option<Reference> {
        if name == "Product" {
            return Some(self.product);
        }
        self.kinds
            .iter()
            .find(|(k, _)| k.name() == name)
            .map(|(_, r)| *r)
    }

    /// The most specific built-in ancestor of `class`, or `None` if
    /// the chain never reaches the built-in hierarchy.
    pub fn builtin_kind(&self, table: &RefTable, class: Reference) -> Option<BuiltinKind> {
        let mut cur = class;
        while !cur.is_none() {
            if let Some(&(kind, _)) = self.kinds.iter().find(|(_, r)| *r == cur) {
                return Some(kind);
            }
            cur = match table.resolve(cur).and_then(|r| r.as_class()) {
                Some(c) => c.base,
                None => return None,
            };
        }
        None
    }
}

/// Polymorphic type test: true iff `sub` equals `ancestor` or
/// transitively extends it. Both must be class records.
pub fn isa(table: &RefTable, sub: Reference, ancestor: Reference) -> bool {
    let mut cur = sub;
    while !cur.is_none() {
        if cur == ancestor {
            return true;
        }
        cur = match table.resolve(cur).and_then(|r| r.as_class()) {
            Some(c) => c.base,
            None => return false,
        };
    }
    false
}

/// Kind check used when resolving typed arguments: the record behind
/// `id` must be a `VarDecl` whose type is a subclass of `ancestor`.
pub fn var_isa(table: &RefTable, id: Reference, ancestor: Reference) -> bool {
    match table.resolve(id) {
        Some(r) if r.kind() == RecordKind::VarDecl => {
            let ty = r.as_var().map(|v| v.ty).unwrap_or(Reference::NONE);
            isa(table, ty, ancestor)
        }
        _ => false,
    }
}
