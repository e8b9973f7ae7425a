use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::interning::InternedString;
use crate::core::product::ProductInst;
use crate::util::errors::Location;
use crate::util::{internal, BusyResult};

/// Stable non-zero id of a record in the [`RefTable`]. Assigned on
/// first registration and never reused or rebound; `NONE` (zero) is
/// reserved for "no owner".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub struct Reference(u32);

impl Reference {
    pub const NONE: Reference = Reference(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RecordKind {
    Module,
    ClassDecl,
    VarDecl,
}

/// Field assignment operator inside an initializer body.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AssignOp {
    /// `=`: scalar override, last one wins.
    Set,
    /// `+=`: set append, de-duplicated preserving first occurrence.
    Append,
}

/// A fully resolved field value. The evaluator resolves paths against
/// the declaring module's directory and identifiers to references, so
/// later phases never consult scope again.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Str(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Symbol(InternedString),
    Path(PathBuf),
    Object(Reference),
}

impl Value {
    pub fn describe(&self) -> String {
        match self {
            Value::Str(s) => format!("\"{}\"", s),
            Value::Int(i) => i.to_string(),
            Value::Real(r) => r.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Symbol(s) => format!("`{}", s),
            Value::Path(p) => p.display().to_string(),
            Value::Object(r) => r.to_string(),
        }
    }
}

/// One resolved body entry: `[public] .field op values`.
#[derive(Clone, Debug)]
pub struct Entry {
    pub field: InternedString,
    pub op: AssignOp,
    pub values: Vec<Value>,
    pub public: bool,
    pub loc: Location,
}

#[derive(Clone, Debug, Default)]
pub struct ModuleData {
    /// Absolute directory the module lives in.
    pub dir: PathBuf,
    /// The BUSY file the module was loaded from.
    pub file: PathBuf,
    /// Path relative to the build root, mirrored under the build dir.
    pub rdir: PathBuf,
    /// Declarations in source order.
    pub children: Vec<Reference>,
}

#[derive(Clone, Debug)]
pub struct ClassData {
    /// Direct base class; `NONE` only for the built-in root `Product`.
    pub base: Reference,
    /// Defaults applied to every instance before its own body.
    pub defaults: Vec<Entry>,
}

#[derive(Clone, Debug)]
pub struct VarData {
    /// Declared type, always a registered class.
    pub ty: Reference,
    /// Trailing `!`: part of the root build set.
    pub exported: bool,
    pub body: Vec<Entry>,
    /// Filled in by the config merger; read-only afterwards.
    pub inst: Option<ProductInst>,
}

#[derive(Clone, Debug)]
pub enum Payload {
    Module(ModuleData),
    Class(ClassData),
    Var(VarData),
}

#[derive(Clone, Debug)]
pub struct Record {
    pub name: InternedString,
    pub owner: Reference,
    pub loc: Location,
    pub payload: Payload,
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self.payload {
            Payload::Module(_) => RecordKind::Module,
            Payload::Class(_) => RecordKind::ClassDecl,
            Payload::Var(_) => RecordKind::VarDecl,
        }
    }

    pub fn as_module(&self) -> Option<&ModuleData> {
        match &self.payload {
            Payload::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassData> {
        match &self.payload {
            Payload::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&VarData> {
        match &self.payload {
            Payload::Var(v) => Some(v),
            _ => None,
        }
    }
}

/// Raised by [`RefTable::register`] when the enclosing module already
/// has a declaration of the same name.
#[derive(Debug, thiserror::Error)]
#[error("duplicate declaration of `{name}`")]
pub struct DuplicateName {
    pub name: InternedString,
    pub loc: Location,
    pub previous: Location,
}

/// The arena owning every evaluator-visible record. All cross-links
/// between records are [`Reference`]s resolved through this table; it
/// is mutated during evaluation and merging, then effectively frozen
/// for the rest of the session.
#[derive(Debug, Default)]
pub struct RefTable {
    // Index 0 is a placeholder so ids map directly to indices.
    records: Vec<Option<Record>>,
}

impl RefTable {
    pub fn new() -> RefTable {
        RefTable {
            records: vec![None],
        }
    }

    /// Assigns the next free id and inserts. If the owner is a module,
    /// the record also becomes its child, and its name must be unique
    /// among the module's children.
    pub fn register(&mut self, record: Record) -> Result<Reference, DuplicateName> {
        if !record.owner.is_none() {
            if let Some(module) = self.resolve(record.owner).and_then(|r| r.as_module()) {
                for &child in &module.children {
                    let prev = self.resolve(child).expect("child references are never stale");
                    if prev.name == record.name {
                        return Err(DuplicateName {
                            name: record.name,
                            loc: record.loc.clone(),
                            previous: prev.loc.clone(),
                        });
                    }
                }
            }
        }
        let id = Reference(self.records.len() as u32);
        let owner = record.owner;
        self.records.push(Some(record));
        if !owner.is_none() {
            if let Some(Record {
                payload: Payload::Module(m),
                ..
            }) = self.records[owner.0 as usize].as_mut()
            {
                m.children.push(id);
            }
        }
        Ok(id)
    }

    /// Constant-time lookup; `None` for the reserved zero reference.
    pub fn resolve(&self, id: Reference) -> Option<&Record> {
        if id.is_none() {
            return None;
        }
        self.records.get(id.0 as usize).and_then(|r| r.as_ref())
    }

    /// Like [`resolve`](Self::resolve) but a stale id is an internal
    /// error: it cannot happen in a well-formed session.
    pub fn get(&self, id: Reference) -> BusyResult<&Record> {
        self.resolve(id)
            .ok_or_else(|| internal(format!("stale reference {}", id)))
    }

    pub fn get_mut(&mut self, id: Reference) -> BusyResult<&mut Record> {
        if id.is_none() {
            return Err(internal("attempt to resolve the zero reference"));
        }
        self.records
            .get_mut(id.0 as usize)
            .and_then(|r| r.as_mut())
            .ok_or_else(|| internal(format!("stale reference {}", id)))
    }

    pub fn owner(&self, id: Reference) -> Reference {
        self.resolve(id).map(|r| r.owner).unwrap_or(Reference::NONE)
    }

    pub fn children(&self, id: Reference) -> &[Reference] {
        self.resolve(id)
            .and_then(|r| r.as_module())
            .map(|m| m.children.as_slice())
            .unwrap_or(&[])
    }

    /// Last initializer entry for a field of a declaration, if any.
    /// Later entries win for scalar fields, which is what callers of
    /// this accessor care about.
    pub fn field(&self, id: Reference, name: &str) -> Option<&Entry> {
        self.resolve(id)?
            .as_var()?
            .body
            .iter()
            .rev()
            .find(|e| &*e.field == name)
    }

    /// Looks up a declaration by name among a module's children.
    pub fn find_child(&self, module: Reference, name: &str) -> Option<Reference> {
        self.children(module)
            .iter()
            .copied()
            .find(|&c| self.resolve(c).map(|r| &*r.name == name).unwrap_or(false))
    }

    /// Iterate all registered references in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (Reference, &Record)> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (Reference(i as u32), r)))
    }

    pub fn len(&self) -> usize {
        self.records.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(name: &str) -> Record {
        Record {
            name: InternedString::new(name),
            owner: Reference::NONE,
            loc: Location::default(),
            payload: Payload::Module(ModuleData::default()),
        }
    }

    fn var(name: &str, owner: Reference) -> Record {
        Record {
            name: InternedString::new(name),
            owner,
            loc: Location::default(),
            payload: Payload::Var(VarData {
                ty: Reference::NONE,
                exported: false,
                body: Vec::new(),
                inst: None,
            }),
        }
    }

    #[test]
    fn ids_are_stable_and_resolve_to_the_registered_record() {
        let mut table = RefTable::new();
        let root = table.register(module("root")).unwrap();
        let a = table.register(var("a", root)).unwrap();
        let b = table.register(var("b", root)).unwrap();
        assert_ne!(a, b);
        assert_eq!(&*table.get(a).unwrap().name, "a");
        assert_eq!(&*table.get(b).unwrap().name, "b");
        assert_eq!(table.owner(a), root);
        assert_eq!(table.children(root), &[a, b]);
    }

    #[test]
    fn duplicate_names_within_a_module_are_rejected() {
        let mut table = RefTable::new();
        let root = table.register(module("root")).unwrap();
        table.register(var("x", root)).unwrap();
        let err = table.register(var("x", root)).unwrap_err();
        assert_eq!(&*err.name, "x");
    }

    #[test]
    fn zero_and_stale_references_do_not_resolve() {
        let table = RefTable::new();
        assert!(table.resolve(Reference::NONE).is_none());
        assert!(table.get(Reference(99)).is_err());
    }

    #[test]
    fn field_returns_the_last_entry_for_a_name() {
        let mut table = RefTable::new();
        let root = table.register(module("root")).unwrap();
        let mut decl = var("a", root);
        let entry = |val: i64| Entry {
            field: InternedString::new("priority"),
            op: AssignOp::Set,
            values: vec![Value::Int(val)],
            public: false,
            loc: Location::default(),
        };
        match &mut decl.payload {
            Payload::Var(v) => v.body = vec![entry(1), entry(2)],
            _ => unreachable!(),
        }
        let a = table.register(decl).unwrap();
        let found = table.field(a, "priority").unwrap();
        assert_eq!(found.values, vec![Value::Int(2)]);
        assert!(table.field(a, "missing").is_none());
    }

    #[test]
    fn same_name_in_different_modules_is_fine() {
        let mut table = RefTable::new();
        let m1 = table.register(module("m1")).unwrap();
        let m2 = table.register(module("m2")).unwrap();
        table.register(var("x", m1)).unwrap();
        table.register(var("x", m2)).unwrap();
    }
}
