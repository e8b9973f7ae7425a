pub use self::classes::{isa, BuiltinKind, Builtins};
pub use self::interning::InternedString;
pub use self::product::{FieldBag, ProductInst};
pub use self::refs::{Record, RecordKind, RefTable, Reference};
pub use self::session::{BuildMode, BuildParams, Cpu, Session, TargetOs, Toolchain};
pub use self::shell::{Shell, Verbosity};

pub mod build;
pub mod classes;
pub mod eval;
pub mod interning;
pub mod module;
pub mod product;
pub mod refs;
pub mod session;
pub mod shell;
