use serde::Serialize;

use crate::core::session::{TargetOs, Toolchain};

/// What a single build operation does. `EnteringProduct` is a marker
/// carrying a display label; everything else runs a tool or an
/// internal action.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum OpKind {
    Compile,
    LinkExe,
    LinkDll,
    LinkLib,
    RunMoc,
    RunRcc,
    RunUic,
    RunLua,
    Copy,
    EnteringProduct,
}

impl OpKind {
    pub fn is_marker(self) -> bool {
        self == OpKind::EnteringProduct
    }

    pub fn is_link(self) -> bool {
        matches!(self, OpKind::LinkExe | OpKind::LinkDll | OpKind::LinkLib)
    }

    pub fn describe(self) -> &'static str {
        match self {
            OpKind::Compile => "COMPILE",
            OpKind::LinkExe | OpKind::LinkDll | OpKind::LinkLib => "LINK",
            OpKind::RunMoc => "MOC",
            OpKind::RunRcc => "RCC",
            OpKind::RunUic => "UIC",
            OpKind::RunLua => "LUA",
            OpKind::Copy => "COPY",
            OpKind::EnteringProduct => "ENTER",
        }
    }
}

/// Typed slot of an operation parameter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    InFile,
    OutFile,
    IncludeDir,
    LibDir,
    LibName,
    LibFile,
    Framework,
    Define,
    CFlag,
    LdFlag,
    Arg,
    Name,
    DefFile,
}

#[derive(Clone, Debug, Serialize)]
pub struct Parameter {
    pub kind: ParamKind,
    pub value: String,
}

/// One unit of work emitted by the command generator and consumed by
/// the dispatcher. Parameters are ordered; the argument materializer
/// walks them per toolchain.
#[derive(Clone, Debug, Serialize)]
pub struct Operation {
    pub op: OpKind,
    pub toolchain: Toolchain,
    pub os: TargetOs,
    /// Dispatcher barrier index; an operation's group is strictly
    /// greater than the group of every operation whose output it
    /// consumes.
    pub group: u32,
    /// Tool to run, or the display label for `EnteringProduct`.
    pub cmd: String,
    pub params: Vec<Parameter>,
}

impl Operation {
    pub fn push(&mut self, kind: ParamKind, value: impl Into<String>) {
        self.params.push(Parameter {
            kind,
            value: value.into(),
        });
    }

    /// First parameter of the given kind, if any.
    pub fn get_param(&self, kind: ParamKind) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.kind == kind)
            .map(|p| p.value.as_str())
    }

    /// All parameters of the given kind, in order.
    pub fn get_params(&self, kind: ParamKind) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(move |p| p.kind == kind)
            .map(|p| p.value.as_str())
    }

    pub fn outfile(&self) -> Option<&str> {
        self.get_param(ParamKind::OutFile)
    }

    pub fn infile(&self) -> Option<&str> {
        self.get_param(ParamKind::InFile)
    }

    pub fn infiles(&self) -> impl Iterator<Item = &str> {
        self.get_params(ParamKind::InFile)
    }
}
