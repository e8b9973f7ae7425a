use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::bail;
use serde::Serialize;

use crate::core::classes::{Builtins, isa};
use crate::core::refs::{RefTable, Reference};
use crate::syntax::params::ParamOverride;
use crate::util::errors::ErrorList;
use crate::util::BusyResult;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Toolchain {
    Gcc,
    Clang,
    Msvc,
}

impl Toolchain {
    pub fn as_str(self) -> &'static str {
        match self {
            Toolchain::Gcc => "gcc",
            Toolchain::Clang => "clang",
            Toolchain::Msvc => "msvc",
        }
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Toolchain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> BusyResult<Toolchain> {
        match s {
            "gcc" => Ok(Toolchain::Gcc),
            "clang" => Ok(Toolchain::Clang),
            "msvc" => Ok(Toolchain::Msvc),
            other => bail!("toolchain not supported: {}", other),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    Linux,
    Macos,
    Win32,
    Unix,
    Freebsd,
    Vxworks,
}

impl TargetOs {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetOs::Linux => "linux",
            TargetOs::Macos => "macos",
            TargetOs::Win32 => "win32",
            TargetOs::Unix => "unix",
            TargetOs::Freebsd => "freebsd",
            TargetOs::Vxworks => "vxworks",
        }
    }

    pub fn is_windows(self) -> bool {
        self == TargetOs::Win32
    }

    pub fn host() -> TargetOs {
        if cfg!(windows) {
            TargetOs::Win32
        } else if cfg!(target_os = "macos") {
            TargetOs::Macos
        } else if cfg!(target_os = "freebsd") {
            TargetOs::Freebsd
        } else if cfg!(target_os = "linux") {
            TargetOs::Linux
        } else {
            TargetOs::Unix
        }
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetOs {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> BusyResult<TargetOs> {
        match s {
            "linux" => Ok(TargetOs::Linux),
            "macos" => Ok(TargetOs::Macos),
            "win32" | "windows" => Ok(TargetOs::Win32),
            "unix" => Ok(TargetOs::Unix),
            "freebsd" => Ok(TargetOs::Freebsd),
            "vxworks" => Ok(TargetOs::Vxworks),
            other => bail!("operating system not supported: {}", other),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cpu {
    X86,
    Arm,
    Ppc,
    Mips,
    Ia64,
}

impl Cpu {
    pub fn as_str(self) -> &'static str {
        match self {
            Cpu::X86 => "x86",
            Cpu::Arm => "arm",
            Cpu::Ppc => "ppc",
            Cpu::Mips => "mips",
            Cpu::Ia64 => "ia64",
        }
    }
}

impl FromStr for Cpu {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> BusyResult<Cpu> {
        match s {
            "x86" => Ok(Cpu::X86),
            "arm" => Ok(Cpu::Arm),
            "ppc" => Ok(Cpu::Ppc),
            "mips" => Ok(Cpu::Mips),
            "ia64" => Ok(Cpu::Ia64),
            other => bail!("architecture not supported: {}", other),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum BuildMode {
    Debug,
    Optimized,
    Nonoptimized,
}

impl FromStr for BuildMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> BusyResult<BuildMode> {
        match s {
            "debug" => Ok(BuildMode::Debug),
            "optimized" => Ok(BuildMode::Optimized),
            "nonoptimized" => Ok(BuildMode::Nonoptimized),
            other => bail!("build mode not supported: {}", other),
        }
    }
}

/// Everything a build session is parameterized by. There are no
/// process-wide settings; all of this is threaded explicitly.
#[derive(Clone, Debug)]
pub struct BuildParams {
    pub root_source_dir: PathBuf,
    pub root_build_dir: PathBuf,
    pub build_mode: BuildMode,
    pub toolchain: Toolchain,
    /// Directory the toolchain binaries live in; empty means PATH.
    pub toolchain_dir: PathBuf,
    /// Binary name prefix, e.g. `arm-none-eabi-` for a cross gcc.
    pub toolchain_prefix: String,
    pub os: TargetOs,
    pub cpu: Cpu,
    pub wordsize: u16,
    /// Field overrides from the parameter mini-language.
    pub params: Vec<ParamOverride>,
    /// Products to build; empty means every exported product.
    pub targets: Vec<String>,
    /// Extra environment for spawned tools.
    pub env: Vec<(String, String)>,
}

impl BuildParams {
    pub fn new(root_source_dir: impl Into<PathBuf>, root_build_dir: impl Into<PathBuf>) -> BuildParams {
        BuildParams {
            root_source_dir: root_source_dir.into(),
            root_build_dir: root_build_dir.into(),
            build_mode: BuildMode::Debug,
            toolchain: Toolchain::Gcc,
            toolchain_dir: PathBuf::new(),
            toolchain_prefix: String::new(),
            os: TargetOs::host(),
            cpu: Cpu::X86,
            wordsize: 64,
            params: Vec::new(),
            targets: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn validate(&self) -> BusyResult<()> {
        match self.wordsize {
            16 | 32 | 64 | 128 => {}
            other => bail!("word width not supported: {}", other),
        }
        // macOS frameworks and msvc def files only meet valid hosts
        // later; the one combination rejected up front is msvc off
        // Windows, which has no archiver/linker convention here.
        if self.toolchain == Toolchain::Msvc && !self.os.is_windows() {
            bail!(
                "config error: toolchain msvc is not supported on {}",
                self.os
            );
        }
        Ok(())
    }
}

/// Split a full compiler command into the `(dir, prefix)` pair the
/// session carries, stripping a trailing `.exe` and the well-known
/// tool name: `/opt/cross/bin/arm-none-eabi-gcc` becomes
/// `("/opt/cross/bin", "arm-none-eabi-")`.
pub fn split_compiler_command(command: &Path, toolchain: Toolchain) -> (PathBuf, String) {
    let dir = command
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut base = command
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(stripped) = base.strip_suffix(".exe") {
        base = stripped.to_string();
    }
    let tool = match toolchain {
        Toolchain::Gcc => "gcc",
        Toolchain::Clang => "clang",
        Toolchain::Msvc => "cl",
    };
    if let Some(stripped) = base.strip_suffix(tool) {
        base = stripped.to_string();
    }
    (dir, base)
}

/// One evaluate-build session: the parameters, the record arena, the
/// built-in class hierarchy and the accumulated diagnostics. Created
/// empty, populated by the evaluator, frozen during the build.
#[derive(Debug)]
pub struct Session {
    pub params: BuildParams,
    pub table: RefTable,
    pub builtins: Builtins,
    pub errors: ErrorList,
    /// Root of the module tree; `NONE` until evaluation succeeds.
    pub root: Reference,
}

impl Session {
    pub fn new(params: BuildParams) -> Session {
        let mut table = RefTable::new();
        let builtins = Builtins::register(&mut table);
        Session {
            params,
            table,
            builtins,
            errors: ErrorList::new(),
            root: Reference::NONE,
        }
    }

    /// All product declarations (not configs), depth-first over the
    /// module tree, declaration order within each module.
    pub fn all_products(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        self.walk_products(self.root, &mut out);
        out
    }

    fn walk_products(&self, module: Reference, out: &mut Vec<Reference>) {
        for &child in self.table.children(module) {
            let Some(rec) = self.table.resolve(child) else {
                continue;
            };
            match &rec.payload {
                crate::core::refs::Payload::Module(_) => self.walk_products(child, out),
                crate::core::refs::Payload::Var(v) => {
                    if isa(&self.table, v.ty, self.builtins.product)
                        && self
                            .builtins
                            .builtin_kind(&self.table, v.ty)
                            .map(|k| k.is_product())
                            .unwrap_or(false)
                    {
                        out.push(child);
                    }
                }
                _ => {}
            }
        }
    }

    /// Products marked with a trailing `!`, i.e. the root build set.
    pub fn exported_products(&self) -> Vec<Reference> {
        self.all_products()
            .into_iter()
            .filter(|&p| {
                self.table
                    .resolve(p)
                    .and_then(|r| r.as_var())
                    .map(|v| v.exported)
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Find a product by plain name anywhere in the module tree (the
    /// target-list namespace).
    pub fn find_product(&self, name: &str) -> Option<Reference> {
        self.all_products()
            .into_iter()
            .find(|&p| self.table.resolve(p).map(|r| &*r.name == name).unwrap_or(false))
    }

    /// Dotted display path of a declaration, `module.sub.name`.
    pub fn decl_path(&self, mut id: Reference) -> String {
        let mut parts = Vec::new();
        while !id.is_none() {
            if let Some(rec) = self.table.resolve(id) {
                parts.push(rec.name.as_str());
                id = rec.owner;
            } else {
                break;
            }
        }
        parts.reverse();
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_inputs_are_config_errors() {
        assert!("tcc".parse::<Toolchain>().is_err());
        assert!("beos".parse::<TargetOs>().is_err());
        let mut p = BuildParams::new("/src", "/build");
        p.wordsize = 48;
        assert!(p.validate().is_err());
        p.wordsize = 64;
        p.toolchain = Toolchain::Msvc;
        p.os = TargetOs::Linux;
        assert!(p.validate().is_err());
        p.os = TargetOs::Win32;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn compiler_command_splits_into_dir_and_prefix() {
        let (dir, prefix) = split_compiler_command(
            Path::new("/opt/cross/bin/arm-none-eabi-gcc"),
            Toolchain::Gcc,
        );
        assert_eq!(dir, PathBuf::from("/opt/cross/bin"));
        assert_eq!(prefix, "arm-none-eabi-");

        let (_, prefix) =
            split_compiler_command(Path::new("C:/tools/cl.exe"), Toolchain::Msvc);
        assert_eq!(prefix, "");
    }
}
