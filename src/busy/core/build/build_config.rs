use std::path::PathBuf;
use std::thread;

use anyhow::bail;

use crate::core::session::{BuildParams, Toolchain};
use crate::util::BusyResult;

/// How operation results are presented to the caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MessageFormat {
    Human,
    Json,
}

/// Configuration of one build run, independent of the evaluated
/// description.
#[derive(Debug)]
pub struct BuildConfig {
    /// Worker count; defaults to the available cores.
    pub jobs: u32,
    /// Stop dispatching after the first failed operation.
    pub stop_on_error: bool,
    /// Consult the header dependency snapshot in freshness checks.
    pub track_headers: bool,
    /// Generate and report operations without running anything.
    pub dry_run: bool,
    pub message_format: MessageFormat,
}

impl BuildConfig {
    pub fn new(jobs: Option<u32>) -> BusyResult<BuildConfig> {
        if jobs == Some(0) {
            bail!("jobs must be at least 1");
        }
        let default_jobs = thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Ok(BuildConfig {
            jobs: jobs.unwrap_or(default_jobs),
            stop_on_error: false,
            track_headers: false,
            dry_run: false,
            message_format: MessageFormat::Human,
        })
    }
}

/// Concrete tool paths for a session's toolchain, assembled from the
/// install directory and binary prefix.
#[derive(Clone, Debug)]
pub struct ToolPaths {
    dir: PathBuf,
    prefix: String,
    toolchain: Toolchain,
}

impl ToolPaths {
    pub fn new(params: &BuildParams) -> ToolPaths {
        ToolPaths {
            dir: params.toolchain_dir.clone(),
            prefix: params.toolchain_prefix.clone(),
            toolchain: params.toolchain,
        }
    }

    fn tool(&self, name: &str) -> String {
        let file = format!("{}{}", self.prefix, name);
        if self.dir.as_os_str().is_empty() {
            file
        } else {
            self.dir.join(file).display().to_string()
        }
    }

    /// Compiler driver for a C translation unit.
    pub fn cc(&self) -> String {
        match self.toolchain {
            Toolchain::Gcc => self.tool("gcc"),
            Toolchain::Clang => self.tool("clang"),
            Toolchain::Msvc => self.tool("cl"),
        }
    }

    /// Compiler driver for a C++ translation unit; also the linker.
    pub fn cxx(&self) -> String {
        match self.toolchain {
            Toolchain::Gcc => self.tool("g++"),
            Toolchain::Clang => self.tool("clang++"),
            Toolchain::Msvc => self.tool("cl"),
        }
    }

    pub fn linker(&self) -> String {
        match self.toolchain {
            Toolchain::Gcc => self.tool("g++"),
            Toolchain::Clang => self.tool("clang++"),
            Toolchain::Msvc => self.tool("link"),
        }
    }

    pub fn archiver(&self) -> String {
        match self.toolchain {
            Toolchain::Gcc => self.tool("ar"),
            Toolchain::Clang => self.tool("ar"),
            Toolchain::Msvc => self.tool("lib"),
        }
    }

    // The Qt code generators and the script runner are not part of
    // the toolchain prefix scheme; they resolve from the install dir
    // or PATH under their plain names.
    pub fn moc(&self) -> String {
        self.plain("moc")
    }

    pub fn rcc(&self) -> String {
        self.plain("rcc")
    }

    pub fn uic(&self) -> String {
        self.plain("uic")
    }

    pub fn lua(&self) -> String {
        self.plain("lua")
    }

    fn plain(&self, name: &str) -> String {
        if self.dir.as_os_str().is_empty() {
            name.to_string()
        } else {
            self.dir.join(name).display().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::BuildParams;

    #[test]
    fn zero_jobs_is_rejected() {
        assert!(BuildConfig::new(Some(0)).is_err());
        assert!(BuildConfig::new(Some(4)).unwrap().jobs == 4);
        assert!(BuildConfig::new(None).unwrap().jobs >= 1);
    }

    #[test]
    fn tools_use_prefix_and_dir() {
        let mut params = BuildParams::new("/src", "/build");
        params.toolchain = Toolchain::Gcc;
        params.toolchain_prefix = "arm-none-eabi-".into();
        params.toolchain_dir = PathBuf::from("/opt/cross/bin");
        let tools = ToolPaths::new(&params);
        assert_eq!(tools.cxx(), "/opt/cross/bin/arm-none-eabi-g++");
        assert_eq!(tools.archiver(), "/opt/cross/bin/arm-none-eabi-ar");
        assert_eq!(tools.moc(), "/opt/cross/bin/moc");

        params.toolchain_dir = PathBuf::new();
        params.toolchain_prefix = String::new();
        let tools = ToolPaths::new(&params);
        assert_eq!(tools.cc(), "gcc");
        assert_eq!(tools.lua(), "lua");
    }
}
