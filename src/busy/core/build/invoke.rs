//! Materializes an [`Operation`] into something runnable: an external
//! command with platform-literal arguments, an internal file copy, or
//! nothing (markers). Response-file handling for Windows link lines
//! lives here too.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::core::build::operation::{OpKind, Operation, ParamKind};
use crate::core::session::{TargetOs, Toolchain};
use crate::util::{paths, BusyResult, ProcessBuilder};

pub enum Invocation {
    Process(ProcessBuilder),
    Copy { from: PathBuf, to: PathBuf },
    Marker,
}

/// Turn an operation into its invocation. Creates the output's parent
/// directory and, on Windows link/archive lines, writes the response
/// file next to the output.
pub fn prepare(
    op: &Operation,
    workdir: &Path,
    env: &[(String, String)],
) -> BusyResult<Invocation> {
    if op.op == OpKind::EnteringProduct {
        return Ok(Invocation::Marker);
    }

    if let Some(out) = op.outfile() {
        if let Some(parent) = Path::new(out).parent() {
            paths::create_dir_all(parent)?;
        }
    }

    if op.op == OpKind::Copy {
        let from = op.infile().unwrap_or_default();
        let to = op.outfile().unwrap_or_default();
        return Ok(Invocation::Copy {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
        });
    }

    let mut cmd = ProcessBuilder::new(&op.cmd);
    cmd.cwd(workdir);
    for (k, v) in env {
        cmd.env(k, v);
    }

    let msvc = op.toolchain == Toolchain::Msvc;
    match op.op {
        OpKind::Compile => {
            for flag in op.get_params(ParamKind::CFlag) {
                cmd.arg(flag);
            }
            for def in op.get_params(ParamKind::Define) {
                cmd.arg(format!("{}{}", if msvc { "/D" } else { "-D" }, def));
            }
            for dir in op.get_params(ParamKind::IncludeDir) {
                cmd.arg(format!("{}{}", if msvc { "/I" } else { "-I" }, dir));
            }
            let outfile = op.outfile().unwrap_or_default();
            let infile = op.infile().unwrap_or_default();
            if msvc {
                cmd.arg("/nologo").arg("/c");
                cmd.arg(format!("/Fo{}", outfile));
                cmd.arg(infile);
            } else {
                cmd.arg("-c").arg("-o").arg(outfile).arg(infile);
            }
        }
        OpKind::LinkExe | OpKind::LinkDll => {
            if msvc {
                cmd.arg("/nologo");
            }
            if op.op == OpKind::LinkDll {
                if msvc {
                    cmd.arg("/dll");
                } else if op.os == TargetOs::Macos {
                    cmd.arg("-dynamiclib");
                } else {
                    cmd.arg("-shared");
                }
            }
            for flag in op.get_params(ParamKind::LdFlag) {
                cmd.arg(flag);
            }
            add_link_inputs(&mut cmd, op, true)?;
            for file in op.get_params(ParamKind::LibFile) {
                cmd.arg(file);
            }
            for dir in op.get_params(ParamKind::LibDir) {
                if msvc {
                    cmd.arg(format!("/libpath:{}", dir));
                } else {
                    cmd.arg(format!("-L{}", dir));
                }
            }
            for name in op.get_params(ParamKind::LibName) {
                if msvc {
                    cmd.arg(format!("{}.lib", name));
                } else {
                    cmd.arg(format!("-l{}", name));
                }
            }
            for framework in op.get_params(ParamKind::Framework) {
                cmd.arg("-framework").arg(framework);
            }
            for def in op.get_params(ParamKind::DefFile) {
                if msvc {
                    cmd.arg(format!("/def:{}", def));
                } else {
                    cmd.arg(def);
                }
            }
            let outfile = op.outfile().unwrap_or_default();
            if msvc {
                cmd.arg(format!("/out:{}", outfile));
            } else {
                cmd.arg("-o").arg(outfile);
            }
        }
        OpKind::LinkLib => {
            let outfile = op.outfile().unwrap_or_default();
            match op.toolchain {
                Toolchain::Gcc => {
                    cmd.arg("r").arg(outfile);
                }
                Toolchain::Clang => {
                    if op.os.is_windows() {
                        cmd.arg("/nologo");
                        cmd.arg(format!("/out:{}", outfile));
                    } else {
                        cmd.arg("r").arg(outfile);
                    }
                }
                Toolchain::Msvc => {
                    cmd.arg("/nologo");
                    cmd.arg(format!("/out:{}", outfile));
                }
            }
            add_link_inputs(&mut cmd, op, false)?;
        }
        OpKind::RunMoc => {
            let infile = op.infile().unwrap_or_default();
            cmd.arg(infile);
            cmd.arg("-o").arg(op.outfile().unwrap_or_default());
            for def in op.get_params(ParamKind::Define) {
                cmd.arg("-D").arg(def);
            }
            // A sibling `<stem>_p.h` is a Qt private header; moc needs
            // to be told where it lives.
            let inpath = Path::new(infile);
            if matches!(
                inpath.extension().and_then(|e| e.to_str()),
                Some("h" | "hh" | "hpp" | "hxx" | "h++" | "hp" | "H" | "HPP")
            ) {
                if let (Some(dir), Some(stem)) = (inpath.parent(), inpath.file_stem()) {
                    let private = dir.join(format!("{}_p.h", stem.to_string_lossy()));
                    if private.is_file() {
                        cmd.arg("-p").arg(dir);
                        cmd.arg("-b")
                            .arg(format!("{}_p.h", stem.to_string_lossy()));
                    }
                }
            }
        }
        OpKind::RunRcc => {
            cmd.arg(op.infile().unwrap_or_default());
            cmd.arg("-o").arg(op.outfile().unwrap_or_default());
            if let Some(name) = op.get_param(ParamKind::Name) {
                cmd.arg("-name").arg(name);
            }
        }
        OpKind::RunUic => {
            cmd.arg(op.infile().unwrap_or_default());
            cmd.arg("-o").arg(op.outfile().unwrap_or_default());
        }
        OpKind::RunLua => {
            cmd.arg(op.infile().unwrap_or_default());
            for arg in op.get_params(ParamKind::Arg) {
                cmd.arg(arg);
            }
        }
        OpKind::Copy | OpKind::EnteringProduct => unreachable!("handled above"),
    }

    Ok(Invocation::Process(cmd))
}

/// Inputs of a link/archive line. On Windows targets the command line
/// limit (roughly 32k characters) makes inline inputs unreliable, so
/// they always go through a response file named after the output and
/// passed as `@file`. For msvc, a `.dll` input needs its import
/// library, so `.lib` is appended inside the response file too.
fn add_link_inputs(cmd: &mut ProcessBuilder, op: &Operation, dll_to_lib: bool) -> BusyResult<()> {
    let msvc = op.toolchain == Toolchain::Msvc;
    let fixup = |input: &str| -> String {
        if msvc && dll_to_lib && input.ends_with(".dll") {
            format!("{}.lib", input)
        } else {
            input.to_string()
        }
    };
    if op.os.is_windows() {
        let rsp = write_response_file(op, &fixup)?;
        cmd.arg(format!("@{}", rsp.display()));
    } else {
        for input in op.infiles() {
            cmd.arg(fixup(input));
        }
    }
    Ok(())
}

/// `<output stem>.rsp` next to the output: UTF-8, space-separated.
pub fn response_file_path(outfile: &Path) -> PathBuf {
    let stem = outfile
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    outfile.with_file_name(format!("{}.rsp", stem))
}

fn write_response_file(op: &Operation, fixup: &dyn Fn(&str) -> String) -> BusyResult<PathBuf> {
    let outfile = PathBuf::from(op.outfile().unwrap_or_default());
    let rsp = response_file_path(&outfile);
    let contents = op
        .infiles()
        .map(fixup)
        .collect::<Vec<_>>()
        .join(" ");
    paths::write(&rsp, contents.as_bytes())
        .with_context(|| "cannot write response file".to_string())?;
    Ok(rsp)
}

/// The internal copy tool: remove a stale destination, create its
/// directory, copy. Copying a file onto itself is a no-op.
pub fn run_copy(from: &Path, to: &Path) -> BusyResult<()> {
    if same_file::is_same_file(from, to).unwrap_or(false) {
        return Ok(());
    }
    if to.exists() {
        paths::remove_file(to)?;
    }
    if let Some(parent) = to.parent() {
        paths::create_dir_all(parent)?;
    }
    std::fs::copy(from, to)
        .map(|_| ())
        .with_context(|| format!("cannot copy `{}` to `{}`", from.display(), to.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn op(kind: OpKind, toolchain: Toolchain, os: TargetOs) -> Operation {
        Operation {
            op: kind,
            toolchain,
            os,
            group: 1,
            cmd: "tool".into(),
            params: Vec::new(),
        }
    }

    fn args_of(inv: Invocation) -> Vec<String> {
        match inv {
            Invocation::Process(p) => p
                .get_args()
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
            _ => panic!("expected a process"),
        }
    }

    #[test]
    fn compile_arguments_follow_the_toolchain_table() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("x/main.o");
        let mut gcc = op(OpKind::Compile, Toolchain::Gcc, TargetOs::Linux);
        gcc.push(ParamKind::Define, "X=1");
        gcc.push(ParamKind::IncludeDir, "/inc");
        gcc.push(ParamKind::CFlag, "-g");
        gcc.push(ParamKind::InFile, "/src/main.cpp");
        gcc.push(ParamKind::OutFile, out.display().to_string());
        let args = args_of(prepare(&gcc, tmp.path(), &[]).unwrap());
        assert_eq!(
            args,
            vec![
                "-g".to_string(),
                "-DX=1".to_string(),
                "-I/inc".to_string(),
                "-c".to_string(),
                "-o".to_string(),
                out.display().to_string(),
                "/src/main.cpp".to_string(),
            ]
        );
        assert!(out.parent().unwrap().is_dir(), "output directory created");

        let mut msvc = op(OpKind::Compile, Toolchain::Msvc, TargetOs::Win32);
        msvc.push(ParamKind::Define, "X=1");
        msvc.push(ParamKind::IncludeDir, "C:/inc");
        msvc.push(ParamKind::InFile, "main.cpp");
        msvc.push(ParamKind::OutFile, tmp.path().join("main.obj").display().to_string());
        let args = args_of(prepare(&msvc, tmp.path(), &[]).unwrap());
        assert_eq!(args[0], "/DX=1");
        assert_eq!(args[1], "/IC:/inc");
        assert_eq!(args[2], "/nologo");
        assert_eq!(args[3], "/c");
        assert!(args[4].starts_with("/Fo"));
    }

    #[test]
    fn windows_links_always_go_through_a_response_file() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("app.exe");
        let mut link = op(OpKind::LinkExe, Toolchain::Msvc, TargetOs::Win32);
        link.push(ParamKind::InFile, "a.obj");
        link.push(ParamKind::InFile, "b.obj");
        link.push(ParamKind::InFile, "dep.dll");
        link.push(ParamKind::LibName, "user32");
        link.push(ParamKind::OutFile, out.display().to_string());

        let args = args_of(prepare(&link, tmp.path(), &[]).unwrap());
        let rsp = response_file_path(&out);
        assert!(args.contains(&format!("@{}", rsp.display())));
        assert!(!args.iter().any(|a| a == "a.obj"), "inputs only in the rsp");
        assert!(args.contains(&"user32.lib".to_string()));
        assert_eq!(args.last().unwrap(), &format!("/out:{}", out.display()));

        let bytes = fs::read_to_string(&rsp).unwrap();
        assert_eq!(bytes, "a.obj b.obj dep.dll.lib");
    }

    #[test]
    fn unix_links_inline_their_inputs() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("app");
        let mut link = op(OpKind::LinkExe, Toolchain::Gcc, TargetOs::Linux);
        link.push(ParamKind::LdFlag, "-s");
        link.push(ParamKind::InFile, "a.o");
        link.push(ParamKind::LibDir, "/usr/lib");
        link.push(ParamKind::LibName, "m");
        link.push(ParamKind::OutFile, out.display().to_string());
        let args = args_of(prepare(&link, tmp.path(), &[]).unwrap());
        assert_eq!(
            args,
            vec![
                "-s".to_string(),
                "a.o".to_string(),
                "-L/usr/lib".to_string(),
                "-lm".to_string(),
                "-o".to_string(),
                out.display().to_string(),
            ]
        );
        assert!(!response_file_path(&out).exists());
    }

    #[test]
    fn archiver_verbs_differ_per_toolchain() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("libx.a");
        let mut ar = op(OpKind::LinkLib, Toolchain::Gcc, TargetOs::Linux);
        ar.push(ParamKind::InFile, "a.o");
        ar.push(ParamKind::OutFile, out.display().to_string());
        let args = args_of(prepare(&ar, tmp.path(), &[]).unwrap());
        assert_eq!(args, vec!["r".to_string(), out.display().to_string(), "a.o".to_string()]);

        let out = tmp.path().join("x.lib");
        let mut ar = op(OpKind::LinkLib, Toolchain::Msvc, TargetOs::Win32);
        ar.push(ParamKind::InFile, "a.obj");
        ar.push(ParamKind::OutFile, out.display().to_string());
        let args = args_of(prepare(&ar, tmp.path(), &[]).unwrap());
        assert_eq!(args[0], "/nologo");
        assert_eq!(args[1], format!("/out:{}", out.display()));
        assert!(args[2].starts_with('@'));
    }

    #[test]
    fn copy_is_internal_and_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("data.txt");
        fs::write(&from, "payload").unwrap();
        let to = tmp.path().join("out/data.txt");
        run_copy(&from, &to).unwrap();
        assert_eq!(fs::read_to_string(&to).unwrap(), "payload");
        // Overwrite works too.
        fs::write(&from, "payload2").unwrap();
        run_copy(&from, &to).unwrap();
        assert_eq!(fs::read_to_string(&to).unwrap(), "payload2");
        // Self-copy is a no-op, not an error.
        run_copy(&from, &from).unwrap();
    }
}
