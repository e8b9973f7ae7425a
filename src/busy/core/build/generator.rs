use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::build::build_config::ToolPaths;
use crate::core::build::operation::{OpKind, Operation, ParamKind, Parameter};
use crate::core::classes::BuiltinKind;
use crate::core::product::ProductInst;
use crate::core::refs::Reference;
use crate::core::session::{BuildMode, Session, TargetOs, Toolchain};
use crate::util::errors::ErrorKind;
use crate::util::{internal, BusyResult};

/// The generator's output: the grouped operation list plus every
/// output path it named (consumed by `busy clean`).
#[derive(Debug, Default)]
pub struct CommandList {
    pub ops: Vec<Operation>,
    pub outputs: Vec<PathBuf>,
}

/// Walk the requested products in dependency order and emit the
/// operation list. Products with recorded errors are skipped; new
/// problems (unknown targets, unsupported combinations) accumulate on
/// the session.
pub fn generate(session: &mut Session) -> BusyResult<CommandList> {
    let requested = requested_products(session)?;
    let order = dependency_order(session, &requested)?;
    let tools = ToolPaths::new(&session.params);

    let mut gen = Generator {
        session,
        tools,
        list: CommandList::default(),
        emitted: HashMap::new(),
    };
    for (product, level) in &order {
        gen.emit_product(*product, *level)?;
    }

    let mut list = gen.list;
    // Emission is per-product; the dispatcher wants one list in
    // non-decreasing group order. The sort is stable, so within a
    // group the per-product order survives.
    list.ops.sort_by_key(|op| op.group);
    Ok(list)
}

fn requested_products(session: &mut Session) -> BusyResult<Vec<Reference>> {
    if session.params.targets.is_empty() {
        return Ok(session.exported_products());
    }
    let targets = session.params.targets.clone();
    let mut out = Vec::new();
    for name in &targets {
        match session.find_product(name) {
            Some(p) => out.push(p),
            None => {
                session.errors.error(
                    ErrorKind::Resolve,
                    None,
                    format!("unknown target `{}`", name),
                );
            }
        }
    }
    Ok(out)
}

/// Depth-first dependency closure with per-product levels: a product
/// sits one level above the highest of its dependencies, and its
/// operations occupy the three group slots `3*level + {0,1,2}`.
/// Cycles were reported during merging; here the back edge is simply
/// not followed.
fn dependency_order(
    session: &Session,
    requested: &[Reference],
) -> BusyResult<Vec<(Reference, u32)>> {
    fn visit(
        session: &Session,
        product: Reference,
        visiting: &mut Vec<Reference>,
        levels: &mut HashMap<Reference, u32>,
        order: &mut Vec<(Reference, u32)>,
    ) -> BusyResult<u32> {
        if let Some(&l) = levels.get(&product) {
            return Ok(l);
        }
        if visiting.contains(&product) {
            // Reported as a Resolve error by the merger.
            return Ok(0);
        }
        visiting.push(product);
        let inst = instance(session, product)?;
        let mut level = 1;
        for dep in &inst.deps {
            let dl = visit(session, *dep, visiting, levels, order)?;
            level = level.max(dl + 1);
        }
        visiting.pop();
        levels.insert(product, level);
        order.push((product, level));
        Ok(level)
    }

    let mut visiting = Vec::new();
    let mut levels = HashMap::new();
    let mut order = Vec::new();
    for &p in requested {
        visit(session, p, &mut visiting, &mut levels, &mut order)?;
    }
    Ok(order)
}

fn instance(session: &Session, product: Reference) -> BusyResult<ProductInst> {
    session
        .table
        .get(product)?
        .as_var()
        .and_then(|v| v.inst.clone())
        .ok_or_else(|| internal(format!("product {} has no merged instance", product)))
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum SourceClass {
    C,
    Cxx,
    Header,
    Ui,
    Qrc,
    Other,
}

fn classify(path: &Path) -> SourceClass {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    match ext.as_str() {
        "c" | "m" => SourceClass::C,
        "cpp" | "cc" | "cxx" | "c++" | "C" | "mm" => SourceClass::Cxx,
        "h" | "hh" | "hpp" | "hxx" | "h++" | "hp" | "H" | "HPP" => SourceClass::Header,
        "ui" => SourceClass::Ui,
        "qrc" => SourceClass::Qrc,
        _ => SourceClass::Other,
    }
}

/// A header feeds moc when it declares a Qt meta object.
fn wants_moc(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .map(|text| text.contains("Q_OBJECT"))
        .unwrap_or(false)
}

/// What an already emitted product offers its dependents.
#[derive(Debug, Default)]
struct Emitted {
    /// Compile outputs, for `use_deps` object folding.
    objects: Vec<PathBuf>,
    /// Final artifact fed into dependent link lines.
    artifact: Option<PathBuf>,
    /// Generated translation units dependents must compile (moc/rcc).
    gen_sources: Vec<PathBuf>,
    /// Directory with generated headers dependents include (uic).
    include_export: Option<PathBuf>,
}

struct Generator<'a> {
    session: &'a mut Session,
    tools: ToolPaths,
    list: CommandList,
    emitted: HashMap<Reference, Emitted>,
}

impl<'a> Generator<'a> {
    fn emit_product(&mut self, product: Reference, level: u32) -> BusyResult<()> {
        let inst = instance(self.session, product)?;
        if inst.errored {
            log::debug!("skipping errored product {}", self.session.decl_path(product));
            return Ok(());
        }
        let rec = self.session.table.get(product)?;
        let decl_name = rec.name.to_string();
        let owner = rec.owner;
        let rdir = self
            .session
            .table
            .resolve(owner)
            .and_then(|r| r.as_module())
            .map(|m| m.rdir.clone())
            .unwrap_or_default();
        let artifact_name = inst.fields.name.clone().unwrap_or_else(|| decl_name.clone());
        let product_dir = self
            .session
            .params
            .root_build_dir
            .join(&rdir)
            .join(&decl_name);
        let group = level * 3;

        self.marker(group, &decl_name);

        match inst.kind {
            BuiltinKind::Executable | BuiltinKind::Library | BuiltinKind::Dll => {
                self.emit_compiled(product, &inst, &product_dir, &artifact_name, group)?;
            }
            BuiltinKind::Copy => self.emit_copy(&inst, &product_dir, group),
            BuiltinKind::Script => self.emit_script(&inst, group),
            BuiltinKind::Moc => {
                let mut emitted = Emitted::default();
                let mut taken = Vec::new();
                for src in &inst.fields.sources {
                    let out = unique_output(&product_dir, "moc_", src, "cpp", &mut taken);
                    let mut op = self.op(OpKind::RunMoc, group, self.tools.moc());
                    for def in &inst.fields.defines {
                        op.push(ParamKind::Define, def);
                    }
                    op.push(ParamKind::InFile, src.display().to_string());
                    op.push(ParamKind::OutFile, out.display().to_string());
                    self.push_op(op);
                    emitted.gen_sources.push(out);
                }
                self.emitted.insert(product, emitted);
            }
            BuiltinKind::Rcc => {
                let mut emitted = Emitted::default();
                let mut taken = Vec::new();
                for src in &inst.fields.sources {
                    let out = unique_output(&product_dir, "qrc_", src, "cpp", &mut taken);
                    let mut op = self.op(OpKind::RunRcc, group, self.tools.rcc());
                    op.push(ParamKind::InFile, src.display().to_string());
                    op.push(ParamKind::OutFile, out.display().to_string());
                    op.push(ParamKind::Name, stem_of(src));
                    self.push_op(op);
                    emitted.gen_sources.push(out);
                }
                self.emitted.insert(product, emitted);
            }
            BuiltinKind::Uic => {
                let mut taken = Vec::new();
                for src in &inst.fields.sources {
                    let out = unique_output(&product_dir, "ui_", src, "h", &mut taken);
                    let mut op = self.op(OpKind::RunUic, group, self.tools.uic());
                    op.push(ParamKind::InFile, src.display().to_string());
                    op.push(ParamKind::OutFile, out.display().to_string());
                    self.push_op(op);
                }
                self.emitted.insert(
                    product,
                    Emitted {
                        include_export: Some(product_dir.clone()),
                        ..Emitted::default()
                    },
                );
            }
            BuiltinKind::Config => {
                return Err(internal("config objects never reach the generator"));
            }
        }
        Ok(())
    }

    fn emit_compiled(
        &mut self,
        product: Reference,
        inst: &ProductInst,
        product_dir: &Path,
        artifact_name: &str,
        group: u32,
    ) -> BusyResult<()> {
        let toolchain = self.session.params.toolchain;
        let os = self.session.params.os;

        // Sources that exist as files, plus what the code generators
        // of this product and of Moc/Rcc dependencies produce.
        let mut compile_units: Vec<(PathBuf, SourceClass)> = Vec::new();
        let mut include_dirs: Vec<PathBuf> =
            inst.fields.include_dirs.iter().cloned().collect();
        let mut needs_gen_dir = false;
        let mut taken: Vec<PathBuf> = Vec::new();

        for src in &inst.fields.sources {
            match classify(src) {
                SourceClass::C => compile_units.push((src.clone(), SourceClass::C)),
                SourceClass::Cxx => compile_units.push((src.clone(), SourceClass::Cxx)),
                SourceClass::Ui => {
                    let out = unique_output(product_dir, "ui_", src, "h", &mut taken);
                    let mut op = self.op(OpKind::RunUic, group, self.tools.uic());
                    op.push(ParamKind::InFile, src.display().to_string());
                    op.push(ParamKind::OutFile, out.display().to_string());
                    self.push_op(op);
                    needs_gen_dir = true;
                }
                SourceClass::Qrc => {
                    let out = unique_output(product_dir, "qrc_", src, "cpp", &mut taken);
                    let mut op = self.op(OpKind::RunRcc, group, self.tools.rcc());
                    op.push(ParamKind::InFile, src.display().to_string());
                    op.push(ParamKind::OutFile, out.display().to_string());
                    op.push(ParamKind::Name, stem_of(src));
                    self.push_op(op);
                    compile_units.push((out, SourceClass::Cxx));
                }
                SourceClass::Header => {
                    if wants_moc(src) {
                        let out = unique_output(product_dir, "moc_", src, "cpp", &mut taken);
                        let mut op = self.op(OpKind::RunMoc, group, self.tools.moc());
                        for def in &inst.fields.defines {
                            op.push(ParamKind::Define, def);
                        }
                        op.push(ParamKind::InFile, src.display().to_string());
                        op.push(ParamKind::OutFile, out.display().to_string());
                        self.push_op(op);
                        compile_units.push((out, SourceClass::Cxx));
                    }
                }
                SourceClass::Other => {}
            }
        }

        // Contributions from dependencies.
        let mut link_extra: Vec<PathBuf> = Vec::new();
        let fold_objects = inst.use_deps.iter().any(|s| s.as_str() == "objects");
        for dep in &inst.deps {
            if let Some(em) = self.emitted.get(dep) {
                for gen in &em.gen_sources {
                    compile_units.push((gen.clone(), SourceClass::Cxx));
                }
                if let Some(dir) = &em.include_export {
                    include_dirs.push(dir.clone());
                }
                if let Some(artifact) = &em.artifact {
                    link_extra.push(artifact.clone());
                }
                if fold_objects {
                    link_extra.extend(em.objects.iter().cloned());
                }
            }
        }
        if needs_gen_dir {
            include_dirs.push(product_dir.to_path_buf());
        }

        // Compiles.
        let mut objects = Vec::new();
        let obj_ext = if toolchain == Toolchain::Msvc { "obj" } else { "o" };
        let mut obj_taken: Vec<PathBuf> = Vec::new();
        for (src, class) in &compile_units {
            let out = unique_output(product_dir, "", src, obj_ext, &mut obj_taken);
            let cmd = match class {
                SourceClass::C => self.tools.cc(),
                _ => self.tools.cxx(),
            };
            let mut op = self.op(OpKind::Compile, group + 1, cmd);
            for dir in &include_dirs {
                op.push(ParamKind::IncludeDir, dir.display().to_string());
            }
            for def in &inst.fields.defines {
                op.push(ParamKind::Define, def);
            }
            for flag in self.mode_flags() {
                op.push(ParamKind::CFlag, flag);
            }
            for flag in &inst.fields.cflags {
                op.push(ParamKind::CFlag, flag);
            }
            if *class == SourceClass::Cxx {
                for flag in &inst.fields.cxxflags {
                    op.push(ParamKind::CFlag, flag);
                }
            }
            op.push(ParamKind::InFile, src.display().to_string());
            op.push(ParamKind::OutFile, out.display().to_string());
            self.push_op(op);
            objects.push(out);
        }

        // Link or archive.
        let mut emitted = Emitted {
            objects: objects.clone(),
            ..Emitted::default()
        };
        let linkable = !objects.is_empty() || !link_extra.is_empty();
        match inst.kind {
            BuiltinKind::Library if linkable => {
                let artifact = product_dir.join(static_lib_name(artifact_name, toolchain, os));
                let mut op = self.op(OpKind::LinkLib, group + 2, self.tools.archiver());
                for obj in &objects {
                    op.push(ParamKind::InFile, obj.display().to_string());
                }
                op.push(ParamKind::OutFile, artifact.display().to_string());
                self.push_op(op);
                emitted.artifact = Some(artifact);
            }
            BuiltinKind::Executable | BuiltinKind::Dll if linkable => {
                let (kind, artifact) = if inst.kind == BuiltinKind::Dll {
                    (
                        OpKind::LinkDll,
                        product_dir.join(shared_lib_name(artifact_name, os)),
                    )
                } else {
                    (
                        OpKind::LinkExe,
                        product_dir.join(exe_name(artifact_name, os)),
                    )
                };
                let mut op = self.op(kind, group + 2, self.tools.linker());
                for flag in &inst.fields.ldflags {
                    op.push(ParamKind::LdFlag, flag);
                }
                for obj in &objects {
                    op.push(ParamKind::InFile, obj.display().to_string());
                }
                for extra in &link_extra {
                    op.push(ParamKind::InFile, extra.display().to_string());
                }
                for file in &inst.fields.lib_files {
                    op.push(ParamKind::LibFile, file.display().to_string());
                }
                for dir in &inst.fields.lib_dirs {
                    op.push(ParamKind::LibDir, dir.display().to_string());
                }
                for name in &inst.fields.lib_names {
                    op.push(ParamKind::LibName, name);
                }
                if !inst.fields.frameworks.is_empty() && toolchain == Toolchain::Msvc {
                    let loc = self.session.table.get(product)?.loc.clone();
                    self.session.errors.error(
                        ErrorKind::Config,
                        Some(loc),
                        "frameworks are not supported with the msvc toolchain",
                    );
                } else {
                    for fw in &inst.fields.frameworks {
                        op.push(ParamKind::Framework, fw);
                    }
                }
                if let Some(def) = &inst.fields.def_file {
                    op.push(ParamKind::DefFile, def.display().to_string());
                }
                op.push(ParamKind::OutFile, artifact.display().to_string());
                self.push_op(op);
                emitted.artifact = Some(artifact);
            }
            _ => {
                // Valid but nothing to run (no sources, no use_deps).
            }
        }
        self.emitted.insert(product, emitted);
        Ok(())
    }

    fn emit_copy(&mut self, inst: &ProductInst, product_dir: &Path, group: u32) {
        let dest_dir = inst
            .fields
            .to
            .clone()
            .unwrap_or_else(|| product_dir.to_path_buf());
        for src in &inst.fields.sources {
            let file = src.file_name().map(PathBuf::from).unwrap_or_default();
            let mut op = self.op(OpKind::Copy, group, "copy");
            op.push(ParamKind::InFile, src.display().to_string());
            op.push(ParamKind::OutFile, dest_dir.join(file).display().to_string());
            self.push_op(op);
        }
    }

    fn emit_script(&mut self, inst: &ProductInst, group: u32) {
        for src in &inst.fields.sources {
            let mut op = self.op(OpKind::RunLua, group, self.tools.lua());
            op.push(ParamKind::InFile, src.display().to_string());
            for arg in &inst.fields.args {
                op.push(ParamKind::Arg, arg);
            }
            self.push_op(op);
        }
    }

    fn marker(&mut self, group: u32, name: &str) {
        let op = self.op(OpKind::EnteringProduct, group, name);
        self.list.ops.push(op);
    }

    fn op(&self, kind: OpKind, group: u32, cmd: impl Into<String>) -> Operation {
        Operation {
            op: kind,
            toolchain: self.session.params.toolchain,
            os: self.session.params.os,
            group,
            cmd: cmd.into(),
            params: Vec::<Parameter>::new(),
        }
    }

    fn push_op(&mut self, op: Operation) {
        if let Some(out) = op.outfile() {
            self.list.outputs.push(PathBuf::from(out));
        }
        self.list.ops.push(op);
    }

    fn mode_flags(&self) -> Vec<String> {
        let msvc = self.session.params.toolchain == Toolchain::Msvc;
        let mut flags = match self.session.params.build_mode {
            BuildMode::Debug => vec![if msvc { "/Zi" } else { "-g" }.to_string()],
            BuildMode::Optimized => vec![if msvc { "/O2" } else { "-O2" }.to_string()],
            BuildMode::Nonoptimized => Vec::new(),
        };
        if !msvc && self.session.params.cpu == crate::core::session::Cpu::X86 {
            if self.session.params.wordsize == 32 {
                flags.push("-m32".to_string());
            }
        }
        flags
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Deterministic output naming under the product directory; two
/// sources with the same stem get a numeric suffix in source order.
fn unique_output(
    dir: &Path,
    prefix: &str,
    src: &Path,
    ext: &str,
    taken: &mut Vec<PathBuf>,
) -> PathBuf {
    let stem = stem_of(src);
    let mut candidate = dir.join(format!("{}{}.{}", prefix, stem, ext));
    let mut n = 1;
    while taken.contains(&candidate) {
        candidate = dir.join(format!("{}{}_{}.{}", prefix, stem, n, ext));
        n += 1;
    }
    taken.push(candidate.clone());
    candidate
}

fn static_lib_name(name: &str, toolchain: Toolchain, os: TargetOs) -> String {
    match toolchain {
        Toolchain::Msvc => format!("{}.lib", name),
        Toolchain::Clang if os.is_windows() => format!("{}.lib", name),
        _ => format!("lib{}.a", name),
    }
}

fn shared_lib_name(name: &str, os: TargetOs) -> String {
    match os {
        TargetOs::Win32 => format!("{}.dll", name),
        TargetOs::Macos => format!("lib{}.dylib", name),
        _ => format!("lib{}.so", name),
    }
}

fn exe_name(name: &str, os: TargetOs) -> String {
    if os.is_windows() {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::eval::evaluate;
    use crate::core::session::BuildParams;
    use std::fs;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn evaluated(dir: &Path, patch: impl FnOnce(&mut BuildParams)) -> Session {
        let mut params = BuildParams::new(dir, dir.join("build"));
        params.os = TargetOs::Linux;
        params.toolchain = Toolchain::Gcc;
        patch(&mut params);
        let mut session = Session::new(params);
        let ok = evaluate(&mut session).unwrap();
        assert!(ok, "{}", session.errors.to_string_lossy());
        session
    }

    #[test]
    fn hello_executable_emits_marker_compile_link() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("main.cpp"), "int main() { return 0; }\n");
        write(
            &tmp.path().join("BUSY"),
            "let hello ! : Executable { .sources += ./main.cpp }\n",
        );
        let mut session = evaluated(tmp.path(), |_| {});
        let list = generate(&mut session).unwrap();

        let kinds: Vec<OpKind> = list.ops.iter().map(|o| o.op).collect();
        assert_eq!(
            kinds,
            [OpKind::EnteringProduct, OpKind::Compile, OpKind::LinkExe]
        );
        assert_eq!(list.ops[0].cmd, "hello");

        let compile = &list.ops[1];
        assert!(compile.infile().unwrap().ends_with("main.cpp"));
        assert!(compile
            .outfile()
            .unwrap()
            .ends_with("build/hello/main.o"));

        let link = &list.ops[2];
        assert_eq!(
            link.infiles().collect::<Vec<_>>(),
            vec![compile.outfile().unwrap()]
        );
        assert!(link.outfile().unwrap().ends_with("build/hello/hello"));
    }

    #[test]
    fn groups_are_nondecreasing_and_respect_dependencies() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("a.cpp"), "\n");
        write(&tmp.path().join("b.cpp"), "\n");
        write(&tmp.path().join("c.cpp"), "\n");
        write(
            &tmp.path().join("BUSY"),
            "let a : Library { .sources += ./a.cpp }\n\
             let b ! : Executable { .sources += ./b.cpp; .deps += a }\n\
             let c ! : Executable { .sources += ./c.cpp }\n",
        );
        let mut session = evaluated(tmp.path(), |_| {});
        let list = generate(&mut session).unwrap();

        let mut last = 0;
        for op in &list.ops {
            assert!(op.group >= last, "group order violated at {:?}", op.op);
            last = op.group;
        }

        // Every infile is either an existing source or the outfile of
        // an operation with a strictly smaller group.
        let mut seen: HashMap<String, u32> = HashMap::new();
        for op in &list.ops {
            for infile in op.infiles() {
                if let Some(&g) = seen.get(infile) {
                    assert!(g < op.group, "{} consumed in the same group", infile);
                } else {
                    assert!(
                        Path::new(infile).exists(),
                        "{} is neither a source nor produced earlier",
                        infile
                    );
                }
            }
            if let Some(out) = op.outfile() {
                seen.insert(out.to_string(), op.group);
            }
        }

        // The library archive feeds both links of its dependent only.
        let lib_link = list.ops.iter().find(|o| o.op == OpKind::LinkLib).unwrap();
        let b_link = list
            .ops
            .iter()
            .find(|o| o.op == OpKind::LinkExe && o.outfile().unwrap().ends_with("/b"))
            .unwrap();
        assert!(b_link
            .infiles()
            .any(|f| f == lib_link.outfile().unwrap()));
        assert!(b_link.group > lib_link.group);
    }

    #[test]
    fn msvc_naming_and_argument_concepts() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("a.cpp"), "\n");
        write(
            &tmp.path().join("BUSY"),
            "let a ! : Dll { .sources += ./a.cpp; .defines += \"X=1\" }\n",
        );
        let mut session = evaluated(tmp.path(), |p| {
            p.toolchain = Toolchain::Msvc;
            p.os = TargetOs::Win32;
        });
        let list = generate(&mut session).unwrap();
        let compile = list.ops.iter().find(|o| o.op == OpKind::Compile).unwrap();
        assert!(compile.outfile().unwrap().ends_with("a.obj"));
        assert_eq!(compile.cmd, "cl");
        let link = list.ops.iter().find(|o| o.op == OpKind::LinkDll).unwrap();
        assert!(link.outfile().unwrap().ends_with("a.dll"));
        assert_eq!(link.cmd, "link");
    }

    #[test]
    fn copy_and_script_products() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("data.txt"), "payload\n");
        write(&tmp.path().join("gen.lua"), "print('hi')\n");
        write(
            &tmp.path().join("BUSY"),
            "let assets ! : Copy { .sources += ./data.txt }\n\
             let gen ! : Script { .sources += ./gen.lua; .args += \"--fast\" }\n",
        );
        let mut session = evaluated(tmp.path(), |_| {});
        let list = generate(&mut session).unwrap();
        let copy = list.ops.iter().find(|o| o.op == OpKind::Copy).unwrap();
        assert!(copy.outfile().unwrap().ends_with("build/assets/data.txt"));
        let lua = list.ops.iter().find(|o| o.op == OpKind::RunLua).unwrap();
        assert!(lua.infile().unwrap().ends_with("gen.lua"));
        assert_eq!(lua.get_params(ParamKind::Arg).collect::<Vec<_>>(), ["--fast"]);
    }

    #[test]
    fn qt_codegen_feeds_the_compile_list() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("w.cpp"), "\n");
        write(
            &tmp.path().join("w.h"),
            "class W : public QObject { Q_OBJECT };\n",
        );
        write(&tmp.path().join("plain.h"), "struct P {};\n");
        write(&tmp.path().join("form.ui"), "<ui/>\n");
        write(&tmp.path().join("res.qrc"), "<RCC/>\n");
        write(
            &tmp.path().join("BUSY"),
            "let app ! : Executable {\n\
                .sources += ./w.cpp ./w.h ./plain.h ./form.ui ./res.qrc\n\
             }\n",
        );
        let mut session = evaluated(tmp.path(), |_| {});
        let list = generate(&mut session).unwrap();

        let kinds: Vec<OpKind> = list.ops.iter().map(|o| o.op).collect();
        assert!(kinds.contains(&OpKind::RunUic));
        assert!(kinds.contains(&OpKind::RunRcc));
        assert!(kinds.contains(&OpKind::RunMoc));

        // moc/rcc outputs are compiled, the plain header is not.
        let compiled: Vec<&str> = list
            .ops
            .iter()
            .filter(|o| o.op == OpKind::Compile)
            .map(|o| o.infile().unwrap())
            .collect();
        assert_eq!(compiled.len(), 3);
        assert!(compiled.iter().any(|f| f.ends_with("moc_w.cpp")));
        assert!(compiled.iter().any(|f| f.ends_with("qrc_res.cpp")));
        assert!(!compiled.iter().any(|f| f.ends_with("plain.h")));

        // Generated headers are findable: the product dir became an
        // include dir of every compile.
        let compile = list.ops.iter().find(|o| o.op == OpKind::Compile).unwrap();
        assert!(compile
            .get_params(ParamKind::IncludeDir)
            .any(|d| d.ends_with("build/app")));

        // Codegen strictly precedes the compiles consuming it.
        let moc = list.ops.iter().find(|o| o.op == OpKind::RunMoc).unwrap();
        let moc_compile = list
            .ops
            .iter()
            .find(|o| o.op == OpKind::Compile && o.infile().unwrap().ends_with("moc_w.cpp"))
            .unwrap();
        assert!(moc.group < moc_compile.group);
    }

    #[test]
    fn use_deps_objects_fold_into_the_link() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("a.cpp"), "\n");
        write(
            &tmp.path().join("BUSY"),
            "let a : Library { .sources += ./a.cpp }\n\
             let all ! : Executable { .use_deps += `objects; .deps += a }\n",
        );
        let mut session = evaluated(tmp.path(), |_| {});
        let list = generate(&mut session).unwrap();
        let link = list.ops.iter().find(|o| o.op == OpKind::LinkExe).unwrap();
        assert!(link.infiles().any(|f| f.ends_with("a/a.o")));
    }

    #[test]
    fn unknown_targets_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        write(&tmp.path().join("BUSY"), "let a : Library {}\n");
        let mut session = evaluated(tmp.path(), |p| {
            p.targets = vec!["missing".to_string()];
        });
        generate(&mut session).unwrap();
        assert!(session
            .errors
            .to_string_lossy()
            .contains("unknown target `missing`"));
    }
}
