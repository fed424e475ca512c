use std::collections::{HashMap, HashSet};
use std::io::{Read, Write};

use crate::fs::FileSystem;
use crate::fs::util::ensure_dir_exists;
use crate::path::{Kind, Path};

/*  A per-rule private directory under `<build_root>/.sandbox/<hash>`.
    Declared deps and target parent directories are staged inside it and
    the action's local paths are rewritten to point there, so an
    undeclared read or write - one that wasn't named in the rule's
    dependency or target set - fails instead of silently succeeding
    against the real build tree.

    Deliberately not removed when the action fails: a failed sandbox is
    left in place for a developer to inspect what the action actually
    touched (see DESIGN.md, Open Question 3). */
pub struct Sandbox
{
    pub root: Path,
    pub mapping: HashMap<Path, Path>,
}

impl Sandbox
{
    pub fn create<FsType: FileSystem>(
        file_system: &FsType,
        build_root: &str,
        rule_hash_hex: &str,
        deps: &HashSet<Path>,
        targets: &HashSet<Path>,
    )
    -> Result<Sandbox, String>
    {
        let root = Path::local(&format!("{}/.sandbox/{}", build_root, rule_hash_hex));

        wipe(file_system, &root)?;
        ensure_dir_exists(file_system, root.as_str()).map_err(|e| e.to_string())?;

        let mut mapping = HashMap::new();
        for path in deps.iter().chain(targets.iter())
        {
            if path.is_local()
            {
                let sandboxed = root.join(path.as_str());
                if let Some(parent) = sandboxed.parent()
                {
                    ensure_dir_exists(file_system, parent.as_str()).map_err(|e| e.to_string())?;
                }
                mapping.insert(path.clone(), sandboxed);
            }
        }

        /*  Only declared deps get their content copied in; targets are
            left for the action to produce.  An undeclared local path
            is never staged, so a read through it fails inside the
            sandbox even though the real file exists outside it. */
        for dep in deps
        {
            if !dep.is_local()
            {
                continue;
            }
            if !file_system.is_file(dep.as_str())
            {
                continue;
            }
            let sandboxed = &mapping[dep];
            let mut source = file_system.open(dep.as_str()).map_err(|e| e.to_string())?;
            let mut bytes = Vec::new();
            source.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
            let mut dest = file_system.create_file(sandboxed.as_str()).map_err(|e| e.to_string())?;
            dest.write_all(&bytes).map_err(|e| e.to_string())?;
        }

        Ok(Sandbox{ root, mapping })
    }

    pub fn remove<FsType: FileSystem>(&self, file_system: &FsType) -> Result<(), String>
    {
        wipe(file_system, &self.root)
    }

    pub fn rewrite(&self, path: &Path) -> Path
    {
        match path.kind()
        {
            Kind::External => path.clone(),
            Kind::Local => self.mapping.get(path).cloned().unwrap_or_else(|| path.clone()),
        }
    }
}

fn wipe<FsType: FileSystem>(file_system: &FsType, root: &Path) -> Result<(), String>
{
    if !file_system.is_dir(root.as_str())
    {
        return Ok(());
    }

    remove_recursive(file_system, root.as_str())
}

fn remove_recursive<FsType: FileSystem>(file_system: &FsType, path: &str) -> Result<(), String>
{
    let entries = file_system.list_dir(path).map_err(|e| e.to_string())?;
    for entry in entries
    {
        if file_system.is_dir(&entry)
        {
            remove_recursive(file_system, &entry)?;
            file_system.remove_dir(&entry).map_err(|e| e.to_string())?;
        }
        else
        {
            file_system.remove_file(&entry).map_err(|e| e.to_string())?;
        }
    }
    file_system.remove_dir(path).map_err(|e| e.to_string())
}

#[cfg(test)]
mod test
{
    use super::*;
    use crate::fs::fake::FakeFileSystem;
    use crate::fs::util::write_str_to_file;

    #[test]
    fn sandbox_stages_local_paths_only()
    {
        let fs = FakeFileSystem::new();
        fs.create_dir(".sandbox_setup_probe").ok();

        let mut deps = HashSet::new();
        deps.insert(Path::local("src/a.txt"));
        deps.insert(Path::external("/usr/include/h.h"));
        let mut targets = HashSet::new();
        targets.insert(Path::local("out/b.txt"));

        let sandbox = Sandbox::create(&fs, "_build", "deadbeef", &deps, &targets).unwrap();

        assert!(sandbox.mapping.contains_key(&Path::local("src/a.txt")));
        assert!(sandbox.mapping.contains_key(&Path::local("out/b.txt")));
        assert!(!sandbox.mapping.contains_key(&Path::external("/usr/include/h.h")));
    }

    #[test]
    fn declared_dep_content_is_copied_into_sandbox()
    {
        let fs = FakeFileSystem::new();
        write_str_to_file(&fs, "src/a.txt", "hello").unwrap();

        let mut deps = HashSet::new();
        deps.insert(Path::local("src/a.txt"));
        let targets = HashSet::new();

        let sandbox = Sandbox::create(&fs, "_build", "beef", &deps, &targets).unwrap();
        let staged_path = sandbox.mapping[&Path::local("src/a.txt")].clone();
        assert!(fs.is_file(staged_path.as_str()));
    }

    #[test]
    fn rewrite_leaves_external_paths_alone()
    {
        let fs = FakeFileSystem::new();
        let deps = HashSet::new();
        let targets = HashSet::new();
        let sandbox = Sandbox::create(&fs, "_build", "cafe", &deps, &targets).unwrap();
        let external = Path::external("/usr/lib/libc.so");
        assert_eq!(sandbox.rewrite(&external), external);
    }

    #[test]
    fn remove_deletes_staged_files()
    {
        let fs = FakeFileSystem::new();
        let mut deps = HashSet::new();
        deps.insert(Path::local("a.txt"));
        let targets = HashSet::new();
        let sandbox = Sandbox::create(&fs, "_build", "abc", &deps, &targets).unwrap();
        write_str_to_file(&fs, sandbox.mapping[&Path::local("a.txt")].as_str(), "x").unwrap();

        sandbox.remove(&fs).unwrap();
        assert!(!fs.is_dir(sandbox.root.as_str()));
    }
}
