use std::collections::HashSet;

use crate::fs::FileSystem;
use crate::path::Path;

/*  Walks a context's build directory and unlinks anything that isn't a
    registered target, so artifacts left behind by a rule set that has
    since changed don't get mistaken for legitimate inputs on a later
    run. */
pub fn remove_old_artifacts<FsType: FileSystem>(
    file_system: &FsType,
    build_dir: &str,
    registered_targets: &HashSet<Path>,
) -> Result<(), String>
{
    if !file_system.is_dir(build_dir)
    {
        return Ok(());
    }

    sweep(file_system, build_dir, registered_targets)
}

fn sweep<FsType: FileSystem>(
    file_system: &FsType,
    dir: &str,
    registered_targets: &HashSet<Path>,
) -> Result<(), String>
{
    let entries = file_system.list_dir(dir).map_err(|e| e.to_string())?;
    for entry in entries
    {
        if file_system.is_dir(&entry)
        {
            sweep(file_system, &entry, registered_targets)?;
            if file_system.list_dir(&entry).map(|v| v.is_empty()).unwrap_or(false)
            {
                let _ = file_system.remove_dir(&entry);
            }
        }
        else if !registered_targets.contains(&Path::local(&entry))
        {
            file_system.remove_file(&entry).map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}
