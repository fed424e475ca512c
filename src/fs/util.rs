use crate::fs::{FileSystem, ReadWriteError};
use std::io::{Read, Write};

pub fn write_str_to_file<FsType: FileSystem>(
    file_system: &FsType,
    path: &str,
    content: &str,
)
-> Result<(), ReadWriteError>
{
    let mut file = file_system.create_file(path).map_err(ReadWriteError::SystemError)?;
    file.write_all(content.as_bytes()).map_err(ReadWriteError::IoError)
}

pub fn read_file_to_string<FsType: FileSystem>(
    file_system: &FsType,
    path: &str,
)
-> Result<String, ReadWriteError>
{
    let mut file = file_system.open(path).map_err(ReadWriteError::SystemError)?;
    let mut content = String::new();
    file.read_to_string(&mut content).map_err(ReadWriteError::IoError)?;
    Ok(content)
}

/*  Ensures a local directory and every ancestor of it exist, in the
    teacher's "ensure, then proceed" idiom (directory.rs::init_directory).
    Ignores the "already exists" case; any other failure is surfaced. */
pub fn ensure_dir_exists<FsType: FileSystem>(
    file_system: &FsType,
    path: &str,
)
-> Result<(), ReadWriteError>
{
    if file_system.is_dir(path) || path.is_empty()
    {
        return Ok(());
    }

    if let Some(index) = path.rfind('/')
    {
        ensure_dir_exists(file_system, &path[..index])?;
    }

    if file_system.is_dir(path)
    {
        return Ok(());
    }

    match file_system.create_dir(path)
    {
        Ok(()) => Ok(()),
        Err(error) => Err(ReadWriteError::SystemError(error)),
    }
}
