use crate::fs::{FileSystem, SystemError};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct RealFileSystem
{
}

impl RealFileSystem
{
    pub fn new() -> Self
    {
        RealFileSystem{}
    }
}

fn convert_io_error(error: std::io::Error) -> SystemError
{
    match error.kind()
    {
        ErrorKind::NotFound => SystemError::NotFound,
        _ => SystemError::Weird,
    }
}

impl FileSystem for RealFileSystem
{
    type File = fs::File;

    fn open(&self, path: &str) -> Result<Self::File, SystemError>
    {
        fs::File::open(path).map_err(convert_io_error)
    }

    fn create_file(&self, path: &str) -> Result<Self::File, SystemError>
    {
        fs::File::create(path).map_err(convert_io_error)
    }

    fn create_dir(&self, path: &str) -> Result<(), SystemError>
    {
        fs::create_dir(path).map_err(convert_io_error)
    }

    fn is_file(&self, path: &str) -> bool
    {
        Path::new(path).is_file()
    }

    fn is_dir(&self, path: &str) -> bool
    {
        Path::new(path).is_dir()
    }

    fn remove_file(&self, path: &str) -> Result<(), SystemError>
    {
        fs::remove_file(path).map_err(convert_io_error)
    }

    fn remove_dir(&self, path: &str) -> Result<(), SystemError>
    {
        fs::remove_dir(path).map_err(convert_io_error)
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), SystemError>
    {
        fs::rename(from, to).map_err(convert_io_error)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>, SystemError>
    {
        let entries = fs::read_dir(path).map_err(convert_io_error)?;
        let mut names = Vec::new();
        for entry in entries
        {
            let entry = entry.map_err(convert_io_error)?;
            names.push(format!("{}/{}", path, entry.file_name().to_string_lossy()));
        }
        names.sort();
        Ok(names)
    }

    fn get_modified(&self, path: &str) -> Result<SystemTime, SystemError>
    {
        let metadata = fs::symlink_metadata(path).map_err(|_| SystemError::MetadataNotFound)?;
        metadata.modified().map_err(|_| SystemError::ModifiedNotFound)
    }
}
