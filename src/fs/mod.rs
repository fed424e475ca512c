use std::fmt;
use std::io;
use std::time::SystemTime;

#[cfg(test)]
pub mod fake;

pub mod real;
pub mod util;

pub use real::RealFileSystem;

/*  A lot of these variants only ever get constructed by the fake
    filesystem in tests; that's fine, a real and a fake backend don't need
    to agree on every corner. */
#[allow(dead_code)]
#[derive(Debug)]
pub enum SystemError
{
    NotFound,
    FileInPlaceOfDirectory(String),
    DirectoryInPlaceOfFile(String),
    PathEmpty,
    RemoveFileFoundDir,
    RemoveDirFoundFile,
    RemoveNonExistentFile,
    RemoveNonExistentDir,
    RenameFromNonExistent,
    RenameToNonExistent,
    MetadataNotFound,
    ModifiedNotFound,
    Weird,
}

impl fmt::Display for SystemError
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        match self
        {
            SystemError::NotFound =>
                write!(formatter, "No such file or directory"),

            SystemError::FileInPlaceOfDirectory(component) =>
                write!(formatter, "Expected directory, found file: {}", component),

            SystemError::DirectoryInPlaceOfFile(component) =>
                write!(formatter, "Expected file, found directory: {}", component),

            SystemError::PathEmpty =>
                write!(formatter, "Invalid arguments: found empty path"),

            SystemError::RemoveFileFoundDir =>
                write!(formatter, "Attempt to remove file, found directory"),

            SystemError::RemoveDirFoundFile =>
                write!(formatter, "Attempt to remove directory, found file"),

            SystemError::RemoveNonExistentFile =>
                write!(formatter, "Attempt to remove non-existent file"),

            SystemError::RemoveNonExistentDir =>
                write!(formatter, "Attempt to remove non-existent directory"),

            SystemError::RenameFromNonExistent =>
                write!(formatter, "Attempt to rename a non-existent file or directory"),

            SystemError::RenameToNonExistent =>
                write!(formatter, "Attempt to rename a file or directory with non-existent target directory"),

            SystemError::MetadataNotFound =>
                write!(formatter, "Attempt to access metadata failed"),

            SystemError::ModifiedNotFound =>
                write!(formatter, "Attempt to access modified time for file failed"),

            SystemError::Weird =>
                write!(formatter, "Weird error, this happens when internal logic fails in a way the programmer didn't think was possible"),
        }
    }
}

#[derive(Debug)]
pub enum ReadWriteError
{
    IoError(io::Error),
    SystemError(SystemError),
}

impl fmt::Display for ReadWriteError
{
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result
    {
        match self
        {
            ReadWriteError::IoError(error) => write!(formatter, "{}", error),
            ReadWriteError::SystemError(error) => write!(formatter, "{}", error),
        }
    }
}

/*  Everything the engine needs from a filesystem, and nothing more:
    command execution belongs to Action, not here. */
pub trait FileSystem: Clone
{
    type File: io::Read + io::Write + fmt::Debug;

    fn open(&self, path: &str) -> Result<Self::File, SystemError>;
    fn create_file(&self, path: &str) -> Result<Self::File, SystemError>;
    fn create_dir(&self, path: &str) -> Result<(), SystemError>;
    fn is_dir(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn remove_file(&self, path: &str) -> Result<(), SystemError>;
    fn remove_dir(&self, path: &str) -> Result<(), SystemError>;
    fn rename(&self, from: &str, to: &str) -> Result<(), SystemError>;
    fn list_dir(&self, path: &str) -> Result<Vec<String>, SystemError>;

    fn get_modified(&self, path: &str) -> Result<SystemTime, SystemError>;
}
