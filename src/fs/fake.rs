use crate::fs::{FileSystem, SystemError};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

#[derive(Clone)]
struct Content(Arc<Mutex<Vec<u8>>>);

impl Content
{
    fn new(bytes: Vec<u8>) -> Content
    {
        Content(Arc::new(Mutex::new(bytes)))
    }
}

#[derive(Clone)]
struct FileInfo
{
    modified: u64,
    content: Content,
}

#[derive(Clone)]
enum Node
{
    File(FileInfo),
    Dir(HashMap<String, Node>),
}

fn components(path: &str) -> Vec<&str>
{
    if path.is_empty() { vec![] } else { path.split('/').collect() }
}

fn split_parent(path: &str) -> Result<(Vec<&str>, &str), SystemError>
{
    if path.is_empty()
    {
        return Err(SystemError::PathEmpty);
    }
    let parts: Vec<&str> = path.split('/').collect();
    Ok((parts[..parts.len() - 1].to_vec(), parts[parts.len() - 1]))
}

impl Node
{
    fn get(&self, parts: &[&str]) -> Result<&Node, SystemError>
    {
        let mut node = self;
        for part in parts
        {
            node = match node
            {
                Node::File(_) => return Err(SystemError::FileInPlaceOfDirectory(part.to_string())),
                Node::Dir(map) => map.get(*part).ok_or(SystemError::NotFound)?,
            };
        }
        Ok(node)
    }

    fn get_mut(&mut self, parts: &[&str]) -> Result<&mut Node, SystemError>
    {
        let mut node = self;
        for part in parts
        {
            node = match node
            {
                Node::File(_) => return Err(SystemError::FileInPlaceOfDirectory(part.to_string())),
                Node::Dir(map) => map.get_mut(*part).ok_or(SystemError::NotFound)?,
            };
        }
        Ok(node)
    }

    fn dir_map_mut(&mut self, parts: &[&str]) -> Result<&mut HashMap<String, Node>, SystemError>
    {
        match self.get_mut(parts)?
        {
            Node::Dir(map) => Ok(map),
            Node::File(_) => Err(SystemError::DirectoryInPlaceOfFile(parts.last().unwrap_or(&"").to_string())),
        }
    }
}

/*  An in-memory filesystem for tests, following system/fake.rs's node
    tree design.  Clock is synthetic (`time_passes`) so freshness tests
    don't depend on wall time. */
#[derive(Clone)]
pub struct FakeFileSystem
{
    root: Arc<Mutex<Node>>,
    clock: Arc<Mutex<u64>>,
}

pub struct FakeFile
{
    content: Content,
    cursor: usize,
}

impl io::Read for FakeFile
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>
    {
        let data = self.content.0.lock().unwrap();
        let remaining = &data[self.cursor.min(data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.cursor += n;
        Ok(n)
    }
}

impl io::Write for FakeFile
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>
    {
        let mut data = self.content.0.lock().unwrap();
        data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()>
    {
        Ok(())
    }
}

impl std::fmt::Debug for FakeFile
{
    fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result
    {
        write!(formatter, "FakeFile")
    }
}

impl FakeFileSystem
{
    pub fn new() -> FakeFileSystem
    {
        FakeFileSystem
        {
            root: Arc::new(Mutex::new(Node::Dir(HashMap::new()))),
            clock: Arc::new(Mutex::new(1)),
        }
    }

    /*  Advances the synthetic clock so that files written after this call
        sort later than files written before it. */
    pub fn time_passes(&self)
    {
        *self.clock.lock().unwrap() += 1;
    }

    fn now(&self) -> u64
    {
        *self.clock.lock().unwrap()
    }
}

impl FileSystem for FakeFileSystem
{
    type File = FakeFile;

    fn open(&self, path: &str) -> Result<Self::File, SystemError>
    {
        let root = self.root.lock().unwrap();
        match root.get(&components(path))?
        {
            Node::File(info) => Ok(FakeFile{ content: info.content.clone(), cursor: 0 }),
            Node::Dir(_) => Err(SystemError::DirectoryInPlaceOfFile(path.to_string())),
        }
    }

    fn create_file(&self, path: &str) -> Result<Self::File, SystemError>
    {
        let (parent, name) = split_parent(path)?;
        let mut root = self.root.lock().unwrap();
        let map = root.dir_map_mut(&parent)?;
        let content = Content::new(Vec::new());
        map.insert(name.to_string(), Node::File(FileInfo{ modified: self.now(), content: content.clone() }));
        Ok(FakeFile{ content, cursor: 0 })
    }

    fn create_dir(&self, path: &str) -> Result<(), SystemError>
    {
        let (parent, name) = split_parent(path)?;
        let mut root = self.root.lock().unwrap();
        let map = root.dir_map_mut(&parent)?;
        map.insert(name.to_string(), Node::Dir(HashMap::new()));
        Ok(())
    }

    fn is_file(&self, path: &str) -> bool
    {
        let root = self.root.lock().unwrap();
        matches!(root.get(&components(path)), Ok(Node::File(_)))
    }

    fn is_dir(&self, path: &str) -> bool
    {
        if path.is_empty() { return true; }
        let root = self.root.lock().unwrap();
        matches!(root.get(&components(path)), Ok(Node::Dir(_)))
    }

    fn remove_file(&self, path: &str) -> Result<(), SystemError>
    {
        let (parent, name) = split_parent(path)?;
        let mut root = self.root.lock().unwrap();
        let map = root.dir_map_mut(&parent)?;
        match map.remove(name)
        {
            Some(Node::File(_)) => Ok(()),
            Some(node @ Node::Dir(_)) => { map.insert(name.to_string(), node); Err(SystemError::RemoveFileFoundDir) },
            None => Err(SystemError::RemoveNonExistentFile),
        }
    }

    fn remove_dir(&self, path: &str) -> Result<(), SystemError>
    {
        let (parent, name) = split_parent(path)?;
        let mut root = self.root.lock().unwrap();
        let map = root.dir_map_mut(&parent)?;
        match map.remove(name)
        {
            Some(Node::Dir(_)) => Ok(()),
            Some(node @ Node::File(_)) => { map.insert(name.to_string(), node); Err(SystemError::RemoveDirFoundFile) },
            None => Err(SystemError::RemoveNonExistentDir),
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), SystemError>
    {
        let (from_parent, from_name) = split_parent(from)?;
        let (to_parent, to_name) = split_parent(to)?;
        let mut root = self.root.lock().unwrap();

        let node = {
            let from_map = root.dir_map_mut(&from_parent)?;
            from_map.remove(from_name).ok_or(SystemError::RenameFromNonExistent)?
        };

        let to_map = root.dir_map_mut(&to_parent).map_err(|_| SystemError::RenameToNonExistent)?;
        to_map.insert(to_name.to_string(), node);
        Ok(())
    }

    fn list_dir(&self, path: &str) -> Result<Vec<String>, SystemError>
    {
        let root = self.root.lock().unwrap();
        match root.get(&components(path))?
        {
            Node::Dir(map) =>
            {
                let mut names: Vec<String> = map.keys()
                    .map(|name| if path.is_empty() { name.clone() } else { format!("{}/{}", path, name) })
                    .collect();
                names.sort();
                Ok(names)
            },
            Node::File(_) => Err(SystemError::DirectoryInPlaceOfFile(path.to_string())),
        }
    }

    fn get_modified(&self, path: &str) -> Result<SystemTime, SystemError>
    {
        let root = self.root.lock().unwrap();
        match root.get(&components(path))?
        {
            Node::File(info) => Ok(SystemTime::UNIX_EPOCH + Duration::from_secs(info.modified)),
            Node::Dir(_) => Err(SystemError::ModifiedNotFound),
        }
    }
}

#[cfg(test)]
mod test
{
    use super::*;
    use crate::fs::util::write_str_to_file;

    #[test]
    fn create_and_read_back()
    {
        let fs = FakeFileSystem::new();
        write_str_to_file(&fs, "a.txt", "hello").unwrap();
        assert!(fs.is_file("a.txt"));
        let content = crate::fs::util::read_file_to_string(&fs, "a.txt").unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn directories_nest()
    {
        let fs = FakeFileSystem::new();
        fs.create_dir("dir").unwrap();
        write_str_to_file(&fs, "dir/a.txt", "x").unwrap();
        assert_eq!(fs.list_dir("dir").unwrap(), vec!["dir/a.txt".to_string()]);
    }

    #[test]
    fn time_passes_advances_modified()
    {
        let fs = FakeFileSystem::new();
        write_str_to_file(&fs, "a.txt", "1").unwrap();
        let t1 = fs.get_modified("a.txt").unwrap();
        fs.time_passes();
        write_str_to_file(&fs, "b.txt", "2").unwrap();
        let t2 = fs.get_modified("b.txt").unwrap();
        assert!(t2 > t1);
    }

    #[test]
    fn remove_nonexistent_file_errors()
    {
        let fs = FakeFileSystem::new();
        assert!(matches!(fs.remove_file("nope.txt"), Err(SystemError::RemoveNonExistentFile)));
    }
}
