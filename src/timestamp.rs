use std::cell::RefCell;
use std::collections::HashMap;
use std::time::SystemTime;

use crate::fs::FileSystem;
use crate::path::Path;

/*  Caches mtimes for the lifetime of one engine run.  A miss is
    memoised as None so a repeatedly-missing path doesn't re-stat every
    time it's consulted. */
pub struct TimestampCache
{
    cache: RefCell<HashMap<String, Option<SystemTime>>>,
}

impl TimestampCache
{
    pub fn new() -> TimestampCache
    {
        TimestampCache{ cache: RefCell::new(HashMap::new()) }
    }

    pub fn timestamp<FsType: FileSystem>(&self, file_system: &FsType, path: &Path) -> Option<SystemTime>
    {
        if let Some(cached) = self.cache.borrow().get(path.as_str())
        {
            return *cached;
        }

        let result = file_system.get_modified(path.as_str()).ok();
        self.cache.borrow_mut().insert(path.as_str().to_string(), result);
        result
    }

    pub fn invalidate(&self, path: &Path)
    {
        self.cache.borrow_mut().remove(path.as_str());
    }
}

/*  Result of folding a merge function over a set of paths' timestamps:
    whether any path was missing from disk, and the merged timestamp
    (in seconds since the epoch) over the paths that were present. */
pub struct MergedTimestamp
{
    pub missing_files: bool,
    pub limit: Option<f64>,
}

fn as_seconds(time: SystemTime) -> f64
{
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub fn merge_timestamp<FsType, F>(
    cache: &TimestampCache,
    file_system: &FsType,
    paths: &[Path],
    merge: F,
)
-> MergedTimestamp
where
    FsType: FileSystem,
    F: Fn(f64, f64) -> f64,
{
    let mut missing_files = false;
    let mut limit: Option<f64> = None;

    for path in paths
    {
        match cache.timestamp(file_system, path)
        {
            Some(time) =>
            {
                let seconds = as_seconds(time);
                limit = Some(match limit
                {
                    Some(existing) => merge(existing, seconds),
                    None => seconds,
                });
            },
            None => missing_files = true,
        }
    }

    MergedTimestamp{ missing_files, limit }
}

pub fn min_timestamp<FsType: FileSystem>(cache: &TimestampCache, file_system: &FsType, paths: &[Path]) -> MergedTimestamp
{
    merge_timestamp(cache, file_system, paths, f64::min)
}

pub fn max_timestamp<FsType: FileSystem>(cache: &TimestampCache, file_system: &FsType, paths: &[Path]) -> MergedTimestamp
{
    merge_timestamp(cache, file_system, paths, f64::max)
}

#[cfg(test)]
mod test
{
    use super::*;
    use crate::fs::fake::FakeFileSystem;
    use crate::fs::util::write_str_to_file;

    #[test]
    fn missing_path_has_no_timestamp()
    {
        let fs = FakeFileSystem::new();
        let cache = TimestampCache::new();
        assert_eq!(cache.timestamp(&fs, &Path::local("nope.txt")), None);
    }

    #[test]
    fn max_timestamp_picks_latest()
    {
        let fs = FakeFileSystem::new();
        let cache = TimestampCache::new();
        write_str_to_file(&fs, "a.txt", "1").unwrap();
        fs.time_passes();
        write_str_to_file(&fs, "b.txt", "2").unwrap();

        let result = max_timestamp(&cache, &fs, &[Path::local("a.txt"), Path::local("b.txt")]);
        assert!(!result.missing_files);
        let b_time = cache.timestamp(&fs, &Path::local("b.txt")).unwrap();
        assert_eq!(result.limit, Some(as_seconds(b_time)));
    }

    #[test]
    fn missing_dependency_flagged()
    {
        let fs = FakeFileSystem::new();
        let cache = TimestampCache::new();
        write_str_to_file(&fs, "a.txt", "1").unwrap();
        let result = max_timestamp(&cache, &fs, &[Path::local("a.txt"), Path::local("missing.txt")]);
        assert!(result.missing_files);
    }
}
