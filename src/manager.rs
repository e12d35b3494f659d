use crate::*;
use crate::driver::{make_driver, DirectFile, Driver, FileObj,
                    MountpointDriver};
use crate::handles::{HandleId, HandleTable};

use std::{
    fs,
    io,
    io::{ErrorKind, Read},
    sync::Arc,
};
use parking_lot::Mutex;

#[cfg(feature = "stdpaths")]
mod stdpaths;

/// One registered (driver, root, mount point) triple.
struct Binding {
    driver: Arc<Driver>,
    kind: String,
    root: String,
    /// Normalized, ends in `/` unless empty. Empty means transparent: the
    /// driver sees every logical path except mount-scoped `@` ones.
    mount_point: String,
}

impl Binding {
    /// The driver-relative form of a normalized logical path, or `None` if
    /// this binding doesn't see it.
    fn translate<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.mount_point.is_empty() {
            if path.starts_with(path::MOUNT_SCOPED_MARKER) { None }
            else { Some(path) }
        }
        else {
            path::strip_prefix_ci(path, &self.mount_point)
        }
    }
}

/// A mounted driver, as reported by [`FileManager::loaded_drivers`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverLocation {
    pub kind: String,
    pub root: String,
    pub mount_point: String,
}

struct FileManagerInner {
    /// Front is highest priority. Index 0 is always the mount point driver.
    bindings: Vec<Binding>,
    handles: HandleTable,
    config: ManagerConfig,
}

/// The virtual filesystem: every mounted driver behind one logical
/// namespace.
///
/// Cloning a `FileManager` gives another handle to the same filesystem.
/// Every operation holds one lock for its whole duration, so it is safe to
/// load from any number of threads at once.
#[derive(Clone)]
pub struct FileManager {
    inner: Arc<Mutex<FileManagerInner>>,
}

impl Default for FileManager {
    fn default() -> FileManager {
        FileManager::new()
    }
}

impl FileManager {
    /// A manager with the default configuration: nothing mounted except the
    /// in-memory cache at `@mem/`.
    pub fn new() -> FileManager {
        FileManager::with_config(ManagerConfig::default())
    }
    pub fn with_config(config: ManagerConfig) -> FileManager {
        let mountpoints = Binding {
            driver: Arc::new(Driver::Mountpoints(MountpointDriver::new())),
            kind: String::new(),
            root: String::new(),
            mount_point: String::new(),
        };
        let memory = config.memory_mount_point.clone()
            .map(|x| (config.memory_root.clone(), x));
        let ret = FileManager { inner: Arc::new(Mutex::new(FileManagerInner {
            bindings: vec![mountpoints],
            handles: HandleTable::new(),
            config,
        }))};
        if let Some((root, point)) = memory {
            // mount has already warned about why
            if ret.mount("mem", &root, &point).is_err() {
                log::info!("Continuing without a memory cache at {:?}", point);
            }
        }
        ret
    }
    /// Mounts a driver of type `kind` (`"dir"`, `"zip"` or `"mem"`) built on
    /// `root` at `mount_point`. An identical existing mount is replaced. The
    /// new mount has the lowest read priority.
    ///
    /// On failure, a warning is logged and nothing changes.
    ///
    /// Panics if `root` is empty.
    pub fn mount(&self, kind: &str, root: &str, mount_point: &str)
        -> Result<(), MountError> {
        self.inner.lock().mount(kind, root, mount_point)
    }
    /// Removes every mount matching all three fields (case-insensitively),
    /// and returns how many there were.
    pub fn unmount(&self, kind: &str, root: &str, mount_point: &str) -> usize {
        let root = path::normalize(root);
        let mount_point = canonical_mount_point(mount_point);
        let mut this = self.inner.lock();
        let count = this.unmount(kind, &root, &mount_point);
        this.rebuild_mountpoints();
        count
    }
    pub fn is_mounted(&self, mount_point: &str) -> bool {
        let mount_point = canonical_mount_point(mount_point);
        let this = self.inner.lock();
        this.bindings[1..].iter()
            .any(|x| path::eq_ci(&x.mount_point, &mount_point))
    }
    /// Is the driver at this mount point ready (e.g. is the memory card
    /// inserted)? False if nothing is mounted there.
    pub fn mountpoint_is_ready(&self, mount_point: &str) -> bool {
        let mount_point = canonical_mount_point(mount_point);
        let this = self.inner.lock();
        this.bindings[1..].iter()
            .find(|x| path::eq_ci(&x.mount_point, &mount_point))
            .map(|x| x.driver.ready())
            .unwrap_or(false)
    }
    /// Every mount, highest priority first.
    pub fn loaded_drivers(&self) -> Vec<DriverLocation> {
        let this = self.inner.lock();
        this.bindings[1..].iter().map(|x| DriverLocation {
            kind: x.kind.clone(),
            root: x.root.clone(),
            mount_point: x.mount_point.clone(),
        }).collect()
    }
    /// Opens a file.
    ///
    /// For reading, the highest-priority driver that has the file wins.
    ///
    /// For writing, the driver that would have to create the fewest new
    /// path components wins, so a file stays where it was found and new
    /// files land next to their siblings; ties go to the higher priority
    /// driver.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<File, OpenError> {
        let mut this = self.inner.lock();
        let path = path::normalize(path);
        let (handle, obj) = match mode {
            OpenMode::Read => this.open_for_reading(&path)?,
            OpenMode::Write => this.open_for_writing(&path)?,
        };
        drop(this);
        Ok(File::new(self.clone(), handle, obj, path.into_owned()))
    }
    /// Reads a whole file.
    pub fn read_to_end(&self, path: &str) -> Result<Vec<u8>, OpenError> {
        let mut file = self.open(path, OpenMode::Read)?;
        let mut ret = Vec::new();
        file.read_to_end(&mut ret)
            .map_err(|x| OpenError::from_io(file.path(), x))?;
        Ok(ret)
    }
    /// Lists the entries matching `path`, whose last component is a mask
    /// (`Songs/*`, `Songs/*.sm`). Results from every driver are merged,
    /// sorted and deduplicated, case-insensitively.
    ///
    /// With `include_path`, each result is a full logical path instead of a
    /// bare name.
    pub fn dir_listing(&self, path: &str, only_dirs: bool, include_path: bool)
        -> Vec<String> {
        let this = self.inner.lock();
        let path = path::normalize(path);
        let mut ret = Vec::new();
        for binding in this.bindings.iter() {
            match binding.translate(&path) {
                None => (),
                Some(suffix) => {
                    let start = ret.len();
                    binding.driver.dir_listing(suffix, only_dirs, include_path,
                                               &mut ret);
                    if include_path {
                        for entry in ret[start..].iter_mut() {
                            entry.insert_str(0, &binding.mount_point);
                        }
                    }
                },
            }
        }
        // stable, so the highest-priority spelling of a name comes first
        ret.sort_by(|a, b| path::cmp_ci(a, b));
        ret.dedup_by(|next, first| path::eq_ci(first, next));
        ret
    }
    /// Removes a file or empty directory from every driver that has it.
    /// Returns true if anything was removed.
    pub fn remove(&self, path: &str) -> bool {
        let this = self.inner.lock();
        let path = path::normalize(path);
        let mut deleted = false;
        for binding in this.bindings.iter() {
            match binding.translate(&path) {
                None => (),
                // a mount's own root is never removed through it
                Some(suffix) if path::components(suffix).next().is_none() => (),
                Some(suffix) => if binding.driver.remove(suffix) {
                    deleted = true;
                },
            }
        }
        deleted
    }
    /// Makes sure a directory exists, creating it wherever the write
    /// heuristic would put a file inside it.
    pub fn create_dir(&self, dir: &str) -> bool {
        let mut dir = path::normalize(dir).into_owned();
        if !dir.is_empty() && !dir.ends_with('/') { dir.push('/') }
        let temp = format!("{}~mkdir.tmp", dir);
        match self.open(&temp, OpenMode::Write).map(File::close) {
            Ok(Ok(())) => (),
            Ok(Err(x)) => log::warn!("{}: {}", temp, x),
            Err(x) => {
                log::warn!("{}", x);
                return false
            },
        }
        self.flush_dir_cache(&dir);
        self.remove(&temp);
        true
    }
    /// Forgets cached directory contents at and below `path`, or everywhere
    /// if `path` is empty.
    pub fn flush_dir_cache(&self, path: &str) {
        let this = self.inner.lock();
        let path = path::normalize(path);
        for binding in this.bindings.iter() {
            if path.is_empty() {
                binding.driver.flush_dir_cache("");
                continue
            }
            match binding.translate(&path) {
                None => (),
                Some(suffix) => binding.driver.flush_dir_cache(suffix),
            }
        }
    }
    pub fn file_type(&self, path: &str) -> Option<EntryType> {
        self.first_answer(path, |driver, suffix| driver.file_type(suffix))
    }
    pub fn is_a_file(&self, path: &str) -> bool {
        self.file_type(path) == Some(EntryType::File)
    }
    pub fn is_a_directory(&self, path: &str) -> bool {
        self.file_type(path) == Some(EntryType::Dir)
    }
    pub fn does_file_exist(&self, path: &str) -> bool {
        self.file_type(path).is_some()
    }
    pub fn file_size(&self, path: &str) -> Option<u64> {
        self.first_answer(path, |driver, suffix| driver.file_size(suffix))
    }
    /// A fingerprint of the file's contents (modification time and size on
    /// disk), for cache invalidation.
    pub fn file_hash(&self, path: &str) -> Option<u32> {
        self.first_answer(path, |driver, suffix| driver.file_hash(suffix))
    }
    /// Combines the path itself with [`file_hash`](Self::file_hash), so that
    /// moving a file changes it too.
    pub fn hash_for_file(&self, path: &str) -> u32 {
        crc32fast::hash(path.as_bytes())
            .wrapping_add(self.file_hash(path).unwrap_or(0))
    }
    /// Combines the hashes of every entry directly inside `dir`.
    pub fn hash_for_directory(&self, dir: &str) -> u32 {
        let mut hash = crc32fast::hash(dir.as_bytes());
        for name in self.dir_listing(&format!("{}*", dir), false, false) {
            hash = hash.wrapping_add(self.hash_for_file(&format!("{}{}", dir,
                                                                  name)));
        }
        hash
    }
    /// Number of files currently open.
    pub fn open_file_count(&self) -> usize {
        self.inner.lock().handles.len()
    }
    /// Logical paths of every file currently open. Handy for finding leaks.
    pub fn open_files(&self) -> Vec<String> {
        self.inner.lock().handles.paths().map(str::to_owned).collect()
    }
    fn first_answer<T, F>(&self, path: &str, f: F) -> Option<T>
    where F: Fn(&Driver, &str) -> Option<T> {
        let this = self.inner.lock();
        let path = path::normalize(path);
        this.bindings.iter()
            .filter_map(|x| x.translate(&path).map(|suffix| (x, suffix)))
            .find_map(|(x, suffix)| f(&x.driver, suffix))
    }
    /// Duplicates an open file through the driver that produced it.
    pub(crate) fn copy_file_obj(&self, handle: HandleId, path: &str,
                                obj: &FileObj) -> io::Result<(HandleId, FileObj)> {
        let mut this = self.inner.lock();
        let driver = this.handles.driver(handle, path).clone();
        let copy = driver.copy(obj)?;
        let handle = this.handles.insert(driver, path);
        Ok((handle, copy))
    }
    /// Deregisters an open file and lets its driver finish it.
    pub(crate) fn close_file_obj(&self, handle: HandleId, path: &str,
                                 obj: FileObj) -> io::Result<()> {
        let mut this = self.inner.lock();
        let driver = this.handles.remove(handle, path);
        driver.close(obj)
    }
    #[cfg(test)]
    fn release_handle(&self, handle: HandleId, path: &str) {
        self.inner.lock().handles.remove(handle, path);
    }
}

/// Normalizes a mount point and gives it its trailing `/`.
fn canonical_mount_point(mount_point: &str) -> String {
    let mut ret = path::normalize(mount_point).into_owned();
    if !ret.is_empty() && !ret.ends_with('/') { ret.push('/') }
    ret
}

impl FileManagerInner {
    fn mount(&mut self, kind: &str, root: &str, mount_point: &str)
        -> Result<(), MountError> {
        let root = path::normalize(root).into_owned();
        assert!(!root.is_empty(), "mounting {:?} at {:?} needs a root",
                kind, mount_point);
        let mount_point = canonical_mount_point(mount_point);
        let driver = make_driver(kind, &root, |x| self.open_backing(x));
        let driver = match driver {
            Ok(x) => x,
            Err(x) => {
                log::warn!("{}", x);
                return Err(x)
            },
        };
        self.unmount(kind, &root, &mount_point);
        log::info!("mounted {} {:?} at {:?}", kind, root, mount_point);
        self.bindings.push(Binding {
            driver: Arc::new(driver),
            kind: kind.to_owned(),
            root,
            mount_point,
        });
        self.rebuild_mountpoints();
        Ok(())
    }
    fn unmount(&mut self, kind: &str, root: &str, mount_point: &str) -> usize {
        let before = self.bindings.len();
        let mut i = self.bindings.len();
        // back to front, and never the mount point driver at 0
        while i > 1 {
            i -= 1;
            let binding = &self.bindings[i];
            if path::eq_ci(&binding.kind, kind)
                && path::eq_ci(&binding.root, root)
                && path::eq_ci(&binding.mount_point, mount_point) {
                log::info!("unmounted {} {:?} from {:?}", kind, root,
                           mount_point);
                self.bindings.remove(i);
            }
        }
        before - self.bindings.len()
    }
    fn rebuild_mountpoints(&mut self) {
        let (first, rest) = self.bindings.split_at(1);
        if let Some(driver) = first[0].driver.as_mountpoints() {
            driver.load(rest.iter().map(|x| x.mount_point.as_str()));
        }
    }
    /// Fetches an archive's backing file: through the mounted drivers if
    /// they have it, straight from the OS if not.
    fn open_backing(&self, root: &str) -> io::Result<FileObj> {
        match self.resolve_for_reading(root) {
            Ok((_, obj)) => Ok(obj),
            Err(OpenError::NotFound { .. }) =>
                fs::File::open(root).map(|x| {
                    FileObj::Direct(DirectFile::from_os(x, root))
                }),
            Err(x) => Err(x.into()),
        }
    }
    fn resolve_for_reading(&self, path: &str)
        -> Result<(Arc<Driver>, FileObj), OpenError> {
        let mut error = None;
        for binding in self.bindings.iter() {
            match binding.translate(path) {
                None => (),
                Some(suffix) => {
                    match binding.driver.open(suffix, OpenMode::Read, false) {
                        Ok(x) => return Ok((binding.driver.clone(), x)),
                        // "not here" is the least useful thing to report
                        Err(x) if x.kind() == ErrorKind::NotFound => continue,
                        Err(x) => error = Some(x),
                    }
                },
            }
        }
        Err(match error {
            Some(x) => OpenError::from_io(path, x),
            None => OpenError::NotFound { path: path.to_owned() },
        })
    }
    fn open_for_reading(&mut self, path: &str)
        -> Result<(HandleId, FileObj), OpenError> {
        let (driver, obj) = self.resolve_for_reading(path)?;
        Ok((self.handles.insert(driver, path), obj))
    }
    fn open_for_writing(&mut self, path: &str)
        -> Result<(HandleId, FileObj), OpenError> {
        let slow_flush = self.config.uses_slow_flush(path);
        let mut candidates = Vec::new();
        for (i, binding) in self.bindings.iter().enumerate() {
            match binding.translate(path) {
                None => (),
                Some(suffix) => match binding.driver.path_value(suffix) {
                    None => (),
                    Some(value) => candidates.push((i, suffix, value)),
                },
            }
        }
        // stable: among equal values, earlier mounts stay first
        candidates.sort_by_key(|&(_, _, value)| value);
        log::debug!("{}: write candidates (mount, cost) {:?}", path,
                    candidates.iter().map(|&(i, _, value)| {
                        (self.bindings[i].mount_point.as_str(), value)
                    }).collect::<Vec<_>>());
        let mut error = None;
        for (i, suffix, _) in candidates {
            let binding = &self.bindings[i];
            match binding.driver.open(suffix, OpenMode::Write, slow_flush) {
                Ok(x) => {
                    let handle = self.handles.insert(binding.driver.clone(),
                                                     path);
                    return Ok((handle, x))
                },
                // a read-only driver never hides a real failure
                Err(x) if x.kind() == ErrorKind::ReadOnlyFilesystem => (),
                Err(x) => if error.is_none() { error = Some(x) },
            }
        }
        Err(match error {
            Some(x) => OpenError::from_io(path, x),
            None => OpenError::NoWritableLocation { path: path.to_owned() },
        })
    }
}

impl Drop for FileManagerInner {
    fn drop(&mut self) {
        // later mounts may read through earlier ones (an archive inside a
        // mounted directory), so tear down newest first
        while let Some(binding) = self.bindings.pop() {
            log::debug!("tearing down {} {:?} at {:?}", binding.kind,
                        binding.root, binding.mount_point);
        }
    }
}
