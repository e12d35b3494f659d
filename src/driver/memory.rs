use crate::*;
use crate::filedb::{Entry, FileDb};

use std::{
    collections::HashMap,
    io,
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    sync::Arc,
};
use parking_lot::{Mutex, RwLock};

#[derive(Default)]
struct MemNode {
    data: Vec<u8>,
    /// Bumped on every write; doubles as the file hash.
    generation: u32,
}

/// In-process file store, e.g. the `@mem` cache.
///
/// Open files share their contents with the store, so a write through one
/// handle is visible through every other handle and to later opens.
pub(crate) struct MemoryDriver {
    db: Mutex<FileDb>,
    /// Keyed by folded path.
    files: Mutex<HashMap<String, Arc<RwLock<MemNode>>>>,
}

#[derive(Clone)]
pub(crate) struct MemoryFile {
    node: Arc<RwLock<MemNode>>,
    position: u64,
    writable: bool,
    path: String,
}

impl MemoryFile {
    pub fn path(&self) -> &str { &self.path }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let node = self.node.read();
        let start = (self.position as usize).min(node.data.len());
        let count = buf.len().min(node.data.len() - start);
        buf[..count].copy_from_slice(&node.data[start..start+count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(ErrorKind::PermissionDenied,
                                      format!("{}: opened for reading",
                                              self.path)))
        }
        let mut node = self.node.write();
        let start = self.position as usize;
        let end = start + buf.len();
        if node.data.len() < end {
            node.data.resize(end, 0);
        }
        node.data[start..end].copy_from_slice(buf);
        node.generation = node.generation.wrapping_add(1);
        self.position = end as u64;
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.node.read().data.len() as u64;
        let target = match pos {
            SeekFrom::Start(x) => Some(x),
            SeekFrom::End(x) => len.checked_add_signed(x),
            SeekFrom::Current(x) => self.position.checked_add_signed(x),
        };
        match target {
            Some(x) => {
                self.position = x;
                Ok(x)
            },
            None => Err(io::Error::new(ErrorKind::InvalidInput,
                                       "seek before start or past u64")),
        }
    }
}

impl MemoryDriver {
    pub fn new() -> MemoryDriver {
        MemoryDriver {
            db: Mutex::new(FileDb::new_static()),
            files: Mutex::new(HashMap::new()),
        }
    }
    pub fn db(&self) -> &Mutex<FileDb> { &self.db }
    fn node(&self, path: &str) -> Option<Arc<RwLock<MemNode>>> {
        self.files.lock().get(&path::fold(path)).cloned()
    }
    pub fn open(&self, path: &str, mode: OpenMode) -> io::Result<MemoryFile> {
        let mut db = self.db.lock();
        match mode {
            OpenMode::Read => match db.file_type(path) {
                Some(EntryType::File) => (),
                Some(EntryType::Dir) =>
                    return Err(io::Error::from(ErrorKind::IsADirectory)),
                None => return Err(io::Error::from(ErrorKind::NotFound)),
            },
            OpenMode::Write => {
                if db.path_value(path).is_none() {
                    return Err(io::Error::from(ErrorKind::NotADirectory))
                }
                let name = path.rsplit('/').next().unwrap_or(path);
                db.add(path, Entry { name: name.to_owned(),
                                     kind: EntryType::File, size: 0, hash: 0,
                                     locator: 0 });
                let mut files = self.files.lock();
                let node = files.entry(path::fold(path)).or_default();
                let mut node = node.write();
                node.data.clear();
                node.generation = node.generation.wrapping_add(1);
            },
        }
        let node = self.node(path)
            .ok_or_else(|| io::Error::from(ErrorKind::NotFound))?;
        Ok(MemoryFile { node, position: 0, writable: mode == OpenMode::Write,
                        path: path.to_owned() })
    }
    pub fn remove(&self, path: &str) -> bool {
        let mut db = self.db.lock();
        match db.file_type(path) {
            Some(EntryType::File) => {
                self.files.lock().remove(&path::fold(path));
            },
            Some(EntryType::Dir) => {
                if path::components(path).next().is_none()
                    || !db.is_empty_dir(path) {
                    return false
                }
            },
            None => return false,
        }
        db.remove(path);
        true
    }
    pub fn file_size(&self, path: &str) -> Option<u64> {
        self.node(path).map(|x| x.read().data.len() as u64)
    }
    pub fn file_hash(&self, path: &str) -> Option<u32> {
        self.node(path).map(|x| {
            let node = x.read();
            node.generation.wrapping_add(node.data.len() as u32)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    fn write(driver: &MemoryDriver, path: &str, data: &[u8]) {
        let mut file = driver.open(path, OpenMode::Write).unwrap();
        file.write_all(data).unwrap();
    }
    #[test] fn round_trip() {
        let driver = MemoryDriver::new();
        write(&driver, "Banners/Pack.png", b"banner");
        assert_eq!(driver.db().lock().file_type("banners"),
                   Some(EntryType::Dir));
        let mut file = driver.open("BANNERS/pack.png", OpenMode::Read).unwrap();
        let mut buf = vec![];
        file.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"banner");
        assert_eq!(driver.file_size("banners/pack.png"), Some(6));
        assert_eq!(file.write(b"x").err().unwrap().kind(),
                   ErrorKind::PermissionDenied);
    }
    #[test] fn shared_contents() {
        let driver = MemoryDriver::new();
        write(&driver, "a", b"first");
        let mut reader = driver.open("a", OpenMode::Read).unwrap();
        let hash = driver.file_hash("a");
        write(&driver, "a", b"second!");
        assert_ne!(driver.file_hash("a"), hash);
        let mut buf = String::new();
        reader.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "second!");
    }
    #[test] fn seeking() {
        let driver = MemoryDriver::new();
        let mut file = driver.open("f", OpenMode::Write).unwrap();
        file.write_all(b"0123456789").unwrap();
        assert_eq!(file.seek(SeekFrom::End(-3)).unwrap(), 7);
        let mut copy = file.clone();
        let mut buf = String::new();
        copy.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "789");
        assert!(file.seek(SeekFrom::Current(-20)).is_err());
        let far = file.seek(SeekFrom::End(i64::MAX)).unwrap();
        assert_eq!(far, 10 + i64::MAX as u64);
        assert_eq!(file.seek(SeekFrom::Current(i64::MAX)).err().unwrap()
                   .kind(), ErrorKind::InvalidInput);
        assert_eq!(file.seek(SeekFrom::Current(0)).unwrap(), far);
        file.seek(SeekFrom::Start(12)).unwrap();
        file.write_all(b"!").unwrap();
        assert_eq!(driver.file_size("f"), Some(13));
    }
    #[test] fn conflicts_and_removal() {
        let driver = MemoryDriver::new();
        write(&driver, "dir/file", b"x");
        assert_eq!(driver.open("dir/file/under", OpenMode::Write).err()
                   .unwrap().kind(), ErrorKind::NotADirectory);
        assert_eq!(driver.open("dir", OpenMode::Read).err().unwrap().kind(),
                   ErrorKind::IsADirectory);
        assert!(!driver.remove("dir"));
        assert!(driver.remove("DIR/FILE"));
        assert!(driver.open("dir/file", OpenMode::Read).is_err());
        assert!(driver.remove("dir"));
        assert!(!driver.remove("dir"));
        assert!(!driver.remove(""));
    }
}
