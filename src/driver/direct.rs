use crate::*;
use crate::filedb::FileDb;

use std::{
    fs,
    io,
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
    path::PathBuf as StdPathBuf,
};
use parking_lot::Mutex;

/// Pass-through to a directory on the OS filesystem.
pub(crate) struct DirectDriver {
    root: StdPathBuf,
    db: Mutex<FileDb>,
}

pub(crate) struct DirectFile {
    file: fs::File,
    path: String,
    writable: bool,
    slow_flush: bool,
}

impl DirectFile {
    /// Wraps a file opened outside any driver (an archive's backing file).
    pub fn from_os(file: fs::File, path: &str) -> DirectFile {
        DirectFile { file, path: path.to_owned(), writable: false,
                     slow_flush: false }
    }
    pub fn path(&self) -> &str { &self.path }
}

impl Read for DirectFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for DirectFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(ErrorKind::PermissionDenied,
                                      format!("{}: opened for reading",
                                              self.path)))
        }
        self.file.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()?;
        if self.writable && self.slow_flush {
            self.file.sync_all()?;
        }
        Ok(())
    }
}

impl Seek for DirectFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file.seek(pos)
    }
}

impl DirectDriver {
    pub fn new(root: &str) -> io::Result<DirectDriver> {
        let root = StdPathBuf::from(root);
        if !fs::metadata(&root)?.is_dir() {
            return Err(io::Error::from(ErrorKind::NotADirectory))
        }
        Ok(DirectDriver { db: Mutex::new(FileDb::on_disk(root.clone())), root })
    }
    pub fn db(&self) -> &Mutex<FileDb> { &self.db }
    fn os_path(&self, db: &mut FileDb, path: &str) -> StdPathBuf {
        // `real_path` drops any leading `/`, so this never escapes the root
        self.root.join(db.real_path(path))
    }
    pub fn open(&self, path: &str, mode: OpenMode, slow_flush: bool)
        -> io::Result<DirectFile> {
        let mut db = self.db.lock();
        let os_path = self.os_path(&mut db, path);
        match mode {
            OpenMode::Read => {
                drop(db);
                let file = fs::File::open(&os_path)?;
                if file.metadata()?.is_dir() {
                    return Err(io::Error::from(ErrorKind::IsADirectory))
                }
                Ok(DirectFile { file, path: path.to_owned(), writable: false,
                                slow_flush: false })
            },
            OpenMode::Write => {
                if let Some(parent) = os_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let file = fs::OpenOptions::new().write(true).create(true)
                    .truncate(true).open(&os_path)?;
                db.forget_ancestors(path);
                Ok(DirectFile { file, path: path.to_owned(), writable: true,
                                slow_flush })
            },
        }
    }
    pub fn remove(&self, path: &str) -> bool {
        if path::components(path).next().is_none() {
            return false
        }
        let mut db = self.db.lock();
        let kind = match db.file_type(path) {
            Some(x) => x,
            None => return false,
        };
        let os_path = self.os_path(&mut db, path);
        let result = match kind {
            EntryType::File => fs::remove_file(&os_path),
            EntryType::Dir => fs::remove_dir(&os_path),
        };
        match result {
            Ok(()) => {
                db.forget_ancestors(path);
                db.flush(path);
                true
            },
            Err(x) => {
                log::warn!("removing {:?}: {}", os_path, x);
                false
            },
        }
    }
    pub fn ready(&self) -> bool {
        self.root.is_dir()
    }
    /// Reopens the same file and moves to the same position. Files being
    /// written can't be copied.
    pub fn copy(&self, file: &DirectFile) -> io::Result<DirectFile> {
        if file.writable {
            return Err(io::Error::new(ErrorKind::Unsupported,
                                      format!("{}: can't copy a file opened \
                                               for writing", file.path)))
        }
        let position = (&file.file).stream_position()?;
        let os_path = self.os_path(&mut self.db.lock(), &file.path);
        let mut copy = fs::File::open(os_path)?;
        copy.seek(SeekFrom::Start(position))?;
        Ok(DirectFile { file: copy, path: file.path.clone(), writable: false,
                        slow_flush: false })
    }
    pub fn close(&self, mut file: DirectFile) -> io::Result<()> {
        let result = file.flush();
        if file.writable {
            // size and hash changed under the cache
            self.db.lock().forget_ancestors(&file.path);
        }
        result
    }
}
