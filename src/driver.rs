//! Storage backends.
//!
//! A driver sees paths relative to its own root: the mount table has already
//! stripped the mount point off. Every driver keeps a `FileDb` of its
//! directory entries and answers type, size, hash and listing queries from
//! it.
//!
//! Drivers report failures as `io::Error`s. The manager cares about three
//! kinds in particular:
//!
//! - `NotFound`: this driver doesn't have the path. Least interesting error.
//! - `ReadOnlyFilesystem`: this driver can't write at all.
//! - `NotADirectory` / `IsADirectory`: some component of the path exists with
//!   the wrong type.

use crate::*;

use std::{
    io,
    io::{ErrorKind, Read, Seek, SeekFrom, Write},
};

mod direct;
mod memory;
mod mountpoints;
#[cfg(feature = "zip")]
mod archive;

pub(crate) use direct::{DirectDriver, DirectFile};
pub(crate) use memory::{MemoryDriver, MemoryFile};
pub(crate) use mountpoints::MountpointDriver;
#[cfg(feature = "zip")]
pub(crate) use archive::{ArchiveDriver, ArchiveFile};

/// What a path refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Dir,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpenMode {
    Read,
    /// Create or truncate.
    Write,
}

pub(crate) enum Driver {
    Direct(DirectDriver),
    #[cfg(feature = "zip")]
    Archive(ArchiveDriver),
    Memory(MemoryDriver),
    Mountpoints(MountpointDriver),
}

/// Runs `$body` with `$d` bound to whichever driver is inside.
macro_rules! dispatch {
    ($driver:expr, $d:ident => $body:expr) => {
        match $driver {
            Driver::Direct($d) => $body,
            #[cfg(feature = "zip")]
            Driver::Archive($d) => $body,
            Driver::Memory($d) => $body,
            Driver::Mountpoints($d) => $body,
        }
    };
}

impl Driver {
    pub fn open(&self, path: &str, mode: OpenMode, slow_flush: bool)
        -> io::Result<FileObj> {
        match self {
            Driver::Direct(d) =>
                d.open(path, mode, slow_flush).map(FileObj::Direct),
            #[cfg(feature = "zip")]
            Driver::Archive(d) => d.open(path, mode).map(FileObj::Archive),
            Driver::Memory(d) => d.open(path, mode).map(FileObj::Memory),
            Driver::Mountpoints(_) => Err(match mode {
                OpenMode::Write => io::Error::from(ErrorKind::ReadOnlyFilesystem),
                OpenMode::Read => io::Error::from(ErrorKind::NotFound),
            }),
        }
    }
    /// Appends the matches of a listing request to `out`. With
    /// `include_path`, results carry the (driver-relative) directory too.
    pub fn dir_listing(&self, path: &str, only_dirs: bool, include_path: bool,
                       out: &mut Vec<String>) {
        dispatch!(self, d => d.db().lock().listing(path, only_dirs,
                                                   include_path, out))
    }
    pub fn remove(&self, path: &str) -> bool {
        match self {
            Driver::Direct(d) => d.remove(path),
            Driver::Memory(d) => d.remove(path),
            _ => false,
        }
    }
    pub fn file_type(&self, path: &str) -> Option<EntryType> {
        dispatch!(self, d => d.db().lock().file_type(path))
    }
    pub fn file_size(&self, path: &str) -> Option<u64> {
        match self {
            Driver::Memory(d) => d.file_size(path),
            _ => dispatch!(self, d => d.db().lock().lookup(path)
                           .filter(|x| x.kind == EntryType::File)
                           .map(|x| x.size)),
        }
    }
    pub fn file_hash(&self, path: &str) -> Option<u32> {
        match self {
            Driver::Memory(d) => d.file_hash(path),
            _ => dispatch!(self, d => d.db().lock().lookup(path)
                           .map(|x| x.hash)),
        }
    }
    /// How many path components writing `path` would create, or `None` if
    /// this driver can't write it. Read-only drivers can never create
    /// anything.
    pub fn path_value(&self, path: &str) -> Option<u32> {
        match self {
            #[cfg(feature = "zip")]
            Driver::Archive(_) => None,
            _ => dispatch!(self, d => d.db().lock().path_value(path)),
        }
    }
    /// False while removable media isn't there.
    pub fn ready(&self) -> bool {
        match self {
            Driver::Direct(d) => d.ready(),
            _ => true,
        }
    }
    pub fn flush_dir_cache(&self, path: &str) {
        match self {
            // rebuilt wholesale on every mount change instead
            Driver::Mountpoints(_) => (),
            _ => dispatch!(self, d => d.db().lock().flush(path)),
        }
    }
    /// Makes an independent copy of a file object this driver produced.
    pub fn copy(&self, obj: &FileObj) -> io::Result<FileObj> {
        match (self, obj) {
            (Driver::Direct(d), FileObj::Direct(f)) =>
                d.copy(f).map(FileObj::Direct),
            #[cfg(feature = "zip")]
            (Driver::Archive(_), FileObj::Archive(f)) =>
                Ok(FileObj::Archive(f.clone())),
            (Driver::Memory(_), FileObj::Memory(f)) =>
                Ok(FileObj::Memory(f.clone())),
            _ => panic!("{}: file object routed to a driver that didn't \
                         create it", obj.display_path()),
        }
    }
    /// Finishes a file object this driver produced and destroys it.
    pub fn close(&self, obj: FileObj) -> io::Result<()> {
        match (self, obj) {
            (Driver::Direct(d), FileObj::Direct(f)) => d.close(f),
            (_, FileObj::Memory(mut f)) => f.flush(),
            _ => Ok(()),
        }
    }
    pub fn as_mountpoints(&self) -> Option<&MountpointDriver> {
        match self {
            Driver::Mountpoints(d) => Some(d),
            _ => None,
        }
    }
}

/// Instantiates the driver for a type tag (`"dir"`, `"zip"`, `"mem"`,
/// case-insensitive). `open_backing` fetches the bytes of an archive named
/// by `root`.
pub(crate) fn make_driver<F>(kind: &str, root: &str, open_backing: F)
    -> Result<Driver, MountError>
where F: FnOnce(&str) -> io::Result<FileObj> {
    let wrap = |source| MountError::Driver {
        kind: kind.to_owned(), root: root.to_owned(), source,
    };
    match kind.to_ascii_lowercase().as_str() {
        "dir" => DirectDriver::new(root).map(Driver::Direct).map_err(wrap),
        #[cfg(feature = "zip")]
        "zip" => open_backing(root).and_then(|backing| {
            ArchiveDriver::new(root, backing)
        }).map(Driver::Archive).map_err(wrap),
        "mem" => Ok(Driver::Memory(MemoryDriver::new())),
        _ => {
            let _ = open_backing;
            Err(MountError::UnknownType { kind: kind.to_owned() })
        },
    }
}

/// An open file, as produced by exactly one driver.
pub(crate) enum FileObj {
    Direct(DirectFile),
    #[cfg(feature = "zip")]
    Archive(ArchiveFile),
    Memory(MemoryFile),
}

macro_rules! dispatch_obj {
    ($obj:expr, $f:ident => $body:expr) => {
        match $obj {
            FileObj::Direct($f) => $body,
            #[cfg(feature = "zip")]
            FileObj::Archive($f) => $body,
            FileObj::Memory($f) => $body,
        }
    };
}

impl FileObj {
    /// The driver-relative path this object was opened with.
    pub fn display_path(&self) -> &str {
        dispatch_obj!(self, f => f.path())
    }
}

impl Read for FileObj {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        dispatch_obj!(self, f => f.read(buf))
    }
}

impl Write for FileObj {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        dispatch_obj!(self, f => f.write(buf))
    }
    fn flush(&mut self) -> io::Result<()> {
        dispatch_obj!(self, f => f.flush())
    }
}

impl Seek for FileObj {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        dispatch_obj!(self, f => f.seek(pos))
    }
}
