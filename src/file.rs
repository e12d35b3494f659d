use crate::*;
use crate::driver::FileObj;
use crate::handles::HandleId;

use std::{
    fmt,
    io,
    io::{Read, Seek, SeekFrom, Write},
};

/// A file opened through a [`FileManager`].
///
/// Dropping it closes it. Call [`close`](Self::close) instead to find out
/// whether the final flush worked.
pub struct File {
    manager: FileManager,
    handle: HandleId,
    /// `None` only once closed.
    obj: Option<FileObj>,
    path: String,
}

impl File {
    pub(crate) fn new(manager: FileManager, handle: HandleId, obj: FileObj,
                      path: String) -> File {
        File { manager, handle, obj: Some(obj), path }
    }
    /// The normalized logical path this file was opened with.
    pub fn path(&self) -> &str { &self.path }
    pub fn handle(&self) -> HandleId { self.handle }
    fn obj(&mut self) -> &mut FileObj {
        match self.obj.as_mut() {
            Some(x) => x,
            None => unreachable!("{}: used after close", self.path),
        }
    }
    /// An independent file on the same contents, at the same position. Not
    /// every driver can copy a file that is being written.
    pub fn try_clone(&self) -> io::Result<File> {
        let obj = match self.obj.as_ref() {
            Some(x) => x,
            None => unreachable!("{}: used after close", self.path),
        };
        let (handle, obj) = self.manager.copy_file_obj(self.handle,
                                                       &self.path, obj)?;
        Ok(File::new(self.manager.clone(), handle, obj, self.path.clone()))
    }
    /// Flushes and closes the file, reporting any error.
    pub fn close(mut self) -> io::Result<()> {
        self.finish()
    }
    fn finish(&mut self) -> io::Result<()> {
        match self.obj.take() {
            None => Ok(()),
            Some(obj) => self.manager.close_file_obj(self.handle, &self.path,
                                                     obj),
        }
    }
}

impl fmt::Debug for File {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("File").field("path", &self.path)
            .field("handle", &self.handle).finish()
    }
}

impl Drop for File {
    fn drop(&mut self) {
        // a panic may have come from the handle table itself
        if std::thread::panicking() { return }
        if let Err(x) = self.finish() {
            log::error!("{}: error closing: {}", self.path, x);
        }
    }
}

impl Read for File {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.obj().read(buf)
    }
}

impl Write for File {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.obj().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.obj().flush()
    }
}

impl Seek for File {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.obj().seek(pos)
    }
}
