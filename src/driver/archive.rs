use crate::*;
use crate::driver::FileObj;
use crate::filedb::{Entry, FileDb};

use std::{
    io,
    io::{Cursor, ErrorKind, Read, Seek, SeekFrom, Write},
    sync::Arc,
};
use parking_lot::Mutex;
use zip::ZipArchive;

/// Most we preallocate for one entry before seeing its data.
const MAX_SIZE_HINT: u64 = 1 << 20;

/// Read-only view of a zip archive.
///
/// The central directory is indexed once, at mount time. Opening a file
/// decompresses the whole entry into memory.
pub(crate) struct ArchiveDriver {
    zip: Mutex<ZipArchive<FileObj>>,
    db: Mutex<FileDb>,
    root: String,
}

#[derive(Clone)]
pub(crate) struct ArchiveFile {
    data: Cursor<Arc<[u8]>>,
    path: String,
}

impl ArchiveFile {
    pub fn path(&self) -> &str { &self.path }
}

impl Read for ArchiveFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.data.read(buf)
    }
}

impl Write for ArchiveFile {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(ErrorKind::ReadOnlyFilesystem))
    }
    fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Seek for ArchiveFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.data.seek(pos)
    }
}

impl ArchiveDriver {
    /// Indexes the archive readable through `backing`. `root` only names it
    /// in messages.
    pub fn new(root: &str, backing: FileObj) -> io::Result<ArchiveDriver> {
        let mut zip = ZipArchive::new(backing).map_err(io::Error::other)?;
        let mut db = FileDb::new_static();
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i).map_err(io::Error::other)?;
            let name = path::normalize(entry.name()).into_owned();
            if path::components(&name).next().is_none() {
                continue
            }
            let (kind, size, hash) = if entry.is_dir() {
                (EntryType::Dir, 0, 0)
            }
            else {
                (EntryType::File, entry.size(), entry.crc32())
            };
            db.add(&name, Entry { name: String::new(), kind, size, hash,
                                  locator: i });
        }
        log::debug!("{}: indexed {} archive entries", root, zip.len());
        Ok(ArchiveDriver { zip: Mutex::new(zip), db: Mutex::new(db),
                           root: root.to_owned() })
    }
    pub fn db(&self) -> &Mutex<FileDb> { &self.db }
    pub fn open(&self, path: &str, mode: OpenMode) -> io::Result<ArchiveFile> {
        if mode == OpenMode::Write {
            return Err(io::Error::from(ErrorKind::ReadOnlyFilesystem))
        }
        let entry = match self.db.lock().lookup(path) {
            Some(x) if x.kind == EntryType::File => x,
            Some(_) => return Err(io::Error::from(ErrorKind::IsADirectory)),
            None => return Err(io::Error::from(ErrorKind::NotFound)),
        };
        let mut zip = self.zip.lock();
        let mut file = zip.by_index(entry.locator).map_err(|x| {
            io::Error::other(format!("{}: {}: {}", self.root, path, x))
        })?;
        // the central directory's size is only a hint
        let mut data = Vec::with_capacity(entry.size.min(MAX_SIZE_HINT)
                                          as usize);
        file.read_to_end(&mut data)?;
        Ok(ArchiveFile { data: Cursor::new(data.into()),
                         path: path.to_owned() })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::DirectFile;
    use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

    fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored);
        for (name, data) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            }
            else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(data).unwrap();
            }
        }
        zip.finish().unwrap().into_inner()
    }
    fn archive_from(bytes: &[u8]) -> ArchiveDriver {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let backing = FileObj::Direct(DirectFile::from_os(file, "test.zip"));
        ArchiveDriver::new("test.zip", backing).unwrap()
    }
    fn archive(entries: &[(&str, &[u8])]) -> ArchiveDriver {
        archive_from(&zip_bytes(entries))
    }
    #[test] fn indexing() {
        let driver = archive(&[
            ("Songs/", b""),
            ("Songs/Pack/Song.sm", b"#TITLE:Zipped;"),
            ("Songs/Pack/song.ogg", b"OggS"),
            ("./Themes/readme.txt", b"hi"),
        ]);
        let mut db = driver.db().lock();
        assert_eq!(db.file_type("songs/pack"), Some(EntryType::Dir));
        assert_eq!(db.file_type("Themes/README.txt"), Some(EntryType::File));
        assert_eq!(db.lookup("Songs/Pack/Song.sm").map(|x| x.size), Some(14));
        let mut out = vec![];
        db.listing("Songs/Pack/*", false, false, &mut out);
        assert_eq!(out, &["song.ogg", "Song.sm"]);
    }
    #[test] fn reading() {
        let driver = archive(&[("Songs/Pack/Song.sm", b"#TITLE:Zipped;")]);
        let mut file = driver.open("SONGS/pack/song.sm", OpenMode::Read)
            .unwrap();
        let mut buf = String::new();
        file.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "#TITLE:Zipped;");
        assert_eq!(driver.open("Songs/Pack", OpenMode::Read).err().unwrap()
                   .kind(), ErrorKind::IsADirectory);
        assert_eq!(driver.open("Songs/x.sm", OpenMode::Read).err().unwrap()
                   .kind(), ErrorKind::NotFound);
        assert_eq!(driver.open("Songs/Pack/Song.sm", OpenMode::Write).err()
                   .unwrap().kind(), ErrorKind::ReadOnlyFilesystem);
    }
    #[test] fn huge_claimed_sizes() {
        let mut bytes = zip_bytes(&[("Songs/x.sm", b"#TITLE:Small;")]);
        // uncompressed size field of the central directory header
        let header = bytes.windows(4).position(|x| x == b"PK\x01\x02")
            .unwrap();
        bytes[header+24..header+28].copy_from_slice(&0xFFFF_FFF0u32
                                                    .to_le_bytes());
        let driver = archive_from(&bytes);
        assert_eq!(driver.db().lock().lookup("Songs/x.sm").map(|x| x.size),
                   Some(0xFFFF_FFF0));
        // the data itself is still the thirteen bytes that are there
        if let Ok(mut file) = driver.open("Songs/x.sm", OpenMode::Read) {
            let mut buf = String::new();
            file.read_to_string(&mut buf).unwrap();
            assert_eq!(buf, "#TITLE:Small;");
        }
    }
    #[test] fn garbage_is_rejected() {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"this is not a zip file").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let backing = FileObj::Direct(DirectFile::from_os(file, "junk.zip"));
        assert!(ArchiveDriver::new("junk.zip", backing).is_err());
    }
}
