//! Loading from async code.
//!
//! Every manager operation does blocking I/O under a lock. These run it on
//! Tokio's blocking pool, so a song wheel full of banners never stalls a
//! runtime worker.

use crate::*;

use std::io;
use tokio::task;

fn join_error(x: task::JoinError) -> io::Error {
    io::Error::other(x)
}

impl FileManager {
    /// [`read_to_end`](Self::read_to_end) on the blocking pool.
    pub async fn read_async(&self, path: &str) -> io::Result<Vec<u8>> {
        let fm = self.clone();
        let path = path.to_owned();
        task::spawn_blocking(move || fm.read_to_end(&path))
            .await.map_err(join_error)?
            .map_err(io::Error::from)
    }
    /// [`dir_listing`](Self::dir_listing) on the blocking pool.
    pub async fn dir_listing_async(&self, path: &str, only_dirs: bool,
                                   include_path: bool)
        -> io::Result<Vec<String>> {
        let fm = self.clone();
        let path = path.to_owned();
        task::spawn_blocking(move || {
            fm.dir_listing(&path, only_dirs, include_path)
        }).await.map_err(join_error)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;
    #[tokio::test] async fn async_reads() {
        let fm = FileManager::new();
        let mut file = fm.open("@mem/Songs/Pack/Song.sm", OpenMode::Write)
            .unwrap();
        file.write_all(b"#TITLE:Async;").unwrap();
        file.close().unwrap();
        assert_eq!(fm.read_async("@mem/songs/pack/song.sm").await.unwrap(),
                   b"#TITLE:Async;");
        assert_eq!(fm.read_async("@mem/missing").await.err().unwrap().kind(),
                   io::ErrorKind::NotFound);
        assert_eq!(fm.dir_listing_async("@mem/Songs/*", true, true).await
                   .unwrap(), &["@mem/Songs/Pack"]);
    }
}
