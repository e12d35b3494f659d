use crate::*;
use crate::filedb::{Entry, FileDb};

use parking_lot::Mutex;

/// Makes mount points show up as directories.
///
/// If `Themes/default/` is a mount point and nothing else has a `Themes`
/// directory, listing `Themes/*` still has to return `default`. The driver
/// mounted there can't help: its world begins inside `Themes/default/`. This
/// driver has no content of its own, only the directories implied by the
/// current mount points.
pub(crate) struct MountpointDriver {
    db: Mutex<FileDb>,
}

impl MountpointDriver {
    pub fn new() -> MountpointDriver {
        MountpointDriver { db: Mutex::new(FileDb::new_static()) }
    }
    pub fn db(&self) -> &Mutex<FileDb> { &self.db }
    /// Rebuilds the directory set from scratch. Mount points reachable only
    /// by explicit prefix (`@mem/`) and the OS root (`/`) are left out, since
    /// nothing transparent can see them anyway.
    pub fn load<'a, I>(&self, mount_points: I)
    where I: IntoIterator<Item=&'a str> {
        let mut db = self.db.lock();
        db.clear();
        for point in mount_points {
            if point.starts_with(path::MOUNT_SCOPED_MARKER)
                || path::components(point).next().is_none() {
                continue
            }
            db.add(point, Entry { name: String::new(), kind: EntryType::Dir,
                                  size: 0, hash: 0, locator: 0 });
        }
    }
}
