//! This is a layered virtual filesystem for games. Directories on disk, zip
//! archives and in-memory caches are mounted into a single logical namespace,
//! and the game reads, writes and lists files without caring which of them a
//! file actually lives in.
//!
//! It is safe to use from any number of threads at once; a
//! [`FileManager`](struct.FileManager.html) is a cheap, cloneable handle to
//! the shared filesystem.
//!
//! # Overview
//!
//! ```rust,no_run
//! # use layered_vfs::{FileManager, OpenMode};
//! # use std::io::Write;
//! let fm = FileManager::new();
//! fm.mount("dir", "/home/me/game", "").unwrap();
//! fm.mount("zip", "/home/me/game/Packs/extra.zip", "").unwrap();
//! for name in fm.dir_listing("Songs/*", true, false) {
//!     println!("{}", name);
//! }
//! let mut stats = fm.open("Save/Stats.xml", OpenMode::Write).unwrap();
//! stats.write_all(b"<Stats/>").unwrap();
//! stats.close().unwrap();
//! ```
//!
//! ## Paths
//!
//! Logical paths use `/` as the separator, though `\` is accepted too. They
//! are normalized before use: runs of separators collapse, `.` components
//! vanish, and `..` removes the component before it. Lookups ignore case, but
//! names are reported with the case they have in storage.
//!
//! See [`normalize`](fn.normalize.html).
//!
//! ## Mounts
//!
//! A mount attaches a driver (`"dir"`, `"zip"` or `"mem"`) to a mount point
//! in the logical tree. All mounts are "union mounts": a directory present in
//! more than one mount shows the entries of all of them.
//!
//! For example, assume you have the following in tree A:
//!
//! - `Songs/`
//!     - `Songs/Pack1/`
//! - `Stats.xml`
//!
//! And the following in tree B:
//!
//! - `Songs/`
//!     - `Songs/Pack2/`
//! - `Stats.xml`
//!
//! If you mount both A and B (in that order) at `""`, you will see this
//! tree:
//!
//! - `Songs/`
//!     - `Songs/Pack1/` (sourced from A)
//!     - `Songs/Pack2/` (sourced from B)
//! - `Stats.xml` (sourced from A)
//!
//! Earlier mounts take priority for reads, as seen above. Writes are
//! different: a file is written to the mount that already has it, or failing
//! that, the mount that already has the most of the directories leading to
//! it. New files end up next to their siblings instead of all landing in
//! whichever mount came first.
//!
//! A mount point doesn't need to exist in any other mount beforehand; its
//! directories are implied by the mount. If you mounted A at `""` and B at
//! `Themes/fnord`, `Themes/` would list `fnord`.
//!
//! The empty mount point is transparent. A mount point starting with `@`
//! (like the default `@mem` cache) is only ever reached by naming it, and
//! transparent mounts never see paths starting with `@`.
//!
//! ## Files
//!
//! [`FileManager::open`](struct.FileManager.html#method.open) returns a
//! [`File`](struct.File.html), which implements `Read`, `Write` and `Seek`.
//! The manager keeps track of every open file and which driver it came
//! from, so a file stays usable even if its mount is removed while it is
//! open.

mod path;
pub use path::{normalize, MOUNT_SCOPED_MARKER};

mod config;
pub use config::ManagerConfig;

mod driver;
pub use driver::{EntryType, OpenMode};

mod error;
pub use error::{MountError, OpenError, StdPathsError};

mod file;
pub use file::File;

mod filedb;

mod handles;
pub use handles::HandleId;

#[cfg(feature = "async")]
mod loader;

mod manager;
pub use manager::{DriverLocation, FileManager};
