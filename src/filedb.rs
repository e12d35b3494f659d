//! Cached directory entries, shared by every driver.
//!
//! A `FileDb` maps each known directory to the set of entries inside it.
//! Names are looked up case-insensitively and reported with their stored
//! case. A database backed by disk populates directories lazily from the OS
//! and can be flushed; a static database only knows what was added to it.

use crate::{path, EntryType};

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path as StdPath, PathBuf as StdPathBuf},
    time::UNIX_EPOCH,
};
use regex::Regex;

#[derive(Clone, Debug)]
pub(crate) struct Entry {
    /// Name as stored, single component.
    pub name: String,
    pub kind: EntryType,
    pub size: u64,
    /// Fingerprint for cache invalidation (mtime and size on disk, CRC in
    /// archives).
    pub hash: u32,
    /// Driver-private locator (archive entry index).
    pub locator: usize,
}

impl Entry {
    fn new(name: &str, kind: EntryType) -> Entry {
        Entry { name: name.to_owned(), kind, size: 0, hash: 0, locator: 0 }
    }
}

#[derive(Default, Debug)]
struct DirSet {
    /// Keyed by folded name, so iteration is case-insensitively sorted.
    entries: BTreeMap<String, Entry>,
}

#[derive(Debug)]
enum Backing {
    Static,
    Disk(StdPathBuf),
}

/// A listing mask: the last component of a listing request.
enum Mask {
    All,
    Pattern(Regex),
}

impl Mask {
    fn new(mask: &str) -> Mask {
        if mask.is_empty() || mask == "*" {
            return Mask::All
        }
        let pattern = mask.split('*').map(regex::escape)
            .collect::<Vec<_>>().join(".*");
        Regex::new(&format!("(?i)^{}$", pattern))
            .map_or(Mask::All, Mask::Pattern)
    }
    fn matches(&self, name: &str) -> bool {
        match self {
            Mask::All => true,
            Mask::Pattern(x) => x.is_match(name),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FileDb {
    backing: Backing,
    /// Keyed by folded directory path without trailing `/`; `""` is the root.
    dirs: HashMap<String, DirSet>,
}

fn read_dir_set(os_path: &StdPath) -> Option<DirSet> {
    let dir = match fs::read_dir(os_path) {
        Ok(x) => x,
        Err(_) => return None,
    };
    let mut set = DirSet::default();
    for entry in dir.flatten() {
        let name = match entry.file_name().to_str() {
            Some(x) => x.to_owned(),
            None => continue,
        };
        // follow symlinks, the way opening the file would
        let meta = match fs::metadata(entry.path()) {
            Ok(x) => x,
            Err(_) => continue,
        };
        let kind = if meta.is_dir() { EntryType::Dir } else { EntryType::File };
        let size = if meta.is_dir() { 0 } else { meta.len() };
        let mtime = meta.modified().ok()
            .and_then(|x| x.duration_since(UNIX_EPOCH).ok())
            .map(|x| x.as_secs() as u32)
            .unwrap_or(0);
        let hash = mtime.wrapping_add(size as u32);
        set.entries.insert(path::fold(&name),
                           Entry { name, kind, size, hash, locator: 0 });
    }
    Some(set)
}

impl FileDb {
    pub fn new_static() -> FileDb {
        let mut dirs = HashMap::new();
        dirs.insert(String::new(), DirSet::default());
        FileDb { backing: Backing::Static, dirs }
    }
    pub fn on_disk(root: StdPathBuf) -> FileDb {
        FileDb { backing: Backing::Disk(root), dirs: HashMap::new() }
    }
    /// Makes sure the given directory is cached, if it exists. Returns false
    /// if it doesn't.
    fn ensure(&mut self, dir: &str) -> bool {
        let key = path::fold(dir);
        if self.dirs.contains_key(&key) { return true }
        let root = match &self.backing {
            Backing::Disk(x) => x.clone(),
            Backing::Static => return false,
        };
        let real = self.real_path(dir);
        match read_dir_set(&root.join(real)) {
            Some(set) => {
                self.dirs.insert(key, set);
                true
            },
            None => false,
        }
    }
    /// Finds `name` inside `dir`, populating `dir` if needed.
    fn entry_in(&mut self, dir: &str, name: &str) -> Option<&Entry> {
        if !self.ensure(dir) { return None }
        self.dirs.get(&path::fold(dir))
            .and_then(|set| set.entries.get(&path::fold(name)))
    }
    /// Resolves the stored case of every component of `path` that is known.
    /// Components that don't exist yet keep the case they were given in.
    pub fn real_path(&mut self, path: &str) -> String {
        let mut ret = String::with_capacity(path.len());
        for component in path::components(path) {
            let found = self.entry_in(&ret, component).map(|x| x.name.clone());
            match found {
                Some(name) => ret.push_str(&name),
                None => ret.push_str(component),
            }
            ret.push('/');
        }
        if !path.ends_with('/') { ret.pop(); }
        ret
    }
    pub fn lookup(&mut self, path: &str) -> Option<Entry> {
        let trimmed = path.trim_end_matches('/');
        if path::components(trimmed).next().is_none() {
            return Some(Entry::new("", EntryType::Dir))
        }
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        self.entry_in(path::parent(trimmed), name).cloned()
    }
    pub fn file_type(&mut self, path: &str) -> Option<EntryType> {
        self.lookup(path).map(|x| x.kind)
    }
    /// Appends the entries of a listing request (`dir/mask`) to `out`.
    pub fn listing(&mut self, request: &str, only_dirs: bool,
                   include_path: bool, out: &mut Vec<String>) {
        let (dir, mask) = path::split_mask(request);
        if !self.ensure(dir) { return }
        let mask = Mask::new(mask);
        let set = match self.dirs.get(&path::fold(dir)) {
            Some(x) => x,
            None => return,
        };
        for entry in set.entries.values() {
            if only_dirs && entry.kind != EntryType::Dir { continue }
            if !mask.matches(&entry.name) { continue }
            if include_path {
                out.push(format!("{}{}", dir, entry.name));
            }
            else {
                out.push(entry.name.clone());
            }
        }
    }
    /// The number of path components that would have to be created to make
    /// `path` a writable file, 0 if it already is one, or `None` if some
    /// component has the wrong type.
    pub fn path_value(&mut self, path: &str) -> Option<u32> {
        let parts: Vec<&str> = path::components(path).collect();
        if parts.is_empty() { return None }
        let mut dir = String::new();
        for (i, part) in parts.iter().enumerate() {
            let last = i + 1 == parts.len();
            match self.entry_in(&dir, part).map(|x| x.kind) {
                None => return Some((parts.len() - i) as u32),
                Some(EntryType::Dir) if last => return None,
                Some(EntryType::File) if !last => return None,
                Some(EntryType::File) => return Some(0),
                Some(EntryType::Dir) => {
                    dir.push_str(part);
                    dir.push('/');
                },
            }
        }
        Some(0)
    }
    /// Records a file or directory, creating any missing parents. Replaces
    /// an existing entry of the same name.
    pub fn add(&mut self, path: &str, entry: Entry) {
        let parts: Vec<&str> = path::components(path).collect();
        let mut dir = String::new();
        for (i, part) in parts.iter().enumerate() {
            let set = self.dirs.entry(path::fold(&dir)).or_default();
            if i + 1 == parts.len() {
                let mut entry = entry.clone();
                entry.name = (*part).to_owned();
                set.entries.insert(path::fold(part), entry);
            }
            else {
                set.entries.entry(path::fold(part))
                    .or_insert_with(|| Entry::new(part, EntryType::Dir));
            }
            dir.push_str(part);
            dir.push('/');
        }
        if entry.kind == EntryType::Dir {
            self.dirs.entry(path::fold(&dir)).or_default();
        }
    }
    /// Forgets a single entry. A directory takes its contents with it.
    pub fn remove(&mut self, path: &str) {
        let trimmed = path.trim_end_matches('/');
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        if let Some(set) = self.dirs.get_mut(&path::fold(path::parent(trimmed))) {
            set.entries.remove(&path::fold(name));
        }
        self.drop_subtree(trimmed);
    }
    /// Is `dir` known and empty?
    pub fn is_empty_dir(&mut self, dir: &str) -> bool {
        self.ensure(dir)
            && self.dirs.get(&path::fold(dir))
                .map(|x| x.entries.is_empty()).unwrap_or(false)
    }
    fn drop_subtree(&mut self, dir: &str) {
        let key = path::fold(dir);
        let below = format!("{}/", key);
        self.dirs.retain(|x, _| *x != key && !x.starts_with(&below));
    }
    /// Drops the cached sets of every directory containing `path`, so
    /// they're read again on next use. No-op on a static database.
    pub fn forget_ancestors(&mut self, path: &str) {
        if let Backing::Static = self.backing { return }
        let mut dir = path::parent(path);
        loop {
            self.dirs.remove(&path::fold(dir));
            if dir.is_empty() { break }
            dir = path::parent(dir);
        }
    }
    /// Drops `dir` and everything cached below it, or everything if `dir` is
    /// empty. No-op on a static database, whose contents can't be reread.
    pub fn flush(&mut self, dir: &str) {
        if let Backing::Static = self.backing { return }
        if dir.is_empty() {
            self.dirs.clear();
        }
        else {
            self.drop_subtree(dir.trim_end_matches('/'));
        }
    }
    /// Forgets everything. A static database keeps an empty root.
    pub fn clear(&mut self) {
        self.dirs.clear();
        if let Backing::Static = self.backing {
            self.dirs.insert(String::new(), DirSet::default());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    fn file(size: u64) -> Entry {
        Entry { name: String::new(), kind: EntryType::File, size, hash: 0,
                locator: 0 }
    }
    fn sample() -> FileDb {
        let mut db = FileDb::new_static();
        db.add("Songs/Pack/Song.sm", file(10));
        db.add("Songs/Pack/song.ogg", file(20));
        db.add("Themes/", Entry::new("", EntryType::Dir));
        db
    }
    #[test] fn lookups() {
        let mut db = sample();
        assert_eq!(db.file_type(""), Some(EntryType::Dir));
        assert_eq!(db.file_type("songs"), Some(EntryType::Dir));
        assert_eq!(db.file_type("SONGS/pack/song.SM"), Some(EntryType::File));
        assert_eq!(db.file_type("Themes"), Some(EntryType::Dir));
        assert_eq!(db.file_type("Songs/Pack/nope"), None);
        assert_eq!(db.lookup("songs/pack/SONG.OGG").map(|x| x.size), Some(20));
        assert_eq!(db.real_path("songs/PACK/song.SM"), "Songs/Pack/Song.sm");
        assert_eq!(db.real_path("songs/new/"), "Songs/new/");
    }
    #[test] fn final_sigma_lookups() {
        let mut db = FileDb::new_static();
        db.add("Songs/ΟΔΟΣ/x.sm", file(1));
        assert_eq!(db.file_type("songs/οδοσ/X.SM"), Some(EntryType::File));
        assert_eq!(db.real_path("songs/οδοσ"), "Songs/ΟΔΟΣ");
        let mut out = vec![];
        db.listing("Songs/*", false, false, &mut out);
        assert_eq!(out, &["ΟΔΟΣ"]);
    }
    #[test] fn masks() {
        let mut db = sample();
        let mut out = vec![];
        db.listing("songs/pack/*.sm", false, false, &mut out);
        assert_eq!(out, &["Song.sm"]);
        out.clear();
        db.listing("*", true, false, &mut out);
        assert_eq!(out, &["Songs", "Themes"]);
        out.clear();
        db.listing("Songs/Pack/S*", false, true, &mut out);
        assert_eq!(out, &["Songs/Pack/song.ogg", "Songs/Pack/Song.sm"]);
        out.clear();
        db.listing("Nowhere/*", false, false, &mut out);
        assert!(out.is_empty());
    }
    #[test] fn path_values() {
        const VALUES: &[(&str, Option<u32>)] = &[
            ("Songs/Pack/Song.sm", Some(0)),
            ("Songs/Pack/new.sm", Some(1)),
            ("Songs/Other/new.sm", Some(2)),
            ("Fresh/a/b.txt", Some(3)),
            ("Songs/Pack", None),
            ("Songs/Pack/Song.sm/inside", None),
            ("", None),
        ];
        let mut db = sample();
        for (path, value) in VALUES.iter() {
            assert_eq!(db.path_value(path), *value, "{:?}", path);
        }
    }
    #[test] fn removal() {
        let mut db = sample();
        db.remove("songs/pack");
        assert_eq!(db.file_type("Songs/Pack/Song.sm"), None);
        assert_eq!(db.file_type("Songs/Pack"), None);
        assert!(db.is_empty_dir("Songs"));
        db.clear();
        assert_eq!(db.file_type("Songs"), None);
        assert_eq!(db.file_type(""), Some(EntryType::Dir));
    }
    #[test] fn disk_population() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Songs/Pack")).unwrap();
        fs::write(dir.path().join("Songs/Pack/Song.sm"), b"#TITLE:x;").unwrap();
        let mut db = FileDb::on_disk(dir.path().to_owned());
        assert_eq!(db.file_type("songs/pack/song.sm"), Some(EntryType::File));
        assert_eq!(db.lookup("songs/pack/song.sm").map(|x| x.size), Some(9));
        fs::write(dir.path().join("Songs/Pack/late.sm"), b"").unwrap();
        // cached listing doesn't see it until flushed
        assert_eq!(db.file_type("Songs/Pack/late.sm"), None);
        db.flush("Songs/");
        assert_eq!(db.file_type("Songs/Pack/late.sm"), Some(EntryType::File));
        fs::write(dir.path().join("Songs/Pack/later.sm"), b"").unwrap();
        db.forget_ancestors("Songs/Pack/later.sm");
        assert_eq!(db.file_type("Songs/Pack/later.sm"), Some(EntryType::File));
    }
}
