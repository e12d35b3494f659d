use std::{
    env,
    fs,
    io::ErrorKind,
    path,
};
use path::Path as StdPath;
use path::PathBuf as StdPathBuf;

use super::*;

fn cranky_does_exist(path: &StdPath) -> bool {
    match fs::read_dir(path) {
        Ok(_) => true,
        Err(x) if x.kind() == ErrorKind::NotFound => false,
        Err(x) => {
            log::error!("{:?}: {:?}", path, x);
            false
        },
    }
}

/// Does this directory look like a game installation?
fn has_songs_dir(dir: &StdPath) -> bool {
    // First, try Songs (capital S), then songs (lowercase s)
    cranky_does_exist(&dir.join("Songs")) || cranky_does_exist(&dir.join("songs"))
}

fn get_us_dir() -> StdPathBuf {
    match env::current_exe() {
        Ok(mut x) => {
            if x.pop() {
                x
            }
            else {
                ".".into()
            }
        },
        Err(x) => {
            log::warn!("Couldn't get the path to our own executable! {:?}",
                       x);
            log::warn!("Assuming it's in the working directory.");
            ".".into()
        },
    }
}

/// Where a game installation might be, best guess first.
fn game_root_candidates() -> Vec<StdPathBuf> {
    let mut ret = Vec::new();
    let us_dir = get_us_dir();
    if us_dir.parent().and_then(StdPath::file_name)
        .map(|x| x == "target").unwrap_or(false) {
            // A Cargo project, being executed in the place where it was
            // built. For .../target/<profile>/our_exe, use ...
            if let Some(project) = us_dir.parent().and_then(StdPath::parent) {
                ret.push(project.to_owned());
            }
        }
    ret.insert(0, us_dir);
    match env::current_dir() {
        Ok(x) => ret.push(x),
        Err(x) => log::warn!("Couldn't get the working directory! {:?}", x),
    }
    ret
}

fn find_game_root(candidates: &[StdPathBuf]) -> Option<&StdPath> {
    candidates.iter().map(StdPathBuf::as_path).find(|x| has_songs_dir(x))
}

/// `$XDG_DATA_HOME/<unixy_name>`, or `~/.local/share/<unixy_name>`.
fn xdg_data_home(unixy_name: &str) -> StdPathBuf {
    // If HOME isn't set there's no reasonable default, and XDG-compliant
    // shell scripts would act as though it were empty.
    let home: StdPathBuf = env::var_os("HOME")
        .filter(|x| !x.is_empty()).map(StdPathBuf::from)
        .unwrap_or_else(|| "/".into());
    let mut ret: StdPathBuf = env::var_os("XDG_DATA_HOME")
        .filter(|x| !x.is_empty()).map(StdPathBuf::from)
        .unwrap_or_else(|| {
            let mut ret = home;
            ret.push(".local");
            ret.push("share");
            ret
        });
    ret.push(unixy_name);
    ret
}

impl FileManager {
    /// A manager with the default configuration and the standard initial
    /// mounts (see [`mount_standard_paths`](Self::mount_standard_paths)).
    pub fn with_standard_paths(unixy_name: &str)
        -> Result<FileManager, StdPathsError> {
        let ret = FileManager::new();
        ret.mount_standard_paths(unixy_name)?;
        Ok(ret)
    }
    /// Mounts the places a game's files normally live:
    ///
    /// - On UNIX, the OS root directory at `/`, so absolute paths work.
    /// - The game installation at the root of the logical tree. This is the
    ///   first of the executable's directory (or, when running from a Cargo
    ///   `target` directory, the project) and the working directory that
    ///   contains a `Songs` directory. Not finding one is an error.
    /// - On UNIX, the user's data directory for `unixy_name`, following the
    ///   XDG Base Directory Specification, if it exists.
    pub fn mount_standard_paths(&self, unixy_name: &str)
        -> Result<(), StdPathsError> {
        if cfg!(target_family="unix") {
            self.mount("dir", "/", "/")?;
        }
        let candidates = game_root_candidates();
        self.mount_game_root(&candidates)?;
        if cfg!(target_family="unix") {
            self.try_user_dir(&xdg_data_home(unixy_name));
        }
        Ok(())
    }
    fn mount_game_root(&self, candidates: &[StdPathBuf])
        -> Result<(), StdPathsError> {
        let root = match find_game_root(candidates) {
            Some(x) => x,
            None => return Err(StdPathsError::NoGameRoot {
                searched: candidates.to_vec(),
            }),
        };
        log::info!("Game root found: {:?}", root);
        match root.to_str() {
            Some(x) => Ok(self.mount("dir", x, "")?),
            None => Err(MountError::Driver {
                kind: "dir".to_owned(),
                root: root.to_string_lossy().into_owned(),
                source: io::Error::new(ErrorKind::InvalidInput,
                                       "path is not valid UTF-8"),
            }.into()),
        }
    }
    /// Mounts the user data directory if it's there. Returns whether it
    /// was mounted.
    fn try_user_dir(&self, dir: &StdPath) -> bool {
        if !cranky_does_exist(dir) {
            // quietly give up
            log::info!("No user data directory at {:?}", dir);
            return false
        }
        let dir_str = match dir.to_str() {
            Some(x) => x,
            None => {
                log::warn!("{:?}: path is not valid UTF-8", dir);
                return false
            },
        };
        match self.mount("dir", dir_str, "") {
            Ok(()) => true,
            Err(_) => {
                // mount has already warned about why
                log::info!("Continuing without user data directory {:?}",
                           dir);
                false
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test] fn game_root_discovery() {
        let bare = tempfile::tempdir().unwrap();
        let lower = tempfile::tempdir().unwrap();
        let upper = tempfile::tempdir().unwrap();
        fs::create_dir(lower.path().join("songs")).unwrap();
        fs::create_dir(upper.path().join("Songs")).unwrap();
        let candidates = vec![bare.path().to_owned(), lower.path().to_owned(),
                              upper.path().to_owned()];
        assert_eq!(find_game_root(&candidates), Some(lower.path()));
        assert_eq!(find_game_root(&candidates[..1]), None);
        let fm = FileManager::new();
        match fm.mount_game_root(&candidates[..1]) {
            Err(StdPathsError::NoGameRoot { searched }) =>
                assert_eq!(searched, &candidates[..1]),
            _ => panic!("found a game root in an empty directory"),
        }
        fm.mount_game_root(&candidates[1..]).unwrap();
        assert!(fm.is_a_directory("Songs"));
        assert_eq!(fm.loaded_drivers()[1].root,
                   lower.path().to_str().unwrap());
    }
    #[test] fn user_dir_is_optional() {
        let home = tempfile::tempdir().unwrap();
        let fm = FileManager::new();
        assert!(!fm.try_user_dir(&home.path().join("missing")));
        assert_eq!(fm.loaded_drivers().len(), 1);
        // exists, but isn't something a directory driver can mount
        let file = home.path().join("file");
        fs::write(&file, "").unwrap();
        assert!(!fm.try_user_dir(&file));
        assert_eq!(fm.loaded_drivers().len(), 1);
        assert!(fm.try_user_dir(home.path()));
        assert_eq!(fm.loaded_drivers().len(), 2);
    }
}
