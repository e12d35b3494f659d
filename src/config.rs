use crate::path;

/// Settings fixed for the life of a [`FileManager`](crate::FileManager).
#[derive(Clone, Debug)]
pub struct ManagerConfig {
    /// Files opened for writing under these logical prefixes are synced to
    /// storage on every flush and on close. Matched case-insensitively.
    pub slow_flush_prefixes: Vec<String>,
    /// Where the in-memory cache is mounted at construction, if anywhere.
    /// Starting it with `@` keeps it out of transparent lookups.
    pub memory_mount_point: Option<String>,
    /// Root tag of that cache. Unused by the memory driver, but it's what
    /// identifies the mount for `unmount`.
    pub memory_root: String,
}

impl Default for ManagerConfig {
    fn default() -> ManagerConfig {
        ManagerConfig {
            slow_flush_prefixes: vec!["Data/".to_owned()],
            memory_mount_point: Some("@mem".to_owned()),
            memory_root: "(cache)".to_owned(),
        }
    }
}

impl ManagerConfig {
    pub(crate) fn uses_slow_flush(&self, path: &str) -> bool {
        self.slow_flush_prefixes.iter()
            .any(|x| path::strip_prefix_ci(path, x).is_some())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test] fn slow_flush_prefixes() {
        let config = ManagerConfig::default();
        assert!(config.uses_slow_flush("Data/Stats.xml"));
        assert!(config.uses_slow_flush("data/Static.ini"));
        assert!(!config.uses_slow_flush("Songs/Data/x.sm"));
        assert!(!config.uses_slow_flush("DataFile"));
    }
}
