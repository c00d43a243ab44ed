//! Load `.blocksync.toml` from the working directory (CLI only). The library
//! never reads config files; callers inject everything through `SyncOpts`.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub(crate) struct BlocksyncToml {
    #[serde(default)]
    pub(crate) sync: SyncSection,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SyncSection {
    pub(crate) block_size: Option<String>,
    pub(crate) workers: Option<usize>,
    pub(crate) hash: Option<String>,
    pub(crate) verbose: Option<bool>,
    pub(crate) ssh: Option<String>,
}

/// Load the config file from `dir` if present. Returns None when the file is
/// missing or unreadable; a parse error is logged and ignored.
pub(crate) fn load_blocksync_toml(dir: &Path) -> Option<BlocksyncToml> {
    let path = dir.join(crate::utils::config::CONFIG_FILENAME);
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}
