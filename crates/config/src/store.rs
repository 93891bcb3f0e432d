//! Reading and writing `config.toml`

use crate::{Config, ConfigError, ConfigResult, CONFIG_VERSION};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Reads `path`; a missing file yields the defaults
///
/// Broken rules are logged, not rejected, so a hand-edited file can still be
/// loaded and then fixed with `mediasync config validate`.
pub(crate) fn read(path: &Path) -> ConfigResult<Config> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Err(e) => return Err(ConfigError::io("read", path, e)),
    };
    if contents.trim().is_empty() {
        return Err(ConfigError::Empty {
            path: path.to_path_buf(),
        });
    }

    let mut config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if config.version != CONFIG_VERSION {
        log::warn!(
            "{} has format version {}, reading it as version {}",
            path.display(),
            config.version,
            CONFIG_VERSION
        );
        config.version = CONFIG_VERSION;
    }
    for problem in config.problems() {
        log::warn!("{}: {}", path.display(), problem);
    }
    Ok(config)
}

/// Atomically replaces `path` with `config`, keeping the previous file as
/// `config.toml.backup`
pub(crate) fn write(path: &Path, config: &Config) -> ConfigResult<()> {
    let problems = config.problems();
    if !problems.is_empty() {
        return Err(ConfigError::Invalid(problems));
    }

    let dir = parent_dir(path);
    fs::create_dir_all(&dir).map_err(|e| ConfigError::io("create", &dir, e))?;
    if path.exists() {
        let backup = backup_path(path);
        fs::copy(path, &backup).map_err(|e| ConfigError::io("back up", path, e))?;
    }

    let encoded = toml::to_string_pretty(config)?;
    let mut staged = NamedTempFile::new_in(&dir).map_err(|e| ConfigError::io("stage", &dir, e))?;
    if let Err(e) = staged.write_all(encoded.as_bytes()).and_then(|_| staged.flush()) {
        return Err(ConfigError::io("write", staged.path(), e));
    }
    staged
        .persist(path)
        .map_err(|e| ConfigError::io("replace", path, e.error))?;

    log::info!("Wrote {}", path.display());
    Ok(())
}

pub(crate) fn backup_path(path: &Path) -> PathBuf {
    path.with_extension("toml.backup")
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
