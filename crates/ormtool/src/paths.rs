use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "ORMTOOL_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "ormtool.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "ORMTool";
const APPLICATION: &str = "ormtool";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        if let Some(dir) = env_override(ENV_CONFIG_DIR) {
            return Ok(Self { config_dir: dir });
        }
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        Ok(Self {
            config_dir: project_dirs.config_dir().to_path_buf(),
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}

/// An explicit `--config` wins over the discovered location.
pub fn resolve_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(AppPaths::discover()?.config_file()),
    }
}

fn env_override(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_config_is_used_verbatim() {
        let path = resolve_config_file(Some(Path::new("custom/ormtool.toml"))).unwrap();
        assert_eq!(path, PathBuf::from("custom/ormtool.toml"));
    }

    #[test]
    fn config_file_lives_in_config_dir() {
        let paths = AppPaths {
            config_dir: PathBuf::from("/tmp/ormtool-config"),
        };
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/ormtool-config/ormtool.toml")
        );
    }
}
