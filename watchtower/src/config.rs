use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use tracing::*;
use watchtower_common::helpers::fs::secure_file;
use watchtower_common::{WatchtowerConfig, WatchtowerConfigStore};

pub fn load_config(path: &Path, secure: bool) -> Result<WatchtowerConfig> {
    if secure {
        secure_file(path).context("Could not secure config")?;
    }

    let store: WatchtowerConfigStore = Config::builder()
        .add_source(File::from(path).format(FileFormat::Yaml))
        .add_source(Environment::with_prefix("WATCHTOWER").separator("__"))
        .build()
        .context("Could not load config")?
        .try_deserialize()
        .context("Could not parse config")?;

    let paths_relative_to = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let config = WatchtowerConfig {
        store,
        paths_relative_to,
    };
    config.validate().context("Invalid config")?;

    info!(
        ?path,
        recent_entries = config.store.ledger.default_recent_entries,
        max_recent_entries = config.store.ledger.effective_max_entries(),
        default_ttl = ?config.store.tokens.default_ttl,
        "Using config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use super::*;

    fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
        let path = dir.join("watchtower.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("watchtower-{name}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_yaml_with_defaults() {
        let dir = scratch_dir("load");
        let path = write_config(
            &dir,
            concat!(
                "database_url: sqlite:data/db\n",
                "ledger:\n  max_recent_entries: 100\n",
                "tokens:\n  default_ttl: 12h\n",
            ),
        );

        let config = load_config(&path, true).unwrap();
        assert_eq!(config.paths_relative_to, dir);
        assert_eq!(config.store.ledger.max_recent_entries, 100);
        assert_eq!(config.store.ledger.default_recent_entries, 50);
        assert_eq!(
            config.store.tokens.default_ttl,
            Some(Duration::from_secs(12 * 3600))
        );

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn rejects_invalid_values() {
        let dir = scratch_dir("invalid");
        let path = write_config(&dir, "ledger:\n  max_recent_entries: 0\n");
        assert!(load_config(&path, false).is_err());

        let path = write_config(&dir, "tokens:\n  default_ttl: not-a-duration\n");
        assert!(load_config(&path, false).is_err());

        std::fs::remove_dir_all(dir).unwrap();
    }
}
