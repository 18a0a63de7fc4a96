use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "xvr-grid";

/// Session leftovers worth restoring on the next launch: currently just the
/// config document the viewer had open.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Prefs {
    pub last_config_path: Option<PathBuf>,
}

pub fn prefs_path() -> Result<PathBuf> {
    scoped_path("prefs.json", APP_DIR)
}

pub fn load_prefs() -> Result<Prefs> {
    let path = prefs_path()?;
    load_prefs_from(&path)
}

pub fn save_prefs(prefs: &Prefs) -> Result<()> {
    let path = prefs_path()?;
    save_prefs_to(&path, prefs)
}

/// Directory holding the session log file, beside the prefs document.
pub fn log_dir() -> Result<PathBuf> {
    Ok(data_root()?.join(APP_DIR))
}

fn load_prefs_from(path: &Path) -> Result<Prefs> {
    if !path.exists() {
        return Ok(Prefs::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading prefs at {}", path.display()))?;
    let parsed = serde_json::from_str::<Prefs>(&raw)
        .with_context(|| format!("failed parsing prefs at {}", path.display()))?;
    Ok(parsed)
}

fn save_prefs_to(path: &Path, prefs: &Prefs) -> Result<()> {
    ensure_parent_dir(path)?;

    let payload = serde_json::to_string_pretty(prefs).context("failed serializing prefs")?;
    fs::write(path, payload)
        .with_context(|| format!("failed writing prefs at {}", path.display()))?;
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating data directory {}", parent.display()))?;
    }
    Ok(())
}

fn data_root() -> Result<PathBuf> {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("unable to determine user data directory")
}

fn scoped_path(file: &str, app_dir: &str) -> Result<PathBuf> {
    Ok(data_root()?.join(app_dir).join(file))
}

#[cfg(test)]
mod tests {
    use super::{Prefs, load_prefs_from, save_prefs_to};
    use std::fs;
    use std::path::PathBuf;

    struct TempPrefs {
        path: PathBuf,
    }

    impl TempPrefs {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir()
                .join(format!("xvr-grid-prefs-{name}-{}", std::process::id()))
                .join("prefs.json");
            let _ = fs::remove_file(&path);
            Self { path }
        }
    }

    impl Drop for TempPrefs {
        fn drop(&mut self) {
            if let Some(parent) = self.path.parent() {
                let _ = fs::remove_dir_all(parent);
            }
        }
    }

    #[test]
    fn missing_prefs_load_as_defaults() {
        let temp = TempPrefs::new("missing");
        let prefs = load_prefs_from(&temp.path).expect("defaults");
        assert!(prefs.last_config_path.is_none());
    }

    #[test]
    fn saved_prefs_load_back() {
        let temp = TempPrefs::new("roundtrip");
        let prefs = Prefs {
            last_config_path: Some(PathBuf::from("/srv/cams/site-a.json")),
        };

        save_prefs_to(&temp.path, &prefs).expect("save creates parent dirs");
        let loaded = load_prefs_from(&temp.path).expect("load");
        assert_eq!(
            loaded.last_config_path.as_deref(),
            Some(std::path::Path::new("/srv/cams/site-a.json"))
        );
    }

    #[test]
    fn malformed_prefs_are_a_parse_error() {
        let temp = TempPrefs::new("malformed");
        if let Some(parent) = temp.path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&temp.path, b"not json").expect("write");

        let err = load_prefs_from(&temp.path).unwrap_err();
        assert!(err.to_string().contains("failed parsing prefs"));
    }
}
