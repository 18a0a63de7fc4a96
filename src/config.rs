use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Number of display slots in the viewer grid. Channel entries beyond this
/// are dropped at load time so a slot index can never go out of bounds.
pub const SLOT_COUNT: usize = 4;

/// One camera channel as described by the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub username: String,
    pub password: String,
    #[serde(rename = "xvr_ip")]
    pub host: String,
    pub channel: u32,
    pub stream_type: StreamType,
}

/// Sub-stream selector. Recorders accept either a numeric subtype index or a
/// named variant, so the config field may be a JSON integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum StreamType {
    Index(i64),
    Name(String),
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl ChannelConfig {
    /// Short label for the channel's display slot.
    pub fn slot_label(&self) -> String {
        format!("ch{} {}", self.channel, self.host)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading channel config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("channel config at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A channel entry that could not be decoded. The rest of the document is
/// unaffected; only this slot stays empty.
#[derive(Debug, Clone, Error)]
#[error("channel entry {index}: {detail}")]
pub struct EntryError {
    pub index: usize,
    pub detail: String,
}

/// One position in the channel list: the original document index plus the
/// decode outcome for that entry.
#[derive(Debug, Clone)]
pub struct ChannelEntry {
    pub index: usize,
    pub parsed: Result<ChannelConfig, EntryError>,
}

/// Channel list after loading: at most [`SLOT_COUNT`] entries, plus how many
/// trailing entries were dropped to fit the grid.
#[derive(Debug, Clone, Default)]
pub struct LoadedChannels {
    pub entries: Vec<ChannelEntry>,
    pub dropped: usize,
}

impl LoadedChannels {
    pub fn valid_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.parsed.is_ok())
            .count()
    }
}

#[derive(Debug, Deserialize)]
struct ChannelsFile {
    #[serde(default)]
    channels: Vec<serde_json::Value>,
}

/// Loads the channel list from a JSON config file.
///
/// The top-level document must parse; that failure aborts the whole load.
/// Individual entries are decoded independently so one malformed channel
/// leaves the others usable. Entries past the grid capacity are dropped
/// with a warning instead of being opened without a slot to render into.
pub fn load_channels(path: &Path) -> Result<LoadedChannels, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_owned(),
        source,
    })?;
    let document =
        serde_json::from_str::<ChannelsFile>(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;

    let total = document.channels.len();
    let dropped = total.saturating_sub(SLOT_COUNT);
    if dropped > 0 {
        tracing::warn!(
            "config lists {total} channels but only {SLOT_COUNT} slots exist; dropping the last {dropped}"
        );
    }

    let entries = document
        .channels
        .into_iter()
        .take(SLOT_COUNT)
        .enumerate()
        .map(|(index, value)| {
            let parsed = serde_json::from_value::<ChannelConfig>(value).map_err(|err| {
                EntryError {
                    index,
                    detail: err.to_string(),
                }
            });
            if let Err(err) = &parsed {
                tracing::warn!("skipping invalid channel entry {index}: {}", err.detail);
            }
            ChannelEntry { index, parsed }
        })
        .collect();

    Ok(LoadedChannels { entries, dropped })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SLOT_COUNT, StreamType, load_channels};
    use std::fs;
    use std::path::PathBuf;

    struct TempConfig {
        path: PathBuf,
    }

    impl TempConfig {
        fn new(name: &str, contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "xvr-grid-config-test-{}-{name}.json",
                std::process::id()
            ));
            fs::write(&path, contents).expect("failed writing temp config");
            Self { path }
        }
    }

    impl Drop for TempConfig {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }

    #[test]
    fn loads_complete_channel_entries() {
        let temp = TempConfig::new(
            "complete",
            r#"{"channels": [
                {"username": "admin", "password": "pw", "xvr_ip": "10.0.0.2",
                 "channel": 1, "stream_type": 0},
                {"username": "admin", "password": "pw", "xvr_ip": "10.0.0.2",
                 "channel": 2, "stream_type": "main"}
            ]}"#,
        );

        let loaded = load_channels(&temp.path).expect("load should succeed");
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.dropped, 0);
        assert_eq!(loaded.valid_count(), 2);

        let first = loaded.entries[0].parsed.as_ref().expect("entry 0 valid");
        assert_eq!(first.channel, 1);
        assert_eq!(first.host, "10.0.0.2");
        assert_eq!(first.stream_type, StreamType::Index(0));

        let second = loaded.entries[1].parsed.as_ref().expect("entry 1 valid");
        assert_eq!(second.stream_type, StreamType::Name("main".to_owned()));
    }

    #[test]
    fn missing_field_fails_only_that_entry() {
        let temp = TempConfig::new(
            "partial",
            r#"{"channels": [
                {"username": "admin", "xvr_ip": "10.0.0.2",
                 "channel": 1, "stream_type": 0},
                {"username": "admin", "password": "pw", "xvr_ip": "10.0.0.2",
                 "channel": 2, "stream_type": 1}
            ]}"#,
        );

        let loaded = load_channels(&temp.path).expect("load should succeed");
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(loaded.valid_count(), 1);

        let err = loaded.entries[0]
            .parsed
            .as_ref()
            .expect_err("entry 0 lacks a password");
        assert_eq!(err.index, 0);
        assert!(err.detail.contains("password"));
        assert!(loaded.entries[1].parsed.is_ok());
    }

    #[test]
    fn entries_beyond_slot_capacity_are_dropped() {
        let mut channels = String::from("{\"channels\": [");
        for channel in 1..=6 {
            if channel > 1 {
                channels.push(',');
            }
            channels.push_str(&format!(
                r#"{{"username": "u", "password": "p", "xvr_ip": "10.0.0.2",
                    "channel": {channel}, "stream_type": 0}}"#
            ));
        }
        channels.push_str("]}");
        let temp = TempConfig::new("overflow", &channels);

        let loaded = load_channels(&temp.path).expect("load should succeed");
        assert_eq!(loaded.entries.len(), SLOT_COUNT);
        assert_eq!(loaded.dropped, 2);
        assert!(loaded.entries.iter().all(|entry| entry.index < SLOT_COUNT));
    }

    #[test]
    fn document_without_channels_key_loads_empty() {
        let temp = TempConfig::new("empty", r#"{}"#);
        let loaded = load_channels(&temp.path).expect("load should succeed");
        assert!(loaded.entries.is_empty());
        assert_eq!(loaded.dropped, 0);
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let temp = TempConfig::new("malformed", "{\"channels\": [");
        let err = load_channels(&temp.path).expect_err("load should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join(format!(
            "xvr-grid-config-test-{}-does-not-exist.json",
            std::process::id()
        ));
        let err = load_channels(&path).expect_err("load should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn negative_channel_number_fails_the_entry() {
        let temp = TempConfig::new(
            "negative",
            r#"{"channels": [
                {"username": "u", "password": "p", "xvr_ip": "10.0.0.2",
                 "channel": -3, "stream_type": 0}
            ]}"#,
        );

        let loaded = load_channels(&temp.path).expect("load should succeed");
        assert_eq!(loaded.valid_count(), 0);
        assert!(loaded.entries[0].parsed.is_err());
    }
}
