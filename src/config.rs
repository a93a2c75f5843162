//! Server configuration.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};

use log::LevelFilter;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration for a bbs instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address to bind to
    pub address: String,
    /// Port to bind to
    pub port: u16,
    /// Where the templates to be rendered are.
    pub template_dir: PathBuf,
    /// URL to connect to the database. `memory:` keeps everything in process.
    pub database_url: String,
    /// File to log to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Minimum level of log messages.
    pub log_level: LevelFilter,
    /// How many posts are shown on a board page by default.
    pub page_size: u32,
    /// The largest page a client may ask for.
    pub max_page_size: u32,
    /// How many posts the recent feed shows.
    pub recent_limit: u32,
    /// Whether the recent feed shows at most one post per board.
    pub recent_distinct: bool,
    /// How many boards the home page lists.
    pub newest_boards_limit: u32,
    /// Offset from UTC in seconds used when displaying times.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_offset: Option<i32>,
}

impl Config {
    /// Open a config file at the given path.
    pub fn open<P>(path: P) -> Result<Config>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let msg = format!("Couldn't open config file at {}", path.display());

        let reader =
            File::open(path).map_err(|err| Error::from_io_error(err, msg))?;

        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Generate a new config file from default values.
    pub fn generate<W>(mut out: W) -> Result<()>
    where
        W: std::io::Write,
    {
        writeln!(&mut out, "# Configuration for bbs")?;
        serde_yaml::to_writer(&mut out, &Config::default())?;
        writeln!(&mut out)?;
        Ok(())
    }

    /// Get the default location of the config file.
    pub fn default_path() -> PathBuf {
        if cfg!(debug_assertions) {
            PathBuf::from("contrib/dev-config.yaml")
        } else {
            PathBuf::from("/etc/bbs/config.yaml")
        }
    }

    /// The timezone times are displayed in.
    ///
    /// Offsets that are out of range fall back to UTC.
    pub fn timezone(&self) -> FixedOffset {
        self.timezone_offset
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Clamp a requested page size to what this instance allows.
    pub fn page_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.page_size)
            .clamp(1, self.max_page_size.max(1))
    }

    /// Clamp a requested recent feed size to what this instance allows.
    pub fn feed_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.recent_limit)
            .min(self.max_page_size.max(1))
    }

    /// Dump configuration info to the log.
    pub fn debug_log(&self) {
        use log::debug;

        debug!("  address {}", self.address);
        debug!("  port {}", self.port);
        debug!("  database url {}", self.database_url);
        debug!("  template dir {}", self.template_dir.display());
        debug!("  log level {}", self.log_level);
        debug!("  page size {} (max {})", self.page_size, self.max_page_size);
        debug!(
            "  recent feed {} posts, distinct {}",
            self.recent_limit, self.recent_distinct
        );
        debug!("  newest boards {}", self.newest_boards_limit);
        if let Some(offset) = self.timezone_offset {
            debug!("  timezone offset {}s", offset);
        }
        if let Some(ref log_file) = self.log_file {
            debug!("  log file {}", log_file.display());
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        if cfg!(debug_assertions) {
            Config {
                address: "127.0.0.1".into(),
                port: 8000,
                template_dir: PathBuf::from("res/templates/"),
                database_url: "memory:".into(),
                log_file: None,
                log_level: LevelFilter::Debug,
                page_size: 20,
                max_page_size: 100,
                recent_limit: 10,
                recent_distinct: true,
                newest_boards_limit: 20,
                timezone_offset: None,
            }
        } else {
            Config {
                address: "0.0.0.0".into(),
                port: 8000,
                template_dir: PathBuf::from("/usr/share/bbs/templates/"),
                database_url: "postgres://bbs:@localhost/bbs".into(),
                log_file: Some(PathBuf::from("/var/log/bbs/bbs.log")),
                log_level: LevelFilter::Info,
                page_size: 20,
                max_page_size: 100,
                recent_limit: 10,
                recent_distinct: true,
                newest_boards_limit: 20,
                timezone_offset: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::Result;

    #[test]
    fn partial_file_uses_defaults() -> Result<()> {
        let config: Config =
            serde_yaml::from_str("port: 9000\npage_size: 5\n")?;

        assert_eq!(config.port, 9000);
        assert_eq!(config.page_size, 5);
        assert_eq!(config.max_page_size, Config::default().max_page_size);

        Ok(())
    }

    #[test]
    fn generated_config_parses() -> Result<()> {
        let mut out = Vec::new();
        Config::generate(&mut out)?;

        let config: Config = serde_yaml::from_slice(&out)?;
        assert_eq!(config.database_url, Config::default().database_url);

        Ok(())
    }

    #[test]
    fn page_limit_is_clamped() {
        let config = Config {
            page_size: 20,
            max_page_size: 50,
            ..Config::default()
        };

        assert_eq!(config.page_limit(None), 20);
        assert_eq!(config.page_limit(Some(0)), 1);
        assert_eq!(config.page_limit(Some(500)), 50);
        assert_eq!(config.page_limit(Some(7)), 7);
    }

    #[test]
    fn feed_limit_is_clamped() {
        let config = Config {
            recent_limit: u32::MAX,
            max_page_size: 50,
            ..Config::default()
        };

        assert_eq!(config.feed_limit(None), 50);
        assert_eq!(config.feed_limit(Some(u32::MAX)), 50);
        assert_eq!(config.feed_limit(Some(0)), 0);
        assert_eq!(config.feed_limit(Some(7)), 7);
    }

    #[test]
    fn bad_timezone_falls_back_to_utc() {
        let config = Config {
            timezone_offset: Some(100_000),
            ..Config::default()
        };

        assert_eq!(config.timezone().local_minus_utc(), 0);

        let config = Config {
            timezone_offset: Some(9 * 3600),
            ..Config::default()
        };

        assert_eq!(config.timezone().local_minus_utc(), 9 * 3600);
    }
}
