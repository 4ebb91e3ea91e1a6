use crate::error::{RemuxError, Result};
use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::RwLock;

lazy_static! {
    static ref CONFIG: RwLock<Config> = RwLock::new(Config::new());
}

/// Tunables of the program stream scheduler.
///
/// All clock values are in 90 kHz ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxConfig {
    /// Queue depth the scheduler primes every stream up to before emitting.
    pub max_queue_size: usize,
    /// Depth at which the least populated other queue is evicted.
    pub queue_hard_limit: usize,
    /// Streams starting further apart than this are trimmed at the front.
    pub start_alignment_window: u64,
    /// Timestamp jump that is treated as an upstream discontinuity.
    pub discontinuity_threshold: u64,
    /// Distance between two consecutive pack headers.
    pub pack_header_interval: u64,
    /// How far the SCR of a pack runs ahead of its first timestamp.
    pub pack_header_delay: u64,
    /// Clock value of the first pack header.
    pub initial_pack_header: u64,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 64,
            queue_hard_limit: 4096,
            start_alignment_window: 22_500,
            discontinuity_threshold: 45_000,
            pack_header_interval: 150_000,
            pack_header_delay: 9_000,
            initial_pack_header: 90_000,
        }
    }
}

impl MuxConfig {
    /// Checks that the tunables can drive the scheduler.
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(RemuxError::Config("max_queue_size must be positive".into()));
        }
        if self.queue_hard_limit < self.max_queue_size {
            return Err(RemuxError::Config(format!(
                "queue_hard_limit ({}) is below max_queue_size ({})",
                self.queue_hard_limit, self.max_queue_size
            )));
        }
        if self.pack_header_interval == 0 || self.discontinuity_threshold == 0 {
            return Err(RemuxError::Config("intervals must be positive".into()));
        }
        if self.pack_header_delay >= self.pack_header_interval {
            return Err(RemuxError::Config(
                "pack_header_delay must be shorter than pack_header_interval".into(),
            ));
        }
        if self.initial_pack_header < self.pack_header_delay {
            return Err(RemuxError::Config(
                "initial_pack_header must not be below pack_header_delay".into(),
            ));
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim().trim_matches('"').trim_matches('\'');
        match key.trim() {
            "max_queue_size" => self.max_queue_size = value.parse()?,
            "queue_hard_limit" => self.queue_hard_limit = value.parse()?,
            "start_alignment_window" => self.start_alignment_window = value.parse()?,
            "discontinuity_threshold" => self.discontinuity_threshold = value.parse()?,
            "pack_header_interval" => self.pack_header_interval = value.parse()?,
            "pack_header_delay" => self.pack_header_delay = value.parse()?,
            "initial_pack_header" => self.initial_pack_header = value.parse()?,
            other => return Err(RemuxError::Config(format!("unknown key '{}'", other))),
        }
        Ok(())
    }

    /// Applies `key = value` lines, skipping blanks and `#` comments.
    pub fn apply_str(&mut self, content: &str) -> Result<()> {
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                self.apply(key, value)?;
            }
        }
        Ok(())
    }
}

/// Process-wide configuration, loaded once and on [`Config::reload`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Program stream scheduler settings.
    pub mux: MuxConfig,
}

const ENV_OVERRIDES: [(&str, &str); 4] = [
    ("MPEGREMUX_MAX_QUEUE_SIZE", "max_queue_size"),
    ("MPEGREMUX_QUEUE_HARD_LIMIT", "queue_hard_limit"),
    ("MPEGREMUX_PACK_HEADER_INTERVAL", "pack_header_interval"),
    ("MPEGREMUX_PACK_HEADER_DELAY", "pack_header_delay"),
];

impl Config {
    fn new() -> Self {
        let mut mux = MuxConfig::default();

        // Environment first, the config file may still override it.
        for (var, key) in ENV_OVERRIDES {
            if let Ok(value) = env::var(var) {
                if let Err(e) = mux.apply(key, &value) {
                    log::warn!("ignoring {}: {}", var, e);
                }
            }
        }

        let config_paths = ["./mpegremux.toml"];
        for path in &config_paths {
            if let Ok(mut file) = File::open(path) {
                let mut content = String::new();
                if file.read_to_string(&mut content).is_ok() {
                    let mut candidate = mux;
                    match candidate.apply_str(&content) {
                        Ok(()) => mux = candidate,
                        Err(e) => log::warn!("ignoring {}: {}", path, e),
                    }
                }
            }
        }

        if let Err(e) = mux.validate() {
            log::warn!("invalid mux configuration ({}), using defaults", e);
            mux = MuxConfig::default();
        }

        Config { mux }
    }

    /// Re-reads the environment and config file.
    pub fn reload() {
        let new_config = Config::new();
        if let Ok(mut config) = CONFIG.write() {
            *config = new_config;
        }
    }
}

/// Returns the process-wide scheduler configuration.
pub fn mux_config() -> MuxConfig {
    CONFIG
        .read()
        .map(|config| config.mux)
        .unwrap_or_default()
}

/// Creates a default config template file if it doesn't exist
pub fn create_default_config_template<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
    if !path.as_ref().exists() {
        let template = r#"# mpegremux configuration
# All clock values are in 90 kHz ticks.

max_queue_size = 64
queue_hard_limit = 4096
start_alignment_window = 22500
discontinuity_threshold = 45000
pack_header_interval = 150000
pack_header_delay = 9000
initial_pack_header = 90000
"#;
        std::fs::write(path, template)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MuxConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_queue_size, 64);
        assert_eq!(config.queue_hard_limit, 4096);
    }

    #[test]
    fn test_apply_str() {
        let mut config = MuxConfig::default();
        config
            .apply_str("# comment\nmax_queue_size = 32\n\npack_header_delay = \"4500\"\n")
            .unwrap();
        assert_eq!(config.max_queue_size, 32);
        assert_eq!(config.pack_header_delay, 4500);
    }

    #[test]
    fn test_apply_str_rejects_unknown_key() {
        let mut config = MuxConfig::default();
        assert!(matches!(
            config.apply_str("bitrate = 5"),
            Err(RemuxError::Config(_))
        ));
        assert!(matches!(
            config.apply_str("max_queue_size = many"),
            Err(RemuxError::ParseInt(_))
        ));
    }

    #[test]
    fn test_validate_limits() {
        let config = MuxConfig {
            queue_hard_limit: 10,
            ..MuxConfig::default()
        };
        assert!(config.validate().is_err());

        let config = MuxConfig {
            pack_header_delay: 200_000,
            ..MuxConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_template_round_trips() {
        let path = std::env::temp_dir().join(format!("mpegremux-{}.toml", std::process::id()));
        let _ = std::fs::remove_file(&path);
        create_default_config_template(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut config = MuxConfig::default();
        config.apply_str(&content).unwrap();
        assert_eq!(config, MuxConfig::default());

        std::fs::remove_file(&path).unwrap();
    }
}
