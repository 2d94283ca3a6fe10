use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://www.google.com";
pub const DEFAULT_TIMEZONE: &str = "America/New_York";
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 3600;
const DEFAULT_OFFSET_MINUTES: i64 = -100;
const DEFAULT_MARKER_TITLE: &str = "alarm";
const DEFAULT_DAY_ROLLOVER_HOUR: u32 = 12;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write config file {path}: {source}")]
    Unwritable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config line {line}: {text}")]
    InvalidLine { line: usize, text: String },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("missing required setting {0}")]
    Missing(&'static str),
}

#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine {
                    line: idx + 1,
                    text: line.to_string(),
                });
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

// Appends KEY=VALUE lines, creating the file if needed. Later lines win in
// `parse`, so appending also overrides a stale earlier value.
pub fn append_props(path: &str, values: &[(&str, String)]) -> Result<(), ConfigError> {
    let unwritable = |source| ConfigError::Unwritable {
        path: path.to_string(),
        source,
    };
    let mut contents = match fs::read_to_string(path) {
        Ok(existing) => existing,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => return Err(unwritable(err)),
    };
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    for (key, value) in values {
        contents.push_str(&format!("{}={}\n", key, value));
    }
    fs::write(path, contents).map_err(unwritable)
}

// Parsed and validated once at startup so a bad value cannot surface
// mid-poll.
#[derive(Debug, Clone)]
pub struct Settings {
    pub username: String,
    pub magic_cookie: String,
    pub base_url: String,
    pub poll_interval: Duration,
    pub offset_minutes: i64,
    pub marker_title: String,
    pub day_rollover_hour: u32,
    pub timezone: Tz,
    pub sound_file: Option<String>,
}

impl Settings {
    pub fn from_props<F>(get: F, username: String, magic_cookie: String) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = get("CALENDAR_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let poll_seconds: u64 =
            parse_prop(&get, "POLL_INTERVAL_SECONDS", DEFAULT_POLL_INTERVAL_SECONDS)?;
        if poll_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "POLL_INTERVAL_SECONDS",
                value: poll_seconds.to_string(),
            });
        }
        let offset_minutes = parse_prop(&get, "ALARM_OFFSET_MINUTES", DEFAULT_OFFSET_MINUTES)?;
        let marker_title =
            get("ALARM_MARKER_TITLE").unwrap_or_else(|| DEFAULT_MARKER_TITLE.to_string());
        let day_rollover_hour = parse_prop(&get, "DAY_ROLLOVER_HOUR", DEFAULT_DAY_ROLLOVER_HOUR)?;
        if day_rollover_hour > 23 {
            return Err(ConfigError::InvalidValue {
                key: "DAY_ROLLOVER_HOUR",
                value: day_rollover_hour.to_string(),
            });
        }
        let timezone_raw = get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "TIMEZONE",
            value: timezone_raw.clone(),
        })?;
        let sound_file = get("ALARM_SOUND_FILE").filter(|v| !v.trim().is_empty());

        Ok(Self {
            username,
            magic_cookie,
            base_url,
            poll_interval: Duration::from_secs(poll_seconds),
            offset_minutes,
            marker_title,
            day_rollover_hour,
            timezone,
            sound_file,
        })
    }
}

fn parse_prop<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(default),
    }
}
