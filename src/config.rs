use std::path::{Path, PathBuf};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG: &str = "sshmon.toml";
pub const DEFAULT_DATA: &str = "datasetssh.csv";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFmt { Text, Json }

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat { Text, Json }

/// Settings read from `sshmon.toml`. Every key is optional; explicit
/// command-line flags take precedence.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub data: Option<String>,
    pub reference_year: Option<i32>,
    pub daemon_marker: Option<String>,
    pub log_glob: Option<String>,
    pub recursive: Option<bool>,
    pub top: Option<usize>,
    pub output: Option<OutputFmt>,
    pub codes: Option<Vec<String>>,
    pub ips: Option<Vec<String>>,
    pub top_ips: Option<usize>,
    pub ip_pattern: Option<String>,
    pub users: Option<Vec<String>>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub no_color: Option<bool>,
    pub log_format: Option<LogFormat>,
    pub log_path: Option<String>,
    pub md_path: Option<String>,
    pub csv_path: Option<String>,
    pub json_path: Option<String>,
}

/// Reads the config from `path_opt`, then `SSHMON_CONFIG`, then
/// `./sshmon.toml`. A missing default file is not worth a warning.
pub fn load_config(path_opt: Option<&str>) -> Option<AppConfig> {
    let explicit = path_opt.map(|s| s.to_string()).or_else(|| std::env::var("SSHMON_CONFIG").ok());
    let p = PathBuf::from(explicit.clone().unwrap_or_else(|| DEFAULT_CONFIG.to_string()));
    if explicit.is_none() && !p.exists() { return None; }
    read_config(&p)
}

pub fn read_config(p: &Path) -> Option<AppConfig> {
    let s = match std::fs::read_to_string(p) { Ok(s) => s, Err(e) => { log::warn!("Failed to read config file {}: {}", p.display(), e); return None } };
    match toml::from_str::<AppConfig>(&s) {
        Ok(c) => Some(c),
        Err(e) => { log::warn!("Failed to parse config file {}: {}", p.display(), e); None }
    }
}

/// Dataset location: explicit value, then `SSHMON_DATA`, then the default.
pub fn data_path(explicit: Option<&str>) -> PathBuf {
    explicit
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("SSHMON_DATA").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_toml() {
        let cfg: AppConfig = toml::from_str("reference_year = 2017\noutput = \"json\"\nusers = [\"root\", \"admin\"]\n").unwrap();
        assert_eq!(cfg.reference_year, Some(2017));
        assert_eq!(cfg.output, Some(OutputFmt::Json));
        assert_eq!(cfg.users.unwrap().len(), 2);
        assert!(cfg.data.is_none());
    }

    #[test]
    fn read_config_reports_bad_files_as_none() {
        let p = std::env::temp_dir().join(format!("sshmon_bad_{}.toml", std::process::id()));
        std::fs::write(&p, "top = \"many\"").unwrap();
        assert!(read_config(&p).is_none());
        std::fs::write(&p, "top = 10").unwrap();
        assert_eq!(read_config(&p).unwrap().top, Some(10));
        let _ = std::fs::remove_file(&p);
        assert!(read_config(&p).is_none());
    }

    #[test]
    fn explicit_data_path_wins() {
        assert_eq!(data_path(Some("x.csv")), PathBuf::from("x.csv"));
    }
}
