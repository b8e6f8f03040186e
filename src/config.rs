//! File configuration for the command-line shell.
//!
//! The file is a flat list of `key = value` lines; strings are double-quoted
//! and `#` starts a comment. Unknown keys are rejected.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use url::Url;

use crate::fetch::HttpSettings;
use crate::normalize::CaseKeeper;

/// Parsed file configuration; every value is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP whole-request timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// arXiv OAI2 endpoint override.
    pub arxiv_oai_url: Option<String>,
    /// `CiteSeer` OAI endpoint override.
    pub citeseer_oai_url: Option<String>,
    /// Scraper service endpoint override.
    pub scraper_url: Option<String>,
    /// DBLP base URL override.
    pub dblp_url: Option<String>,
    /// Brace-protect acronyms in scraped titles.
    pub protect_terms: Option<bool>,
    /// Replacement protected-term list, one term per line.
    pub protected_terms_file: Option<PathBuf>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        validate_endpoint("arxiv_oai_url", self.arxiv_oai_url.as_deref())?;
        validate_endpoint("citeseer_oai_url", self.citeseer_oai_url.as_deref())?;
        validate_endpoint("scraper_url", self.scraper_url.as_deref())?;
        validate_endpoint("dblp_url", self.dblp_url.as_deref())?;
        Ok(())
    }

    /// Returns HTTP settings with file values over the defaults.
    #[must_use]
    pub fn http_settings(&self) -> HttpSettings {
        let defaults = HttpSettings::default();
        HttpSettings {
            connect_timeout_secs: self
                .connect_timeout_secs
                .unwrap_or(defaults.connect_timeout_secs),
            read_timeout_secs: self.read_timeout_secs.unwrap_or(defaults.read_timeout_secs),
        }
    }

    /// Builds the case protector, or `None` when protection is off.
    ///
    /// Without `protected_terms_file` the built-in term list is used.
    pub fn case_keeper(&self) -> Result<Option<CaseKeeper>> {
        if self.protect_terms != Some(true) {
            return Ok(None);
        }
        let Some(path) = &self.protected_terms_file else {
            return Ok(Some(CaseKeeper::default()));
        };
        load_protected_terms(path).map(Some)
    }
}

/// Reads a protected-term list file.
pub fn load_protected_terms(path: &Path) -> Result<CaseKeeper> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read protected terms file '{}'", path.display()))?;
    Ok(CaseKeeper::from_lines(&raw))
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

fn validate_endpoint(field: &str, value: Option<&str>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let parsed = Url::parse(value)
        .with_context(|| format!("Invalid config value for `{field}`: '{value}' is not a URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Invalid config value for `{field}`: '{value}'. Expected an http(s) URL");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// Returns the parsed config or an all-default one.
    #[must_use]
    pub fn file_config(&self) -> FileConfig {
        self.config.clone().unwrap_or_default()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/bibimport/config.toml`
/// 2. `$HOME/.config/bibimport/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("bibimport")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("bibimport")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from an explicit path, or the default path if present.
///
/// An explicit path must exist; a missing default file is not an error.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Reads and validates one config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        let line_number = line_index + 1;

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_number}")
                })?);
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "arxiv_oai_url" => {
                cfg.arxiv_oai_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "citeseer_oai_url" => {
                cfg.citeseer_oai_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "scraper_url" => {
                cfg.scraper_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "dblp_url" => {
                cfg.dblp_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "protect_terms" => {
                cfg.protect_terms = Some(parse_boolean(value).with_context(invalid)?);
            }
            "protected_terms_file" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.protected_terms_file = Some(PathBuf::from(parsed));
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_number}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
read_timeout_secs = 60
verbosity = "verbose"
"#,
        )
        .unwrap();
        assert_eq!(cfg.read_timeout_secs, Some(60));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
        assert!(cfg.connect_timeout_secs.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
dblp_url = "https://dblp.example/#mirror" # hash inside string is kept
protect_terms = true # acronyms
"#,
        )
        .unwrap();
        assert_eq!(cfg.dblp_url.as_deref(), Some("https://dblp.example/#mirror"));
        assert_eq!(cfg.protect_terms, Some(true));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("connect_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_trailing_tokens() {
        let err = parse_config_str("read_timeout_secs = 4 trailing").unwrap_err();
        assert!(err.to_string().contains("read_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_non_http_endpoint() {
        let err = parse_config_str(r#"scraper_url = "ftp://scraper.example/""#).unwrap_err();
        assert!(err.to_string().contains("scraper_url"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_url() {
        let err = parse_config_str("arxiv_oai_url = http://x").unwrap_err();
        assert!(err.to_string().contains("arxiv_oai_url"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("protect_terms = yes").unwrap_err();
        assert!(err.to_string().contains("protect_terms"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_verbosity_as_str() {
        assert_eq!(VerbositySetting::Default.as_str(), "default");
        assert_eq!(VerbositySetting::Quiet.as_str(), "quiet");
        assert_eq!(VerbositySetting::Debug.as_str(), "debug");
    }

    #[test]
    fn test_http_settings_fall_back_to_defaults() {
        let cfg = parse_config_str("connect_timeout_secs = 3").unwrap();
        let settings = cfg.http_settings();
        assert_eq!(settings.connect_timeout_secs, 3);
        assert_eq!(
            settings.read_timeout_secs,
            HttpSettings::default().read_timeout_secs
        );
    }

    #[test]
    fn test_case_keeper_disabled_by_default() {
        assert!(FileConfig::default().case_keeper().unwrap().is_none());
    }

    #[test]
    fn test_case_keeper_reads_terms_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# acronyms\nXML\n\nOAI").unwrap();
        let cfg = FileConfig {
            protect_terms: Some(true),
            protected_terms_file: Some(file.path().to_path_buf()),
            ..FileConfig::default()
        };
        let keeper = cfg.case_keeper().unwrap().unwrap();
        assert_eq!(keeper.terms(), ["OAI", "XML"]);
    }

    #[test]
    fn test_load_config_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
