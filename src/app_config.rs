//! Optional config file supplying CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use policy_scraper_core::FetchTimeouts;
use policy_scraper_core::config::{MAX_CONCURRENCY, MIN_CONCURRENCY};

/// Key = value file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default concurrency (same range as the CLI flag).
    pub concurrency: Option<usize>,
    /// Extract every BoardDocs book by default.
    pub include_all_books: Option<bool>,
    /// Listing page timeout in seconds.
    pub listing_timeout_secs: Option<u64>,
    /// Policy page timeout in seconds.
    pub document_timeout_secs: Option<u64>,
    /// PDF download timeout in seconds.
    pub pdf_timeout_secs: Option<u64>,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency)
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: {MIN_CONCURRENCY}..={MAX_CONCURRENCY}"
            );
        }
        validate_timeout_secs("listing_timeout_secs", self.listing_timeout_secs)?;
        validate_timeout_secs("document_timeout_secs", self.document_timeout_secs)?;
        validate_timeout_secs("pdf_timeout_secs", self.pdf_timeout_secs)?;
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        Ok(())
    }

    /// Applies configured timeouts over `base`.
    #[must_use]
    pub fn apply_timeouts(&self, base: FetchTimeouts) -> FetchTimeouts {
        let secs = |value: Option<u64>, fallback: Duration| value.map_or(fallback, Duration::from_secs);
        FetchTimeouts {
            connect: secs(self.connect_timeout_secs, base.connect),
            listing: secs(self.listing_timeout_secs, base.listing),
            document: secs(self.document_timeout_secs, base.document),
            pdf: secs(self.pdf_timeout_secs, base.pdf),
        }
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=600");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/policy-scraper/config.toml`
/// 2. `$HOME/.config/policy-scraper/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("policy-scraper")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("policy-scraper")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config at `path`, or the default path when `None`.
///
/// A missing default file yields an empty config; a missing explicit file is
/// an error.
pub fn load_file_config(path: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = path {
        return read_file_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
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

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();

        match key {
            "concurrency" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `concurrency` value on line {}", line_index + 1)
                })?;
                let n = usize::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("concurrency out of range for usize"))?;
                cfg.concurrency = Some(n);
            }
            "include_all_books" => {
                let parsed = parse_boolean(value).with_context(|| {
                    format!("Invalid `include_all_books` value on line {}", line_index + 1)
                })?;
                cfg.include_all_books = Some(parsed);
            }
            "listing_timeout_secs" | "document_timeout_secs" | "pdf_timeout_secs"
            | "connect_timeout_secs" => {
                let parsed = parse_integer_u64(value).with_context(|| {
                    format!("Invalid `{key}` value on line {}", line_index + 1)
                })?;
                let slot = match key {
                    "listing_timeout_secs" => &mut cfg.listing_timeout_secs,
                    "document_timeout_secs" => &mut cfg.document_timeout_secs,
                    "pdf_timeout_secs" => &mut cfg.pdf_timeout_secs,
                    _ => &mut cfg.connect_timeout_secs,
                };
                *slot = Some(parsed);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
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

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r"
concurrency = 8
include_all_books = true
",
        )
        .expect("partial config should parse");
        assert_eq!(cfg.concurrency, Some(8));
        assert_eq!(cfg.include_all_books, Some(true));
        assert!(cfg.pdf_timeout_secs.is_none());
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_concurrency() {
        let err = parse_config_str("concurrency = 13").expect_err("13 is above range");
        assert!(err.to_string().contains("concurrency"));
        let err = parse_config_str("concurrency = 0").expect_err("0 is below range");
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("concurrency = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str("pdf_timeout_secs = 90 # slow district server")
            .expect("config with comments should parse");
        assert_eq!(cfg.pdf_timeout_secs, Some(90));
    }

    #[test]
    fn test_parse_config_rejects_invalid_boolean() {
        let err = parse_config_str("include_all_books = yes").expect_err("invalid boolean expected");
        assert!(err.to_string().contains("include_all_books"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("connect_timeout_secs = 0").expect_err("invalid timeout expected");
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("rate_limit = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("rate_limit"));
    }

    #[test]
    fn test_apply_timeouts_overrides_only_configured_fields() {
        let cfg = parse_config_str(
            r"
listing_timeout_secs = 10
pdf_timeout_secs = 120
",
        )
        .expect("timeouts should parse");
        let base = FetchTimeouts::default();
        let merged = cfg.apply_timeouts(base);
        assert_eq!(merged.listing, Duration::from_secs(10));
        assert_eq!(merged.pdf, Duration::from_secs(120));
        assert_eq!(merged.document, base.document);
        assert_eq!(merged.connect, base.connect);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_file_config(Some(&dir.path().join("absent.toml")))
            .expect_err("missing explicit file");
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_file_config_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "concurrency = 3\n").expect("write config");
        let cfg = load_file_config(Some(&path)).expect("config should load");
        assert_eq!(cfg.concurrency, Some(3));
    }
}
