//! INI parsing logic for converting `Ini` → `PipelineConfig`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};

use super::settings::PipelineConfig;
use super::size::parse_size;
use super::ConfigError;

/// Parse an `Ini` object into a `PipelineConfig`.
///
/// Starts from `PipelineConfig::default()` and overlays any values found.
/// Unknown sections and keys are ignored.
pub(super) fn parse_ini(ini: &Ini) -> Result<PipelineConfig, ConfigError> {
    let mut config = PipelineConfig::default();

    // [workers] section
    if let Some(section) = ini.section(Some("workers")) {
        if let Some(v) = parse_value::<usize>(section, "workers", "count")? {
            config.worker_count = v;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("capacity") {
            config.cache_capacity_bytes = parse_size(v).map_err(|e| ConfigError::InvalidValue {
                section: "cache".to_string(),
                key: "capacity".to_string(),
                value: v.to_string(),
                reason: e.to_string(),
            })?;
        }
    }

    // [proxy] section
    if let Some(section) = ini.section(Some("proxy")) {
        if let Some(v) = parse_value::<u8>(section, "proxy", "ancestor_levels")? {
            config.proxy.ancestor_levels = v;
        }
        if let Some(v) = parse_bool(section, "proxy", "use_descendants")? {
            config.proxy.use_descendants = v;
        }
        if let Some(v) = parse_bool(section, "proxy", "request_descendants")? {
            config.proxy.request_descendants = v;
        }
    }

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        if let Some(v) = parse_value::<u64>(section, "tiles", "fade_ms")? {
            config.fade_duration = Duration::from_millis(v);
        }
    }

    config.validate()?;
    Ok(config)
}

fn parse_value<T: FromStr>(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match section.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                section: section_name.to_string(),
                key: key.to_string(),
                value: raw.to_string(),
                reason: "not a valid number".to_string(),
            }),
    }
}

fn parse_bool(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<bool>, ConfigError> {
    match section.get(key) {
        None => Ok(None),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Some(true)),
            "false" | "no" | "off" | "0" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                section: section_name.to_string(),
                key: key.to_string(),
                value: raw.to_string(),
                reason: "expected true or false".to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<PipelineConfig, ConfigError> {
        let ini = Ini::load_from_str(text).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_full_ini() {
        let config = parse(
            "[workers]\ncount = 3\n\
             [cache]\ncapacity = 8MB\n\
             [proxy]\nancestor_levels = 1\nuse_descendants = no\nrequest_descendants = true\n\
             [tiles]\nfade_ms = 0\n",
        )
        .unwrap();

        assert_eq!(config.worker_count, 3);
        assert_eq!(config.cache_capacity_bytes, 8 * 1024 * 1024);
        assert_eq!(config.proxy.ancestor_levels, 1);
        assert!(!config.proxy.use_descendants);
        assert!(config.proxy.request_descendants);
        assert_eq!(config.fade_duration, Duration::ZERO);
    }

    #[test]
    fn test_unknown_sections_ignored() {
        let config = parse("[render]\nvsync = true\n").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_invalid_number() {
        let err = parse("[workers]\ncount = many\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { section, key, .. } => {
                assert_eq!(section, "workers");
                assert_eq!(key, "count");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_size() {
        let err = parse("[cache]\ncapacity = lots\n").unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_invalid_bool() {
        assert!(parse("[proxy]\nuse_descendants = maybe\n").is_err());
    }

    #[test]
    fn test_validation_applies() {
        assert!(parse("[workers]\ncount = 0\n").is_err());
    }
}
