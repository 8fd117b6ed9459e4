//! INI parsing for `PoolConfig`.
//!
//! The single place where INI key names are mapped to struct fields.

use ini::Ini;

use super::file::ConfigError;
use super::keys;
use super::settings::PoolConfig;

/// Parse an `Ini` object into a `PoolConfig`.
///
/// Starts from `PoolConfig::default()` and overlays any values found in the
/// `[pool]` section.
pub(super) fn parse_ini(ini: &Ini) -> Result<PoolConfig, ConfigError> {
    let mut config = PoolConfig::default();

    let Some(section) = ini.section(Some(keys::SECTION)) else {
        return Ok(config);
    };

    if let Some(v) = section.get(keys::WORKERS) {
        config.workers = parse_count(keys::WORKERS, v)?;
    }
    if let Some(v) = section.get(keys::QUEUE_CAPACITY) {
        config.queue_capacity = parse_count(keys::QUEUE_CAPACITY, v)?;
    }
    if let Some(v) = section.get(keys::CANCEL_QUEUE_CAPACITY) {
        config.cancel_queue_capacity = parse_count(keys::CANCEL_QUEUE_CAPACITY, v)?;
    }
    if let Some(v) = section.get(keys::RECORD_METRICS) {
        config.record_metrics =
            parse_bool(v).ok_or_else(|| invalid(keys::RECORD_METRICS, v, "must be true or false"))?;
    }

    Ok(config)
}

/// Render a `PoolConfig` as an `Ini` with a single `[pool]` section.
pub(super) fn to_ini(config: &PoolConfig) -> Ini {
    let mut ini = Ini::new();
    ini.with_section(Some(keys::SECTION))
        .set(keys::WORKERS, config.workers.to_string())
        .set(keys::QUEUE_CAPACITY, config.queue_capacity.to_string())
        .set(
            keys::CANCEL_QUEUE_CAPACITY,
            config.cancel_queue_capacity.to_string(),
        )
        .set(keys::RECORD_METRICS, config.record_metrics.to_string());
    ini
}

/// Positive integer, at least 1.
fn parse_count(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(invalid(key, value, "must be at least 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(invalid(key, value, "must be a positive integer")),
    }
}

pub(super) fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: keys::SECTION.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<PoolConfig, ConfigError> {
        let ini = Ini::load_from_str(source).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_empty_ini_gives_defaults() {
        assert_eq!(parse("").unwrap(), PoolConfig::default());
    }

    #[test]
    fn test_other_sections_ignored() {
        let config = parse("[logging]\nlevel = debug\n").unwrap();
        assert_eq!(config, PoolConfig::default());
    }

    #[test]
    fn test_pool_section_overlays_defaults() {
        let config = parse("[pool]\nworkers = 8\nrecord_metrics = off\n").unwrap();
        assert_eq!(config.workers, 8);
        assert!(!config.record_metrics);
        assert_eq!(config.queue_capacity, 10_000);
        assert_eq!(config.cancel_queue_capacity, 500);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = parse("[pool]\nqueue_capacity = 0\n").unwrap_err();
        match err {
            ConfigError::InvalidValue { key, reason, .. } => {
                assert_eq!(key, "queue_capacity");
                assert_eq!(reason, "must be at least 1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_workers_rejected() {
        let err = parse("[pool]\nworkers = many\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: pool.workers = 'many' - must be a positive integer"
        );
    }

    #[test]
    fn test_bad_bool_rejected() {
        assert!(parse("[pool]\nrecord_metrics = maybe\n").is_err());
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool(" Yes "), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_to_ini_parses_back() {
        let config = PoolConfig::default().with_workers(3).with_record_metrics(false);
        assert_eq!(parse_ini(&to_ini(&config)).unwrap(), config);
    }
}
