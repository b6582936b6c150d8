//! Conversion of raw ZFS property strings into gauge values.
//!
//! Every transform has the signature [`TransformFn`]. Enumerated properties are
//! encoded as small integers; the mapping is documented in the help text of
//! the property that uses it.

use std::num::ParseFloatError;

use crate::zfs::{compression as algo, pool_status};

/// Converts a raw property value into a gauge value.
pub type TransformFn = fn(&str) -> Result<f64, TransformError>;

/// A raw value that does not fit the property's encoding.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("could not parse '{value}' as a number: {source}")]
    Numeric {
        value: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("could not convert '{0}' to bool")]
    Bool(String),

    #[error("unknown pool health status: {0}")]
    HealthStatus(String),

    #[error("unknown logbias: {0}")]
    Logbias(String),

    #[error("unknown sync mode: {0}")]
    Sync(String),

    #[error("unknown cache mode: {0}")]
    CacheMode(String),
}

/// Pool health codes, in `zpool` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolHealthCode {
    Online = 0,
    Degraded,
    Faulted,
    Offline,
    Unavail,
    Removed,
    Suspended,
}

/// Compression codes. Parametric zstd levels use the 3xx and 4xxxx ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionCode {
    Off = 0,
    On,
    Lz4,
    Zstd,
    ZstdFast,
}

const ZSTD_LEVEL_BASE: f64 = 300.0;
const ZSTD_FAST_LEVEL_BASE: f64 = 40000.0;
const ZSTD_PREFIX: &str = "zstd-";
const ZSTD_FAST_PREFIX: &str = "zstd-fast-";

/// Plain decimal value. `-` and `none` mean zero.
pub fn numeric(value: &str) -> Result<f64, TransformError> {
    if value == "-" || value == "none" {
        return Ok(0.0);
    }
    value.parse::<f64>().map_err(|source| TransformError::Numeric {
        value: value.to_string(),
        source,
    })
}

pub fn boolean(value: &str) -> Result<f64, TransformError> {
    match value {
        "on" | "yes" | "enabled" | "active" => Ok(1.0),
        "off" | "no" | "disabled" | "inactive" | "-" => Ok(0.0),
        other => Err(TransformError::Bool(other.to_string())),
    }
}

/// `50%` becomes `0.5`.
pub fn percentage(value: &str) -> Result<f64, TransformError> {
    let value = value.strip_suffix('%').unwrap_or(value);
    Ok(numeric(value)? / 100.0)
}

/// `2.50x` becomes `2.5`.
pub fn multiplier(value: &str) -> Result<f64, TransformError> {
    numeric(value.strip_suffix('x').unwrap_or(value))
}

pub fn health_code(status: &str) -> Result<f64, TransformError> {
    let code = match status {
        pool_status::ONLINE => PoolHealthCode::Online,
        pool_status::DEGRADED => PoolHealthCode::Degraded,
        pool_status::FAULTED => PoolHealthCode::Faulted,
        pool_status::OFFLINE => PoolHealthCode::Offline,
        pool_status::UNAVAIL => PoolHealthCode::Unavail,
        pool_status::REMOVED => PoolHealthCode::Removed,
        pool_status::SUSPENDED => PoolHealthCode::Suspended,
        other => return Err(TransformError::HealthStatus(other.to_string())),
    };
    Ok(code as u8 as f64)
}

/// Unknown algorithms are reported as `on` rather than failing.
pub fn compression(value: &str) -> Result<f64, TransformError> {
    let code = match value {
        algo::OFF => CompressionCode::Off,
        algo::ON => CompressionCode::On,
        algo::LZ4 => CompressionCode::Lz4,
        algo::ZSTD => CompressionCode::Zstd,
        algo::ZSTD_FAST => CompressionCode::ZstdFast,
        _ => return Ok(zstd_level(value).unwrap_or(CompressionCode::On as u8 as f64)),
    };
    Ok(code as u8 as f64)
}

// A `zstd-fast-` prefix never falls through to the plain `zstd-` form.
fn zstd_level(value: &str) -> Option<f64> {
    if let Some(level) = value.strip_prefix(ZSTD_FAST_PREFIX) {
        return level
            .parse::<u32>()
            .ok()
            .map(|n| ZSTD_FAST_LEVEL_BASE + f64::from(n));
    }
    value.strip_prefix(ZSTD_PREFIX)?
        .parse::<u32>()
        .ok()
        .map(|n| ZSTD_LEVEL_BASE + f64::from(n))
}

pub fn logbias(value: &str) -> Result<f64, TransformError> {
    match value {
        "latency" => Ok(1.0),
        "throughput" => Ok(2.0),
        other => Err(TransformError::Logbias(other.to_string())),
    }
}

pub fn sync(value: &str) -> Result<f64, TransformError> {
    match value {
        "disabled" => Ok(0.0),
        "standard" => Ok(1.0),
        "always" => Ok(2.0),
        other => Err(TransformError::Sync(other.to_string())),
    }
}

/// Shared by `primarycache` and `secondarycache`.
pub fn cache_mode(value: &str) -> Result<f64, TransformError> {
    match value {
        "none" => Ok(0.0),
        "all" => Ok(1.0),
        "metadata" => Ok(2.0),
        other => Err(TransformError::CacheMode(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric() {
        assert_eq!(numeric("1024"), Ok(1024.0));
        assert_eq!(numeric("2.5"), Ok(2.5));
        assert_eq!(numeric("-"), Ok(0.0));
        assert_eq!(numeric("none"), Ok(0.0));
        assert!(matches!(
            numeric("12G"),
            Err(TransformError::Numeric { .. })
        ));
    }

    #[test]
    fn test_boolean() {
        for v in ["on", "yes", "enabled", "active"] {
            assert_eq!(boolean(v), Ok(1.0), "{v}");
        }
        for v in ["off", "no", "disabled", "inactive", "-"] {
            assert_eq!(boolean(v), Ok(0.0), "{v}");
        }
        assert_eq!(boolean("noauto"), Err(TransformError::Bool("noauto".into())));
    }

    #[test]
    fn test_percentage_and_multiplier() {
        assert_eq!(percentage("50%"), Ok(0.5));
        assert_eq!(percentage("7"), Ok(0.07));
        assert_eq!(percentage("-"), Ok(0.0));
        assert_eq!(multiplier("2.50x"), Ok(2.5));
        assert_eq!(multiplier("1.00"), Ok(1.0));
        assert!(multiplier("x").is_err());
    }

    #[test]
    fn test_compression_codes() {
        assert_eq!(compression("off"), Ok(0.0));
        assert_eq!(compression("on"), Ok(1.0));
        assert_eq!(compression("lz4"), Ok(2.0));
        assert_eq!(compression("zstd"), Ok(3.0));
        assert_eq!(compression("zstd-fast"), Ok(4.0));
        assert_eq!(compression("zstd-2"), Ok(302.0));
        assert_eq!(compression("zstd-19"), Ok(319.0));
        assert_eq!(compression("zstd-fast-5"), Ok(40005.0));
        assert_eq!(compression("zstd-fast-1000"), Ok(41000.0));
    }

    #[test]
    fn test_compression_falls_back_to_on() {
        assert_eq!(compression("gzip-9"), Ok(1.0));
        assert_eq!(compression("zle"), Ok(1.0));
        assert_eq!(compression("zstd-abc"), Ok(1.0));
        assert_eq!(compression("zstd-fast-abc"), Ok(1.0));
        assert_eq!(compression("zstd--3"), Ok(1.0));
        assert_eq!(compression("zstd-"), Ok(1.0));
    }

    #[test]
    fn test_health_codes() {
        assert_eq!(health_code("ONLINE"), Ok(0.0));
        assert_eq!(health_code("DEGRADED"), Ok(1.0));
        assert_eq!(health_code("SUSPENDED"), Ok(6.0));
        assert_eq!(
            health_code("online"),
            Err(TransformError::HealthStatus("online".into()))
        );
    }

    #[test]
    fn test_enumerated_modes() {
        assert_eq!(logbias("latency"), Ok(1.0));
        assert_eq!(logbias("throughput"), Ok(2.0));
        assert!(logbias("fast").is_err());

        assert_eq!(sync("standard"), Ok(1.0));
        assert_eq!(sync("always"), Ok(2.0));
        assert_eq!(sync("disabled"), Ok(0.0));
        assert!(sync("sometimes").is_err());

        assert_eq!(cache_mode("all"), Ok(1.0));
        assert_eq!(cache_mode("metadata"), Ok(2.0));
        assert_eq!(cache_mode("none"), Ok(0.0));
        assert!(cache_mode("some").is_err());
    }
}
