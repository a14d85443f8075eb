use std::{fs, path::Path, str::SplitWhitespace, time::Duration};

use crate::{
    curve::{CurvePoint, DutyTable},
    error::ConfigError,
};

/// Where the fan curve is read from when no path is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "fan_curve.txt";

/// Lowest temperature the duty table covers
pub const TEMP_MIN_C: i32 = 0;

/// Highest temperature the duty table covers
/// Anything hotter is looked up as this value
pub const TEMP_MAX_C: i32 = 100;

/// Full speed
pub const DUTY_MAX_PCT: i32 = 100;

/// GPU whose temperature drives the fans
pub const GPU_INDEX: u32 = 0;

/// Shown when the utilization query fails
pub const UNKNOWN_UTILIZATION: &str = "unknown";

/// Everything read from the fan curve file, fixed for the lifetime of the process
#[derive(Debug, Clone)]
pub struct FanProfile {
    pub fan_stop: bool,
    pub refresh_interval: Duration,
    pub hysteresis: u32,
    pub points: Vec<CurvePoint>,
    pub duty_table: DutyTable,
}

impl FanProfile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses `fan_stop refresh_interval hysteresis num_points` followed by
    /// `num_points` pairs of `temperature duty`, all whitespace separated.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut tokens = Tokens(text.split_whitespace());

        let fan_stop = match tokens.next_int("fan_stop")? {
            0 => false,
            1 => true,
            v => {
                return Err(ConfigError::InvalidValue {
                    field: "fan_stop",
                    reason: format!("must be 0 or 1, got {}", v),
                })
            }
        };

        let refresh_interval = tokens.next_int("refresh_interval")?;
        if refresh_interval <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "refresh_interval",
                reason: format!("must be a positive number of seconds, got {}", refresh_interval),
            });
        }

        let hysteresis = tokens.next_int("hysteresis")?;
        let hysteresis = u32::try_from(hysteresis).map_err(|_| ConfigError::InvalidValue {
            field: "hysteresis",
            reason: format!("must not be negative, got {}", hysteresis),
        })?;

        let num_points = tokens.next_int("num_points")?;
        if num_points < 1 {
            return Err(ConfigError::InvalidValue {
                field: "num_points",
                reason: format!("at least one curve point is required, got {}", num_points),
            });
        }

        // strictly increasing temperatures cannot fit more points than the table has degrees
        let max_points = TEMP_MAX_C - TEMP_MIN_C + 1;
        if num_points > max_points {
            return Err(ConfigError::InvalidValue {
                field: "num_points",
                reason: format!("at most {} curve points fit, got {}", max_points, num_points),
            });
        }

        let mut points = Vec::with_capacity(num_points as usize);
        for _ in 0..num_points {
            let temp_c = tokens.next_int("point temperature")?;
            let duty_pct = tokens.next_int("point duty")?;
            points.push(CurvePoint::new(temp_c, duty_pct));
        }

        if let Some(extra) = tokens.0.next() {
            return Err(ConfigError::TrailingData(extra.to_string()));
        }

        let duty_table = DutyTable::build(&points, fan_stop)?;

        Ok(Self {
            fan_stop,
            refresh_interval: Duration::from_secs(refresh_interval as u64),
            hysteresis,
            points,
            duty_table,
        })
    }
}

struct Tokens<'a>(SplitWhitespace<'a>);

impl Tokens<'_> {
    fn next_int(&mut self, field: &'static str) -> Result<i32, ConfigError> {
        let token = self.0.next().ok_or(ConfigError::MissingField(field))?;
        token.parse().map_err(|_| ConfigError::InvalidNumber {
            field,
            token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_reference_layout() {
        let profile = FanProfile::parse("0\n2\n3\n3\n30 20\n50 60\n70 100\n").unwrap();
        assert!(!profile.fan_stop);
        assert_eq!(profile.refresh_interval, Duration::from_secs(2));
        assert_eq!(profile.hysteresis, 3);
        assert_eq!(profile.points.len(), 3);
        assert_eq!(profile.duty_table.get(40), Some(40));
    }

    #[test]
    fn rejects_bad_header_values() {
        let cases = [
            ("2 1 0 1 50 50", "fan_stop"),
            ("0 0 0 1 50 50", "refresh_interval"),
            ("0 1 -1 1 50 50", "hysteresis"),
            ("0 1 0 0", "num_points"),
            ("0 1 0 102", "num_points"),
            ("0 1 0 2147483647 30 20", "num_points"),
        ];
        for (text, field) in cases {
            match FanProfile::parse(text) {
                Err(ConfigError::InvalidValue { field: f, .. }) => assert_eq!(f, field, "{}", text),
                other => panic!("expected InvalidValue for {}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn rejects_truncated_file() {
        let err = FanProfile::parse("0 1 2 2 30 20 50").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("point duty")));
    }

    #[test]
    fn rejects_non_numeric_token() {
        let err = FanProfile::parse("0 1 abc 1 30 20").unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidNumber { field: "hysteresis", ref token } if token == "abc")
        );
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = FanProfile::parse("0 1 2 1 30 20 40").unwrap_err();
        assert!(matches!(err, ConfigError::TrailingData(ref t) if t == "40"));
    }

    #[test]
    fn rejects_non_increasing_curve() {
        let err = FanProfile::parse("0 1 2 2 50 10 40 90").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCurve(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1 5 2 2\n40 30\n80 90").unwrap();

        let profile = FanProfile::load(file.path()).unwrap();
        assert!(profile.fan_stop);
        assert_eq!(profile.refresh_interval, Duration::from_secs(5));
        assert_eq!(profile.duty_table.get(10), Some(0));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FanProfile::load(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
