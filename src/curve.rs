use crate::{
    config::{DUTY_MAX_PCT, TEMP_MAX_C, TEMP_MIN_C},
    error::ConfigError,
};

const TABLE_LEN: usize = (TEMP_MAX_C - TEMP_MIN_C + 1) as usize;

/// One knot of the user's fan curve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurvePoint {
    pub temp_c: i32,
    pub duty_pct: i32,
}

impl CurvePoint {
    pub fn new(temp_c: i32, duty_pct: i32) -> Self {
        Self { temp_c, duty_pct }
    }
}

/// Per-degree duty lookup covering `TEMP_MIN_C..=TEMP_MAX_C`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DutyTable {
    duties: [u8; TABLE_LEN],
}

impl DutyTable {
    /// Interpolates `points` into a dense table.
    ///
    /// Below the first point the first duty is held, or the fan is stopped (0%)
    /// when `fan_stop` is set. Above the last point every entry is 100%.
    pub fn build(points: &[CurvePoint], fan_stop: bool) -> Result<Self, ConfigError> {
        validate(points)?;

        let first = points[0];
        let last = points[points.len() - 1];
        let low = if fan_stop { 0 } else { first.duty_pct };

        let mut duties = [0u8; TABLE_LEN];
        for temp in TEMP_MIN_C..=TEMP_MAX_C {
            let duty = if temp < first.temp_c {
                low
            } else if temp > last.temp_c {
                DUTY_MAX_PCT
            } else {
                interpolate(points, temp)
            };
            duties[index(temp)] = duty.clamp(0, DUTY_MAX_PCT) as u8;
        }

        Ok(Self { duties })
    }

    /// Duty for `temp_c`, `None` outside the table's domain.
    pub fn get(&self, temp_c: i32) -> Option<u8> {
        if (TEMP_MIN_C..=TEMP_MAX_C).contains(&temp_c) {
            Some(self.duties[index(temp_c)])
        } else {
            None
        }
    }

    /// Duty for `temp_c` with the temperature clamped into the table's domain.
    pub fn duty_for(&self, temp_c: i32) -> u8 {
        self.duties[index(temp_c.clamp(TEMP_MIN_C, TEMP_MAX_C))]
    }

    /// `(temperature, duty)` for every degree in the domain
    pub fn iter(&self) -> impl Iterator<Item = (i32, u8)> + '_ {
        (TEMP_MIN_C..=TEMP_MAX_C).zip(self.duties.iter().copied())
    }
}

fn index(temp_c: i32) -> usize {
    (temp_c - TEMP_MIN_C) as usize
}

/// `temp` must lie within `points[0].temp_c..=points[last].temp_c`
fn interpolate(points: &[CurvePoint], temp: i32) -> i32 {
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if temp == a.temp_c {
            return a.duty_pct;
        }
        if temp == b.temp_c {
            return b.duty_pct;
        }
        if a.temp_c < temp && temp < b.temp_c {
            let slope = f64::from(b.duty_pct - a.duty_pct) / f64::from(b.temp_c - a.temp_c);
            let offset = (slope * f64::from(temp - a.temp_c)).round() as i32;
            return a.duty_pct + offset;
        }
    }

    // single point curve
    points[0].duty_pct
}

fn validate(points: &[CurvePoint]) -> Result<(), ConfigError> {
    if points.is_empty() {
        return Err(ConfigError::InvalidCurve(
            "at least one point is required".into(),
        ));
    }

    for p in points {
        if !(TEMP_MIN_C..=TEMP_MAX_C).contains(&p.temp_c) {
            return Err(ConfigError::InvalidCurve(format!(
                "temperature {}C is outside {}..={}C",
                p.temp_c, TEMP_MIN_C, TEMP_MAX_C
            )));
        }
        if !(0..=DUTY_MAX_PCT).contains(&p.duty_pct) {
            return Err(ConfigError::InvalidCurve(format!(
                "duty {}% at {}C is outside 0..={}%",
                p.duty_pct, p.temp_c, DUTY_MAX_PCT
            )));
        }
    }

    if let Some(pair) = points.windows(2).find(|w| w[1].temp_c <= w[0].temp_c) {
        return Err(ConfigError::InvalidCurve(format!(
            "temperatures must be strictly increasing ({}C followed by {}C)",
            pair[0].temp_c, pair[1].temp_c
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(raw: &[(i32, i32)]) -> Vec<CurvePoint> {
        raw.iter().map(|&(t, d)| CurvePoint::new(t, d)).collect()
    }

    #[test]
    fn rejects_empty_curve() {
        let err = DutyTable::build(&[], false).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCurve(_)));
    }

    #[test]
    fn rejects_non_increasing_temps() {
        for raw in [&[(50, 10), (40, 90)][..], &[(40, 10), (40, 90)][..]] {
            let err = DutyTable::build(&pts(raw), false).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidCurve(_)), "{:?}", raw);
        }
    }

    #[test]
    fn rejects_out_of_domain_points() {
        for raw in [(-1, 10), (101, 10), (50, -1), (50, 101)] {
            let err = DutyTable::build(&pts(&[raw]), false).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidCurve(_)), "{:?}", raw);
        }
    }

    #[test]
    fn accepts_points_at_domain_edges() {
        let table = DutyTable::build(&pts(&[(0, 10), (100, 90)]), false).unwrap();
        assert_eq!(table.get(0), Some(10));
        assert_eq!(table.get(100), Some(90));
        assert_eq!(table.get(50), Some(50));
    }

    #[test]
    fn single_point_curve() {
        let table = DutyTable::build(&pts(&[(50, 30)]), false).unwrap();
        assert_eq!(table.get(0), Some(30));
        assert_eq!(table.get(50), Some(30));
        assert_eq!(table.get(51), Some(100));
    }

    #[test]
    fn fan_stop_zeroes_low_end() {
        let table = DutyTable::build(&pts(&[(40, 30), (80, 70)]), true).unwrap();
        assert!((0..40).all(|t| table.get(t) == Some(0)));
        assert_eq!(table.get(40), Some(30));
    }

    #[test]
    fn decreasing_segment_interpolates_down() {
        let table = DutyTable::build(&pts(&[(20, 80), (30, 40), (60, 90)]), false).unwrap();
        assert_eq!(table.get(25), Some(60));
        assert_eq!(table.get(21), Some(76));
        assert_eq!(table.get(30), Some(40));
        assert_eq!(table.get(45), Some(65));
    }

    #[test]
    fn rounds_to_nearest() {
        // slope 1/3
        let table = DutyTable::build(&pts(&[(0, 0), (3, 1)]), false).unwrap();
        assert_eq!(table.get(1), Some(0));
        assert_eq!(table.get(2), Some(1));
    }

    #[test]
    fn lookup_outside_domain() {
        let table = DutyTable::build(&pts(&[(30, 20), (70, 100)]), false).unwrap();
        assert_eq!(table.get(-5), None);
        assert_eq!(table.get(101), None);
        assert_eq!(table.duty_for(-5), 20);
        assert_eq!(table.duty_for(140), 100);
    }

    #[test]
    fn iter_covers_domain() {
        let table = DutyTable::build(&pts(&[(30, 20)]), false).unwrap();
        let all: Vec<_> = table.iter().collect();
        assert_eq!(all.len(), TABLE_LEN);
        assert_eq!(all.first(), Some(&(TEMP_MIN_C, 20)));
        assert_eq!(all.last(), Some(&(TEMP_MAX_C, 100)));
    }
}
