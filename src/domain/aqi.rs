// Air quality index conversion - piecewise linear interpolation over breakpoint tables
use serde::Deserialize;

/// PM2.5 concentration breakpoints (µg/m³)
pub const PM25_BREAKPOINTS: [f64; 8] = [0.0, 12.0, 35.4, 55.4, 150.4, 250.4, 350.4, 500.4];

/// PM10 concentration breakpoints (µg/m³)
pub const PM10_BREAKPOINTS: [f64; 8] = [0.0, 54.0, 154.0, 254.0, 354.0, 424.0, 504.0, 604.0];

/// Index scale shared by both pollutant tables
pub const AQI_SCALE: [f64; 8] = [0.0, 50.0, 100.0, 150.0, 200.0, 300.0, 400.0, 500.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pollutant {
    Pm25,
    Pm10,
}

impl Pollutant {
    /// Legacy numeric pollutant codes (25 and 10)
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            25 => Some(Self::Pm25),
            10 => Some(Self::Pm10),
            _ => None,
        }
    }

    pub fn breakpoints(&self) -> &'static [f64] {
        match self {
            Self::Pm25 => &PM25_BREAKPOINTS,
            Self::Pm10 => &PM10_BREAKPOINTS,
        }
    }

    pub fn index(&self, concentration: f64) -> Option<f64> {
        interpolate(concentration, self.breakpoints(), &AQI_SCALE)
    }
}

/// Index of the first ascending interval `[table[i], table[i + 1]]` holding `input`
pub fn bracket(table: &[f64], input: f64) -> Option<usize> {
    table
        .windows(2)
        .position(|pair| input >= pair[0] && input <= pair[1])
}

/// Map `input` from the breakpoint domain onto `scale`.
///
/// Returns `None` when the input lies outside every interval; values are never
/// extrapolated or clamped.
pub fn interpolate(input: f64, breakpoints: &[f64], scale: &[f64]) -> Option<f64> {
    let i = bracket(breakpoints, input)?;
    let (bp_low, bp_high) = (breakpoints[i], breakpoints[i + 1]);
    let (index_low, index_high) = (*scale.get(i)?, *scale.get(i + 1)?);

    if bp_high == bp_low {
        return Some(index_low);
    }
    Some(index_low + (index_high - index_low) / (bp_high - bp_low) * (input - bp_low))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_interpolate_inside_interval() {
        let value = interpolate(24.0, &[0.0, 12.0, 35.4], &[0.0, 50.0, 100.0]).unwrap();
        assert_relative_eq!(value, 75.641, epsilon = 1e-3);
    }

    #[test]
    fn test_interpolate_out_of_range_is_none() {
        assert_eq!(interpolate(-1.0, &PM25_BREAKPOINTS, &AQI_SCALE), None);
        assert_eq!(interpolate(600.0, &PM25_BREAKPOINTS, &AQI_SCALE), None);
        assert_eq!(interpolate(f64::NAN, &PM25_BREAKPOINTS, &AQI_SCALE), None);
    }

    #[test]
    fn test_interpolate_table_ends() {
        assert_relative_eq!(Pollutant::Pm25.index(0.0).unwrap(), 0.0);
        assert_relative_eq!(Pollutant::Pm25.index(500.4).unwrap(), 500.0, epsilon = 1e-9);
        assert_relative_eq!(Pollutant::Pm10.index(604.0).unwrap(), 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_continuous_at_breakpoints() {
        for pollutant in [Pollutant::Pm25, Pollutant::Pm10] {
            let table = pollutant.breakpoints();
            for i in 1..table.len() - 1 {
                let from_lower = interpolate(table[i], &table[i - 1..=i], &AQI_SCALE[i - 1..=i]).unwrap();
                let from_upper = interpolate(table[i], &table[i..=i + 1], &AQI_SCALE[i..=i + 1]).unwrap();
                assert_relative_eq!(from_lower, from_upper, epsilon = 1e-9);
                assert_relative_eq!(from_lower, AQI_SCALE[i], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_first_containing_interval_wins() {
        assert_eq!(bracket(&PM10_BREAKPOINTS, 54.0), Some(0));
        assert_eq!(bracket(&PM10_BREAKPOINTS, 54.5), Some(1));
    }

    #[test]
    fn test_pollutant_codes() {
        assert_eq!(Pollutant::from_code(25), Some(Pollutant::Pm25));
        assert_eq!(Pollutant::from_code(10), Some(Pollutant::Pm10));
        assert_eq!(Pollutant::from_code(0), None);
    }
}
