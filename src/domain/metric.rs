// Derived metric strategies applied to each raw measurement
use crate::domain::aqi::Pollutant;
use crate::domain::error::PipelineResult;
use crate::domain::formula::{ExpressionEvaluator, FormulaSpec};

#[derive(Debug, Clone, PartialEq)]
pub enum DerivedMetric {
    /// Measurement is charted as received
    Raw,
    Aqi(Pollutant),
    Formula(FormulaSpec),
}

impl DerivedMetric {
    /// Transform one measurement. `Ok(None)` means the strategy has no value
    /// for this input (missing measurement or outside the table domain).
    pub fn apply(&self, raw: Option<f64>, evaluator: &dyn ExpressionEvaluator) -> PipelineResult<Option<f64>> {
        let Some(raw) = raw else {
            return Ok(None);
        };

        match self {
            Self::Raw => Ok(Some(raw)),
            Self::Aqi(pollutant) => Ok(pollutant.index(raw)),
            Self::Formula(spec) => spec.evaluate(raw, evaluator),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::formula::{ArithmeticEvaluator, VariableTable};
    use approx::assert_relative_eq;

    #[test]
    fn test_raw_passthrough() {
        assert_eq!(DerivedMetric::Raw.apply(Some(4.5), &ArithmeticEvaluator).unwrap(), Some(4.5));
        assert_eq!(DerivedMetric::Raw.apply(None, &ArithmeticEvaluator).unwrap(), None);
    }

    #[test]
    fn test_aqi_strategy() {
        let metric = DerivedMetric::Aqi(Pollutant::Pm25);
        let value = metric.apply(Some(24.0), &ArithmeticEvaluator).unwrap().unwrap();
        assert_relative_eq!(value, 75.641, epsilon = 1e-3);

        assert_eq!(metric.apply(Some(900.0), &ArithmeticEvaluator).unwrap(), None);
    }

    #[test]
    fn test_formula_strategy() {
        let metric = DerivedMetric::Formula(FormulaSpec::new("input - 273.15", VariableTable::default(), Vec::new()));
        let value = metric.apply(Some(300.0), &ArithmeticEvaluator).unwrap().unwrap();
        assert_relative_eq!(value, 26.85, epsilon = 1e-9);
    }
}
