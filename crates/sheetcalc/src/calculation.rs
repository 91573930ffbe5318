//! Calculation options and statistics

use serde::{Deserialize, Serialize};
use sheetcalc_formula::CycleSettings;

/// Options for finishing a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationOptions {
    /// Enable iterative calculation for circular references
    pub iterative: bool,
    /// Maximum iterations for circular references (default: 100)
    pub max_iterations: u32,
    /// Maximum change threshold for convergence (default: 0.001)
    pub max_change: f64,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            iterative: false,
            max_iterations: 100,
            max_change: 0.001,
        }
    }
}

impl CalculationOptions {
    /// Iterate circular references up to `max_iterations` times
    pub fn iterative(max_iterations: u32) -> Self {
        Self {
            iterative: true,
            max_iterations,
            ..Self::default()
        }
    }

    pub(crate) fn cycle_settings(&self) -> CycleSettings {
        CycleSettings {
            enabled: self.iterative,
            max_iterations: self.max_iterations as usize,
            max_change: self.max_change,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalculationStats {
    /// Number of cells calculated
    pub cells_calculated: usize,
    /// Number of circular references evaluated
    pub cycles: usize,
    /// Largest iteration count of any circular reference
    pub iterations: usize,
    /// Number of cells holding an error after the run
    pub errors: usize,
    /// Whether every circular reference converged
    pub converged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let options = CalculationOptions::default();
        assert!(!options.iterative);
        assert_eq!(options.max_iterations, 100);
        assert_eq!(options.max_change, 0.001);
        assert!(!options.cycle_settings().enabled);
    }

    #[test]
    fn test_options_from_partial_json() {
        let options: CalculationOptions = serde_json::from_str(r#"{"iterative": true}"#).unwrap();
        assert_eq!(options, CalculationOptions::iterative(100));
        assert_eq!(options.cycle_settings().max_iterations, 100);
    }
}
