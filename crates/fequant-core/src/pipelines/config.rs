use crate::common::constants::{DEFAULT_POLYNOMIAL_ORDER, DEFAULT_SIGNAL_RANGE, EnergyWindow};
use crate::domain::{ExecutionMode, QuantError, QuantResult};
use crate::modules::{BackgroundType, ShiftAggregation};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExtractionMethod {
    #[default]
    #[serde(rename = "Voigt_fitting")]
    VoigtFitting,
    Integration,
}

impl ExtractionMethod {
    pub const ALL: [Self; 2] = [Self::VoigtFitting, Self::Integration];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VoigtFitting => "Voigt_fitting",
            Self::Integration => "Integration",
        }
    }
}

impl Display for ExtractionMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown quantification method '{name}', expected Voigt_fitting or Integration")]
pub struct UnknownExtractionMethod {
    pub name: String,
}

impl FromStr for ExtractionMethod {
    type Err = UnknownExtractionMethod;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == value)
            .ok_or_else(|| UnknownExtractionMethod {
                name: value.to_string(),
            })
    }
}

/// Run configuration of [`super::quantify`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuantConfig {
    pub method: ExtractionMethod,
    pub auto_shift: bool,
    /// Run background, alignment and edge-step removal before extraction.
    pub pre_quant: bool,
    /// Pre-edge background window `[lo, hi]` in eV.
    pub signal_range: (f64, f64),
    pub background_type: BackgroundType,
    pub polynomial_order: usize,
    pub fast_background: bool,
    pub shift_aggregation: ShiftAggregation,
    pub execution_mode: ExecutionMode,
}

impl Default for QuantConfig {
    fn default() -> Self {
        Self {
            method: ExtractionMethod::VoigtFitting,
            auto_shift: false,
            pre_quant: true,
            signal_range: (DEFAULT_SIGNAL_RANGE.lo, DEFAULT_SIGNAL_RANGE.hi),
            background_type: BackgroundType::Polynomial,
            polynomial_order: DEFAULT_POLYNOMIAL_ORDER,
            fast_background: false,
            shift_aggregation: ShiftAggregation::FirstPixel,
            execution_mode: ExecutionMode::Serial,
        }
    }
}

impl QuantConfig {
    pub fn from_json_str(content: &str) -> QuantResult<Self> {
        let config: Self = serde_json::from_str(content).map_err(invalid_config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> QuantResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| {
            QuantError::io_system(
                "IO.CONFIG_READ",
                format!("failed to read config '{}': {source}", path.display()),
            )
        })?;
        Self::from_json_str(&content)
    }

    pub fn signal_window(&self) -> EnergyWindow {
        EnergyWindow::new(self.signal_range.0, self.signal_range.1)
    }

    /// Reject settings that cannot run before any fitting starts.
    pub fn validate(&self) -> QuantResult<()> {
        let (lo, hi) = self.signal_range;
        if !lo.is_finite() || !hi.is_finite() || lo >= hi {
            return Err(QuantError::input_validation(
                "INPUT.SIGNAL_RANGE",
                format!("signal range must be finite with lo < hi, got ({lo}, {hi})"),
            ));
        }
        Ok(())
    }
}

fn invalid_config(source: serde_json::Error) -> QuantError {
    QuantError::input_validation("INPUT.CONFIG", format!("invalid configuration: {source}"))
}

#[cfg(test)]
mod tests {
    use super::{ExtractionMethod, QuantConfig};
    use crate::domain::{ExecutionMode, QuantErrorCategory};
    use crate::modules::{BackgroundType, ShiftAggregation};

    #[test]
    fn defaults_match_documented_values() {
        let config = QuantConfig::default();
        assert_eq!(config.method, ExtractionMethod::VoigtFitting);
        assert!(config.pre_quant);
        assert!(!config.auto_shift);
        assert_eq!(config.signal_range, (690.0, 703.0));
        assert_eq!(config.background_type, BackgroundType::Polynomial);
        assert_eq!(config.polynomial_order, 2);
        assert_eq!(config.shift_aggregation, ShiftAggregation::FirstPixel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let content = serde_json::json!({
            "method": "Integration",
            "background_type": "PowerLaw",
            "execution_mode": "parallel",
            "shift_aggregation": "mean",
        })
        .to_string();
        let config = QuantConfig::from_json_str(&content).expect("config should parse");
        assert_eq!(config.method, ExtractionMethod::Integration);
        assert_eq!(config.background_type, BackgroundType::PowerLaw);
        assert_eq!(config.execution_mode, ExecutionMode::Parallel);
        assert_eq!(config.shift_aggregation, ShiftAggregation::Mean);
        assert_eq!(config.signal_range, (690.0, 703.0));
    }

    #[test]
    fn unknown_names_and_bad_ranges_are_input_errors() {
        let error = QuantConfig::from_json_str(r#"{"method": "Gaussian_fitting"}"#)
            .expect_err("unknown method should fail");
        assert_eq!(error.code(), "INPUT.CONFIG");
        assert_eq!(error.category(), QuantErrorCategory::InputValidationError);

        let error = QuantConfig::from_json_str(r#"{"signal_range": [703.0, 690.0]}"#)
            .expect_err("inverted range should fail");
        assert_eq!(error.code(), "INPUT.SIGNAL_RANGE");

        assert!("Voigt_fitting".parse::<ExtractionMethod>().is_ok());
        let error = "voigt".parse::<ExtractionMethod>().expect_err("unknown name");
        assert_eq!(error.name, "voigt");
    }

    #[test]
    fn missing_file_is_io_error() {
        let error = QuantConfig::from_path("/nonexistent/fe-quant/config.json")
            .expect_err("missing file should fail");
        assert_eq!(error.category(), QuantErrorCategory::IoSystemError);
    }
}
