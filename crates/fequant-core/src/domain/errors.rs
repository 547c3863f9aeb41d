use std::error::Error;
use std::fmt::{Display, Formatter};

pub type QuantResult<T> = Result<T, QuantError>;

/// Failure class of a [`QuantError`], one process exit code each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantErrorCategory {
    /// Malformed configuration, spectrum or mask, reported before fitting.
    InputValidationError,
    IoSystemError,
    ComputationError,
    InternalError,
}

impl QuantErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidationError => 2,
            Self::IoSystemError => 3,
            Self::ComputationError => 4,
            Self::InternalError => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidationError => "input",
            Self::IoSystemError => "io",
            Self::ComputationError => "computation",
            Self::InternalError => "internal",
        }
    }
}

/// Error surfaced past a pipeline stage boundary.
///
/// `code` is a stable dotted identifier (`INPUT.SIGNAL_RANGE`,
/// `RUN.EDGE_STEP_FIT`, ...) that tests and the CLI match on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantError {
    category: QuantErrorCategory,
    code: &'static str,
    message: String,
}

impl QuantError {
    pub fn new(
        category: QuantErrorCategory,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn input_validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(QuantErrorCategory::InputValidationError, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(QuantErrorCategory::IoSystemError, code, message)
    }

    pub fn computation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(QuantErrorCategory::ComputationError, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(QuantErrorCategory::InternalError, code, message)
    }

    pub const fn category(&self) -> QuantErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    /// Single stderr line: `error[CODE]: message (exit N)`.
    pub fn diagnostic_line(&self) -> String {
        format!(
            "error[{}]: {} (exit {})",
            self.code,
            self.message,
            self.exit_code()
        )
    }
}

impl Display for QuantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} error [{}] {}",
            self.category.as_str(),
            self.code,
            self.message
        )
    }
}

impl Error for QuantError {}

#[cfg(test)]
mod tests {
    use super::{QuantError, QuantErrorCategory};

    #[test]
    fn categories_map_to_distinct_exit_codes() {
        let cases = [
            (QuantErrorCategory::InputValidationError, 2, "input"),
            (QuantErrorCategory::IoSystemError, 3, "io"),
            (QuantErrorCategory::ComputationError, 4, "computation"),
            (QuantErrorCategory::InternalError, 5, "internal"),
        ];

        for (category, exit_code, label) in cases {
            assert_eq!(category.exit_code(), exit_code);
            assert_eq!(category.as_str(), label);
        }
    }

    #[test]
    fn diagnostic_line_carries_code_and_exit() {
        let error = QuantError::input_validation(
            "INPUT.SIGNAL_RANGE",
            "signal range (703, 690) must satisfy lo < hi",
        );

        assert_eq!(error.exit_code(), 2);
        assert_eq!(
            error.diagnostic_line(),
            "error[INPUT.SIGNAL_RANGE]: signal range (703, 690) must satisfy lo < hi (exit 2)"
        );
        assert_eq!(
            error.to_string(),
            "input error [INPUT.SIGNAL_RANGE] signal range (703, 690) must satisfy lo < hi"
        );
    }
}
