use std::fmt::Display;

#[derive(Debug, Clone, PartialEq)]
pub enum RidgePeaksError {
    InvalidParameter {
        name: &'static str,
        value: f64,
        context: String,
    },
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: String,
    },
    MissingInput {
        context: String,
    },
    DegenerateBounds {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
    PointOutOfBounds {
        x: f64,
        y: f64,
    },
}

impl RidgePeaksError {
    pub(crate) fn invalid(name: &'static str, value: f64, context: &str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            context: context.to_string(),
        }
    }

    pub fn append_to_context(mut self, extra: &str) -> Self {
        match &mut self {
            RidgePeaksError::InvalidParameter { context, .. }
            | RidgePeaksError::ExpectedSlicesSameLength { context, .. }
            | RidgePeaksError::MissingInput { context } => {
                context.push_str(extra);
            }
            RidgePeaksError::DegenerateBounds { .. } | RidgePeaksError::PointOutOfBounds { .. } => {}
        }
        self
    }

    /// Missing input is recoverable at batch level, everything else fails the call.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, RidgePeaksError::MissingInput { .. })
    }
}

impl Display for RidgePeaksError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RidgePeaksError::InvalidParameter {
                name,
                value,
                context,
            } => write!(f, "Invalid value {} for parameter `{}` ({})", value, name, context),
            RidgePeaksError::ExpectedSlicesSameLength {
                expected,
                other,
                context,
            } => write!(
                f,
                "Expected slices of the same length, got {} and {} ({})",
                expected, other, context
            ),
            RidgePeaksError::MissingInput { context } => write!(f, "Missing input: {}", context),
            RidgePeaksError::DegenerateBounds {
                min_x,
                min_y,
                max_x,
                max_y,
            } => write!(
                f,
                "Degenerate bounding box x=[{}, {}] y=[{}, {}]",
                min_x, max_x, min_y, max_y
            ),
            RidgePeaksError::PointOutOfBounds { x, y } => {
                write!(f, "Point ({}, {}) is outside of the index bounds", x, y)
            }
        }
    }
}

impl std::error::Error for RidgePeaksError {}

pub type Result<T> = std::result::Result<T, RidgePeaksError>;
