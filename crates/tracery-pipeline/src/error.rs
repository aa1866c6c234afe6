//! Errors surfaced by pipeline stages.

use serde::{Deserialize, Serialize};

/// Errors that can occur during pipeline processing.
///
/// An empty trace (every region below the turd size, or a uniform
/// bitmap) is **not** an error; it yields a valid, empty SVG.
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `UnsupportedImage` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A parameter was outside its documented range (or not finite).
    #[error("invalid parameter {name}: {value} is outside [{min}, {max}]")]
    InvalidParameter {
        /// Parameter name, e.g. `"brightness"`.
        name: String,
        /// The rejected value.
        value: f64,
        /// Inclusive lower bound.
        min: f64,
        /// Inclusive upper bound.
        max: f64,
    },

    /// The input image could not be decoded.
    #[error("unsupported image: {0}")]
    UnsupportedImage(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,
}

impl PipelineError {
    /// Build an [`InvalidParameter`](Self::InvalidParameter) error.
    #[must_use]
    pub fn invalid(name: &str, value: f64, min: f64, max: f64) -> Self {
        Self::InvalidParameter {
            name: name.to_owned(),
            value,
            min,
            max,
        }
    }
}

/// Serde-compatible proxy for `PipelineError`.
///
/// A deserialized `UnsupportedImage` cannot reconstruct the original
/// `image::ImageError`, so it comes back as an
/// `image::ImageError::Unsupported` carrying the message.
#[derive(Serialize, Deserialize)]
enum PipelineErrorProxy {
    InvalidParameter {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
    UnsupportedImage(String),
    EmptyInput,
}

impl Serialize for PipelineError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::InvalidParameter {
                name,
                value,
                min,
                max,
            } => PipelineErrorProxy::InvalidParameter {
                name: name.clone(),
                value: *value,
                min: *min,
                max: *max,
            },
            Self::UnsupportedImage(e) => PipelineErrorProxy::UnsupportedImage(e.to_string()),
            Self::EmptyInput => PipelineErrorProxy::EmptyInput,
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PipelineError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = PipelineErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            PipelineErrorProxy::InvalidParameter {
                name,
                value,
                min,
                max,
            } => Self::InvalidParameter {
                name,
                value,
                min,
                max,
            },
            PipelineErrorProxy::UnsupportedImage(msg) => {
                Self::UnsupportedImage(image::ImageError::Unsupported(
                    image::error::UnsupportedError::from_format_and_kind(
                        image::error::ImageFormatHint::Unknown,
                        image::error::UnsupportedErrorKind::GenericFeature(msg),
                    ),
                ))
            }
            PipelineErrorProxy::EmptyInput => Self::EmptyInput,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_display() {
        let err = PipelineError::invalid("brightness", 250.0, 0.0, 200.0);
        assert_eq!(
            err.to_string(),
            "invalid parameter brightness: 250 is outside [0, 200]",
        );
    }

    #[test]
    fn empty_input_display() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty"
        );
    }

    #[test]
    fn invalid_parameter_serde_round_trip() {
        let err = PipelineError::invalid("scale", 0.0, 1.0, 100.0);
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            back,
            PipelineError::InvalidParameter { ref name, value, min, max }
                if name == "scale" && value == 0.0 && min == 1.0 && max == 100.0
        ));
    }

    #[test]
    fn unsupported_image_serde_keeps_message() {
        let decode_err = image::load_from_memory(&[0xFF, 0x00]).unwrap_err();
        let message = decode_err.to_string();
        let err = PipelineError::from(decode_err);
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineError::UnsupportedImage(_)));
        assert!(back.to_string().contains(&message));
    }
}
