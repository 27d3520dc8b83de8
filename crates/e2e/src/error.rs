//! Error types for the visual regression harness

use thiserror::Error;

use crate::visual::Resolution;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Viewer did not load successfully within {attempts} attempts")]
    ViewerNotReady { attempts: u32 },

    #[error("Failed to resize canvas to match any desired resolution (tried: {})", format_resolutions(.tried))]
    ResolutionExhausted { tried: Vec<Resolution> },

    #[error("[TEST FAILED]: Pixel difference ({diff_pixels}) exceeds threshold ({limit})")]
    ThresholdExceeded { diff_pixels: u64, limit: u64 },

    #[error("Canvas size mismatch: expected {expected}, but got {actual_width}x{actual_height}")]
    CanvasSizeMismatch {
        expected: Resolution,
        actual_width: u64,
        actual_height: u64,
    },

    #[error("Image dimensions differ: {}x{} vs {}x{}", .actual.0, .actual.1, .expected.0, .expected.1)]
    DimensionMismatch { actual: (u32, u32), expected: (u32, u32) },

    #[error("Pixel diff failed: {0}")]
    Diff(String),

    #[error("Render surface '{0}' not found in page")]
    SurfaceNotFound(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),
}

impl E2eError {
    /// Whether this failure carries the remote grid's transient marker text.
    ///
    /// The marker can surface in any variant (session creation, script calls),
    /// so classification is done on the rendered message.
    pub fn is_transient(&self, marker: &str) -> bool {
        !marker.is_empty() && self.to_string().contains(marker)
    }
}

fn format_resolutions(resolutions: &[Resolution]) -> String {
    resolutions
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type E2eResult<T> = Result<T, E2eError>;
