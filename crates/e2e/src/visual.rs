//! Reference images, captured screenshots and their comparison

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::diff::{pixel_diff, DiffOptions};
use crate::error::{E2eError, E2eResult};

/// A target render size for the viewer canvas, written as `WxH` in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A 2:1 resolution, the aspect ratio all references are captured at.
    pub const fn wide(width: u32) -> Self {
        Self { width, height: width / 2 }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = E2eError;

    /// Parses `1400x700`, or a bare width like `1400` which implies 2:1.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || E2eError::InvalidConfig(format!("invalid resolution '{}'", s));
        let parse = |v: &str| v.trim().parse::<u32>().map_err(|_| invalid());

        let res = match s.trim().split_once(['x', 'X']) {
            Some((w, h)) => Resolution::new(parse(w)?, parse(h)?),
            None => Resolution::wide(parse(s)?),
        };

        if res.width == 0 || res.height == 0 {
            return Err(invalid());
        }
        Ok(res)
    }
}

impl TryFrom<String> for Resolution {
    type Error = E2eError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(res: Resolution) -> Self {
        res.to_string()
    }
}

/// Candidate from `candidates` whose width is closest to `screen_width`.
/// Ties keep the earlier (more preferred) candidate.
pub fn closest_resolution(candidates: &[Resolution], screen_width: u32) -> Option<Resolution> {
    candidates.iter().copied().reduce(|closest, candidate| {
        if candidate.width.abs_diff(screen_width) < closest.width.abs_diff(screen_width) {
            candidate
        } else {
            closest
        }
    })
}

/// Result of comparing one screenshot against its reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Resolution the comparison ran at
    pub resolution: Resolution,

    /// Pixels outside the color threshold
    pub diff_pixels: u64,

    /// Total pixels compared
    pub total_pixels: u64,

    /// Largest accepted `diff_pixels`
    pub max_diff_pixels: u64,

    pub passed: bool,

    /// Where the diff raster was written
    pub diff_image_path: PathBuf,

    /// Hash of the captured screenshot file
    pub screenshot_sha256: String,

    /// Hash of the reference file
    pub reference_sha256: String,
}

impl ComparisonResult {
    /// Turn a failed comparison into [`E2eError::ThresholdExceeded`].
    pub fn into_result(self) -> E2eResult<Self> {
        if self.passed {
            Ok(self)
        } else {
            Err(E2eError::ThresholdExceeded {
                diff_pixels: self.diff_pixels,
                limit: self.max_diff_pixels,
            })
        }
    }
}

/// Outcome of loading a reference for a freshly captured screenshot
#[derive(Debug)]
pub enum ReferenceMatch {
    /// Reference exists with the same dimensions as the capture
    Matched { captured: RgbaImage, reference: RgbaImage },

    /// Reference exists but its dimensions differ
    DimensionMismatch { captured: (u32, u32), reference: (u32, u32) },

    /// No reference file for this resolution
    Missing(PathBuf),
}

/// Filesystem layout of references, screenshots and diffs, one file per resolution
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    dir: PathBuf,
}

impl ReferenceStore {
    /// Open the store, creating the directory if absent.
    pub fn open(dir: impl Into<PathBuf>) -> E2eResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn reference_path(&self, res: Resolution) -> PathBuf {
        self.dir.join(format!("reference_{}.png", res))
    }

    pub fn screenshot_path(&self, res: Resolution) -> PathBuf {
        self.dir.join(format!("screenshot_{}.png", res))
    }

    pub fn diff_path(&self, res: Resolution) -> PathBuf {
        self.dir.join(format!("diff_{}.png", res))
    }

    /// Persist a captured PNG for `res`, overwriting any previous run.
    pub fn save_screenshot(&self, res: Resolution, png: &[u8]) -> E2eResult<PathBuf> {
        let path = self.screenshot_path(res);
        std::fs::write(&path, png)?;
        debug!("Screenshot saved at {}", path.display());
        Ok(path)
    }

    /// Persist a captured PNG as the reference for `res`.
    pub fn save_reference(&self, res: Resolution, png: &[u8]) -> E2eResult<PathBuf> {
        let path = self.reference_path(res);
        std::fs::write(&path, png)?;
        info!("Reference saved at {}", path.display());
        Ok(path)
    }

    /// Decode the captured PNG and check it against the stored reference.
    pub fn match_reference(&self, res: Resolution, captured_png: &[u8]) -> E2eResult<ReferenceMatch> {
        let captured = image::load_from_memory_with_format(captured_png, image::ImageFormat::Png)?.to_rgba8();
        info!("Current screenshot dimensions: {}x{}", captured.width(), captured.height());

        let reference_path = self.reference_path(res);
        if !reference_path.exists() {
            warn!("Reference screenshot not found: {}", reference_path.display());
            return Ok(ReferenceMatch::Missing(reference_path));
        }

        let reference = image::open(&reference_path)?.to_rgba8();
        info!("Reference screenshot dimensions: {}x{}", reference.width(), reference.height());

        if captured.dimensions() != reference.dimensions() {
            return Ok(ReferenceMatch::DimensionMismatch {
                captured: captured.dimensions(),
                reference: reference.dimensions(),
            });
        }

        Ok(ReferenceMatch::Matched { captured, reference })
    }

    /// Diff two equal-sized rasters, write the diff image and grade the result.
    pub fn compare(
        &self,
        res: Resolution,
        captured: &RgbaImage,
        reference: &RgbaImage,
        options: DiffOptions,
        max_diff_pixels: u64,
    ) -> E2eResult<ComparisonResult> {
        let diff = pixel_diff(captured, reference, options)?;

        let diff_image_path = self.diff_path(res);
        std::fs::write(&diff_image_path, &diff.png)?;
        info!("Diff image saved at {}", diff_image_path.display());
        info!("Number of pixels outside threshold: {}", diff.diff_pixels);

        let (width, height) = captured.dimensions();
        Ok(ComparisonResult {
            resolution: res,
            diff_pixels: diff.diff_pixels,
            total_pixels: width as u64 * height as u64,
            max_diff_pixels,
            passed: diff.diff_pixels <= max_diff_pixels,
            diff_image_path,
            screenshot_sha256: hash_file(&self.screenshot_path(res))?,
            reference_sha256: hash_file(&self.reference_path(res))?,
        })
    }
}

/// Hash a file using SHA256
fn hash_file(path: &Path) -> E2eResult<String> {
    let data = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

/// Encode an RGBA raster as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> E2eResult<Vec<u8>> {
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)?;
    Ok(bytes)
}
