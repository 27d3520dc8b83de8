//! Gloss web viewer visual regression harness
//!
//! Drives a browser over WebDriver, renders the viewer canvas at a list of
//! candidate resolutions and compares the first capture whose size matches a
//! stored reference image.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  run_with_retry (runner)                    │
//! │    └── run_once: connect → compare_in_session → teardown    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  compare_in_session                                         │
//! │    ├── open_viewer / wait_until_ready (viewer)              │
//! │    └── select_and_compare                                   │
//! │          for each Resolution, in priority order:            │
//! │            force_resolution → settle → screenshot_element   │
//! │            ReferenceStore::match_reference                  │
//! │              ├── mismatch / missing → next resolution       │
//! │              └── matched → pixel_diff (diff) → stop         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ViewerSession / SessionFactory (browser)                   │
//! │    └── WebDriverSession (webdriver, thirtyfour)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod browser;
pub mod config;
pub mod diff;
pub mod error;
pub mod runner;
pub mod viewer;
pub mod visual;
pub mod webdriver;

pub use browser::{Browser, SessionFactory, ViewerSession};
pub use config::HarnessConfig;
pub use error::{E2eError, E2eResult};
pub use runner::{run_once, run_with_retry, RunOutcome};
pub use visual::{ComparisonResult, ReferenceStore, Resolution};
