//! # Road Network Gap Validator
//!
//! Finds likely digitization gaps in planar road networks: dangling polyline
//! endpoints that stop just short of another road. Two detectors run side by
//! side and a decision engine fuses their verdicts.
//!
//! ## Core Features
//!
//! - **WKT Ingestion**: Tolerant `LINESTRING` extraction; bad fragments become warnings
//! - **Adaptive Threshold**: Gap cut-off derived from the network's own gap distribution
//! - **Anomaly Detection**: Isolation forest over per-polyline features, behind a trait
//! - **Decision Fusion**: Agreement boosting, deduplication and severity bands
//! - **Auto-Fix**: Snap suggestions and a corrected WKT export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roadgap::Validator;
//!
//! let validator = Validator::builder().build()?;
//! let report = validator.analyze("LINESTRING(0 0, 10 0)\nLINESTRING(10.3 0.05, 20 0)")?;
//!
//! for issue in &report.issues {
//!     println!("{} {:?} {}", issue.polyline_id, issue.endpoint(), issue.severity);
//! }
//! println!("{}", report.corrected_wkt());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Outlier Model
//!
//! ```rust,no_run
//! use roadgap::{Validator, IsolationForest};
//!
//! let validator = Validator::builder()
//!     .precision(4)
//!     .contamination(0.1)
//!     .outlier_model(IsolationForest { trees: 200, max_samples: 128, seed: 7 })
//!     .build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod algorithms;
pub mod config;
pub mod decision;
pub mod detectors;
pub mod error;
pub mod features;
pub mod fix;
pub mod index;
pub mod io;
pub mod pipeline;
pub mod spatial;
pub mod stats;
pub mod traits;
pub mod types;

pub use algorithms::{FittedForest, IsolationForest};
pub use config::{AnalysisConfig, ForestConfig};
pub use error::{AnalysisWarning, ParseError, Result, RoadGapError};
pub use fix::{apply_fixes, suggest_fixes};
pub use io::{corrected_wkt, parse_network, write_network};
pub use pipeline::{AnalysisContext, Validator, builder::ValidatorBuilder};
pub use traits::OutlierModel;
pub use types::*;
