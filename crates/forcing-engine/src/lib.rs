//! Forcing assembly for a hydrologic model.
//!
//! For every output timestep and every configured atmospheric product this
//! crate keeps track of the two input frames that bracket the output time,
//! regrids them onto the local model subdomain only when the bracket
//! changes, and blends them in time into the eight canonical forcing
//! variables.
//!
//! # Architecture
//!
//! ```text
//! ForcingConfig ──► init_forcings ──► BTreeMap<ProductKey, ForcingState>
//!                                              │
//!  ForcingEngine::step(now), per product:      ▼
//!      BracketResolver::find_bracket ──► bracket available?
//!                                          │ no  ─► Skipped (missing value)
//!                                          ▼ yes
//!      regrid_inputs (stale frames only) ──► FrameRegridder
//!                                          │
//!      TemporalInterpolation::interpolate ─► final_forcings
//!                                          │
//!      ForcingPostProcessor::apply ────────► handed to the model
//! ```
//!
//! Decoding and spatial regridding are supplied by the caller through
//! [`FrameRegridder`]; downscaling and bias correction through
//! [`ForcingPostProcessor`].

pub mod bracket;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod interp;
pub mod options;
pub mod postprocess;
pub mod product;
pub mod regrid;
pub mod registry;
pub mod state;
pub mod time;

pub use bracket::{render_template, BracketResolver, CycleBracketResolver, FrameLookup};
pub use config::{ForcingConfig, GridConfig, ProductConfig};
pub use engine::{ForcingEngine, ProductOutcome, StepReport};
pub use error::{ErrorCategory, ForcingError, Result};
pub use grid::{DomainDecomposition, GridMetadata};
pub use options::{
    BiasCorrection, BiasCorrectionOptions, DownscaleOptions, ProcessingOptions, RegridMethod,
    TemporalInterpolation,
};
pub use postprocess::{configured_steps, ForcingPostProcessor, PassThrough, PostProcessStep};
pub use product::{
    define_product, Encoding, ForcingVariable, ProductKey, ProductKind, ProductSpec, SourceField,
    NUM_FORCING_VARIABLES,
};
pub use regrid::{place_fields, regrid_inputs, FrameRegridder, RegridRequest};
pub use registry::{init_forcings, lapse_rate_path};
pub use state::{AuxiliaryInputs, Bracket, ForcingState, Frame, FrameSlot, StaleFrames};
pub use time::{parse_time, OutputClock};
