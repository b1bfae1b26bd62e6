//! intfbatch: batch interferogram generation for SAR time-series analysis
//!
//! This library sequences the external processing tools that turn pairs of
//! repeat-pass radar acquisitions into filtered, optionally unwrapped and
//! geocoded interferograms. It owns stage gating, per-pair workspaces, the
//! shared land mask and result publication; the signal processing itself is
//! delegated through the [`tools::ProcessingTools`] trait.

pub mod types;
pub mod io;
pub mod core;
pub mod tools;

// Re-export main types and functions for easier access
pub use crate::types::{
    AcquisitionEpoch, BatchError, BatchResult, PairKey, PairSpec, Region, ResolvedPair,
};

pub use crate::io::{Configuration, PairList, PrmReader, StageGate, UnwrapVariant};
pub use crate::core::{
    resolve_pairs, BatchLayout, BatchOptions, BatchReport, BatchRunner, CancellationFlag,
    FailurePolicy, PairOutcome, PairReport, TopographyStatus,
};
pub use crate::tools::{GmtsarTools, ProcessingTools};
