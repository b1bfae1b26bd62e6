//! Batch pipeline: workspaces, shared caches and processing stages

pub mod layout;
pub mod workspace;
pub mod landmask;
pub mod publish;
pub mod topography;
pub mod interferogram;
pub mod pipeline;

// Re-export main types
pub use layout::BatchLayout;
pub use workspace::Workspace;
pub use landmask::LandmaskCache;
pub use publish::ResultPublisher;
pub use topography::{TopographyStage, TopoProducts};
pub use interferogram::{InterferogramStage, PairProducts};
pub use pipeline::{
    resolve_pairs, BatchOptions, BatchReport, BatchRunner, CancellationFlag, FailurePolicy,
    PairOutcome, PairReport, TopographyStatus,
};
