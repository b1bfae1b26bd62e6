//! I/O modules for reading batch configuration, pair manifests and acquisition metadata

pub mod config;
pub mod pair_list;
pub mod prm;

pub use config::{Configuration, StageGate, UnwrapVariant};
pub use pair_list::PairList;
pub use prm::PrmReader;
