pub mod metadata;
pub mod reconciliation;
pub mod update_detection;

pub use metadata::RemoteMetadataMerger;
pub use reconciliation::ReconciliationApplier;
pub use update_detection::{DetectorParts, ModUpdateDetector};
