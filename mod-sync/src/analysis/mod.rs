pub mod diff;
pub mod inventory;
pub mod probe;

pub use diff::{compute_diff, DiffAnalyzer};
pub use inventory::scan_workshop_root;
pub use probe::{LocalizationContentProbe, ProbeOutcome};
