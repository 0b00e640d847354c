pub mod contention;
pub mod gc_view;
pub mod insurer;
pub mod passport;

pub use contention::{scan_dir, ContentionGroup, ContentionReport, GroupStatus};
pub use gc_view::{render_gc_view, GcView};
pub use insurer::{summarize, Coverage, InsurerSummary};
pub use passport::{recompute_passports, PassportEntry, PassportRegistry};
