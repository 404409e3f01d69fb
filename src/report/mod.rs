//! Per-frame result reporting.
//!
//! Turns the raw boxes of one inference call into what a consumer shows:
//! - `rank`: the top-4 boxes by confidence
//! - `labels`: the configured label to class-index table
//! - `table`: the normalized pipe table, or the no-detections sentinel

pub mod labels;
pub mod rank;
pub mod table;

pub use labels::ClassMap;
pub use rank::{RankedResultSet, TOP_K};
pub use table::{
    format_result, ImageId, ReportError, ResultRow, ResultTable, NO_DETECTIONS_MESSAGE,
};
