//! ClockRelay report rendering — typed chat blocks under hard platform
//! limits, with a plain-text fallback built in lock-step.

pub mod blocks;
pub mod render;

pub use blocks::{combine_blocks, Block, RenderedMessage};
pub use render::{
    render_error, render_no_changes, render_report, render_sync_summary, RenderOptions, ReportTask,
};
