//! A mid-level framework for stage-based rendering: render stages and their selectors, filters
//! and pipeline processors, sort keys, the per-frame collection protocol, and resource group
//! layouts

mod resources;
pub use resources::*;

pub mod render_stages;

pub use strata_api::StrataResult;
