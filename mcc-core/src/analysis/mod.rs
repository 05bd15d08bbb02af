//! IR Analyses
//!
//! Control-flow and call-graph construction, dominance, and natural loops.
//! Analyses are plain data computed on demand; passes that mutate the CFG
//! recompute them rather than patching them incrementally.

pub mod cfg;
pub mod dominance;
pub mod loops;

pub use cfg::CfgBuilder;
pub use dominance::Dominance;
pub use loops::{Loop, LoopInfo};
