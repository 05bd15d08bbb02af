//! Machine-IR Optimization Pipeline
//!
//! Phi elimination first (the pseudo-instructions must not reach the
//! allocator), then a fixpoint loop of value numbering, peephole rewrites,
//! dead-code elimination, and strength reduction over virtual-register
//! code. Register allocation follows; once the frames stop growing the
//! frame-size pseudo-immediates become real immediates, the frame pointer
//! is eliminated, leftover division pseudos expand to `div` + `mflo`/
//! `mfhi`, blocks are merged and laid out, and a final peephole pass
//! cleans up what allocation exposed.

pub mod blocks;
pub mod dce;
pub mod divrem;
pub mod lvn;
pub mod muldiv;
pub mod peephole;
pub mod phielim;
pub mod regalloc;
pub mod removefp;

use crate::config::Config;
use crate::mips::MModule;

pub use blocks::BlockRearrange;
pub use dce::MipsDce;
pub use divrem::ReplaceDivRem;
pub use lvn::MipsLvn;
pub use muldiv::MulDiv;
pub use peephole::Peephole;
pub use phielim::PhiElimination;
pub use regalloc::GcAllocator;
pub use removefp::RemoveFp;

pub struct MipsOptimizer;

impl MipsOptimizer {
    pub fn run(module: &mut MModule, config: &Config) {
        if config.enable_ssa {
            PhiElimination::run(module);
        }
        if config.enable_mips_opt {
            loop {
                module.changed = false;
                MipsLvn::run(module);
                Peephole::run(module);
                MipsDce::run(module);
                MulDiv::run(module);
                if !module.changed {
                    break;
                }
            }
        }
        GcAllocator::run(module, config);
        module.finalize_frames();
        if config.enable_mips_opt {
            RemoveFp::run(module);
            ReplaceDivRem::run(module);
            BlockRearrange::run(module);
            loop {
                module.changed = false;
                Peephole::run(module);
                if !module.changed {
                    break;
                }
            }
        }
    }
}
