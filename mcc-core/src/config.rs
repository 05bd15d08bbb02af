//! Compilation Configuration
//!
//! Tunables for the compiler pipeline. Every knob the pass pipeline or the
//! code generator consults lives here so a single `Config` value describes a
//! whole compilation; defaults match the behavior the test suite expects.

/// Exit code reported by the driver when front-end diagnostics were raised.
pub const ERROR_EXIT_CODE: i32 = -1;

/// Configuration for one compilation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Run mem2reg and keep the IR in SSA form.
    pub enable_ssa: bool,
    /// Run the IR optimization pipeline.
    pub enable_ir_opt: bool,
    /// Run the machine-IR optimization pipeline.
    pub enable_mips_opt: bool,
    /// Materialize frequently used global addresses into a register with `la`.
    pub enable_addr_to_reg: bool,

    /// `printf` literal segments no longer than this lower to `putch` calls;
    /// longer segments are interned as `.ascii` globals and printed with
    /// `putstr`.
    pub print_str_min_length: usize,

    /// Instruction budget for one partial-evaluator run.
    pub eval_step_limit: u32,
    /// Call-depth budget for one partial-evaluator run.
    pub eval_recursion_limit: u32,

    /// Loop unrolling refuses to grow a function past this many instructions.
    pub unroll_max_insts: u32,
    /// Loop unrolling refuses to clone past this many basic blocks.
    pub unroll_max_blocks: u32,

    /// Also emit the textual IR (before lowering) to the output stream.
    pub dump_ir: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_ssa: true,
            enable_ir_opt: true,
            enable_mips_opt: true,
            enable_addr_to_reg: true,
            print_str_min_length: 2,
            eval_step_limit: 1 << 16,
            eval_recursion_limit: 1 << 10,
            unroll_max_insts: 1 << 14,
            unroll_max_blocks: 1 << 11,
            dump_ir: false,
        }
    }
}
