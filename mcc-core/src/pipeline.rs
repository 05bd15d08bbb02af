//! Compilation Pipeline
//!
//! Orchestrates the stages end to end: lex, parse, semantic analysis, IR
//! construction, IR optimization to fixpoint, machine lowering, machine
//! optimization and register allocation, emission. Any front-end
//! diagnostic stops the pipeline before IR construction; the backend runs
//! only on checked input and does not fail.

use crate::config::Config;
use crate::errors::DiagnosticLog;
use crate::frontend::{Lexer, Parser, SemanticAnalyzer};
use crate::ir::builder::IrBuilder;
use crate::mips::lower::MipsLowering;
use crate::mips::opt::MipsOptimizer;
use crate::opt::IrOptimizer;
use serde::{Deserialize, Serialize};

/// Statistics collected across a compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileStats {
    pub tokens: usize,
    pub functions: usize,
    pub globals: usize,
    pub ir_instructions: usize,
    pub machine_instructions: usize,
}

/// A successful compilation.
#[derive(Debug)]
pub struct CompileOutput {
    pub assembly: String,
    /// Textual IR after optimization, when the config asks for it.
    pub ir: Option<String>,
    pub stats: CompileStats,
}

/// Front-end failure: the diagnostics, already rendered for both streams.
#[derive(Debug)]
pub struct SourceDiagnostics {
    pub count: usize,
    /// Human-readable listing with source excerpts and carets.
    pub rendered: String,
    /// Plain `line code` listing of the coded diagnostics.
    pub listing: String,
}

pub struct CompilePipeline;

impl CompilePipeline {
    /// Compile one source text to MIPS assembly.
    pub fn compile(source: &str, config: &Config) -> Result<CompileOutput, SourceDiagnostics> {
        let mut stats = CompileStats::default();
        let mut diags = DiagnosticLog::new();

        log::info!("stage: lexing");
        let (tokens, src) = Lexer::new(source).scan(&mut diags);
        stats.tokens = tokens.len();

        log::info!("stage: parsing");
        let (mut unit, fatal) = Parser::parse(&tokens, &mut diags);
        if fatal {
            return Err(SourceDiagnostics {
                count: diags.len().max(1),
                rendered: diags.render(&src),
                listing: diags.render_plain(),
            });
        }

        log::info!("stage: semantic analysis");
        let mut table = SemanticAnalyzer::analyze(&mut unit, &mut diags);
        if diags.has_errors() {
            return Err(SourceDiagnostics {
                count: diags.len(),
                rendered: diags.render(&src),
                listing: diags.render_plain(),
            });
        }

        log::info!("stage: IR construction");
        let mut module = IrBuilder::build(&unit, &mut table, config);
        stats.functions = module.funcs.len();
        stats.globals = module.globals.len();

        log::info!("stage: IR optimization");
        IrOptimizer::run(&mut module, config);
        stats.ir_instructions = module
            .funcs
            .iter()
            .flat_map(|&f| module.func(f).blocks.iter())
            .map(|&b| module.block(b).insts.len())
            .sum();

        let ir = config
            .dump_ir
            .then(|| crate::ir::display::module_to_string(&module));

        log::info!("stage: machine lowering");
        crate::analysis::CfgBuilder::run(&mut module);
        let dominance = crate::analysis::Dominance::compute(&module);
        let loops = crate::analysis::LoopInfo::compute(&module, &dominance);
        let mut mmodule = MipsLowering::lower(&module, &loops, config);

        log::info!("stage: machine optimization and register allocation");
        MipsOptimizer::run(&mut mmodule, config);
        stats.machine_instructions = mmodule
            .funcs
            .iter()
            .flat_map(|&f| mmodule.func(f).blocks.iter())
            .map(|&b| mmodule.block(b).insts.len())
            .sum();

        log::info!("stage: emission");
        let assembly = crate::mips::emit::emit(&mmodule);
        log::info!(
            "compiled {} functions, {} machine instructions",
            stats.functions,
            stats.machine_instructions
        );

        Ok(CompileOutput {
            assembly,
            ir,
            stats,
        })
    }
}
