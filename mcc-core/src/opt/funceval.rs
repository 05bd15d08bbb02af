//! Partial Evaluation of Pure Calls
//!
//! A function is *evaluable* when it touches no memory and calls only
//! evaluable functions (intrinsics disqualify). A call to an evaluable
//! function with all-constant arguments is interpreted over the IR with a
//! bounded step count and call depth; when the interpreter finishes inside
//! the limits the call collapses to its result. Void calls to evaluable
//! functions are pure and are simply deleted.

use crate::analysis::CfgBuilder;
use crate::config::Config;
use crate::ir::{BlockId, FuncId, IcmpCond, Module, Opcode, ValueId};
use std::collections::HashMap;

pub struct FuncEval;

impl FuncEval {
    pub fn run(module: &mut Module, config: &Config) {
        CfgBuilder::run(module);

        // Evaluable closure; callees precede callers in the function order,
        // and a function counts as evaluable while checking its own calls
        // so self-recursion does not disqualify it.
        let mut evaluable: HashMap<FuncId, bool> = HashMap::new();
        for &func in module.funcs.iter() {
            if module.func(func).reserved {
                continue;
            }
            evaluable.insert(func, true);
            let mut ok = true;
            for &callee in module.func(func).callees.iter() {
                if module.func(callee).reserved {
                    ok = false;
                    continue;
                }
                ok &= evaluable.get(&callee).copied().unwrap_or(false);
            }
            'scan: for &block in module.func(func).blocks.iter() {
                for &inst in module.block(block).insts.iter() {
                    if matches!(module.inst(inst).op, Opcode::Load | Opcode::Store) {
                        ok = false;
                        break 'scan;
                    }
                }
            }
            evaluable.insert(func, ok);
        }

        for func in module.funcs.clone() {
            if module.func(func).reserved {
                continue;
            }
            for block in module.func(func).blocks.clone() {
                for inst in module.block(block).insts.clone() {
                    if module.inst(inst).removed || module.inst(inst).op != Opcode::Call {
                        continue;
                    }
                    let no_def = module.inst(inst).no_def;
                    let index = if no_def { 0 } else { 1 };
                    let callee = module.as_func(module.operand(inst, index));
                    if !evaluable.get(&callee).copied().unwrap_or(false) {
                        continue;
                    }
                    if no_def {
                        module.remove_inst(inst);
                        module.changed = true;
                        continue;
                    }
                    let args: Vec<ValueId> =
                        module.inst(inst).operands.iter().skip(2).copied().collect();
                    if !args.iter().all(|&a| module.is_const(a)) {
                        continue;
                    }

                    let mut interp = Interpreter {
                        module,
                        step_limit: config.eval_step_limit,
                        recursion_limit: config.eval_recursion_limit,
                        steps: 0,
                        max_depth: 0,
                        ret_value: 0,
                        stack: Vec::new(),
                    };
                    interp.push_frame();
                    let params = interp.module.func(callee).params.clone();
                    for (i, &param) in params.iter().enumerate() {
                        let v = interp.module.const_value(args[i]);
                        interp.set(param, v);
                    }
                    let ok = interp.eval(callee);
                    let result = interp.ret_value;
                    if !ok {
                        continue;
                    }
                    log::debug!(
                        "evaluated call to {} => {}",
                        module.func(callee).name,
                        result
                    );
                    let def = module.operand(inst, 0);
                    let lit = module.new_literal(result);
                    module.replace_all_uses(def, lit);
                    module.remove_inst(inst);
                    module.changed = true;
                }
            }
        }
    }
}

/// Bounded interpreter over evaluable functions.
struct Interpreter<'a> {
    module: &'a Module,
    step_limit: u32,
    recursion_limit: u32,
    steps: u32,
    max_depth: u32,
    ret_value: i32,
    stack: Vec<HashMap<ValueId, i32>>,
}

impl<'a> Interpreter<'a> {
    fn push_frame(&mut self) {
        self.stack.push(HashMap::new());
    }

    fn set(&mut self, value: ValueId, v: i32) {
        if let Some(frame) = self.stack.last_mut() {
            frame.insert(value, v);
        }
    }

    fn get(&self, value: ValueId) -> i32 {
        if self.module.is_const(value) {
            return self.module.const_value(value);
        }
        self.stack
            .last()
            .and_then(|frame| frame.get(&value).copied())
            .unwrap_or(0)
    }

    fn within_limits(&self) -> bool {
        self.steps <= self.step_limit && self.max_depth <= self.recursion_limit
    }

    /// Run a function whose frame is already pushed; pops the frame.
    fn eval(&mut self, func: FuncId) -> bool {
        self.max_depth = self.max_depth.max(self.stack.len() as u32);
        if self.max_depth > self.recursion_limit {
            self.stack.pop();
            return false;
        }
        let entry = self.module.func(func).blocks[0];
        let mut cur = Some(entry);
        let mut last_block: Option<BlockId> = None;
        while let Some(block) = cur {
            if !self.within_limits() {
                break;
            }
            cur = self.exec_block(block, &mut last_block);
        }
        self.stack.pop();
        self.within_limits()
    }

    /// Execute one block; returns the successor to continue in.
    fn exec_block(&mut self, block: BlockId, last_block: &mut Option<BlockId>) -> Option<BlockId> {
        // Phis read their values in parallel against the edge just taken.
        let mut phi_values: Vec<(ValueId, i32)> = Vec::new();
        for &inst in self.module.block(block).insts.iter() {
            if self.module.inst(inst).op != Opcode::Phi {
                break;
            }
            for (value, pred) in self.module.phi_pairs(inst) {
                if Some(pred) == *last_block {
                    phi_values.push((self.module.operand(inst, 0), self.get(value)));
                }
            }
        }
        for (def, v) in phi_values {
            self.set(def, v);
        }

        let mut next = None;
        for &inst in self.module.block(block).insts.iter() {
            self.steps += 1;
            if !self.within_limits() {
                return None;
            }
            let data = self.module.inst(inst);
            let op1 = |s: &Self| s.get(data.operands[1]);
            let op2 = |s: &Self| s.get(data.operands[2]);
            match data.op {
                Opcode::Phi => continue,
                Opcode::Add => {
                    let v = op1(self).wrapping_add(op2(self));
                    self.set(data.operands[0], v);
                }
                Opcode::Sub => {
                    let v = op1(self).wrapping_sub(op2(self));
                    self.set(data.operands[0], v);
                }
                Opcode::Mul => {
                    let v = op1(self).wrapping_mul(op2(self));
                    self.set(data.operands[0], v);
                }
                Opcode::Sdiv => {
                    let b = op2(self);
                    let v = if b == 0 { 0 } else { op1(self).wrapping_div(b) };
                    self.set(data.operands[0], v);
                }
                Opcode::Srem => {
                    let b = op2(self);
                    let v = if b == 0 { 0 } else { op1(self).wrapping_rem(b) };
                    self.set(data.operands[0], v);
                }
                Opcode::Icmp(cond) => {
                    let v = IcmpCond::eval(cond, op1(self), op2(self));
                    self.set(data.operands[0], v);
                }
                Opcode::Zext | Opcode::Trunc => {
                    let v = op1(self);
                    self.set(data.operands[0], v);
                }
                Opcode::Call => {
                    if data.no_def {
                        continue;
                    }
                    let callee = self.module.as_func(data.operands[1]);
                    let args: Vec<i32> =
                        data.operands.iter().skip(2).map(|&a| self.get(a)).collect();
                    self.push_frame();
                    let params = self.module.func(callee).params.clone();
                    let bindings: Vec<(ValueId, i32)> =
                        params.into_iter().zip(args).collect();
                    for (param, v) in bindings {
                        self.set(param, v);
                    }
                    if !self.eval(callee) {
                        continue;
                    }
                    let ret = self.ret_value;
                    self.set(data.operands[0], ret);
                }
                Opcode::Jump => {
                    *last_block = Some(block);
                    next = Some(self.module.as_block(data.operands[0]));
                }
                Opcode::Branch => {
                    *last_block = Some(block);
                    let taken = if self.get(data.operands[0]) != 0 { 1 } else { 2 };
                    next = Some(self.module.as_block(data.operands[taken]));
                }
                Opcode::Ret => {
                    if !data.operands.is_empty() {
                        self.ret_value = self.get(data.operands[0]);
                    }
                    return None;
                }
                _ => {}
            }
        }
        next
    }
}
