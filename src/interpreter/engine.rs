use log::{debug, log_enabled, trace, Level};

use crate::{
    backend::{Backend, BackendError, CompiledModule},
    ir::{verify, BinaryOp, Function, Inst, InstNode, Intrinsic, Module, Operand, Terminator, Ty, VerifyError},
};

use super::Runtime;

/// Runs a module in-process, straight off the IR.
///
/// Values live in a flat register file indexed by value number, each one masked to the
/// width of the instruction that defined it.
pub struct ExecutionEngine<'io> {
    runtime: Runtime<'io>,
    /// Maximum number of blocks to execute, `None` runs to completion
    step_limit: Option<u64>,
}

impl<'io> ExecutionEngine<'io> {
    pub fn new(runtime: Runtime<'io>) -> Self {
        Self {
            runtime,
            step_limit: None,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = Some(limit);
        self
    }

    pub fn runtime(&self) -> &Runtime<'io> {
        &self.runtime
    }

    pub fn into_runtime(self) -> Runtime<'io> {
        self.runtime
    }

    /// Execute `main`, returning its exit status
    pub fn run(&mut self, module: &Module) -> Result<i32, BackendError> {
        verify(module)?;
        debug!(
            "executing {} ({} blocks, tape of {} cells)",
            module.name,
            module.main.blocks.len(),
            module.tape_size
        );

        self.runtime.reset(module.tape_size);
        let function = &module.main;
        let mut registers = vec![0u64; function.value_count as usize];
        let mut block = Function::ENTRY;
        let mut steps = 0u64;

        loop {
            if let Some(limit) = self.step_limit {
                if steps >= limit {
                    return Err(BackendError::StepLimitExceeded { limit });
                }
            }
            steps += 1;

            let current = function.block(block);
            if log_enabled!(Level::Trace) {
                trace!("entering {} (cursor {})", current.name, self.runtime.cursor());
            }

            for node in current.insts.iter() {
                self.execute(node, &mut registers)?;
            }

            let terminator = current
                .terminator
                .as_ref()
                .ok_or_else(|| VerifyError::MissingTerminator {
                    block: current.name.clone(),
                })?;

            block = match *terminator {
                Terminator::Jump(target) => target,
                Terminator::Branch {
                    cond,
                    then_block,
                    else_block,
                } => {
                    if registers[cond.index()] != 0 {
                        then_block
                    } else {
                        else_block
                    }
                }
                Terminator::Return(status) => {
                    self.runtime.flush()?;
                    debug!("{} returned {} after {} blocks", module.name, status, steps);
                    return Ok(status);
                }
            };
        }
    }

    fn execute(&mut self, node: &InstNode, registers: &mut [u64]) -> Result<(), BackendError> {
        let operand = |registers: &[u64], operand: Operand| match operand {
            Operand::Value(value) => registers[value.index()],
            Operand::Const(constant) => constant,
        };

        match node.inst {
            Inst::FillTape { byte } => self.runtime.fill(byte),
            Inst::LoadCursor { dst } => registers[dst.index()] = self.runtime.cursor(),
            Inst::StoreCursor { src } => self.runtime.set_cursor(operand(registers, src)),
            Inst::LoadCell { dst, index } => {
                let cell = self.runtime.cell(registers[index.index()]).map_err(|e| {
                    if let Some(loc) = node.loc {
                        debug!("memory fault at {} '{}'", loc.position, loc.instruction);
                    }
                    e
                })?;
                registers[dst.index()] = cell as u64;
            }
            Inst::StoreCell { index, src } => {
                self.runtime
                    .set_cell(registers[index.index()], registers[src.index()] as u8)?;
            }
            Inst::Binary {
                dst,
                op,
                ty,
                lhs,
                rhs,
            } => {
                let lhs = registers[lhs.index()];
                let rhs = operand(registers, rhs);
                let result = match op {
                    BinaryOp::Add => lhs.wrapping_add(rhs),
                    BinaryOp::Sub => lhs.wrapping_sub(rhs),
                    BinaryOp::URem => {
                        let divisor = ty.truncate(rhs);
                        if divisor == 0 {
                            return Err(BackendError::DivisionByZero);
                        }
                        ty.truncate(lhs) % divisor
                    }
                };
                registers[dst.index()] = ty.truncate(result);
            }
            Inst::CmpEq { dst, ty, lhs, rhs } => {
                let equal = ty.truncate(registers[lhs.index()]) == ty.truncate(operand(registers, rhs));
                registers[dst.index()] = equal as u64;
            }
            Inst::ZExt { dst, src, to } | Inst::Trunc { dst, src, to } => {
                registers[dst.index()] = to.truncate(registers[src.index()]);
            }
            Inst::Call {
                dst,
                callee,
                ref args,
            } => {
                let result = match callee {
                    Intrinsic::PutByte => self.runtime.put_byte(registers[args[0].index()])?,
                    Intrinsic::GetByte => self.runtime.get_byte()?,
                };
                if let Some(dst) = dst {
                    registers[dst.index()] = Ty::I32.truncate(result);
                }
            }
        }
        Ok(())
    }
}

/// The JIT mode: consuming a module runs it immediately
impl<'io> Backend for ExecutionEngine<'io> {
    type Output = i32;

    fn name(&self) -> &'static str {
        "interpreter"
    }

    fn consume(&mut self, module: CompiledModule) -> Result<i32, BackendError> {
        let module = module.prepare()?;
        self.run(&module)
    }
}
