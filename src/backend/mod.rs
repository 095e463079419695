use std::collections::HashSet;

use clap::ValueEnum;
use log::debug;
use thiserror::Error;

use crate::{
    ir::{verify, Module, VerifyError},
    optimizer::{optimize, Optimizations},
};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Module failed verification: {0}")]
    Verify(
        #[from]
        VerifyError,
    ),

    #[error("IO Error: {0}")]
    Io(
        #[from]
        std::io::Error,
    ),

    #[error("Object file generation failed: {0}")]
    Object(
        #[from]
        object::write::Error,
    ),

    #[error("Linker `{linker}` could not be found")]
    LinkerNotFound { linker: String },

    #[error("Linking with `{linker}` failed (exit code {code:?}): {stderr}")]
    LinkFailed {
        linker: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Native code generation only supports x86_64 linux (host is {arch} {os})")]
    UnsupportedTarget { arch: &'static str, os: &'static str },

    #[error("Module can't be lowered: {reason}")]
    UnsupportedModule { reason: String },

    #[error("Cell {index} is outside of the tape (size {size})")]
    MemoryFault { index: u64, size: usize },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Execution exceeded the limit of {limit} blocks")]
    StepLimitExceeded { limit: u64 },
}

/// What the input primitive hands back once the input stream is exhausted
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EofPolicy {
    /// The cell receives 0
    #[default]
    Zero,
    /// `getchar` semantics, -1 truncated to a byte (the cell receives 255)
    MinusOne,
}

impl EofPolicy {
    /// The I32 value returned by the input primitive at end of input
    pub fn sentinel(self) -> u32 {
        match self {
            EofPolicy::Zero => 0,
            EofPolicy::MinusOne => u32::MAX,
        }
    }
}

/// The translator's finished output.
///
/// Owns the IR and the hints the caller passed through (which passes to run). Once
/// handed to a backend nothing on the translator side touches it again.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    module: Module,
    passes: HashSet<Optimizations>,
}

impl CompiledModule {
    pub fn new(module: Module, passes: HashSet<Optimizations>) -> CompiledModule {
        CompiledModule { module, passes }
    }

    pub fn ir(&self) -> &Module {
        &self.module
    }

    pub fn passes(&self) -> &HashSet<Optimizations> {
        &self.passes
    }

    /// Verify, run the requested optimization pipeline and verify again
    pub fn prepare(self) -> Result<Module, BackendError> {
        verify(&self.module)?;
        if self.passes.is_empty() {
            return Ok(self.module);
        }

        let before = self.module.main.inst_count();
        let optimized = optimize(&self.module, &self.passes);
        debug!(
            "optimized {} with {:?}: {} -> {} instructions, {} blocks",
            optimized.name,
            self.passes,
            before,
            optimized.main.inst_count(),
            optimized.main.blocks.len()
        );
        verify(&optimized)?;
        Ok(optimized)
    }
}

/// Anything that consumes a finished module: executes it, writes it out...
pub trait Backend {
    type Output;

    fn name(&self) -> &'static str;

    fn consume(&mut self, module: CompiledModule) -> Result<Self::Output, BackendError>;
}
