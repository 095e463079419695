use std::collections::HashSet;

use bitflags::bitflags;
use log::debug;

use crate::{
    backend::CompiledModule,
    error::{Error, TranslationError},
    ir::{verify, Builder, DebugInfo, Module},
    machine::MachineModel,
    optimizer::Optimizations,
    stats::{Statistics, StatisticsCollector},
    translator::InstructionTranslator,
    validator::validate,
};

bitflags! {
    /// Hints passed through to the backend untouched
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CompileFlags: u8 {
        /// Run every optimization pass
        const OPTIMIZE = 0b0000_0001;
        /// Attach source positions to every instruction
        const DEBUG_INFO = 0b0000_0010;
    }
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Cells on the tape
    pub memory_size: usize,
    pub flags: CompileFlags,
    /// Individual passes, ignored when `OPTIMIZE` asks for all of them
    pub passes: HashSet<Optimizations>,
    pub module_name: String,
    /// Recorded in the module's debug info
    pub file_name: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            memory_size: MachineModel::DEFAULT_SIZE,
            flags: CompileFlags::empty(),
            passes: HashSet::new(),
            module_name: "brainforge".to_string(),
            file_name: None,
        }
    }
}

impl CompileOptions {
    fn pipeline(&self) -> HashSet<Optimizations> {
        if self.flags.contains(CompileFlags::OPTIMIZE) {
            Optimizations::all()
        } else {
            self.passes.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct Compilation {
    pub module: CompiledModule,
    pub statistics: Statistics,
}

/// Source in, IR out. Holds no state between calls so one compiler can be shared.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new(options: CompileOptions) -> Compiler {
        Compiler { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn compile(&self, source: &[u8]) -> Result<Compilation, Error> {
        validate(source)?;

        let debug_info = self.options.flags.contains(CompileFlags::DEBUG_INFO);
        let mut builder = Builder::new("main");
        let machine = MachineModel::initialize(&mut builder, self.options.memory_size)?;
        let translator =
            InstructionTranslator::new(builder, machine, StatisticsCollector::new(), debug_info);
        let (main, statistics) = translator.translate(source)?;

        let module = Module {
            name: self.options.module_name.clone(),
            tape_size: self.options.memory_size,
            main,
            debug_info: debug_info.then(|| DebugInfo {
                file_name: self
                    .options
                    .file_name
                    .clone()
                    .unwrap_or_else(|| "<source>".to_string()),
            }),
        };
        verify(&module).map_err(TranslationError::from)?;

        debug!(
            "compiled {} bytes into {} blocks ({} instructions)",
            source.len(),
            module.main.blocks.len(),
            module.main.inst_count()
        );

        Ok(Compilation {
            module: CompiledModule::new(module, self.options.pipeline()),
            statistics,
        })
    }
}
