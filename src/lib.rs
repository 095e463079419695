//! Brainfuck to native code, by way of a small SSA style IR.

pub mod backend;
pub mod compiler;
pub mod error;
pub mod interpreter;
pub mod ir;
pub mod lexer;
pub mod machine;
pub mod native;
pub mod optimizer;
pub mod stats;
pub mod translator;
pub mod validator;

pub use crate::{
    backend::{Backend, BackendError, CompiledModule, EofPolicy},
    compiler::{CompileFlags, CompileOptions, Compilation, Compiler},
    error::{Error, TranslationError},
    interpreter::{ExecutionEngine, Runtime},
    native::{ExecutableBuilder, ObjectEmitter},
    optimizer::Optimizations,
    stats::Statistics,
    validator::SyntaxError,
};
