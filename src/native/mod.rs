//! Ahead of time compilation to a native x86_64 linux executable.

pub mod elf;
pub mod link;
pub mod x86_64;

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};

use crate::backend::{Backend, BackendError, CompiledModule, EofPolicy};

pub use self::{elf::write_object, link::Linker, x86_64::X86_64Codegen};

/// Only the host we can link & run on, the encoder itself works anywhere
pub fn check_host_target() -> Result<(), BackendError> {
    if cfg!(all(target_arch = "x86_64", target_os = "linux")) {
        Ok(())
    } else {
        Err(BackendError::UnsupportedTarget {
            arch: std::env::consts::ARCH,
            os: std::env::consts::OS,
        })
    }
}

/// Produces the bytes of an ELF relocatable object
#[derive(Debug, Clone, Default)]
pub struct ObjectEmitter {
    eof: EofPolicy,
}

impl ObjectEmitter {
    pub fn new(eof: EofPolicy) -> Self {
        Self { eof }
    }
}

impl Backend for ObjectEmitter {
    type Output = Vec<u8>;

    fn name(&self) -> &'static str {
        "object"
    }

    fn consume(&mut self, module: CompiledModule) -> Result<Vec<u8>, BackendError> {
        let module = module.prepare()?;
        let code = X86_64Codegen::new(self.eof).compile(&module)?;
        write_object(&code)
    }
}

/// Writes `<output>.o`, links it into `output` and removes the object again
#[derive(Debug, Clone)]
pub struct ExecutableBuilder {
    output: PathBuf,
    emitter: ObjectEmitter,
    linker: Linker,
}

impl ExecutableBuilder {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            emitter: ObjectEmitter::default(),
            linker: Linker::default(),
        }
    }

    pub fn with_eof_policy(mut self, eof: EofPolicy) -> Self {
        self.emitter = ObjectEmitter::new(eof);
        self
    }

    pub fn with_linker(mut self, linker: Linker) -> Self {
        self.linker = linker;
        self
    }

    pub fn object_path(&self) -> PathBuf {
        let mut path = OsString::from(self.output.as_os_str());
        path.push(".o");
        PathBuf::from(path)
    }
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            debug!("couldn't remove {}: {}", path.display(), e);
        }
    }
}

impl Backend for ExecutableBuilder {
    type Output = PathBuf;

    fn name(&self) -> &'static str {
        "executable"
    }

    fn consume(&mut self, module: CompiledModule) -> Result<PathBuf, BackendError> {
        check_host_target()?;

        let bytes = self.emitter.consume(module)?;
        let object = self.object_path();
        if let Err(e) = fs::write(&object, bytes) {
            remove_if_exists(&object);
            return Err(e.into());
        }

        let linked = self.linker.link(&object, &self.output);
        remove_if_exists(&object);

        match linked {
            Ok(()) => {
                info!("wrote executable {}", self.output.display());
                Ok(self.output.clone())
            }
            Err(e) => {
                // never leave a half written executable behind
                remove_if_exists(&self.output);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{CompileOptions, Compiler};

    #[test]
    fn object_path_appends_extension() {
        assert_eq!(
            ExecutableBuilder::new("out/hello").object_path(),
            PathBuf::from("out/hello.o")
        );
        assert_eq!(
            ExecutableBuilder::new("a.out").object_path(),
            PathBuf::from("a.out.o")
        );
    }

    #[test]
    fn emitter_produces_elf() {
        let compilation = Compiler::new(CompileOptions::default()).compile(b"+.").unwrap();
        let bytes = ObjectEmitter::default().consume(compilation.module).unwrap();
        assert_eq!(&bytes[..4], b"\x7fELF");
    }

    #[test]
    fn failed_link_leaves_nothing_behind() {
        if check_host_target().is_err() {
            return;
        }

        let dir = std::env::temp_dir().join(format!("brainforge-link-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let output = dir.join("never");

        let compilation = Compiler::new(CompileOptions::default()).compile(b"+").unwrap();
        let mut builder =
            ExecutableBuilder::new(&output).with_linker(Linker::new("brainforge-no-such-linker"));
        assert!(matches!(
            builder.consume(compilation.module),
            Err(BackendError::LinkerNotFound { .. })
        ));
        assert!(!output.exists());
        assert!(!builder.object_path().exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unwritable_object_is_reported_and_not_left_behind() {
        if check_host_target().is_err() {
            return;
        }

        let output = std::env::temp_dir()
            .join(format!("brainforge-missing-{}", std::process::id()))
            .join("nested")
            .join("out");
        let compilation = Compiler::new(CompileOptions::default()).compile(b"+").unwrap();
        let mut builder = ExecutableBuilder::new(&output);
        assert!(matches!(
            builder.consume(compilation.module),
            Err(BackendError::Io(_))
        ));
        assert!(!builder.object_path().exists());
        assert!(!output.exists());
    }
}
