use std::{
    io,
    path::Path,
    process::Command,
};

use log::debug;

use crate::backend::BackendError;

/// The system C compiler driver, it knows where crt1.o & libc live
#[derive(Debug, Clone)]
pub struct Linker {
    program: String,
    args: Vec<String>,
}

impl Default for Linker {
    fn default() -> Self {
        Self::new("cc")
    }
}

impl Linker {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// `cc <object> -o <output> [args...]`
    pub fn link(&self, object: &Path, output: &Path) -> Result<(), BackendError> {
        debug!(
            "linking {} -> {} with {} {:?}",
            object.display(),
            output.display(),
            self.program,
            self.args
        );

        let result = Command::new(&self.program)
            .arg(object)
            .arg("-o")
            .arg(output)
            .args(&self.args)
            .output();

        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(BackendError::LinkerNotFound {
                linker: self.program.clone(),
            }),
            Err(e) => Err(e.into()),
            Ok(out) if !out.status.success() => Err(BackendError::LinkFailed {
                linker: self.program.clone(),
                code: out.status.code(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            }),
            Ok(_) => Ok(()),
        }
    }
}
