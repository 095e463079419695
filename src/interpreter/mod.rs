pub mod engine;

pub use self::engine::ExecutionEngine;

use std::io::{self, Read, Write};

use crate::backend::{BackendError, EofPolicy};

/// The machine state a module executes against: tape, cursor and the IO streams
pub struct Runtime<'io> {
    /// Index into the tape
    cursor: u64,

    tape: Vec<u8>,

    in_stream: Box<dyn Read + 'io>,
    out_stream: Box<dyn Write + 'io>,

    eof: EofPolicy,
}

impl<'io> Runtime<'io> {
    pub fn new(in_stream: Box<dyn Read + 'io>, out_stream: Box<dyn Write + 'io>) -> Self {
        Self {
            cursor: 0,
            tape: vec![],
            in_stream,
            out_stream,
            eof: EofPolicy::default(),
        }
    }

    pub fn with_eof_policy(mut self, eof: EofPolicy) -> Self {
        self.eof = eof;
        self
    }

    /// Process stdin/stdout
    pub fn stdio() -> Runtime<'static> {
        Runtime::new(Box::new(io::stdin()), Box::new(io::stdout()))
    }

    /// Fresh zeroed tape of `size` cells, the module initializes everything else
    pub fn reset(&mut self, size: usize) {
        self.tape = vec![0; size];
        self.cursor = 0;
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: u64) {
        // only checked once it's used to touch a cell
        self.cursor = cursor;
    }

    pub fn fill(&mut self, byte: u8) {
        self.tape.fill(byte);
    }

    pub fn cell(&self, index: u64) -> Result<u8, BackendError> {
        self.check_index(index)?;
        Ok(self.tape[index as usize])
    }

    pub fn set_cell(&mut self, index: u64, value: u8) -> Result<(), BackendError> {
        self.check_index(index)?;
        self.tape[index as usize] = value;
        Ok(())
    }

    /// `putchar`, writes the low byte and hands the argument back
    pub fn put_byte(&mut self, value: u64) -> Result<u64, BackendError> {
        self.out_stream.write_all(&[value as u8])?;
        Ok(value)
    }

    /// `getchar`, the end of input sentinel depends on the policy
    pub fn get_byte(&mut self) -> Result<u64, BackendError> {
        let mut byte = [0u8; 1];
        loop {
            match self.in_stream.read(&mut byte) {
                Ok(0) => return Ok(self.eof.sentinel() as u64),
                Ok(_) => return Ok(byte[0] as u64),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn flush(&mut self) -> Result<(), BackendError> {
        self.out_stream.flush()?;
        Ok(())
    }

    /// check if an index is within the tape
    fn check_index(&self, index: u64) -> Result<(), BackendError> {
        if index >= self.tape.len() as u64 {
            return Err(BackendError::MemoryFault {
                index,
                size: self.tape.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells_outside_the_tape_fault() {
        let mut runtime = Runtime::new(Box::new(io::empty()), Box::new(io::sink()));
        runtime.reset(4);
        assert!(runtime.set_cell(3, 1).is_ok());
        assert!(matches!(
            runtime.cell(4),
            Err(BackendError::MemoryFault { index: 4, size: 4 })
        ));
    }

    #[test]
    fn input_then_end_of_input() {
        let mut runtime = Runtime::new(Box::new(&b"a"[..]), Box::new(io::sink()))
            .with_eof_policy(EofPolicy::MinusOne);
        assert_eq!(runtime.get_byte().unwrap(), b'a' as u64);
        assert_eq!(runtime.get_byte().unwrap(), u32::MAX as u64);
    }

    #[test]
    fn output_goes_to_the_stream() {
        let mut out = Vec::new();
        {
            let mut runtime = Runtime::new(Box::new(io::empty()), Box::new(&mut out));
            assert_eq!(runtime.put_byte(0x141).unwrap(), 0x141);
            runtime.flush().unwrap();
        }
        assert_eq!(out, b"A");
    }
}
