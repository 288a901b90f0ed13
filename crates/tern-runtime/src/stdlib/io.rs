//! Console primitives and their I/O handles
//!
//! Output and input go through shared handles so the host (or a test) can
//! swap stdout/stdin for in-memory buffers.

use crate::error::{RuntimeError, RuntimeResult};
use crate::symbol::Symbol;
use std::cell::RefCell;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::rc::Rc;

/// Shared output sink for `write` and the `read` prompt
pub type OutputWriter = Rc<RefCell<Box<dyn Write>>>;

/// Shared input source for `read`
pub type InputReader = Rc<RefCell<Box<dyn BufRead>>>;

/// Prompt printed by `read` before consuming input
pub const READ_PROMPT: &str = "> ";

pub fn stdout_writer() -> OutputWriter {
    Rc::new(RefCell::new(Box::new(std::io::stdout())))
}

pub fn stdin_reader() -> InputReader {
    Rc::new(RefCell::new(Box::new(BufReader::new(std::io::stdin()))))
}

/// In-memory output buffer that can be shared with an [`OutputWriter`]
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// I/O handles used by the console primitives
#[derive(Clone)]
pub struct Io {
    pub output: OutputWriter,
    pub input: InputReader,
}

impl Io {
    /// Process stdout/stdin
    pub fn stdio() -> Self {
        Self {
            output: stdout_writer(),
            input: stdin_reader(),
        }
    }

    /// Fixed input text, output captured in the returned buffer
    pub fn captured(input: &str) -> (Self, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let io = Self {
            output: Rc::new(RefCell::new(Box::new(buffer.clone()))),
            input: Rc::new(RefCell::new(Box::new(Cursor::new(input.as_bytes().to_vec())))),
        };
        (io, buffer)
    }
}

/// `write(n)`: print the integer and a newline, then flush
pub fn write(output: &OutputWriter, value: &Symbol) -> RuntimeResult<Symbol> {
    let n = value.as_int("write")?;
    let mut out = output.borrow_mut();
    writeln!(out, "{}", n)?;
    out.flush()?;
    Ok(Symbol::Null)
}

/// `read()`: print the prompt, then consume one whitespace-delimited integer
pub fn read(input: &InputReader, output: &OutputWriter) -> RuntimeResult<Symbol> {
    {
        let mut out = output.borrow_mut();
        write!(out, "{}", READ_PROMPT)?;
        out.flush()?;
    }

    let token = next_token(&mut **input.borrow_mut())?;
    if token.is_empty() {
        return Err(RuntimeError::Io {
            message: "read: end of input".to_string(),
        });
    }
    token
        .parse::<i32>()
        .map(Symbol::Int)
        .map_err(|_| RuntimeError::Io {
            message: format!("read: '{}' is not an integer", token),
        })
}

fn next_token<R: BufRead + ?Sized>(reader: &mut R) -> RuntimeResult<String> {
    let mut token = Vec::new();
    loop {
        let (consumed, done) = {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            let mut consumed = 0;
            let mut done = false;
            for &byte in buf {
                if byte.is_ascii_whitespace() {
                    consumed += 1;
                    if !token.is_empty() {
                        done = true;
                        break;
                    }
                } else {
                    token.push(byte);
                    consumed += 1;
                }
            }
            (consumed, done)
        };
        reader.consume(consumed);
        if done {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&token).into_owned())
}
