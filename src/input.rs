use std::io::{self, BufRead};

/// Longest line the interpreter accepts, newline included.
pub const MAX_LINE: usize = 2048;

/// Reads one line at a time from any buffered source. Lines are raw bytes so
/// arguments and file names reach `execvp` exactly as typed.
pub struct LineReader<R> {
    source: R,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Next line with its trailing newline, or `None` at end of input.
    /// Lines over [`MAX_LINE`] bytes are cut short; the rest of the physical
    /// line is consumed and discarded.
    pub fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut line = Vec::with_capacity(MAX_LINE);
        if self.source.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }

        if line.len() > MAX_LINE {
            tracing::debug!(len = line.len(), "input line truncated");
            line.truncate(MAX_LINE - 1);
            line.push(b'\n');
        }
        Ok(Some(line))
    }
}
