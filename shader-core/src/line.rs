//! Line assembly for the serial terminal

use heapless::{Deque, Vec};

#[inline]
pub const fn is_newline(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

#[inline]
pub const fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\n' || b == b'\r' || b == b'\t'
}

/// The buffer filled up before a newline arrived; its contents were dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Overflow;

/// Bytes received from the serial port, waiting to be split into lines.
pub struct LineBuffer<const N: usize> {
    bytes: Deque<u8, N>,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self {
            bytes: Deque::new(),
        }
    }

    /// Append a received byte.
    ///
    /// On overflow the partial line is discarded so the next newline starts
    /// clean, and the byte that did not fit is dropped too.
    pub fn push(&mut self, b: u8) -> Result<(), Overflow> {
        if self.bytes.push_back(b).is_err() {
            self.bytes.clear();
            return Err(Overflow);
        }
        Ok(())
    }

    /// Pop the next complete line, terminator included.
    pub fn take_line(&mut self) -> Option<Vec<u8, N>> {
        let idx = self.bytes.iter().position(|b| is_newline(*b))?;

        let mut line = Vec::new();
        for _ in 0..=idx {
            if let Some(b) = self.bytes.pop_front() {
                // idx < N so the line always has room
                let _ = line.push(b);
            }
        }
        Some(line)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
