//! Prompt input and device output framing

use std::io::{self, Read};

/// What the user typed at the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input<'a> {
    /// Stop prompting and only show device output
    Run,
    Empty,
    Command(&'a str),
}

impl<'a> Input<'a> {
    pub fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => Input::Empty,
            "run" => Input::Run,
            command => Input::Command(command),
        }
    }
}

/// Bytes to send for a command. The firmware only acts on complete lines.
pub fn frame(command: &str) -> Vec<u8> {
    let mut bytes = command.trim_end_matches(['\r', '\n']).as_bytes().to_vec();
    bytes.push(b'\n');
    bytes
}

/// Reassembles `\r\n` terminated device lines from arbitrary reads
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in bytes {
            if b == b'\n' {
                if self.pending.last() == Some(&b'\r') {
                    self.pending.pop();
                }
                lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                self.pending.clear();
            } else {
                self.pending.push(b);
            }
        }
        lines
    }
}

/// Read until the port has been quiet for one timeout, returning every
/// complete line seen.
pub fn read_available<R: Read + ?Sized>(
    port: &mut R,
    splitter: &mut LineSplitter,
) -> io::Result<Vec<String>> {
    let mut buf = [0u8; 256];
    let mut lines = Vec::new();

    loop {
        match port.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => lines.extend(splitter.push(&buf[..n])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    /// Hands out one chunk per read, then times out
    struct Chunks(VecDeque<&'static [u8]>);

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(chunk) = self.0.pop_front() else {
                return Err(io::ErrorKind::TimedOut.into());
            };
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn test_commands_are_sent_as_lines() {
        assert_eq!(frame("shader open"), b"shader open\n");
        assert_eq!(frame("motor rot 92"), b"motor rot 92\n");
        // Already terminated input is not doubled up
        assert_eq!(frame("motor test\r\n"), b"motor test\n");
    }

    #[test]
    fn test_parse_input() {
        assert_eq!(Input::parse("run"), Input::Run);
        assert_eq!(Input::parse("  run \n"), Input::Run);
        assert_eq!(Input::parse("   "), Input::Empty);
        assert_eq!(
            Input::parse(" motor inc -5 \n"),
            Input::Command("motor inc -5")
        );
        assert_eq!(Input::parse("runner"), Input::Command("runner"));
    }

    #[test]
    fn test_splitter_joins_partial_reads() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.push(b"C: 25.").is_empty());
        assert_eq!(splitter.push(b"00\r\nR: -5"), ["C: 25.00"]);
        assert_eq!(splitter.push(b"20\r\n"), ["R: -520"]);
    }

    #[test]
    fn test_read_available_stops_on_timeout() {
        let mut port = Chunks(VecDeque::from([&b"C: 30.00\r\nR: -"[..], b"520\r\nC: 3"]));
        let mut splitter = LineSplitter::default();

        let lines = read_available(&mut port, &mut splitter).unwrap();
        assert_eq!(lines, ["C: 30.00", "R: -520"]);

        // The unfinished line is kept for the next read
        let mut port = Chunks(VecDeque::from([&b"1.50\r\n"[..]]));
        let lines = read_available(&mut port, &mut splitter).unwrap();
        assert_eq!(lines, ["C: 31.50"]);
    }

    #[test]
    fn test_read_available_passes_errors() {
        struct Unplugged;
        impl Read for Unplugged {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::ErrorKind::BrokenPipe.into())
            }
        }

        let err = read_available(&mut Unplugged, &mut LineSplitter::default()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
