//! Serial console for the shader controller
//!
//! Commands typed at the `>>` prompt are sent to the board one line each, and
//! whatever it prints (`C:` and `R:` lines) is shown after every command.
//! Typing `run` stops prompting and keeps printing board output until the
//! process is interrupted.

mod console;

use std::{
    io::{self, BufRead, Write},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;

use crate::console::{frame, read_available, Input, LineSplitter};

/// Quiet time that ends one read of board output
const READ_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial device of the board
    #[arg(short, long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Must match the firmware
    #[arg(short, long, default_value_t = 9600)]
    baud: u32,

    /// Start in monitor mode, without a prompt
    #[arg(long)]
    run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut port = serialport::new(&args.port, args.baud)
        .timeout(READ_TIMEOUT)
        .open()
        .with_context(|| format!("failed to open {}", args.port))?;

    let mut input = io::stdin().lock().lines();
    let mut stdout = io::stdout();
    let mut splitter = LineSplitter::default();
    let mut prompting = !args.run;

    loop {
        if prompting {
            write!(stdout, ">> ")?;
            stdout.flush()?;

            // End of input closes the console
            let Some(line) = input.next().transpose()? else {
                return Ok(());
            };
            match Input::parse(&line) {
                Input::Run => prompting = false,
                Input::Empty => {}
                Input::Command(command) => port
                    .write_all(&frame(command))
                    .with_context(|| format!("failed to send {command:?}"))?,
            }
        }

        let lines =
            read_available(&mut port, &mut splitter).context("failed to read from board")?;
        for line in lines {
            writeln!(stdout, "{line}")?;
        }
    }
}
