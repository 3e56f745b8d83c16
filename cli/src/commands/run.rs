use std::io::{self, IsTerminal, Read};

use anyhow::{bail, Context};
use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use lc3_emulator::{BufferedConsole, Computer, Image, ProcessorError};
use thiserror::Error;
use tracing::{debug, info};

use crate::terminal::{Interruptible, TerminalConsole};

/// How often a running program checks for Ctrl-C, in instructions
const POLL_INTERVAL: u64 = 4096;

/// The user pressed Ctrl-C
#[derive(Error, Debug)]
#[error("interrupted")]
pub struct Interrupted;

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Image files, loaded in order. Later images overwrite earlier ones
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    images: Vec<Utf8PathBuf>,

    /// Stop with an error after this many instructions
    #[arg(long)]
    max_cycles: Option<u64>,
}

fn is_interrupt(error: &ProcessorError) -> bool {
    matches!(error, ProcessorError::Io(e) if e.kind() == io::ErrorKind::Interrupted)
}

impl RunOpt {
    pub fn exec(&self) -> anyhow::Result<()> {
        let images = self
            .images
            .iter()
            .map(|path| {
                info!(%path, "Reading image");
                Image::load(path).with_context(|| format!("failed to load image {path}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        if io::stdin().is_terminal() {
            debug!("Standard input is a terminal, switching to raw mode");
            let console = TerminalConsole::new().context("could not set up the terminal")?;
            self.execute(Computer::new(console), &images)
        } else {
            debug!("Reading the whole standard input");
            let mut input = Vec::new();
            io::stdin()
                .read_to_end(&mut input)
                .context("could not read standard input")?;
            let console = BufferedConsole::new(input, io::stdout());
            self.execute(Computer::new(console), &images)
        }
    }

    fn execute<T: Interruptible>(
        &self,
        mut computer: Computer<T>,
        images: &[Image],
    ) -> anyhow::Result<()> {
        for image in images {
            computer.load(image);
        }

        info!("Running program");
        let res = self.drive(&mut computer);
        let cycles = computer.cycles();
        let registers = computer.registers.to_string();
        // Gives the terminal back before anything gets reported
        drop(computer);

        match res {
            Err(Some(e)) if is_interrupt(&e) => {
                println!();
                Err(Interrupted.into())
            }
            Err(Some(e)) => Err(e).context(format!("program crashed after {cycles} cycles")),
            Err(None) => bail!(
                "program did not halt within {} cycles",
                self.max_cycles.unwrap_or_default()
            ),
            Ok(()) => {
                info!(cycles, %registers, "End of program");
                Ok(())
            }
        }
    }

    /// Run until the program halts. `Err(None)` means the cycle budget ran out
    fn drive<T: Interruptible>(
        &self,
        computer: &mut Computer<T>,
    ) -> Result<(), Option<ProcessorError>> {
        loop {
            let budget = match self.max_cycles {
                Some(max) => match max.saturating_sub(computer.cycles()) {
                    0 => return Err(None),
                    left => left.min(POLL_INTERVAL),
                },
                None => POLL_INTERVAL,
            };

            if computer.run_for(budget)? {
                return Ok(());
            }

            computer
                .console_mut()
                .poll_interrupt()
                .map_err(|e| Some(e.into()))?;
        }
    }
}
