use std::fmt;
use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::util::BusyResult;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verbosity {
    Verbose,
    Normal,
    Quiet,
}

/// Console output for status lines, warnings and errors, writing to
/// stderr with a right-justified colored status column.
pub struct Shell {
    err: StandardStream,
    verbosity: Verbosity,
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shell")
            .field("verbosity", &self.verbosity)
            .finish()
    }
}

impl Shell {
    pub fn new() -> Shell {
        Shell {
            err: StandardStream::stderr(ColorChoice::Auto),
            verbosity: Verbosity::Normal,
        }
    }

    pub fn with_color(choice: ColorChoice) -> Shell {
        Shell {
            err: StandardStream::stderr(choice),
            verbosity: Verbosity::Normal,
        }
    }

    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = verbosity;
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// `    Status message` with a green justified status.
    pub fn status<T, U>(&mut self, status: T, message: U) -> BusyResult<()>
    where
        T: fmt::Display,
        U: fmt::Display,
    {
        if self.verbosity == Verbosity::Quiet {
            return Ok(());
        }
        self.print(&status, &message, Color::Green, true)
    }

    pub fn warn<T: fmt::Display>(&mut self, message: T) -> BusyResult<()> {
        if self.verbosity == Verbosity::Quiet {
            return Ok(());
        }
        self.print(&"warning:", &message, Color::Yellow, false)
    }

    pub fn error<T: fmt::Display>(&mut self, message: T) -> BusyResult<()> {
        self.print(&"error:", &message, Color::Red, false)
    }

    pub fn note<T: fmt::Display>(&mut self, message: T) -> BusyResult<()> {
        if self.verbosity == Verbosity::Quiet {
            return Ok(());
        }
        writeln!(self.err, "{}", message)?;
        Ok(())
    }

    pub fn verbose<T: fmt::Display>(&mut self, message: T) -> BusyResult<()> {
        if self.verbosity != Verbosity::Verbose {
            return Ok(());
        }
        writeln!(self.err, "{}", message)?;
        Ok(())
    }

    fn print(
        &mut self,
        status: &dyn fmt::Display,
        message: &dyn fmt::Display,
        color: Color,
        justified: bool,
    ) -> BusyResult<()> {
        self.err.reset()?;
        self.err
            .set_color(ColorSpec::new().set_bold(true).set_fg(Some(color)))?;
        if justified {
            write!(self.err, "{:>12}", status)?;
        } else {
            write!(self.err, "{}", status)?;
        }
        self.err.reset()?;
        writeln!(self.err, " {}", message)?;
        self.err.flush()?;
        Ok(())
    }
}

impl Default for Shell {
    fn default() -> Shell {
        Shell::new()
    }
}
