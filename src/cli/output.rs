//! Colored terminal output for workspace operations

use std::io::Write;
use termcolor::{Buffer, BufferWriter, Color, ColorChoice, ColorSpec, WriteColor};

/// Output manager for consistent colored terminal output
#[derive(Debug)]
pub struct OutputManager {
    bufwtr: BufferWriter,
    verbose: bool,
    quiet: bool,
}

impl Clone for OutputManager {
    fn clone(&self) -> Self {
        Self::new(self.verbose, self.quiet)
    }
}

fn spec(color: Color, bold: bool) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color)).set_bold(bold);
    spec
}

/// Write `symbol message` with the symbol (and optionally the message) colored
fn marked_line(
    buffer: &mut Buffer,
    symbol: &str,
    symbol_spec: &ColorSpec,
    message: &str,
    message_spec: Option<&ColorSpec>,
) -> std::io::Result<()> {
    buffer.set_color(symbol_spec)?;
    write!(buffer, "{}", symbol)?;
    buffer.reset()?;
    if let Some(message_spec) = message_spec {
        buffer.set_color(message_spec)?;
    }
    writeln!(buffer, " {}", message)?;
    buffer.reset()
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bufwtr: BufferWriter::stdout(ColorChoice::Auto),
            verbose,
            quiet,
        }
    }

    fn emit<F>(&self, fill: F) -> std::io::Result<()>
    where
        F: FnOnce(&mut Buffer) -> std::io::Result<()>,
    {
        if self.quiet {
            return Ok(());
        }
        let mut buffer = self.bufwtr.buffer();
        fill(&mut buffer)?;
        self.bufwtr.print(&buffer)
    }

    /// Print an info message
    pub fn info(&self, message: &str) -> std::io::Result<()> {
        self.emit(|b| marked_line(b, "ℹ", &spec(Color::Cyan, false), message, None))
    }

    /// Print a success message
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.emit(|b| marked_line(b, "✓", &spec(Color::Green, true), message, None))
    }

    /// Print a warning message
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.emit(|b| {
            marked_line(
                b,
                "⚠",
                &spec(Color::Yellow, true),
                message,
                Some(&spec(Color::Yellow, false)),
            )
        })
    }

    /// Print an error message to stderr (always shown)
    pub fn error(&self, message: &str) {
        let bufwtr = BufferWriter::stderr(ColorChoice::Auto);
        let mut buffer = bufwtr.buffer();
        let printed = marked_line(
            &mut buffer,
            "✗",
            &spec(Color::Red, true),
            message,
            Some(&spec(Color::Red, false)),
        )
        .and_then(|()| bufwtr.print(&buffer));
        if printed.is_err() {
            eprintln!("✗ {}", message);
        }
    }

    /// Print a debug message (only in verbose mode)
    pub fn verbose(&self, message: &str) -> std::io::Result<()> {
        if !self.verbose {
            return Ok(());
        }
        self.emit(|b| marked_line(b, "→", &spec(Color::Blue, false), message, None))
    }

    /// Print a section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.emit(|b| {
            writeln!(b)?;
            b.set_color(&spec(Color::Cyan, true))?;
            writeln!(b, "═══ {} ═══", title)?;
            b.reset()
        })
    }

    /// Print indented text (for sub-items)
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.emit(|b| writeln!(b, "    {}", message))
    }

    /// Print a plain message
    pub fn println(&self, message: &str) -> std::io::Result<()> {
        self.emit(|b| writeln!(b, "{}", message))
    }

    /// Print aligned columns, the first row as a bold header
    pub fn table(&self, rows: &[Vec<String>]) -> std::io::Result<()> {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..columns)
            .map(|c| {
                rows.iter()
                    .filter_map(|r| r.get(c))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        self.emit(|b| {
            for (i, row) in rows.iter().enumerate() {
                if i == 0 {
                    b.set_color(ColorSpec::new().set_bold(true))?;
                }
                let line = row
                    .iter()
                    .zip(&widths)
                    .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                    .collect::<Vec<_>>()
                    .join("  ");
                writeln!(b, "  {}", line.trim_end())?;
                if i == 0 {
                    b.reset()?;
                }
            }
            Ok(())
        })
    }

    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}
