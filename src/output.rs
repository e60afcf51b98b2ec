//! Transcript rendering.
//!
//! Transcript lines are the only thing this program ever writes to stdout;
//! all diagnostics go to stderr. That keeps `streamscribe URL > transcript.txt`
//! clean.

use crate::segment::types::TranscriptLine;
use std::io::{self, Write};
use tokio::sync::mpsc;
use tracing::debug;

/// Write one transcript line and flush, so lines appear as the stream plays
/// rather than when the pipe buffer fills.
pub fn write_line<W: Write>(out: &mut W, line: &TranscriptLine) -> io::Result<()> {
    writeln!(out, "{}", line)?;
    out.flush()
}

/// Print transcript lines to stdout as they arrive.
///
/// Exits when the channel closes or stdout goes away (downstream pipe closed).
pub async fn run_printer(mut lines: mpsc::Receiver<TranscriptLine>) {
    let mut stdout = io::stdout();
    while let Some(line) = lines.recv().await {
        if let Err(e) = write_line(&mut stdout, &line) {
            debug!(error = %e, "stdout closed, stopping transcript output");
            return;
        }
    }
}
