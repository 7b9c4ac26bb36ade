//! Console display sink
//!
//! The physical box renders fullscreen; window management is not the
//! daemon's concern. This sink makes the controlling terminal behave like
//! the box surface: each `present` replaces the whole screen.

use std::io::Write;

use super::DisplaySink;

#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl DisplaySink for ConsoleDisplay {
    fn present(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        // ANSI clear + cursor home; the contract is replace, not append
        let _ = write!(out, "\x1b[2J\x1b[H");
        if !text.is_empty() {
            let _ = writeln!(out, "{text}");
        }
        let _ = out.flush();
    }
}
