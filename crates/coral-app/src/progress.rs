//! Single-line progress display redrawn in place.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use coral_core::RoundReport;
use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// Redraws `run N | iteration I | active A` on the current terminal line.
pub struct ProgressLine<W: Write> {
    out: W,
    enabled: bool,
    last_draw: Option<Instant>,
    dirty: bool,
}

impl ProgressLine<io::Stderr> {
    /// Progress on stderr, leaving stdout for tracing output.
    #[must_use]
    pub fn stderr(enabled: bool) -> Self {
        Self::new(io::stderr(), enabled)
    }
}

impl<W: Write> ProgressLine<W> {
    pub fn new(out: W, enabled: bool) -> Self {
        Self {
            out,
            enabled,
            last_draw: None,
            dirty: false,
        }
    }

    /// Record a finished round; redraws at most every 100 ms.
    pub fn update(&mut self, run: u64, report: &RoundReport) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let due = self
            .last_draw
            .is_none_or(|at| at.elapsed() >= REDRAW_INTERVAL);
        if due || !report.mutated {
            self.draw(run, report.iteration, report.active_cells)?;
        }
        Ok(())
    }

    fn draw(&mut self, run: u64, iteration: u32, active: usize) -> io::Result<()> {
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!(
                "run {run} | iteration {iteration} | active {active}"
            ))
        )?;
        self.out.flush()?;
        self.last_draw = Some(Instant::now());
        self.dirty = true;
        Ok(())
    }

    /// Move past the progress line so later output starts on a fresh one.
    pub fn finish(&mut self) -> io::Result<()> {
        if self.enabled && self.dirty {
            queue!(self.out, Print("\n"))?;
            self.out.flush()?;
            self.dirty = false;
        }
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(iteration: u32, mutated: bool) -> RoundReport {
        RoundReport {
            iteration,
            mutated,
            evaluated: 9,
            active_cells: 4,
        }
    }

    #[test]
    fn disabled_line_writes_nothing() {
        let mut line = ProgressLine::new(Vec::new(), false);
        line.update(0, &report(1, true)).expect("update");
        line.finish().expect("finish");
        assert!(line.into_inner().is_empty());
    }

    #[test]
    fn first_and_final_rounds_are_drawn() {
        let mut line = ProgressLine::new(Vec::new(), true);
        line.update(2, &report(1, true)).expect("update");
        line.update(2, &report(2, true)).expect("update");
        line.update(2, &report(3, false)).expect("update");
        line.finish().expect("finish");
        let text = String::from_utf8(line.into_inner()).expect("utf8");
        assert!(text.contains("run 2 | iteration 1 | active 4"));
        assert!(text.contains("run 2 | iteration 3 | active 4"));
        assert!(text.ends_with('\n'));
    }
}
