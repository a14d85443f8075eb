use regex::Regex;
use std::io::{self, Write};

use crate::control::GpuState;

/// Lines taken by one status block
const BLOCK_HEIGHT: usize = 7;

/// Erase the current line and return the cursor to column 0
const CLEAR_LINE: &str = "\x1b[2K\r";
const CURSOR_UP: &str = "\x1b[A";

/// Shows the latest `GpuState` snapshot to the user.
pub trait StatusRenderer {
    fn render(&mut self, state: &GpuState) -> io::Result<()>;

    /// Leaves the output in a sane state once the loop is done
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Redraws a fixed-height block in place using ANSI escapes.
pub struct TerminalRenderer<W: Write> {
    out: W,
    utilization: Regex,
    drawn: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            // graphics=12, memory=4, video=0, PCIe=0
            utilization: Regex::new(r"(?<key>[A-Za-z]+)=(?<pct>\d+)").unwrap(),
            drawn: false,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    /// `graphics=12, memory=4` becomes `graphics 12%, memory 4%`; anything else is shown as is
    fn format_utilization(&self, text: &str) -> String {
        let fields: Vec<String> = self
            .utilization
            .captures_iter(text)
            .map(|c| format!("{} {}%", &c["key"], &c["pct"]))
            .collect();

        if fields.is_empty() {
            text.to_string()
        } else {
            fields.join(", ")
        }
    }
}

impl<W: Write> StatusRenderer for TerminalRenderer<W> {
    fn render(&mut self, state: &GpuState) -> io::Result<()> {
        if !self.drawn {
            writeln!(self.out, "{}{}", CURSOR_UP, CLEAR_LINE)?;
            self.drawn = true;
        }

        let utilization = self.format_utilization(&state.utilization_text);
        write!(self.out, "{}Temperature: {} \n\n", CLEAR_LINE, show_temp(state.current_temp))?;
        write!(self.out, "{}Duty: {}% \n\n", CLEAR_LINE, state.current_duty)?;
        write!(self.out, "{}Utilization: {} \n\n", CLEAR_LINE, utilization)?;
        write!(
            self.out,
            "{}Min Temperature: {}       Max Temperature: {} \n",
            CLEAR_LINE,
            show_temp(state.min_seen_temp),
            show_temp(state.max_seen_temp)
        )?;
        write!(self.out, "{}", CURSOR_UP.repeat(BLOCK_HEIGHT))?;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.drawn {
            write!(self.out, "{}", "\n".repeat(BLOCK_HEIGHT))?;
        }
        self.out.flush()
    }
}

fn show_temp(temp: Option<i32>) -> String {
    temp.map_or_else(|| "-".to_string(), |t| format!("{}C", t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> GpuState {
        let mut state = GpuState::new(2);
        state.record_temp(55);
        state.record_temp(48);
        state.current_duty = 42;
        state.utilization_text = "graphics=12, memory=4, video=0, PCIe=0".into();
        state
    }

    #[test]
    fn renders_status_block() {
        let mut r = TerminalRenderer::new(Vec::new());
        r.render(&state()).unwrap();
        let out = String::from_utf8(r.into_inner()).unwrap();

        assert!(out.contains("Temperature: 48C"));
        assert!(out.contains("Duty: 42%"));
        assert!(out.contains("Utilization: graphics 12%, memory 4%, video 0%, PCIe 0%"));
        assert!(out.contains("Min Temperature: 48C       Max Temperature: 55C"));
        assert!(out.ends_with(&CURSOR_UP.repeat(BLOCK_HEIGHT)));
    }

    #[test]
    fn redraws_in_place() {
        let mut r = TerminalRenderer::new(Vec::new());
        r.render(&state()).unwrap();
        r.render(&state()).unwrap();
        let out = String::from_utf8(r.into_inner()).unwrap();

        // newlines written must be undone by cursor-ups, except the one-off prelude
        assert_eq!(out.matches('\n').count(), 1 + 2 * BLOCK_HEIGHT);
        assert_eq!(out.matches(CURSOR_UP).count(), 1 + 2 * BLOCK_HEIGHT);
    }

    #[test]
    fn unparsable_utilization_is_shown_verbatim() {
        let r = TerminalRenderer::new(Vec::new());
        assert_eq!(r.format_utilization("unknown"), "unknown");
        assert_eq!(r.format_utilization("graphics=7"), "graphics 7%");
    }

    #[test]
    fn unset_extrema_show_placeholder() {
        let mut r = TerminalRenderer::new(Vec::new());
        r.render(&GpuState::new(1)).unwrap();
        let out = String::from_utf8(r.into_inner()).unwrap();
        assert!(out.contains("Min Temperature: -       Max Temperature: -"));
    }

    #[test]
    fn finish_moves_below_block() {
        let mut r = TerminalRenderer::new(Vec::new());
        r.finish().unwrap();
        assert!(r.into_inner().is_empty());

        let mut r = TerminalRenderer::new(Vec::new());
        r.render(&state()).unwrap();
        r.finish().unwrap();
        let out = String::from_utf8(r.into_inner()).unwrap();
        assert!(out.ends_with(&"\n".repeat(BLOCK_HEIGHT)));
    }
}
