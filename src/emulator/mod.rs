//! Terminal emulator: feeds raw PTY bytes through a `vte::Parser` and keeps
//! a `Screen` (grid, cursor, scroll region, alternate buffer, scrollback) up
//! to date.
//!
//! Grounded in the teacher's `wasm::parser::{AnsiParser, AnsiPerformer}`,
//! generalized per `SPEC_FULL.md` section 4.2: scroll regions (DECSTBM),
//! the alternate screen buffer (`?1049h`/`l`), application keypad mode,
//! pending-wrap semantics, bounded scrollback, and a renderer health bit
//! that flips to unhealthy instead of panicking on malformed input.

mod cell;
mod screen;

pub use cell::{Cell, CellAttrs, Color};
pub use screen::{Modes, Rendered};

use screen::Screen;
use vte::{Params, Parser, Perform};

/// Wraps a `vte::Parser` plus the `Screen` it renders into. Not `Send` by
/// itself in the vte sense, but `Emulator` as a whole is — it owns both the
/// parser and the performer, so callers just call `feed`.
pub struct Emulator {
    parser: Parser,
    performer: Performer,
}

impl Emulator {
    pub fn new(cols: u16, rows: u16, scrollback_cap: usize) -> Self {
        Emulator {
            parser: Parser::new(),
            performer: Performer {
                screen: Screen::new(cols, rows, scrollback_cap),
            },
        }
    }

    /// Feed a chunk of raw PTY output through the parser. Malformed
    /// sequences never abort the feed: a panic while applying one is caught
    /// via `catch_unwind` and flips the screen's health bit instead of
    /// taking the session thread down, and sequences `vte` itself flags as
    /// malformed (too many params or intermediates) flip it the same way
    /// through the performer's `ignore` bit.
    pub fn feed(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let panicked = {
                let parser = &mut self.parser;
                let performer = &mut self.performer;
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    parser.advance(performer, byte);
                }))
                .is_err()
            };
            if panicked {
                self.performer.screen.mark_unhealthy();
            }
        }
    }

    pub fn render(&mut self) -> Rendered {
        self.performer.screen.render()
    }

    pub fn scrollback(&self, n: usize) -> Vec<String> {
        self.performer.screen.scrollback(n)
    }

    pub fn clear_scrollback(&mut self) {
        self.performer.screen.clear_scrollback();
    }

    pub fn modes(&self) -> Modes {
        self.performer.screen.modes()
    }

    pub fn is_healthy(&self) -> bool {
        self.performer.screen.is_healthy()
    }

    pub fn cols(&self) -> usize {
        self.performer.screen.cols()
    }

    pub fn rows(&self) -> usize {
        self.performer.screen.rows()
    }
}

struct Performer {
    screen: Screen,
}

fn params_to_vec(params: &Params) -> Vec<i64> {
    params
        .iter()
        .map(|p| p.first().copied().unwrap_or(0) as i64)
        .collect()
}

impl Perform for Performer {
    fn print(&mut self, c: char) {
        self.screen.print(c);
    }

    fn execute(&mut self, byte: u8) {
        self.screen.execute(byte);
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {
        // DCS sequences (e.g. Sixel, DECRQSS) aren't rendered; ignored.
    }

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {
        // OSC (window title, hyperlinks) doesn't affect the rendered grid
        // the classifier reasons over; intentionally dropped.
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore {
            // vte set this when the sequence overflowed its param/intermediate
            // limits — the escape stream is corrupt, not just unsupported.
            self.screen.mark_unhealthy();
            return;
        }
        let p = params_to_vec(params);
        let n = |i: usize, default: i64| -> usize {
            let v = p.get(i).copied().unwrap_or(0);
            if v == 0 { default as usize } else { v as usize }
        };

        match action {
            'A' => self.screen.cursor_up(n(0, 1)),
            'B' => self.screen.cursor_down(n(0, 1)),
            'C' => self.screen.cursor_forward(n(0, 1)),
            'D' => self.screen.cursor_back(n(0, 1)),
            'H' | 'f' => {
                let row = p.first().copied().unwrap_or(1).max(1) as usize - 1;
                let col = p.get(1).copied().unwrap_or(1).max(1) as usize - 1;
                self.screen.cursor_position(row, col);
            }
            'J' => self.screen.erase_display(p.first().copied().unwrap_or(0)),
            'K' => self.screen.erase_line(p.first().copied().unwrap_or(0)),
            'r' => {
                let top = p.first().copied().map(|v| (v - 1).max(0) as usize);
                let bottom = p.get(1).copied().map(|v| (v - 1).max(0) as usize);
                self.screen.set_scroll_region(top, bottom);
            }
            'm' => {
                let mut idx = 0;
                if p.is_empty() {
                    self.screen.pen_mut().apply_sgr(&[0], 0);
                } else {
                    while idx < p.len() {
                        let extra = self.screen.pen_mut().apply_sgr(&p, idx);
                        idx += 1 + extra;
                    }
                }
            }
            's' => self.screen.save_cursor(),
            'u' => self.screen.restore_cursor(),
            'h' | 'l' => {
                let set = action == 'h';
                let private = intermediates.first() == Some(&b'?');
                if private {
                    for code in &p {
                        match code {
                            1049 | 47 | 1047 => {
                                if set {
                                    self.screen.enter_alternate_screen();
                                } else {
                                    self.screen.exit_alternate_screen();
                                }
                            }
                            6 => self.screen.set_origin_mode(set),
                            7 => self.screen.set_auto_wrap(set),
                            25 => self.screen.set_cursor_visible(set),
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], ignore: bool, byte: u8) {
        if ignore {
            self.screen.mark_unhealthy();
            return;
        }
        match (intermediates.first(), byte) {
            (None, b'D') => self.screen.index(),
            (None, b'E') => self.screen.next_line(),
            (None, b'M') => self.screen.reverse_index(),
            (None, b'c') => self.screen.reset(),
            (Some(b'='), _) => self.screen.set_application_keypad(true),
            (Some(b'>'), _) => self.screen.set_application_keypad(false),
            _ => {}
        }
    }
}
