//! Cell-level model for the terminal grid.
//!
//! Generalizes the teacher's `wasm::terminal::{Color, CellAttrs, Cell}`
//! (16-color, bool-flag cells) to the 256-color and truecolor SGR space a
//! real shell prompt can emit.

/// A terminal color: the default (unset) color, one of the 256 indexed
/// palette colors, or a 24-bit RGB truecolor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

/// Text attributes carried by a cell, independent of color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellAttrs {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub blink: bool,
    pub reverse: bool,
    pub hidden: bool,
}

/// A single cell in the terminal grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        self.ch == ' ' && self.attrs == CellAttrs::default()
    }
}

/// The SGR pen: the color/attribute state applied to subsequently printed
/// characters, until the next SGR sequence changes it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pen {
    pub fg: Color,
    pub bg: Color,
    pub attrs: CellAttrs,
}

impl Pen {
    pub fn cell_for(&self, ch: char) -> Cell {
        Cell {
            ch,
            fg: self.fg,
            bg: self.bg,
            attrs: self.attrs,
        }
    }

    /// Apply one SGR parameter. `params` is the full parameter list and
    /// `idx` the parameter currently being consumed (38/48 consume the
    /// following 2-4 params for indexed/truecolor selectors).
    ///
    /// Returns the number of extra parameters consumed beyond `idx` itself.
    pub fn apply_sgr(&mut self, params: &[i64], idx: usize) -> usize {
        let p = params.get(idx).copied().unwrap_or(0);
        match p {
            0 => {
                *self = Pen::default();
                0
            }
            1 => {
                self.attrs.bold = true;
                0
            }
            3 => {
                self.attrs.italic = true;
                0
            }
            4 => {
                self.attrs.underline = true;
                0
            }
            5 | 6 => {
                self.attrs.blink = true;
                0
            }
            7 => {
                self.attrs.reverse = true;
                0
            }
            8 => {
                self.attrs.hidden = true;
                0
            }
            9 => {
                self.attrs.strikethrough = true;
                0
            }
            22 => {
                self.attrs.bold = false;
                0
            }
            23 => {
                self.attrs.italic = false;
                0
            }
            24 => {
                self.attrs.underline = false;
                0
            }
            25 => {
                self.attrs.blink = false;
                0
            }
            27 => {
                self.attrs.reverse = false;
                0
            }
            28 => {
                self.attrs.hidden = false;
                0
            }
            29 => {
                self.attrs.strikethrough = false;
                0
            }
            30..=37 => {
                self.fg = Color::Indexed((p - 30) as u8);
                0
            }
            38 => self.apply_extended_color(params, idx, true),
            39 => {
                self.fg = Color::Default;
                0
            }
            40..=47 => {
                self.bg = Color::Indexed((p - 40) as u8);
                0
            }
            48 => self.apply_extended_color(params, idx, false),
            49 => {
                self.bg = Color::Default;
                0
            }
            90..=97 => {
                self.fg = Color::Indexed((p - 90 + 8) as u8);
                0
            }
            100..=107 => {
                self.bg = Color::Indexed((p - 100 + 8) as u8);
                0
            }
            _ => 0,
        }
    }

    /// Handle `38;5;n` (indexed) and `38;2;r;g;b` (truecolor) selectors, or
    /// their `48;...` background equivalents. Returns the number of extra
    /// parameters consumed.
    fn apply_extended_color(&mut self, params: &[i64], idx: usize, foreground: bool) -> usize {
        match params.get(idx + 1).copied() {
            Some(5) => {
                let color = Color::Indexed(params.get(idx + 2).copied().unwrap_or(0) as u8);
                if foreground {
                    self.fg = color;
                } else {
                    self.bg = color;
                }
                2
            }
            Some(2) => {
                let r = params.get(idx + 2).copied().unwrap_or(0) as u8;
                let g = params.get(idx + 3).copied().unwrap_or(0) as u8;
                let b = params.get(idx + 4).copied().unwrap_or(0) as u8;
                let color = Color::Rgb(r, g, b);
                if foreground {
                    self.fg = color;
                } else {
                    self.bg = color;
                }
                4
            }
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_sgr_colors() {
        let mut pen = Pen::default();
        pen.apply_sgr(&[31], 0);
        assert_eq!(pen.fg, Color::Indexed(1));
        pen.apply_sgr(&[0], 0);
        assert_eq!(pen.fg, Color::Default);
    }

    #[test]
    fn truecolor_sgr() {
        let mut pen = Pen::default();
        let params = [38, 2, 10, 20, 30];
        let consumed = pen.apply_sgr(&params, 0);
        assert_eq!(consumed, 4);
        assert_eq!(pen.fg, Color::Rgb(10, 20, 30));
    }

    #[test]
    fn indexed_256_sgr() {
        let mut pen = Pen::default();
        let params = [48, 5, 200];
        let consumed = pen.apply_sgr(&params, 0);
        assert_eq!(consumed, 2);
        assert_eq!(pen.bg, Color::Indexed(200));
    }
}
