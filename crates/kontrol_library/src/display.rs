//! Buffer and wire encoding for the two-row alphanumeric display.
//!
//! The panel is split into 9 blocks of 8 characters (72 columns per row).
//! Above the text sits one 9-segment bar per block, and between characters
//! inside a block sit dot elements (there is none on the gap between two
//! blocks). The device consumes three `0xE0` reports, one per line:
//!
//! | Line | Content |
//! |------|---------|
//! | 0    | bars and dots: per block 9 segment bytes then 7 dot bytes |
//! | 1    | text row 0: per block 8 × 2 glyph bytes |
//! | 2    | text row 1: per block 8 × 2 glyph bytes |
//!
//! Every report is `0xE0`, an 8-byte header `00 00 <line> 00 48 00 01 00`,
//! 144 data bytes and zero padding up to the fixed payload size.
//!
//! The struct keeps one snapshot per line of what was last written; `flush`
//! transmits only lines whose bytes changed, so a redraw of identical
//! content causes no bus traffic and no LED flicker.

use crate::glyphs;
use crate::port::OutputPort;
use hidapi::HidResult;

pub const NUM_ROWS: usize = 2;
pub const NUM_COLUMNS: usize = 72;
pub const BLOCK_SIZE: usize = 8;
pub const NUM_BLOCKS: usize = NUM_COLUMNS / BLOCK_SIZE;
pub const NUM_BARS: usize = 9;
pub const BAR_SEGMENTS: usize = 9;

const REPORT_ID: u8 = 0xe0;
const HEADER_SIZE: usize = 8;
const PAYLOAD_SIZE: usize = 248;
const REPORT_SIZE: usize = 1 + PAYLOAD_SIZE;
const NUM_LINES: usize = 3;
const BLOCK_STRIDE: usize = 16;
const DOTS_PER_BLOCK: usize = BLOCK_SIZE - 1;

// Segment fill codes. A segment fills in quarters; the codes for one and
// two quarters are swapped on the wire, which the hardware expects.
const SEG_OFF: u8 = 0;
const SEG_HALF: u8 = 1;
const SEG_FULL: u8 = 4;
const DASH_CODES: [u8; 4] = [0, 2, 1, 3];
const BORDER_OFFSET: u8 = 68;

// Dot bytes combine both rows' flags for one column.
const DOT_TOP: u8 = 0x01;
const DOT_BOTTOM: u8 = 0x02;

pub struct Display {
    chars: [[char; NUM_COLUMNS]; NUM_ROWS],
    dots: [[bool; NUM_COLUMNS]; NUM_ROWS],
    bars: [[u8; BAR_SEGMENTS]; NUM_BARS],
    last_sent: [Option<[u8; REPORT_SIZE]>; NUM_LINES],
}

impl Display {
    #[allow(clippy::new_without_default, reason = "intentional")]
    pub fn new() -> Self {
        Self {
            chars: [[' '; NUM_COLUMNS]; NUM_ROWS],
            dots: [[false; NUM_COLUMNS]; NUM_ROWS],
            bars: [[0; BAR_SEGMENTS]; NUM_BARS],
            last_sent: [None; NUM_LINES],
        }
    }

    /// Blanks all text, dots and bars. Snapshots are kept, so the next
    /// `flush` transmits the blank lines exactly once.
    pub fn clear(&mut self) {
        self.chars = [[' '; NUM_COLUMNS]; NUM_ROWS];
        self.dots = [[false; NUM_COLUMNS]; NUM_ROWS];
        self.bars = [[0; BAR_SEGMENTS]; NUM_BARS];
    }

    /// Puts one character into a cell. Out-of-range coordinates are
    /// ignored so callers can write variable-length strings unclamped.
    pub fn set_character(&mut self, row: usize, column: usize, ch: char) {
        if row < NUM_ROWS && column < NUM_COLUMNS {
            self.chars[row][column] = ch;
        }
    }

    /// Sets the dot trailing the character at `column`. Same permissive
    /// bounds as [`set_character`](Self::set_character). A dot on the last
    /// column of a block has no display element and stays invisible.
    pub fn set_dot(&mut self, row: usize, column: usize, on: bool) {
        if row < NUM_ROWS && column < NUM_COLUMNS {
            self.dots[row][column] = on;
        }
    }

    /// Writes a whole text row from a string, folding `.` characters into
    /// the dot element of the preceding cell. A dot that would trail the
    /// last character of a block cannot be shown there, so a space is
    /// synthesized before the boundary and the rest of the text shifts
    /// right by one column. Text beyond 72 columns is truncated.
    pub fn set_row_text(&mut self, row: usize, text: &str) {
        if row >= NUM_ROWS {
            return;
        }
        self.chars[row] = [' '; NUM_COLUMNS];
        self.dots[row] = [false; NUM_COLUMNS];

        let mut column = 0;
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            if column >= NUM_COLUMNS {
                break;
            }
            if ch == '.' {
                if column > 0 && (column - 1) % BLOCK_SIZE != BLOCK_SIZE - 1 {
                    self.dots[row][column - 1] = true;
                } else {
                    // No preceding cell to attach to; the dot gets its own
                    // column, rendered as a space with a trailing dot.
                    self.dots[row][column] = true;
                    column += 1;
                }
                continue;
            }
            if column % BLOCK_SIZE == BLOCK_SIZE - 1 && chars.peek() == Some(&'.') {
                // The next character is a dot and this column is the last
                // of its block: push the character into the next block.
                column += 1;
                if column >= NUM_COLUMNS {
                    break;
                }
            }
            self.chars[row][column] = ch;
            column += 1;
        }
    }

    /// Fills one bar from the bottom. `value` is normalized against
    /// `max_value` into 36 quarter-segment steps; full segments get the
    /// full code, the partial segment gets its dash code and, with
    /// `has_border`, every segment byte is offset into the bordered range.
    pub fn set_bar(&mut self, column: usize, has_border: bool, value: u32, max_value: u32) {
        if column >= NUM_BARS || max_value == 0 {
            return;
        }
        let quarters =
            (u64::from(value.min(max_value)) * (BAR_SEGMENTS as u64 * 4) / u64::from(max_value))
                as usize;
        let full = quarters / 4;
        let dash = DASH_CODES[quarters % 4];
        let offset = if has_border { BORDER_OFFSET } else { 0 };
        for (i, segment) in self.bars[column].iter_mut().enumerate() {
            let code = if i < full {
                SEG_FULL
            } else if i == full {
                dash
            } else {
                SEG_OFF
            };
            *segment = code + offset;
        }
    }

    /// Renders a bidirectional indicator centered on `max_value / 2`. The
    /// center segment is always lit; the deviation grows a run of full
    /// segments outward, with one half-lit segment at the far end when the
    /// deviation covers an odd number of half-segment steps.
    pub fn set_pan_bar(&mut self, column: usize, has_border: bool, value: u32, max_value: u32) {
        if column >= NUM_BARS || max_value == 0 {
            return;
        }
        let center = max_value / 2;
        let value = value.min(max_value);
        let steps = (u64::from(value.abs_diff(center)) * 16 / u64::from(max_value))
            .min((BAR_SEGMENTS as u64) - 1) as usize;
        let run = steps / 2;
        let offset = if has_border { BORDER_OFFSET } else { 0 };

        let segments = &mut self.bars[column];
        segments.fill(SEG_OFF + offset);
        let mid = BAR_SEGMENTS / 2;
        segments[mid] = SEG_FULL + offset;
        if value >= center {
            for segment in &mut segments[mid + 1..mid + 1 + run] {
                *segment = SEG_FULL + offset;
            }
            if steps % 2 == 1 {
                segments[mid + 1 + run] = SEG_HALF + offset;
            }
        } else {
            for segment in &mut segments[mid - run..mid] {
                *segment = SEG_FULL + offset;
            }
            if steps % 2 == 1 {
                segments[mid - run - 1] = SEG_HALF + offset;
            }
        }
    }

    /// Builds the complete output report for one device line (0 is the
    /// bar/dot line, 1 and 2 are the text rows).
    pub fn render_line(&self, line: usize) -> [u8; REPORT_SIZE] {
        debug_assert!(line < NUM_LINES);
        let mut report = [0u8; REPORT_SIZE];
        report[0] = REPORT_ID;
        report[1..1 + HEADER_SIZE]
            .copy_from_slice(&[0x00, 0x00, line as u8, 0x00, 0x48, 0x00, 0x01, 0x00]);
        let data = &mut report[1 + HEADER_SIZE..];
        match line {
            0 => self.render_bar_dot_data(data),
            _ => self.render_text_data(line - 1, data),
        }
        report
    }

    fn render_bar_dot_data(&self, data: &mut [u8]) {
        for block in 0..NUM_BLOCKS {
            let base = block * BLOCK_STRIDE;
            data[base..base + BAR_SEGMENTS].copy_from_slice(&self.bars[block]);
            for slot in 0..DOTS_PER_BLOCK {
                let column = block * BLOCK_SIZE + slot;
                let mut code = 0;
                if self.dots[0][column] {
                    code |= DOT_TOP;
                }
                if self.dots[1][column] {
                    code |= DOT_BOTTOM;
                }
                data[base + BAR_SEGMENTS + slot] = code;
            }
        }
    }

    fn render_text_data(&self, row: usize, data: &mut [u8]) {
        for column in 0..NUM_COLUMNS {
            let (lo, hi) = glyphs::encode(self.chars[row][column]);
            let base = (column / BLOCK_SIZE) * BLOCK_STRIDE + (column % BLOCK_SIZE) * 2;
            data[base] = lo;
            data[base + 1] = hi;
        }
    }

    /// Transmits every line whose rendered bytes differ from the last
    /// transmitted state. A line's snapshot is updated only after the
    /// transport accepted it, so a failed write is retried next time.
    pub fn flush(&mut self, port: &impl OutputPort) -> HidResult<()> {
        for line in 0..NUM_LINES {
            let report = self.render_line(line);
            if self.last_sent[line].as_ref() == Some(&report) {
                continue;
            }
            port.send_report(&report)?;
            self.last_sent[line] = Some(report);
        }
        Ok(())
    }
}
