//! Newline index with O(1) line/byte mapping.
//!
//! Goals
//! - Single pass over bytes to record '\n' positions.
//! - 1-based external line numbers, matching editor coordinates.
//! - O(1) line→byte start/end via the index.
//!
//! Notes
//! - Only '\n' separates lines; a '\r' stays part of the line text.
//! - An empty buffer has 1 (empty) line, the same as `"".split('\n')`.
//! - For ranges, end is exclusive (Rust slicing convention).

#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte positions of every '\n' in the buffer.
    nl_positions: Vec<usize>,
    /// Total byte length of the buffer.
    len: usize,
}

impl LineIndex {
    /// Build an index recording positions of '\n'.
    pub fn build(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut nl_positions = Vec::with_capacity(bytes.len() / 48);
        let mut i = 0usize;

        while let Some(pos) = memchr::memchr(b'\n', &bytes[i..]) {
            let abs = i + pos;
            nl_positions.push(abs);
            i = abs + 1;
        }

        Self {
            nl_positions,
            len: bytes.len(),
        }
    }

    /// Total number of logical lines (#'\n' + 1).
    pub fn line_count(&self) -> usize {
        self.nl_positions.len() + 1
    }

    /// Start byte (inclusive) of a 1-based line.
    /// Returns None if line is out of range.
    pub fn start_byte_of_line(&self, line1: usize) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count() {
            return None;
        }
        if line1 == 1 {
            return Some(0);
        }
        // For line L>1, start is one past the previous '\n'.
        self.nl_positions
            .get(line1 - 2)
            .map(|&prev_nl| prev_nl + 1)
    }

    /// End byte (exclusive, before the '\n') of a 1-based line.
    /// Returns None if line is out of range.
    pub fn end_byte_of_line(&self, line1: usize) -> Option<usize> {
        if line1 == 0 || line1 > self.line_count() {
            return None;
        }
        match self.nl_positions.get(line1 - 1) {
            Some(&nl) => Some(nl),
            // Last line ends at EOF.
            None => Some(self.len),
        }
    }

    /// Byte offset of a 0-based character column on a 1-based line.
    ///
    /// Columns past the end of the line clamp to the line end, so a column of
    /// `u32::MAX` means "end of line".
    pub fn byte_of_position(&self, text: &str, line1: usize, character: usize) -> Option<usize> {
        let start = self.start_byte_of_line(line1)?;
        let end = self.end_byte_of_line(line1)?;
        let line = text.get(start..end)?;
        let within = line
            .char_indices()
            .nth(character)
            .map(|(byte, _)| byte)
            .unwrap_or(line.len());
        Some(start + within)
    }
}
