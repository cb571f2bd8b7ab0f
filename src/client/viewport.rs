/// Scroll state of one surface. The offset always stays within
/// `[0, total_lines - height]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub offset: usize,
    pub width: u16,
    pub height: u16,
    pub total_lines: usize,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Viewport { offset: 0, width, height, total_lines: 0 }
    }

    pub fn max_offset(&self) -> usize {
        self.total_lines.saturating_sub(self.height as usize)
    }

    /// Pull the offset back into range. Returns true if it moved.
    pub fn clamp(&mut self) -> bool {
        let max = self.max_offset();
        if self.offset > max {
            self.offset = max;
            return true;
        }
        false
    }

    pub fn scroll_by(&mut self, delta: isize) -> bool {
        let before = self.offset;
        self.offset = if delta < 0 {
            self.offset.saturating_sub(delta.unsigned_abs())
        } else {
            self.offset.saturating_add(delta as usize)
        };
        self.clamp();
        self.offset != before
    }

    pub fn set_size(&mut self, width: u16, height: u16) -> bool {
        self.width = width;
        self.height = height;
        self.clamp()
    }

    pub fn set_total(&mut self, total: usize) -> bool {
        self.total_lines = total;
        self.clamp()
    }
}
