use serde::{Deserialize, Serialize};

/// How a flat buffer is packed into a 2D texture for upload.
///
/// Rows are filled left to right; the last `padding` texels of the final
/// row carry no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureLayout {
    pub width: usize,
    pub height: usize,
    pub padding: usize,
}

impl TextureLayout {
    /// Near-square layout for `len` elements, never wider than `max_width`
    pub fn for_len(len: usize, max_width: usize) -> Self {
        let max_width = max_width.max(1);
        let side = (len as f64).sqrt().ceil() as usize;
        let width = side.clamp(1, max_width);
        let height = len.div_ceil(width).max(1);

        Self {
            width,
            height,
            padding: width * height - len,
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width * self.height
    }
}
