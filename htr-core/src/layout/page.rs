use serde::{Deserialize, Serialize};

use crate::layout::element::{ReadLine, page_text};

/// Recognition result of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Page number, starting at 1.
    pub page_number: usize,
    pub text: String,
    pub lines: Vec<ReadLine>,
    pub line_count: usize,
    pub word_count: usize,
    /// `(width, height)` of the page image in pixels.
    pub image_size: (u32, u32),
}

impl PageResult {
    /// Words are counted in the page text, so detections read as empty
    /// strings do not count.
    pub fn new(page_number: usize, lines: Vec<ReadLine>, image_size: (u32, u32)) -> Self {
        let text = page_text(&lines).trim().to_string();
        Self {
            page_number,
            word_count: text.split_whitespace().count(),
            text,
            line_count: lines.len(),
            lines,
            image_size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{analysis::bbox::Bbox, layout::element::ReadWord};

    #[test]
    fn test_page_result_counts() {
        let word = |text: &str| ReadWord {
            text: text.to_string(),
            bbox: Bbox::from_xyxy(0.0, 0.0, 1.0, 1.0),
        };
        let lines = vec![
            ReadLine {
                words: vec![word("a"), word("b")],
            },
            ReadLine {
                // nothing legible in the last box
                words: vec![word("c"), word("")],
            },
        ];

        let page = PageResult::new(3, lines, (100, 50));
        assert_eq!(page.page_number, 3);
        assert_eq!(page.text, "a b\nc");
        assert_eq!(page.line_count, 2);
        assert_eq!(page.word_count, 3);
        assert!(!page.is_empty());

        let empty = PageResult::new(1, Vec::new(), (1, 1));
        assert_eq!(empty.text, "");
        assert!(empty.is_empty());
    }
}
