use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::analysis::bbox::Bbox;

/// A word region found by the detector, with its pixels cut from the page.
#[derive(Clone, Debug)]
pub struct WordDetection {
    pub bbox: Bbox,
    pub crop: GrayImage,
}

/// A recognized word: detected region plus transcription.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadWord {
    pub text: String,
    pub bbox: Bbox,
}

/// Words of one text line, left to right.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadLine {
    pub words: Vec<ReadWord>,
}

impl ReadLine {
    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|word| word.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Page text: one output line per text line, each terminated by a newline.
pub fn page_text(lines: &[ReadLine]) -> String {
    let mut text = String::new();
    for line in lines {
        text.push_str(&line.text());
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str, x: f32) -> ReadWord {
        ReadWord {
            text: text.to_string(),
            bbox: Bbox::from_xyxy(x, 0.0, x + 10.0, 10.0),
        }
    }

    #[test]
    fn test_page_text_joins_words_and_lines() {
        let lines = vec![
            ReadLine {
                words: vec![word("hello", 0.0), word("world", 20.0)],
            },
            ReadLine {
                words: vec![word("again", 0.0)],
            },
        ];

        assert_eq!(lines[0].text(), "hello world");
        assert_eq!(page_text(&lines), "hello world\nagain\n");
        assert_eq!(page_text(&[]), "");
    }
}
