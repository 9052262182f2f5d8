use std::collections::HashMap;

use super::{CtcMatrix, PrefixTree};

#[derive(Debug, Clone)]
struct Beam {
    text: String,
    /// Characters of the word currently being written.
    word: String,
    last: Option<usize>,
    /// Log probability of paths ending in a blank.
    pr_blank: f64,
    /// Log probability of paths ending in `last`.
    pr_non_blank: f64,
}

impl Beam {
    fn total(&self) -> f64 {
        log_add(self.pr_blank, self.pr_non_blank)
    }
}

fn log_add(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

fn merge(beams: &mut HashMap<String, Beam>, beam: Beam) {
    match beams.get_mut(&beam.text) {
        Some(existing) => {
            existing.pr_blank = log_add(existing.pr_blank, beam.pr_blank);
            existing.pr_non_blank = log_add(existing.pr_non_blank, beam.pr_non_blank);
        }
        None => {
            beams.insert(beam.text.clone(), beam);
        }
    }
}

fn ranked(beams: HashMap<String, Beam>) -> Vec<Beam> {
    let mut beams = beams.into_values().collect::<Vec<_>>();
    beams.sort_by(|a, b| {
        b.total()
            .total_cmp(&a.total())
            .then_with(|| a.text.cmp(&b.text))
    });
    beams
}

/// Word beam search: CTC beam search where every word must be a dictionary
/// word (or a prefix of one while it is being written).
///
/// Characters found in the dictionary are word characters and are only
/// allowed where the prefix tree permits them. Any other character of the
/// model's alphabet may only follow a complete word or start the text.
/// An unfinished last word is completed when the dictionary admits a single
/// completion; otherwise the beam is only used if no beam ends cleanly.
pub fn word_beam_search(
    mat: &CtcMatrix,
    chars: &[char],
    tree: &PrefixTree,
    beam_width: usize,
) -> String {
    let mut label_of = HashMap::new();
    for (idx, c) in chars.iter().enumerate() {
        label_of.entry(*c).or_insert(idx);
    }
    let non_word_labels = chars
        .iter()
        .enumerate()
        .filter(|&(idx, c)| !tree.word_chars().contains(c) && label_of[c] == idx)
        .map(|(idx, c)| (idx, *c))
        .collect::<Vec<_>>();

    let blank = mat.blank();
    let mut beams = vec![Beam {
        text: String::new(),
        word: String::new(),
        last: None,
        pr_blank: 0.0,
        pr_non_blank: f64::NEG_INFINITY,
    }];

    for t in 0..mat.frames() {
        let ln = |label: usize| (mat.prob(t, label) as f64).ln();
        let mut next = HashMap::new();

        for beam in beams.iter().take(beam_width.max(1)) {
            let total = beam.total();

            // extend with blank or the repeated last label
            merge(
                &mut next,
                Beam {
                    pr_blank: total + ln(blank),
                    pr_non_blank: beam
                        .last
                        .map_or(f64::NEG_INFINITY, |last| beam.pr_non_blank + ln(last)),
                    ..beam.clone()
                },
            );

            let word_complete = beam.word.is_empty() || tree.is_word(&beam.word);
            let word_labels = tree
                .next_chars(&beam.word)
                .into_iter()
                .filter_map(|c| label_of.get(&c).map(|&idx| (idx, c)));
            let candidates = word_labels
                .map(|(idx, c)| (idx, c, true))
                .chain(
                    non_word_labels
                        .iter()
                        .filter(|_| word_complete)
                        .map(|&(idx, c)| (idx, c, false)),
                );

            for (label, c, is_word_char) in candidates {
                // a repeated label needs a blank in between
                let prefix = if beam.last == Some(label) {
                    beam.pr_blank
                } else {
                    total
                };

                let mut text = beam.text.clone();
                text.push(c);
                let word = if is_word_char {
                    let mut word = beam.word.clone();
                    word.push(c);
                    word
                } else {
                    String::new()
                };

                merge(
                    &mut next,
                    Beam {
                        text,
                        word,
                        last: Some(label),
                        pr_blank: f64::NEG_INFINITY,
                        pr_non_blank: prefix + ln(label),
                    },
                );
            }
        }

        beams = ranked(next);
    }

    let mut finished = Vec::new();
    let mut unfinished = Vec::new();
    for beam in beams {
        let score = beam.total();
        if beam.word.is_empty() || tree.is_word(&beam.word) {
            finished.push((score, beam.text));
            continue;
        }
        match tree.completions(&beam.word).as_slice() {
            [only] => {
                let mut text = beam.text;
                text.push_str(&only[beam.word.len()..]);
                finished.push((score, text));
            }
            _ => unfinished.push((score, beam.text)),
        }
    }

    let best = |candidates: Vec<(f64, String)>| {
        candidates
            .into_iter()
            .filter(|(score, _)| score.is_finite())
            .max_by(|a, b| a.0.total_cmp(&b.0).then_with(|| b.1.cmp(&a.1)))
            .map(|(_, text)| text)
    };

    best(finished).or_else(|| best(unfinished)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{best_path, test_utils::peaked_matrix};
    use ndarray::array;

    #[test]
    fn test_word_beam_search_prefers_dictionary_words() {
        let chars = ['A', 'B', 'C', ' '];
        // best path reads "CB", which is not a word
        let mat = CtcMatrix::new(array![
            [0.45, 0.0, 0.5, 0.0, 0.05],
            [0.0, 0.9, 0.0, 0.0, 0.1],
        ]);
        let tree = PrefixTree::new(["AB", "CA"]);

        assert_eq!(best_path(&mat, &chars), "CB");
        assert_eq!(word_beam_search(&mat, &chars, &tree, 10), "AB");
    }

    #[test]
    fn test_word_beam_search_multiple_words() {
        let chars = ['H', 'I', ' '];
        let mat = peaked_matrix(
            4,
            &[Some(0), Some(1), Some(2), Some(0), None, Some(1)],
            0.8,
        );
        let tree = PrefixTree::new(["HI"]);

        assert_eq!(word_beam_search(&mat, &chars, &tree, 10), "HI HI");
    }

    #[test]
    fn test_word_beam_search_completes_unique_word() {
        let chars = ['H', 'E', 'L', 'O'];
        // only "HEL" is visible; the dictionary has a single completion
        let mat = peaked_matrix(5, &[Some(0), Some(1), Some(2)], 0.9);
        let tree = PrefixTree::new(["HELLO", "WORLD"]);

        assert_eq!(word_beam_search(&mat, &chars, &tree, 10), "HELLO");
    }

    #[test]
    fn test_word_beam_search_empty_matrix() {
        let chars = ['A'];
        let mat = peaked_matrix(2, &[], 0.9);
        let tree = PrefixTree::new(["A"]);

        assert_eq!(word_beam_search(&mat, &chars, &tree, 10), "");
    }
}
