use super::CtcMatrix;

/// Best path decoding: take the most likely label of each frame, merge
/// repeated labels, then drop blanks.
pub fn best_path(mat: &CtcMatrix, chars: &[char]) -> String {
    let blank = mat.blank();
    let mut text = String::new();
    let mut prev = None;

    for t in 0..mat.frames() {
        let label = mat
            .frame(t)
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(idx, _)| idx)
            .unwrap_or(blank);

        if label != blank && Some(label) != prev {
            if let Some(c) = chars.get(label) {
                text.push(*c);
            }
        }

        prev = Some(label);
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_utils::peaked_matrix;

    const CHARS: [char; 3] = ['a', 'b', ' '];

    #[test]
    fn test_best_path_collapses_repeats() {
        // a a - b b -> "ab"
        let mat = peaked_matrix(4, &[Some(0), Some(0), None, Some(1), Some(1)], 0.7);
        assert_eq!(best_path(&mat, &CHARS), "ab");
    }

    #[test]
    fn test_best_path_blank_separates_doubles() {
        // a - a -> "aa"
        let mat = peaked_matrix(4, &[Some(0), None, Some(0)], 0.7);
        assert_eq!(best_path(&mat, &CHARS), "aa");
    }

    #[test]
    fn test_best_path_all_blank_and_empty() {
        let mat = peaked_matrix(4, &[None, None], 0.9);
        assert_eq!(best_path(&mat, &CHARS), "");

        let empty = peaked_matrix(4, &[], 0.9);
        assert_eq!(best_path(&empty, &CHARS), "");
    }
}
