use crate::table::{DistortionKey, DistortionTable, TranslationTable};
use crate::types::*;

/// Best source position for every target position under t·a.
///
/// Candidates are scanned left to right and replace the incumbent only on a
/// strictly greater score, starting from the null candidate with score -1.
/// Ties therefore go to the lowest source index, and since probabilities are
/// never negative every target word ends up linked to some source word.
/// Position 0 appears only when the source sentence is empty.
pub fn viterbi_alignment(
    source: &[Token],
    target: &[Token],
    translation: &TranslationTable,
    distortion: &DistortionTable,
) -> Vec<Position> {
    let l_f = source.len();
    let l_e = target.len();
    let mut links = Vec::with_capacity(l_e);

    for (j0, &e) in target.iter().enumerate() {
        let mut best: (Position, Prob) = (0, -1.0);
        for (i0, &f) in source.iter().enumerate() {
            let key = DistortionKey::new(i0 + 1, j0 + 1, l_e, l_f);
            let score = translation.get(e, f) * distortion.get(&key);
            if score > best.1 {
                best = (i0 + 1, score);
            }
        }
        links.push(best.0);
    }
    links
}
