//! Smoothed sentence-level BLEU.

use std::collections::HashMap;

fn ngram_counts<S: AsRef<str>>(tokens: &[S], n: usize) -> HashMap<Vec<&str>, usize> {
    let mut counts = HashMap::new();
    if tokens.len() < n {
        return counts;
    }
    for window in tokens.windows(n) {
        let key: Vec<&str> = window.iter().map(|t| t.as_ref()).collect();
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

/// Sentence BLEU of `candidate` against a single `reference`
///
/// Unigram precision is unsmoothed; precisions of higher orders use add-one
/// smoothing so that short sentences do not score zero. Two empty sentences
/// score 1.
pub fn sentence_bleu<S: AsRef<str>>(reference: &[S], candidate: &[S], max_order: usize) -> f64 {
    if candidate.is_empty() {
        return if reference.is_empty() { 1.0 } else { 0.0 };
    }
    if max_order == 0 {
        return 0.0;
    }

    let mut log_precision = 0.0;
    for n in 1..=max_order {
        let cand = ngram_counts(candidate, n);
        let refs = ngram_counts(reference, n);
        let total: usize = cand.values().sum();
        let matched: usize = cand
            .iter()
            .map(|(gram, &c)| c.min(refs.get(gram).copied().unwrap_or(0)))
            .sum();
        let p = if n == 1 {
            if matched == 0 {
                return 0.0;
            }
            matched as f64 / total as f64
        } else {
            (matched + 1) as f64 / (total + 1) as f64
        };
        log_precision += p.ln();
    }

    let c = candidate.len() as f64;
    let r = reference.len() as f64;
    let brevity = if c > r { 1.0 } else { (1.0 - r / c).exp() };
    brevity * (log_precision / max_order as f64).exp()
}

/// 1 - BLEU up to 4-grams
pub fn bleu_loss<S: AsRef<str>>(reference: &[S], candidate: &[S]) -> f64 {
    1.0 - sentence_bleu(reference, candidate, 4)
}
