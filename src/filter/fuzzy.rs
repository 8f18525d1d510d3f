//! Partial-substring similarity for title patterns

/// Best similarity (0-100) between the shorter string and any same-length window of the
/// longer one
///
/// Each window is scored as `2 * M / (len(short) + len(window))`, where `M` is the length of
/// the longest common subsequence. An exact substring scores 100; either input empty
/// scores 0. Comparison is by `char`, so callers should fold case first.
///
/// This differs from `difflib`-style scorers (fuzzywuzzy's `partial_ratio`), which count
/// only greedy contiguous matching blocks and only try windows aligned to those blocks.
/// An LCS is never shorter than that block total and every window is tried, so a score
/// here is never lower. Titles with reordered words can score well above the
/// block-based value, e.g. `"weekly news quiz"` against `"news of the week quiz"` is 72
/// here and 56 there. Set thresholds with that in mind.
///
/// # Examples
///
/// ```
/// use tubeshelf::filter::partial_ratio;
///
/// assert_eq!(partial_ratio("only connect", "only connect - series 21 - episode 3"), 100);
/// assert!(partial_ratio("only conect", "only connect - series 21") >= 90);
/// assert!(partial_ratio("university challenge", "random video title") < 50);
/// assert_eq!(partial_ratio("", "anything"), 0);
/// ```
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    let mut best = 0.0_f64;
    for start in 0..long.len() {
        let end = (start + short.len()).min(long.len());
        let window = &long[start..end];
        let matches = lcs_len(short, window);
        let ratio = 2.0 * matches as f64 / (short.len() + window.len()) as f64;
        if ratio > 0.995 {
            return 100;
        }
        best = best.max(ratio);
    }

    (best * 100.0).round() as u32
}

/// Length of the longest common subsequence
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
