/// Min-max scales a candidate pool into `[0, 1]`.
///
/// A pool whose scores are all equal maps every member to `1.0`; an empty pool
/// stays empty.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    let Some(&first) = scores.first() else { return Vec::new() };
    let (min, max) = scores.iter().fold((first, first), |(lo, hi), &s| (lo.min(s), hi.max(s)));
    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|&s| ((s - min) / range).clamp(0.0, 1.0)).collect()
}
