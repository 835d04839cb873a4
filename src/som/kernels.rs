//! Numeric kernels shared by single-unit and partitioned SOM training.
//!
//! Both paths call these functions with the same operands in the same order,
//! so a partitioned run reproduces the single-unit weights bit for bit.

/// Accumulator lanes of [`distance_squared`].
const LANES: usize = 8;

/// Squared Euclidean distance between two slices.
///
/// Keeps one running sum per lane so the loop autovectorizes; the lanes are
/// folded in a fixed order, which keeps the result independent of the
/// caller.
#[inline]
pub fn distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut lanes = [0.0f32; LANES];
    let mut left = a.chunks_exact(LANES);
    let mut right = b.chunks_exact(LANES);
    for (x, y) in (&mut left).zip(&mut right) {
        for ((acc, &p), &q) in lanes.iter_mut().zip(x).zip(y) {
            let d = p - q;
            *acc += d * d;
        }
    }

    let tail: f32 = left
        .remainder()
        .iter()
        .zip(right.remainder())
        .map(|(&p, &q)| (p - q) * (p - q))
        .sum();
    lanes.iter().sum::<f32>() + tail
}

/// Euclidean distance between a weight vector and an input vector.
#[inline]
pub fn euclidean_distance(weights: &[f32], input: &[f32]) -> f32 {
    distance_squared(weights, input).sqrt()
}

/// BMU distance biased by the conscience of the neuron.
///
/// `total` is the number of competing neurons; a neuron winning exactly its
/// fair share (`1 / total`) is not biased at all.
#[inline]
pub fn adjusted_distance(distance: f32, conscience: f32, rate: f32, total: usize) -> f32 {
    distance + rate * (conscience - 1.0 / total as f32)
}

/// One conscience update: moves `conscience` toward 1 for the winner and
/// toward 0 for everyone else.
#[inline]
pub fn conscience_step(conscience: f32, rate: f32, won: bool) -> f32 {
    let target = if won { 1.0 } else { 0.0 };
    conscience + rate * (target - conscience)
}

/// Moves a single weight toward `input` by `factor`.
#[inline]
pub fn adapt_weight(weight: f32, input: f32, factor: f32) -> f32 {
    weight + factor * (input - weight)
}

/// Moves every weight toward the matching input by `factor`.
#[inline]
pub fn update_weights(weights: &mut [f32], input: &[f32], factor: f32) {
    debug_assert_eq!(weights.len(), input.len());

    for (w, &x) in weights.iter_mut().zip(input) {
        *w = adapt_weight(*w, x, factor);
    }
}

/// Winner of a BMU scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestMatch {
    /// Position of the winner in the scanned sequence.
    pub index: usize,
    /// Conscience-adjusted distance of the winner.
    pub adjusted: f32,
    /// Plain Euclidean distance of the winner.
    pub distance: f32,
}

/// Scans (distance, conscience) pairs and returns the minimum adjusted
/// distance. Equal distances keep the earliest candidate.
pub fn best_match<I>(candidates: I, rate: f32, total: usize) -> Option<BestMatch>
where
    I: IntoIterator<Item = (f32, f32)>,
{
    let mut best: Option<BestMatch> = None;
    for (index, (distance, conscience)) in candidates.into_iter().enumerate() {
        let adjusted = adjusted_distance(distance, conscience, rate, total);
        if best.map_or(true, |b| adjusted < b.adjusted) {
            best = Some(BestMatch { index, adjusted, distance });
        }
    }
    best
}
