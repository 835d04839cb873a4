//! Training data consumed by the training loops.

use serde::{Deserialize, Serialize};

/// Read interface the nets use to walk a training set.
///
/// Every sample has an input vector of `input_dim()` values and an expected
/// output of `output_dim()` values. Unsupervised sets report an empty output.
pub trait TrainingData: Send + Sync {
    /// Number of samples.
    fn len(&self) -> usize;

    /// Input vector of sample `index`.
    fn input(&self, index: usize) -> &[f32];

    /// Expected output of sample `index`.
    fn output(&self, index: usize) -> &[f32];

    /// Size of every input vector.
    fn input_dim(&self) -> usize;

    /// Size of every expected output vector.
    fn output_dim(&self) -> usize;

    /// Returns true when there are no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory training set of (input, expected output) pairs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingSet {
    inputs: Vec<Vec<f32>>,
    outputs: Vec<Vec<f32>>,
}

impl TrainingSet {
    /// Creates an empty training set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a supervised sample.
    ///
    /// Panics if its sizes differ from the samples already in the set.
    pub fn add_sample(&mut self, input: Vec<f32>, output: Vec<f32>) {
        if let (Some(first_in), Some(first_out)) = (self.inputs.first(), self.outputs.first()) {
            assert_eq!(first_in.len(), input.len(), "input size differs from the set");
            assert_eq!(first_out.len(), output.len(), "output size differs from the set");
        }
        self.inputs.push(input);
        self.outputs.push(output);
    }

    /// Appends an unsupervised sample (empty expected output).
    pub fn add_input(&mut self, input: Vec<f32>) {
        self.add_sample(input, Vec::new());
    }
}

impl TrainingData for TrainingSet {
    fn len(&self) -> usize {
        self.inputs.len()
    }

    fn input(&self, index: usize) -> &[f32] {
        &self.inputs[index]
    }

    fn output(&self, index: usize) -> &[f32] {
        &self.outputs[index]
    }

    fn input_dim(&self) -> usize {
        self.inputs.first().map_or(0, Vec::len)
    }

    fn output_dim(&self) -> usize {
        self.outputs.first().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples() {
        let mut set = TrainingSet::new();
        assert!(set.is_empty());

        set.add_sample(vec![0.0, 1.0], vec![1.0]);
        set.add_sample(vec![1.0, 1.0], vec![0.0]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.input_dim(), 2);
        assert_eq!(set.output_dim(), 1);
        assert_eq!(set.input(1), &[1.0, 1.0]);
        assert_eq!(set.output(0), &[1.0]);
    }

    #[test]
    fn test_unsupervised_samples() {
        let mut set = TrainingSet::new();
        set.add_input(vec![0.5; 3]);
        assert_eq!(set.output_dim(), 0);
        assert!(set.output(0).is_empty());
    }

    #[test]
    #[should_panic]
    fn test_mismatched_sample_panics() {
        let mut set = TrainingSet::new();
        set.add_sample(vec![0.0, 1.0], vec![1.0]);
        set.add_sample(vec![0.0], vec![1.0]);
    }
}
