//! Nets: a graph driven by a training algorithm.
//!
//! The algorithm is a strategy chosen at construction time. It decides how a
//! neuron computes its value and how a neuron adapts its incoming edges; the
//! net owns the graph, the random generator used for construction and the
//! optional training set.

use crate::containers::TrainingData;
use crate::error::{NetError, Result};
use crate::graph::{Graph, LayerFlags, NeuronKind, NeuronRef};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The family a net belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetKind {
    /// Supervised backpropagation net.
    Backprop,
    /// Self-organizing map.
    Som,
}

impl NetKind {
    /// Numeric tag written into snapshot headers.
    pub fn code(self) -> u32 {
        match self {
            NetKind::Backprop => 1,
            NetKind::Som => 2,
        }
    }

    /// Inverse of [`NetKind::code`].
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(NetKind::Backprop),
            2 => Some(NetKind::Som),
            _ => None,
        }
    }
}

/// How a net computes values and adapts weights.
pub trait Algorithm: fmt::Debug + Send + Sync {
    /// The family of nets this algorithm drives.
    fn kind(&self) -> NetKind;

    /// Kind given to neurons of new layers.
    fn neuron_kind(&self) -> NeuronKind;

    /// Recomputes the value of neuron `at` from its incoming edges.
    fn calc_value(&self, graph: &mut Graph, at: NeuronRef);

    /// Adapts the incoming edges of neuron `at`.
    fn adapt_edges(&self, graph: &mut Graph, at: NeuronRef);

    /// Computes values layer by layer, from the layer after the input layer
    /// up to the output layer.
    fn propagate_forward(&self, graph: &mut Graph) -> Result<()> {
        let (input, output) = designated_layers(graph)?;
        for layer in input + 1..=output {
            for id in 0..graph.layer(layer).len() {
                self.calc_value(graph, NeuronRef::neuron(layer, id));
            }
        }
        Ok(())
    }

    /// Runs the adaptation step of the algorithm.
    fn propagate_backward(&self, graph: &mut Graph) -> Result<()>;
}

/// Returns the (input, output) layer ids, checking that both are set and
/// that the input layer comes first.
pub fn designated_layers(graph: &Graph) -> Result<(usize, usize)> {
    let input = graph.input_layer().ok_or(NetError::LayerNotSet("input"))?;
    let output = graph.output_layer().ok_or(NetError::LayerNotSet("output"))?;
    if input >= output {
        return Err(NetError::Config(format!(
            "input layer {} must precede output layer {}",
            input, output
        )));
    }
    Ok((input, output))
}

/// A layered net driven by algorithm `A`.
pub struct Net<A: Algorithm> {
    pub(crate) graph: Graph,
    pub(crate) training_set: Option<Arc<dyn TrainingData>>,
    pub(crate) algorithm: A,
    pub(crate) rng: ChaCha8Rng,
}

impl<A: Algorithm> fmt::Debug for Net<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Net")
            .field("algorithm", &self.algorithm)
            .field("layers", &self.graph.layer_count())
            .field("edges", &self.graph.edges().len())
            .field("has_training_set", &self.training_set.is_some())
            .finish()
    }
}

impl<A: Algorithm> Net<A> {
    /// Creates an empty net around `algorithm`.
    pub fn with_algorithm(algorithm: A, rng: ChaCha8Rng) -> Self {
        Self {
            graph: Graph::new(),
            training_set: None,
            algorithm,
            rng,
        }
    }

    /// The family of this net.
    pub fn kind(&self) -> NetKind {
        self.algorithm.kind()
    }

    /// The underlying graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Mutable access to the underlying graph.
    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    /// The training algorithm.
    pub fn algorithm(&self) -> &A {
        &self.algorithm
    }

    /// Mutable access to the training algorithm.
    pub fn algorithm_mut(&mut self) -> &mut A {
        &mut self.algorithm
    }

    /// Appends a layer whose neurons form a lattice of extents `dims`.
    pub fn add_lattice_layer(&mut self, dims: &[usize], flags: LayerFlags) -> usize {
        let kind = self.algorithm.neuron_kind();
        self.graph.add_layer(dims, flags, kind, &mut self.rng)
    }

    /// Fully connects two layers with random weights in [-0.5, 0.5).
    pub fn connect_layers(&mut self, src_layer: usize, dst_layer: usize, adaptable: bool) {
        self.graph.connect_layers(src_layer, dst_layer, adaptable, &mut self.rng);
    }

    /// Replaces the neurons of a layer, dropping every edge that touched it.
    pub fn resize_layer(&mut self, id: usize, dims: &[usize]) {
        self.graph.resize_layer(id, dims, &mut self.rng);
    }

    /// Binds a training set. The net shares it with the caller.
    pub fn set_training_set(&mut self, set: Arc<dyn TrainingData>) {
        self.training_set = Some(set);
    }

    /// The bound training set.
    pub fn training_set(&self) -> Option<&Arc<dyn TrainingData>> {
        self.training_set.as_ref()
    }

    /// Writes `values` into the input layer.
    pub fn set_input(&mut self, values: &[f32]) -> Result<()> {
        let input = self.graph.input_layer().ok_or(NetError::LayerNotSet("input"))?;
        let expected = self.graph.layer(input).len();
        if values.len() != expected {
            return Err(NetError::DimensionMismatch { expected, actual: values.len() });
        }
        self.graph.set_values(input, values);
        Ok(())
    }

    /// Values of the output layer.
    pub fn output(&self) -> Result<Vec<f32>> {
        let output = self.graph.output_layer().ok_or(NetError::LayerNotSet("output"))?;
        Ok(self.graph.layer(output).values())
    }

    /// Computes every value between the input and the output layer.
    pub fn propagate_forward(&mut self) -> Result<()> {
        self.algorithm.propagate_forward(&mut self.graph)
    }

    /// Runs the adaptation step.
    pub fn propagate_backward(&mut self) -> Result<()> {
        self.algorithm.propagate_backward(&mut self.graph)
    }

    /// Returns the bound training set after checking that it is non-empty
    /// and that every input fits the input layer. Nothing has been trained
    /// yet when this fails.
    pub(crate) fn checked_training_set(&self) -> Result<Arc<dyn TrainingData>> {
        let set = self.training_set.clone().ok_or(NetError::MissingTrainingSet)?;
        if set.is_empty() {
            return Err(NetError::Config("training set is empty".to_string()));
        }
        let (input, _) = designated_layers(&self.graph)?;
        let expected = self.graph.layer(input).len();
        if set.input_dim() != expected {
            return Err(NetError::DimensionMismatch { expected, actual: set.input_dim() });
        }
        check_samples(expected, (0..set.len()).map(|i| set.input(i).len()))?;
        Ok(set)
    }
}

/// Checks that every sample length equals `expected`.
pub(crate) fn check_samples<I: IntoIterator<Item = usize>>(expected: usize, lengths: I) -> Result<()> {
    match lengths.into_iter().find(|&len| len != expected) {
        Some(actual) => Err(NetError::DimensionMismatch { expected, actual }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        for kind in [NetKind::Backprop, NetKind::Som] {
            assert_eq!(NetKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(NetKind::from_code(0), None);
    }

    #[test]
    fn test_designated_layers() {
        use rand::SeedableRng;

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut graph = Graph::new();
        assert!(matches!(designated_layers(&graph), Err(NetError::LayerNotSet("input"))));

        graph.add_layer(&[2], LayerFlags::OUTPUT, NeuronKind::Bp, &mut rng);
        graph.add_layer(&[2], LayerFlags::INPUT, NeuronKind::Bp, &mut rng);
        assert!(matches!(designated_layers(&graph), Err(NetError::Config(_))));

        graph.set_input_layer(0);
        graph.set_output_layer(1);
        assert_eq!(designated_layers(&graph).unwrap(), (0, 1));
    }

    #[test]
    fn test_check_samples() {
        assert!(check_samples(2, [2, 2, 2]).is_ok());
        assert!(matches!(
            check_samples(2, [2, 1, 3]),
            Err(NetError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }
}
