//! Neuron representation shared by backpropagation nets and SOMs.

use super::edge::EdgeId;
use serde::{Deserialize, Serialize};

/// State a SOM neuron carries on top of the common fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SomState {
    /// Learning rate of the current cycle.
    pub learning_rate: f32,
    /// Neighborhood influence of the current BMU.
    pub influence: f32,
    /// Running win frequency used as conscience bias.
    pub conscience: f32,
}

/// Which training algorithm a neuron belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NeuronKind {
    /// Backpropagation neuron.
    Bp,
    /// Self-organizing map neuron.
    Som(SomState),
}

/// A neuron in a layer.
///
/// Edges are not owned here: the neuron keeps handles into the graph's edge
/// arena, one list for each direction.
#[derive(Debug, Clone)]
pub struct Neuron {
    pub(crate) id: usize,
    pub(crate) layer: usize,
    pub(crate) value: f32,
    pub(crate) net_input: f32,
    pub(crate) error_delta: f32,
    pub(crate) position: Vec<f32>,
    pub(crate) incoming: Vec<EdgeId>,
    pub(crate) outgoing: Vec<EdgeId>,
    pub(crate) bias: Option<EdgeId>,
    pub(crate) kind: NeuronKind,
}

impl Neuron {
    /// Creates an unconnected neuron.
    pub fn new(id: usize, layer: usize, kind: NeuronKind, position: Vec<f32>, value: f32) -> Self {
        Self {
            id,
            layer,
            value,
            net_input: 0.0,
            error_delta: 0.0,
            position,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            bias: None,
            kind,
        }
    }

    /// Index of this neuron in its layer.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Id of the parent layer.
    #[inline]
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Current value (activation).
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Sets the value.
    #[inline]
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
    }

    /// Weighted input sum of the last forward pass.
    #[inline]
    pub fn net_input(&self) -> f32 {
        self.net_input
    }

    /// Current error delta.
    #[inline]
    pub fn error_delta(&self) -> f32 {
        self.error_delta
    }

    /// Sets the error delta.
    #[inline]
    pub fn set_error_delta(&mut self, delta: f32) {
        self.error_delta = delta;
    }

    /// Cartesian coordinates of the neuron.
    pub fn position(&self) -> &[f32] {
        &self.position
    }

    /// Moves the neuron.
    pub fn set_position(&mut self, position: Vec<f32>) {
        self.position = position;
    }

    /// Handles of incoming edges, in connection order.
    pub fn incoming(&self) -> &[EdgeId] {
        &self.incoming
    }

    /// Handles of outgoing edges, in connection order.
    pub fn outgoing(&self) -> &[EdgeId] {
        &self.outgoing
    }

    /// Handle of the edge from the previous layer's bias neuron, if any.
    pub fn bias_edge(&self) -> Option<EdgeId> {
        self.bias
    }

    /// Algorithm-specific state.
    pub fn kind(&self) -> NeuronKind {
        self.kind
    }

    /// SOM state, if this is a SOM neuron.
    pub fn som_state(&self) -> Option<&SomState> {
        match &self.kind {
            NeuronKind::Som(state) => Some(state),
            NeuronKind::Bp => None,
        }
    }

    /// Mutable SOM state, if this is a SOM neuron.
    pub fn som_state_mut(&mut self) -> Option<&mut SomState> {
        match &mut self.kind {
            NeuronKind::Som(state) => Some(state),
            NeuronKind::Bp => None,
        }
    }

    /// Conscience bias (0 for BP neurons).
    pub fn conscience(&self) -> f32 {
        self.som_state().map_or(0.0, |s| s.conscience)
    }

    /// Euclidean distance between the positions of two neurons.
    pub fn lattice_distance(&self, other: &Neuron) -> f32 {
        lattice_distance(&self.position, &other.position)
    }
}

/// Euclidean distance between two position vectors.
#[inline]
pub fn lattice_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Position dimensions must match");
    a.iter()
        .zip(b.iter())
        .map(|(p, q)| (p - q).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Row-major lattice coordinates of neuron `index` in a lattice of extents `dims`.
///
/// The first extent varies fastest, so in a `[w, h]` lattice neuron
/// `x + y * w` sits at `(x, y)`.
pub fn lattice_position(index: usize, dims: &[usize]) -> Vec<f32> {
    let mut rest = index;
    dims.iter()
        .map(|&extent| {
            let coord = rest % extent;
            rest /= extent;
            coord as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neuron_creation() {
        let neuron = Neuron::new(3, 1, NeuronKind::Bp, vec![3.0], 0.25);
        assert_eq!(neuron.id(), 3);
        assert_eq!(neuron.layer(), 1);
        assert_eq!(neuron.value(), 0.25);
        assert!(neuron.incoming().is_empty());
        assert!(neuron.som_state().is_none());
        assert_eq!(neuron.conscience(), 0.0);
    }

    #[test]
    fn test_som_state() {
        let mut neuron = Neuron::new(0, 0, NeuronKind::Som(SomState::default()), vec![0.0, 0.0], 0.0);
        neuron.som_state_mut().unwrap().conscience = 0.5;
        assert_eq!(neuron.conscience(), 0.5);
    }

    #[test]
    fn test_lattice_position() {
        assert_eq!(lattice_position(5, &[4, 3]), vec![1.0, 1.0]);
        assert_eq!(lattice_position(3, &[4, 3]), vec![3.0, 0.0]);
        assert_eq!(lattice_position(7, &[8]), vec![7.0]);
    }

    #[test]
    fn test_lattice_distance() {
        let a = Neuron::new(0, 0, NeuronKind::Bp, vec![0.0, 0.0], 0.0);
        let b = Neuron::new(1, 0, NeuronKind::Bp, vec![3.0, 4.0], 0.0);
        assert!((a.lattice_distance(&b) - 5.0).abs() < 1e-6);
    }
}
