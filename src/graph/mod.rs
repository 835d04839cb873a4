//! The neuron/edge/layer graph both net kinds are built on.
//!
//! A [`Graph`] owns its layers (which own their neurons) and a single
//! [`EdgeArena`]. Neurons refer to edges by [`EdgeId`], edges refer to neurons
//! by [`NeuronRef`], so removing a layer's edges can always clean up the
//! remote side as well.

mod edge;
mod layer;
mod neuron;
pub mod snapshot;

pub use edge::{Edge, EdgeArena, EdgeId, NeuronRef, Unit};
pub use layer::{Layer, LayerFlags};
pub use neuron::{lattice_distance, lattice_position, Neuron, NeuronKind, SomState};

use crate::containers::F2DArray;
use rand::Rng;
use std::collections::HashSet;
use std::ops::Range;

/// Layers, edges and the designated input/output layers of a net.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    layers: Vec<Layer>,
    edges: EdgeArena,
    input: Option<usize>,
    output: Option<usize>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer and returns its id.
    ///
    /// A layer flagged `INPUT` or `OUTPUT` becomes the designated input or
    /// output layer.
    pub fn add_layer<R: Rng>(&mut self, dims: &[usize], flags: LayerFlags, kind: NeuronKind, rng: &mut R) -> usize {
        let id = self.layers.len();
        self.layers.push(Layer::new(id, dims, flags, kind, rng));
        if flags.contains(LayerFlags::INPUT) {
            self.input = Some(id);
        }
        if flags.contains(LayerFlags::OUTPUT) {
            self.output = Some(id);
        }
        id
    }

    /// All layers, in id order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer `id`. Panics if out of range.
    pub fn layer(&self, id: usize) -> &Layer {
        &self.layers[id]
    }

    /// Mutable layer `id`. Panics if out of range.
    pub fn layer_mut(&mut self, id: usize) -> &mut Layer {
        &mut self.layers[id]
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Designated input layer.
    pub fn input_layer(&self) -> Option<usize> {
        self.input
    }

    /// Designated output layer.
    pub fn output_layer(&self) -> Option<usize> {
        self.output
    }

    /// Designates the input layer.
    pub fn set_input_layer(&mut self, id: usize) {
        assert!(id < self.layers.len(), "layer {} does not exist", id);
        self.input = Some(id);
    }

    /// Designates the output layer.
    pub fn set_output_layer(&mut self, id: usize) {
        assert!(id < self.layers.len(), "layer {} does not exist", id);
        self.output = Some(id);
    }

    /// The edge arena.
    pub fn edges(&self) -> &EdgeArena {
        &self.edges
    }

    /// Edge `id`. Panics if it is not live.
    #[inline]
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id]
    }

    /// Mutable edge `id`. Panics if it is not live.
    #[inline]
    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id]
    }

    /// Neuron addressed by `at`. Panics if it does not exist.
    #[inline]
    pub fn neuron(&self, at: NeuronRef) -> &Neuron {
        let layer = &self.layers[at.layer];
        match at.unit {
            Unit::Neuron(id) => &layer.neurons[id],
            Unit::Bias => layer
                .bias
                .as_ref()
                .unwrap_or_else(|| panic!("layer {} has no bias neuron", at.layer)),
        }
    }

    /// Mutable neuron addressed by `at`. Panics if it does not exist.
    #[inline]
    pub fn neuron_mut(&mut self, at: NeuronRef) -> &mut Neuron {
        let layer = &mut self.layers[at.layer];
        match at.unit {
            Unit::Neuron(id) => &mut layer.neurons[id],
            Unit::Bias => layer
                .bias
                .as_mut()
                .unwrap_or_else(|| panic!("layer {} has no bias neuron", at.layer)),
        }
    }

    /// Connects `src` to `dst` with an explicit weight and momentum.
    ///
    /// The edge is registered as outgoing on `src` and incoming on `dst`;
    /// an edge leaving a bias neuron becomes `dst`'s bias edge instead.
    pub fn connect_with(&mut self, src: NeuronRef, dst: NeuronRef, weight: f32, momentum: f32, adaptable: bool) -> EdgeId {
        let id = self.edges.insert(Edge::new(src, dst, weight, momentum, adaptable));
        self.neuron_mut(src).outgoing.push(id);
        let target = self.neuron_mut(dst);
        match src.unit {
            Unit::Bias => target.bias = Some(id),
            Unit::Neuron(_) => target.incoming.push(id),
        }
        id
    }

    /// Connects `src` to `dst` with a random weight in [-0.5, 0.5).
    pub fn connect<R: Rng>(&mut self, src: NeuronRef, dst: NeuronRef, adaptable: bool, rng: &mut R) -> EdgeId {
        let weight = rng.gen_range(-0.5..0.5);
        self.connect_with(src, dst, weight, 0.0, adaptable)
    }

    /// Connects `src` to every neuron of layer `dst_layer`.
    pub fn connect_to_layer<R: Rng>(&mut self, src: NeuronRef, dst_layer: usize, adaptable: bool, rng: &mut R) -> Vec<EdgeId> {
        (0..self.layers[dst_layer].len())
            .map(|id| self.connect(src, NeuronRef::neuron(dst_layer, id), adaptable, rng))
            .collect()
    }

    /// Connects `src` to every neuron of layer `dst_layer` with the given
    /// weights and momentums (one per destination neuron).
    pub fn connect_to_layer_with(
        &mut self,
        src: NeuronRef,
        dst_layer: usize,
        weights: &[f32],
        momentums: &[f32],
        adaptable: bool,
    ) -> Vec<EdgeId> {
        let size = self.layers[dst_layer].len();
        assert_eq!(weights.len(), size, "one weight per destination neuron");
        assert_eq!(momentums.len(), size, "one momentum per destination neuron");
        (0..size)
            .map(|id| self.connect_with(src, NeuronRef::neuron(dst_layer, id), weights[id], momentums[id], adaptable))
            .collect()
    }

    /// Fully connects `src_layer` to `dst_layer` with weights in [-0.5, 0.5).
    pub fn connect_layers<R: Rng>(&mut self, src_layer: usize, dst_layer: usize, adaptable: bool, rng: &mut R) {
        self.connect_layers_with(src_layer, dst_layer, adaptable, || rng.gen_range(-0.5..0.5));
    }

    /// Fully connects `src_layer` to `dst_layer`, drawing each weight from
    /// `init`. The bias neuron of `src_layer`, if present, feeds the bias edge
    /// of every destination neuron.
    pub fn connect_layers_with<F: FnMut() -> f32>(&mut self, src_layer: usize, dst_layer: usize, adaptable: bool, mut init: F) {
        let sources = self.layers[src_layer].len();
        let targets = self.layers[dst_layer].len();
        for src in 0..sources {
            for dst in 0..targets {
                let weight = init();
                self.connect_with(NeuronRef::neuron(src_layer, src), NeuronRef::neuron(dst_layer, dst), weight, 0.0, adaptable);
            }
        }
        if self.layers[src_layer].bias.is_some() {
            for dst in 0..targets {
                let weight = init();
                self.connect_with(NeuronRef::bias(src_layer), NeuronRef::neuron(dst_layer, dst), weight, 0.0, adaptable);
            }
        }
    }

    /// Sets every edge from `src_layer` into `dst_layer` to `value`.
    pub fn set_edges_to_value(&mut self, src_layer: usize, dst_layer: usize, value: f32, adaptable: bool) {
        let ids: Vec<EdgeId> = self.edges_leaving(src_layer)
            .filter(|&id| self.edges[id].second().layer == dst_layer)
            .collect();
        for id in ids {
            let edge = &mut self.edges[id];
            edge.set_weight(value);
            edge.set_adaptable(adaptable);
        }
    }

    /// Removes a single edge and unregisters it from both endpoints.
    pub fn disconnect(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        for end in [edge.first(), edge.second()] {
            let neuron = self.neuron_mut(end);
            neuron.incoming.retain(|&e| e != id);
            neuron.outgoing.retain(|&e| e != id);
            if neuron.bias == Some(id) {
                neuron.bias = None;
            }
        }
        Some(edge)
    }

    /// Removes every edge touching layer `id`, including its bias neuron,
    /// and the matching entries on the remote endpoints.
    pub fn erase_all_edges(&mut self, id: usize) {
        let layer = &self.layers[id];
        let doomed: HashSet<EdgeId> = layer
            .neurons
            .iter()
            .chain(layer.bias.iter())
            .flat_map(|n| n.incoming.iter().chain(n.outgoing.iter()).chain(n.bias.iter()))
            .copied()
            .collect();
        if doomed.is_empty() {
            return;
        }

        for &edge in &doomed {
            self.edges.remove(edge);
        }
        for layer in &mut self.layers {
            for neuron in layer.neurons.iter_mut().chain(layer.bias.iter_mut()) {
                neuron.incoming.retain(|e| !doomed.contains(e));
                neuron.outgoing.retain(|e| !doomed.contains(e));
                if neuron.bias.map_or(false, |b| doomed.contains(&b)) {
                    neuron.bias = None;
                }
            }
        }
    }

    /// Replaces the neurons of layer `id` with fresh ones.
    ///
    /// Every edge touching the layer is erased first, on both sides, so no
    /// other layer is left holding an edge to a destroyed neuron. The layer
    /// has to be reconnected afterwards.
    pub fn resize_layer<R: Rng>(&mut self, id: usize, dims: &[usize], rng: &mut R) {
        self.erase_all_edges(id);
        self.layers[id].rebuild(dims, rng);
    }

    /// Writes `values` into the neurons of layer `id`.
    pub fn set_values(&mut self, id: usize, values: &[f32]) {
        let layer = &mut self.layers[id];
        assert_eq!(values.len(), layer.len(), "one value per neuron");
        for (neuron, &value) in layer.neurons.iter_mut().zip(values) {
            neuron.value = value;
        }
    }

    /// Weights of the incoming edges of `at`, in connection order.
    pub fn incoming_weights(&self, at: NeuronRef) -> Vec<f32> {
        self.neuron(at).incoming.iter().map(|&e| self.edges[e].weight()).collect()
    }

    /// Incoming edge weights of the neurons in `range` of layer `id`: one row
    /// per neuron, one column per incoming edge.
    pub fn export_edges_in(&self, id: usize, range: Range<usize>) -> F2DArray {
        let layer = &self.layers[id];
        assert!(range.end <= layer.len() && range.start < range.end, "invalid neuron range {:?}", range);
        let width = layer.neurons[range.start].incoming.len();
        let mut matrix = F2DArray::new(width, range.len());
        for (row, neuron) in layer.neurons[range].iter().enumerate() {
            assert_eq!(neuron.incoming.len(), width, "neurons in range have different fan-in");
            for (col, &edge) in neuron.incoming.iter().enumerate() {
                matrix.set(col, row, self.edges[edge].weight());
            }
        }
        matrix
    }

    /// Writes an edge matrix produced by [`Graph::export_edges_in`] back,
    /// starting at neuron `start`.
    pub fn import_edges_in(&mut self, id: usize, matrix: &F2DArray, start: usize) {
        let layer = &self.layers[id];
        assert!(start + matrix.height() <= layer.len(), "matrix rows exceed the layer");
        for row in 0..matrix.height() {
            let neuron = &layer.neurons[start + row];
            assert_eq!(neuron.incoming.len(), matrix.width(), "fan-in does not match matrix width");
            for (col, &edge) in neuron.incoming.iter().enumerate() {
                self.edges[edge].set_weight(matrix.get(col, row));
            }
        }
    }

    /// Positions of the neurons in `range` of layer `id`, one row per neuron.
    pub fn export_positions(&self, id: usize, range: Range<usize>) -> F2DArray {
        let layer = &self.layers[id];
        assert!(range.end <= layer.len() && range.start < range.end, "invalid neuron range {:?}", range);
        let width = layer.neurons[range.start].position.len();
        let mut matrix = F2DArray::new(width, range.len());
        for (row, neuron) in layer.neurons[range].iter().enumerate() {
            matrix.row_slice_mut(row).copy_from_slice(&neuron.position);
        }
        matrix
    }

    /// Writes a position matrix back, starting at neuron `start`.
    pub fn import_positions(&mut self, id: usize, matrix: &F2DArray, start: usize) {
        let layer = &mut self.layers[id];
        assert!(start + matrix.height() <= layer.len(), "matrix rows exceed the layer");
        for row in 0..matrix.height() {
            layer.neurons[start + row].position = matrix.row(row);
        }
    }

    /// Conscience values of the neurons in `range` of layer `id`.
    pub fn export_conscience(&self, id: usize, range: Range<usize>) -> Vec<f32> {
        self.layers[id].neurons[range].iter().map(Neuron::conscience).collect()
    }

    /// Writes conscience values back, starting at neuron `start`.
    pub fn import_conscience(&mut self, id: usize, conscience: &[f32], start: usize) {
        let layer = &mut self.layers[id];
        assert!(start + conscience.len() <= layer.len(), "conscience vector exceeds the layer");
        for (neuron, &c) in layer.neurons[start..].iter_mut().zip(conscience) {
            if let Some(state) = neuron.som_state_mut() {
                state.conscience = c;
            }
        }
    }

    fn edges_leaving(&self, id: usize) -> impl Iterator<Item = EdgeId> + '_ {
        let layer = &self.layers[id];
        layer
            .neurons
            .iter()
            .chain(layer.bias.iter())
            .flat_map(|n| n.outgoing.iter().copied())
    }
}
