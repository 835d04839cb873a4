//! Weighted connections and the arena that owns them.

use serde::{Deserialize, Serialize};

/// Which neuron of a layer a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// A regular neuron, by id.
    Neuron(usize),
    /// The layer's bias neuron.
    Bias,
}

/// Address of a neuron: layer id plus unit within the layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeuronRef {
    /// Layer id.
    pub layer: usize,
    /// Unit within the layer.
    pub unit: Unit,
}

impl NeuronRef {
    /// Regular neuron `id` of `layer`.
    pub fn neuron(layer: usize, id: usize) -> Self {
        Self { layer, unit: Unit::Neuron(id) }
    }

    /// Bias neuron of `layer`.
    pub fn bias(layer: usize) -> Self {
        Self { layer, unit: Unit::Bias }
    }
}

/// Handle of an edge inside the [`EdgeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) usize);

/// A weighted connection between two neurons.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    weight: f32,
    momentum: f32,
    first: NeuronRef,
    second: NeuronRef,
    adaptable: bool,
}

impl Edge {
    /// Creates an edge between `first` and `second`.
    pub fn new(first: NeuronRef, second: NeuronRef, weight: f32, momentum: f32, adaptable: bool) -> Self {
        Self { weight, momentum, first, second, adaptable }
    }

    /// Current weight.
    #[inline]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Sets the weight.
    #[inline]
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    /// The previous weight update.
    #[inline]
    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    /// Sets the stored update.
    #[inline]
    pub fn set_momentum(&mut self, momentum: f32) {
        self.momentum = momentum;
    }

    /// Whether training may change the weight.
    #[inline]
    pub fn is_adaptable(&self) -> bool {
        self.adaptable
    }

    /// Freezes or unfreezes the weight.
    pub fn set_adaptable(&mut self, adaptable: bool) {
        self.adaptable = adaptable;
    }

    /// Endpoint stored as "first" (the source for feed-forward edges).
    pub fn first(&self) -> NeuronRef {
        self.first
    }

    /// Endpoint stored as "second" (the destination for feed-forward edges).
    pub fn second(&self) -> NeuronRef {
        self.second
    }

    /// The endpoint that is not `from`.
    ///
    /// Panics if `from` is neither endpoint.
    pub fn destination(&self, from: NeuronRef) -> NeuronRef {
        if from == self.first {
            self.second
        } else if from == self.second {
            self.first
        } else {
            panic!("{:?} is not an endpoint of this edge", from);
        }
    }
}

/// Indexed storage for every edge of a graph.
///
/// Neurons hold [`EdgeId`]s; slots of removed edges are recycled.
#[derive(Debug, Clone, Default)]
pub struct EdgeArena {
    slots: Vec<Option<Edge>>,
    free: Vec<usize>,
}

impl EdgeArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an edge and returns its handle.
    pub fn insert(&mut self, edge: Edge) -> EdgeId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(edge);
                EdgeId(slot)
            }
            None => {
                self.slots.push(Some(edge));
                EdgeId(self.slots.len() - 1)
            }
        }
    }

    /// Removes an edge, returning it if it was live.
    pub fn remove(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.slots.get_mut(id.0)?.take();
        if edge.is_some() {
            self.free.push(id.0);
        }
        edge
    }

    /// Looks up a live edge.
    pub fn get(&self, id: EdgeId) -> Option<&Edge> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Looks up a live edge mutably.
    pub fn get_mut(&mut self, id: EdgeId) -> Option<&mut Edge> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Number of live edges.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns true when no edge is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over live edges.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|edge| (EdgeId(i), edge)))
    }
}

impl std::ops::Index<EdgeId> for EdgeArena {
    type Output = Edge;

    fn index(&self, id: EdgeId) -> &Edge {
        self.get(id).unwrap_or_else(|| panic!("edge {:?} is not live", id))
    }
}

impl std::ops::IndexMut<EdgeId> for EdgeArena {
    fn index_mut(&mut self, id: EdgeId) -> &mut Edge {
        self.get_mut(id).unwrap_or_else(|| panic!("edge {:?} is not live", id))
    }
}
