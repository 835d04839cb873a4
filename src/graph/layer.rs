//! Layers: ordered, index-stable collections of neurons.

use super::neuron::{lattice_position, Neuron, NeuronKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Role flags of a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerFlags(u32);

impl LayerFlags {
    /// No role.
    pub const NONE: LayerFlags = LayerFlags(0);
    /// Input layer.
    pub const INPUT: LayerFlags = LayerFlags(1 << 0);
    /// Hidden layer.
    pub const HIDDEN: LayerFlags = LayerFlags(1 << 1);
    /// Output layer.
    pub const OUTPUT: LayerFlags = LayerFlags(1 << 2);
    /// The layer carries a bias neuron feeding the next layer.
    pub const BIAS: LayerFlags = LayerFlags(1 << 3);

    /// Returns true if every bit of `other` is set.
    #[inline]
    pub fn contains(self, other: LayerFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets the bits of `other`.
    pub fn insert(&mut self, other: LayerFlags) {
        self.0 |= other.0;
    }

    /// Raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for LayerFlags {
    type Output = LayerFlags;

    fn bitor(self, rhs: LayerFlags) -> LayerFlags {
        LayerFlags(self.0 | rhs.0)
    }
}

/// A layer of neurons.
///
/// The layer owns its neurons; neuron ids equal their index in the layer.
#[derive(Debug, Clone)]
pub struct Layer {
    pub(crate) id: usize,
    pub(crate) flags: LayerFlags,
    pub(crate) dims: Vec<usize>,
    pub(crate) kind: NeuronKind,
    pub(crate) neurons: Vec<Neuron>,
    pub(crate) bias: Option<Neuron>,
}

impl Layer {
    /// Creates a layer with one neuron per lattice cell of `dims`.
    ///
    /// Neurons sit at their lattice coordinates and start with random values
    /// in [0, 1).
    pub fn new<R: Rng>(id: usize, dims: &[usize], flags: LayerFlags, kind: NeuronKind, rng: &mut R) -> Self {
        let mut layer = Self {
            id,
            flags,
            dims: Vec::new(),
            kind,
            neurons: Vec::new(),
            bias: None,
        };
        layer.rebuild(dims, rng);
        layer
    }

    /// Drops every neuron and creates fresh ones. Edge bookkeeping is the
    /// graph's job; see `Graph::resize_layer`.
    pub(crate) fn rebuild<R: Rng>(&mut self, dims: &[usize], rng: &mut R) {
        assert!(!dims.is_empty(), "a layer needs at least one dimension");
        assert!(dims.iter().all(|&d| d > 0), "layer extents must be positive");

        let size: usize = dims.iter().product();
        self.dims = dims.to_vec();
        self.neurons = (0..size)
            .map(|i| Neuron::new(i, self.id, self.kind, lattice_position(i, dims), rng.gen()))
            .collect();
        self.bias = self.flags.contains(LayerFlags::BIAS).then(|| {
            Neuron::new(size, self.id, NeuronKind::Bp, vec![0.0; dims.len()], 1.0)
        });
    }

    /// Index of this layer in the net.
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Role flags.
    #[inline]
    pub fn flags(&self) -> LayerFlags {
        self.flags
    }

    /// Lattice extents.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Number of regular neurons.
    #[inline]
    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    /// Returns true when the layer has no neurons.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    /// All regular neurons, in id order.
    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// Neuron `id`. Panics if out of range.
    #[inline]
    pub fn neuron(&self, id: usize) -> &Neuron {
        &self.neurons[id]
    }

    /// Mutable neuron `id`. Panics if out of range.
    #[inline]
    pub fn neuron_mut(&mut self, id: usize) -> &mut Neuron {
        &mut self.neurons[id]
    }

    /// The bias neuron, when the layer has one.
    pub fn bias_neuron(&self) -> Option<&Neuron> {
        self.bias.as_ref()
    }

    /// Values of all regular neurons.
    pub fn values(&self) -> Vec<f32> {
        self.neurons.iter().map(Neuron::value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_flags() {
        let flags = LayerFlags::INPUT | LayerFlags::BIAS;
        assert!(flags.contains(LayerFlags::INPUT));
        assert!(flags.contains(LayerFlags::BIAS));
        assert!(!flags.contains(LayerFlags::OUTPUT));
    }

    #[test]
    fn test_layer_ids_match_indices() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let layer = Layer::new(2, &[3, 2], LayerFlags::OUTPUT, NeuronKind::Bp, &mut rng);
        assert_eq!(layer.len(), 6);
        for (i, neuron) in layer.neurons().iter().enumerate() {
            assert_eq!(neuron.id(), i);
            assert_eq!(neuron.layer(), 2);
        }
        assert_eq!(layer.neuron(4).position(), &[1.0, 1.0]);
        assert!(layer.bias_neuron().is_none());
    }

    #[test]
    fn test_bias_neuron() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let layer = Layer::new(0, &[2], LayerFlags::INPUT | LayerFlags::BIAS, NeuronKind::Bp, &mut rng);
        let bias = layer.bias_neuron().unwrap();
        assert_eq!(bias.value(), 1.0);
        assert_eq!(layer.len(), 2);
    }

    #[test]
    #[should_panic]
    fn test_zero_extent_panics() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        Layer::new(0, &[0], LayerFlags::INPUT, NeuronKind::Bp, &mut rng);
    }
}
