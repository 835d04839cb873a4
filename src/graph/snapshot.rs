//! Exporting and restoring graph state.
//!
//! A neuron is exported as its id, position, value and the list of its
//! incoming edges; each edge names its source by [`NeuronRef`]. On restore
//! the layers are rebuilt first and the edges are queued in a
//! [`ConnectionTable`], which reconnects them once every referenced neuron
//! exists again.

use super::{Graph, Layer, LayerFlags, Neuron, NeuronKind, NeuronRef, Unit};
use crate::error::{NetError, Result};
use serde::{Deserialize, Serialize};

/// An incoming edge, named by its source neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// The neuron the edge starts at.
    pub source: NeuronRef,
    /// Weight.
    pub weight: f32,
    /// Stored update.
    pub momentum: f32,
    /// Whether training may change the weight.
    pub adaptable: bool,
}

/// Exported state of one neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronRecord {
    /// Id within the layer.
    pub id: usize,
    /// Cartesian position.
    pub position: Vec<f32>,
    /// Value at export time.
    pub value: f32,
    /// Conscience bias (SOM neurons only, otherwise 0).
    pub conscience: f32,
    /// Incoming edges in connection order.
    pub incoming: Vec<EdgeRecord>,
    /// Edge from the previous layer's bias neuron.
    pub bias: Option<EdgeRecord>,
}

/// Exported state of one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerRecord {
    /// Layer id.
    pub id: usize,
    /// Role flags.
    pub flags: LayerFlags,
    /// Lattice extents.
    pub dims: Vec<usize>,
    /// Kind of the neurons.
    pub kind: NeuronKind,
    /// Neurons in id order.
    pub neurons: Vec<NeuronRecord>,
}

/// Exported state of a whole graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRecord {
    /// Layers in id order.
    pub layers: Vec<LayerRecord>,
    /// Designated input layer.
    pub input: Option<usize>,
    /// Designated output layer.
    pub output: Option<usize>,
}

/// Edges waiting for their endpoints to exist.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    pending: Vec<(NeuronRef, EdgeRecord)>,
}

impl ConnectionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an edge ending at `target`.
    pub fn push(&mut self, target: NeuronRef, edge: EdgeRecord) {
        self.pending.push((target, edge));
    }

    /// Number of queued edges.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns true when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Connects every queued edge in `graph`.
    pub fn resolve(self, graph: &mut Graph) -> Result<()> {
        for (target, edge) in self.pending {
            if !graph.contains(edge.source) || !graph.contains(target) {
                return Err(NetError::InvalidFormat(format!(
                    "edge {:?} -> {:?} references a missing neuron",
                    edge.source, target
                )));
            }
            graph.connect_with(edge.source, target, edge.weight, edge.momentum, edge.adaptable);
        }
        Ok(())
    }
}

impl Graph {
    /// Returns true if `at` addresses an existing neuron.
    pub fn contains(&self, at: NeuronRef) -> bool {
        self.layers.get(at.layer).map_or(false, |layer| match at.unit {
            Unit::Neuron(id) => id < layer.neurons.len(),
            Unit::Bias => layer.bias.is_some(),
        })
    }

    /// Exports layer `id` as (id, position, incoming edges) per neuron.
    pub fn export_layer(&self, id: usize) -> LayerRecord {
        let layer = &self.layers[id];
        let record_edge = |edge_id| {
            let edge = self.edge(edge_id);
            EdgeRecord {
                source: edge.first(),
                weight: edge.weight(),
                momentum: edge.momentum(),
                adaptable: edge.is_adaptable(),
            }
        };

        LayerRecord {
            id,
            flags: layer.flags,
            dims: layer.dims.clone(),
            kind: layer.kind,
            neurons: layer
                .neurons
                .iter()
                .map(|n| NeuronRecord {
                    id: n.id,
                    position: n.position.clone(),
                    value: n.value,
                    conscience: n.conscience(),
                    incoming: n.incoming.iter().map(|&e| record_edge(e)).collect(),
                    bias: n.bias.map(record_edge),
                })
                .collect(),
        }
    }

    /// Exports every layer.
    pub fn export(&self) -> GraphRecord {
        GraphRecord {
            layers: (0..self.layers.len()).map(|id| self.export_layer(id)).collect(),
            input: self.input,
            output: self.output,
        }
    }

    /// Restores layer neurons from `record` and queues its edges in `table`.
    ///
    /// The layer is appended, so records have to be imported in id order.
    pub fn import_layer(&mut self, record: &LayerRecord, table: &mut ConnectionTable) -> Result<usize> {
        let id = self.layers.len();
        if record.id != id {
            return Err(NetError::InvalidFormat(format!(
                "layer record {} imported at position {}",
                record.id, id
            )));
        }

        let mut neurons = Vec::with_capacity(record.neurons.len());
        for (index, n) in record.neurons.iter().enumerate() {
            if n.id != index {
                return Err(NetError::InvalidFormat(format!(
                    "neuron record {} stored at index {} of layer {}",
                    n.id, index, id
                )));
            }
            let mut kind = record.kind;
            if let NeuronKind::Som(state) = &mut kind {
                state.conscience = n.conscience;
            }
            neurons.push(Neuron::new(index, id, kind, n.position.clone(), n.value));

            let target = NeuronRef::neuron(id, index);
            for edge in n.incoming.iter().chain(n.bias.iter()) {
                table.push(target, edge.clone());
            }
        }

        let bias = record.flags.contains(LayerFlags::BIAS).then(|| {
            Neuron::new(neurons.len(), id, NeuronKind::Bp, vec![0.0; record.dims.len()], 1.0)
        });
        self.layers.push(Layer {
            id,
            flags: record.flags,
            dims: record.dims.clone(),
            kind: record.kind,
            neurons,
            bias,
        });
        Ok(id)
    }

    /// Rebuilds a graph from an exported record.
    pub fn from_records(record: &GraphRecord) -> Result<Graph> {
        let mut graph = Graph::new();
        let mut table = ConnectionTable::new();
        for layer in &record.layers {
            graph.import_layer(layer, &mut table)?;
        }
        table.resolve(&mut graph)?;

        let count = graph.layers.len();
        for (name, layer) in [("input", record.input), ("output", record.output)] {
            if layer.map_or(false, |id| id >= count) {
                return Err(NetError::InvalidFormat(format!("{} layer out of range", name)));
            }
        }
        graph.input = record.input;
        graph.output = record.output;
        Ok(graph)
    }
}
