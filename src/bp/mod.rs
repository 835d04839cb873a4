//! Backpropagation nets.
//!
//! Training is online: every sample runs a forward pass, sets the output
//! deltas against the expected values, propagates the deltas back through the
//! hidden layers and then adapts every incoming edge with momentum and weight
//! decay.

use crate::config::{rng_from_seed, BpConfig};
use crate::error::{NetError, Result};
use crate::graph::{EdgeId, Graph, LayerFlags, NeuronKind, NeuronRef};
use crate::math::{resolve_transfer, TransferFunction};
use crate::net::{check_samples, designated_layers, Algorithm, Net, NetKind};
use log::{debug, info};

/// The backpropagation algorithm and its hyperparameters.
#[derive(Debug, Clone)]
pub struct Backprop {
    pub(crate) transfer: &'static TransferFunction,
    pub(crate) learning_rate: f32,
    pub(crate) momentum: f32,
    pub(crate) weight_decay: f32,
    pub(crate) theta: f32,
}

impl Backprop {
    /// Builds the algorithm from a configuration.
    pub fn from_config(config: &BpConfig) -> Result<Self> {
        let transfer = resolve_transfer(&config.transfer)
            .ok_or_else(|| NetError::UnknownFunction(config.transfer.clone()))?;
        Ok(Self {
            transfer,
            learning_rate: config.learning_rate,
            momentum: config.momentum,
            weight_decay: config.weight_decay,
            theta: config.theta,
        })
    }

    /// Transfer function.
    pub fn transfer(&self) -> &'static TransferFunction {
        self.transfer
    }

    /// Learning rate.
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Sets the learning rate.
    pub fn set_learning_rate(&mut self, rate: f32) {
        self.learning_rate = rate;
    }

    /// Momentum factor.
    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    /// Sets the momentum factor.
    pub fn set_momentum(&mut self, momentum: f32) {
        self.momentum = momentum;
    }

    /// Weight decay.
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }

    /// Sets the weight decay.
    pub fn set_weight_decay(&mut self, decay: f32) {
        self.weight_decay = decay;
    }

    /// Threshold passed to the transfer function.
    pub fn theta(&self) -> f32 {
        self.theta
    }

    fn input_sum(graph: &Graph, at: NeuronRef) -> f32 {
        let neuron = graph.neuron(at);
        neuron
            .incoming()
            .iter()
            .chain(neuron.bias_edge().iter())
            .map(|&id| {
                let edge = graph.edge(id);
                edge.weight() * graph.neuron(edge.first()).value()
            })
            .sum()
    }
}

impl Algorithm for Backprop {
    fn kind(&self) -> NetKind {
        NetKind::Backprop
    }

    fn neuron_kind(&self) -> NeuronKind {
        NeuronKind::Bp
    }

    fn calc_value(&self, graph: &mut Graph, at: NeuronRef) {
        let net = Self::input_sum(graph, at);
        let neuron = graph.neuron_mut(at);
        neuron.net_input = net;
        neuron.value = (self.transfer.normal)(net, self.theta);
    }

    fn adapt_edges(&self, graph: &mut Graph, at: NeuronRef) {
        let neuron = graph.neuron(at);
        let delta = neuron.error_delta();
        let edges: Vec<EdgeId> = neuron.incoming().iter().copied().chain(neuron.bias_edge()).collect();

        for id in edges {
            if !graph.edge(id).is_adaptable() {
                continue;
            }
            let source = graph.neuron(graph.edge(id).first()).value();
            let edge = graph.edge_mut(id);
            let update = self.learning_rate * delta * source + self.momentum * edge.momentum()
                - self.weight_decay * edge.weight();
            edge.set_weight(edge.weight() + update);
            edge.set_momentum(update);
        }
    }

    fn propagate_backward(&self, graph: &mut Graph) -> Result<()> {
        let (input, output) = designated_layers(graph)?;

        // All deltas are computed against the weights of the forward pass.
        for layer in (input + 1..output).rev() {
            for id in 0..graph.layer(layer).len() {
                let at = NeuronRef::neuron(layer, id);
                let neuron = graph.neuron(at);
                let downstream: f32 = neuron
                    .outgoing()
                    .iter()
                    .map(|&e| {
                        let edge = graph.edge(e);
                        edge.weight() * graph.neuron(edge.second()).error_delta()
                    })
                    .sum();
                let delta = (self.transfer.derivative)(neuron.net_input(), self.theta) * downstream;
                graph.neuron_mut(at).set_error_delta(delta);
            }
        }

        for layer in input + 1..=output {
            for id in 0..graph.layer(layer).len() {
                self.adapt_edges(graph, NeuronRef::neuron(layer, id));
            }
        }
        Ok(())
    }
}

/// A backpropagation net.
pub type BpNet = Net<Backprop>;

impl Net<Backprop> {
    /// Creates an empty backpropagation net.
    pub fn new(config: &BpConfig) -> Result<Self> {
        let algorithm = Backprop::from_config(config)?;
        Ok(Net::with_algorithm(algorithm, rng_from_seed(config.seed)))
    }

    /// Appends a one-dimensional layer of `size` neurons.
    pub fn add_layer(&mut self, size: usize, flags: LayerFlags) -> usize {
        self.add_lattice_layer(&[size], flags)
    }

    /// Builds a fully connected feed-forward net with one layer per entry
    /// of `sizes`. With `bias`, every layer but the last carries a bias
    /// neuron.
    pub fn create_net(&mut self, sizes: &[usize], bias: bool) -> Result<()> {
        if sizes.len() < 2 {
            return Err(NetError::Config(format!(
                "a net needs at least an input and an output layer, got {} layer(s)",
                sizes.len()
            )));
        }
        if let Some(pos) = sizes.iter().position(|&s| s == 0) {
            return Err(NetError::Config(format!("layer {} has no neurons", pos)));
        }

        self.graph = Graph::new();
        let last = sizes.len() - 1;
        for (i, &size) in sizes.iter().enumerate() {
            let mut flags = match i {
                0 => LayerFlags::INPUT,
                i if i == last => LayerFlags::OUTPUT,
                _ => LayerFlags::HIDDEN,
            };
            if bias && i != last {
                flags.insert(LayerFlags::BIAS);
            }
            self.add_layer(size, flags);
        }
        for i in 0..last {
            self.connect_layers(i, i + 1, true);
        }

        info!("Created BP net {:?} ({} edges)", sizes, self.graph.edges().len());
        Ok(())
    }

    /// Compares the output layer against `expected`, stores the output
    /// deltas and returns the total error `sum(delta^2) / 2`.
    pub fn set_output(&mut self, expected: &[f32]) -> Result<f32> {
        let output = self.graph.output_layer().ok_or(NetError::LayerNotSet("output"))?;
        let size = self.graph.layer(output).len();
        if expected.len() != size {
            return Err(NetError::DimensionMismatch { expected: size, actual: expected.len() });
        }

        let mut error = 0.0;
        for (id, &target) in expected.iter().enumerate() {
            let neuron = self.graph.neuron_mut(NeuronRef::neuron(output, id));
            let delta = target - neuron.value();
            neuron.set_error_delta(delta);
            error += delta * delta / 2.0;
        }
        Ok(error)
    }

    /// Runs a forward pass on `input` and returns the output values.
    pub fn run(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.set_input(input)?;
        self.propagate_forward()?;
        self.output()
    }

    /// Trains on the bound training set for at most `cycles` cycles and
    /// returns the total error of each cycle. Stops early once a cycle's
    /// error falls below `tolerance`.
    pub fn train_from_data(&mut self, cycles: usize, tolerance: f32) -> Result<Vec<f32>> {
        self.train_with(cycles, tolerance, |_, _| true)
    }

    /// Like [`train_from_data`](Self::train_from_data), calling `observer`
    /// with (cycle, error) after every cycle. Returning `false` stops
    /// training after that cycle.
    pub fn train_with<F>(&mut self, cycles: usize, tolerance: f32, mut observer: F) -> Result<Vec<f32>>
    where
        F: FnMut(usize, f32) -> bool,
    {
        if cycles == 0 {
            return Err(NetError::Config("cycles must be positive".to_string()));
        }
        let set = self.checked_training_set()?;
        let (_, output) = designated_layers(&self.graph)?;
        let expected = self.graph.layer(output).len();
        if set.output_dim() != expected {
            return Err(NetError::DimensionMismatch { expected, actual: set.output_dim() });
        }
        check_samples(expected, (0..set.len()).map(|i| set.output(i).len()))?;

        info!(
            "Training BP net: {} samples, up to {} cycles, tolerance {}",
            set.len(),
            cycles,
            tolerance
        );

        let mut errors = Vec::with_capacity(cycles);
        for cycle in 0..cycles {
            let mut total = 0.0;
            for sample in 0..set.len() {
                self.set_input(set.input(sample))?;
                self.propagate_forward()?;
                total += self.set_output(set.output(sample))?;
                self.propagate_backward()?;
            }
            errors.push(total);
            debug!("Cycle {}: error {:.6}", cycle, total);

            if !observer(cycle, total) {
                info!("Training stopped by observer after cycle {}", cycle);
                break;
            }
            if total < tolerance {
                info!("Error {:.6} below tolerance after cycle {}", total, cycle);
                break;
            }
        }

        info!("Training complete: {} cycles", errors.len());
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{TrainingData, TrainingSet};
    use std::sync::Arc;

    fn linear_config() -> BpConfig {
        BpConfig {
            transfer: "linear".to_string(),
            learning_rate: 1.0,
            seed: Some(42),
            ..Default::default()
        }
    }

    fn linear_221() -> BpNet {
        let mut net = BpNet::new(&linear_config()).unwrap();
        net.create_net(&[2, 2, 1], false).unwrap();
        net.graph_mut().set_edges_to_value(0, 1, 0.5, true);
        net.graph_mut().set_edges_to_value(1, 2, 0.5, true);
        net
    }

    #[test]
    fn test_unknown_transfer() {
        let config = BpConfig { transfer: "relu".to_string(), ..Default::default() };
        assert!(matches!(BpNet::new(&config), Err(NetError::UnknownFunction(_))));
    }

    #[test]
    fn test_create_net_layout() {
        let mut net = BpNet::new(&BpConfig { seed: Some(1), ..Default::default() }).unwrap();
        net.create_net(&[3, 4, 2], true).unwrap();

        let graph = net.graph();
        assert_eq!(graph.layer_count(), 3);
        assert_eq!(graph.input_layer(), Some(0));
        assert_eq!(graph.output_layer(), Some(2));
        assert!(graph.layer(0).bias_neuron().is_some());
        assert!(graph.layer(2).bias_neuron().is_none());
        assert_eq!(graph.edges().len(), (3 + 1) * 4 + (4 + 1) * 2);
    }

    #[test]
    fn test_create_net_rejects_single_layer() {
        let mut net = BpNet::new(&linear_config()).unwrap();
        assert!(matches!(net.create_net(&[3], false), Err(NetError::Config(_))));
    }

    #[test]
    fn test_linear_forward_and_error() {
        let mut net = linear_221();
        let output = net.run(&[1.0, 1.0]).unwrap();
        // Each hidden neuron sees 0.5 + 0.5; the output sees 0.5 * 1 + 0.5 * 1.
        assert!((output[0] - 1.0).abs() < 1e-6);

        let error = net.set_output(&[0.0]).unwrap();
        assert!((error - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_single_cycle_reports_error() {
        let mut net = linear_221();
        let mut set = TrainingSet::new();
        set.add_sample(vec![1.0, 1.0], vec![0.0]);
        net.set_training_set(Arc::new(set));

        let errors = net.train_from_data(1, 0.0).unwrap();
        assert_eq!(errors.len(), 1);
        assert!((errors[0] - 0.5).abs() < 1e-6);

        // Output delta -1; hidden deltas 0.5 * -1 = -0.5 each.
        let hidden_out = net.graph().incoming_weights(NeuronRef::neuron(2, 0));
        for w in hidden_out {
            assert!((w - (0.5 - 1.0)).abs() < 1e-6);
        }
        let input_hidden = net.graph().incoming_weights(NeuronRef::neuron(1, 0));
        for w in input_hidden {
            assert!((w - (0.5 - 0.5)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_frozen_edges_do_not_move() {
        let mut net = linear_221();
        net.graph_mut().set_edges_to_value(0, 1, 0.5, false);
        let mut set = TrainingSet::new();
        set.add_sample(vec![1.0, 1.0], vec![0.0]);
        net.set_training_set(Arc::new(set));

        net.train_from_data(3, 0.0).unwrap();
        for id in 0..2 {
            assert_eq!(net.graph().incoming_weights(NeuronRef::neuron(1, id)), vec![0.5, 0.5]);
        }
        assert!(net.graph().incoming_weights(NeuronRef::neuron(2, 0)).iter().all(|&w| w != 0.5));
    }

    #[test]
    fn test_momentum_and_decay() {
        let config = BpConfig {
            transfer: "linear".to_string(),
            learning_rate: 0.1,
            momentum: 0.5,
            weight_decay: 0.01,
            seed: Some(7),
            ..Default::default()
        };
        let mut net = BpNet::new(&config).unwrap();
        net.create_net(&[1, 1], false).unwrap();
        net.graph_mut().set_edges_to_value(0, 1, 1.0, true);
        let mut set = TrainingSet::new();
        set.add_sample(vec![1.0], vec![2.0]);
        net.set_training_set(Arc::new(set));

        net.train_from_data(2, 0.0).unwrap();

        // Cycle 1: delta 1, m = 0.1 - 0.01 = 0.09, w = 1.09.
        // Cycle 2: delta 0.91, m = 0.091 + 0.045 - 0.0109.
        let m2 = 0.1 * 0.91 + 0.5 * 0.09 - 0.01 * 1.09;
        let w = net.graph().incoming_weights(NeuronRef::neuron(1, 0))[0];
        assert!((w - (1.09 + m2)).abs() < 1e-5);
    }

    #[test]
    fn test_training_reduces_error() {
        let config = BpConfig { learning_rate: 0.1, seed: Some(3), ..Default::default() };
        let mut net = BpNet::new(&config).unwrap();
        net.create_net(&[2, 3, 1], true).unwrap();
        let mut set = TrainingSet::new();
        set.add_sample(vec![0.0, 0.0], vec![-0.5]);
        set.add_sample(vec![1.0, 1.0], vec![0.5]);
        net.set_training_set(Arc::new(set));

        let errors = net.train_from_data(200, 0.0).unwrap();
        assert_eq!(errors.len(), 200);
        assert!(errors[199] < errors[0]);
    }

    #[test]
    fn test_tolerance_and_observer_stop_early() {
        let mut net = linear_221();
        let mut set = TrainingSet::new();
        set.add_sample(vec![1.0, 1.0], vec![0.0]);
        net.set_training_set(Arc::new(set));

        let errors = net.train_from_data(10, 1.0).unwrap();
        assert_eq!(errors.len(), 1);

        let mut seen = Vec::new();
        let errors = net
            .train_with(10, 0.0, |cycle, _| {
                seen.push(cycle);
                cycle < 2
            })
            .unwrap();
        assert_eq!(errors.len(), 3);
        assert_eq!(seen, vec![0, 1, 2]);
    }

    /// A set whose reported sizes do not hold for every sample.
    struct RaggedSet {
        inputs: Vec<Vec<f32>>,
        outputs: Vec<Vec<f32>>,
    }

    impl TrainingData for RaggedSet {
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
            self.inputs[0].len()
        }

        fn output_dim(&self) -> usize {
            self.outputs[0].len()
        }
    }

    #[test]
    fn test_ragged_set_moves_no_weights() {
        let mut net = linear_221();
        net.set_training_set(Arc::new(RaggedSet {
            inputs: vec![vec![1.0, 1.0], vec![1.0]],
            outputs: vec![vec![0.0], vec![0.0]],
        }));
        assert!(matches!(
            net.train_from_data(1, 0.0),
            Err(NetError::DimensionMismatch { expected: 2, actual: 1 })
        ));

        net.set_training_set(Arc::new(RaggedSet {
            inputs: vec![vec![1.0, 1.0], vec![1.0, 1.0]],
            outputs: vec![vec![0.0], vec![0.0, 1.0]],
        }));
        assert!(matches!(
            net.train_from_data(1, 0.0),
            Err(NetError::DimensionMismatch { expected: 1, actual: 2 })
        ));

        for layer in 1..3 {
            for w in net.graph().incoming_weights(NeuronRef::neuron(layer, 0)) {
                assert_eq!(w, 0.5);
            }
        }
    }

    #[test]
    fn test_training_preconditions() {
        let mut net = linear_221();
        assert!(matches!(net.train_from_data(1, 0.0), Err(NetError::MissingTrainingSet)));

        let mut set = TrainingSet::new();
        set.add_sample(vec![1.0, 1.0, 1.0], vec![0.0]);
        net.set_training_set(Arc::new(set));
        assert!(matches!(
            net.train_from_data(1, 0.0),
            Err(NetError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(matches!(net.train_from_data(0, 0.0), Err(NetError::Config(_))));
    }
}
