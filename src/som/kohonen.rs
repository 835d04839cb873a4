//! Kohonen self-organizing maps with a conscience bias.
//!
//! Each presented input goes through three steps:
//!
//! 1. **BMU search**: every output neuron computes its Euclidean distance to
//!    the input; the neuron with the smallest conscience-adjusted distance
//!    wins, ties going to the lowest id.
//! 2. **Adaptation**: every output neuron moves its incoming weights toward
//!    the input by `influence * lr(t)`, where the influence depends on its
//!    lattice distance to the BMU and the current radius `sigma(t)`.
//! 3. **Conscience**: the winner's conscience moves toward 1, everyone
//!    else's toward 0, making frequent winners less attractive.

use super::kernels::{self, BestMatch};
use crate::config::{rng_from_seed, SomConfig};
use crate::containers::F2DArray;
use crate::error::{NetError, Result};
use crate::graph::{lattice_distance, Graph, LayerFlags, NeuronKind, NeuronRef, SomState};
use crate::math::{resolve_distance, DistanceFunction};
use crate::net::{designated_layers, Algorithm, Net, NetKind};
use log::{debug, info};
use rand::Rng;

/// The Kohonen algorithm and its hyperparameters.
#[derive(Debug, Clone)]
pub struct Kohonen {
    pub(crate) distance: &'static DistanceFunction,
    pub(crate) learning_rate: f32,
    pub(crate) conscience_rate: f32,
    pub(crate) sigma0: f32,
    pub(crate) configured_sigma0: Option<f32>,
    pub(crate) lambda: Option<f32>,
}

impl Kohonen {
    /// Builds the algorithm from a configuration.
    pub fn from_config(config: &SomConfig) -> Result<Self> {
        let distance = resolve_distance(&config.distance)
            .ok_or_else(|| NetError::UnknownFunction(config.distance.clone()))?;
        let algorithm = Self {
            distance,
            learning_rate: config.learning_rate,
            conscience_rate: config.conscience_rate,
            sigma0: config.sigma0.unwrap_or(1.0),
            configured_sigma0: config.sigma0,
            lambda: config.lambda,
        };
        algorithm.validate()?;
        Ok(algorithm)
    }

    /// Checks that the hyperparameters give a finite schedule.
    pub(crate) fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.conscience_rate) {
            return Err(NetError::Config(format!(
                "conscience rate {} outside [0, 1)",
                self.conscience_rate
            )));
        }
        if !self.learning_rate.is_finite() {
            return Err(NetError::Config("learning rate must be finite".to_string()));
        }
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !positive(self.sigma0) || !self.configured_sigma0.map_or(true, positive) {
            return Err(NetError::Config("sigma0 must be positive".to_string()));
        }
        if !self.lambda.map_or(true, positive) {
            return Err(NetError::Config("lambda must be positive".to_string()));
        }
        Ok(())
    }

    /// Neighborhood function.
    pub fn distance_function(&self) -> &'static DistanceFunction {
        self.distance
    }

    /// Initial learning rate.
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Conscience rate.
    pub fn conscience_rate(&self) -> f32 {
        self.conscience_rate
    }

    /// Initial neighborhood radius.
    pub fn sigma0(&self) -> f32 {
        self.sigma0
    }

    /// Time constant of the radius decay for a run of `cycles` cycles.
    pub fn lambda(&self, cycles: usize) -> f32 {
        self.lambda.unwrap_or_else(|| {
            let log_sigma = self.sigma0.ln();
            if log_sigma > 0.0 {
                cycles as f32 / log_sigma
            } else {
                cycles as f32
            }
        })
    }

    /// (sigma, learning rate) of cycle `cycle` out of `cycles`.
    pub fn schedule(&self, cycle: usize, cycles: usize, lambda: f32) -> (f32, f32) {
        let t = cycle as f32;
        let sigma = (self.distance.decay)(self.sigma0, t, lambda);
        let lr = (self.distance.decay)(self.learning_rate, t, cycles as f32);
        (sigma, lr)
    }
}

impl Algorithm for Kohonen {
    fn kind(&self) -> NetKind {
        NetKind::Som
    }

    fn neuron_kind(&self) -> NeuronKind {
        NeuronKind::Som(SomState::default())
    }

    /// The value of a SOM neuron is the Euclidean distance between its
    /// weights and the values of its sources.
    fn calc_value(&self, graph: &mut Graph, at: NeuronRef) {
        let (weights, input): (Vec<f32>, Vec<f32>) = graph
            .neuron(at)
            .incoming()
            .iter()
            .map(|&id| {
                let edge = graph.edge(id);
                (edge.weight(), graph.neuron(edge.first()).value())
            })
            .unzip();
        graph.neuron_mut(at).value = kernels::euclidean_distance(&weights, &input);
    }

    fn adapt_edges(&self, graph: &mut Graph, at: NeuronRef) {
        let neuron = graph.neuron(at);
        let Some(state) = neuron.som_state() else {
            return;
        };
        let factor = state.influence * state.learning_rate;
        let edges = neuron.incoming().to_vec();

        for id in edges {
            if !graph.edge(id).is_adaptable() {
                continue;
            }
            let input = graph.neuron(graph.edge(id).first()).value();
            let edge = graph.edge_mut(id);
            edge.set_weight(kernels::adapt_weight(edge.weight(), input, factor));
        }
    }

    fn propagate_backward(&self, graph: &mut Graph) -> Result<()> {
        let (input, output) = designated_layers(graph)?;
        for layer in input + 1..=output {
            for id in 0..graph.layer(layer).len() {
                self.adapt_edges(graph, NeuronRef::neuron(layer, id));
            }
        }
        Ok(())
    }
}

/// Per-cycle history of a SOM training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingMetrics {
    /// Mean distance between each input and its BMU.
    pub quantization_errors: Vec<f32>,
    /// Neighborhood radii used.
    pub sigmas: Vec<f32>,
    /// Learning rates used.
    pub learning_rates: Vec<f32>,
}

impl TrainingMetrics {
    pub(crate) fn record(&mut self, quantization_error: f32, sigma: f32, learning_rate: f32) {
        self.quantization_errors.push(quantization_error);
        self.sigmas.push(sigma);
        self.learning_rates.push(learning_rate);
    }

    /// Number of recorded cycles.
    pub fn cycles(&self) -> usize {
        self.quantization_errors.len()
    }

    /// Quantization error of the last cycle.
    pub fn final_quantization_error(&self) -> Option<f32> {
        self.quantization_errors.last().copied()
    }
}

/// A self-organizing map.
pub type SomNet = Net<Kohonen>;

impl Net<Kohonen> {
    /// Creates an empty SOM.
    pub fn new(config: &SomConfig) -> Result<Self> {
        let algorithm = Kohonen::from_config(config)?;
        Ok(Net::with_algorithm(algorithm, rng_from_seed(config.seed)))
    }

    /// Builds an input lattice fully connected to an output lattice, with
    /// weights uniform in [0, 1). Unless configured, the initial radius is
    /// half the largest output extent, at least 1.
    pub fn create_som(&mut self, input_dims: &[usize], output_dims: &[usize]) -> Result<()> {
        for (name, dims) in [("input", input_dims), ("output", output_dims)] {
            if dims.is_empty() || dims.contains(&0) {
                return Err(NetError::Config(format!("invalid {} lattice {:?}", name, dims)));
            }
        }

        self.graph = Graph::new();
        self.add_lattice_layer(input_dims, LayerFlags::INPUT);
        self.add_lattice_layer(output_dims, LayerFlags::OUTPUT);
        let rng = &mut self.rng;
        self.graph.connect_layers_with(0, 1, true, || rng.gen::<f32>());

        let largest = output_dims.iter().copied().max().unwrap_or(1) as f32;
        self.algorithm.sigma0 = self.algorithm.configured_sigma0.unwrap_or((largest / 2.0).max(1.0));

        info!(
            "Created SOM {:?} -> {:?} (sigma0 = {})",
            input_dims, output_dims, self.algorithm.sigma0
        );
        Ok(())
    }

    /// Like [`create_som`](Self::create_som), seeding the map from an edge
    /// matrix (one row of input weights per output neuron) and a position
    /// matrix (one row of lattice coordinates per output neuron).
    pub fn create_som_with(
        &mut self,
        input_dims: &[usize],
        output_dims: &[usize],
        edges: &F2DArray,
        positions: &F2DArray,
    ) -> Result<()> {
        let inputs: usize = input_dims.iter().product();
        let outputs: usize = output_dims.iter().product();
        for (expected, actual) in [
            (inputs, edges.width()),
            (outputs, edges.height()),
            (output_dims.len(), positions.width()),
            (outputs, positions.height()),
        ] {
            if expected != actual {
                return Err(NetError::DimensionMismatch { expected, actual });
            }
        }

        self.create_som(input_dims, output_dims)?;
        self.graph.import_edges_in(1, edges, 0);
        self.graph.import_positions(1, positions, 0);
        Ok(())
    }

    /// Sets the conscience rate. Zero gives the classical Kohonen rule.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is outside [0, 1).
    pub fn set_conscience_rate(&mut self, rate: f32) {
        assert!((0.0..1.0).contains(&rate), "conscience rate {} outside [0, 1)", rate);
        self.algorithm.conscience_rate = rate;
    }

    /// Conscience rate.
    pub fn conscience_rate(&self) -> f32 {
        self.algorithm.conscience_rate
    }

    /// Sets the initial learning rate.
    pub fn set_learning_rate(&mut self, rate: f32) {
        self.algorithm.learning_rate = rate;
    }

    /// Initial neighborhood radius.
    pub fn sigma0(&self) -> f32 {
        self.algorithm.sigma0
    }

    /// Id of the best-matching output neuron for `input`.
    pub fn find_bmu(&mut self, input: &[f32]) -> Result<usize> {
        Ok(self.locate_bmu(input)?.index)
    }

    fn locate_bmu(&mut self, input: &[f32]) -> Result<BestMatch> {
        self.set_input(input)?;
        self.propagate_forward()?;
        let (_, output) = designated_layers(&self.graph)?;
        let layer = self.graph.layer(output);
        kernels::best_match(
            layer.neurons().iter().map(|n| (n.value(), n.conscience())),
            self.algorithm.conscience_rate,
            layer.len(),
        )
        .ok_or_else(|| NetError::Config("output layer is empty".to_string()))
    }

    /// Presents one input and returns the plain distance to its BMU.
    fn present(&mut self, input: &[f32], sigma: f32, lr: f32) -> Result<f32> {
        let bmu = self.locate_bmu(input)?;
        let (_, output) = designated_layers(&self.graph)?;
        let distance = self.algorithm.distance;
        let rate = self.algorithm.conscience_rate;

        let layer = self.graph.layer_mut(output);
        let bmu_position = layer.neurons[bmu.index].position.clone();
        for neuron in &mut layer.neurons {
            let influence = (distance.distance)(lattice_distance(&neuron.position, &bmu_position), sigma);
            let won = neuron.id == bmu.index;
            if let Some(state) = neuron.som_state_mut() {
                state.influence = influence;
                state.learning_rate = lr;
                state.conscience = kernels::conscience_step(state.conscience, rate, won);
            }
        }

        self.propagate_backward()?;
        Ok(bmu.distance)
    }

    /// Trains on the bound training set for `cycles` cycles, presenting the
    /// samples in order.
    pub fn training(&mut self, cycles: usize) -> Result<TrainingMetrics> {
        if cycles == 0 {
            return Err(NetError::Config("cycles must be positive".to_string()));
        }
        let set = self.checked_training_set()?;
        let lambda = self.algorithm.lambda(cycles);

        info!(
            "Training SOM: {} samples, {} cycles, sigma0 = {}, lambda = {}",
            set.len(),
            cycles,
            self.algorithm.sigma0,
            lambda
        );

        let mut metrics = TrainingMetrics::default();
        for cycle in 0..cycles {
            let (sigma, lr) = self.algorithm.schedule(cycle, cycles, lambda);
            let mut error = 0.0;
            for sample in 0..set.len() {
                error += self.present(set.input(sample), sigma, lr)?;
            }
            let qe = error / set.len() as f32;
            metrics.record(qe, sigma, lr);
            debug!("Cycle {}: sigma={:.4}, lr={:.4}, qe={:.6}", cycle, sigma, lr, qe);
        }

        info!("SOM training completed");
        Ok(metrics)
    }
}
