//! Partitioned SOM training over several execution units.
//!
//! The output layer is cut into contiguous neuron ranges, one per
//! enumerated unit; ranges whose unit cannot be acquired are left out. Each partition gets a private copy of its rows (incoming weights,
//! positions, conscience); training then alternates two phases per input:
//!
//! 1. every partition reports its local BMU (in parallel);
//! 2. the global BMU is the minimum by (adjusted distance, unit index,
//!    neuron id), after which every partition adapts its rows (in parallel).
//!
//! After the last cycle the rows are merged back into the graph.

use super::kernels;
use super::kohonen::{Kohonen, SomNet, TrainingMetrics};
use crate::config::ParallelConfig;
use crate::containers::{F2DArray, TrainingData};
use crate::error::{NetError, Result};
use crate::graph::lattice_distance;
use crate::net::designated_layers;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::ops::Range;

/// A unit partitions can be scheduled on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionUnit {
    index: usize,
    name: String,
}

impl ExecutionUnit {
    /// Creates a unit.
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self { index, name: name.into() }
    }

    /// Position of the unit in its enumerator.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Source of execution units.
pub trait DeviceEnumerator: Send + Sync {
    /// Number of units that may be selected.
    fn unit_count(&self) -> usize;

    /// Acquires unit `index`.
    fn select(&self, index: usize) -> Result<ExecutionUnit>;
}

/// Logical CPU units; partitions run on the rayon pool.
#[derive(Debug, Clone)]
pub struct CpuUnits {
    count: usize,
}

impl CpuUnits {
    /// `num_units` units, or one per rayon worker thread when 0.
    pub fn new(num_units: usize) -> Self {
        let count = if num_units == 0 { rayon::current_num_threads() } else { num_units };
        Self { count }
    }

    /// Units as configured.
    pub fn from_config(config: &ParallelConfig) -> Self {
        Self::new(config.num_units)
    }
}

impl Default for CpuUnits {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeviceEnumerator for CpuUnits {
    fn unit_count(&self) -> usize {
        self.count
    }

    fn select(&self, index: usize) -> Result<ExecutionUnit> {
        if index >= self.count {
            return Err(NetError::UnitUnavailable {
                index,
                reason: format!("only {} CPU units", self.count),
            });
        }
        Ok(ExecutionUnit::new(index, format!("cpu-{}", index)))
    }
}

/// A neuron range assigned to a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkPartition {
    /// Output neuron ids covered.
    pub range: Range<usize>,
    /// Unit the range runs on.
    pub unit: ExecutionUnit,
}

/// Splits `neurons` output neurons into contiguous ranges, one per
/// enumerated unit (at most one unit per neuron). The first
/// `neurons % units` ranges get one extra neuron. A unit that fails to
/// select loses its range: those neurons sit out the run untouched.
pub fn plan_partitions(neurons: usize, devices: &dyn DeviceEnumerator) -> Result<Vec<WorkPartition>> {
    if neurons == 0 {
        return Err(NetError::Config("nothing to partition".to_string()));
    }
    let count = devices.unit_count().min(neurons);
    if count == 0 {
        return Err(NetError::Config("no execution unit available".to_string()));
    }

    let base = neurons / count;
    let extra = neurons % count;
    let mut partitions = Vec::with_capacity(count);
    let mut start = 0;
    for index in 0..count {
        let len = base + usize::from(index < extra);
        let range = start..start + len;
        start += len;
        match devices.select(index) {
            Ok(unit) => partitions.push(WorkPartition { range, unit }),
            Err(e) => warn!("Skipping execution unit {} and neurons {:?}: {}", index, range, e),
        }
    }
    if partitions.is_empty() {
        return Err(NetError::Config("no execution unit could be acquired".to_string()));
    }
    Ok(partitions)
}

/// Private copy of a partition's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionExport {
    /// Output neuron ids covered.
    pub range: Range<usize>,
    /// Unit the rows are trained on.
    pub unit: ExecutionUnit,
    /// Incoming weights, one row per neuron.
    pub edges: F2DArray,
    /// Lattice positions, one row per neuron.
    pub positions: F2DArray,
    /// Conscience per neuron.
    pub conscience: Vec<f32>,
}

impl PartitionExport {
    fn local_bmu(&self, input: &[f32], rate: f32, total: usize) -> Option<Candidate> {
        let rows = (0..self.edges.height())
            .map(|row| (kernels::euclidean_distance(self.edges.row_slice(row), input), self.conscience[row]));
        kernels::best_match(rows, rate, total).map(|m| Candidate {
            adjusted: m.adjusted,
            distance: m.distance,
            unit: self.unit.index(),
            neuron: self.range.start + m.index,
            position: self.positions.row(m.index),
        })
    }

    fn adapt(&mut self, input: &[f32], bmu: &Candidate, step: &Step<'_>) {
        for row in 0..self.edges.height() {
            let lattice = lattice_distance(self.positions.row_slice(row), &bmu.position);
            let influence = (step.algorithm.distance.distance)(lattice, step.sigma);
            kernels::update_weights(self.edges.row_slice_mut(row), input, influence * step.lr);

            let won = self.range.start + row == bmu.neuron;
            self.conscience[row] = kernels::conscience_step(self.conscience[row], step.algorithm.conscience_rate, won);
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    adjusted: f32,
    distance: f32,
    unit: usize,
    neuron: usize,
    position: Vec<f32>,
}

struct Step<'a> {
    algorithm: &'a Kohonen,
    sigma: f32,
    lr: f32,
}

/// Trains exported partitions for `cycles` cycles over `data`. `neurons`
/// is the size of the whole output layer, used for the conscience bias.
pub fn train_partitions(
    algorithm: &Kohonen,
    partitions: &mut [PartitionExport],
    data: &dyn TrainingData,
    neurons: usize,
    cycles: usize,
) -> Result<TrainingMetrics> {
    let lambda = algorithm.lambda(cycles);
    let mut metrics = TrainingMetrics::default();

    for cycle in 0..cycles {
        let (sigma, lr) = algorithm.schedule(cycle, cycles, lambda);
        let step = Step { algorithm, sigma, lr };
        let mut error = 0.0;

        for sample in 0..data.len() {
            let input = data.input(sample);
            let candidates: Vec<Candidate> = partitions
                .par_iter()
                .filter_map(|p| p.local_bmu(input, algorithm.conscience_rate, neurons))
                .collect();
            let bmu = candidates
                .into_iter()
                .min_by(|a, b| {
                    a.adjusted
                        .total_cmp(&b.adjusted)
                        .then(a.unit.cmp(&b.unit))
                        .then(a.neuron.cmp(&b.neuron))
                })
                .ok_or_else(|| NetError::Config("no partition to train".to_string()))?;

            partitions.par_iter_mut().for_each(|p| p.adapt(input, &bmu, &step));
            error += bmu.distance;
        }

        let qe = error / data.len() as f32;
        metrics.record(qe, sigma, lr);
        debug!("Parallel cycle {}: sigma={:.4}, lr={:.4}, qe={:.6}", cycle, sigma, lr, qe);
    }
    Ok(metrics)
}

impl SomNet {
    /// Copies the rows of every partition out of the output layer. Every
    /// output neuron must be fully connected to the input layer through
    /// adaptable edges.
    pub fn split_partitions(&self, partitions: &[WorkPartition]) -> Result<Vec<PartitionExport>> {
        let (input, output) = designated_layers(&self.graph)?;
        let expected = self.graph.layer(input).len();
        if let Some(neuron) = self.graph.layer(output).neurons().iter().find(|n| n.incoming().len() != expected) {
            return Err(NetError::DimensionMismatch { expected, actual: neuron.incoming().len() });
        }
        let frozen = self.graph.layer(output).neurons().iter().any(|n| {
            n.incoming().iter().any(|&e| !self.graph.edge(e).is_adaptable())
        });
        if frozen {
            return Err(NetError::Config("partitioned training needs adaptable edges".to_string()));
        }

        Ok(partitions
            .iter()
            .map(|p| PartitionExport {
                range: p.range.clone(),
                unit: p.unit.clone(),
                edges: self.graph.export_edges_in(output, p.range.clone()),
                positions: self.graph.export_positions(output, p.range.clone()),
                conscience: self.graph.export_conscience(output, p.range.clone()),
            })
            .collect())
    }

    /// Writes trained rows back into the output layer.
    pub fn merge_partitions(&mut self, partitions: &[PartitionExport]) -> Result<()> {
        let (_, output) = designated_layers(&self.graph)?;
        for p in partitions {
            self.graph.import_edges_in(output, &p.edges, p.range.start);
            self.graph.import_conscience(output, &p.conscience, p.range.start);
        }
        Ok(())
    }

    /// Trains like [`SomNet::training`], with the output layer partitioned
    /// over the units of `devices`.
    pub fn training_parallel(&mut self, cycles: usize, devices: &dyn DeviceEnumerator) -> Result<TrainingMetrics> {
        if cycles == 0 {
            return Err(NetError::Config("cycles must be positive".to_string()));
        }
        let set = self.checked_training_set()?;
        let (_, output) = designated_layers(&self.graph)?;

        let neurons = self.graph.layer(output).len();
        let plan = plan_partitions(neurons, devices)?;
        info!(
            "Training SOM on {} partitions: {} samples, {} cycles",
            plan.len(),
            set.len(),
            cycles
        );

        let mut partitions = self.split_partitions(&plan)?;
        let metrics = train_partitions(&self.algorithm, &mut partitions, &*set, neurons, cycles)?;
        self.merge_partitions(&partitions)?;

        info!("Parallel SOM training completed");
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SomConfig;
    use crate::containers::TrainingSet;
    use std::sync::Arc;

    /// Units whose odd indices are busy.
    struct FlakyUnits(usize);

    impl DeviceEnumerator for FlakyUnits {
        fn unit_count(&self) -> usize {
            self.0
        }

        fn select(&self, index: usize) -> Result<ExecutionUnit> {
            if index % 2 == 1 {
                Err(NetError::UnitUnavailable { index, reason: "busy".to_string() })
            } else {
                Ok(ExecutionUnit::new(index, "flaky"))
            }
        }
    }

    fn trained_pair(conscience: f32) -> (SomNet, SomNet) {
        let config = SomConfig { seed: Some(21), conscience_rate: conscience, ..Default::default() };
        let mut set = TrainingSet::new();
        for i in 0..8 {
            let t = i as f32 / 8.0;
            set.add_input(vec![t, 1.0 - t, (t * 3.0).fract()]);
        }
        let set = Arc::new(set);

        let mut a = SomNet::new(&config).unwrap();
        a.create_som(&[3], &[5, 3]).unwrap();
        a.set_training_set(set.clone());
        let mut b = SomNet::new(&config).unwrap();
        b.create_som(&[3], &[5, 3]).unwrap();
        b.set_training_set(set);
        (a, b)
    }

    #[test]
    fn test_plan_covers_all_neurons() {
        let plan = plan_partitions(10, &CpuUnits::new(4)).unwrap();
        let lens: Vec<usize> = plan.iter().map(|p| p.range.len()).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
        assert_eq!(plan[0].range.start, 0);
        assert_eq!(plan[3].range.end, 10);
        assert!(plan.windows(2).all(|w| w[0].range.end == w[1].range.start));
    }

    #[test]
    fn test_units_from_config() {
        let units = CpuUnits::from_config(&ParallelConfig { num_units: 3 });
        assert_eq!(units.unit_count(), 3);
        assert_eq!(units.select(1).unwrap().name(), "cpu-1");
        assert_eq!(CpuUnits::default().unit_count(), rayon::current_num_threads());
    }

    #[test]
    fn test_plan_never_exceeds_neurons() {
        let plan = plan_partitions(3, &CpuUnits::new(8)).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|p| p.range.len() == 1));
    }

    #[test]
    fn test_plan_skips_failing_units() {
        let plan = plan_partitions(9, &FlakyUnits(6)).unwrap();
        let units: Vec<usize> = plan.iter().map(|p| p.unit.index()).collect();
        assert_eq!(units, vec![0, 2, 4]);
        let ranges: Vec<Range<usize>> = plan.iter().map(|p| p.range.clone()).collect();
        assert_eq!(ranges, vec![0..2, 4..6, 7..8]);
    }

    #[test]
    fn test_failed_unit_keeps_its_range() {
        let plan = plan_partitions(9, &FlakyUnits(3)).unwrap();
        let ranges: Vec<(usize, Range<usize>)> = plan.iter().map(|p| (p.unit.index(), p.range.clone())).collect();
        assert_eq!(ranges, vec![(0, 0..3), (2, 6..9)]);
    }

    #[test]
    fn test_plan_without_units_fails() {
        assert!(plan_partitions(4, &FlakyUnits(0)).is_err());
        assert!(plan_partitions(4, &FlakyUnits(1)).is_ok());
        assert!(matches!(plan_partitions(0, &CpuUnits::new(2)), Err(NetError::Config(_))));
        assert!(matches!(CpuUnits::new(2).select(2), Err(NetError::UnitUnavailable { index: 2, .. })));
    }

    #[test]
    fn test_split_merge_is_identity() {
        let (mut net, _) = trained_pair(0.0);
        let before_edges = net.graph().export_edges_in(1, 0..15);
        let before_positions = net.graph().export_positions(1, 0..15);

        let plan = plan_partitions(15, &CpuUnits::new(4)).unwrap();
        let mut parts = net.split_partitions(&plan).unwrap();
        let set = net.training_set().unwrap().clone();
        train_partitions(net.algorithm(), &mut parts, &*set, 15, 0).unwrap();
        net.merge_partitions(&parts).unwrap();

        assert_eq!(net.graph().export_edges_in(1, 0..15), before_edges);
        assert_eq!(net.graph().export_positions(1, 0..15), before_positions);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        for conscience in [0.0, 0.3] {
            let (mut sequential, mut parallel) = trained_pair(conscience);
            let expected = sequential.training(4).unwrap();
            let metrics = parallel.training_parallel(4, &CpuUnits::new(3)).unwrap();

            let a = sequential.graph().export_edges_in(1, 0..15);
            let b = parallel.graph().export_edges_in(1, 0..15);
            for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
                assert!((x - y).abs() < 1e-5);
            }
            let ca = sequential.graph().export_conscience(1, 0..15);
            let cb = parallel.graph().export_conscience(1, 0..15);
            for (x, y) in ca.iter().zip(&cb) {
                assert!((x - y).abs() < 1e-5);
            }
            assert_eq!(metrics.sigmas, expected.sigmas);
        }
    }

    #[test]
    fn test_skipped_units_leave_their_neurons_untouched() {
        let (_, mut net) = trained_pair(0.2);
        let before = net.graph().export_edges_in(1, 0..15);
        let conscience = net.graph().export_conscience(1, 0..15);

        // Five ranges of three neurons; units 1 and 3 are busy.
        net.training_parallel(3, &FlakyUnits(5)).unwrap();

        let after = net.graph().export_edges_in(1, 0..15);
        let trained = net.graph().export_conscience(1, 0..15);
        for id in 0..15 {
            let skipped = (3..6).contains(&id) || (9..12).contains(&id);
            if skipped {
                assert_eq!(after.row(id), before.row(id));
                assert_eq!(trained[id], conscience[id]);
            } else {
                assert_ne!(after.row(id), before.row(id));
            }
        }
    }

    #[test]
    fn test_unconnected_output_is_reported() {
        let (mut net, _) = trained_pair(0.0);
        net.resize_layer(1, &[4]);
        // The single-unit path tolerates the missing edges.
        assert!(net.training(1).is_ok());
        assert!(matches!(
            net.training_parallel(1, &CpuUnits::new(2)),
            Err(NetError::DimensionMismatch { expected: 3, actual: 0 })
        ));

        net.connect_layers(0, 1, true);
        assert!(net.training_parallel(1, &CpuUnits::new(2)).is_ok());
    }
}
