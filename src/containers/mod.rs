//! Float containers used to move weights and positions in and out of the
//! graph, and the training-set read interface.

pub mod array2d;
pub mod array3d;
mod training_set;

pub use array2d::{Array2DView, Array2DViewMut, F2DArray};
pub use array3d::F3DArray;
pub use training_set::{TrainingData, TrainingSet};
