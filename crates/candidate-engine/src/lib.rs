pub mod types;
pub mod normalizer;
pub mod shape;
pub mod scorer;
pub mod risk;

pub use types::*;
pub use normalizer::{normalize, short_pool};
pub use shape::{classify_shape, ShapeInputs, SHAPE_RULES};
pub use scorer::compute_score;
pub use risk::compute_risk;
