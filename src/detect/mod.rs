mod backend;
mod backends;

pub use backend::{ImageRef, LabelDetector};
pub use backends::{FixtureDetector, RekognitionDetector};
