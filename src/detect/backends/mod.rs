pub mod fixture;
pub mod rekognition;

pub use fixture::FixtureDetector;
pub use rekognition::RekognitionDetector;
