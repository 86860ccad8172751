//! Traffic Labels
//!
//! Counts vehicles in images stored in S3 using Rekognition label detection.
//!
//! # Architecture
//!
//! Two entry points share the same building blocks:
//!
//! 1. **Batch labeler** (`label_bucket`): list a bucket, detect labels for
//!    every object, draw boxes on local copies and export per-image vehicle
//!    counts to a spreadsheet.
//! 2. **Upload handler** (`label_event`): on an S3 upload notification,
//!    detect labels for the new object and write one row per label to a
//!    label table.
//!
//! Every external service sits behind a trait with an AWS implementation and
//! a local one, so both entry points also run offline.
//!
//! # Module Structure
//!
//! - `labels`: label data model and the vehicle vocabulary
//! - `filter`: labels to per-type vehicle counts
//! - `render`: bounding-box geometry and image annotation
//! - `report`: running totals and the `.xlsx` export
//! - `store`: object stores (S3, local directory)
//! - `detect`: label detectors (Rekognition, canned fixtures)
//! - `storage`: label tables (DynamoDB, SQLite, memory)
//! - `event`: upload notification handler and the Lambda runtime client
//! - `pipeline`: the batch run
//! - `aws`: SigV4-signed blocking HTTP client
//! - `config`: `LabelerConfig` loading and validation

pub mod aws;
pub mod config;
pub mod detect;
pub mod event;
pub mod filter;
pub mod labels;
pub mod pipeline;
pub mod render;
pub mod report;
pub mod storage;
pub mod store;

pub use config::LabelerConfig;
pub use detect::{FixtureDetector, ImageRef, LabelDetector, RekognitionDetector};
pub use event::{handle_upload_event, parse_upload_event, HandlerResponse, UploadEvent};
pub use filter::filter_vehicle_labels;
pub use labels::{BoundingBox, Instance, Label, VehicleCount, VehicleType};
pub use pipeline::{process_bucket, process_bucket_with, BatchObserver, BatchOutcome};
pub use render::{PixelBox, Renderer};
pub use report::{ResultRow, VehicleReport};
pub use storage::{
    DynamoLabelTable, InMemoryLabelTable, LabelRecord, LabelTable, SqliteLabelTable,
};
pub use store::{FilesystemObjectStore, ObjectStore, ObjectSummary, S3ObjectStore};
