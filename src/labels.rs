//! Label data returned by the label-detection service and the vehicle
//! vocabulary the pipeline counts against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A detected concept returned by the label service.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Label {
    pub name: String,
    /// Service confidence, 0-100.
    pub confidence: f64,
    /// Localized occurrences. Most abstract labels ("Road", "City") have none.
    #[serde(default)]
    pub instances: Vec<Instance>,
}

impl Label {
    /// Vehicle type for this label, when the name is in the vocabulary.
    pub fn vehicle_type(&self) -> Option<VehicleType> {
        VehicleType::from_label(&self.name)
    }
}

/// One occurrence of a label inside the image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Box as fractions of the image size.
///
/// Values are expected in `0.0..=1.0` but are not checked: the service is
/// trusted and out-of-range boxes are carried through to rendering as-is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Closed vehicle vocabulary, in report column order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VehicleType {
    Car,
    Truck,
    Bicycle,
    Bus,
    Motorcycle,
}

impl VehicleType {
    pub const ALL: [VehicleType; 5] = [
        VehicleType::Car,
        VehicleType::Truck,
        VehicleType::Bicycle,
        VehicleType::Bus,
        VehicleType::Motorcycle,
    ];

    /// Label name exactly as the service reports it.
    pub fn label_name(self) -> &'static str {
        match self {
            VehicleType::Car => "Car",
            VehicleType::Truck => "Truck",
            VehicleType::Bicycle => "Bicycle",
            VehicleType::Bus => "Bus",
            VehicleType::Motorcycle => "Motorcycle",
        }
    }

    /// Case-sensitive lookup; "car" is not a vehicle label.
    pub fn from_label(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.label_name() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label_name())
    }
}

/// Instance counts per vehicle type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VehicleCount {
    counts: [u64; VehicleType::ALL.len()],
}

impl VehicleCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, vehicle: VehicleType) -> u64 {
        self.counts[vehicle.index()]
    }

    pub fn add(&mut self, vehicle: VehicleType, n: u64) {
        self.counts[vehicle.index()] += n;
    }

    /// Adds every per-type count of `other` into `self`.
    pub fn accumulate(&mut self, other: &VehicleCount) {
        for (total, n) in self.counts.iter_mut().zip(other.counts.iter()) {
            *total += n;
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }

    /// `(type, count)` pairs in vocabulary order, zeros included.
    pub fn iter(&self) -> impl Iterator<Item = (VehicleType, u64)> + '_ {
        VehicleType::ALL.into_iter().map(|v| (v, self.get(v)))
    }
}

/// Response body of a `DetectLabels` call. Only the labels are kept.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectLabelsOutput {
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_lookup_is_case_sensitive() {
        assert_eq!(VehicleType::from_label("Bus"), Some(VehicleType::Bus));
        assert_eq!(VehicleType::from_label("bus"), None);
        assert_eq!(VehicleType::from_label("Vehicle"), None);
    }

    #[test]
    fn parses_service_label_json() {
        let raw = r#"{
            "Labels": [
                {
                    "Name": "Car",
                    "Confidence": 99.41,
                    "Instances": [
                        {"BoundingBox": {"Width": 0.2, "Height": 0.1, "Left": 0.3, "Top": 0.4}, "Confidence": 98.0}
                    ],
                    "Parents": [{"Name": "Vehicle"}]
                },
                {"Name": "Road", "Confidence": 80.0}
            ],
            "LabelModelVersion": "3.0"
        }"#;
        let out: DetectLabelsOutput = serde_json::from_str(raw).expect("parse labels");
        assert_eq!(out.labels.len(), 2);
        assert_eq!(out.labels[0].vehicle_type(), Some(VehicleType::Car));
        assert_eq!(out.labels[0].instances[0].bounding_box.left, 0.3);
        assert!(out.labels[1].instances.is_empty());
    }

    #[test]
    fn accumulate_sums_per_type() {
        let mut a = VehicleCount::new();
        a.add(VehicleType::Car, 2);
        let mut b = VehicleCount::new();
        b.add(VehicleType::Car, 1);
        b.add(VehicleType::Truck, 4);
        a.accumulate(&b);
        assert_eq!(a.get(VehicleType::Car), 3);
        assert_eq!(a.get(VehicleType::Truck), 4);
        assert_eq!(a.total(), 7);
    }
}
