use crate::labels::{Label, VehicleCount};

/// Counts vehicle instances per type.
///
/// Labels outside the vehicle vocabulary are ignored. A vehicle label with no
/// instances contributes nothing, even at high confidence.
pub fn filter_vehicle_labels(labels: &[Label]) -> VehicleCount {
    let mut count = VehicleCount::new();
    for label in labels {
        if let Some(vehicle) = label.vehicle_type() {
            count.add(vehicle, label.instances.len() as u64);
        }
    }
    count
}
