//! Per-image vehicle counts, running totals and the spreadsheet export.

use anyhow::{Context, Result};
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;

use crate::labels::{VehicleCount, VehicleType};

pub const PHOTO_COLUMN: &str = "Photo";
pub const TOTAL_COLUMN: &str = "Total";
pub const TOTAL_PER_TYPE_ROW: &str = "Total per Type";
pub const TOTAL_VEHICLES_ROW: &str = "Total Vehicles";

/// Counts for one processed image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultRow {
    pub photo: String,
    pub counts: VehicleCount,
}

/// One line of the exported table. Per-image rows and the per-type trailer
/// carry counts. The grand-total trailer carries only `total`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLine {
    pub photo: String,
    pub counts: Option<VehicleCount>,
    pub total: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct VehicleReport {
    rows: Vec<ResultRow>,
    totals: VehicleCount,
}

impl VehicleReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row and folds its counts into the running totals.
    pub fn record(&mut self, photo: impl Into<String>, counts: VehicleCount) {
        self.totals.accumulate(&counts);
        self.rows.push(ResultRow {
            photo: photo.into(),
            counts,
        });
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn totals(&self) -> &VehicleCount {
        &self.totals
    }

    pub fn grand_total(&self) -> u64 {
        self.totals.total()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Table body: image rows in processing order, then the two trailers.
    pub fn lines(&self) -> Vec<ReportLine> {
        let mut lines: Vec<ReportLine> = self
            .rows
            .iter()
            .map(|row| ReportLine {
                photo: row.photo.clone(),
                counts: Some(row.counts),
                total: None,
            })
            .collect();
        lines.push(ReportLine {
            photo: TOTAL_PER_TYPE_ROW.to_string(),
            counts: Some(self.totals),
            total: None,
        });
        lines.push(ReportLine {
            photo: TOTAL_VEHICLES_ROW.to_string(),
            counts: None,
            total: Some(self.grand_total()),
        });
        lines
    }

    /// Column headers: photo, one per vehicle type, grand total.
    pub fn header() -> Vec<&'static str> {
        let mut header = vec![PHOTO_COLUMN];
        header.extend(VehicleType::ALL.iter().map(|v| v.label_name()));
        header.push(TOTAL_COLUMN);
        header
    }

    /// Writes the table as a single-sheet workbook.
    pub fn write_xlsx(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create report dir {}", parent.display()))?;
        }

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let bold = Format::new().set_bold();
        let total_col = (VehicleType::ALL.len() + 1) as u16;

        for (col, name) in Self::header().into_iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, name, &bold)?;
        }
        for (i, line) in self.lines().into_iter().enumerate() {
            let row = (i + 1) as u32;
            sheet.write_string(row, 0, &line.photo)?;
            if let Some(counts) = line.counts {
                for (col, (_, n)) in counts.iter().enumerate() {
                    sheet.write_number(row, (col + 1) as u16, n as f64)?;
                }
            }
            if let Some(total) = line.total {
                sheet.write_number(row, total_col, total as f64)?;
            }
        }

        workbook
            .save(path)
            .with_context(|| format!("write spreadsheet {}", path.display()))?;
        log::info!("Excel file saved: {}", path.display());
        Ok(())
    }

    /// Logs the per-type totals.
    pub fn log_statistics(&self) {
        log::info!("Vehicle Statistics:");
        for (vehicle, n) in self.totals.iter() {
            log::info!("{}: {} vehicles", vehicle, n);
        }
    }
}
