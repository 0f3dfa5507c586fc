//! `survey_export`: files handed to other people.
//!
//! Density worksheets and the boxel sheet feed the community survey; the
//! spreadsheet and raw CSVs are for the CMDR's own records; the diagnostics
//! bundle is for bug reports. Every file is written to a `.tmp` sibling and
//! renamed into place.

mod atomic;
mod density;
mod diagnostics;
mod error;
mod sheets;

pub use density::{export_density_worksheets, safe_file_component, DensityExport, DENSITY_HEADER};
pub use diagnostics::{export_diagnostics_zip, redact_path, DiagnosticsInput};
pub use error::{ExportError, ExportResult};
pub use sheets::{
    export_boxel_sheet, export_notes_csv, export_spreadsheet_csv, BOXEL_HEADER, SPREADSHEET_HEADER,
};
