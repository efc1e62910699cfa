// src/dsp/stages/mod.rs

pub mod band_pass;
pub mod bpm;
pub mod energy;
pub mod ingest;
pub mod intervals;
pub mod onset;
pub mod peaks;

pub use band_pass::BandPassStage;
pub use bpm::BpmStage;
pub use energy::EnergyStage;
pub use ingest::IngestStage;
pub use intervals::{DominantIntervalStage, InterOnsetIntervalStage};
pub use onset::OnsetStage;
pub use peaks::PeakPickerStage;
