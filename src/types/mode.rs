//! Price normalization modes and their display labels

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::SeriesKind;

/// How nominal GBP medians are transformed before presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMode {
    /// Raw GBP
    #[default]
    Nominal,
    /// GBP deflated by CPI to base-year pounds
    RealCpi,
    /// GBP deflated by RPI to base-year pounds
    RealRpi,
    /// Converted to USD at the year's exchange rate
    UsdNominal,
    /// Converted to USD at the year's CPI-adjusted exchange rate
    UsdReal,
}

impl NormalizationMode {
    /// Economic series the transform reads
    pub fn required_series(self) -> &'static [SeriesKind] {
        match self {
            NormalizationMode::Nominal => &[],
            NormalizationMode::RealCpi => &[SeriesKind::Cpi],
            NormalizationMode::RealRpi => &[SeriesKind::Rpi],
            NormalizationMode::UsdNominal => &[SeriesKind::Fx],
            NormalizationMode::UsdReal => &[SeriesKind::Cpi, SeriesKind::Fx, SeriesKind::RealFx],
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            NormalizationMode::Nominal => "Nominal",
            NormalizationMode::RealCpi => "Real (CPI Adjusted)",
            NormalizationMode::RealRpi => "Real (RPI Adjusted)",
            NormalizationMode::UsdNominal => "USD (Nominal)",
            NormalizationMode::UsdReal => "USD (Real)",
        }
    }

    pub fn is_usd(self) -> bool {
        matches!(
            self,
            NormalizationMode::UsdNominal | NormalizationMode::UsdReal
        )
    }
}

/// Y-axis label for a table produced with `mode` and `rebased`
pub fn axis_label(mode: NormalizationMode, rebased: bool) -> &'static str {
    if rebased {
        return "Price Index (First Year = 1)";
    }
    match mode {
        NormalizationMode::Nominal => "Price (GBP)",
        NormalizationMode::RealCpi => "Price (Real GBP, CPI Adjusted)",
        NormalizationMode::RealRpi => "Price (Real GBP, RPI Adjusted)",
        NormalizationMode::UsdNominal => "Price (USD)",
        NormalizationMode::UsdReal => "Price (Real USD)",
    }
}
