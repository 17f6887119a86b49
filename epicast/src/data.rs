//! Raw metric catalogue and panel loading

use crate::error::{ForecastError, Result};
use crate::panel::{Panel, ID_COLUMN};
use log::{info, warn};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Raw series delivered by the acquisition layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    JhuConfirmedCases,
    JhuConfirmedDeaths,
    CtpConfirmedCases,
    CtpConfirmedDeaths,
    CtpNegativeTests,
    CtpPendingTests,
    CtpConfirmedHospitalizations,
    CtpIcu,
    CtpVentilator,
    AppleDrivingMobility,
    AppleWalkingMobility,
    AppleTransitMobility,
    GoogleGroceryMobility,
    GoogleParksMobility,
    GoogleTransitStationsMobility,
    GoogleRetailMobility,
    GoogleResidentialMobility,
    GoogleWorkplacesMobility,
    ChngSmoothedOutpatientCovid,
    DoctorVisitsSmoothedCli,
    FbSurveyRawWili,
    FbSurveyRawWcli,
    FbSurveyRawHhCmntyCli,
    GhtRawSearch,
    SafegraphCompletelyHomeProp,
    SafegraphFullTimeWorkProp,
    SafegraphPartTimeWorkProp,
    SafegraphMedianHomeDwellTime,
}

impl Metric {
    /// Every metric, in catalogue order
    pub const ALL: [Metric; 28] = [
        Metric::JhuConfirmedCases,
        Metric::JhuConfirmedDeaths,
        Metric::CtpConfirmedCases,
        Metric::CtpConfirmedDeaths,
        Metric::CtpNegativeTests,
        Metric::CtpPendingTests,
        Metric::CtpConfirmedHospitalizations,
        Metric::CtpIcu,
        Metric::CtpVentilator,
        Metric::AppleDrivingMobility,
        Metric::AppleWalkingMobility,
        Metric::AppleTransitMobility,
        Metric::GoogleGroceryMobility,
        Metric::GoogleParksMobility,
        Metric::GoogleTransitStationsMobility,
        Metric::GoogleRetailMobility,
        Metric::GoogleResidentialMobility,
        Metric::GoogleWorkplacesMobility,
        Metric::ChngSmoothedOutpatientCovid,
        Metric::DoctorVisitsSmoothedCli,
        Metric::FbSurveyRawWili,
        Metric::FbSurveyRawWcli,
        Metric::FbSurveyRawHhCmntyCli,
        Metric::GhtRawSearch,
        Metric::SafegraphCompletelyHomeProp,
        Metric::SafegraphFullTimeWorkProp,
        Metric::SafegraphPartTimeWorkProp,
        Metric::SafegraphMedianHomeDwellTime,
    ];

    /// Stable name, also the CSV file stem
    pub fn name(&self) -> &'static str {
        match self {
            Metric::JhuConfirmedCases => "JHU_ConfirmedCases",
            Metric::JhuConfirmedDeaths => "JHU_ConfirmedDeaths",
            Metric::CtpConfirmedCases => "CovidTrackingProject_ConfirmedCases",
            Metric::CtpConfirmedDeaths => "CovidTrackingProject_ConfirmedDeaths",
            Metric::CtpNegativeTests => "CovidTrackingProject_NegativeTests",
            Metric::CtpPendingTests => "CovidTrackingProject_PendingTests",
            Metric::CtpConfirmedHospitalizations => {
                "CovidTrackingProject_ConfirmedHospitalizations"
            }
            Metric::CtpIcu => "CovidTrackingProject_ICU",
            Metric::CtpVentilator => "CovidTrackingProject_Ventilator",
            Metric::AppleDrivingMobility => "Apple_DrivingMobility",
            Metric::AppleWalkingMobility => "Apple_WalkingMobility",
            Metric::AppleTransitMobility => "Apple_TransitMobility",
            Metric::GoogleGroceryMobility => "Google_GroceryMobility",
            Metric::GoogleParksMobility => "Google_ParksMobility",
            Metric::GoogleTransitStationsMobility => "Google_TransitStationsMobility",
            Metric::GoogleRetailMobility => "Google_RetailMobility",
            Metric::GoogleResidentialMobility => "Google_ResidentialMobility",
            Metric::GoogleWorkplacesMobility => "Google_WorkplacesMobility",
            Metric::ChngSmoothedOutpatientCovid => "Chng_SmoothedOutpatientCovid",
            Metric::DoctorVisitsSmoothedCli => "DoctorVisits_SmoothedCli",
            Metric::FbSurveyRawWili => "FbSurvey_RawWili",
            Metric::FbSurveyRawWcli => "FbSurvey_RawWcli",
            Metric::FbSurveyRawHhCmntyCli => "FbSurvey_RawHhCmntyCli",
            Metric::GhtRawSearch => "Ght_RawSearch",
            Metric::SafegraphCompletelyHomeProp => "Safegraph_CompletelyHomeProp",
            Metric::SafegraphFullTimeWorkProp => "Safegraph_FullTimeWorkProp",
            Metric::SafegraphPartTimeWorkProp => "Safegraph_PartTimeWorkProp",
            Metric::SafegraphMedianHomeDwellTime => "Safegraph_MedianHomeDwellTime",
        }
    }

    /// Look a metric up by its stable name
    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// Daily-cadence survey and search signals are sparse, so their rolling
    /// means accept a single observation.
    pub fn is_sparse_signal(&self) -> bool {
        matches!(
            self,
            Metric::FbSurveyRawWili
                | Metric::FbSurveyRawWcli
                | Metric::FbSurveyRawHhCmntyCli
                | Metric::GhtRawSearch
                | Metric::SafegraphCompletelyHomeProp
                | Metric::SafegraphFullTimeWorkProp
                | Metric::SafegraphPartTimeWorkProp
                | Metric::SafegraphMedianHomeDwellTime
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Metric::from_name(s)
            .ok_or_else(|| ForecastError::DataError(format!("Unknown metric: {}", s)))
    }
}

/// Raw panels keyed by metric. Absent metrics are entirely unobserved.
#[derive(Debug, Clone, Default)]
pub struct RawData {
    panels: BTreeMap<Metric, Panel>,
}

impl RawData {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a panel, replacing any previous one for the metric
    pub fn insert(&mut self, metric: Metric, panel: Panel) {
        self.panels.insert(metric, panel.renamed(metric.name()));
    }

    /// Builder-style insert
    pub fn with(mut self, metric: Metric, panel: Panel) -> Self {
        self.insert(metric, panel);
        self
    }

    /// Get the panel for a metric
    pub fn get(&self, metric: Metric) -> Option<&Panel> {
        self.panels.get(&metric)
    }

    /// Metrics present
    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.panels.keys().copied()
    }

    /// Number of metrics present
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    /// Check if no metric is present
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }
}

/// Data loader for raw panel CSV files
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a long `dates,id,<value>` CSV file into a panel
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Panel> {
        let file = File::open(path.as_ref())?;
        // Ids such as FIPS codes must keep their leading zeros
        let overwrite = Schema::from_iter([Field::new(ID_COLUMN.into(), DataType::String)]);
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_schema_overwrite(Some(Arc::new(overwrite)))
            .map_parse_options(|opts| opts.with_try_parse_dates(true))
            .into_reader_with_file_handle(file)
            .finish()?;

        Panel::from_dataframe(&df)
    }

    /// Load every `<MetricName>.csv` file from a directory. Missing files
    /// are skipped.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<RawData> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ForecastError::DataError(format!(
                "Data directory does not exist: {}",
                dir.display()
            )));
        }

        let mut data = RawData::new();
        for metric in Metric::ALL {
            let path = dir.join(format!("{}.csv", metric.name()));
            if !path.exists() {
                warn!("No data for {}, treating it as unobserved", metric);
                continue;
            }
            let panel = Self::from_csv(&path)?;
            info!("Loaded {} ({} rows)", metric, panel.len());
            data.insert(metric, panel);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::from_name(metric.name()), Some(metric));
        }
        assert!("NotAMetric".parse::<Metric>().is_err());
    }

    #[test]
    fn test_sparse_signals() {
        assert!(Metric::GhtRawSearch.is_sparse_signal());
        assert!(!Metric::AppleDrivingMobility.is_sparse_signal());
    }
}
