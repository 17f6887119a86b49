//! National features
//!
//! Listed one by one on purpose: each window and lag is a reporting-delay
//! judgment that must stay auditable.

use super::{CleanStep, FeatureId, FeatureSpec};
use crate::data::Metric::*;
use crate::transforms::Aggregate;

/// Impute groups of the national universe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeGroup {
    /// Hospital occupancy counts, per bed
    Capacity,
    /// Case, death and test counts, per 100k
    Counts,
    /// Mobility, survey and search rates
    Signals,
}

/// Ordered clean steps of an impute group
pub fn plan(group: ImputeGroup) -> Vec<CleanStep> {
    match group {
        ImputeGroup::Capacity => vec![
            CleanStep::SelectUniverse,
            CleanStep::FillFromChildren(Aggregate::Sum),
            CleanStep::NormalizeBeds,
            CleanStep::ClipNonNegative,
            CleanStep::FillZero,
        ],
        ImputeGroup::Counts => vec![
            CleanStep::SelectUniverse,
            CleanStep::FillFromChildren(Aggregate::Sum),
            CleanStep::NormalizeCases,
            CleanStep::ClipNonNegative,
            CleanStep::FillZero,
        ],
        ImputeGroup::Signals => vec![
            CleanStep::SelectUniverse,
            CleanStep::FillFromChildren(Aggregate::Mean),
            CleanStep::ForwardFill,
        ],
    }
}

/// Features with their impute group
pub fn features() -> Vec<(FeatureId, ImputeGroup)> {
    use ImputeGroup::*;
    vec![
        (FeatureId::level(JhuConfirmedCases), Counts),
        (FeatureId::diff(JhuConfirmedCases, 7), Counts),
        (FeatureId::diff(JhuConfirmedCases, 7).shifted(7), Counts),
        (FeatureId::diff(JhuConfirmedDeaths, 7), Counts),
        (FeatureId::diff(JhuConfirmedDeaths, 7).shifted(7), Counts),
        (FeatureId::diff(CtpConfirmedCases, 7), Counts),
        (FeatureId::diff(CtpConfirmedCases, 7).shifted(7), Counts),
        (FeatureId::diff(CtpConfirmedDeaths, 7), Counts),
        (FeatureId::diff(CtpConfirmedDeaths, 7).shifted(7), Counts),
        (FeatureId::diff(CtpNegativeTests, 7), Counts),
        (FeatureId::diff(CtpNegativeTests, 7).shifted(7), Counts),
        (FeatureId::rolling(CtpPendingTests), Counts),
        (FeatureId::rolling(CtpPendingTests).shifted(7), Counts),
        (FeatureId::rolling(CtpConfirmedHospitalizations), Capacity),
        (FeatureId::rolling(CtpConfirmedHospitalizations).shifted(7), Capacity),
        (FeatureId::rolling(CtpVentilator), Capacity),
        (FeatureId::rolling(CtpVentilator).shifted(7), Capacity),
        (FeatureId::rolling(CtpIcu), Capacity),
        (FeatureId::rolling(CtpIcu).shifted(7), Capacity),
        (FeatureId::rolling(AppleDrivingMobility), Signals),
        (FeatureId::rolling(AppleDrivingMobility).shifted(7), Signals),
        (FeatureId::rolling(AppleDrivingMobility).shifted(14), Signals),
        (FeatureId::rolling(AppleWalkingMobility), Signals),
        (FeatureId::rolling(AppleWalkingMobility).shifted(7), Signals),
        (FeatureId::rolling(AppleWalkingMobility).shifted(14), Signals),
        (FeatureId::rolling(AppleTransitMobility), Signals),
        (FeatureId::rolling(AppleTransitMobility).shifted(7), Signals),
        (FeatureId::rolling(AppleTransitMobility).shifted(14), Signals),
        (FeatureId::rolling(GoogleGroceryMobility).shifted(7), Signals),
        (FeatureId::rolling(GoogleGroceryMobility).shifted(14), Signals),
        (FeatureId::rolling(GoogleParksMobility).shifted(7), Signals),
        (FeatureId::rolling(GoogleParksMobility).shifted(14), Signals),
        (FeatureId::rolling(GoogleTransitStationsMobility).shifted(7), Signals),
        (FeatureId::rolling(GoogleTransitStationsMobility).shifted(14), Signals),
        (FeatureId::rolling(GoogleRetailMobility).shifted(7), Signals),
        (FeatureId::rolling(GoogleRetailMobility).shifted(14), Signals),
        (FeatureId::rolling(GoogleResidentialMobility).shifted(7), Signals),
        (FeatureId::rolling(GoogleResidentialMobility).shifted(14), Signals),
        (FeatureId::rolling(GoogleWorkplacesMobility).shifted(7), Signals),
        (FeatureId::rolling(GoogleWorkplacesMobility).shifted(14), Signals),
        (FeatureId::rolling(ChngSmoothedOutpatientCovid).shifted(7), Signals),
        (FeatureId::rolling(ChngSmoothedOutpatientCovid).shifted(14), Signals),
        (FeatureId::rolling(DoctorVisitsSmoothedCli).shifted(7), Signals),
        (FeatureId::rolling(DoctorVisitsSmoothedCli).shifted(14), Signals),
        (FeatureId::rolling(FbSurveyRawWili), Signals),
        (FeatureId::rolling(FbSurveyRawWili).shifted(7), Signals),
        (FeatureId::rolling(FbSurveyRawWcli), Signals),
        (FeatureId::rolling(FbSurveyRawWcli).shifted(7), Signals),
        (FeatureId::rolling(FbSurveyRawHhCmntyCli), Signals),
        (FeatureId::rolling(FbSurveyRawHhCmntyCli).shifted(7), Signals),
        (FeatureId::rolling(GhtRawSearch).shifted(4), Signals),
        (FeatureId::rolling(GhtRawSearch).shifted(11), Signals),
        (FeatureId::rolling(SafegraphCompletelyHomeProp).shifted(4), Signals),
        (FeatureId::rolling(SafegraphCompletelyHomeProp).shifted(11), Signals),
        (FeatureId::rolling(SafegraphFullTimeWorkProp).shifted(4), Signals),
        (FeatureId::rolling(SafegraphFullTimeWorkProp).shifted(11), Signals),
        (FeatureId::rolling(SafegraphPartTimeWorkProp).shifted(4), Signals),
        (FeatureId::rolling(SafegraphPartTimeWorkProp).shifted(11), Signals),
        (FeatureId::rolling(SafegraphMedianHomeDwellTime).shifted(4), Signals),
        (FeatureId::rolling(SafegraphMedianHomeDwellTime).shifted(11), Signals),
    ]
}

/// Features paired with their clean plans
pub fn catalog() -> Vec<FeatureSpec> {
    features()
        .into_iter()
        .map(|(id, group)| FeatureSpec {
            id,
            steps: plan(group),
        })
        .collect()
}
