//! State features

use super::{CleanStep, FeatureId, FeatureSpec};
use crate::data::Metric::*;

/// Impute groups of the state universe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeGroup {
    /// Hospital occupancy counts, per bed
    Capacity,
    /// Case, death and test counts, per 100k
    Counts,
    /// Mobility and work-pattern rates
    Signals,
}

/// Ordered clean steps of an impute group
pub fn plan(group: ImputeGroup) -> Vec<CleanStep> {
    match group {
        ImputeGroup::Capacity => vec![
            CleanStep::NormalizeBeds,
            CleanStep::SelectUniverse,
            CleanStep::ClipNonNegative,
            CleanStep::Winsor(3.0),
            CleanStep::FillZero,
        ],
        ImputeGroup::Counts => vec![
            CleanStep::NormalizeCases,
            CleanStep::SelectUniverse,
            CleanStep::ClipNonNegative,
            CleanStep::Winsor(3.0),
            CleanStep::FillZero,
        ],
        ImputeGroup::Signals => vec![
            CleanStep::SelectUniverse,
            CleanStep::ForwardFill,
            CleanStep::FillFromNational,
            CleanStep::FillCrossSectionMean,
            CleanStep::Winsor(5.0),
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
        (FeatureId::rolling(SafegraphFullTimeWorkProp).shifted(4), Signals),
        (FeatureId::rolling(SafegraphFullTimeWorkProp).shifted(11), Signals),
        (FeatureId::rolling(SafegraphCompletelyHomeProp).shifted(4), Signals),
        (FeatureId::rolling(SafegraphCompletelyHomeProp).shifted(11), Signals),
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
