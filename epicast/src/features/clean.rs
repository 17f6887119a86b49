//! Impute plan executor
//!
//! A plan is an ordered list of [`CleanStep`]s. Fill steps only touch the
//! gaps left by earlier steps. Steps before [`CleanStep::SelectUniverse`]
//! act on the whole feature matrix, which `SelectUniverse` keeps as the
//! source for the parent-geography fills.

use crate::error::{ForecastError, Result};
use crate::locations::{Locations, Universe};
use crate::panel::Matrix;
use crate::transforms::{
    aggregate_children, cross_section_cbsa_mean, cross_section_mean, cross_section_state_mean,
    cross_section_winsor, get_national_value, get_state_value, normalize_beds, normalize_cases,
    select_universe, Aggregate,
};

/// One step of an impute plan
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CleanStep {
    /// Cases per 100k residents
    NormalizeCases,
    /// Counts per licensed bed
    NormalizeBeds,
    /// Pad to exactly the universe's ids
    SelectUniverse,
    /// Fill the national entity from its states
    FillFromChildren(Aggregate),
    /// Fill from the national value of the date
    FillFromNational,
    /// Fill counties from their parent state
    FillFromState,
    /// Fill from the CBSA mean
    FillCbsaMean,
    /// Fill from the mean of the parent state's counties
    FillStateMean,
    /// Fill from the mean across the universe
    FillCrossSectionMean,
    /// Carry observations forward along time
    ForwardFill,
    ClipNonNegative,
    /// Per-date winsorization at `mean ± t · std`
    Winsor(f64),
    FillZero,
    /// Replace values by their CBSA mean; counties outside any CBSA keep
    /// their own value
    CbsaAverage,
}

fn parent_source<'a>(source: &'a Option<Matrix>, step: &CleanStep) -> Result<&'a Matrix> {
    source.as_ref().ok_or_else(|| {
        ForecastError::ValidationError(format!("{:?} must come after SelectUniverse", step))
    })
}

/// Run `steps` over `matrix` for the given universe
pub fn apply_plan(
    matrix: &Matrix,
    steps: &[CleanStep],
    universe: Universe,
    locations: &Locations,
) -> Result<Matrix> {
    let mut current = matrix.clone();
    let mut source: Option<Matrix> = None;

    for step in steps {
        current = match step {
            CleanStep::NormalizeCases => normalize_cases(&current, locations),
            CleanStep::NormalizeBeds => normalize_beds(&current, locations),
            CleanStep::SelectUniverse => {
                let selected = select_universe(&current, locations.universe(universe), true);
                source = Some(current);
                selected
            }
            CleanStep::FillFromChildren(aggregate) => {
                if universe != Universe::National {
                    return Err(ForecastError::InvalidParameter(format!(
                        "{:?} only applies to the national universe, not {}",
                        step, universe
                    )));
                }
                let national_id = locations.national_id().ok_or_else(|| {
                    ForecastError::DataError("Location table has no national entity".to_string())
                })?;
                let states = select_universe(
                    parent_source(&source, step)?,
                    locations.universe(Universe::State),
                    false,
                );
                current.fill_missing_from(&aggregate_children(&states, national_id, *aggregate))?
            }
            CleanStep::FillFromNational => {
                let national = select_universe(
                    parent_source(&source, step)?,
                    locations.universe(Universe::National),
                    false,
                );
                current.fill_missing_from(&get_national_value(&current, &national))?
            }
            CleanStep::FillFromState => {
                let states = select_universe(
                    parent_source(&source, step)?,
                    locations.universe(Universe::State),
                    false,
                );
                current.fill_missing_from(&get_state_value(&current, &states, locations))?
            }
            CleanStep::FillCbsaMean => {
                current.fill_missing_from(&cross_section_cbsa_mean(&current, locations))?
            }
            CleanStep::FillStateMean => {
                current.fill_missing_from(&cross_section_state_mean(&current, locations))?
            }
            CleanStep::FillCrossSectionMean => {
                current.fill_missing_from(&cross_section_mean(&current))?
            }
            CleanStep::ForwardFill => current.forward_fill(),
            CleanStep::ClipNonNegative => current.clip_lower(0.0),
            CleanStep::Winsor(threshold) => cross_section_winsor(&current, *threshold),
            CleanStep::FillZero => current.fill_missing_value(0.0),
            CleanStep::CbsaAverage => {
                cross_section_cbsa_mean(&current, locations).fill_missing_from(&current)?
            }
        };
    }

    Ok(current)
}
