//! Location metadata: universes, denominators and parent geographies

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Geographic resolution modelled by one set of pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Universe {
    #[serde(alias = "country")]
    National,
    State,
    County,
}

impl Universe {
    /// All universes, coarsest first
    pub const ALL: [Universe; 3] = [Universe::National, Universe::State, Universe::County];

    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Universe::National => "national",
            Universe::State => "state",
            Universe::County => "county",
        }
    }

    /// Capitalised name used in export file names
    pub fn title(&self) -> &'static str {
        match self {
            Universe::National => "National",
            Universe::State => "State",
            Universe::County => "County",
        }
    }
}

impl fmt::Display for Universe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Universe {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "national" | "country" => Ok(Universe::National),
            "state" => Ok(Universe::State),
            "county" => Ok(Universe::County),
            other => Err(ForecastError::InvalidParameter(format!(
                "Unknown universe: {}",
                other
            ))),
        }
    }
}

/// One row of the location table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Entity id used by every raw panel
    pub id: String,
    /// Forecast hub location code (FIPS or `US`)
    pub location: String,
    /// Resolution of this entity
    pub location_type: Universe,
    pub population: Option<f64>,
    pub hospital_licensed_beds: Option<f64>,
    /// Parent state id, for counties
    #[serde(default)]
    pub state: Option<String>,
    /// Core-based statistical area code, for counties
    #[serde(default)]
    pub cbsa: Option<String>,
}

/// Indexed location table
#[derive(Debug, Clone)]
pub struct Locations {
    rows: Vec<Location>,
    index: HashMap<String, usize>,
    parent_state: HashMap<String, String>,
    universes: HashMap<Universe, Vec<String>>,
}

impl Locations {
    /// Index a location table. Ids must be unique.
    pub fn new(rows: Vec<Location>) -> Result<Self> {
        let mut index = HashMap::with_capacity(rows.len());
        let mut parent_state = HashMap::new();
        let mut universes: HashMap<Universe, Vec<String>> = HashMap::new();

        for (i, row) in rows.iter().enumerate() {
            if index.insert(row.id.clone(), i).is_some() {
                return Err(ForecastError::ValidationError(format!(
                    "Duplicate location id '{}'",
                    row.id
                )));
            }
            universes
                .entry(row.location_type)
                .or_default()
                .push(row.id.clone());

            if row.location_type == Universe::County {
                if let Some(state) = row.state.clone().or_else(|| state_from_county_id(&row.id)) {
                    parent_state.insert(row.id.clone(), state);
                }
            }
        }

        Ok(Self {
            rows,
            index,
            parent_state,
            universes,
        })
    }

    /// Read a location table from CSV
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let rows = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<Location>, _>>()?;
        Self::new(rows)
    }

    /// Read a location table from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Member ids of a universe, in table order
    pub fn universe(&self, universe: Universe) -> &[String] {
        self.universes
            .get(&universe)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The national entity id
    pub fn national_id(&self) -> Option<&str> {
        self.universe(Universe::National).first().map(String::as_str)
    }

    /// Get a location row
    pub fn get(&self, id: &str) -> Option<&Location> {
        self.index.get(id).map(|&i| &self.rows[i])
    }

    /// Population denominator
    pub fn population(&self, id: &str) -> Option<f64> {
        self.get(id).and_then(|l| l.population)
    }

    /// Licensed hospital bed denominator
    pub fn beds(&self, id: &str) -> Option<f64> {
        self.get(id).and_then(|l| l.hospital_licensed_beds)
    }

    /// Parent state id of a county
    pub fn state_of(&self, id: &str) -> Option<&str> {
        self.parent_state.get(id).map(String::as_str)
    }

    /// CBSA code of a county
    pub fn cbsa_of(&self, id: &str) -> Option<&str> {
        self.get(id).and_then(|l| l.cbsa.as_deref())
    }

    /// Hub location code
    pub fn hub_code(&self, id: &str) -> Option<&str> {
        self.get(id).map(|l| l.location.as_str())
    }

    /// All rows
    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// `Abbeville_SouthCarolina_UnitedStates` belongs to `SouthCarolina_UnitedStates`.
fn state_from_county_id(id: &str) -> Option<String> {
    id.split_once('_')
        .map(|(_, parent)| parent.to_string())
        .filter(|parent| parent.contains('_'))
}
