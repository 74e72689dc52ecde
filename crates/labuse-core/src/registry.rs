//! Known areas and their computer counts.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::OccupancyError;
use crate::session::Session;
use crate::types::{AreaId, BuildingId};

/// One floor of one building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    /// Compact label, e.g. `LIB-2`.
    pub id: AreaId,
    pub building: BuildingId,
    pub floor: String,
    /// Number of distinct computers known in the area.
    pub capacity: u32,
}

/// The set of areas a run may reference.
///
/// Built once from the classifier's output. Iteration order is sorted by
/// area ID so results are deterministic. Serialized as a list of areas;
/// deserializing goes through [`AreaRegistry::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Area>", into = "Vec<Area>")]
pub struct AreaRegistry {
    areas: BTreeMap<AreaId, Area>,
}

impl TryFrom<Vec<Area>> for AreaRegistry {
    type Error = OccupancyError;

    fn try_from(areas: Vec<Area>) -> Result<Self, Self::Error> {
        Self::new(areas)
    }
}

impl From<AreaRegistry> for Vec<Area> {
    fn from(registry: AreaRegistry) -> Self {
        registry.areas.into_values().collect()
    }
}

impl AreaRegistry {
    /// Builds a registry, rejecting duplicate area IDs.
    pub fn new(areas: impl IntoIterator<Item = Area>) -> Result<Self, OccupancyError> {
        let mut map = BTreeMap::new();
        for area in areas {
            if map.contains_key(&area.id) {
                return Err(OccupancyError::DuplicateArea { area: area.id });
            }
            map.insert(area.id.clone(), area);
        }
        Ok(Self { areas: map })
    }

    /// Capacity of a registered area.
    ///
    /// An unknown area is an error; it never reads as zero capacity.
    pub fn capacity_of(&self, area: &AreaId) -> Result<u32, OccupancyError> {
        self.get(area)
            .map(|a| a.capacity)
            .ok_or_else(|| OccupancyError::UnknownArea {
                area: area.clone(),
                index: None,
            })
    }

    pub fn get(&self, area: &AreaId) -> Option<&Area> {
        self.areas.get(area)
    }

    pub fn contains(&self, area: &AreaId) -> bool {
        self.areas.contains_key(area)
    }

    pub fn all_areas(&self) -> impl Iterator<Item = &Area> {
        self.areas.values()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// Distinct buildings, sorted.
    pub fn buildings(&self) -> BTreeSet<&BuildingId> {
        self.areas.values().map(|a| &a.building).collect()
    }

    pub fn areas_in_building<'a>(
        &'a self,
        building: &'a BuildingId,
    ) -> impl Iterator<Item = &'a Area> + 'a {
        self.areas.values().filter(move |a| &a.building == building)
    }

    /// Sum of member capacities.
    pub fn building_capacity(&self, building: &BuildingId) -> u64 {
        self.areas_in_building(building)
            .map(|a| u64::from(a.capacity))
            .sum()
    }

    /// Checks that every session references a registered area.
    ///
    /// Stops at the first offender and reports its index in `sessions`.
    pub fn validate_sessions(&self, sessions: &[Session]) -> Result<(), OccupancyError> {
        match sessions
            .iter()
            .enumerate()
            .find(|(_, s)| !self.contains(s.area()))
        {
            Some((index, session)) => Err(OccupancyError::UnknownArea {
                area: session.area().clone(),
                index: Some(index),
            }),
            None => Ok(()),
        }
    }
}
