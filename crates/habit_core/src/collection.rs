use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{HabitError, HabitResult};
use crate::habit::{HabitId, HabitRecord};

/// Insertion-ordered set of habits. Every mutating method returns a new
/// collection and leaves `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HabitCollection {
    habits: Vec<HabitRecord>,
}

impl HabitCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.habits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.habits.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HabitRecord> {
        self.habits.iter()
    }

    pub fn as_slice(&self) -> &[HabitRecord] {
        &self.habits
    }

    pub fn get(&self, id: &HabitId) -> Option<&HabitRecord> {
        self.habits.iter().find(|habit| habit.id() == id)
    }

    pub fn contains(&self, id: &HabitId) -> bool {
        self.get(id).is_some()
    }

    pub fn ids(&self) -> Vec<HabitId> {
        self.habits.iter().map(|habit| habit.id().clone()).collect()
    }

    pub fn with_appended(&self, habit: HabitRecord) -> HabitResult<Self> {
        if self.contains(habit.id()) {
            return Err(HabitError::validation(format!(
                "habit `{}` already exists",
                habit.id()
            )));
        }
        let mut habits = self.habits.clone();
        habits.push(habit);
        Ok(Self { habits })
    }

    /// Replaces the record with the same id, keeping its position.
    pub fn with_replaced(&self, habit: HabitRecord) -> HabitResult<Self> {
        let index = self.position(habit.id())?;
        let mut habits = self.habits.clone();
        habits[index] = habit;
        Ok(Self { habits })
    }

    /// Applies `edit` to the habit with `id` and returns the new collection.
    pub fn with_updated<F>(&self, id: &HabitId, edit: F) -> HabitResult<Self>
    where
        F: FnOnce(&HabitRecord) -> HabitResult<HabitRecord>,
    {
        let index = self.position(id)?;
        let updated = edit(&self.habits[index])?;
        let mut habits = self.habits.clone();
        habits[index] = updated;
        Ok(Self { habits })
    }

    pub fn without(&self, id: &HabitId) -> HabitResult<Self> {
        let index = self.position(id)?;
        let mut habits = self.habits.clone();
        habits.remove(index);
        Ok(Self { habits })
    }

    fn position(&self, id: &HabitId) -> HabitResult<usize> {
        self.habits
            .iter()
            .position(|habit| habit.id() == id)
            .ok_or_else(|| HabitError::NotFound(id.clone()))
    }
}

impl FromIterator<HabitRecord> for HabitCollection {
    /// Later records with an id already seen are dropped.
    fn from_iter<I: IntoIterator<Item = HabitRecord>>(iter: I) -> Self {
        let mut seen = HashSet::new();
        let habits = iter
            .into_iter()
            .filter(|habit| seen.insert(habit.id().clone()))
            .collect();
        Self { habits }
    }
}

impl<'de> Deserialize<'de> for HabitCollection {
    /// Goes through [`FromIterator`] so a stored blob can never install a
    /// repeated id.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<HabitRecord>::deserialize(deserializer)?;
        let total = records.len();
        let collection: Self = records.into_iter().collect();
        if collection.len() < total {
            warn!(
                dropped = total - collection.len(),
                "duplicate habit ids in stored collection"
            );
        }
        Ok(collection)
    }
}

impl IntoIterator for HabitCollection {
    type Item = HabitRecord;
    type IntoIter = std::vec::IntoIter<HabitRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.habits.into_iter()
    }
}

impl<'a> IntoIterator for &'a HabitCollection {
    type Item = &'a HabitRecord;
    type IntoIter = std::slice::Iter<'a, HabitRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.habits.iter()
    }
}
