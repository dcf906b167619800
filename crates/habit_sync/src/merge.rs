use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use habit_core::{HabitCollection, HabitId, HabitRecord};

/// Where each record of a merge result came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Ids only present locally.
    pub local_only: usize,
    /// Ids only present remotely.
    pub remote_only: usize,
    /// Ids on both sides where the local version won.
    pub kept_local: usize,
    /// Ids on both sides where the remote version won.
    pub kept_remote: usize,
}

/// Last-write-wins merge keyed by habit id.
///
/// Records are compared by `updated_at` and replaced whole; histories of the
/// two versions are never combined. Ties keep the local version. The result
/// lists remote ids in remote order followed by local-only ids in local order.
pub fn merge(local: &HabitCollection, remote: &HabitCollection) -> HabitCollection {
    merge_with_stats(local, remote).0
}

pub fn merge_with_stats(
    local: &HabitCollection,
    remote: &HabitCollection,
) -> (HabitCollection, MergeStats) {
    let mut order: Vec<&HabitId> = Vec::with_capacity(local.len() + remote.len());
    let mut winners: HashMap<&HabitId, &HabitRecord> = HashMap::new();

    for habit in remote {
        if winners.insert(habit.id(), habit).is_none() {
            order.push(habit.id());
        }
    }
    let remote_ids = order.len();

    let mut stats = MergeStats::default();
    for habit in local {
        let local_wins = match winners.get(habit.id()) {
            None => {
                order.push(habit.id());
                stats.local_only += 1;
                true
            }
            Some(existing) if habit.updated_at() >= existing.updated_at() => {
                stats.kept_local += 1;
                true
            }
            Some(_) => {
                stats.kept_remote += 1;
                false
            }
        };
        if local_wins {
            winners.insert(habit.id(), habit);
        }
    }
    stats.remote_only = remote_ids.saturating_sub(stats.kept_local + stats.kept_remote);

    let merged = order
        .into_iter()
        .filter_map(|id| winners.get(id).map(|habit| (*habit).clone()))
        .collect();
    (merged, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use habit_core::completion::complete;
    use habit_core::{HabitDraft, HabitPatch};

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 2, day, hour, 0, 0)
            .unwrap()
    }

    fn habit(id: &str, created: DateTime<FixedOffset>) -> HabitRecord {
        HabitRecord::create_with_id(id.into(), HabitDraft::new(id), created).unwrap()
    }

    fn renamed(habit: &HabitRecord, name: &str, when: DateTime<FixedOffset>) -> HabitRecord {
        habit
            .apply(
                &HabitPatch {
                    name: Some(name.into()),
                    ..HabitPatch::default()
                },
                when,
            )
            .unwrap()
    }

    fn collection(habits: Vec<HabitRecord>) -> HabitCollection {
        habits.into_iter().collect()
    }

    #[test]
    fn newer_version_wins_per_id() {
        let base = habit("a", at(1, 8));
        let local = collection(vec![renamed(&base, "local", at(3, 8))]);
        let remote = collection(vec![renamed(&base, "remote", at(2, 8))]);
        let (merged, stats) = merge_with_stats(&local, &remote);
        assert_eq!(merged.get(&"a".into()).unwrap().name(), "local");
        assert_eq!(stats.kept_local, 1);

        let remote = collection(vec![renamed(&base, "remote", at(4, 8))]);
        let (merged, stats) = merge_with_stats(&local, &remote);
        assert_eq!(merged.get(&"a".into()).unwrap().name(), "remote");
        assert_eq!(stats.kept_remote, 1);
    }

    #[test]
    fn ties_prefer_local() {
        let base = habit("a", at(1, 8));
        let local = collection(vec![renamed(&base, "local", at(2, 8))]);
        let remote = collection(vec![renamed(&base, "remote", at(2, 8))]);
        assert_eq!(merge(&local, &remote).get(&"a".into()).unwrap().name(), "local");
    }

    #[test]
    fn records_are_replaced_whole() {
        let base = habit("a", at(1, 8));
        let local = collection(vec![complete(&base, at(2, 9))]);
        let remote = collection(vec![complete(&base, at(3, 9))]);
        let merged = merge(&local, &remote);
        let winner = merged.get(&"a".into()).unwrap();
        assert_eq!(winner.history().len(), 1);
        assert_eq!(winner, remote.get(&"a".into()).unwrap());
    }

    #[test]
    fn every_id_appears_exactly_once() {
        let local = collection(vec![habit("a", at(1, 8)), habit("b", at(1, 8))]);
        let remote = collection(vec![habit("b", at(1, 8)), habit("c", at(1, 8))]);
        let (merged, stats) = merge_with_stats(&local, &remote);
        assert_eq!(
            merged.ids(),
            vec![HabitId::from("b"), HabitId::from("c"), HabitId::from("a")]
        );
        assert_eq!(
            stats,
            MergeStats {
                local_only: 1,
                remote_only: 1,
                kept_local: 1,
                kept_remote: 0,
            }
        );
    }

    #[test]
    fn merge_is_idempotent_against_unchanged_remote() {
        let shared = habit("shared", at(1, 8));
        let local = collection(vec![
            renamed(&shared, "edited here", at(5, 8)),
            habit("new", at(4, 8)),
        ]);
        let remote = collection(vec![
            renamed(&shared, "edited there", at(3, 8)),
            habit("cloud", at(2, 8)),
        ]);
        let once = merge(&local, &remote);
        let twice = merge(&once, &remote);
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_sides() {
        let local = collection(vec![habit("a", at(1, 8))]);
        assert_eq!(merge(&local, &HabitCollection::new()), local);
        assert_eq!(merge(&HabitCollection::new(), &local), local);
        assert!(merge(&HabitCollection::new(), &HabitCollection::new()).is_empty());
    }
}
