//! Goal collection stored as one JSON array under the `goals` key.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Date;

use crate::store::{ProfileStore, StoreError, keys};

/// A practice goal with a deadline and completion percentage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Goal {
    pub id: u64,
    pub title: String,
    #[serde(with = "iso_date")]
    pub deadline: Date,
    pub description: String,
    /// Completion percentage, always within 0..=100.
    pub progress: u8,
}

mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use time::{Date, format_description::FormatItem, macros::format_description};

    const FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let formatted = date
            .format(&FORMAT)
            .map_err(|err| serde::ser::Error::custom(err.to_string()))?;
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Date::parse(&raw, &FORMAT).map_err(D::Error::custom)
    }
}

#[derive(Debug, Error)]
pub enum GoalError {
    /// Another goal already carries this id; nothing was written.
    #[error("A goal with id {0} already exists")]
    DuplicateId(u64),
    #[error("No goal with id {0}")]
    NotFound(u64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid goal data in store: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Load every stored goal, oldest first.
pub fn load_goals(store: &impl ProfileStore) -> Result<Vec<Goal>, GoalError> {
    match store.get(keys::GOALS)? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

fn save_goals(store: &mut impl ProfileStore, goals: &[Goal]) -> Result<(), GoalError> {
    let payload = serde_json::to_string(goals)?;
    store.set(keys::GOALS, &payload)?;
    Ok(())
}

/// Append a goal, rejecting duplicate ids before any write.
pub fn add_goal(store: &mut impl ProfileStore, goal: Goal) -> Result<(), GoalError> {
    let mut goals = load_goals(store)?;
    if goals.iter().any(|existing| existing.id == goal.id) {
        return Err(GoalError::DuplicateId(goal.id));
    }
    goals.push(Goal {
        progress: goal.progress.min(100),
        ..goal
    });
    save_goals(store, &goals)
}

/// Set a goal's completion percentage, clamping the value into 0..=100.
pub fn update_progress(
    store: &mut impl ProfileStore,
    id: u64,
    progress: i64,
) -> Result<u8, GoalError> {
    let mut goals = load_goals(store)?;
    let goal = goals
        .iter_mut()
        .find(|goal| goal.id == id)
        .ok_or(GoalError::NotFound(id))?;
    goal.progress = progress.clamp(0, 100) as u8;
    let clamped = goal.progress;
    save_goals(store, &goals)?;
    Ok(clamped)
}

/// Remove exactly the goal with the given id, leaving the rest untouched.
///
/// Callers reach this only through the destructive-action guard.
pub(crate) fn remove_goal(store: &mut impl ProfileStore, id: u64) -> Result<(), GoalError> {
    let mut goals = load_goals(store)?;
    let before = goals.len();
    goals.retain(|goal| goal.id != id);
    if goals.len() == before {
        return Err(GoalError::NotFound(id));
    }
    save_goals(store, &goals)
}

/// Smallest id strictly greater than every stored goal's id.
pub fn next_goal_id(goals: &[Goal]) -> u64 {
    goals.iter().map(|goal| goal.id).max().map_or(1, |id| id + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use time::macros::date;

    fn goal(id: u64, title: &str) -> Goal {
        Goal {
            id,
            title: title.to_string(),
            deadline: date!(2024 - 12 - 31),
            description: "Test Description".to_string(),
            progress: 50,
        }
    }

    #[test]
    fn goals_round_trip_through_json() {
        let mut store = MemoryStore::new();
        add_goal(&mut store, goal(12345, "Test Goal")).unwrap();
        let goals = load_goals(&store).unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].id, 12345);
        assert_eq!(goals[0].deadline, date!(2024 - 12 - 31));
    }

    #[test]
    fn duplicate_ids_abort_before_any_write() {
        let mut store = MemoryStore::new();
        add_goal(&mut store, goal(1, "first")).unwrap();
        let err = add_goal(&mut store, goal(1, "second")).unwrap_err();
        assert!(matches!(err, GoalError::DuplicateId(1)));
        let goals = load_goals(&store).unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].title, "first");
    }

    #[test]
    fn progress_updates_clamp_into_range() {
        let mut store = MemoryStore::new();
        add_goal(&mut store, goal(1, "g")).unwrap();
        assert_eq!(update_progress(&mut store, 1, 250).unwrap(), 100);
        assert_eq!(update_progress(&mut store, 1, -5).unwrap(), 0);
        assert_eq!(update_progress(&mut store, 1, 72).unwrap(), 72);
        let err = update_progress(&mut store, 99, 10).unwrap_err();
        assert!(matches!(err, GoalError::NotFound(99)));
    }

    #[test]
    fn remove_deletes_exactly_one_goal() {
        let mut store = MemoryStore::new();
        add_goal(&mut store, goal(1, "keep")).unwrap();
        add_goal(&mut store, goal(2, "drop")).unwrap();
        remove_goal(&mut store, 2).unwrap();
        let goals = load_goals(&store).unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].id, 1);
        assert!(matches!(
            remove_goal(&mut store, 2).unwrap_err(),
            GoalError::NotFound(2)
        ));
    }

    #[test]
    fn next_id_advances_past_the_maximum() {
        assert_eq!(next_goal_id(&[]), 1);
        let goals = vec![goal(3, "a"), goal(7, "b")];
        assert_eq!(next_goal_id(&goals), 8);
    }

    #[test]
    fn malformed_stored_goals_surface_as_payload_errors() {
        let mut store = MemoryStore::new();
        store.set(keys::GOALS, "not json").unwrap();
        assert!(matches!(
            load_goals(&store).unwrap_err(),
            GoalError::Payload(_)
        ));
    }
}
