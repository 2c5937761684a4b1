//! Tier list status transitions.
//!
//! `Draft -> Active -> Completed`, with `Completed -> Active` for reactivation. Ballots are only
//! accepted while `Active`. Keeping at most one active list per channel is the caller's job,
//! see `TierService::activate`.

use chrono::{DateTime, Utc};

use crate::error::{Result, TierError};
use crate::models::{TierList, TierListStatus};

pub fn activate(list: &mut TierList, now: DateTime<Utc>) -> Result<()> {
    match list.status {
        TierListStatus::Draft => {
            list.status = TierListStatus::Active;
            list.start_time = Some(now);
            list.end_time = None;
            Ok(())
        }
        TierListStatus::Completed => {
            // Reactivation keeps the ballots and the original start time
            list.status = TierListStatus::Active;
            list.start_time.get_or_insert(now);
            list.end_time = None;
            Ok(())
        }
        TierListStatus::Active => Err(TierError::InvalidState(format!(
            "tier list {} is already active",
            list.id
        ))),
    }
}

pub fn complete(list: &mut TierList, now: DateTime<Utc>) -> Result<()> {
    match list.status {
        TierListStatus::Active => {
            list.status = TierListStatus::Completed;
            list.end_time = Some(now);
            Ok(())
        }
        other => Err(TierError::InvalidState(format!(
            "tier list {} is {}, only active lists can be completed",
            list.id,
            other.as_str()
        ))),
    }
}

pub fn ensure_accepting_ballots(list: &TierList) -> Result<()> {
    ensure_active(list, "accepting votes")
}

pub fn ensure_accepting_suggestions(list: &TierList) -> Result<()> {
    ensure_active(list, "accepting suggestions")
}

pub fn ensure_deletable(list: &TierList) -> Result<()> {
    if list.status == TierListStatus::Active {
        return Err(TierError::InvalidState(format!(
            "tier list {} is active, complete it before deleting",
            list.id
        )));
    }
    Ok(())
}

pub fn ensure_analyzable(list: &TierList) -> Result<()> {
    if list.status != TierListStatus::Completed {
        return Err(TierError::InvalidState(format!(
            "analytics are only available for completed tier lists, {} is {}",
            list.id,
            list.status.as_str()
        )));
    }
    Ok(())
}

fn ensure_active(list: &TierList, what: &str) -> Result<()> {
    if list.status != TierListStatus::Active {
        return Err(TierError::InvalidState(format!(
            "tier list {} is {} and not {}",
            list.id,
            list.status.as_str(),
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voting::scale::TierScale;
    use chrono::Duration;

    fn draft() -> TierList {
        TierList::new("chan".into(), "Games".into(), Vec::new(), TierScale::default())
    }

    #[test]
    fn draft_activates_and_completes() {
        let mut list = draft();
        let start = Utc::now();
        activate(&mut list, start).unwrap();
        assert_eq!(list.status, TierListStatus::Active);
        assert_eq!(list.start_time, Some(start));

        let end = start + Duration::minutes(5);
        complete(&mut list, end).unwrap();
        assert_eq!(list.status, TierListStatus::Completed);
        assert_eq!(list.end_time, Some(end));
    }

    #[test]
    fn reactivation_clears_end_time() {
        let mut list = draft();
        let start = Utc::now();
        activate(&mut list, start).unwrap();
        complete(&mut list, start + Duration::minutes(1)).unwrap();

        activate(&mut list, start + Duration::minutes(2)).unwrap();
        assert_eq!(list.status, TierListStatus::Active);
        assert_eq!(list.end_time, None);
        assert_eq!(list.start_time, Some(start));
    }

    #[test]
    fn illegal_transitions_fail() {
        let mut list = draft();
        assert!(matches!(complete(&mut list, Utc::now()), Err(TierError::InvalidState(_))));

        activate(&mut list, Utc::now()).unwrap();
        assert!(matches!(activate(&mut list, Utc::now()), Err(TierError::InvalidState(_))));
    }

    #[test]
    fn gates_follow_status() {
        let mut list = draft();
        assert!(ensure_accepting_ballots(&list).is_err());
        assert!(ensure_deletable(&list).is_ok());
        assert!(ensure_analyzable(&list).is_err());

        activate(&mut list, Utc::now()).unwrap();
        assert!(ensure_accepting_ballots(&list).is_ok());
        assert!(ensure_accepting_suggestions(&list).is_ok());
        assert!(ensure_deletable(&list).is_err());

        complete(&mut list, Utc::now()).unwrap();
        assert!(ensure_accepting_ballots(&list).is_err());
        assert!(ensure_analyzable(&list).is_ok());
        assert!(ensure_deletable(&list).is_ok());
    }
}
