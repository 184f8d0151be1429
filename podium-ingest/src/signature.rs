//! Signature-event sweep.
//!
//! Winners of the headline awards at Signature events qualify directly for
//! the World Championship, whatever their award list says.

use podium_core::{Qualification, QualificationStatus, StorageError, TeamId, UpsertPolicy};
use podium_remote::{HttpTransport, RemoteClient};
use podium_storage::StorageTrait;
use std::collections::BTreeSet;

/// Award titles at a Signature event that carry a World spot.
pub const SIGNATURE_AWARD_TITLES: [&str; 2] = ["Excellence", "Tournament Champions"];

/// WORLD qualifications for every winner of a qualifying award at a
/// Signature event whose awards are finalized.
///
/// A failed event listing yields nothing; a failed per-event award fetch is
/// logged and that event skipped.
pub async fn collect_signature_qualifications<T: HttpTransport>(
    client: &RemoteClient<T>,
) -> Vec<Qualification> {
    let events = match client.signature_events().await {
        Ok(events) => events,
        Err(e) => {
            tracing::error!(error = %e, "Signature event listing failed");
            return Vec::new();
        }
    };

    let finalized: Vec<i64> = events
        .iter()
        .filter(|event| event.awards_finalized)
        .map(|event| event.id)
        .collect();
    tracing::info!(
        events = events.len(),
        finalized = finalized.len(),
        "Checking Signature events"
    );

    let mut winners = BTreeSet::new();
    for event_id in finalized {
        let awards = match client.event_awards(event_id).await {
            Ok(awards) => awards,
            Err(e) => {
                tracing::error!(event_id, error = %e, "Failed GET on event awards; skipping");
                continue;
            }
        };
        for award in awards
            .iter()
            .filter(|award| award.title_contains_any(&SIGNATURE_AWARD_TITLES))
        {
            winners.extend(award.team_winners.iter().map(|w| TeamId(w.team.id)));
        }
    }

    winners
        .into_iter()
        .map(|team_id| Qualification::new(team_id, QualificationStatus::World))
        .collect()
}

/// Merge qualifications into storage with the monotonic policy, in one commit.
pub fn apply_qualifications<S: StorageTrait>(
    storage: &S,
    qualifications: &[Qualification],
) -> Result<usize, StorageError> {
    let mut session = storage.session();
    for q in qualifications {
        session.upsert_qualification(q.team_id, q.status, UpsertPolicy::Monotonic)?;
    }
    session.commit()?;
    Ok(qualifications.len())
}
