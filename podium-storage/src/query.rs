//! Read contracts built on the backend scans

use crate::{StorageResult, StorageTrait};
use podium_core::{
    LeaderboardEntry, LeaderboardQuery, TeamFilter, TeamId, TeamQualificationRow,
};
use std::collections::HashMap;

pub fn team_ids<S: StorageTrait + ?Sized>(
    storage: &S,
    filter: &TeamFilter,
) -> StorageResult<Vec<TeamId>> {
    Ok(storage
        .teams()?
        .into_iter()
        .filter(|team| filter.matches(team))
        .map(|team| team.id)
        .collect())
}

pub fn team_id_by_number<S: StorageTrait + ?Sized>(
    storage: &S,
    number: &str,
) -> StorageResult<Option<TeamId>> {
    let number = number.trim();
    Ok(storage
        .teams()?
        .into_iter()
        .find(|team| team.number.eq_ignore_ascii_case(number))
        .map(|team| team.id))
}

pub fn leaderboard<S: StorageTrait + ?Sized>(
    storage: &S,
    query: &LeaderboardQuery,
) -> StorageResult<Vec<LeaderboardEntry>> {
    let statuses: HashMap<TeamId, _> = storage
        .qualifications()?
        .into_iter()
        .map(|q| (q.team_id, q.status))
        .collect();

    let mut entries: Vec<LeaderboardEntry> = storage
        .teams()?
        .into_iter()
        .filter(|team| query.filter.matches(team))
        .map(|team| {
            let status = statuses.get(&team.id).copied().unwrap_or_default();
            LeaderboardEntry { team, status }
        })
        .filter(|entry| !query.exclude_statuses.contains(&entry.status))
        .collect();

    // Unranked teams (rank 0) go last.
    entries.sort_by_key(|entry| {
        let rank = entry.team.world_rank;
        (rank == 0, rank, entry.team.id)
    });

    if let Some(limit) = query.limit {
        entries.truncate(limit);
    }
    Ok(entries)
}

pub fn team_qualifications<S: StorageTrait + ?Sized>(
    storage: &S,
) -> StorageResult<Vec<TeamQualificationRow>> {
    let teams: HashMap<TeamId, _> = storage
        .teams()?
        .into_iter()
        .map(|team| (team.id, team))
        .collect();

    Ok(storage
        .qualifications()?
        .into_iter()
        .filter_map(|q| {
            teams.get(&q.team_id).map(|team| TeamQualificationRow {
                number: team.number.clone(),
                organization: team.organization.clone(),
                status: q.status,
            })
        })
        .collect())
}
