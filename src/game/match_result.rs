//! Match result and ranking system
//!
//! Win-condition evaluation (run every tick) and final rankings.

use serde::{Deserialize, Serialize};

use crate::game::state::{CombatantId, GameMode, GameState, MatchOutcome, Millis};

/// Final match result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub outcome: MatchOutcome,
    pub winner_name: Option<String>,
    pub rankings: Vec<CombatantRanking>,
    pub duration_ms: Millis,
    pub total_kills: u32,
}

/// One combatant's line in the results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatantRanking {
    pub id: CombatantId,
    pub name: String,
    pub rank: u32,
    pub kills: u32,
    pub deaths: u32,
    pub survived: bool,
    pub is_bot: bool,
}

/// Evaluate the win condition for the current mode
pub fn check_match_end(state: &GameState) -> Option<MatchOutcome> {
    if state.combatants.is_empty() {
        return None;
    }

    match state.mode {
        GameMode::FirstToKills(target) => state
            .combatants
            .values()
            .filter(|c| c.kills >= target)
            // Highest count wins; equal counts go to the lowest spawn slot
            .max_by_key(|c| (c.kills, std::cmp::Reverse(c.slot)))
            .map(|c| MatchOutcome::Winner(c.id)),
        GameMode::LastStanding | GameMode::Lives(_) => {
            let mut remaining = state.combatants.values().filter(|c| !c.is_out());
            match (remaining.next(), remaining.next()) {
                (None, _) => Some(MatchOutcome::Draw),
                (Some(last), None) => Some(MatchOutcome::Winner(last.id)),
                _ => None,
            }
        }
    }
}

/// Rank every combatant: still in the match first, then kills, then fewest deaths
pub fn determine_result(state: &GameState, outcome: MatchOutcome, duration_ms: Millis) -> MatchResult {
    let mut entries: Vec<(u8, CombatantRanking)> = state
        .combatants
        .values()
        .map(|c| {
            (
                c.slot,
                CombatantRanking {
                    id: c.id,
                    name: c.name.clone(),
                    rank: 0,
                    kills: c.kills,
                    deaths: c.deaths,
                    survived: !c.is_out(),
                    is_bot: c.is_bot(),
                },
            )
        })
        .collect();

    entries.sort_by(|(slot_a, a), (slot_b, b)| {
        b.survived
            .cmp(&a.survived)
            .then_with(|| b.kills.cmp(&a.kills))
            .then_with(|| a.deaths.cmp(&b.deaths))
            .then_with(|| slot_a.cmp(slot_b))
    });

    let mut rankings: Vec<CombatantRanking> = entries.into_iter().map(|(_, r)| r).collect();
    for (i, ranking) in rankings.iter_mut().enumerate() {
        ranking.rank = (i + 1) as u32;
    }

    let total_kills = rankings.iter().map(|r| r.kills).sum();
    let winner_name = match outcome {
        MatchOutcome::Winner(id) => state.get_combatant(id).map(|c| c.name.clone()),
        MatchOutcome::Draw | MatchOutcome::Disconnect { .. } => None,
    };

    MatchResult {
        outcome,
        winner_name,
        rankings,
        duration_ms,
        total_kills,
    }
}
