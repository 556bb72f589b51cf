//! Multi-source injury confidence aggregator.
//!
//! Merges per-player injury observations from independent providers into
//! one `InjuryReport` per `(player, team)`. The primary source seeds the
//! map; secondary sources corroborate (raising confidence) or disagree
//! (keeping the primary status). Pure function, no error path.

use std::collections::{BTreeSet, HashMap};

use crate::types::{InjuryObservation, InjuryReport, InjuryStatus};

/// Baseline for keys the primary source reported.
const PRIMARY_BASE: u32 = 40;

/// Baseline for keys only secondary sources reported.
const SECONDARY_BASE: u32 = 20;

const PER_SOURCE: u32 = 20;
const SOURCE_CAP: u32 = 40;
const AGREEMENT_BONUS: u32 = 20;

/// One provider's batch of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReports {
    pub source: String,
    pub primary: bool,
    pub observations: Vec<InjuryObservation>,
}

impl SourceReports {
    pub fn primary(source: impl Into<String>, observations: Vec<InjuryObservation>) -> Self {
        Self {
            source: source.into(),
            primary: true,
            observations,
        }
    }

    pub fn secondary(source: impl Into<String>, observations: Vec<InjuryObservation>) -> Self {
        Self {
            source: source.into(),
            primary: false,
            observations,
        }
    }
}

/// `base + min(40, 20 * sources) + (20 if statuses agree)`, capped at 100.
pub fn confidence(primary: bool, sources: usize, agree: bool) -> u8 {
    let base = if primary { PRIMARY_BASE } else { SECONDARY_BASE };
    let corroboration = (PER_SOURCE * sources as u32).min(SOURCE_CAP);
    let bonus = if agree { AGREEMENT_BONUS } else { 0 };
    (base + corroboration + bonus).min(100) as u8
}

struct Merged {
    team_id: String,
    position: Option<String>,
    status: InjuryStatus,
    agree: bool,
    primary: bool,
    sources: BTreeSet<String>,
    description: Option<String>,
    date_reported: Option<String>,
}

/// Merge every source into one report per player, most severe first.
pub fn aggregate(sources: &[SourceReports]) -> Vec<InjuryReport> {
    let mut merged: HashMap<(String, String), Merged> = HashMap::new();

    let ordered = sources
        .iter()
        .filter(|s| s.primary)
        .chain(sources.iter().filter(|s| !s.primary));

    for batch in ordered {
        for obs in &batch.observations {
            let key = (obs.player_id.clone(), obs.team_id.clone());
            let status = InjuryStatus::normalize(&obs.status);

            match merged.get_mut(&key) {
                None => {
                    merged.insert(
                        key,
                        Merged {
                            team_id: obs.team_id.clone(),
                            position: obs.position.clone(),
                            status,
                            agree: true,
                            primary: batch.primary,
                            sources: BTreeSet::from([batch.source.clone()]),
                            description: obs.description.clone(),
                            date_reported: obs.date_reported.clone(),
                        },
                    );
                }
                Some(entry) => {
                    // Repeat reports from one source count once.
                    if !entry.sources.insert(batch.source.clone()) {
                        continue;
                    }
                    if entry.status != status {
                        entry.agree = false;
                    }
                    if entry.description.is_none() {
                        entry.description = obs.description.clone();
                    }
                    if entry.position.is_none() {
                        entry.position = obs.position.clone();
                    }
                    if entry.date_reported.is_none() {
                        entry.date_reported = obs.date_reported.clone();
                    }
                }
            }
        }
    }

    let mut reports: Vec<InjuryReport> = merged
        .into_iter()
        .map(|((player_id, _), m)| InjuryReport {
            player_id,
            team_id: m.team_id,
            position: m.position,
            severity: m.status.severity(),
            confidence: confidence(m.primary, m.sources.len(), m.agree),
            status: m.status,
            sources: m.sources,
            description: m.description,
            date_reported: m.date_reported,
        })
        .collect();

    reports.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.player_id.cmp(&b.player_id))
            .then_with(|| a.team_id.cmp(&b.team_id))
    });
    reports
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(player: &str, status: &str) -> InjuryObservation {
        InjuryObservation {
            player_id: player.to_string(),
            team_id: "KC".to_string(),
            position: None,
            status: status.to_string(),
            description: None,
            date_reported: None,
            practice_status: None,
        }
    }

    #[test]
    fn test_confidence_formula() {
        assert_eq!(confidence(true, 1, true), 80);
        assert_eq!(confidence(true, 2, true), 100);
        assert_eq!(confidence(true, 2, false), 80);
        assert_eq!(confidence(false, 1, true), 60);
        assert_eq!(confidence(true, 5, true), 100);
    }

    #[test]
    fn test_single_primary_source() {
        let out = aggregate(&[SourceReports::primary("sleeper", vec![obs("1", "Q")])]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, InjuryStatus::Questionable);
        assert_eq!(out[0].severity, 2);
        assert_eq!(out[0].confidence, 80);
    }

    #[test]
    fn test_agreeing_secondary_raises_confidence() {
        let out = aggregate(&[
            SourceReports::primary("sleeper", vec![obs("1", "Out")]),
            SourceReports::secondary("espn", vec![obs("1", "out")]),
        ]);
        assert_eq!(out[0].confidence, 100);
        assert_eq!(out[0].sources.len(), 2);
    }

    #[test]
    fn test_disagreement_keeps_primary_status() {
        let mut secondary = obs("1", "Doubtful");
        secondary.description = Some("Hamstring".into());
        let out = aggregate(&[
            SourceReports::secondary("espn", vec![secondary]),
            SourceReports::primary("sleeper", vec![obs("1", "Questionable")]),
        ]);
        assert_eq!(out[0].status, InjuryStatus::Questionable);
        assert_eq!(out[0].confidence, 80);
        assert_eq!(out[0].description.as_deref(), Some("Hamstring"));
    }

    #[test]
    fn test_secondary_only_uses_lower_base() {
        let out = aggregate(&[
            SourceReports::primary("sleeper", vec![]),
            SourceReports::secondary("espn", vec![obs("7", "IR")]),
        ]);
        assert_eq!(out[0].confidence, 60);
        assert_eq!(out[0].severity, 5);
    }

    #[test]
    fn test_duplicate_source_counts_once() {
        let out = aggregate(&[SourceReports::primary(
            "sleeper",
            vec![obs("1", "Out"), obs("1", "Questionable")],
        )]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].status, InjuryStatus::Out);
        assert_eq!(out[0].confidence, 80);
    }

    #[test]
    fn test_confidence_never_drops_with_more_sources() {
        let one = aggregate(&[SourceReports::primary("a", vec![obs("1", "Out")])]);
        let agreeing = aggregate(&[
            SourceReports::primary("a", vec![obs("1", "Out")]),
            SourceReports::secondary("b", vec![obs("1", "Out")]),
        ]);
        let disagreeing = aggregate(&[
            SourceReports::primary("a", vec![obs("1", "Out")]),
            SourceReports::secondary("b", vec![obs("1", "Questionable")]),
        ]);
        assert!(agreeing[0].confidence >= one[0].confidence);
        assert!(disagreeing[0].confidence >= one[0].confidence);
    }

    #[test]
    fn test_sorted_by_severity_then_player() {
        let out = aggregate(&[SourceReports::primary(
            "sleeper",
            vec![obs("b", "Questionable"), obs("c", "IR"), obs("a", "Questionable")],
        )]);
        let ids: Vec<&str> = out.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_unknown_status_title_cased() {
        let out = aggregate(&[SourceReports::primary("sleeper", vec![obs("1", "COVID list")])]);
        assert_eq!(out[0].status, InjuryStatus::Other("Covid List".into()));
        assert_eq!(out[0].severity, 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(aggregate(&[]).is_empty());
    }
}
