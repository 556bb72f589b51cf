//! Field extraction for loosely-typed provider payloads.
//!
//! Providers rename fields between seasons and endpoints. Each logical
//! field has an ordered table of candidate names; the first one present
//! (and non-null) wins. Candidates may be dotted paths into nested
//! objects (`"athlete.id"`).

use serde_json::Value;

// ---------------------------------------------------------------------------
// Candidate tables
// ---------------------------------------------------------------------------

pub const PLAYER_ID: &[&str] = &["player_id", "sleeper_id", "playerId", "athlete.id", "id"];
pub const TEAM: &[&str] = &["team", "team_abbr", "teamAbbreviation", "team.abbreviation"];
pub const SNAP_PCT: &[&str] = &["snap_pct", "snapPct", "off_snp_pct", "offense_pct", "snap_share"];
pub const TARGETS: &[&str] = &["targets", "rec_tgt", "tgt"];
pub const ROUTES: &[&str] = &["routes_run", "routes", "route_participation", "rts"];
pub const RZ_TOUCHES: &[&str] = &["rz_touches", "redzone_touches", "red_zone_touches", "rz_tch"];
pub const ROW_CONTAINERS: &[&str] = &["players", "data", "rows", "items"];

pub const INJURY_STATUS: &[&str] = &["status", "type.description", "type.name", "injury_status"];
pub const INJURY_DESCRIPTION: &[&str] = &[
    "details.type",
    "shortComment",
    "description",
    "longComment",
    "injury_body_part",
];
pub const INJURY_DATE: &[&str] = &["date", "dateReported", "date_reported"];
pub const PRACTICE_STATUS: &[&str] = &["practiceStatus", "practice_status", "details.practice"];
pub const POSITION: &[&str] = &["position", "athlete.position.abbreviation", "fantasy_positions.0"];

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Resolve a dotted path. Numeric segments index into arrays.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// First non-null value across the candidates.
pub fn first<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|v| !v.is_null())
}

/// String field; numbers are rendered so numeric ids still match.
pub fn extract_str(value: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Numeric field; numeric strings (`"12.5"`) are accepted.
pub fn extract_f64(value: &Value, candidates: &[&str]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|f| f.is_finite())
}

pub fn extract_u8(value: &Value, candidates: &[&str]) -> Option<u8> {
    extract_f64(value, candidates)
        .filter(|f| *f >= 0.0 && *f <= f64::from(u8::MAX))
        .map(|f| f as u8)
}

/// Row list from a payload that is either a bare array or an object
/// wrapping one under a known container name.
pub fn rows(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(_) => ROW_CONTAINERS
            .iter()
            .find_map(|name| value.get(*name).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Snap share as a percentage. Fractions (`< 1.0`) are scaled up; a raw
/// `1.0` is read as one percent.
pub fn normalize_snap_pct(raw: f64) -> f64 {
    if raw < 1.0 {
        raw * 100.0
    } else {
        raw
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
