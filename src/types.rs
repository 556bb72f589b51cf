//! Shared types for GRIDIRON.
//!
//! These types form the data model used across all modules. Fetch,
//! storage, enrichment and aggregation code depend on them without
//! depending on each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Highest week number the league API accepts (regular season + playoffs).
pub const MAX_WEEK: u8 = 22;

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// A league resource served by the primary league API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Rosters,
    Matchups,
    Transactions,
    TradedPicks,
}

impl ResourceKind {
    pub const ALL: &'static [ResourceKind] = &[
        ResourceKind::Rosters,
        ResourceKind::Matchups,
        ResourceKind::Transactions,
        ResourceKind::TradedPicks,
    ];

    /// Stable identifier used as the snapshot table discriminator.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Rosters => "rosters",
            ResourceKind::Matchups => "matchups",
            ResourceKind::Transactions => "transactions",
            ResourceKind::TradedPicks => "traded_picks",
        }
    }

    /// Matchups and transactions are addressed by week.
    pub fn requires_week(&self) -> bool {
        matches!(self, ResourceKind::Matchups | ResourceKind::Transactions)
    }

    /// Whether an empty collection for an existing league is suspicious.
    ///
    /// A league always has rosters and, once the season starts, matchups.
    /// Zero transactions or traded picks is an ordinary state.
    pub fn empty_is_suspicious(&self) -> bool {
        matches!(self, ResourceKind::Rosters | ResourceKind::Matchups)
    }

    /// Default freshness window for snapshots of this kind.
    pub fn default_ttl(&self) -> chrono::Duration {
        match self {
            ResourceKind::Rosters => chrono::Duration::hours(1),
            ResourceKind::Matchups | ResourceKind::Transactions => chrono::Duration::minutes(10),
            ResourceKind::TradedPicks => chrono::Duration::hours(6),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = GridironError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rosters" => Ok(ResourceKind::Rosters),
            "matchups" => Ok(ResourceKind::Matchups),
            "transactions" => Ok(ResourceKind::Transactions),
            "traded_picks" | "tradedpicks" | "traded-picks" => Ok(ResourceKind::TradedPicks),
            _ => Err(GridironError::Validation(format!("Unknown resource kind: {s}"))),
        }
    }
}

/// Identity of one fetchable resource: `(kind, league, subKey?)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub league_id: String,
    /// Week number for weekly resources.
    pub sub_key: Option<String>,
}

impl ResourceKey {
    /// Key for a league-wide resource (rosters, traded picks).
    pub fn league(kind: ResourceKind, league_id: impl Into<String>) -> Self {
        Self {
            kind,
            league_id: league_id.into(),
            sub_key: None,
        }
    }

    /// Key for a weekly resource (matchups, transactions).
    pub fn weekly(kind: ResourceKind, league_id: impl Into<String>, week: u8) -> Self {
        Self {
            kind,
            league_id: league_id.into(),
            sub_key: Some(week.to_string()),
        }
    }

    /// The week encoded in `sub_key`, if any.
    pub fn week(&self) -> Option<u8> {
        self.sub_key.as_deref().and_then(|s| s.parse().ok())
    }

    /// Reject malformed caller input before any upstream call is made.
    pub fn validate(&self) -> Result<(), GridironError> {
        if self.league_id.is_empty() {
            return Err(GridironError::Validation("league id must not be empty".into()));
        }
        if !self.league_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(GridironError::Validation(format!(
                "league id must be alphanumeric: {}",
                self.league_id
            )));
        }
        match (self.kind.requires_week(), self.sub_key.as_deref()) {
            (true, None) => Err(GridironError::Validation(format!(
                "{} requires a week number",
                self.kind
            ))),
            (true, Some(raw)) => match raw.parse::<u8>() {
                Ok(w) if (1..=MAX_WEEK).contains(&w) => Ok(()),
                _ => Err(GridironError::Validation(format!(
                    "week must be between 1 and {MAX_WEEK}, got {raw}"
                ))),
            },
            (false, Some(raw)) => Err(GridironError::Validation(format!(
                "{} does not take a sub key, got {raw}",
                self.kind
            ))),
            (false, None) => Ok(()),
        }
    }

    /// Sub key as stored in the snapshot table (empty string when absent).
    pub fn storage_sub_key(&self) -> &str {
        self.sub_key.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_key {
            Some(sub) => write!(f, "{}/{}/{}", self.kind, self.league_id, sub),
            None => write!(f, "{}/{}", self.kind, self.league_id),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch outcomes
// ---------------------------------------------------------------------------

/// Why an upstream attempt did not yield usable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    Timeout,
    Network,
    RateLimited,
    ServerError,
    NotFound,
    AccessDenied,
    EmptyAnomaly,
    Unexpected,
}

impl FailureReason {
    /// 401/403/404 end the retry loop immediately.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FailureReason::NotFound | FailureReason::AccessDenied)
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureReason::Timeout
                | FailureReason::Network
                | FailureReason::RateLimited
                | FailureReason::ServerError
                | FailureReason::EmptyAnomaly
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::Network => "network",
            FailureReason::RateLimited => "rateLimited",
            FailureReason::ServerError => "serverError",
            FailureReason::NotFound => "notFound",
            FailureReason::AccessDenied => "accessDenied",
            FailureReason::EmptyAnomaly => "emptyAnomaly",
            FailureReason::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged result of a single upstream attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(serde_json::Value),
    RetryableFailure {
        reason: FailureReason,
        detail: String,
    },
    TerminalFailure {
        reason: FailureReason,
        http_status: Option<u16>,
        detail: String,
    },
}

impl FetchOutcome {
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            FetchOutcome::Success(_) => None,
            FetchOutcome::RetryableFailure { reason, .. }
            | FetchOutcome::TerminalFailure { reason, .. } => Some(*reason),
        }
    }
}

/// Current NFL season position, used to pick cache rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonContext {
    pub season: u16,
    pub week: u8,
}

impl SeasonContext {
    pub fn new(season: u16, week: u8) -> Self {
        Self { season, week }
    }

    pub fn previous_week(&self) -> Option<u8> {
        (self.week > 1).then(|| self.week - 1)
    }
}

impl fmt::Display for SeasonContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} week {}", self.season, self.week)
    }
}

// ---------------------------------------------------------------------------
// Cached reference data
// ---------------------------------------------------------------------------

/// Static identity of a player (or a team defense unit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Athlete {
    pub player_id: String,
    pub full_name: String,
    pub position: String,
    pub team: Option<String>,
    /// 1 = starter, 2 = second string, ...
    pub depth_chart_order: Option<u8>,
    /// Game status as published by the league API's player directory.
    pub injury_status: Option<String>,
    /// Cross-reference id used by the secondary stats provider.
    pub espn_id: Option<String>,
}

impl Athlete {
    /// Team defense / special teams units carry no individual usage.
    pub fn is_defense(&self) -> bool {
        matches!(self.position.as_str(), "DEF" | "DST" | "D/ST")
    }

    /// Receiving and rushing skill positions get usage trends.
    pub fn is_skill_position(&self) -> bool {
        matches!(self.position.as_str(), "RB" | "WR" | "TE" | "FB")
    }
}

/// One player's participation and usage for one week.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsageRow {
    pub player_id: String,
    pub team: Option<String>,
    /// Offensive snap share, 0–100.
    pub snap_pct: Option<f64>,
    pub targets: Option<f64>,
    pub routes: Option<f64>,
    pub rz_touches: Option<f64>,
}

/// One game on the weekly schedule, by team abbreviation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledGame {
    pub home: String,
    pub away: String,
}

// ---------------------------------------------------------------------------
// Enrichment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SnapPctSource {
    Cached,
    Estimated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpponentSource {
    Cached,
    Fetched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PracticeStatusSource {
    Cached,
    DerivedFromInjury,
    DefaultHealthy,
}

/// Weekly practice participation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PracticeStatus {
    #[serde(rename = "DNP")]
    DidNotPractice,
    Limited,
    Full,
}

impl PracticeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeStatus::DidNotPractice => "DNP",
            PracticeStatus::Limited => "Limited",
            PracticeStatus::Full => "Full",
        }
    }

    /// Parse a raw practice-report string through the status vocabulary.
    pub fn parse(raw: &str) -> Option<Self> {
        match InjuryStatus::normalize(raw) {
            InjuryStatus::DidNotPractice => Some(PracticeStatus::DidNotPractice),
            InjuryStatus::Limited => Some(PracticeStatus::Limited),
            InjuryStatus::Full => Some(PracticeStatus::Full),
            _ => None,
        }
    }

    /// Infer participation from a game-status designation.
    pub fn from_injury(status: &InjuryStatus) -> Self {
        match status {
            InjuryStatus::Out | InjuryStatus::InjuredReserve => PracticeStatus::DidNotPractice,
            InjuryStatus::Doubtful | InjuryStatus::Questionable => PracticeStatus::Limited,
            _ => PracticeStatus::Full,
        }
    }
}

impl fmt::Display for PracticeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// Averages over the most recent (up to three) weeks of usage rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rz_touches_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_share_avg: Option<f64>,
    pub samples: u32,
}

/// Per-metric direction of the latest week against the prior weeks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTrend {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routes: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rz_touches: Option<Trend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_share: Option<Trend>,
}

/// A player reference with derived, provenance-tagged fields.
///
/// Every optional field is additive: `None` means unknown, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPlayerRef {
    pub player_id: String,
    pub full_name: String,
    pub position: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_pct_source: Option<SnapPctSource>,
    /// Week the participation share was taken from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snap_pct_week: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_source: Option<OpponentSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injury_status: Option<InjuryStatus>,
    pub practice_status: PracticeStatus,
    pub practice_status_source: PracticeStatusSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_last3_weeks: Option<UsageWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_trend: Option<UsageTrend>,
}

impl fmt::Display for EnrichedPlayerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}", self.full_name, self.position)?;
        if let Some(team) = &self.team {
            write!(f, ", {team}")?;
        }
        write!(f, ")")?;
        if let Some(pct) = self.snap_pct {
            write!(f, " snap={pct:.0}%")?;
        }
        if let Some(status) = &self.injury_status {
            write!(f, " [{status}]")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Injuries
// ---------------------------------------------------------------------------

/// Normalized injury / availability vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InjuryStatus {
    Active,
    Probable,
    Questionable,
    Doubtful,
    Out,
    InjuredReserve,
    Pup,
    Suspended,
    Nfi,
    DayToDay,
    DidNotPractice,
    Limited,
    Full,
    /// Unrecognized status, title-cased.
    Other(String),
}

/// Raw spellings seen across providers, lowercase.
const STATUS_VOCABULARY: &[(&[&str], InjuryStatus)] = &[
    (&["active", "healthy", "act"], InjuryStatus::Active),
    (&["probable", "p"], InjuryStatus::Probable),
    (&["questionable", "q", "ques"], InjuryStatus::Questionable),
    (&["doubtful", "d"], InjuryStatus::Doubtful),
    (&["out", "o", "inactive"], InjuryStatus::Out),
    (
        &["ir", "injured reserve", "injured_reserve", "reserve/injured", "ir-r", "ir-dfr"],
        InjuryStatus::InjuredReserve,
    ),
    (
        &["pup", "physically unable to perform", "reserve/pup", "pup-r", "pup-p"],
        InjuryStatus::Pup,
    ),
    (&["suspended", "sus", "suspension", "reserve/suspended"], InjuryStatus::Suspended),
    (&["nfi", "non-football injury", "nfi-r", "nfi-a"], InjuryStatus::Nfi),
    (&["day-to-day", "day to day", "dtd"], InjuryStatus::DayToDay),
    (
        &["dnp", "did not practice", "did not participate", "did not participate in practice"],
        InjuryStatus::DidNotPractice,
    ),
    (
        &["limited", "lp", "limited participation", "limited participation in practice"],
        InjuryStatus::Limited,
    ),
    (
        &["full", "fp", "full participation", "full participation in practice"],
        InjuryStatus::Full,
    ),
];

impl InjuryStatus {
    /// Map a provider's raw status string onto the shared vocabulary.
    pub fn normalize(raw: &str) -> Self {
        let key = raw.trim().to_lowercase();
        STATUS_VOCABULARY
            .iter()
            .find(|(spellings, _)| spellings.contains(&key.as_str()))
            .map(|(_, status)| status.clone())
            .unwrap_or_else(|| InjuryStatus::Other(title_case(raw.trim())))
    }

    pub fn as_str(&self) -> &str {
        match self {
            InjuryStatus::Active => "Active",
            InjuryStatus::Probable => "Probable",
            InjuryStatus::Questionable => "Questionable",
            InjuryStatus::Doubtful => "Doubtful",
            InjuryStatus::Out => "Out",
            InjuryStatus::InjuredReserve => "IR",
            InjuryStatus::Pup => "PUP",
            InjuryStatus::Suspended => "Suspended",
            InjuryStatus::Nfi => "NFI",
            InjuryStatus::DayToDay => "Day-To-Day",
            InjuryStatus::DidNotPractice => "DNP",
            InjuryStatus::Limited => "Limited",
            InjuryStatus::Full => "Full",
            InjuryStatus::Other(s) => s.as_str(),
        }
    }

    /// Urgency ordinal, 1 (playing) to 5 (long-term unavailable).
    pub fn severity(&self) -> u8 {
        match self {
            InjuryStatus::Active | InjuryStatus::Probable | InjuryStatus::Full => 1,
            InjuryStatus::Questionable | InjuryStatus::Limited | InjuryStatus::DayToDay => 2,
            InjuryStatus::Doubtful | InjuryStatus::DidNotPractice => 3,
            InjuryStatus::Out => 4,
            InjuryStatus::InjuredReserve
            | InjuryStatus::Pup
            | InjuryStatus::Suspended
            | InjuryStatus::Nfi => 5,
            InjuryStatus::Other(_) => 2,
        }
    }
}

impl fmt::Display for InjuryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for InjuryStatus {
    fn from(raw: String) -> Self {
        InjuryStatus::normalize(&raw)
    }
}

impl From<InjuryStatus> for String {
    fn from(status: InjuryStatus) -> Self {
        status.as_str().to_string()
    }
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// One provider's view of a player's injury, before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryObservation {
    pub player_id: String,
    pub team_id: String,
    pub position: Option<String>,
    /// Raw, provider-specific status string.
    pub status: String,
    pub description: Option<String>,
    pub date_reported: Option<String>,
    /// Raw practice participation, when the provider reports it.
    pub practice_status: Option<String>,
}

/// Merged injury record across sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjuryReport {
    pub player_id: String,
    pub team_id: String,
    pub position: Option<String>,
    pub status: InjuryStatus,
    pub severity: u8,
    pub confidence: u8,
    pub sources: BTreeSet<String>,
    pub description: Option<String>,
    pub date_reported: Option<String>,
}

impl fmt::Display for InjuryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {} sev={} conf={}% [{}]",
            self.player_id,
            self.team_id,
            self.status,
            self.severity,
            self.confidence,
            self.sources.iter().cloned().collect::<Vec<_>>().join(", "),
        )
    }
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// Error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Validation,
    AccessDenied,
    NotFound,
    RateLimited,
    Timeout,
    Network,
    ServerError,
    EmptyAnomaly,
    Unexpected,
}

impl From<FailureReason> for ErrorType {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::Timeout => ErrorType::Timeout,
            FailureReason::Network => ErrorType::Network,
            FailureReason::RateLimited => ErrorType::RateLimited,
            FailureReason::ServerError => ErrorType::ServerError,
            FailureReason::NotFound => ErrorType::NotFound,
            FailureReason::AccessDenied => ErrorType::AccessDenied,
            FailureReason::EmptyAnomaly => ErrorType::EmptyAnomaly,
            FailureReason::Unexpected => ErrorType::Unexpected,
        }
    }
}

/// What every core read returns.
///
/// Callers tell "fresh success", "stale but served" and "hard failure"
/// apart with `success` and `stale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub stale: bool,
    pub retries_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_age_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Envelope {
    /// Fresh data straight from upstream.
    pub fn fresh(data: serde_json::Value, retries_used: u32) -> Self {
        Self {
            success: true,
            data: Some(data),
            stale: false,
            retries_used,
            failure_reason: None,
            snapshot_fetched_at: None,
            snapshot_age_seconds: None,
            warning: None,
            error: None,
            error_type: None,
            hint: None,
        }
    }

    /// Caller input rejected before any upstream call.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            stale: false,
            retries_used: 0,
            failure_reason: None,
            snapshot_fetched_at: None,
            snapshot_age_seconds: None,
            warning: None,
            error: Some(message.into()),
            error_type: Some(ErrorType::Validation),
            hint: None,
        }
    }

    /// Hard failure with no data available.
    pub fn failure(
        reason: FailureReason,
        retries_used: u32,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            stale: false,
            retries_used,
            failure_reason: Some(reason),
            snapshot_fetched_at: None,
            snapshot_age_seconds: None,
            warning: None,
            error: Some(message.into()),
            error_type: Some(reason.into()),
            hint,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for GRIDIRON.
#[derive(Debug, thiserror::Error)]
pub enum GridironError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
