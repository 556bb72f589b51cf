//! Reference caches read by the enrichment engine.
//!
//! All writes are idempotent upserts (last writer wins); readers never
//! see partial rows. Backfills fill these tables on demand.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use super::{from_ms, to_ms, Store};
use crate::types::{
    Athlete, InjuryReport, InjuryStatus, PracticeStatus, ScheduledGame, UsageRow,
};

type AthleteRow = (
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<String>,
    Option<String>,
);

type InjuryRow = (
    String,
    String,
    Option<String>,
    String,
    i64,
    i64,
    String,
    Option<String>,
    Option<String>,
);

fn athlete_from_row(row: AthleteRow) -> Athlete {
    let (player_id, full_name, position, team, depth, injury_status, espn_id) = row;
    Athlete {
        player_id,
        full_name,
        position,
        team,
        depth_chart_order: depth.and_then(|d| u8::try_from(d).ok()),
        injury_status,
        espn_id,
    }
}

fn injury_from_row(row: InjuryRow) -> InjuryReport {
    let (player_id, team_id, position, status, severity, confidence, sources, description, date_reported) =
        row;
    InjuryReport {
        player_id,
        team_id,
        position,
        status: InjuryStatus::normalize(&status),
        severity: u8::try_from(severity).unwrap_or(1),
        confidence: u8::try_from(confidence).unwrap_or(0),
        sources: serde_json::from_str::<BTreeSet<String>>(&sources).unwrap_or_default(),
        description,
        date_reported,
    }
}

async fn write_injury(conn: &mut SqliteConnection, r: &InjuryReport, at: DateTime<Utc>) -> Result<()> {
    let sources = serde_json::to_string(&r.sources).context("Failed to serialise sources")?;
    sqlx::query(
        r#"
        INSERT INTO injuries
            (player_id, team_id, position, status, severity, confidence, sources,
             description, date_reported, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT (player_id) DO UPDATE SET
            team_id = excluded.team_id,
            position = excluded.position,
            status = excluded.status,
            severity = excluded.severity,
            confidence = excluded.confidence,
            sources = excluded.sources,
            description = excluded.description,
            date_reported = excluded.date_reported,
            updated_at_ms = excluded.updated_at_ms
        "#,
    )
    .bind(&r.player_id)
    .bind(&r.team_id)
    .bind(&r.position)
    .bind(r.status.as_str())
    .bind(i64::from(r.severity))
    .bind(i64::from(r.confidence))
    .bind(&sources)
    .bind(&r.description)
    .bind(&r.date_reported)
    .bind(to_ms(at))
    .execute(conn)
    .await
    .with_context(|| format!("Failed to upsert injury for {}", r.player_id))?;
    Ok(())
}

async fn write_practice(
    conn: &mut SqliteConnection,
    player_id: &str,
    status: PracticeStatus,
    at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO practice (player_id, status, updated_at_ms)
        VALUES (?1, ?2, ?3)
        ON CONFLICT (player_id) DO UPDATE SET
            status = excluded.status,
            updated_at_ms = excluded.updated_at_ms
        "#,
    )
    .bind(player_id)
    .bind(status.as_str())
    .bind(to_ms(at))
    .execute(conn)
    .await
    .with_context(|| format!("Failed to upsert practice for {player_id}"))?;
    Ok(())
}

impl Store {
    // -- Athletes --------------------------------------------------------

    pub async fn athlete_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM athletes")
            .fetch_one(self.pool())
            .await
            .context("Failed to count athletes")?;
        Ok(count)
    }

    /// Bulk upsert from the player directory, in one transaction.
    pub async fn upsert_athletes(&self, athletes: &[Athlete]) -> Result<usize> {
        let now = to_ms(Utc::now());
        let mut tx = self.pool().begin().await.context("Failed to begin athlete upsert")?;

        for a in athletes {
            sqlx::query(
                r#"
                INSERT INTO athletes
                    (player_id, full_name, position, team, depth_chart_order, injury_status, espn_id, updated_at_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (player_id) DO UPDATE SET
                    full_name = excluded.full_name,
                    position = excluded.position,
                    team = excluded.team,
                    depth_chart_order = excluded.depth_chart_order,
                    injury_status = excluded.injury_status,
                    espn_id = excluded.espn_id,
                    updated_at_ms = excluded.updated_at_ms
                "#,
            )
            .bind(&a.player_id)
            .bind(&a.full_name)
            .bind(&a.position)
            .bind(&a.team)
            .bind(a.depth_chart_order.map(i64::from))
            .bind(&a.injury_status)
            .bind(&a.espn_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert athlete {}", a.player_id))?;
        }

        tx.commit().await.context("Failed to commit athlete upsert")?;
        debug!(count = athletes.len(), "Athletes upserted");
        Ok(athletes.len())
    }

    pub async fn get_athlete(&self, player_id: &str) -> Result<Option<Athlete>> {
        let row: Option<AthleteRow> = sqlx::query_as(
            r#"
            SELECT player_id, full_name, position, team, depth_chart_order, injury_status, espn_id
            FROM athletes WHERE player_id = ?1
            "#,
        )
        .bind(player_id)
        .fetch_optional(self.pool())
        .await
        .with_context(|| format!("Failed to read athlete {player_id}"))?;
        Ok(row.map(athlete_from_row))
    }

    /// Athletes whose directory entry carries a game status.
    pub async fn athletes_with_injury_status(&self, team: Option<&str>) -> Result<Vec<Athlete>> {
        let rows: Vec<AthleteRow> = sqlx::query_as(
            r#"
            SELECT player_id, full_name, position, team, depth_chart_order, injury_status, espn_id
            FROM athletes
            WHERE injury_status IS NOT NULL AND injury_status != ''
              AND team IS NOT NULL
              AND (?1 IS NULL OR team = ?1)
            "#,
        )
        .bind(team)
        .fetch_all(self.pool())
        .await
        .context("Failed to read athlete injury statuses")?;
        Ok(rows.into_iter().map(athlete_from_row).collect())
    }

    /// Secondary-provider id → primary player id.
    pub async fn espn_id_map(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT espn_id, player_id FROM athletes WHERE espn_id IS NOT NULL",
        )
        .fetch_all(self.pool())
        .await
        .context("Failed to read espn id map")?;
        Ok(rows.into_iter().collect())
    }

    // -- Weekly usage ----------------------------------------------------

    pub async fn upsert_usage(&self, season: u16, week: u8, rows: &[UsageRow]) -> Result<usize> {
        let now = to_ms(Utc::now());
        let mut tx = self.pool().begin().await.context("Failed to begin usage upsert")?;

        for r in rows {
            sqlx::query(
                r#"
                INSERT INTO weekly_usage
                    (player_id, season, week, team, snap_pct, targets, routes, rz_touches, updated_at_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT (player_id, season, week) DO UPDATE SET
                    team = excluded.team,
                    snap_pct = excluded.snap_pct,
                    targets = excluded.targets,
                    routes = excluded.routes,
                    rz_touches = excluded.rz_touches,
                    updated_at_ms = excluded.updated_at_ms
                "#,
            )
            .bind(&r.player_id)
            .bind(i64::from(season))
            .bind(i64::from(week))
            .bind(&r.team)
            .bind(r.snap_pct)
            .bind(r.targets)
            .bind(r.routes)
            .bind(r.rz_touches)
            .bind(now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert usage for {}", r.player_id))?;
        }

        tx.commit().await.context("Failed to commit usage upsert")?;
        Ok(rows.len())
    }

    pub async fn get_usage(&self, player_id: &str, season: u16, week: u8) -> Result<Option<UsageRow>> {
        let row: Option<(Option<String>, Option<f64>, Option<f64>, Option<f64>, Option<f64>)> =
            sqlx::query_as(
                r#"
                SELECT team, snap_pct, targets, routes, rz_touches
                FROM weekly_usage
                WHERE player_id = ?1 AND season = ?2 AND week = ?3
                "#,
            )
            .bind(player_id)
            .bind(i64::from(season))
            .bind(i64::from(week))
            .fetch_optional(self.pool())
            .await
            .with_context(|| format!("Failed to read usage for {player_id}"))?;

        Ok(row.map(|(team, snap_pct, targets, routes, rz_touches)| UsageRow {
            player_id: player_id.to_string(),
            team,
            snap_pct,
            targets,
            routes,
            rz_touches,
        }))
    }

    /// Up to `limit` most recent weeks at or before `through_week`,
    /// newest first.
    pub async fn recent_usage(
        &self,
        player_id: &str,
        season: u16,
        through_week: u8,
        limit: u32,
    ) -> Result<Vec<(u8, UsageRow)>> {
        let rows: Vec<(i64, Option<String>, Option<f64>, Option<f64>, Option<f64>, Option<f64>)> =
            sqlx::query_as(
                r#"
                SELECT week, team, snap_pct, targets, routes, rz_touches
                FROM weekly_usage
                WHERE player_id = ?1 AND season = ?2 AND week <= ?3
                ORDER BY week DESC
                LIMIT ?4
                "#,
            )
            .bind(player_id)
            .bind(i64::from(season))
            .bind(i64::from(through_week))
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
            .with_context(|| format!("Failed to read recent usage for {player_id}"))?;

        Ok(rows
            .into_iter()
            .map(|(week, team, snap_pct, targets, routes, rz_touches)| {
                (
                    u8::try_from(week).unwrap_or(0),
                    UsageRow {
                        player_id: player_id.to_string(),
                        team,
                        snap_pct,
                        targets,
                        routes,
                        rz_touches,
                    },
                )
            })
            .collect())
    }

    // -- Schedule --------------------------------------------------------

    /// Store both directions of every game for the week.
    pub async fn upsert_schedule(&self, season: u16, week: u8, games: &[ScheduledGame]) -> Result<usize> {
        let mut tx = self.pool().begin().await.context("Failed to begin schedule upsert")?;

        for game in games {
            for (team, opponent) in [(&game.home, &game.away), (&game.away, &game.home)] {
                sqlx::query(
                    r#"
                    INSERT INTO schedule (season, week, team_id, opponent)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT (season, week, team_id) DO UPDATE SET opponent = excluded.opponent
                    "#,
                )
                .bind(i64::from(season))
                .bind(i64::from(week))
                .bind(team)
                .bind(opponent)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to upsert schedule for {team}"))?;
            }
        }

        tx.commit().await.context("Failed to commit schedule upsert")?;
        Ok(games.len())
    }

    pub async fn get_opponent(&self, season: u16, week: u8, team_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT opponent FROM schedule WHERE season = ?1 AND week = ?2 AND team_id = ?3",
        )
        .bind(i64::from(season))
        .bind(i64::from(week))
        .bind(team_id)
        .fetch_optional(self.pool())
        .await
        .with_context(|| format!("Failed to read opponent for {team_id}"))?;
        Ok(row.map(|(opponent,)| opponent))
    }

    // -- Injuries & practice ---------------------------------------------

    pub async fn upsert_injuries(&self, reports: &[InjuryReport]) -> Result<usize> {
        self.upsert_injuries_at(reports, Utc::now()).await
    }

    pub async fn upsert_injuries_at(&self, reports: &[InjuryReport], at: DateTime<Utc>) -> Result<usize> {
        let mut tx = self.pool().begin().await.context("Failed to begin injury upsert")?;
        for r in reports {
            write_injury(&mut *tx, r, at).await?;
        }
        tx.commit().await.context("Failed to commit injury upsert")?;
        Ok(reports.len())
    }

    /// Replace `team_id`'s injury set with one aggregation run. Players of
    /// that team missing from `reports` lose their injury and practice rows.
    /// Returns the number of players removed.
    pub async fn replace_team_injuries(
        &self,
        team_id: &str,
        reports: &[InjuryReport],
        practice: &[(String, PracticeStatus)],
    ) -> Result<usize> {
        let now = Utc::now();
        let mut tx = self.pool().begin().await.context("Failed to begin injury replace")?;

        let existing: Vec<(String,)> = sqlx::query_as("SELECT player_id FROM injuries WHERE team_id = ?1")
            .bind(team_id)
            .fetch_all(&mut *tx)
            .await
            .with_context(|| format!("Failed to read injuries for {team_id}"))?;
        let current: HashSet<&str> = reports.iter().map(|r| r.player_id.as_str()).collect();
        let stale: Vec<String> = existing
            .into_iter()
            .map(|(id,)| id)
            .filter(|id| !current.contains(id.as_str()))
            .collect();

        for player_id in &stale {
            for sql in [
                "DELETE FROM injuries WHERE player_id = ?1",
                "DELETE FROM practice WHERE player_id = ?1",
            ] {
                sqlx::query(sql)
                    .bind(player_id)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Failed to clear injury rows for {player_id}"))?;
            }
        }

        for r in reports {
            write_injury(&mut *tx, r, now).await?;
        }
        for (player_id, status) in practice {
            write_practice(&mut *tx, player_id, *status, now).await?;
        }

        tx.commit().await.context("Failed to commit injury replace")?;
        if !stale.is_empty() {
            debug!(team_id, removed = stale.len(), "Cleared superseded injury reports");
        }
        Ok(stale.len())
    }

    /// Most recent injury report written after `newer_than`.
    pub async fn get_injury(
        &self,
        player_id: &str,
        newer_than: DateTime<Utc>,
    ) -> Result<Option<InjuryReport>> {
        let row: Option<InjuryRow> = sqlx::query_as(
            r#"
            SELECT player_id, team_id, position, status, severity, confidence, sources,
                   description, date_reported
            FROM injuries
            WHERE player_id = ?1 AND updated_at_ms >= ?2
            "#,
        )
        .bind(player_id)
        .bind(to_ms(newer_than))
        .fetch_optional(self.pool())
        .await
        .with_context(|| format!("Failed to read injury for {player_id}"))?;
        Ok(row.map(injury_from_row))
    }

    /// Current injury reports, most severe first.
    pub async fn list_injuries(&self, limit: u32) -> Result<Vec<InjuryReport>> {
        let rows: Vec<InjuryRow> = sqlx::query_as(
            r#"
            SELECT player_id, team_id, position, status, severity, confidence, sources,
                   description, date_reported
            FROM injuries
            ORDER BY severity DESC, confidence DESC, player_id ASC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .context("Failed to list injuries")?;
        Ok(rows.into_iter().map(injury_from_row).collect())
    }

    pub async fn upsert_practice(&self, player_id: &str, status: PracticeStatus) -> Result<()> {
        self.upsert_practice_at(player_id, status, Utc::now()).await
    }

    pub async fn upsert_practice_at(
        &self,
        player_id: &str,
        status: PracticeStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut conn = self.pool().acquire().await.context("Failed to acquire connection")?;
        write_practice(&mut *conn, player_id, status, at).await
    }

    /// Most recent practice report written after `newer_than`.
    pub async fn get_practice(
        &self,
        player_id: &str,
        newer_than: DateTime<Utc>,
    ) -> Result<Option<PracticeStatus>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM practice WHERE player_id = ?1 AND updated_at_ms >= ?2",
        )
        .bind(player_id)
        .bind(to_ms(newer_than))
        .fetch_optional(self.pool())
        .await
        .with_context(|| format!("Failed to read practice for {player_id}"))?;
        Ok(row.and_then(|(status,)| PracticeStatus::parse(&status)))
    }

    // -- Refresh markers -------------------------------------------------

    pub async fn mark_refreshed(&self, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_meta (name, refreshed_at_ms) VALUES (?1, ?2)
            ON CONFLICT (name) DO UPDATE SET refreshed_at_ms = excluded.refreshed_at_ms
            "#,
        )
        .bind(name)
        .bind(to_ms(Utc::now()))
        .execute(self.pool())
        .await
        .with_context(|| format!("Failed to mark {name} refreshed"))?;
        Ok(())
    }

    pub async fn refreshed_at(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT refreshed_at_ms FROM cache_meta WHERE name = ?1")
            .bind(name)
            .fetch_optional(self.pool())
            .await
            .with_context(|| format!("Failed to read refresh marker {name}"))?;
        Ok(row.map(|(ms,)| from_ms(ms)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
