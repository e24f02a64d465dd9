//! SQLite storage layer -- rule store, dispatch audit log, migrations.
//!
//! Job records themselves live with the surrounding system; this layer only
//! persists the dealership priority rules and an append-only log of dispatch
//! transitions.  All calls are synchronous rusqlite; async callers wrap them
//! in `tokio::task::spawn_blocking`.

pub mod schema;

use anyhow::Result;
use chrono::{DateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::warn;
use uuid::Uuid;

use crate::ranking::{PriorityRule, UrgencyLevel};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

// ---------------------------------------------------------------------------
// Priority rule store
// ---------------------------------------------------------------------------

/// Persist a new priority rule.
pub fn insert_rule(pool: &Pool, rule: &PriorityRule) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO priority_rules (id, dealership_id, service_id, vehicle_make,
             urgency_match, target_urgency, ranking_score, is_active, description,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            rule.id.to_string(),
            rule.dealership_id,
            rule.service_id,
            rule.vehicle_make,
            rule.urgency_match.map(|u| u.as_str()),
            rule.target_urgency.as_str(),
            rule.ranking_score,
            rule.is_active,
            rule.description,
            rule.created_at.to_rfc3339(),
            rule.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Load priority rules, optionally scoped to one dealership.
///
/// Rows come back ordered by creation time (ties broken by id).  That order
/// is a contract: it is the order the ranking calculator evaluates rules in.
/// Rows that fail to parse (hand-edited database, partial writes) are
/// skipped with a warning rather than failing the whole load.
pub fn list_rules(pool: &Pool, dealership_id: Option<&str>) -> Result<Vec<PriorityRule>> {
    let conn = pool.get()?;

    let sql_base = "SELECT id, dealership_id, service_id, vehicle_make, urgency_match,
                target_urgency, ranking_score, is_active, description, created_at, updated_at
         FROM priority_rules";

    let raw_rules: Vec<RawRule> = match dealership_id {
        Some(dealership) => {
            let mut stmt = conn.prepare(&format!(
                "{sql_base} WHERE dealership_id = ?1 ORDER BY created_at, id"
            ))?;
            let rows = stmt.query_map([dealership], raw_rule_from_row)?;
            rows.flatten().collect()
        }
        None => {
            let mut stmt = conn.prepare(&format!("{sql_base} ORDER BY created_at, id"))?;
            let rows = stmt.query_map([], raw_rule_from_row)?;
            rows.flatten().collect()
        }
    };

    Ok(raw_rules.into_iter().filter_map(parse_rule).collect())
}

/// Delete a rule by id.  Returns whether a row was removed.
pub fn delete_rule(pool: &Pool, id: Uuid) -> Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "DELETE FROM priority_rules WHERE id = ?1",
        [id.to_string()],
    )?;
    Ok(changed > 0)
}

/// Enable or disable a rule.  Returns whether a row was updated.
pub fn set_rule_active(pool: &Pool, id: Uuid, active: bool) -> Result<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE priority_rules SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active, Utc::now().to_rfc3339(), id.to_string()],
    )?;
    Ok(changed > 0)
}

struct RawRule {
    id: String,
    dealership_id: String,
    service_id: Option<String>,
    vehicle_make: Option<String>,
    urgency_match: Option<String>,
    target_urgency: String,
    ranking_score: i64,
    is_active: bool,
    description: String,
    created_at: String,
    updated_at: String,
}

fn raw_rule_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRule> {
    Ok(RawRule {
        id: row.get(0)?,
        dealership_id: row.get(1)?,
        service_id: row.get(2)?,
        vehicle_make: row.get(3)?,
        urgency_match: row.get(4)?,
        target_urgency: row.get(5)?,
        ranking_score: row.get(6)?,
        is_active: row.get(7)?,
        description: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn parse_rule(raw: RawRule) -> Option<PriorityRule> {
    let id = match Uuid::parse_str(&raw.id) {
        Ok(id) => id,
        Err(_) => {
            warn!(rule_id = raw.id.as_str(), "skipping rule with malformed id");
            return None;
        }
    };

    let target_urgency = match raw.target_urgency.parse::<UrgencyLevel>() {
        Ok(u) => u,
        Err(_) => {
            warn!(rule_id = raw.id.as_str(), "skipping rule with malformed target urgency");
            return None;
        }
    };

    let urgency_match = match raw.urgency_match {
        None => None,
        Some(s) => match s.parse::<UrgencyLevel>() {
            Ok(u) => Some(u),
            Err(_) => {
                warn!(rule_id = raw.id.as_str(), "skipping rule with malformed urgency filter");
                return None;
            }
        },
    };

    Some(PriorityRule {
        id,
        dealership_id: raw.dealership_id,
        service_id: raw.service_id,
        vehicle_make: raw.vehicle_make,
        urgency_match,
        target_urgency,
        ranking_score: raw.ranking_score,
        is_active: raw.is_active,
        description: raw.description,
        created_at: parse_timestamp(&raw.created_at),
        updated_at: parse_timestamp(&raw.updated_at),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Dispatch audit log
// ---------------------------------------------------------------------------

/// One recorded dispatch transition.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DispatchEvent {
    pub id: i64,
    pub job_id: String,
    pub tech_id: Option<String>,
    pub event: String,
    pub created_at: String,
}

/// Append a dispatch transition to the audit log.
pub fn record_event(pool: &Pool, job_id: Uuid, tech_id: Option<&str>, event: &str) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO dispatch_events (job_id, tech_id, event, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            job_id.to_string(),
            tech_id,
            event,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(())
}

/// Most recent dispatch transitions, newest first.
pub fn recent_events(pool: &Pool, limit: usize) -> Result<Vec<DispatchEvent>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, job_id, tech_id, event, created_at FROM dispatch_events
         ORDER BY created_at DESC, id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], |row| {
        Ok(DispatchEvent {
            id: row.get(0)?,
            job_id: row.get(1)?,
            tech_id: row.get(2)?,
            event: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    let mut events = Vec::new();
    for row in rows.flatten() {
        events.push(row);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_pool() -> (tempfile::TempDir, Pool) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let pool = open_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    fn rule(dealership: &str, description: &str) -> PriorityRule {
        PriorityRule {
            id: Uuid::new_v4(),
            dealership_id: dealership.to_string(),
            service_id: None,
            vehicle_make: Some("BMW".to_string()),
            urgency_match: Some(UrgencyLevel::Medium),
            target_urgency: UrgencyLevel::High,
            ranking_score: 5,
            is_active: true,
            description: description.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_list_round_trip() {
        let (_dir, pool) = temp_pool();
        let r = rule("d-1", "VIP lane");
        insert_rule(&pool, &r).unwrap();

        let rules = list_rules(&pool, Some("d-1")).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, r.id);
        assert_eq!(rules[0].vehicle_make.as_deref(), Some("BMW"));
        assert_eq!(rules[0].urgency_match, Some(UrgencyLevel::Medium));
        assert_eq!(rules[0].target_urgency, UrgencyLevel::High);
        assert!(rules[0].is_active);
    }

    #[test]
    fn test_list_scopes_by_dealership() {
        let (_dir, pool) = temp_pool();
        insert_rule(&pool, &rule("d-1", "One")).unwrap();
        insert_rule(&pool, &rule("d-2", "Two")).unwrap();

        assert_eq!(list_rules(&pool, Some("d-1")).unwrap().len(), 1);
        assert_eq!(list_rules(&pool, Some("d-2")).unwrap().len(), 1);
        assert_eq!(list_rules(&pool, None).unwrap().len(), 2);
        assert!(list_rules(&pool, Some("d-3")).unwrap().is_empty());
    }

    #[test]
    fn test_list_orders_by_creation_time() {
        let (_dir, pool) = temp_pool();
        let mut first = rule("d-1", "First");
        first.created_at = Utc::now() - chrono::Duration::minutes(10);
        let second = rule("d-1", "Second");
        // Insert out of order; the read side must sort.
        insert_rule(&pool, &second).unwrap();
        insert_rule(&pool, &first).unwrap();

        let rules = list_rules(&pool, Some("d-1")).unwrap();
        let descriptions: Vec<&str> = rules.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descriptions, vec!["First", "Second"]);
    }

    #[test]
    fn test_delete_rule() {
        let (_dir, pool) = temp_pool();
        let r = rule("d-1", "Gone soon");
        insert_rule(&pool, &r).unwrap();

        assert!(delete_rule(&pool, r.id).unwrap());
        assert!(!delete_rule(&pool, r.id).unwrap());
        assert!(list_rules(&pool, Some("d-1")).unwrap().is_empty());
    }

    #[test]
    fn test_set_rule_active() {
        let (_dir, pool) = temp_pool();
        let r = rule("d-1", "Toggled");
        insert_rule(&pool, &r).unwrap();

        assert!(set_rule_active(&pool, r.id, false).unwrap());
        let rules = list_rules(&pool, Some("d-1")).unwrap();
        assert!(!rules[0].is_active);

        assert!(!set_rule_active(&pool, Uuid::new_v4(), false).unwrap());
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        let (_dir, pool) = temp_pool();
        insert_rule(&pool, &rule("d-1", "Good")).unwrap();

        // Hand-edit a bad row past the typed API.
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO priority_rules (id, dealership_id, target_urgency, ranking_score,
                 is_active, description, created_at, updated_at)
             VALUES ('not-a-uuid', 'd-1', 'apocalyptic', 1, 1, 'Bad', '2024-01-01T00:00:00Z',
                 '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let rules = list_rules(&pool, Some("d-1")).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].description, "Good");
    }

    #[test]
    fn test_event_log_round_trip() {
        let (_dir, pool) = temp_pool();
        let job_id = Uuid::new_v4();
        record_event(&pool, job_id, None, "enqueued").unwrap();
        record_event(&pool, job_id, Some("t-1"), "rejected").unwrap();
        record_event(&pool, job_id, Some("t-2"), "accepted").unwrap();

        let events = recent_events(&pool, 10).unwrap();
        assert_eq!(events.len(), 3);
        // Newest first.
        assert_eq!(events[0].event, "accepted");
        assert_eq!(events[0].tech_id.as_deref(), Some("t-2"));
        assert_eq!(events[2].event, "enqueued");
        assert!(events[2].tech_id.is_none());

        let limited = recent_events(&pool, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }
}
