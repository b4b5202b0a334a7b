use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::CalendarEvent;

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Events ──

pub fn insert_event(conn: &Connection, event: &CalendarEvent) -> anyhow::Result<()> {
    let start_time = event.start.format(TS_FORMAT).to_string();
    let end_time = event.end.format(TS_FORMAT).to_string();
    let created_at = event.created_at.format(TS_FORMAT).to_string();

    conn.execute(
        "INSERT INTO events (id, title, description, start_time, end_time, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id,
            event.title,
            event.description,
            start_time,
            end_time,
            created_at,
        ],
    )?;
    Ok(())
}

/// Events overlapping `[start, end)`, earliest first.
pub fn get_events_in_range(
    conn: &Connection,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> anyhow::Result<Vec<CalendarEvent>> {
    let start_str = start.format(TS_FORMAT).to_string();
    let end_str = end.format(TS_FORMAT).to_string();

    let mut stmt = conn.prepare(
        "SELECT id, title, description, start_time, end_time, created_at
         FROM events WHERE start_time < ?2 AND end_time > ?1 ORDER BY start_time ASC",
    )?;

    let rows = stmt.query_map(params![start_str, end_str], |row| Ok(parse_event_row(row)))?;

    let mut events = vec![];
    for row in rows {
        events.push(row??);
    }
    Ok(events)
}

pub fn get_event_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<CalendarEvent>> {
    let result = conn.query_row(
        "SELECT id, title, description, start_time, end_time, created_at FROM events WHERE id = ?1",
        params![id],
        |row| Ok(parse_event_row(row)),
    );

    match result {
        Ok(event) => Ok(Some(event?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn count_events(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
    Ok(count)
}

fn parse_event_row(row: &rusqlite::Row) -> anyhow::Result<CalendarEvent> {
    let id: String = row.get(0)?;
    let title: String = row.get(1)?;
    let description: Option<String> = row.get(2)?;
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    let start = NaiveDateTime::parse_from_str(&start_str, TS_FORMAT)?;
    let end = NaiveDateTime::parse_from_str(&end_str, TS_FORMAT)?;
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, TS_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(CalendarEvent {
        id,
        title,
        description,
        start,
        end,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn event(id: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: "Meeting".to_string(),
            description: None,
            start: dt(start),
            end: dt(end),
            created_at: dt("2026-10-19 08:00"),
        }
    }

    #[test]
    fn test_range_query_uses_overlap() {
        let conn = db::init_db(":memory:").unwrap();
        insert_event(&conn, &event("a", "2026-10-20 09:00", "2026-10-20 10:00")).unwrap();
        insert_event(&conn, &event("b", "2026-10-20 11:30", "2026-10-20 12:30")).unwrap();
        insert_event(&conn, &event("c", "2026-10-21 09:00", "2026-10-21 10:00")).unwrap();

        let found = get_events_in_range(&conn, &dt("2026-10-20 10:00"), &dt("2026-10-20 12:00")).unwrap();
        let ids: Vec<_> = found.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);

        let found = get_events_in_range(&conn, &dt("2026-10-20 00:00"), &dt("2026-10-21 00:00")).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_get_event_by_id() {
        let conn = db::init_db(":memory:").unwrap();
        insert_event(&conn, &event("a", "2026-10-20 09:00", "2026-10-20 10:00")).unwrap();
        let found = get_event_by_id(&conn, "a").unwrap().unwrap();
        assert_eq!(found.start, dt("2026-10-20 09:00"));
        assert!(get_event_by_id(&conn, "missing").unwrap().is_none());
        assert_eq!(count_events(&conn).unwrap(), 1);
    }
}
