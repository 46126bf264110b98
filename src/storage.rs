//! The storage module provides database operations for storing and retrieving
//! extracted events using SQLite.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{error, info};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::convert::TryFrom;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::event::Event;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage provides database operations for storing and retrieving events.
pub struct Storage {
    /// The underlying SQLite connection wrapped in Arc<Mutex<>> to make it thread-safe
    conn: Arc<Mutex<Connection>>,
}

/// Outcome of a [`Storage::save_events`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveReport {
    /// Events written as new rows
    pub inserted: usize,
    /// Events skipped because an event with the same title and source URL exists
    pub duplicates: usize,
}

impl Storage {
    /// Creates a new Storage instance with a database at the specified path.
    ///
    /// # Arguments
    ///
    /// * `database_path` - Path where the database file should be created or opened,
    ///   `:memory:` opens a private in-memory database
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot be created
    pub fn new(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)
            .with_context(|| format!("Unable to open database {database_path}"))?;

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Initializes the database schema with the events table if it doesn't exist.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                date TEXT NULL,
                location TEXT NULL,
                source_url TEXT NULL
            );
            CREATE INDEX IF NOT EXISTS events_title_source_url ON events (title, source_url);",
        )?;

        Ok(())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Storage mutex poisoned"))
    }

    /// Saves events, skipping those whose title and source URL are already stored.
    ///
    /// The duplicate check and all inserts run in a single transaction while the
    /// connection lock is held, so either every new event is stored or none is.
    ///
    /// # Arguments
    ///
    /// * `events` - The events to store
    ///
    /// # Returns
    ///
    /// Returns how many events were inserted and how many were duplicates
    ///
    /// # Errors
    ///
    /// Returns an error if any database operation fails; the transaction is rolled back
    pub fn save_events(&self, events: &[Event]) -> Result<SaveReport> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        match insert_new_events(&tx, events) {
            Ok(report) => {
                tx.commit()?;
                info!(
                    "Saved {} events, skipped {} duplicates",
                    report.inserted, report.duplicates
                );
                Ok(report)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    error!("Error rolling back event batch: {rollback_err}");
                }
                error!("Error saving events: {err:#}");
                Err(err)
            }
        }
    }

    /// Returns all stored events ordered by date.
    ///
    /// Events without a date come last; ties are kept in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails or a stored row is invalid
    pub fn load_events(&self) -> Result<Vec<Event>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, date, location, source_url FROM events
             ORDER BY date IS NULL, date ASC, id ASC",
        )?;
        let rows: Result<Vec<EventRow>, rusqlite::Error> = stmt
            .query_map([], |row| {
                Ok(EventRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    date: row.get(2)?,
                    location: row.get(3)?,
                    source_url: row.get(4)?,
                })
            })?
            .collect();

        let events = rows?
            .into_iter()
            .map(Event::try_from)
            .collect::<Result<Vec<_>>>()?;
        info!("Loaded {} events from database", events.len());

        Ok(events)
    }

    /// Returns the number of stored events.
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub fn count_events(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;

        Ok(usize::try_from(count)?)
    }

    /// Deletes all events. This cannot be undone.
    ///
    /// # Returns
    ///
    /// Returns the number of deleted events
    ///
    /// # Errors
    ///
    /// Returns an error if database operation fails
    pub fn clear_events(&self) -> Result<usize> {
        let conn = self.connection()?;
        let deleted_count = conn.execute("DELETE FROM events", [])?;
        info!("Deleted {deleted_count} events from database");

        Ok(deleted_count)
    }
}

fn insert_new_events(tx: &Transaction<'_>, events: &[Event]) -> Result<SaveReport> {
    let mut report = SaveReport::default();

    for event in events {
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM events WHERE title = ?1 AND source_url = ?2 LIMIT 1",
                params![event.title(), event.source_url()],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            report.duplicates += 1;
            continue;
        }

        tx.execute(
            "INSERT INTO events (title, date, location, source_url) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.title(),
                event
                    .date()
                    .map(|date| date.format(DATE_FORMAT).to_string()),
                event.location(),
                event.source_url(),
            ],
        )
        .with_context(|| format!("Unable to insert event '{}'", event.title()))?;
        report.inserted += 1;
    }

    Ok(report)
}

/// Represents an event stored in the database
#[derive(Debug)]
pub struct EventRow {
    pub id: i64,
    pub title: String,
    pub date: Option<String>,
    pub location: Option<String>,
    pub source_url: Option<String>,
}

impl TryFrom<EventRow> for Event {
    type Error = anyhow::Error;

    fn try_from(row: EventRow) -> Result<Self> {
        let date = row
            .date
            .as_deref()
            .map(|date| NaiveDate::parse_from_str(date, DATE_FORMAT))
            .transpose()
            .with_context(|| format!("Unable to read date of event {}", row.id))?;

        Ok(Event::new(
            &row.title,
            date,
            row.location.as_deref(),
            row.source_url.as_deref().unwrap_or_default(),
        )?
        .with_id(row.id))
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    fn storage() -> Storage {
        Storage::new(":memory:").expect("in-memory database")
    }

    fn event(title: &str, date: Option<(i32, u32, u32)>, source_url: &str) -> Event {
        let date = date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        Event::new(title, date, Some("Marktplatz"), source_url).expect("valid event")
    }

    #[test]
    fn saved_events_are_loaded_back() {
        let storage = storage();
        let report = storage
            .save_events(&[event("Stadtfest", Some((2025, 6, 1)), "https://a.de")])
            .expect("saved");

        assert_that(&report).is_equal_to(SaveReport {
            inserted: 1,
            duplicates: 0,
        });

        let events = storage.load_events().expect("loaded");
        assert_that(&events).has_length(1);
        assert_that(&events[0].title()).is_equal_to("Stadtfest");
        assert_that(&events[0].date()).is_equal_to(NaiveDate::from_ymd_opt(2025, 6, 1));
        assert_that(&events[0].location()).is_equal_to("Marktplatz");
        assert_that(&events[0].id()).is_some();
    }

    #[test]
    fn duplicates_across_calls_are_skipped() {
        let storage = storage();
        let first = event("Konzert", None, "https://a.de");

        storage.save_events(&[first.clone()]).expect("first save");
        let report = storage.save_events(&[first]).expect("second save");

        assert_that(&report.duplicates).is_equal_to(1);
        assert_that(&storage.count_events().expect("count")).is_equal_to(1);
    }

    #[test]
    fn duplicates_within_a_batch_are_skipped() {
        let storage = storage();
        let report = storage
            .save_events(&[
                event("Konzert", None, "https://a.de"),
                event("Konzert", Some((2025, 1, 1)), "https://a.de"),
                event("Konzert", None, "https://b.de"),
            ])
            .expect("saved");

        assert_that(&report).is_equal_to(SaveReport {
            inserted: 2,
            duplicates: 1,
        });
    }

    #[test]
    fn events_are_ordered_by_date_with_undated_last() {
        let storage = storage();
        storage
            .save_events(&[
                event("Ohne Datum", None, "https://a.de"),
                event("Silvester", Some((2025, 12, 31)), "https://a.de"),
                event("Neujahr", Some((2025, 1, 1)), "https://a.de"),
            ])
            .expect("saved");

        let titles: Vec<String> = storage
            .load_events()
            .expect("loaded")
            .iter()
            .map(|event| event.title().to_owned())
            .collect();
        assert_that(&titles).is_equal_to(vec![
            "Neujahr".to_owned(),
            "Silvester".to_owned(),
            "Ohne Datum".to_owned(),
        ]);
    }

    #[test]
    fn failing_insert_rolls_back_whole_batch() {
        let storage = storage();
        storage
            .connection()
            .expect("connection")
            .execute_batch(
                "CREATE TRIGGER reject_poison BEFORE INSERT ON events
                 WHEN NEW.title = 'Poison'
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .expect("trigger");

        let result = storage.save_events(&[
            event("Erstes", None, "https://a.de"),
            event("Poison", None, "https://a.de"),
        ]);

        assert_that(&result.is_err()).is_true();
        assert_that(&storage.count_events().expect("count")).is_equal_to(0);
    }

    #[test]
    fn clear_removes_everything() {
        let storage = storage();
        storage
            .save_events(&[
                event("A", None, "https://a.de"),
                event("B", None, "https://a.de"),
            ])
            .expect("saved");

        assert_that(&storage.clear_events().expect("cleared")).is_equal_to(2);
        assert_that(&storage.load_events().expect("loaded")).is_empty();
    }
}
