use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension, params};

use crate::model::{CardImage, CardRecord, TagType};
use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "1.0.0";

/// nationality -> tag type -> cards
pub type CardIndex = BTreeMap<String, BTreeMap<TagType, Vec<CardRecord>>>;

/// Open (or create) the card database. `reset` starts from an empty file.
pub fn open_database(db_path: &Path, reset: bool) -> Result<Connection> {
    if reset && db_path.exists() {
        fs::remove_file(db_path)
            .with_context(|| format!("failed to remove {}", db_path.display()))?;
    }
    if let Some(parent) = db_path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        crate::util::ensure_directory(parent)?;
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    ensure_schema(&connection)?;
    Ok(connection)
}

/// Open an existing database without creating it.
pub fn open_existing(db_path: &Path) -> Result<Connection> {
    if !db_path.is_file() {
        bail!("database file missing: {}", db_path.display());
    }
    let connection = Connection::open(db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    configure_connection(&connection)?;
    Ok(connection)
}

fn configure_connection(connection: &Connection) -> Result<()> {
    // sqlite leaves foreign keys off unless asked
    connection
        .pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;
    Ok(())
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS card (
              card_id INTEGER PRIMARY KEY AUTOINCREMENT,
              tag TEXT NOT NULL,
              nationality TEXT NOT NULL,
              name TEXT NOT NULL,
              page_id INTEGER NOT NULL,
              page_pos INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS card_image (
              card_id INTEGER PRIMARY KEY,
              image_data BLOB NOT NULL,
              FOREIGN KEY(card_id) REFERENCES card(card_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_card_nationality ON card(nationality);
            ",
        )
        .context("failed to create card schema")?;

    set_metadata(connection, "db_schema_version", DB_SCHEMA_VERSION)?;
    set_metadata(connection, "schema_updated_at", &now_utc_string())?;
    Ok(())
}

pub fn set_metadata(connection: &Connection, key: &str, value: &str) -> Result<()> {
    connection
        .execute(
            "INSERT INTO metadata(key, value) VALUES(?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            params![key, value],
        )
        .with_context(|| format!("failed to write metadata key {key}"))?;
    Ok(())
}

pub fn get_metadata(connection: &Connection, key: &str) -> Result<Option<String>> {
    connection
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to read metadata key {key}"))
}

/// Store one batch of cards (and their images) in a single transaction.
pub fn add_cards(connection: &mut Connection, cards: &[CardRecord]) -> Result<usize> {
    let tx = connection.transaction()?;
    {
        let mut card_statement = tx.prepare(
            "INSERT INTO card(tag, nationality, name, page_id, page_pos) VALUES(?1, ?2, ?3, ?4, ?5)",
        )?;
        let mut image_statement =
            tx.prepare("INSERT INTO card_image(card_id, image_data) VALUES(?1, ?2)")?;

        for card in cards {
            let card_id = card_statement
                .insert(params![
                    card.tag,
                    card.nationality,
                    card.name,
                    card.page_id,
                    card.page_pos
                ])
                .with_context(|| format!("failed to insert {card}"))?;
            if let Some(image) = &card.image {
                image_statement
                    .execute(params![card_id, image.data])
                    .with_context(|| format!("failed to insert image for {card}"))?;
            }
        }
    }
    tx.commit().context("failed to commit cards")?;
    Ok(cards.len())
}

pub fn clear_cards(connection: &Connection) -> Result<usize> {
    let deleted = connection
        .execute("DELETE FROM card", [])
        .context("failed to clear cards")?;
    Ok(deleted)
}

pub fn count_cards(connection: &Connection) -> Result<(i64, i64)> {
    let cards = connection.query_row("SELECT COUNT(*) FROM card", [], |row| row.get(0))?;
    let images = connection.query_row("SELECT COUNT(*) FROM card_image", [], |row| row.get(0))?;
    Ok((cards, images))
}

/// Load every card, grouped by nationality and tag type.
pub fn load_cards(connection: &Connection) -> Result<CardIndex> {
    let mut statement = connection.prepare(
        "
        SELECT c.tag, c.nationality, c.name, c.page_id, c.page_pos, i.image_data
        FROM card c
        LEFT JOIN card_image i ON i.card_id = c.card_id
        ORDER BY c.card_id
        ",
    )?;
    let rows = statement.query_map([], |row| {
        let image_data: Option<Vec<u8>> = row.get(5)?;
        Ok(CardRecord {
            tag: row.get(0)?,
            nationality: row.get(1)?,
            name: row.get(2)?,
            page_id: row.get(3)?,
            page_pos: row.get(4)?,
            image: image_data.map(|data| CardImage { data }),
        })
    })?;

    let mut index = CardIndex::new();
    for row in rows {
        let card = row.context("failed to read card row")?;
        let Some(tag_type) = card.tag_type() else {
            bail!("unknown tag type ({}) for {card}", card.tag);
        };
        index
            .entry(card.nationality.clone())
            .or_default()
            .entry(tag_type)
            .or_default()
            .push(card);
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_db() -> Connection {
        let connection = Connection::open_in_memory().expect("sqlite");
        configure_connection(&connection).expect("configure");
        ensure_schema(&connection).expect("schema");
        connection
    }

    fn card(tag: &str, nationality: &str, name: &str, image: Option<&[u8]>) -> CardRecord {
        CardRecord {
            image: image.map(|data| CardImage {
                data: data.to_vec(),
            }),
            ..CardRecord::new(1, 0, tag, nationality, name)
        }
    }

    #[test]
    fn add_and_load_groups_by_nationality_and_tag_type() {
        let mut connection = memory_db();
        add_cards(
            &mut connection,
            &[
                card("Vehicle #1", "German", "PzKpfw IA", Some(b"png-1")),
                card("Ordnance #1", "German", "2cm FlaK 30", None),
                card("Vehicle #1", "American", "M2A4", Some(b"png-2")),
            ],
        )
        .expect("add");

        assert_eq!(count_cards(&connection).expect("count"), (3, 2));

        let index = load_cards(&connection).expect("load");
        assert_eq!(index.keys().collect::<Vec<_>>(), vec!["American", "German"]);
        let german = &index["German"];
        assert_eq!(german[&TagType::Vehicle][0].name, "PzKpfw IA");
        assert_eq!(
            german[&TagType::Vehicle][0].image,
            Some(CardImage {
                data: b"png-1".to_vec()
            })
        );
        assert_eq!(german[&TagType::Ordnance][0].image, None);
    }

    #[test]
    fn clearing_cards_cascades_to_images() {
        let mut connection = memory_db();
        add_cards(
            &mut connection,
            &[card("Vehicle #1", "German", "PzKpfw IA", Some(b"png"))],
        )
        .expect("add");

        assert_eq!(clear_cards(&connection).expect("clear"), 1);
        assert_eq!(count_cards(&connection).expect("count"), (0, 0));
    }

    #[test]
    fn unknown_tag_type_is_rejected_on_load() {
        let mut connection = memory_db();
        add_cards(&mut connection, &[card("Leader #1", "German", "Hans", None)]).expect("add");

        let err = load_cards(&connection).expect_err("unknown tag");
        assert!(err.to_string().contains("Leader #1"));
    }

    #[test]
    fn schema_version_is_recorded() {
        let connection = memory_db();
        assert_eq!(
            get_metadata(&connection, "db_schema_version").expect("metadata"),
            Some(DB_SCHEMA_VERSION.to_string())
        );
        assert_eq!(get_metadata(&connection, "missing").expect("metadata"), None);
    }

    #[test]
    fn reset_starts_from_an_empty_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("cards.db");

        let mut connection = open_database(&db_path, false).expect("open");
        add_cards(&mut connection, &[card("Vehicle #1", "German", "PzKpfw IA", None)])
            .expect("add");
        drop(connection);

        let connection = open_existing(&db_path).expect("reopen");
        assert_eq!(count_cards(&connection).expect("count").0, 1);
        drop(connection);

        let connection = open_database(&db_path, true).expect("reset");
        assert_eq!(count_cards(&connection).expect("count").0, 0);
    }
}
