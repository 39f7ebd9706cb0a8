//! Named source repository for the `fasta_sources` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::curation::{FastaSource, HeaderTransform};

fn source_from_row(row: &Row<'_>) -> Result<FastaSource, rusqlite::Error> {
    let transform_name: Option<String> = row.get("transform_name")?;
    let transform_group: Option<String> = row.get("transform_group")?;
    let transform_substitution: Option<String> = row.get("transform_substitution")?;

    let transform = match (transform_group, transform_substitution) {
        (Some(group), Some(substitution)) => Some(HeaderTransform::new(
            transform_name.unwrap_or_default(),
            group,
            substitution,
        )),
        _ => None,
    };

    Ok(FastaSource {
        id: row.get("id")?,
        name: row.get("name")?,
        url: row.get("url")?,
        common: row.get("common")?,
        transform,
    })
}

/// Inserts a named source and returns its id. `source.id` is ignored.
pub fn insert(db: &Database, source: &FastaSource) -> Result<i64, DatabaseError> {
    let transform = source.transform.as_ref();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO fasta_sources (name, url, common, transform_name, transform_group,
             transform_substitution)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                source.name,
                source.url,
                source.common,
                transform.map(|t| t.name.as_str()),
                transform.map(|t| t.group_pattern.as_str()),
                transform.map(|t| t.substitution.as_str()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn find_by_name(db: &Database, name: &str) -> Result<Option<FastaSource>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM fasta_sources WHERE name = ?1",
            params![name],
            source_from_row,
        )
        .optional()
        .map_err(DatabaseError::from)
    })
}

/// First source registered for `url`.
pub fn find_by_url(db: &Database, url: &str) -> Result<Option<FastaSource>, DatabaseError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM fasta_sources WHERE url = ?1 ORDER BY id LIMIT 1",
            params![url],
            source_from_row,
        )
        .optional()
        .map_err(DatabaseError::from)
    })
}

/// Sources flagged as common, by name.
pub fn list_common(db: &Database) -> Result<Vec<FastaSource>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM fasta_sources WHERE common = 1 ORDER BY name")?;
        let rows = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_insert_and_find_with_transform() {
        let db = test_db();
        let source = FastaSource::new("Sprot", "ftp://ftp.example.org/sprot.fasta.gz")
            .with_transform(HeaderTransform::new("uniprot", r"^>sp\|(\w+)\|", ">$1 "));
        let id = insert(&db, &source).unwrap();

        let by_name = find_by_name(&db, "Sprot").unwrap().unwrap();
        assert_eq!(by_name.id, Some(id));
        assert_eq!(by_name.transform, source.transform);

        let by_url = find_by_url(&db, "ftp://ftp.example.org/sprot.fasta.gz")
            .unwrap()
            .unwrap();
        assert_eq!(by_url, by_name);
    }

    #[test]
    fn test_find_missing() {
        let db = test_db();
        assert!(find_by_name(&db, "nope").unwrap().is_none());
        assert!(find_by_url(&db, "http://example.org/x").unwrap().is_none());
    }

    #[test]
    fn test_list_common() {
        let db = test_db();
        let mut yeast = FastaSource::new("Yeast", "http://example.org/yeast.fasta");
        yeast.common = true;
        let mut human = FastaSource::new("Human", "http://example.org/human.fasta");
        human.common = true;
        insert(&db, &yeast).unwrap();
        insert(&db, &human).unwrap();
        insert(&db, &FastaSource::new("Other", "http://example.org/other.fasta")).unwrap();

        let names: Vec<String> = list_common(&db).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["Human", "Yeast"]);
    }
}
