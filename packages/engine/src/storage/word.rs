// ============================================================================
// Word repository
// ============================================================================

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use super::models::Word;
use super::{StorageError, StorageResult};

pub struct WordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl WordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// Resolves each canonical text to its word row, creating rows that do
    /// not exist yet. Output order follows input order.
    pub fn find_or_create_all(&self, language: &str, texts: &[String]) -> StorageResult<Vec<Word>> {
        let conn = self.get_conn()?;
        Self::find_or_create_all_internal(&conn, language, texts)
    }

    pub(crate) fn find_or_create_all_internal(
        conn: &Connection,
        language: &str,
        texts: &[String],
    ) -> StorageResult<Vec<Word>> {
        let mut words = Vec::with_capacity(texts.len());
        for text in texts {
            let word = match Self::get_by_text_internal(conn, text, language)? {
                Some(existing) => existing,
                None => {
                    let created = Word::new(text.clone(), language);
                    created.insert(conn)?;
                    created
                }
            };
            words.push(word);
        }
        Ok(words)
    }

    pub fn get_by_id(&self, id: &str) -> StorageResult<Option<Word>> {
        let conn = self.get_conn()?;
        Self::get_by_id_internal(&conn, id)
    }

    pub(crate) fn get_by_id_internal(conn: &Connection, id: &str) -> StorageResult<Option<Word>> {
        match conn.query_row("SELECT * FROM word WHERE id = ?1", [id], Word::from_row) {
            Ok(word) => Ok(Some(word)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn get_by_text_internal(
        conn: &Connection,
        text: &str,
        language: &str,
    ) -> StorageResult<Option<Word>> {
        match conn.query_row(
            "SELECT * FROM word WHERE text = ?1 AND language = ?2",
            [text, language],
            Word::from_row,
        ) {
            Ok(word) => Ok(Some(word)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    #[test]
    fn find_or_create_reuses_existing_rows() {
        let storage = Storage::in_memory().unwrap();
        let repo = storage.words();

        let first = repo
            .find_or_create_all("fr", &["chat".to_string(), "chien".to_string()])
            .unwrap();
        let second = repo
            .find_or_create_all("fr", &["chien".to_string(), "maison".to_string()])
            .unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        // "chien" resolves to the same row both times.
        assert_eq!(first[1].id, second[0].id);
    }

    #[test]
    fn languages_do_not_share_words() {
        let storage = Storage::in_memory().unwrap();
        let repo = storage.words();

        let fr = repo.find_or_create_all("fr", &["chat".to_string()]).unwrap();
        let en = repo.find_or_create_all("en", &["chat".to_string()]).unwrap();
        assert_ne!(fr[0].id, en[0].id);
    }

    #[test]
    fn get_by_id_misses_return_none() {
        let storage = Storage::in_memory().unwrap();
        assert!(storage.words().get_by_id("missing").unwrap().is_none());
    }
}
