// ============================================================================
// Achievement repository
// ============================================================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use super::models::{Achievement, UserAchievement};
use super::{StorageError, StorageResult};

pub struct AchievementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AchievementRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| StorageError::Lock(e.to_string()))
    }

    /// The full catalog in display order.
    pub fn all(&self) -> StorageResult<Vec<Achievement>> {
        let conn = self.get_conn()?;
        Self::all_internal(&conn)
    }

    pub(crate) fn all_internal(conn: &Connection) -> StorageResult<Vec<Achievement>> {
        let mut stmt = conn.prepare("SELECT * FROM achievement ORDER BY sort_order ASC")?;
        let achievements = stmt
            .query_map([], Achievement::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(achievements)
    }

    pub(crate) fn unlocked_ids_internal(
        conn: &Connection,
        user_id: &str,
    ) -> StorageResult<HashSet<String>> {
        let mut stmt =
            conn.prepare("SELECT achievement_id FROM user_achievement WHERE user_id = ?1")?;
        let ids = stmt
            .query_map([user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    pub(crate) fn record_unlock_internal(
        conn: &Connection,
        unlock: &UserAchievement,
    ) -> StorageResult<()> {
        unlock.insert(conn)?;
        Ok(())
    }

    pub fn unlocks_for_user(&self, user_id: &str) -> StorageResult<Vec<UserAchievement>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM user_achievement WHERE user_id = ?1
             ORDER BY achieved_at ASC, rowid ASC",
        )?;
        let unlocks = stmt
            .query_map([user_id], UserAchievement::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(unlocks)
    }
}

// ============================================================================
// Tests
// ============================================================================
