use std::path::Path;
use std::sync::Arc;

use dictee_engine::storage::Storage;
use dictee_engine::{Config, LearningEngine, NullSpeaker};

pub fn test_engine() -> LearningEngine {
    let storage = Storage::in_memory().expect("in-memory storage");
    LearningEngine::with_storage(Arc::new(storage), Arc::new(NullSpeaker), Config::default())
}

pub fn test_engine_at(db_path: &Path) -> LearningEngine {
    let storage = Storage::open(db_path.to_string_lossy()).expect("file storage");
    LearningEngine::with_storage(Arc::new(storage), Arc::new(NullSpeaker), Config::default())
}
