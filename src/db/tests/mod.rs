mod comments;

use super::Database;
use tempfile::NamedTempFile;

/// Open a fresh database on a temp file, returning both so the file
/// outlives the pool
pub(crate) async fn test_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}
