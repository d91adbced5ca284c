//! Discovery of raw input files.

use object_store::path::Path;
use sparkify_core::StorageProvider;
use sparkify_core::error::StorageError;
use tracing::info;

/// Extensions of raw input files.
pub const INPUT_EXTENSIONS: &[&str] = &[".json", ".json.gz"];

/// List every input file below `prefix`, recursively, in path order.
///
/// A missing prefix yields no files.
pub async fn list_input_files(
    storage: &StorageProvider,
    prefix: &str,
) -> Result<Vec<Path>, StorageError> {
    let files = storage.list_files(prefix, INPUT_EXTENSIONS).await?;
    info!(prefix, files = files.len(), "Listed input files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lists_nested_json_and_gzip_files() {
        let temp_dir = TempDir::new().unwrap();
        let song_dir = temp_dir.path().join("song_data/A/A/B");
        let log_dir = temp_dir.path().join("log_data/2018/11");
        std::fs::create_dir_all(&song_dir).unwrap();
        std::fs::create_dir_all(&log_dir).unwrap();
        std::fs::write(song_dir.join("TRAABCL128F4286650.json"), b"{}").unwrap();
        std::fs::write(song_dir.join(".DS_Store"), b"").unwrap();
        std::fs::write(log_dir.join("2018-11-01-events.json.gz"), b"").unwrap();

        let storage = StorageProvider::for_url_with_options(
            temp_dir.path().to_str().unwrap(),
            HashMap::new(),
        )
        .await
        .unwrap();

        let songs = list_input_files(&storage, "song_data").await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].as_ref(), "song_data/A/A/B/TRAABCL128F4286650.json");

        let logs = list_input_files(&storage, "log_data").await.unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].as_ref().ends_with(".json.gz"));
    }
}
