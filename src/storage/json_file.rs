//! Small JSON document files shared by the prompt and session stores.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Read a JSON document, or `T::default()` when the file is missing or blank.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Pretty-print `data` to `path` through a temp file and rename.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the write fails.
pub fn write_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent)?;

    let content = serde_json::to_string_pretty(data)?;
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("store"),
        std::process::id()
    ));
    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Millisecond id for a record created at `now`, unique among `existing`.
pub(crate) fn next_id(now: DateTime<Utc>, existing: impl Iterator<Item = u64>) -> u64 {
    let candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    match existing.max() {
        Some(max) if max >= candidate => max + 1,
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestDir;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    #[test]
    fn ids_never_collide() {
        let now = Utc.timestamp_millis_opt(1_000).single().unwrap();
        assert_eq!(next_id(now, std::iter::empty()), 1_000);
        assert_eq!(next_id(now, [1_000].into_iter()), 1_001);
        assert_eq!(next_id(now, [5, 999].into_iter()), 1_000);
    }

    #[test]
    fn missing_and_blank_files_are_empty() {
        let dir = TestDir::new();
        let map: BTreeMap<String, String> = read_or_default(&dir.file_path("none.json")).unwrap();
        assert!(map.is_empty());

        dir.create_file("blank.json", "  \n");
        let map: BTreeMap<String, String> = read_or_default(&dir.file_path("blank.json")).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn write_creates_parent_and_leaves_no_temp() {
        let dir = TestDir::new();
        let path = dir.file_path("nested/out.json");
        let data = BTreeMap::from([("a".to_string(), 1)]);
        write_atomic(&path, &data).unwrap();

        let back: BTreeMap<String, i32> = read_or_default(&path).unwrap();
        assert_eq!(back, data);
        let leftovers = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .contains(".tmp.")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TestDir::new();
        dir.create_file("bad.json", "{not json");
        let result: Result<BTreeMap<String, String>> = read_or_default(&dir.file_path("bad.json"));
        assert!(result.is_err());
    }
}
