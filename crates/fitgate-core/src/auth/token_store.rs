//! Filesystem helpers for the persisted token blob.

use std::io;
use std::path::{Path, PathBuf};

use rand::{distributions::Alphanumeric, Rng};
use tracing::warn;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Length of the random suffix on temporary files
const TEMP_SUFFIX_LENGTH: usize = 8;

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Replace `path` with `contents` so readers see either the old file or the
/// complete new one.
///
/// Writes a sibling temp file, restricts it to the owner on unix, then renames
/// it over `path`. Parent directories are created as needed.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "token path has no file name"))?;
    let temp = parent.join(format!(".{}.{}.tmp", file_name.to_string_lossy(), random_suffix()));

    let result = write_then_rename(&temp, path, contents).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&temp).await;
    }
    result
}

/// Replace the directory `dir` with one holding exactly `files`, so readers
/// see either the complete old set or the complete new one.
///
/// The new set is written to a sibling staging directory first. Only once every
/// file is in place is the old directory moved aside and the staging directory
/// renamed over it; if that rename fails the old directory is put back.
pub async fn replace_dir(dir: &Path, files: &[(&str, &[u8])]) -> io::Result<()> {
    let parent = dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await?;

    let dir_name = dir
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "token path has no file name"))?
        .to_string_lossy()
        .into_owned();
    let suffix = random_suffix();
    let staging = parent.join(format!(".{}.{}.tmp", dir_name, suffix));
    let backup = parent.join(format!(".{}.{}.old", dir_name, suffix));

    if let Err(e) = stage(&staging, files).await {
        let _ = tokio::fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    let had_previous = match tokio::fs::rename(dir, &backup).await {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(&staging).await;
            return Err(e);
        }
    };

    if let Err(e) = tokio::fs::rename(&staging, dir).await {
        if had_previous {
            let _ = tokio::fs::rename(&backup, dir).await;
        }
        let _ = tokio::fs::remove_dir_all(&staging).await;
        return Err(e);
    }

    if had_previous {
        if let Err(e) = tokio::fs::remove_dir_all(&backup).await {
            warn!(path = %backup.display(), error = %e, "Failed to remove previous token store");
        }
    }
    Ok(())
}

async fn stage(staging: &Path, files: &[(&str, &[u8])]) -> io::Result<()> {
    tokio::fs::create_dir(staging).await?;

    #[cfg(unix)]
    tokio::fs::set_permissions(staging, std::fs::Permissions::from_mode(0o700)).await?;

    for (name, contents) in files {
        let path = staging.join(name);
        tokio::fs::write(&path, contents).await?;

        #[cfg(unix)]
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
    }
    Ok(())
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TEMP_SUFFIX_LENGTH)
        .map(char::from)
        .collect()
}

async fn write_then_rename(temp: &Path, path: &Path, contents: &[u8]) -> io::Result<()> {
    tokio::fs::write(temp, contents).await?;

    #[cfg(unix)]
    tokio::fs::set_permissions(temp, std::fs::Permissions::from_mode(0o600)).await?;

    tokio::fs::rename(temp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/tokens"), PathBuf::from("/tmp/tokens"));
        assert_eq!(expand_home("relative"), PathBuf::from("relative"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/.garminconnect"), home.join(".garminconnect"));
            assert_eq!(expand_home("~"), home);
        }
    }

    #[tokio::test]
    async fn test_write_atomic_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("token.json");

        write_atomic(&path, b"first").await.expect("first write");
        write_atomic(&path, b"second").await.expect("second write");

        assert_eq!(std::fs::read(&path).expect("read back"), b"second");
        let entries: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
            .expect("list dir")
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_atomic_restricts_permissions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("token.json");
        write_atomic(&path, b"secret").await.expect("write");

        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_replace_dir_swaps_whole_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("store");
        std::fs::create_dir(&store).expect("create store");
        std::fs::write(store.join("a.json"), b"old-a").expect("write");
        std::fs::write(store.join("b.json"), b"old-b").expect("write");

        replace_dir(&store, &[("a.json", &b"new-a"[..]), ("b.json", &b"new-b"[..])])
            .await
            .expect("replace");

        assert_eq!(std::fs::read(store.join("a.json")).expect("a"), b"new-a");
        assert_eq!(std::fs::read(store.join("b.json")).expect("b"), b"new-b");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).expect("list dir").collect();
        assert_eq!(entries.len(), 1, "staging and backup directories are cleaned up");
    }

    #[tokio::test]
    async fn test_replace_dir_failed_second_write_keeps_old_set() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("store");
        std::fs::create_dir(&store).expect("create store");
        std::fs::write(store.join("a.json"), b"old-a").expect("write");
        std::fs::write(store.join("b.json"), b"old-b").expect("write");

        // The second file lands in a directory that does not exist
        let result = replace_dir(&store, &[("a.json", &b"new-a"[..]), ("missing/b.json", &b"new-b"[..])]).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(store.join("a.json")).expect("a"), b"old-a");
        assert_eq!(std::fs::read(store.join("b.json")).expect("b"), b"old-b");
        let entries: Vec<_> = std::fs::read_dir(dir.path()).expect("list dir").collect();
        assert_eq!(entries.len(), 1, "staging directory is removed");
    }

    #[tokio::test]
    async fn test_replace_dir_creates_missing_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = dir.path().join("nested").join("store");

        replace_dir(&store, &[("a.json", &b"new-a"[..])]).await.expect("replace");
        assert_eq!(std::fs::read(store.join("a.json")).expect("a"), b"new-a");
    }
}
