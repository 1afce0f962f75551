use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;

pub const EULA_FILE: &str = "eula.txt";

static EULA_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^eula\s*=\s*\w+").expect("eula line regex"));

/// Rewrite the `eula=` line of `<install_dir>/eula.txt` to the given boolean
/// and return it. Creates the file when absent (the server normally writes it
/// before refusing to run, but a clean directory should still be acceptable).
/// Does not restart the process.
pub async fn accept_eula(install_dir: &Path, accept: bool) -> Result<bool> {
    let path = install_dir.join(EULA_FILE);
    let replacement = format!("eula={}", accept);

    let contents = match fs::read_to_string(&path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            "#By changing the setting below to TRUE you are indicating your agreement to our EULA.\neula=false\n".to_string()
        }
        Err(e) => return Err(e.into()),
    };

    let updated = if EULA_LINE.is_match(&contents) {
        EULA_LINE
            .replace(&contents, regex::NoExpand(&replacement))
            .into_owned()
    } else {
        // File exists but carries no eula line; add one rather than lose it.
        format!("{}\n{}\n", contents.trim_end(), replacement)
    };

    fs::write(&path, updated).await?;
    log::info!("Set eula={} in {:?}", accept, path);
    Ok(accept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn toggles_existing_eula_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(EULA_FILE);
        tokio::fs::write(&path, "#EULA notice\n#Sat Aug 29\neula=false\n")
            .await
            .unwrap();

        assert!(accept_eula(dir.path(), true).await.unwrap());
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("eula=true"));
        assert!(contents.starts_with("#EULA notice"));

        assert!(!accept_eula(dir.path(), false).await.unwrap());
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("eula=false"));
    }

    #[tokio::test]
    async fn creates_file_when_absent() {
        let dir = tempdir().unwrap();
        assert!(accept_eula(dir.path(), true).await.unwrap());
        let contents = tokio::fs::read_to_string(dir.path().join(EULA_FILE))
            .await
            .unwrap();
        assert!(contents.contains("eula=true"));
    }
}
