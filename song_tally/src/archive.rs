//! Local copies of accepted uploads, named after the sender.

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::debug;

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._ ()\-]+").expect("static pattern"))
}

/// Lookup key for a sender: the identity without its `#discriminator`, lowercased.
pub fn sender_key(identity: &str) -> String {
    identity
        .split('#')
        .next()
        .unwrap_or(identity)
        .trim()
        .to_lowercase()
}

fn clean(raw: &str) -> String {
    let cleaned = unsafe_chars().replace_all(raw, "_");
    let cleaned = cleaned.trim_start_matches('.').trim();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Drop any directory components and replace anything outside a
/// conservative filename alphabet.
pub fn sanitize_filename(raw: &str) -> String {
    let base = Path::new(raw)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(raw);
    clean(base)
}

#[derive(Debug, Clone)]
pub struct UploadArchive {
    dir: PathBuf,
    display_names: HashMap<String, String>,
}

impl UploadArchive {
    /// `display_names` maps a sender (any case, with or without the
    /// discriminator) to the label used in saved filenames.
    pub fn new(dir: impl Into<PathBuf>, display_names: &HashMap<String, String>) -> Self {
        let display_names = display_names
            .iter()
            .map(|(sender, label)| (sender_key(sender), label.clone()))
            .collect();
        Self {
            dir: dir.into(),
            display_names,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The mapped label for a sender, or the identity itself when unmapped.
    pub fn display_name(&self, identity: &str) -> String {
        self.display_names
            .get(&sender_key(identity))
            .cloned()
            .unwrap_or_else(|| identity.to_string())
    }

    /// `<dir>/<display name> - <filename>`, sanitized.
    pub fn target_path(&self, identity: &str, filename: &str) -> PathBuf {
        let name = format!(
            "{} - {}",
            clean(&self.display_name(identity)),
            sanitize_filename(filename)
        );
        self.dir.join(name)
    }

    /// Write `bytes` under the sender's name. An existing file with the same
    /// name is kept and the new one gets a ` (n)` suffix. Names are claimed
    /// with `create_new`, so concurrent saves never share a file.
    pub async fn save(&self, identity: &str, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let first = self.target_path(identity, filename);
        let mut path = first.clone();
        let mut n = 0;
        let mut file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    n += 1;
                    path = numbered(&first, n);
                }
                Err(e) => return Err(e),
            }
        };

        file.write_all(bytes).await?;
        file.flush().await?;
        debug!(path = %path.display(), "saved upload");
        Ok(path)
    }
}

fn numbered(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem} ({n}).{}", ext.to_string_lossy()),
        None => format!("{stem} ({n})"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(dir: &Path) -> UploadArchive {
        let mut names = HashMap::new();
        names.insert("BeatMaker#0420".to_string(), "Marcus".to_string());
        UploadArchive::new(dir, &names)
    }

    #[test]
    fn display_name_ignores_case_and_discriminator() {
        let a = archive(Path::new("downloads"));
        assert_eq!(a.display_name("beatmaker#9999"), "Marcus");
        assert_eq!(a.display_name("stranger#0001"), "stranger#0001");
    }

    #[test]
    fn target_path_is_sanitized() {
        let a = archive(Path::new("downloads"));
        assert_eq!(
            a.target_path("beatmaker#0420", "../../etc/loop.wav"),
            Path::new("downloads").join("Marcus - loop.wav")
        );
        assert_eq!(
            a.target_path("stranger#0001", "my:song?.mp3"),
            Path::new("downloads").join("stranger_0001 - my_song_.mp3")
        );
    }

    #[tokio::test]
    async fn save_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let a = archive(tmp.path());
        let first = a.save("beatmaker", "take.wav", b"one").await.unwrap();
        let second = a.save("beatmaker", "take.wav", b"two").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "Marcus - take.wav");
        assert_eq!(second.file_name().unwrap(), "Marcus - take (1).wav");
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[tokio::test]
    async fn concurrent_saves_get_distinct_files() {
        let tmp = tempfile::tempdir().unwrap();
        let a = archive(tmp.path());

        let saves = (0..8u8).map(|i| {
            let a = a.clone();
            tokio::spawn(async move { (i, a.save("beatmaker", "take.wav", &[i; 4]).await) })
        });
        let mut paths = Vec::new();
        for save in saves {
            let (i, path) = save.await.unwrap();
            let path = path.unwrap();
            assert_eq!(std::fs::read(&path).unwrap(), vec![i; 4]);
            paths.push(path);
        }

        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8);
    }
}
