//! One configuration per tag of the target implementation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::read_config;

/// Tags from a `git tag` listing, newest first. Blank lines are skipped.
pub fn read_tags(content: &str) -> Vec<String> {
    content
        .lines()
        .rev()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Tag as a single file-name component: path separators become `_`.
fn file_stem(tag: &str) -> String {
    tag.replace(['/', '\\'], "_")
}

/// Write `<implementation>_<tag>.toml` into `output_dir` for each of the
/// first `limit` tags, copying `base` with `target.version` replaced.
pub fn generate(
    base: &Path,
    tags_file: &Path,
    output_dir: &Path,
    limit: Option<usize>,
) -> Result<Vec<PathBuf>> {
    let mut config = read_config(base)?;
    let tags = std::fs::read_to_string(tags_file)
        .with_context(|| format!("reading {}", tags_file.display()))?;
    let tags = read_tags(&tags);
    let limit = limit.unwrap_or(tags.len());

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    let mut written = Vec::new();
    for tag in tags.into_iter().take(limit) {
        config.target.version = tag.clone();
        let path = output_dir.join(format!(
            "{}_{}.toml",
            config.target.implementation,
            file_stem(&tag)
        ));
        let text = toml::to_string_pretty(&config).context("serializing config")?;
        std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EXAMPLE_CONFIG;

    #[test]
    fn test_read_tags_newest_first() {
        assert_eq!(read_tags("v1.0\n\nv1.1\nv2.0\n"), vec!["v2.0", "v1.1", "v1.0"]);
    }

    #[test]
    fn test_generate_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.toml");
        let tags = dir.path().join("tags");
        std::fs::write(&base, EXAMPLE_CONFIG).unwrap();
        std::fs::write(&tags, "v0.9\nv1.0\nv1.1\n").unwrap();

        let out = dir.path().join("configs");
        let written = generate(&base, &tags, &out, Some(2)).unwrap();

        assert_eq!(
            written,
            vec![out.join("asyncua_v1.1.toml"), out.join("asyncua_v1.0.toml")]
        );
        let config = read_config(&written[1]).unwrap();
        assert_eq!(config.target.version, "v1.0");
        assert_eq!(config.target.replicas, 4);
    }

    #[test]
    fn test_generate_keeps_slashed_tags_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.toml");
        let tags = dir.path().join("tags");
        std::fs::write(&base, EXAMPLE_CONFIG).unwrap();
        std::fs::write(&tags, "../escape\nrelease/1.0\n").unwrap();

        let out = dir.path().join("configs");
        let written = generate(&base, &tags, &out, None).unwrap();

        assert_eq!(
            written,
            vec![
                out.join("asyncua_release_1.0.toml"),
                out.join("asyncua_.._escape.toml"),
            ]
        );
        assert!(written.iter().all(|p| p.exists()));
        let config = read_config(&written[0]).unwrap();
        assert_eq!(config.target.version, "release/1.0");
    }

    #[test]
    fn test_generate_all_tags_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.toml");
        let tags = dir.path().join("tags");
        std::fs::write(&base, EXAMPLE_CONFIG).unwrap();
        std::fs::write(&tags, "a\nb\nc\n").unwrap();

        let written = generate(&base, &tags, dir.path(), None).unwrap();
        assert_eq!(written.len(), 3);
    }
}
