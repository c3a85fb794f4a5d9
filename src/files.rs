use crate::types::{IconResult, SourceImage};
use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Manifest written next to the icons
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub generated_at: DateTime<Utc>,
    pub results: &'a [IconResult],
}

/// Media type from the file extension; empty when unknown
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "",
    }
}

/// Read every input path, keeping the given order
pub fn load_sources(paths: &[PathBuf]) -> Result<Vec<SourceImage>> {
    paths
        .iter()
        .map(|path| {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read image: {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            Ok(SourceImage::new(name, media_type_for(path), bytes))
        })
        .collect()
}

/// `name` if unused, otherwise `<stem>-2.<ext>`, `<stem>-3.<ext>`, ...
fn unique_name(name: &str, used: &HashSet<String>) -> String {
    if !used.contains(name) {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    (2..)
        .map(|n| format!("{stem}-{n}{ext}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Decode each successful result into `<out_dir>/<name>`. Results sharing a
/// name get a numeric suffix. Returns the written paths.
pub fn write_icons(out_dir: &Path, results: &[IconResult]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory: {}", out_dir.display()))?;

    let mut used = HashSet::new();
    let mut written = Vec::new();
    for result in results {
        let Some(b64) = &result.b64 else {
            continue;
        };

        let bytes = match general_purpose::STANDARD.decode(b64) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(name = %result.name, error = %e, "Skipping icon with undecodable payload");
                continue;
            }
        };

        let name = unique_name(&result.name, &used);
        if name != result.name {
            warn!(name = %result.name, renamed = %name, "Output name already used in this batch");
        }
        let path = out_dir.join(&name);
        used.insert(name);
        fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write icon: {}", path.display()))?;
        info!(path = %path.display(), bytes = bytes.len(), "Wrote icon");
        written.push(path);
    }

    Ok(written)
}

/// Save the manifest atomically (write to temp, then rename)
pub fn write_manifest(path: &Path, results: &[IconResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create manifest directory: {}", parent.display())
            })?;
        }
    }

    let manifest = Manifest {
        generated_at: Utc::now(),
        results,
    };
    let content = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &content)
        .with_context(|| format!("Failed to write temp manifest: {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename manifest to: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_media_type_for() {
        assert_eq!(media_type_for(Path::new("a/photo.JPG")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("car.png")), "image/png");
        assert_eq!(media_type_for(Path::new("noext")), "");
    }

    #[test]
    fn test_load_sources_keeps_order_and_names() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("b.png");
        let b = dir.path().join("a.jpg");
        fs::write(&a, b"one").unwrap();
        fs::write(&b, b"").unwrap();

        let sources = load_sources(&[a, b]).unwrap();

        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].name, "b.png");
        assert_eq!(sources[0].bytes, b"one");
        assert_eq!(sources[1].name, "a.jpg");
        assert_eq!(sources[1].media_type, "image/jpeg");
        assert!(sources[1].is_empty());

        assert!(load_sources(&[dir.path().join("missing.png")]).is_err());
    }

    #[test]
    fn test_write_icons_skips_errors() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("icons");
        let results = vec![
            IconResult::image("car-icon.png", "aWNvbg=="),
            IconResult::error("bad-icon.png", "Invalid or empty file"),
        ];

        let written = write_icons(&out, &results).unwrap();

        assert_eq!(written, vec![out.join("car-icon.png")]);
        assert_eq!(fs::read(out.join("car-icon.png")).unwrap(), b"icon");
        assert!(!out.join("bad-icon.png").exists());
    }

    #[test]
    fn test_write_icons_keeps_colliding_names() {
        let dir = tempdir().unwrap();
        let results = vec![
            IconResult::image("photo-icon.png", "Zmlyc3Q="),
            IconResult::image("photo-icon.png", "c2Vjb25k"),
            IconResult::image("photo-icon.png", "dGhpcmQ="),
        ];

        let written = write_icons(dir.path(), &results).unwrap();

        assert_eq!(
            written,
            vec![
                dir.path().join("photo-icon.png"),
                dir.path().join("photo-icon-2.png"),
                dir.path().join("photo-icon-3.png"),
            ]
        );
        assert_eq!(fs::read(&written[0]).unwrap(), b"first");
        assert_eq!(fs::read(&written[1]).unwrap(), b"second");
        assert_eq!(fs::read(&written[2]).unwrap(), b"third");
    }

    #[test]
    fn test_unique_name() {
        let used: HashSet<String> = ["car-icon.png", "car-icon-2.png", "error"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(unique_name("bus-icon.png", &used), "bus-icon.png");
        assert_eq!(unique_name("car-icon.png", &used), "car-icon-3.png");
        assert_eq!(unique_name("error", &used), "error-2");
    }

    #[test]
    fn test_write_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/manifest.json");
        let results = vec![IconResult::error("error", "No images provided.")];

        write_manifest(&path, &results).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["results"][0]["name"], "error");
        assert_eq!(value["results"][0]["error"], "No images provided.");
        assert!(value["results"][0].get("b64").is_none());
        assert!(value["generated_at"].is_string());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
