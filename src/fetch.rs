use crate::config::{DumpSource, DUMP_SOURCES};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Downloads every dump in [`DUMP_SOURCES`] in parallel.
///
/// Downloads are independent; every failure is collected and returned rather
/// than stopping the others. An empty vector means all files are in place.
pub fn fetch_all(out_dir: &Path, base_url: &str) -> Vec<anyhow::Error> {
    if let Err(e) = fs::create_dir_all(out_dir) {
        return vec![anyhow::Error::new(e)
            .context(format!("Failed to create download directory: {:?}", out_dir))];
    }

    let errors: Vec<anyhow::Error> = DUMP_SOURCES
        .par_iter()
        .filter_map(|source| fetch_file(out_dir, base_url, source).err())
        .collect();

    for e in &errors {
        warn!(error = %format!("{e:#}"), "Fetch failed");
    }
    errors
}

/// Downloads `base_url + source.url` into `out_dir/source.file`.
///
/// Zipped dumps are downloaded next to the target, `source.entry` is
/// extracted, and the archive is removed.
pub fn fetch_file(out_dir: &Path, base_url: &str, source: &DumpSource) -> Result<PathBuf> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), source.url);
    let target = out_dir.join(source.file);
    let download_path = out_dir.join(source.url.replace('/', "_"));

    info!(url = %url, "Downloading");
    let mut response = reqwest::blocking::get(&url)
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to download {url}"))?;

    let file = File::create(&download_path)
        .with_context(|| format!("Failed to create {:?}", download_path))?;
    let mut writer = BufWriter::new(file);
    response
        .copy_to(&mut writer)
        .with_context(|| format!("Failed to write {:?}", download_path))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {:?}", download_path))?;
    drop(writer);

    match source.entry {
        Some(entry) => {
            info!(archive = ?download_path, entry, "Extracting");
            extract_entry(&download_path, entry, &target)?;
            fs::remove_file(&download_path)
                .with_context(|| format!("Failed to remove archive {:?}", download_path))?;
        }
        None if download_path != target => {
            fs::rename(&download_path, &target)
                .with_context(|| format!("Failed to move {:?} to {:?}", download_path, target))?;
        }
        None => {}
    }

    info!(path = ?target, "Fetched");
    Ok(target)
}

/// Extracts the archive entry named `entry` into `target`.
pub fn extract_entry(archive_path: &Path, entry: &str, target: &Path) -> Result<()> {
    let file = File::open(archive_path)
        .with_context(|| format!("Failed to open archive {:?}", archive_path))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a zip archive: {:?}", archive_path))?;
    let mut zipped = archive
        .by_name(entry)
        .with_context(|| format!("Archive {:?} has no entry {entry}", archive_path))?;

    let out = File::create(target).with_context(|| format!("Failed to create {:?}", target))?;
    let mut writer = BufWriter::new(out);
    io::copy(&mut zipped, &mut writer)
        .with_context(|| format!("Failed to extract {entry} to {:?}", target))?;
    writer
        .flush()
        .with_context(|| format!("Failed to extract {entry} to {:?}", target))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::write::FileOptions;

    fn create_zip(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extract_named_entry() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("dump_allCountries.zip");
        create_zip(
            &archive,
            &[
                ("readme.txt", "not this one"),
                ("allCountries.txt", "2988507\tParis\n"),
            ],
        );

        let target = dir.path().join("allCountries.txt");
        extract_entry(&archive, "allCountries.txt", &target).unwrap();
        assert_eq!(fs::read_to_string(target).unwrap(), "2988507\tParis\n");
    }

    #[test]
    fn postal_archive_entry_lands_under_local_name() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("zip_allCountries.zip");
        create_zip(
            &archive,
            &[
                ("readme.txt", "postal codes"),
                ("allCountries.txt", "FR\t75001\tParis 01\n"),
            ],
        );

        let source = DUMP_SOURCES
            .iter()
            .find(|s| s.file == "zip_allCountries.txt")
            .unwrap();
        let entry = source.entry.unwrap();
        assert_eq!(entry, "allCountries.txt");

        let target = dir.path().join(source.file);
        extract_entry(&archive, entry, &target).unwrap();
        assert_eq!(fs::read_to_string(target).unwrap(), "FR\t75001\tParis 01\n");
    }

    #[test]
    fn zipped_sources_name_their_entry() {
        for source in DUMP_SOURCES {
            assert_eq!(
                source.url.ends_with(".zip"),
                source.entry.is_some(),
                "{}",
                source.file
            );
        }
    }

    #[test]
    fn extract_missing_entry_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("zip_allCountries.zip");
        create_zip(&archive, &[("readme.txt", "")]);

        let result = extract_entry(&archive, "allCountries.txt", &dir.path().join("out.txt"));
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("has no entry"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn extract_reports_write_failure() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("dump_hierarchy.zip");
        create_zip(&archive, &[("hierarchy.txt", "6295630\t6255146\tADM\n")]);

        // Small enough to sit in the buffer until the final flush.
        let result = extract_entry(&archive, "hierarchy.txt", Path::new("/dev/full"));
        assert!(result.is_err());
    }

    #[test]
    fn extract_rejects_non_zip() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();
        assert!(extract_entry(&archive, "x.txt", &dir.path().join("x.txt")).is_err());
    }

    #[test]
    fn fetch_errors_are_aggregated() {
        let dir = TempDir::new().unwrap();
        // Nothing listens on the discard port, so every download fails.
        let errors = fetch_all(dir.path(), "http://127.0.0.1:9/export/");
        assert_eq!(errors.len(), DUMP_SOURCES.len());
    }

    #[test]
    fn sources_cover_every_dump() {
        let names: Vec<&str> = DUMP_SOURCES.iter().map(|s| s.file).collect();
        let files = crate::pipeline::DumpFiles::new("/data");
        for path in files.all_paths() {
            let name = path.file_name().unwrap().to_str().unwrap();
            assert!(names.contains(&name), "{name} has no download source");
        }
    }
}
