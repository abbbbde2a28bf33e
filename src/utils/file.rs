//! Helpers for turning local files into documents.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Check if a file is likely a text file.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if is_binary_extension(&ext) {
            return false;
        }
        if is_text_extension(&ext) {
            return true;
        }
    }

    // Fall back to sniffing for NUL bytes
    let Ok(mut file) = fs::File::open(path) else {
        return false;
    };
    let mut buffer = [0u8; 512];
    match file.read(&mut buffer) {
        Ok(n) => !buffer[..n].contains(&0),
        Err(_) => false,
    }
}

/// Read a text file, rejecting anything larger than `max_size` bytes.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read_to_string(path)
}

/// Collect regular files under `root` (or `root` itself), skipping hidden entries.
pub fn collect_files(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Object name for a file: its path relative to `base`, with `/` separators.
pub fn object_name_for(base: &Path, path: &Path) -> String {
    let relative = if base.is_file() {
        path.file_name().map(PathBuf::from).unwrap_or_else(|| path.to_path_buf())
    } else {
        path.strip_prefix(base)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    };

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "exe" | "dll" | "so" | "dylib" | "a" | "o" | "obj"
            | "png" | "jpg" | "jpeg" | "gif" | "bmp" | "ico" | "webp"
            | "mp3" | "mp4" | "avi" | "mkv" | "mov" | "wav" | "flac"
            | "zip" | "tar" | "gz" | "bz2" | "xz" | "7z" | "rar"
            | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx"
            | "woff" | "woff2" | "ttf" | "otf"
            | "db" | "sqlite" | "sqlite3" | "bin" | "dat" | "parquet"
    )
}

fn is_text_extension(ext: &str) -> bool {
    matches!(
        ext,
        "txt" | "md" | "markdown" | "rst" | "adoc" | "org"
            | "csv" | "tsv" | "log"
            | "json" | "jsonl" | "yaml" | "yml" | "toml" | "xml" | "ini" | "cfg" | "conf"
            | "html" | "htm" | "css"
            | "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "h" | "cpp" | "sh" | "sql"
            | "eml"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_extension_classification() {
        assert!(is_binary_extension("png"));
        assert!(!is_binary_extension("md"));
        assert!(is_text_extension("csv"));
        assert!(!is_text_extension("pdf"));
    }

    #[test]
    fn test_is_text_file_sniffs_unknown_extensions() {
        let dir = TempDir::new().unwrap();
        let text = dir.path().join("notes.unknown");
        let binary = dir.path().join("blob.unknown");
        fs::write(&text, "plain words").unwrap();
        fs::write(&binary, [0u8, 159, 146, 150]).unwrap();

        assert!(is_text_file(&text));
        assert!(!is_text_file(&binary));
        assert!(!is_text_file(&dir.path().join("missing.unknown")));
    }

    #[test]
    fn test_read_file_content_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "0123456789").unwrap();

        assert_eq!(read_file_content(&path, 10).unwrap(), "0123456789");
        assert!(read_file_content(&path, 9).is_err());
    }

    #[test]
    fn test_collect_files_skips_hidden() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("sub/b.txt"), "b").unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        fs::write(dir.path().join(".hidden"), "h").unwrap();

        let files = collect_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| object_name_for(dir.path(), p))
            .collect();
        assert_eq!(names, ["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn test_object_name_for_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.md");
        fs::write(&path, "x").unwrap();

        assert_eq!(collect_files(&path), vec![path.clone()]);
        assert_eq!(object_name_for(&path, &path), "report.md");
    }
}
