//! CSV codec for the dataset files and the atomic replace they are written with.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use csv::{ByteRecord, ReaderBuilder, StringRecord, WriterBuilder};
use ns_core::{Article, Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::warn;

pub const IDENTITY_COLUMN: &str = "link";

pub const ARTICLE_COLUMNS: &[&str] = &["title", "link", "published", "summary", "source", "site"];

pub const ENRICHED_COLUMNS: &[&str] = &[
    "title", "link", "published", "summary", "source", "site", "embedding",
];

fn is_blank(path: &Path) -> Result<bool> {
    Ok(fs::metadata(path)?.len() == 0)
}

pub fn require_column(headers: &StringRecord, column: &str, path: &Path) -> Result<()> {
    if headers.iter().any(|h| h == column) {
        Ok(())
    } else {
        Err(Error::Schema(format!(
            "{} has no '{}' column (found: {})",
            path.display(),
            column,
            headers.iter().collect::<Vec<_>>().join(", ")
        )))
    }
}

/// Reads every row of a CSV file that must carry the identity column.
/// A zero-length file reads as an empty collection.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if is_blank(path)? {
        return Ok(Vec::new());
    }
    let mut reader = csv::Reader::from_path(path)?;
    require_column(reader.headers()?, IDENTITY_COLUMN, path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, csv::Error>>()?;
    Ok(rows)
}

pub fn read_articles(path: &Path) -> Result<Vec<Article>> {
    read_rows(path)
}

/// Like [`read_articles`], but rows whose field count differs from the header
/// are skipped with a warning instead of failing the whole read.
pub fn read_articles_lenient(path: &Path) -> Result<Vec<Article>> {
    if is_blank(path)? {
        return Ok(Vec::new());
    }
    let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    require_column(&headers, IDENTITY_COLUMN, path)?;

    let mut articles = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != headers.len() {
            warn!(
                "Skipping malformed row at line {} of {} ({} fields, expected {})",
                record.position().map(|p| p.line()).unwrap_or_default(),
                path.display(),
                record.len(),
                headers.len()
            );
            continue;
        }
        articles.push(record.deserialize(Some(&headers))?);
    }
    Ok(articles)
}

fn ends_with_newline(path: &Path) -> Result<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Cuts whatever follows the last complete record of an append-only file: an
/// unterminated line, or trailing rows narrower or wider than the header.
/// Returns the number of bytes removed.
pub fn truncate_torn_tail(path: &Path) -> Result<u64> {
    if !path.exists() || is_blank(path)? {
        return Ok(0);
    }
    let len = fs::metadata(path)?.len();
    let terminated = ends_with_newline(path)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut record = ByteRecord::new();
    let mut width = None;
    let mut complete = 0;
    while reader.read_byte_record(&mut record)? {
        let end = reader.position().byte();
        if end >= len && !terminated {
            break;
        }
        match width {
            None => width = Some(record.len()),
            Some(w) if w != record.len() => continue,
            Some(_) => {}
        }
        complete = end;
    }

    if complete >= len {
        return Ok(0);
    }
    OpenOptions::new().write(true).open(path)?.set_len(complete)?;
    let removed = len - complete;
    warn!("Dropped {} bytes of incomplete rows from {}", removed, path.display());
    Ok(removed)
}

/// Replaces `path` with the output of `write`. The new content is written to a
/// sibling temporary file and renamed over the target, so readers observe
/// either the previous file or the complete new one.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// Atomically writes a header line followed by `rows`.
pub fn write_rows<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    write_atomic(path, |file| {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(headers)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

/// Appends `rows` to `path`. The header is written only when the file is new.
/// Complete rows already in the file are never rewritten; a torn tail left by
/// an interrupted append is cut first.
pub fn append_rows<T: Serialize>(path: &Path, headers: &[&str], rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    truncate_torn_tail(path)?;
    let needs_header = !path.exists() || is_blank(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        writer.write_record(headers)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct EnrichedRow<'a> {
    title: &'a str,
    link: &'a str,
    published: Option<&'a str>,
    summary: Option<&'a str>,
    source: &'a str,
    site: &'a str,
    embedding: String,
}

/// Writes the dataset with an appended `embedding` column holding a JSON array.
pub fn write_enriched(path: &Path, rows: &[(Article, Vec<f32>)]) -> Result<()> {
    let encoded = rows
        .iter()
        .map(|(article, embedding)| {
            Ok(EnrichedRow {
                title: &article.title,
                link: &article.link,
                published: article.published.as_deref(),
                summary: article.summary.as_deref(),
                source: &article.source,
                site: &article.site,
                embedding: serde_json::to_string(embedding)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    write_rows(path, ENRICHED_COLUMNS, &encoded)
}
