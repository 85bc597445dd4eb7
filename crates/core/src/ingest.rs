use crate::chunking::process_document;
use crate::embeddings::Embedder;
use crate::models::{ChunkingOptions, Course};
use crate::store::DualIndex;
use crate::traits::{CatalogIndex, ContentIndex};
use crate::IngestError;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const TRANSCRIPT_EXTENSIONS: [&str; 2] = ["txt", "md"];

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_transcript = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                TRANSCRIPT_EXTENSIONS
                    .iter()
                    .any(|wanted| ext.eq_ignore_ascii_case(wanted))
            });

        if is_transcript {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Ingests one raw transcript: chunk, then write content before catalog so
/// the catalog never advertises chunks that are not indexed yet.
pub async fn ingest_document<C, T, E>(
    index: &DualIndex<C, T, E>,
    raw_text: &str,
    declared_title: &str,
    options: ChunkingOptions,
) -> Result<(Course, usize), IngestError>
where
    C: CatalogIndex + Send + Sync,
    T: ContentIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    let (course, chunks) = process_document(raw_text, declared_title, options)?;
    index.upsert_chunks(&course.title, &chunks).await?;
    index.upsert_course(&course, chunks.len()).await?;
    Ok((course, chunks.len()))
}

pub struct SkippedDocument {
    pub path: PathBuf,
    pub reason: String,
}

pub struct IngestionReport {
    pub courses: Vec<String>,
    pub chunks_added: usize,
    pub skipped: Vec<SkippedDocument>,
}

/// Best-effort folder ingestion: unreadable or malformed documents are
/// reported, not fatal. Courses whose title is already in the catalog are
/// skipped unless `overwrite` is set.
pub async fn ingest_folder<C, T, E>(
    index: &DualIndex<C, T, E>,
    folder: &Path,
    options: ChunkingOptions,
    overwrite: bool,
) -> Result<IngestionReport, IngestError>
where
    C: CatalogIndex + Send + Sync,
    T: ContentIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    let files = discover_documents(folder);
    if files.is_empty() {
        return Err(IngestError::NoDocuments(folder.display().to_string()));
    }

    let existing = index.list_courses().await?;
    let mut report = IngestionReport {
        courses: Vec::new(),
        chunks_added: 0,
        skipped: Vec::new(),
    };

    for path in files {
        let outcome = ingest_file(index, &path, options, overwrite, &existing).await;
        match outcome {
            Ok(Some((course, count))) => {
                report.courses.push(course.title);
                report.chunks_added += count;
            }
            Ok(None) => report.skipped.push(SkippedDocument {
                path,
                reason: "course already ingested".to_string(),
            }),
            Err(error) => report.skipped.push(SkippedDocument {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(report)
}

async fn ingest_file<C, T, E>(
    index: &DualIndex<C, T, E>,
    path: &Path,
    options: ChunkingOptions,
    overwrite: bool,
    existing: &[String],
) -> Result<Option<(Course, usize)>, IngestError>
where
    C: CatalogIndex + Send + Sync,
    T: ContentIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    let declared_title = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
        .to_string();

    let raw_text = fs::read_to_string(path)?;
    let (course, chunks) = process_document(&raw_text, &declared_title, options)?;

    if !overwrite && existing.contains(&course.title) {
        return Ok(None);
    }

    index.upsert_chunks(&course.title, &chunks).await?;
    index.upsert_course(&course, chunks.len()).await?;
    Ok(Some((course, chunks.len())))
}
