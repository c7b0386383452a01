//! Gathering documents for ingestion from local directories or URLs.
//!
//! Empty sources are dropped here so that no zero-byte document reaches the
//! upload path.

use crate::store::Document;
use anyhow::{bail, Context, Result};
use std::path::Path;
use walkdir::WalkDir;

/// torchtune tutorials used as the default demo corpus
pub const DEFAULT_URLS: &[&str] = &[
    "https://raw.githubusercontent.com/pytorch/torchtune/main/docs/source/tutorials/memory_optimizations.rst",
    "https://raw.githubusercontent.com/pytorch/torchtune/main/docs/source/tutorials/chat.rst",
    "https://raw.githubusercontent.com/pytorch/torchtune/main/docs/source/tutorials/llama3.rst",
    "https://raw.githubusercontent.com/pytorch/torchtune/main/docs/source/tutorials/qat_finetune.rst",
    "https://raw.githubusercontent.com/pytorch/torchtune/main/docs/source/tutorials/lora_finetune.rst",
];

/// Recursively read every non-empty file under `dir`, ordered by path
pub fn collect_local_files(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        bail!("Directory not found: {}", dir.display());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let content = match std::fs::read(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), "Skipping unreadable file: {}", e);
                continue;
            },
        };
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match Document::new(filename, content) {
            Ok(document) => documents.push(document),
            Err(e) => tracing::warn!(path = %path.display(), "Skipping file: {}", e),
        }
    }

    tracing::info!(count = documents.len(), dir = %dir.display(), "Collected local files");
    Ok(documents)
}

/// Upload name for a downloaded URL: its last path segment with a `.txt` extension
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let segment = match path.trim_end_matches('/').split_once('/') {
        Some((_host, rest)) => rest.rsplit('/').next().unwrap_or(""),
        None => "",
    };
    let stem = match segment.rfind('.') {
        Some(idx) if idx > 0 => &segment[..idx],
        _ => segment,
    };
    if stem.is_empty() {
        "document.txt".to_string()
    } else {
        format!("{}.txt", stem)
    }
}

/// Download each URL as text. Failed downloads and empty bodies are skipped.
pub async fn download_documents(http: &reqwest::Client, urls: &[String]) -> Vec<Document> {
    let mut documents = Vec::with_capacity(urls.len());
    for url in urls {
        let body = match fetch(http, url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(%url, "Failed to download: {:#}", e);
                continue;
            },
        };
        let text = String::from_utf8_lossy(&body);
        match Document::from_text(filename_from_url(url), text.trim()) {
            Ok(document) => documents.push(document),
            Err(e) => tracing::warn!(%url, "Skipping download: {}", e),
        }
    }
    documents
}

async fn fetch(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = http
        .get(url)
        .send()
        .await
        .context("Request failed")?
        .error_for_status()
        .context("Server returned an error")?;
    let bytes = response.bytes().await.context("Failed to read body")?;
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    mod filename {
        use super::*;

        #[test]
        fn replaces_extension() {
            assert_eq!(filename_from_url(DEFAULT_URLS[4]), "lora_finetune.txt");
        }

        #[test]
        fn adds_extension_when_missing() {
            assert_eq!(filename_from_url("https://example.com/docs/readme"), "readme.txt");
        }

        #[test]
        fn ignores_query_and_fragment() {
            assert_eq!(
                filename_from_url("https://example.com/a/chat.rst?raw=1#top"),
                "chat.txt"
            );
        }

        #[test]
        fn falls_back_for_bare_host() {
            assert_eq!(filename_from_url("https://example.com/"), "document.txt");
        }
    }

    mod local {
        use super::*;

        #[test]
        fn collects_nested_files_in_path_order() {
            let temp_dir = TempDir::new().unwrap();
            let nested = temp_dir.path().join("nested");
            std::fs::create_dir_all(&nested).unwrap();
            std::fs::write(temp_dir.path().join("b.txt"), "beta").unwrap();
            std::fs::write(nested.join("a.txt"), "alpha").unwrap();
            std::fs::write(temp_dir.path().join("empty.txt"), "").unwrap();

            let documents = collect_local_files(temp_dir.path()).unwrap();
            let names: Vec<_> = documents.iter().map(|d| d.filename()).collect();
            assert_eq!(names, vec!["b.txt", "a.txt"]);
            assert_eq!(documents[1].content(), b"alpha");
        }

        #[test]
        fn missing_directory_is_an_error() {
            let temp_dir = TempDir::new().unwrap();
            let err = collect_local_files(&temp_dir.path().join("nope")).unwrap_err();
            assert!(err.to_string().contains("Directory not found"));
        }

        #[test]
        fn empty_directory_yields_nothing() {
            let temp_dir = TempDir::new().unwrap();
            assert!(collect_local_files(temp_dir.path()).unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn unreachable_urls_are_skipped() {
        let http = reqwest::Client::new();
        let documents = download_documents(&http, &["http://127.0.0.1:1/doc.rst".to_string()]).await;
        assert!(documents.is_empty());
    }
}
