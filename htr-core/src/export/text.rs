use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use snafu::ResultExt;
use tracing::*;

use crate::{error::*, layout::page::PageResult};

pub const ALL_PAGES_FILE: &str = "all_pages.txt";

/// Writes `page_{n:03}.txt` for every page plus `all_pages.txt`.
pub fn save_results(results: &[PageResult], dir: &Path) -> Result<Vec<PathBuf>, HtrError> {
    std::fs::create_dir_all(dir).context(IoWriteSnafu {
        path: dir.to_string_lossy(),
    })?;

    let mut written = Vec::with_capacity(results.len() + 1);
    for page in results {
        let path = dir.join(format!("page_{:03}.txt", page.page_number));
        write_file(&path, &page.text)?;
        written.push(path);
    }

    let path = dir.join(ALL_PAGES_FILE);
    write_file(&path, &all_pages_text(results))?;
    written.push(path);

    info!("saved {} text files to {}", written.len(), dir.display());
    Ok(written)
}

fn write_file(path: &Path, content: &str) -> Result<(), HtrError> {
    std::fs::write(path, content).context(IoWriteSnafu {
        path: path.to_string_lossy(),
    })
}

/// Content of `all_pages.txt`.
pub fn all_pages_text(results: &[PageResult]) -> String {
    let mut text = String::new();
    for page in results {
        let _ = write!(text, "=== Page {} ===\n{}\n\n", page.page_number, page.text);
    }
    text
}

/// Text of all pages as shown by the demos.
pub fn combined_text(results: &[PageResult]) -> String {
    let mut text = String::new();
    for page in results {
        let _ = write!(text, "--- Page {} ---\n{}\n\n", page.page_number, page.text);
    }
    text
}

/// One `Page N: W words` line per page.
pub fn summary(results: &[PageResult]) -> String {
    results
        .iter()
        .map(|page| format!("Page {}: {} words", page.page_number, page.word_count))
        .collect::<Vec<_>>()
        .join("\n")
}
