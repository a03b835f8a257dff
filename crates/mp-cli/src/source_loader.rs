use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use mp_core::{ParserMode, ProblemError};
use mp_problem::{load_template, ProblemTemplate, XmlContent};
use walkdir::WalkDir;

/// Expands directories into the `*.xml` files below them, sorted by path.
pub(crate) fn collect_problem_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            return Err(ProblemError::new(
                "CLI_SOURCE_NOT_FOUND",
                format!("path does not exist: {}", path.display()),
            )
            .into());
        }
        if path.is_file() {
            files.push(path.clone());
            continue;
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry.with_context(|| format!("scanning {}", path.display()))?;
            if entry.file_type().is_file() && is_xml(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("xml"))
}

pub(crate) fn read_problem_file(path: &Path) -> anyhow::Result<XmlContent> {
    let source =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(XmlContent::new(source))
}

/// Loads a template that must be free of errors for realize and grade.
pub(crate) fn load_problem(path: &Path) -> anyhow::Result<ProblemTemplate> {
    let mut content = read_problem_file(path)?;
    let template = load_template(&mut content, ParserMode::NORMAL);
    if template.is_dummy() {
        let details = content
            .diagnostics()
            .entries()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ProblemError::new(
            "CLI_PROBLEM_INVALID",
            format!("{} could not be loaded: {}", path.display(), details),
        )
        .into());
    }
    Ok(template)
}
