//! Shared fixtures for unit tests.

use std::{fs, path::Path, sync::Arc};

use crate::{
    highlight::{HighlightOptions, Highlighter, SolutionOptions},
    markdown::MarkdownParser,
};

/// Write a file under `root`, creating parents.
pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("create parents");
    fs::write(path, contents).expect("write fixture");
}

/// A parser with no solution connected.
pub fn plain_parser() -> MarkdownParser {
    MarkdownParser::new(Arc::new(Highlighter::new(HighlightOptions::default())))
}

/// A parser whose highlighter resolves doc-ids from `solution_root`.
///
/// The project filter is cleared so fixtures don't need a `blog-projects`
/// path component.
pub fn parser_with_solution(solution_root: &Path) -> MarkdownParser {
    let mut solution = SolutionOptions::new(solution_root);
    solution.project_filter = String::new();
    MarkdownParser::new(Arc::new(Highlighter::new(HighlightOptions {
        solution: Some(solution),
        ..Default::default()
    })))
}
