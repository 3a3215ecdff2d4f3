use std::fs;
use std::path::{Path, PathBuf};

use crate::model::CardRecord;

use super::ExtractError;

pub const INDEX_EXTENSION: &str = "txt";
const FIELD_SEPARATOR: char = '|';
const COMMENT_PREFIXES: [&str; 4] = ["#", "'", ";", "//"];

/// `<index_dir>/<pdf stem>.txt`
pub fn index_path_for(index_dir: &Path, pdf_path: &Path) -> Option<PathBuf> {
    let stem = pdf_path.file_stem()?;
    let mut file_name = stem.to_os_string();
    file_name.push(".");
    file_name.push(INDEX_EXTENSION);
    Some(index_dir.join(file_name))
}

fn is_comment(line: &str) -> bool {
    COMMENT_PREFIXES
        .iter()
        .any(|prefix| line.starts_with(prefix))
}

/// Parse a hand-curated card list. Records are laid out two per page in file order.
pub fn parse_override_index(contents: &str, file: &str) -> Result<Vec<CardRecord>, ExtractError> {
    let mut records = Vec::new();

    for (line_index, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }

        let fields = line
            .split(FIELD_SEPARATOR)
            .map(str::trim)
            .collect::<Vec<&str>>();
        let [tag, nationality, name] = fields.as_slice() else {
            return Err(ExtractError::MalformedIndex {
                file: file.to_string(),
                line: line_index + 1,
                found: fields.len(),
            });
        };

        let record_index = records.len();
        records.push(CardRecord::new(
            1 + (record_index / 2) as u32,
            (record_index % 2) as u8,
            *tag,
            *nationality,
            *name,
        ));
    }

    Ok(records)
}

pub fn read_override_index(path: &Path, file: &str) -> Result<Vec<CardRecord>, ExtractError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        ExtractError::io(
            file,
            format!("failed to read index file {}", path.display()),
            source,
        )
    })?;
    parse_override_index(&contents, file)
}
