//! Title extraction for markdown and plain-text documents

use std::path::Path;

/// Lines of a document searched for a title heading
const TITLE_SCAN_LINES: usize = 50;

/// Derive a document title.
///
/// Order of preference: a `title:` key in YAML frontmatter, the first ATX
/// heading (`#` to `######` followed by a space), then the file name
/// without its extension.
pub fn extract_title(path: &Path, text: &str) -> String {
    let (frontmatter, body) = split_frontmatter(text);

    frontmatter
        .and_then(frontmatter_title)
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| file_stem(path))
}

/// Split leading `---` delimited frontmatter from the body
fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let rest = match text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    {
        Some(rest) => rest,
        None => return (None, text),
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body);
        }
        offset += line.len();
    }

    // Unterminated frontmatter is treated as ordinary text
    (None, text)
}

fn frontmatter_title(frontmatter: &str) -> Option<String> {
    let value: serde_yaml::Value = serde_yaml::from_str(frontmatter).ok()?;
    value
        .get("title")
        .and_then(|t| t.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn first_heading(body: &str) -> Option<String> {
    let mut in_fence = false;

    for line in body.lines().take(TITLE_SCAN_LINES) {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let hashes = trimmed.chars().take_while(|&c| c == '#').count();
        if (1..=6).contains(&hashes) {
            if let Some(heading) = trimmed[hashes..].strip_prefix(' ') {
                let heading = heading.trim().trim_end_matches('#').trim();
                if !heading.is_empty() {
                    return Some(heading.to_string());
                }
            }
        }
    }

    None
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(String::from)
        .unwrap_or_else(|| path.display().to_string())
}
