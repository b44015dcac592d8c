// Copyright (c) 2025 Sean McNamara <smcnam@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frontmatter parsing and atomic rewriting.
//!
//! Only the leading block is ever considered: the opening delimiter must be
//! the file's first line, and the closing delimiter must be a line on its
//! own. An inline `---` inside the body (a fenced code block, a Markdown
//! horizontal rule) can never be mistaken for either delimiter because by
//! the time we're scanning for the closing one we've already consumed the
//! opening one, and once the closing one is found scanning stops.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use super::model::{Frontmatter, Status};

const DELIM: &str = "---";

/// Split raw file content into its frontmatter block (if any) and body.
///
/// Returns `(None, content)` when the first line isn't a bare `---`, or when
/// no subsequent bare `---` line closes it — in both cases the whole file is
/// body and frontmatter is absent, not an error.
fn split_frontmatter(content: &str) -> (Option<&str>, &str) {
    let mut offset = 0usize;
    let mut lines = content.split_inclusive('\n');

    let first = match lines.next() {
        Some(l) => l,
        None => return (None, content),
    };
    if first.trim_end_matches(['\n', '\r']) != DELIM {
        return (None, content);
    }
    offset += first.len();
    let yaml_start = offset;

    loop {
        match lines.next() {
            None => return (None, content),
            Some(line) => {
                if line.trim_end_matches(['\n', '\r']) == DELIM {
                    let yaml_end = offset;
                    offset += line.len();
                    return (Some(&content[yaml_start..yaml_end]), &content[offset..]);
                }
                offset += line.len();
            }
        }
    }
}

/// Parse a flat `key: value` block (the only shape our frontmatter uses)
/// into a `Frontmatter`. Unknown keys are ignored; malformed lines are
/// skipped rather than erroring, since the whole point of a tolerant parse
/// is to never block the pipeline on a human typo.
fn parse_yaml_block(block: &str) -> Frontmatter {
    let mut fm = Frontmatter::default();
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key {
            "status" => fm.status = value.parse::<Status>().ok(),
            "container" => fm.container = Some(value.to_string()),
            "started" => fm.started = value.parse().ok(),
            "completed" => fm.completed = value.parse().ok(),
            "version" => fm.version = Some(value.to_string()),
            _ => {}
        }
    }
    fm
}

/// Render a frontmatter struct back into its `---\n...\n---\n` block,
/// omitting unset fields, in a fixed key order.
fn render_block(fm: &Frontmatter) -> String {
    let mut out = String::from("---\n");
    if let Some(status) = fm.status {
        out.push_str(&format!("status: {}\n", status));
    }
    if let Some(container) = &fm.container {
        out.push_str(&format!("container: {}\n", container));
    }
    if let Some(started) = fm.started {
        out.push_str(&format!("started: {}\n", started.to_rfc3339()));
    }
    if let Some(completed) = fm.completed {
        out.push_str(&format!("completed: {}\n", completed.to_rfc3339()));
    }
    if let Some(version) = &fm.version {
        out.push_str(&format!("version: {}\n", version));
    }
    out.push_str("---\n");
    out
}

/// Parse frontmatter and body out of raw file content.
pub fn parse(content: &str) -> (Frontmatter, &str) {
    match split_frontmatter(content) {
        (Some(block), body) => (parse_yaml_block(block), body),
        (None, body) => (Frontmatter::default(), body),
    }
}

/// If `body` begins with a block `---\n...\n---` whose interior is entirely
/// whitespace, strip that block and trim the leading whitespace left behind.
/// A non-empty pseudo-frontmatter block (e.g. a real horizontal rule
/// followed by text) is left untouched.
pub fn strip_empty_pseudo_frontmatter(body: &str) -> &str {
    match split_frontmatter(body) {
        (Some(block), rest) if block.trim().is_empty() => rest.trim_start(),
        _ => body,
    }
}

/// Read a prompt file, returning its frontmatter and body (with the
/// "empty duplicate frontmatter" hazard already stripped from the body, as
/// `Body()` per spec does).
pub fn read(path: &Path) -> Result<(Frontmatter, String)> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (fm, body) = parse(&content);
    Ok((fm, strip_empty_pseudo_frontmatter(body).to_string()))
}

/// Read only the frontmatter, without the `Body()` post-processing.
pub fn read_frontmatter(path: &Path) -> Result<Frontmatter> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse(&content).0)
}

/// Rewrite the frontmatter block in place, preserving the body byte-for-byte.
/// Creates a frontmatter block if none previously existed. Uses a temp file
/// in the same directory plus an atomic rename so readers never observe a
/// half-written file.
pub fn write(path: &Path, fm: &Frontmatter, body: &str) -> Result<()> {
    let mut rendered = render_block(fm);
    rendered.push_str(body);
    atomic_write(path, &rendered)
}

/// Re-read a prompt, apply `patch` to its frontmatter, and write the result
/// back — preserving the *raw* body (not the pseudo-frontmatter-stripped
/// one) so repeated `SetField`/`SetStatus` calls never lose file content.
fn rewrite_with<F>(path: &Path, patch: F) -> Result<()>
where
    F: FnOnce(&mut Frontmatter),
{
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (mut fm, body) = parse(&content);
    patch(&mut fm);
    write(path, &fm, body)
}

pub fn set_status(path: &Path, status: Status) -> Result<()> {
    rewrite_with(path, |fm| fm.status = Some(status))
}

pub fn set_container(path: &Path, container: &str) -> Result<()> {
    let container = container.to_string();
    rewrite_with(path, move |fm| fm.container = Some(container))
}

pub fn set_started_now(path: &Path) -> Result<()> {
    let now = chrono::Utc::now();
    rewrite_with(path, move |fm| fm.started = Some(now))
}

pub fn set_completed_now(path: &Path) -> Result<()> {
    let now = chrono::Utc::now();
    rewrite_with(path, move |fm| fm.completed = Some(now))
}

pub fn set_version(path: &Path, version: &str) -> Result<()> {
    let version = version.to_string();
    rewrite_with(path, move |fm| fm.version = Some(version))
}

/// Atomically write `content` to `path` using a temp file in the same
/// directory, the same pattern `gimme::marker::atomic_write` uses.
fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    temp.write_all(content.as_bytes())
        .with_context(|| "failed to write to temp file")?;
    if let Ok(metadata) = fs::metadata(path) {
        let _ = fs::set_permissions(temp.path(), metadata.permissions());
    }
    temp.persist(path)
        .with_context(|| format!("failed to persist temp file to {}", path.display()))?;
    Ok(())
}

/// First `#`-prefixed Markdown heading in the file, or the filename stem.
pub fn title(path: &Path, body: &str) -> String {
    for line in body.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix('#') {
            let heading = rest.trim_start_matches('#').trim();
            if !heading.is_empty() {
                return heading.to_string();
            }
        }
    }
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn no_frontmatter_returns_empty_not_error() {
        let (fm, body) = parse("# Hello\nBody text\n");
        assert_eq!(fm, Frontmatter::default());
        assert_eq!(body, "# Hello\nBody text\n");
    }

    #[test]
    fn parses_full_block() {
        let content = "---\nstatus: queued\ncontainer: darkfactory-001-a\n---\n# Task\n";
        let (fm, body) = parse(content);
        assert_eq!(fm.status, Some(Status::Queued));
        assert_eq!(fm.container.as_deref(), Some("darkfactory-001-a"));
        assert_eq!(body, "# Task\n");
    }

    #[test]
    fn inline_dashes_in_body_are_not_a_delimiter() {
        let content = "---\nstatus: queued\n---\nabove\n---\nbelow\n";
        let (fm, body) = parse(content);
        assert_eq!(fm.status, Some(Status::Queued));
        assert_eq!(body, "above\n---\nbelow\n");
    }

    #[test]
    fn missing_closing_delimiter_treats_whole_file_as_body() {
        let content = "---\nstatus: queued\n# no closer\n";
        let (fm, body) = parse(content);
        assert_eq!(fm, Frontmatter::default());
        assert_eq!(body, content);
    }

    #[test]
    fn strips_empty_pseudo_frontmatter_but_not_nonempty() {
        assert_eq!(
            strip_empty_pseudo_frontmatter("---\n\n---\n# Hello\n"),
            "# Hello\n"
        );
        let nonempty = "---\nreal content\n---\n# Hello\n";
        assert_eq!(strip_empty_pseudo_frontmatter(nonempty), nonempty);
    }

    #[test]
    fn set_status_preserves_body_bytes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "001-a.md", "---\nstatus: queued\n---\nkeep me\n");
        set_status(&path, Status::Executing).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        let (fm, body) = parse(&raw);
        assert_eq!(fm.status, Some(Status::Executing));
        assert_eq!(body, "keep me\n");
    }

    #[test]
    fn set_status_creates_block_when_absent() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "001-a.md", "# No frontmatter\nbody\n");
        set_status(&path, Status::Queued).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        let (fm, body) = parse(&raw);
        assert_eq!(fm.status, Some(Status::Queued));
        assert_eq!(body, "# No frontmatter\nbody\n");
    }

    #[test]
    fn round_trip_parse_write() {
        let fm = Frontmatter {
            status: Some(Status::Failed),
            container: Some("darkfactory-003-x".to_string()),
            started: Some(chrono::Utc::now().with_nanosecond(0).unwrap()),
            completed: None,
            version: Some("0.1.0".to_string()),
        };
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.md");
        write(&path, &fm, "body\n").unwrap();
        let (read_fm, _) = parse(&fs::read_to_string(&path).unwrap());
        assert_eq!(read_fm, fm);
    }

    use chrono::Timelike;

    #[test]
    fn title_prefers_heading_over_stem() {
        assert_eq!(title(Path::new("/q/001-a.md"), "text\n# My Title\nmore"), "My Title");
        assert_eq!(title(Path::new("/q/001-a.md"), "no heading here"), "001-a");
    }
}
