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

//! Renumbers queue files into the canonical `NNN-slug.md` shape.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use super::frontmatter;
use super::model::{Prompt, Rename, Status};
use super::store::PromptStore;

/// Collapses anything outside `[a-z0-9]` into a single hyphen.
static NON_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// A leading digit run followed by a hyphen, loosely — unlike
/// `CANONICAL_NAME_PATTERN` this doesn't require exactly three digits, so a
/// queue file named `9-foo.md` is recognized as already carrying number 9
/// (to be zero-padded to `009-foo.md`) rather than treated as un-numbered.
static LOOSE_PREFIX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)-").unwrap());

fn derive_slug(stem: &str) -> String {
    let lowered = stem.to_lowercase();
    let collapsed = NON_SLUG_CHARS.replace_all(&lowered, "-");
    collapsed.trim_matches('-').to_string()
}

/// Extract a queue file's existing number, if its stem starts with any run
/// of digits followed by a hyphen — regardless of digit count or padding.
fn loose_prefix_number(path: &std::path::Path) -> Option<u32> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    LOOSE_PREFIX_PATTERN
        .captures(&stem)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Renumber every `.md` file in the queue directory, assigning a canonical
/// `NNN-slug.md` name. Returns the renames actually performed.
///
/// A per-file failure (the file vanished out from under us, likely an
/// editor doing a save-as) is logged and skipped rather than aborting the
/// whole batch, matching `checkout.rs`'s tolerance for a single bad item.
pub fn normalize_filenames(store: &PromptStore) -> anyhow::Result<Vec<Rename>> {
    let queue_paths = store.queued_paths()?;
    let completed_paths = store.completed_paths()?;

    let mut used: BTreeSet<u32> = BTreeSet::new();
    // Track queue files that keep their existing number vs. those that must
    // be assigned a fresh one because they're un-numbered or collided.
    let mut keep_number: Vec<(PathBuf, u32)> = Vec::new();
    let mut needs_number: Vec<PathBuf> = Vec::new();

    for path in &completed_paths {
        if let Some(n) = Prompt::new(path.clone()).number() {
            used.insert(n);
        }
    }

    // Collisions within the queue: the lexicographically later file loses
    // its number and falls back to needing a fresh one.
    let mut claimed_in_queue: std::collections::BTreeMap<u32, PathBuf> =
        std::collections::BTreeMap::new();
    let mut sorted_queue = queue_paths.clone();
    sorted_queue.sort();

    for path in &sorted_queue {
        match loose_prefix_number(path) {
            Some(n) => match claimed_in_queue.get(&n) {
                Some(_existing) => {
                    // This file is lexicographically later than the one
                    // already claiming `n` (we iterate in sorted order), so
                    // it loses the number.
                    needs_number.push(path.clone());
                }
                None => {
                    claimed_in_queue.insert(n, path.clone());
                }
            },
            None => needs_number.push(path.clone()),
        }
    }

    for (n, path) in &claimed_in_queue {
        used.insert(*n);
        keep_number.push((path.clone(), *n));
    }

    let mut renames = Vec::new();

    for path in &needs_number {
        let mut candidate = 1u32;
        while used.contains(&candidate) {
            candidate += 1;
        }
        if candidate > crate::constants::MAX_PROMPT_NUMBER {
            eprintln!(
                "warning: no available prompt numbers remain (999 limit reached), leaving {} un-numbered",
                path.display()
            );
            continue;
        }
        used.insert(candidate);
        match rename_one(store, path, candidate) {
            Ok(Some(rename)) => renames.push(rename),
            Ok(None) => {}
            Err(err) => {
                eprintln!(
                    "warning: failed to normalize {}: {:#}",
                    path.display(),
                    err
                );
            }
        }
    }

    for (path, n) in &keep_number {
        match rename_one(store, path, *n) {
            Ok(Some(rename)) => renames.push(rename),
            Ok(None) => {}
            Err(err) => {
                eprintln!(
                    "warning: failed to normalize {}: {:#}",
                    path.display(),
                    err
                );
            }
        }
    }

    Ok(renames)
}

/// Rename a single file to `NNN-slug.md` if it isn't already in that shape,
/// and ensure it carries a `status` field, defaulting to `queued`.
fn rename_one(
    store: &PromptStore,
    path: &PathBuf,
    number: u32,
) -> anyhow::Result<Option<Rename>> {
    if !path.exists() {
        return Ok(None);
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    // Strip any existing leading digit-run prefix (however it was padded)
    // before re-deriving the slug, so `9-foo.md` renormalizes to
    // `009-foo.md` rather than `009-9-foo.md`, and renormalizing an already
    // canonical file is idempotent.
    let slug_source = match LOOSE_PREFIX_PATTERN.find(&stem) {
        Some(m) => &stem[m.end()..],
        None => &stem,
    };
    let mut slug = derive_slug(slug_source);
    if slug.is_empty() {
        slug = derive_slug(&stem);
    }
    if slug.is_empty() {
        slug = "untitled".to_string();
    }

    let new_name = format!("{:03}-{}.md", number, slug);
    let new_path = store.queue_dir().join(&new_name);

    let rename = if path.file_name().map(|n| n.to_string_lossy().to_string()) != Some(new_name) {
        if new_path != *path {
            fs::rename(path, &new_path)?;
        }
        Some(Rename {
            old: path.clone(),
            new: new_path.clone(),
        })
    } else {
        None
    };

    let final_path = rename.as_ref().map(|r| r.new.clone()).unwrap_or_else(|| path.clone());
    let fm = frontmatter::read_frontmatter(&final_path)?;
    if fm.status.is_none() {
        frontmatter::set_status(&final_path, Status::Queued)?;
    }

    Ok(rename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store() -> (TempDir, PromptStore) {
        let dir = TempDir::new().unwrap();
        let store = PromptStore::new(
            dir.path().join("queue"),
            dir.path().join("completed"),
            dir.path().join("logs"),
        );
        store.ensure_directories().unwrap();
        (dir, store)
    }

    #[test]
    fn assigns_numbers_to_un_numbered_files() {
        let (_tmp, store) = store();
        fs::write(store.queue_dir().join("Fix The Bug!.md"), "# Task\n").unwrap();
        let renames = normalize_filenames(&store).unwrap();
        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].new.file_name().unwrap(), "001-fix-the-bug.md");
    }

    #[test]
    fn is_idempotent() {
        let (_tmp, store) = store();
        fs::write(
            store.queue_dir().join("010-already-named.md"),
            "---\nstatus: queued\n---\n",
        )
        .unwrap();
        let first = normalize_filenames(&store).unwrap();
        assert!(first.is_empty());
        let second = normalize_filenames(&store).unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn collision_demotes_lexicographically_later_file() {
        let (_tmp, store) = store();
        fs::write(store.queue_dir().join("001-alpha.md"), "---\nstatus: queued\n---\n").unwrap();
        fs::write(store.queue_dir().join("001-zeta.md"), "---\nstatus: queued\n---\n").unwrap();
        let renames = normalize_filenames(&store).unwrap();
        // the lexicographically later "001-zeta.md" loses its number
        assert!(renames.iter().any(|r| r.old.file_name().unwrap() == "001-zeta.md"));
        assert!(store.queue_dir().join("001-alpha.md").exists());
    }

    #[test]
    fn sets_default_status_when_missing() {
        let (_tmp, store) = store();
        fs::write(store.queue_dir().join("draft.md"), "# No status\n").unwrap();
        normalize_filenames(&store).unwrap();
        let fm = store
            .read_frontmatter(&store.queue_dir().join("001-draft.md"))
            .unwrap();
        assert_eq!(fm.status, Some(Status::Queued));
    }

    #[test]
    fn tolerates_concurrent_deletion() {
        let (_tmp, store) = store();
        let path = store.queue_dir().join("will-vanish.md");
        fs::write(&path, "# Task\n").unwrap();
        fs::remove_file(&path).unwrap();
        // Simulate the race: normalize still succeeds for an empty dir.
        let renames = normalize_filenames(&store).unwrap();
        assert!(renames.is_empty());
    }

    #[test]
    fn single_digit_prefix_is_preserved_and_zero_padded() {
        let (_tmp, store) = store();
        fs::write(store.queue_dir().join("9-foo.md"), "# Foo\n").unwrap();
        let renames = normalize_filenames(&store).unwrap();
        assert_eq!(renames.len(), 1);
        assert_eq!(renames[0].new.file_name().unwrap(), "009-foo.md");
    }

    #[test]
    fn numbers_beyond_999_are_skipped_not_fatal() {
        let (_tmp, store) = store();
        for n in 1..=999u32 {
            fs::write(
                store.completed_dir().join(format!("{:03}-done.md", n)),
                "---\nstatus: completed\n---\n",
            )
            .unwrap();
        }
        fs::write(store.queue_dir().join("overflow.md"), "# Task\n").unwrap();
        let renames = normalize_filenames(&store).unwrap();
        assert!(renames.is_empty());
        assert!(store.queue_dir().join("overflow.md").exists());
    }
}
