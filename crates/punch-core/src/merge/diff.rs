//! In-process line diff rendered as conflict regions.
//!
//! The diff is first expressed with `#ifdef`-style markers (the layout of
//! `diff -D HEAD`), then rewritten into `<<<<<<<`/`=======`/`>>>>>>>`
//! regions. Blocks without a region are dropped.

use similar::{capture_diff_slices, Algorithm, DiffOp};

use super::document::SEPARATOR;

const MERGE_TAG: &str = "HEAD";

pub const LOCAL_MARKER: &str = "<<<<<<< LOCAL";
pub const SPLIT_MARKER: &str = "=======";
pub const REMOTE_MARKER: &str = ">>>>>>> REMOTE";

/// `diff -D HEAD` style output with `local` as the old side
pub fn ifdef_merge(local: &str, remote: &str) -> Vec<String> {
    let old: Vec<&str> = local.lines().collect();
    let new: Vec<&str> = remote.lines().collect();
    let mut out = Vec::new();

    for op in capture_diff_slices(Algorithm::Myers, &old, &new) {
        match op {
            DiffOp::Equal { old_index, len, .. } => {
                push_lines(&mut out, &old[old_index..old_index + len]);
            }
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                out.push(format!("#ifndef {MERGE_TAG}"));
                push_lines(&mut out, &old[old_index..old_index + old_len]);
                out.push(format!("#endif /* ! {MERGE_TAG} */"));
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                out.push(format!("#ifdef {MERGE_TAG}"));
                push_lines(&mut out, &new[new_index..new_index + new_len]);
                out.push(format!("#endif /* {MERGE_TAG} */"));
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                out.push(format!("#ifndef {MERGE_TAG}"));
                push_lines(&mut out, &old[old_index..old_index + old_len]);
                out.push(format!("#else /* {MERGE_TAG} */"));
                push_lines(&mut out, &new[new_index..new_index + new_len]);
                out.push(format!("#endif /* {MERGE_TAG} */"));
            }
        }
    }
    out
}

fn push_lines(out: &mut Vec<String>, lines: &[&str]) {
    out.extend(lines.iter().map(|line| (*line).to_string()));
}

/// Rewrite `#ifdef` markers into two-sided conflict regions.
///
/// One-sided hunks get an empty opposite side so every region offers a
/// choice between both versions.
pub fn rewrite_markers(lines: &[String]) -> Vec<String> {
    let ifndef = format!("#ifndef {MERGE_TAG}");
    let ifdef = format!("#ifdef {MERGE_TAG}");
    let else_line = format!("#else /* {MERGE_TAG} */");
    let endif = format!("#endif /* {MERGE_TAG} */");
    let endif_not = format!("#endif /* ! {MERGE_TAG} */");

    let mut out = Vec::with_capacity(lines.len());
    for line in lines {
        if *line == ifndef {
            out.push(LOCAL_MARKER.to_string());
        } else if *line == else_line {
            out.push(SPLIT_MARKER.to_string());
        } else if *line == endif {
            out.push(REMOTE_MARKER.to_string());
        } else if *line == ifdef {
            out.push(LOCAL_MARKER.to_string());
            out.push(SPLIT_MARKER.to_string());
        } else if *line == endif_not {
            out.push(SPLIT_MARKER.to_string());
            out.push(REMOTE_MARKER.to_string());
        } else {
            out.push(line.clone());
        }
    }
    out
}

/// Keep only the separator-delimited blocks that contain a conflict region.
pub fn conflicted_blocks(lines: &[String]) -> Vec<String> {
    let mut kept = Vec::new();
    let mut chunk: Vec<String> = Vec::new();
    let mut in_region = false;
    let mut has_region = false;

    for line in lines {
        if line == LOCAL_MARKER {
            in_region = true;
            has_region = true;
        } else if line == REMOTE_MARKER {
            in_region = false;
        }
        chunk.push(line.clone());

        if !in_region && line == SEPARATOR {
            if has_region {
                kept.append(&mut chunk);
            }
            chunk.clear();
            has_region = false;
        }
    }
    if has_region {
        kept.append(&mut chunk);
    }
    kept
}

/// Full pipeline: diff, rewrite, and filter down to conflicted blocks
pub fn conflict_document(local: &str, remote: &str) -> String {
    let lines = conflicted_blocks(&rewrite_markers(&ifdef_merge(local, remote)));
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}
