//! Line editing engine
//!
//! Pure functions over a buffer of lines. The module layer reads the file,
//! hands the lines to [`plan_edit`], and writes the result back when the plan
//! reports a change. Nothing here touches the target, so native and raw mode
//! always agree on what the new content is.

use regex::{Captures, Regex};
use std::collections::BTreeSet;

/// How existing lines are matched for replacement, deduplication and removal
#[derive(Debug, Clone)]
pub enum Selector {
    /// Regular expression searched anywhere in the line
    Regex(Regex),
    /// Plain substring
    SearchString(String),
    /// Only lines exactly equal to `line`
    Literal,
}

/// Where a missing line is inserted
#[derive(Debug, Clone)]
pub enum Anchor {
    Before(Regex),
    After(Regex),
    Bof,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Present,
    Absent,
}

/// A validated line edit, independent of how the file is reached
#[derive(Debug, Clone)]
pub struct LineEdit {
    pub selector: Selector,
    /// Desired line; `None` only for pure deduplication
    pub line: Option<String>,
    pub anchor: Anchor,
    pub state: EditState,
    pub firstmatch: bool,
    pub dedupe: bool,
    pub backrefs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    /// Line inserted at this index of the new buffer
    Added(usize),
    /// Original line at this index rewritten
    Replaced(usize),
    /// Desired line already present at this original index
    Kept(usize),
    /// Lines removed for `state=absent`
    Removed(usize),
    /// Nothing to do (e.g. backrefs without a match)
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    pub lines: Vec<String>,
    pub changed: bool,
    pub action: EditAction,
    /// Duplicates removed while deduplicating
    pub deduped: usize,
    /// Lines matched for removal, `state=absent` only
    pub found: Option<usize>,
    pub msg: String,
}

impl LineEdit {
    fn choose(&self, indices: &[usize]) -> Option<usize> {
        if self.firstmatch {
            indices.first().copied()
        } else {
            indices.last().copied()
        }
    }

    fn selector_matches(&self, line: &str) -> bool {
        match &self.selector {
            Selector::Regex(re) => re.is_match(line),
            Selector::SearchString(needle) => line.contains(needle.as_str()),
            Selector::Literal => false,
        }
    }

    fn anchor_matches(&self, line: &str) -> bool {
        match &self.anchor {
            Anchor::Before(re) | Anchor::After(re) => re.is_match(line),
            Anchor::Bof | Anchor::Eof => false,
        }
    }
}

/// Split file content into lines, dropping `\n` and `\r\n` terminators
pub fn split_lines(content: &str) -> Vec<String> {
    content.lines().map(str::to_string).collect()
}

/// Join lines back into file content with a trailing newline
pub fn render_lines(lines: &[String]) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut content = lines.join("\n");
    content.push('\n');
    content
}

/// Compute the new buffer for `edit` applied to `lines`
pub fn plan_edit(lines: &[String], edit: &LineEdit) -> EditPlan {
    match edit.state {
        EditState::Present => plan_present(lines, edit),
        EditState::Absent => plan_absent(lines, edit),
    }
}

fn plan_present(lines: &[String], edit: &LineEdit) -> EditPlan {
    let mut match_idx = Vec::new();
    let mut line_idx = Vec::new();
    let mut anchor_idx = Vec::new();

    for (i, current) in lines.iter().enumerate() {
        if edit.selector_matches(current) {
            match_idx.push(i);
        }
        if edit.line.as_deref() == Some(current.as_str()) {
            line_idx.push(i);
        }
        if edit.anchor_matches(current) {
            anchor_idx.push(i);
        }
    }

    let Some(line) = edit.line.as_deref() else {
        return plan_dedupe_only(lines, edit, &match_idx);
    };

    let mut insert_at = None;
    let mut replace_at = None;
    let mut keep_at = None;

    if line_idx.is_empty() {
        if let Some(m) = edit.choose(&match_idx) {
            replace_at = Some(m);
        } else if edit.backrefs {
            // A backrefs edit only ever rewrites a matching line
        } else if let Some(a) = edit.choose(&anchor_idx) {
            insert_at = Some(match edit.anchor {
                Anchor::After(_) => a + 1,
                _ => a,
            });
        } else if matches!(edit.anchor, Anchor::Bof) {
            insert_at = Some(0);
        } else {
            insert_at = Some(lines.len());
        }
    } else {
        match (&edit.anchor, edit.choose(&anchor_idx)) {
            (Anchor::Before(_), Some(a)) => {
                match line_idx.iter().rev().find(|&&i| i < a) {
                    Some(&i) => keep_at = Some(i),
                    None => insert_at = Some(a),
                }
            }
            (Anchor::After(_), Some(a)) => match line_idx.iter().find(|&&i| i > a) {
                Some(&i) => keep_at = Some(i),
                None => insert_at = Some(a + 1),
            },
            _ => keep_at = edit.choose(&line_idx),
        }
    }

    let replacement = replace_at.map(|r| match (&edit.selector, edit.backrefs) {
        (Selector::Regex(re), true) => re
            .captures(&lines[r])
            .map(|caps| expand_backrefs(&caps, line))
            .unwrap_or_else(|| line.to_string()),
        _ => line.to_string(),
    });

    let survivor = replace_at.or(keep_at);
    let removed: BTreeSet<usize> = if edit.dedupe {
        match_idx
            .iter()
            .chain(line_idx.iter())
            .copied()
            .filter(|&i| Some(i) != survivor)
            .collect()
    } else {
        BTreeSet::new()
    };

    let mut new_lines = Vec::with_capacity(lines.len() + 1);
    for (i, current) in lines.iter().enumerate() {
        if insert_at == Some(i) {
            new_lines.push(line.to_string());
        }
        if removed.contains(&i) {
            continue;
        }
        match (&replacement, replace_at) {
            (Some(new_line), Some(r)) if r == i => new_lines.push(new_line.clone()),
            _ => new_lines.push(current.clone()),
        }
    }
    if insert_at == Some(lines.len()) {
        new_lines.push(line.to_string());
    }

    let action = match (insert_at, replace_at, keep_at) {
        (Some(i), _, _) => EditAction::Added(
            i - removed.iter().filter(|&&r| r < i).count(),
        ),
        (_, Some(r), _) => EditAction::Replaced(r),
        (_, _, Some(k)) => EditAction::Kept(k),
        _ => EditAction::Unchanged,
    };

    let mut msg = match action {
        EditAction::Added(_) => "line added".to_string(),
        EditAction::Replaced(r) if replacement.as_deref() != Some(lines[r].as_str()) => {
            "line replaced".to_string()
        }
        _ => String::new(),
    };
    append_dedupe_msg(&mut msg, removed.len());

    finish(lines, new_lines, action, removed.len(), None, msg)
}

fn plan_dedupe_only(lines: &[String], edit: &LineEdit, match_idx: &[usize]) -> EditPlan {
    let Some(keep) = edit.choose(match_idx) else {
        return finish(lines, lines.to_vec(), EditAction::Unchanged, 0, None, String::new());
    };

    let new_lines: Vec<String> = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i == keep || !match_idx.contains(i))
        .map(|(_, l)| l.clone())
        .collect();
    let deduped = lines.len() - new_lines.len();

    let mut msg = String::new();
    append_dedupe_msg(&mut msg, deduped);
    finish(lines, new_lines, EditAction::Kept(keep), deduped, None, msg)
}

fn plan_absent(lines: &[String], edit: &LineEdit) -> EditPlan {
    let hit = |current: &str| match &edit.selector {
        Selector::Literal => edit.line.as_deref() == Some(current),
        _ => edit.selector_matches(current),
    };

    let new_lines: Vec<String> = lines.iter().filter(|l| !hit(l.as_str())).cloned().collect();
    let found = lines.len() - new_lines.len();
    let msg = if found > 0 {
        format!("{found} line(s) removed")
    } else {
        "no changes made".to_string()
    };

    finish(
        lines,
        new_lines,
        EditAction::Removed(found),
        0,
        Some(found),
        msg,
    )
}

fn append_dedupe_msg(msg: &mut String, deduped: usize) {
    if deduped == 0 {
        return;
    }
    if !msg.is_empty() {
        msg.push(' ');
    }
    msg.push_str(&format!("{deduped} lines deduped"));
}

fn finish(
    original: &[String],
    lines: Vec<String>,
    action: EditAction,
    deduped: usize,
    found: Option<usize>,
    msg: String,
) -> EditPlan {
    EditPlan {
        changed: lines.as_slice() != original,
        lines,
        action,
        deduped,
        found,
        msg,
    }
}

/// Expand a replacement template against regex captures.
///
/// Understands `\1`..`\99`, `\g<1>`, `\g<name>`, `\\`, `\n` and `\t`.
/// Groups that did not participate expand to nothing.
pub fn expand_backrefs(caps: &Captures, template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.peek().copied() {
            Some(d) if d.is_ascii_digit() => {
                let mut number = String::new();
                while let Some(d) = chars.peek().copied() {
                    if !d.is_ascii_digit() || number.len() == 2 {
                        break;
                    }
                    number.push(d);
                    chars.next();
                }
                let group = number.parse::<usize>().ok().and_then(|n| caps.get(n));
                out.push_str(group.map(|m| m.as_str()).unwrap_or_default());
            }
            Some('g') => {
                chars.next();
                let rest = chars.clone().collect::<String>();
                let reference = rest
                    .strip_prefix('<')
                    .and_then(|tail| tail.split_once('>'))
                    .map(|(name, _)| name.to_string());
                match reference {
                    Some(name) => {
                        // skip `<name>`
                        for _ in 0..name.chars().count() + 2 {
                            chars.next();
                        }
                        let group = match name.parse::<usize>() {
                            Ok(n) => caps.get(n),
                            Err(_) => caps.name(&name),
                        };
                        out.push_str(group.map(|m| m.as_str()).unwrap_or_default());
                    }
                    None => out.push_str("\\g"),
                }
            }
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('t') => {
                chars.next();
                out.push('\t');
            }
            _ => out.push('\\'),
        }
    }

    out
}
