//! Character-level diff with semantic cleanup.
//!
//! Myers' O(ND) bisection finds a minimal edit script; the cleanup passes then
//! trade minimality for readability by absorbing short coincidental equalities
//! into the surrounding edits and sliding edits onto word boundaries.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffOp {
    Equal,
    Insert,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edit {
    pub op: DiffOp,
    pub text: String,
}

impl Edit {
    pub fn new(op: DiffOp, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }
}

/// Diff `original` against `candidate`. Concatenating the `Equal` and
/// `Delete` texts gives back `original`; `Equal` and `Insert` give `candidate`.
pub fn diff_text(original: &str, candidate: &str) -> Vec<Edit> {
    let old: Vec<char> = original.chars().collect();
    let new: Vec<char> = candidate.chars().collect();

    let mut edits = diff_main(&old, &new);
    cleanup_semantic(&mut edits);
    edits
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

fn diff_main(old: &[char], new: &[char]) -> Vec<Edit> {
    if old == new {
        return match old.is_empty() {
            true => Vec::new(),
            false => vec![Edit::new(DiffOp::Equal, collect(old))],
        };
    }

    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let (old_rest, new_rest) = (&old[prefix..], &new[prefix..]);
    let suffix = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old_rest[..old_rest.len() - suffix];
    let new_mid = &new_rest[..new_rest.len() - suffix];

    let mut edits = Vec::new();
    if prefix > 0 {
        edits.push(Edit::new(DiffOp::Equal, collect(&old[..prefix])));
    }
    edits.extend(diff_compute(old_mid, new_mid));
    if suffix > 0 {
        edits.push(Edit::new(
            DiffOp::Equal,
            collect(&old_rest[old_rest.len() - suffix..]),
        ));
    }

    cleanup_merge(&mut edits);
    edits
}

fn diff_compute(old: &[char], new: &[char]) -> Vec<Edit> {
    if old.is_empty() {
        return vec![Edit::new(DiffOp::Insert, collect(new))];
    }
    if new.is_empty() {
        return vec![Edit::new(DiffOp::Delete, collect(old))];
    }

    let (long, short, op) = match old.len() > new.len() {
        true => (old, new, DiffOp::Delete),
        false => (new, old, DiffOp::Insert),
    };

    if let Some(i) = find_slice(long, short) {
        // shorter text sits entirely inside the longer one
        let mut edits = Vec::new();
        if i > 0 {
            edits.push(Edit::new(op, collect(&long[..i])));
        }
        edits.push(Edit::new(DiffOp::Equal, collect(short)));
        if i + short.len() < long.len() {
            edits.push(Edit::new(op, collect(&long[i + short.len()..])));
        }
        return edits;
    }

    if short.len() == 1 {
        return vec![
            Edit::new(DiffOp::Delete, collect(old)),
            Edit::new(DiffOp::Insert, collect(new)),
        ];
    }

    diff_bisect(old, new)
}

fn find_slice(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Finds the middle snake of the edit graph and recurses on both halves.
fn diff_bisect(old: &[char], new: &[char]) -> Vec<Edit> {
    let n1 = old.len() as isize;
    let n2 = new.len() as isize;
    let max_d = (n1 + n2 + 1) / 2;
    let v_offset = max_d;
    let v_length = (2 * max_d) as usize;
    let mut v1 = vec![-1isize; v_length];
    let mut v2 = vec![-1isize; v_length];
    v1[(v_offset + 1) as usize] = 0;
    v2[(v_offset + 1) as usize] = 0;

    let delta = n1 - n2;
    // odd delta: the forward path detects the overlap, even: the reverse one
    let front = delta % 2 != 0;
    let (mut k1start, mut k1end, mut k2start, mut k2end) = (0isize, 0isize, 0isize, 0isize);

    for d in 0..max_d {
        let mut k1 = -d + k1start;
        while k1 <= d - k1end {
            let k1_offset = (v_offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                v1[k1_offset + 1]
            } else {
                v1[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n1 && y1 < n2 && old[x1 as usize] == new[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset] = x1;

            if x1 > n1 {
                k1end += 2;
            } else if y1 > n2 {
                k1start += 2;
            } else if front {
                let k2_offset = v_offset + delta - k1;
                if k2_offset >= 0
                    && (k2_offset as usize) < v_length
                    && v2[k2_offset as usize] != -1
                {
                    let x2 = n1 - v2[k2_offset as usize];
                    if x1 >= x2 {
                        return bisect_split(old, new, x1 as usize, y1 as usize);
                    }
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2start;
        while k2 <= d - k2end {
            let k2_offset = (v_offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                v2[k2_offset + 1]
            } else {
                v2[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n1
                && y2 < n2
                && old[(n1 - x2 - 1) as usize] == new[(n2 - y2 - 1) as usize]
            {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset] = x2;

            if x2 > n1 {
                k2end += 2;
            } else if y2 > n2 {
                k2start += 2;
            } else if !front {
                let k1_offset = v_offset + delta - k2;
                if k1_offset >= 0
                    && (k1_offset as usize) < v_length
                    && v1[k1_offset as usize] != -1
                {
                    let x1 = v1[k1_offset as usize];
                    let y1 = v_offset + x1 - k1_offset;
                    if x1 >= n1 - x2 {
                        return bisect_split(old, new, x1 as usize, y1 as usize);
                    }
                }
            }
            k2 += 2;
        }
    }

    // no commonality at all
    vec![
        Edit::new(DiffOp::Delete, collect(old)),
        Edit::new(DiffOp::Insert, collect(new)),
    ]
}

fn bisect_split(old: &[char], new: &[char], x: usize, y: usize) -> Vec<Edit> {
    let mut edits = diff_main(&old[..x], &new[..y]);
    edits.extend(diff_main(&old[x..], &new[y..]));
    edits
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte length of the common prefix of `a` and `b`.
fn common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

/// Byte length of the common suffix of `a` and `b`.
fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

/// Merges adjacent edits of the same kind, factors shared prefixes and
/// suffixes of delete/insert pairs out into equalities, and slides single
/// edits sideways to swallow a neighbouring equality when possible.
fn cleanup_merge(edits: &mut Vec<Edit>) {
    edits.push(Edit::new(DiffOp::Equal, ""));
    let mut pointer = 0usize;
    let mut count_delete = 0usize;
    let mut count_insert = 0usize;
    let mut text_delete = String::new();
    let mut text_insert = String::new();

    while pointer < edits.len() {
        match edits[pointer].op {
            DiffOp::Insert => {
                count_insert += 1;
                text_insert.push_str(&edits[pointer].text);
                pointer += 1;
            }
            DiffOp::Delete => {
                count_delete += 1;
                text_delete.push_str(&edits[pointer].text);
                pointer += 1;
            }
            DiffOp::Equal => {
                if count_delete + count_insert > 1 {
                    if count_delete != 0 && count_insert != 0 {
                        let common = common_prefix(&text_insert, &text_delete);
                        if common != 0 {
                            let shared = text_insert[..common].to_string();
                            let before = pointer - count_delete - count_insert;
                            if before > 0 && edits[before - 1].op == DiffOp::Equal {
                                edits[before - 1].text.push_str(&shared);
                            } else {
                                edits.insert(0, Edit::new(DiffOp::Equal, shared));
                                pointer += 1;
                            }
                            text_insert.drain(..common);
                            text_delete.drain(..common);
                        }

                        let common = common_suffix(&text_insert, &text_delete);
                        if common != 0 {
                            let split_insert = text_insert.len() - common;
                            let shared = text_insert[split_insert..].to_string();
                            edits[pointer].text.insert_str(0, &shared);
                            text_insert.truncate(split_insert);
                            let split_delete = text_delete.len() - common;
                            text_delete.truncate(split_delete);
                        }
                    }

                    pointer -= count_delete + count_insert;
                    edits.drain(pointer..pointer + count_delete + count_insert);
                    if !text_delete.is_empty() {
                        edits.insert(pointer, Edit::new(DiffOp::Delete, text_delete.clone()));
                        pointer += 1;
                    }
                    if !text_insert.is_empty() {
                        edits.insert(pointer, Edit::new(DiffOp::Insert, text_insert.clone()));
                        pointer += 1;
                    }
                    pointer += 1;
                } else if pointer != 0 && edits[pointer - 1].op == DiffOp::Equal {
                    let text = edits.remove(pointer).text;
                    edits[pointer - 1].text.push_str(&text);
                } else {
                    pointer += 1;
                }
                count_insert = 0;
                count_delete = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
    }
    if edits.last().is_some_and(|e| e.text.is_empty()) {
        edits.pop();
    }
    edits.retain(|e| !e.text.is_empty());

    // second pass: single edits surrounded by equalities
    let mut changes = false;
    let mut pointer = 1usize;
    while pointer + 1 < edits.len() {
        if edits[pointer - 1].op == DiffOp::Equal && edits[pointer + 1].op == DiffOp::Equal {
            let prev = edits[pointer - 1].text.clone();
            let next = edits[pointer + 1].text.clone();
            let current = edits[pointer].text.clone();

            if current.ends_with(&prev) {
                // A<ba>B  ->  <ab>aB
                let kept = &current[..current.len() - prev.len()];
                edits[pointer].text = format!("{prev}{kept}");
                edits[pointer + 1].text = format!("{prev}{next}");
                edits.remove(pointer - 1);
                changes = true;
            } else if current.starts_with(&next) {
                // A<ab>B  ->  Ab<ba>
                edits[pointer - 1].text.push_str(&next);
                edits[pointer].text = format!("{}{next}", &current[next.len()..]);
                edits.remove(pointer + 1);
                changes = true;
            }
        }
        pointer += 1;
    }
    if changes {
        cleanup_merge(edits);
    }
}

/// Removes equalities that are shorter than the edits on both sides of them,
/// then aligns the remaining single edits to word boundaries.
fn cleanup_semantic(edits: &mut Vec<Edit>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<String> = None;
    let mut pointer: isize = 0;
    let (mut ins_before, mut del_before) = (0usize, 0usize);
    let (mut ins_after, mut del_after) = (0usize, 0usize);

    while (pointer as usize) < edits.len() {
        let idx = pointer as usize;
        if edits[idx].op == DiffOp::Equal {
            equalities.push(idx);
            ins_before = ins_after;
            del_before = del_after;
            ins_after = 0;
            del_after = 0;
            last_equality = Some(edits[idx].text.clone());
        } else {
            let len = char_len(&edits[idx].text);
            match edits[idx].op {
                DiffOp::Insert => ins_after += len,
                _ => del_after += len,
            }

            let absorb = last_equality.as_ref().is_some_and(|eq| {
                let eq_len = char_len(eq);
                eq_len <= ins_before.max(del_before) && eq_len <= ins_after.max(del_after)
            });
            if absorb
                && let (Some(eq), Some(at)) = (last_equality.take(), equalities.last().copied())
            {
                edits.insert(at, Edit::new(DiffOp::Delete, eq));
                edits[at + 1].op = DiffOp::Insert;
                // the absorbed equality and the one before it need a re-check
                equalities.pop();
                equalities.pop();
                pointer = equalities.last().map(|&i| i as isize).unwrap_or(-1);
                ins_before = 0;
                del_before = 0;
                ins_after = 0;
                del_after = 0;
                changes = true;
            }
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge(edits);
    }
    cleanup_semantic_lossless(edits);
}

/// Slides single edits between two equalities to the position where the
/// edit boundaries score best (blank line > line break > sentence end >
/// whitespace > punctuation > mid-word).
fn cleanup_semantic_lossless(edits: &mut Vec<Edit>) {
    let mut pointer = 1usize;
    while pointer + 1 < edits.len() {
        if edits[pointer - 1].op == DiffOp::Equal && edits[pointer + 1].op == DiffOp::Equal {
            let mut equality1: Vec<char> = edits[pointer - 1].text.chars().collect();
            let mut edit: Vec<char> = edits[pointer].text.chars().collect();
            let mut equality2: Vec<char> = edits[pointer + 1].text.chars().collect();

            // shift the edit as far left as possible
            let common = equality1
                .iter()
                .rev()
                .zip(edit.iter().rev())
                .take_while(|(a, b)| a == b)
                .count();
            if common > 0 {
                let shared: Vec<char> = edit[edit.len() - common..].to_vec();
                equality1.truncate(equality1.len() - common);
                let mut shifted = shared.clone();
                shifted.extend_from_slice(&edit[..edit.len() - common]);
                edit = shifted;
                let mut tail = shared;
                tail.extend_from_slice(&equality2);
                equality2 = tail;
            }

            // then step right one character at a time, keeping the best fit
            let mut best = (equality1.clone(), edit.clone(), equality2.clone());
            let mut best_score = boundary_score(&equality1, &edit) + boundary_score(&edit, &equality2);
            while !edit.is_empty() && !equality2.is_empty() && edit[0] == equality2[0] {
                let c = edit.remove(0);
                equality1.push(c);
                edit.push(c);
                equality2.remove(0);
                let score = boundary_score(&equality1, &edit) + boundary_score(&edit, &equality2);
                // >= prefers trailing whitespace on the edit
                if score >= best_score {
                    best_score = score;
                    best = (equality1.clone(), edit.clone(), equality2.clone());
                }
            }

            let (best1, best_edit, best2) = best;
            if collect(&best1) != edits[pointer - 1].text {
                if best1.is_empty() {
                    edits.remove(pointer - 1);
                    pointer -= 1;
                } else {
                    edits[pointer - 1].text = collect(&best1);
                }
                edits[pointer].text = collect(&best_edit);
                if best2.is_empty() {
                    edits.remove(pointer + 1);
                    pointer = pointer.saturating_sub(1);
                } else {
                    edits[pointer + 1].text = collect(&best2);
                }
            }
        }
        pointer += 1;
    }
}

/// How good a split between `one` and `two` looks, 0 (mid-word) to 6 (edge).
fn boundary_score(one: &[char], two: &[char]) -> u8 {
    let (Some(&c1), Some(&c2)) = (one.last(), two.first()) else {
        return 6;
    };

    let non_alnum1 = !c1.is_alphanumeric();
    let non_alnum2 = !c2.is_alphanumeric();
    let whitespace1 = non_alnum1 && c1.is_whitespace();
    let whitespace2 = non_alnum2 && c2.is_whitespace();
    let line_break1 = whitespace1 && (c1 == '\n' || c1 == '\r');
    let line_break2 = whitespace2 && (c2 == '\n' || c2 == '\r');
    let blank_line1 = line_break1 && ends_with_blank_line(one);
    let blank_line2 = line_break2 && starts_with_blank_line(two);

    if blank_line1 || blank_line2 {
        5
    } else if line_break1 || line_break2 {
        4
    } else if non_alnum1 && !whitespace1 && whitespace2 {
        3
    } else if whitespace1 || whitespace2 {
        2
    } else if non_alnum1 || non_alnum2 {
        1
    } else {
        0
    }
}

fn ends_with_blank_line(chars: &[char]) -> bool {
    chars.ends_with(&['\n', '\n']) || chars.ends_with(&['\n', '\r', '\n'])
}

fn starts_with_blank_line(chars: &[char]) -> bool {
    let rest = match chars.first() {
        Some('\r') => &chars[1..],
        _ => chars,
    };
    match rest.first() {
        Some('\n') => {
            let rest = &rest[1..];
            let rest = match rest.first() {
                Some('\r') => &rest[1..],
                _ => rest,
            };
            rest.first() == Some(&'\n')
        }
        _ => false,
    }
}
