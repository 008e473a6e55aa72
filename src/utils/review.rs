use std::io::{self, BufRead, Write};

use colored::Colorize;
use log::info;

use crate::diff::engine::DiffOp;
use crate::diff::review::{ChangeGroup, ChangeReview};
use crate::docx::runs::SOFT_BREAK;

const PREVIEW_CHARS: usize = 160;

/// The diff inline: removed text in red, added text in green, each change
/// tagged with its group number.
pub fn print_inline(review: &ChangeReview, out: &mut impl Write) -> io::Result<()> {
    let mut last_group = None;
    for segment in review.segments() {
        if segment.group_id.is_some() && segment.group_id != last_group {
            if let Some(id) = segment.group_id {
                write!(out, "{}", format!("[#{}]", id + 1).cyan())?;
            }
        }
        last_group = segment.group_id;

        match segment.op {
            DiffOp::Equal => write!(out, "{}", segment.text)?,
            DiffOp::Delete => write!(out, "{}", segment.text.red().strikethrough())?,
            DiffOp::Insert => write!(out, "{}", segment.text.green().underline())?,
        }
    }
    writeln!(out)
}

pub fn print_groups(review: &ChangeReview, out: &mut impl Write) -> io::Result<()> {
    for group in review.groups() {
        print_group(group, out)?;
    }
    Ok(())
}

fn print_group(group: &ChangeGroup, out: &mut impl Write) -> io::Result<()> {
    let mark = match group.accepted {
        true => "✓".green(),
        false => "✗".red(),
    };
    writeln!(out, "{} {}", mark, format!("#{}", group.id + 1).bold())?;
    if !group.deleted_text.is_empty() {
        writeln!(out, "   {} {}", "-".red(), preview(&group.deleted_text).red())?;
    }
    if !group.inserted_text.is_empty() {
        writeln!(out, "   {} {}", "+".green(), preview(&group.inserted_text).green())?;
    }
    Ok(())
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', "⏎").replace(SOFT_BREAK, "↵");
    match flat.chars().count() > PREVIEW_CHARS {
        true => format!("{}…", flat.chars().take(PREVIEW_CHARS).collect::<String>()),
        false => flat,
    }
}

/// Lets the user toggle change groups until they are done. Input lines are
/// group numbers (comma-separated) to toggle, `a` to accept all, `r` to
/// reject all, and an empty line or `d` to finish.
pub fn review_changes_interactive(
    review: &mut ChangeReview,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> io::Result<()> {
    if review.groups().is_empty() {
        writeln!(out, "{}", "No changes to review.".yellow())?;
        return Ok(());
    }

    writeln!(out, "\n{}", "=== Change Review ===".cyan().bold())?;
    writeln!(out, "{}\n", "Every change starts accepted.".cyan())?;

    loop {
        print_groups(review, out)?;
        write!(
            out,
            "\n{}",
            "Toggle changes by number (e.g. '1,3'), 'a' accept all, 'r' reject all, Enter when done: ".cyan()
        )?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        match line.trim().to_lowercase().as_str() {
            "" | "d" | "done" => break,
            "a" | "all" => review.set_all(true),
            "r" | "none" => review.set_all(false),
            numbers => {
                let parsed: Result<Vec<usize>, _> = numbers.split(',').map(|n| n.trim().parse::<usize>()).collect();
                match parsed {
                    Ok(ids) if ids.iter().all(|&n| n >= 1 && n <= review.groups().len()) => {
                        for n in ids {
                            review.toggle(n - 1).map_err(io::Error::other)?;
                        }
                    }
                    Ok(_) => writeln!(
                        out,
                        "{}",
                        format!("Change numbers go from 1 to {}.", review.groups().len()).red()
                    )?,
                    Err(_) => writeln!(
                        out,
                        "{}",
                        format!("Invalid input: '{numbers}'. Please enter numbers separated by commas.").red()
                    )?,
                }
            }
        }
        writeln!(out)?;
    }

    info!(
        "accepted {} of {} changes",
        review.accepted_count(),
        review.groups().len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review() -> ChangeReview {
        ChangeReview::compute(
            "Built web apps using Java.",
            "Built scalable web apps using Java and Python.",
        )
    }

    fn run(review: &mut ChangeReview, script: &str) -> String {
        colored::control::set_override(false);
        let mut out = Vec::new();
        review_changes_interactive(review, &mut script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_toggle_by_number() {
        let mut review = review();
        run(&mut review, "2\n\n");
        assert_eq!(review.build_final_text(), "Built scalable web apps using Java.");
    }

    #[test]
    fn test_reject_all_then_accept_one() {
        let mut review = review();
        run(&mut review, "r\n1\nd\n");
        assert_eq!(review.build_final_text(), "Built scalable web apps using Java.");
    }

    #[test]
    fn test_bad_input_is_reported_and_ignored() {
        let mut review = review();
        let output = run(&mut review, "x\n9\n");
        assert!(output.contains("Invalid input: 'x'"));
        assert!(output.contains("Change numbers go from 1 to 2."));
        assert_eq!(review.accepted_count(), 2);
    }

    #[test]
    fn test_repeated_numbers_toggle_twice() {
        let mut review = review();
        run(&mut review, "1,1,2\n");
        assert_eq!(review.build_final_text(), "Built scalable web apps using Java.");
    }

    #[test]
    fn test_inline_marks_groups() {
        colored::control::set_override(false);
        let mut out = Vec::new();
        print_inline(&review(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Built"));
        let first = text.find("[#1]").unwrap();
        let second = text.find("[#2]").unwrap();
        assert!(first < text.find("scalable").unwrap());
        assert!(second < text.find("Python").unwrap());
        assert!(text.ends_with(".\n"));
    }
}
