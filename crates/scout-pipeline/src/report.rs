//! Plain-text run report and transport-sized chunking.

use std::fmt::Write as _;

use scout_core::RunType;

use crate::trends::TrendResult;
use crate::types::ScoreRecord;

/// Longest message the notification webhook accepts, in characters.
pub const MAX_REPORT_LEN: usize = 2000;
const HOT_LIST_LIMIT: usize = 10;
const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHeader {
    pub timestamp: String,
    pub run_type: RunType,
    pub scanned: usize,
    pub hot_threshold: i32,
}

fn push_entry(out: &mut String, rank: usize, score: &ScoreRecord) {
    let _ = write!(
        out,
        "\n{rank}. @{}  ⭐{}  ({:+})",
        score.display_name, score.total, score.delta
    );
}

fn keyword_line(keywords: &[String]) -> String {
    if keywords.is_empty() {
        "None".to_string()
    } else {
        keywords.join(", ")
    }
}

/// Renders the report. Every section is always present; empty ones show
/// `(None)`. Hot entries already listed under Top are cross-referenced
/// instead of repeated.
#[must_use]
pub fn format_report(
    header: &ReportHeader,
    top: &[ScoreRecord],
    hot: &[ScoreRecord],
    watch: &[ScoreRecord],
    trends: &TrendResult,
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{RULE}\n🔍 SCOUT REPORT | {}\nType: {} | Scanned: {} | Hot Threshold: {}\n{RULE}\n",
        header.timestamp, header.run_type, header.scanned, header.hot_threshold
    );

    out.push_str("\n🏆 TOP 10");
    if top.is_empty() {
        out.push_str("\n(None)");
    }
    for (i, score) in top.iter().enumerate() {
        push_entry(&mut out, i + 1, score);
    }

    out.push_str("\n\n🔥 HOT 10  (85+, rising)");
    if hot.is_empty() {
        out.push_str("\n(None)");
    }
    for (i, score) in hot.iter().take(HOT_LIST_LIMIT).enumerate() {
        if top.iter().any(|t| t.entity_id == score.entity_id) {
            let _ = write!(out, "\n{}. @{}  ↑ see Top", i + 1, score.display_name);
        } else {
            push_entry(&mut out, i + 1, score);
        }
    }

    out.push_str("\n\n👀 WATCHLIST");
    if watch.is_empty() {
        out.push_str("\n(None)");
    }
    for (i, score) in watch.iter().enumerate() {
        push_entry(&mut out, i + 1, score);
    }

    let _ = write!(
        out,
        "\n\n📈 TREND KEYWORDS\n7d burst : {}\n30d growth: {}\n{RULE}",
        keyword_line(&trends.short_horizon),
        keyword_line(&trends.long_horizon)
    );

    out
}

/// One piece of a split report, with the separator that preceded it in the
/// original text (empty for the first chunk and for mid-line cuts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportChunk {
    pub separator: &'static str,
    pub text: String,
}

struct Packer {
    max_len: usize,
    chunks: Vec<ReportChunk>,
    current: Option<(ReportChunk, usize)>,
}

impl Packer {
    fn push(&mut self, separator: &'static str, piece: &str) {
        let piece_len = piece.chars().count();
        if let Some((chunk, len)) = self.current.as_mut() {
            let joined = *len + separator.chars().count() + piece_len;
            if joined <= self.max_len {
                chunk.text.push_str(separator);
                chunk.text.push_str(piece);
                *len = joined;
                return;
            }
        }
        if let Some((done, _)) = self.current.take() {
            self.chunks.push(done);
        }
        self.current = Some((
            ReportChunk {
                separator,
                text: piece.to_string(),
            },
            piece_len,
        ));
    }

    fn finish(mut self) -> Vec<ReportChunk> {
        if let Some((done, _)) = self.current.take() {
            self.chunks.push(done);
        }
        self.chunks
    }
}

/// Cuts a line into pieces of at most `max_len` characters.
fn hard_split(line: &str, max_len: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in line.char_indices() {
        if count == max_len {
            pieces.push(&line[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&line[start..]);
    pieces
}

/// Splits `text` into chunks of at most `max_len` characters.
///
/// Sections (separated by blank lines) are packed greedily. A section longer
/// than `max_len` is packed line by line, and a single line longer than
/// `max_len` is cut at character boundaries. Joining each chunk's
/// `separator` and `text` in order reproduces `text`.
#[must_use]
pub fn split_report(text: &str, max_len: usize) -> Vec<ReportChunk> {
    let max_len = max_len.max(1);
    if text.chars().count() <= max_len {
        return vec![ReportChunk {
            separator: "",
            text: text.to_string(),
        }];
    }

    let mut packer = Packer {
        max_len,
        chunks: Vec::new(),
        current: None,
    };

    for (i, section) in text.split("\n\n").enumerate() {
        let section_sep = if i == 0 { "" } else { "\n\n" };
        if section.chars().count() <= max_len {
            packer.push(section_sep, section);
            continue;
        }
        for (j, line) in section.split('\n').enumerate() {
            let line_sep = if j == 0 { section_sep } else { "\n" };
            if line.chars().count() <= max_len {
                packer.push(line_sep, line);
                continue;
            }
            for (k, piece) in hard_split(line, max_len).into_iter().enumerate() {
                packer.push(if k == 0 { line_sep } else { "" }, piece);
            }
        }
    }

    packer.finish()
}

#[cfg(test)]
#[path = "report_test.rs"]
mod tests;
