//! Candidate filtering, ranking, and match highlighting.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use regex::Regex;

/// How a piece of a rendered row should be styled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PieceKind {
    /// Ordinary candidate text.
    Plain,
    /// Characters matched by the query.
    Match,
    /// Row decoration that is not part of the candidate, such as a line number.
    Annotation,
}

/// A styled run of text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Piece {
    pub text: String,
    pub kind: PieceKind,
}

impl Piece {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: PieceKind::Plain,
        }
    }

    pub fn matched(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: PieceKind::Match,
        }
    }

    pub fn annotation(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: PieceKind::Annotation,
        }
    }
}

/// A candidate that passed the filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    /// Position of the candidate in the input list.
    pub index: usize,
    /// Offset of the first highlighted character: a byte offset for exact
    /// matches, a character offset for fuzzy ones.
    pub offset: usize,
    pub pieces: Vec<Piece>,
}

impl Match {
    /// The row text with annotations stripped.
    pub fn text(&self) -> String {
        self.pieces
            .iter()
            .filter(|piece| piece.kind != PieceKind::Annotation)
            .map(|piece| piece.text.as_str())
            .collect()
    }
}

/// Case-sensitive substring filter.
///
/// With `annotate`, every row is prefixed with its 1-based line number.
pub fn exact_filter<S: AsRef<str>>(query: &str, candidates: &[S], annotate: bool) -> Vec<Match> {
    let width = annotation_width(candidates.len());
    candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            let text = candidate.as_ref();
            let mut pieces = Vec::with_capacity(4);
            if annotate {
                pieces.push(Piece::annotation(format!("{:>width$}: ", index + 1)));
            }
            if query.is_empty() {
                pieces.push(Piece::plain(text));
                return Some(Match {
                    index,
                    offset: 0,
                    pieces,
                });
            }
            let start = text.find(query)?;
            let end = start + query.len();
            pieces.push(Piece::plain(&text[..start]));
            pieces.push(Piece::matched(&text[start..end]));
            pieces.push(Piece::plain(&text[end..]));
            Some(Match {
                index,
                offset: start,
                pieces,
            })
        })
        .collect()
}

/// Case-insensitive subsequence filter, ordered by where the match begins.
pub fn fuzzy_filter<S: AsRef<str>>(query: &str, candidates: &[S]) -> Vec<Match> {
    if query.is_empty() {
        return candidates
            .iter()
            .enumerate()
            .map(|(index, candidate)| Match {
                index,
                offset: 0,
                pieces: vec![Piece::plain(candidate.as_ref())],
            })
            .collect();
    }

    let matcher = SkimMatcherV2::default().ignore_case();
    let mut matches: Vec<Match> = candidates
        .iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            let text = candidate.as_ref();
            let (_score, indices) = matcher.fuzzy_indices(text, query)?;
            Some(Match {
                index,
                offset: indices.first().copied().unwrap_or(0),
                pieces: runs(text, &indices),
            })
        })
        .collect();
    matches.sort_by_key(|found| found.offset);
    matches
}

/// Highlights the first match of a regular expression in search-result lines.
///
/// Patterns use `regex` syntax while `ag` takes PCRE. A query `ag` accepts
/// but `regex` rejects, such as one with lookarounds, still returns hits; they
/// are shown without a highlight.
#[derive(Debug, Clone)]
pub struct Highlighter {
    regex: Option<Regex>,
}

impl Highlighter {
    /// Compile `query`; an invalid pattern highlights nothing.
    pub fn new(query: &str) -> Self {
        Self {
            regex: Regex::new(query).ok(),
        }
    }

    /// `annotation` followed by `line` split around the first match.
    pub fn pieces(&self, annotation: &str, line: &str) -> Vec<Piece> {
        let mut pieces = vec![Piece::annotation(annotation)];
        match self.regex.as_ref().and_then(|regex| regex.find(line)) {
            Some(found) if !found.as_str().is_empty() => {
                pieces.push(Piece::plain(&line[..found.start()]));
                pieces.push(Piece::matched(found.as_str()));
                pieces.push(Piece::plain(&line[found.end()..]));
            }
            _ => pieces.push(Piece::plain(line)),
        }
        pieces
    }
}

fn annotation_width(count: usize) -> usize {
    (count + 1).to_string().len().max(4)
}

fn runs(text: &str, indices: &[usize]) -> Vec<Piece> {
    let mut pieces: Vec<Piece> = Vec::new();
    let mut wanted = indices.iter().peekable();
    for (position, ch) in text.chars().enumerate() {
        let hit = wanted.next_if(|&&index| index == position).is_some();
        let kind = if hit { PieceKind::Match } else { PieceKind::Plain };
        match pieces.last_mut() {
            Some(last) if last.kind == kind => last.text.push(ch),
            _ => pieces.push(Piece {
                text: ch.to_string(),
                kind,
            }),
        }
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(matches: &[Match]) -> Vec<String> {
        matches.iter().map(Match::text).collect()
    }

    #[test]
    fn exact_filter_keeps_order_and_splits_pieces() {
        let candidates = ["tab1.txt", "README", "tabs/x"];
        let matches = exact_filter("tab", &candidates, false);
        assert_eq!(texts(&matches), vec!["tab1.txt", "tabs/x"]);
        assert_eq!(
            matches[0].pieces,
            vec![Piece::plain(""), Piece::matched("tab"), Piece::plain("1.txt")]
        );
        assert_eq!(
            matches[1].pieces,
            vec![Piece::plain(""), Piece::matched("tab"), Piece::plain("s/x")]
        );
    }

    #[test]
    fn exact_filter_is_case_sensitive() {
        let matches = exact_filter("Tab", &["tab", "a Tab"], false);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].index, 1);
        assert_eq!(matches[0].offset, 2);
    }

    #[test]
    fn exact_filter_annotates_line_numbers() {
        let lines = ["fn main() {", "    run();", "}"];
        let matches = exact_filter("run", &lines, true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].index, 1);
        assert_eq!(matches[0].pieces[0], Piece::annotation("   2: "));
        assert_eq!(matches[0].offset, 4);
    }

    #[test]
    fn empty_query_passes_everything_unhighlighted() {
        let candidates = ["b", "a"];
        for matches in [exact_filter("", &candidates, false), fuzzy_filter("", &candidates)] {
            assert_eq!(texts(&matches), vec!["b", "a"]);
            assert!(matches
                .iter()
                .all(|found| found.pieces.iter().all(|piece| piece.kind == PieceKind::Plain)));
        }
    }

    #[test]
    fn fuzzy_filter_requires_a_subsequence() {
        let matches = fuzzy_filter("ab", &["cab", "a_b", "ba"]);
        assert_eq!(texts(&matches), vec!["a_b", "cab"]);
    }

    #[test]
    fn fuzzy_filter_ignores_case() {
        let matches = fuzzy_filter("rd", &["README.md"]);
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn fuzzy_filter_orders_by_first_match_offset_not_tightness() {
        let matches = fuzzy_filter("ab", &["xxab", "a____b"]);
        assert_eq!(texts(&matches), vec!["a____b", "xxab"]);
        assert_eq!(matches[0].offset, 0);
        assert_eq!(matches[1].offset, 2);
    }

    #[test]
    fn fuzzy_pieces_group_matched_runs() {
        let matches = fuzzy_filter("src", &["src/main.rs"]);
        assert_eq!(matches[0].pieces[0], Piece::matched("src"));
        assert_eq!(matches[0].pieces[1], Piece::plain("/main.rs"));
    }

    #[test]
    fn highlighter_marks_first_regex_match() {
        let highlighter = Highlighter::new("fo+");
        let pieces = highlighter.pieces("a.rs:3 ", "let foo = foo;");
        assert_eq!(
            pieces,
            vec![
                Piece::annotation("a.rs:3 "),
                Piece::plain("let "),
                Piece::matched("foo"),
                Piece::plain(" = foo;"),
            ]
        );
    }

    #[test]
    fn highlighter_tolerates_invalid_patterns() {
        let pieces = Highlighter::new("(").pieces("a.rs:1 ", "f(x)");
        assert_eq!(pieces, vec![Piece::annotation("a.rs:1 "), Piece::plain("f(x)")]);
    }

    #[test]
    fn pcre_only_patterns_show_hits_unhighlighted() {
        let pieces = Highlighter::new("foo(?=bar)").pieces("a.rs:2 ", "foobar");
        assert_eq!(pieces, vec![Piece::annotation("a.rs:2 "), Piece::plain("foobar")]);
    }
}
