use std::sync::LazyLock;

use regex::Regex;

/// One question/answer pair extracted from an uploaded training file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Question markers in both languages. A question segment runs from its
/// marker to the next question marker of either language, or end of text.
/// "Question:" must precede "Q:" in the alternation so the longer marker
/// wins at the same position.
static QUESTION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)س:|Question:|Q:").expect("valid marker regex"));

static LEADING_Q_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[سQ]:\s*").expect("valid marker regex"));
static LEADING_A_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[جA]:\s*").expect("valid marker regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerLang {
    Arabic,
    English,
}

/// Extract question/answer pairs from raw training text.
///
/// Strategies, in priority order:
/// 1. Arabic markers (`س:` ... `ج:` ...)
/// 2. English markers (`Q:`/`Question:` ... `A:`/`Answer:` ...), scanned
///    over the same text; results are concatenated after the Arabic ones.
/// 3. Line pairing, only when neither marker strategy produced a pair:
///    consecutive non-empty lines become (question, answer) pairs.
pub fn extract(raw_text: &str) -> Vec<QaPair> {
    let mut pairs = marker_pairs(raw_text, MarkerLang::Arabic);
    pairs.extend(marker_pairs(raw_text, MarkerLang::English));

    if pairs.is_empty() {
        pairs = line_pairs(raw_text);
    }

    pairs
}

fn marker_pairs(text: &str, lang: MarkerLang) -> Vec<QaPair> {
    let markers: Vec<_> = QUESTION_MARKER.find_iter(text).collect();

    let mut pairs = Vec::new();
    for (i, marker) in markers.iter().enumerate() {
        let marker_lang = if marker.as_str().starts_with('س') {
            MarkerLang::Arabic
        } else {
            MarkerLang::English
        };
        if marker_lang != lang {
            continue;
        }

        let segment_end = markers
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let segment = &text[marker.end()..segment_end];

        let split = match lang {
            MarkerLang::Arabic => segment.split_once("ج:"),
            // Prefer the short form when both answer markers appear.
            MarkerLang::English => {
                if segment.contains("A:") {
                    segment.split_once("A:")
                } else {
                    segment.split_once("Answer:")
                }
            }
        };

        if let Some((question, answer)) = split {
            let question = clean_segment(question);
            let answer = clean_segment(answer);
            if !question.is_empty() && !answer.is_empty() {
                pairs.push(QaPair { question, answer });
            }
        }
    }
    pairs
}

/// Trim a segment and drop a trailing `---` separator line left over from
/// the pair-separator convention of the import format.
fn clean_segment(text: &str) -> String {
    let trimmed = text.trim();
    if let Some((head, tail)) = trimmed.rsplit_once('\n') {
        let tail = tail.trim();
        if tail.len() >= 3 && tail.chars().all(|c| c == '-') {
            return head.trim_end().to_string();
        }
    }
    trimmed.to_string()
}

/// Fallback: pair consecutive non-empty lines, stripping leading markers
/// when present. Pairs are emitted even when a side trims to empty after
/// marker stripping, matching the historical import behavior.
fn line_pairs(text: &str) -> Vec<QaPair> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .chunks_exact(2)
        .map(|pair| QaPair {
            question: LEADING_Q_MARKER.replace(pair[0], "").into_owned(),
            answer: LEADING_A_MARKER.replace(pair[1], "").into_owned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_arabic_marker_pairs_in_order() {
        let text = "س: ما هو اسم المؤسسة؟\nج: مؤسسة الحبيب\n---\nس: أين تقع؟\nج: في صنعاء\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "ما هو اسم المؤسسة؟");
        assert_eq!(pairs[0].answer, "مؤسسة الحبيب");
        assert_eq!(pairs[1].question, "أين تقع؟");
        assert_eq!(pairs[1].answer, "في صنعاء");
    }

    #[test]
    fn extracts_english_marker_pairs() {
        let text = "Q: What are your hours?\nA: 9am to 5pm\nQuestion: Where are you?\nAnswer: Sana'a\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "What are your hours?");
        assert_eq!(pairs[0].answer, "9am to 5pm");
        assert_eq!(pairs[1].question, "Where are you?");
        assert_eq!(pairs[1].answer, "Sana'a");
    }

    #[test]
    fn arabic_pairs_come_before_english_pairs() {
        let text = "Q: first english?\nA: yes\nس: سؤال عربي؟\nج: نعم\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "سؤال عربي؟");
        assert_eq!(pairs[1].question, "first english?");
    }

    #[test]
    fn segment_without_answer_marker_is_discarded() {
        let text = "س: سؤال بلا جواب\nس: سؤال كامل؟\nج: الجواب\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "سؤال كامل؟");
    }

    #[test]
    fn lowercase_english_markers_are_recognized() {
        let text = "q: lowercase works?\nA: it does\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "lowercase works?");
    }

    #[test]
    fn short_answer_marker_wins_over_long_one() {
        let text = "Q: which marker?\nA: this one, not Answer: that one\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].answer, "this one, not Answer: that one");
    }

    #[test]
    fn fallback_pairs_consecutive_lines() {
        let text = "ما هي ساعات العمل؟\nمن التاسعة حتى الخامسة\n\nهل يوجد توصيل؟\nنعم داخل المدينة\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].question, "ما هي ساعات العمل؟");
        assert_eq!(pairs[0].answer, "من التاسعة حتى الخامسة");
        assert_eq!(pairs[1].question, "هل يوجد توصيل؟");
        assert_eq!(pairs[1].answer, "نعم داخل المدينة");
    }

    #[test]
    fn fallback_ignores_a_trailing_unpaired_line() {
        let text = "line one\nline two\nleftover\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn fallback_strips_leading_markers() {
        // These lines carry markers but no answer marker follows the
        // question marker inside one segment, so the marker strategies
        // find nothing and line pairing takes over.
        let text = "Q: orphan question\nج: إجابة\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "orphan question");
        assert_eq!(pairs[0].answer, "إجابة");
    }

    #[test]
    fn fallback_keeps_pairs_that_strip_to_empty() {
        // Historical behavior: the line-pairing path does not re-validate
        // non-emptiness after marker stripping.
        let text = "Q:\nsome answer\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].question, "");
        assert_eq!(pairs[0].answer, "some answer");
    }

    #[test]
    fn fallback_not_used_when_markers_matched() {
        let text = "س: سؤال؟\nج: جواب\nstray line one\nstray line two\n";
        let pairs = extract(text);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        assert!(extract("  \n\n  \t\n").is_empty());
    }
}
