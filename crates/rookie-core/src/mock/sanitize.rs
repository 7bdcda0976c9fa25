// Rationale cleanup applied to every persisted pick reason.
//
// Output guarantees: no banned phrase (case-insensitive), the player's
// surname appears, and there are at least three sentences. Running the
// sanitizer on its own output is a no-op.

use crate::draft::pick::surname_of;

/// Stock phrases stripped from rationales. Lowercase ASCII.
pub const BANNED_PHRASES: &[&str] = &[
    "medium scarcity",
    "explosive playmaking ability",
    "perfect fit",
    "elite cornerback",
    "elite matchups",
    "balanced risk profile",
    "immediate impact potential",
    "scheme-diverse",
    "well-rounded skill set",
];

const CLOSING_SENTENCE: &str =
    "He offers practical value now while leaving room for growth without overcommitting to one dimension.";

const MIN_SENTENCES: usize = 3;

/// Rationale used when the decision step could not supply one.
pub fn fallback_reason(player_name: &str, team_name: &str) -> String {
    format!(
        "{player_name} fits {team_name}'s roster build and projected role. \
         He provides actionable value now while keeping future options open. \
         A minor concern is the adjustment curve at the pro level."
    )
}

/// Clean a rationale for `player_name`.
pub fn sanitize_reason(reason: &str, player_name: &str) -> String {
    let mut out = clean(reason);

    let surname = surname_of(player_name.trim()).to_lowercase();
    if !out.to_lowercase().contains(&surname) {
        out = format!("{player_name} fits the current roster plan and projected role. {out}")
            .trim_end()
            .to_string();
    }

    while sentence_count(&out) < MIN_SENTENCES {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(CLOSING_SENTENCE);
    }

    // Tidy the joins; removes no sentences and no surname.
    clean(&out)
}

/// Repeat [`clean_once`] until nothing changes.
fn clean(text: &str) -> String {
    let mut out = text.to_string();
    loop {
        let next = clean_once(&out);
        if next == out {
            return out;
        }
        out = next;
    }
}

/// Non-empty `.`-separated pieces.
pub fn sentence_count(text: &str) -> usize {
    text.split('.').filter(|s| !s.trim().is_empty()).count()
}

/// One pass of phrase removal and whitespace cleanup. Never lengthens the
/// text, so repeating it reaches a fixed point.
fn clean_once(text: &str) -> String {
    let mut out = text.to_string();
    for phrase in BANNED_PHRASES {
        out = remove_phrase(&out, phrase);
    }
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.replace(" .", ".").replace(" ,", ",")
}

/// Remove every ASCII case-insensitive occurrence of `phrase`.
fn remove_phrase(text: &str, phrase: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(found) = lower[cursor..].find(phrase) {
        let start = cursor + found;
        out.push_str(&text[cursor..start]);
        cursor = start + phrase.len();
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_clean(out: &str, name: &str) {
        let lower = out.to_lowercase();
        for phrase in BANNED_PHRASES {
            assert!(!lower.contains(phrase), "{phrase:?} left in {out:?}");
        }
        assert!(lower.contains(&surname_of(name).to_lowercase()));
        assert!(sentence_count(out) >= 3);
    }

    #[test]
    fn strips_banned_phrases_case_insensitively() {
        let out = sanitize_reason(
            "Jeanty is a PERFECT FIT with Explosive Playmaking Ability. He brings elite matchups. Depth is thin.",
            "Ashton Jeanty",
        );
        assert_eq!(out, "Jeanty is a with. He brings. Depth is thin.");
        assert_clean(&out, "Ashton Jeanty");
    }

    #[test]
    fn prepends_surname_sentence_when_missing() {
        let out = sanitize_reason("Strong hands. Good routes. Slight drop risk.", "Travis Hunter");
        assert!(out.starts_with("Travis Hunter fits the current roster plan and projected role. "));
        assert!(out.ends_with("Slight drop risk."));
    }

    #[test]
    fn appends_closing_sentence_until_three() {
        let out = sanitize_reason("", "Tyler Warren");
        assert_eq!(
            out,
            format!("Tyler Warren fits the current roster plan and projected role. {CLOSING_SENTENCE} {CLOSING_SENTENCE}")
        );
        assert_clean(&out, "Tyler Warren");
    }

    #[test]
    fn removal_that_exposes_new_phrase_is_repeated() {
        let out = sanitize_reason("Warren has an elite cornerperfect fitback role.", "Tyler Warren");
        assert!(!out.to_lowercase().contains("elite cornerback"));
        let spaced = sanitize_reason("Warren is a perfect    fit. Yes. Yes.", "Tyler Warren");
        assert_eq!(spaced, "Warren is a. Yes. Yes.");
    }

    #[test]
    fn sanitizer_is_idempotent() {
        let inputs = [
            "",
            "   ",
            "Perfect fit.",
            "He has a well-rounded skill set , and medium scarcity .",
            "Jeanty runs hard. He catches well. He blocks. He is young.",
            "no periods at all just words",
            "...",
            "Scheme-diverse scheme-diverse ELITE CORNERBACK\n\nnewlines\tand tabs",
        ];
        for input in inputs {
            let once = sanitize_reason(input, "Ashton Jeanty");
            let twice = sanitize_reason(&once, "Ashton Jeanty");
            assert_eq!(once, twice, "not idempotent for {input:?}");
            assert_clean(&once, "Ashton Jeanty");
        }
    }

    #[test]
    fn fallback_reason_sanitizes_cleanly() {
        let reason = fallback_reason("Cam Ward", "Gridiron Gurus");
        assert_eq!(sanitize_reason(&reason, "Cam Ward"), reason);
    }

    #[test]
    fn remove_phrase_preserves_non_ascii() {
        assert_eq!(remove_phrase("Café perfect fit ñ", "perfect fit"), "Café  ñ");
    }
}
