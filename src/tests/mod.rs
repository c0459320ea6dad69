/*! End-to-end tests.*/
use pretty_assertions::assert_eq;

use crate::{compile, escape, Compiler, Error, Template};

/// Asserts that searching `$pattern` in `$input` produces a match whose
/// group 0 and capture groups equal the expected values.
macro_rules! assert_search {
    ($pattern:literal, $input:literal, None) => {{
        let pattern = compile($pattern).unwrap();
        assert!(
            pattern.search($input, 0).is_none(),
            "`{}` should not match `{}`",
            $pattern,
            $input,
        );
    }};
    ($pattern:literal, $input:literal, $whole:literal $(, $group:expr)*) => {{
        let pattern = compile($pattern).unwrap();
        let m = pattern
            .search($input, 0)
            .unwrap_or_else(|| panic!("`{}` should match `{}`", $pattern, $input));
        assert_eq!(m.group(0), Some($whole), "whole match of `{}`", $pattern);
        let expected: Vec<Option<&str>> = vec![$($group),*];
        if !expected.is_empty() {
            assert_eq!(m.groups(), expected, "groups of `{}`", $pattern);
        }
    }};
}

/// Every (pattern, input) pair must produce identical results with and
/// without the optimizer, and with and without the fast paths.
fn assert_equivalence(cases: &[(&str, &str)]) {
    for &(pattern, input) in cases {
        let optimized = Compiler::new().compile(pattern).unwrap();
        let unoptimized =
            Compiler::new().optimize(false).compile(pattern).unwrap();
        let chars: Vec<char> = input.chars().collect();

        let fast = optimized.exec_chars(&chars, 0, false, false, true);
        let general = optimized.exec_chars(&chars, 0, false, false, false);
        let raw = unoptimized.exec_chars(&chars, 0, false, false, true);

        assert_eq!(
            fast, general,
            "fast path diverged for `{}` on `{}`",
            pattern, input,
        );
        assert_eq!(
            general, raw,
            "optimizer changed the result of `{}` on `{}`",
            pattern, input,
        );

        let fast = optimized.exec_chars(&chars, 0, true, false, true);
        let general = optimized.exec_chars(&chars, 0, true, false, false);
        assert_eq!(
            fast, general,
            "anchored fast path diverged for `{}` on `{}`",
            pattern, input,
        );
    }
}

#[test]
fn capture_groups() {
    assert_search!(
        "(orange)-(.*)",
        "orange-rules",
        "orange-rules",
        Some("orange"),
        Some("rules")
    );
}

#[test]
fn lazy_and_greedy_dot() {
    assert_search!("<.*?>", "<tag>content</tag>", "<tag>");
    assert_search!("<.*>", "<tag>content</tag>", "<tag>content</tag>");
}

#[test]
fn case_insensitive_class() {
    assert_search!("(?i)[a-z]+", "ORANGE", "ORANGE");
    assert_search!("(?i)orange", "OrAnGe", "OrAnGe");
}

#[test]
fn multiline_anchor() {
    let pattern = compile("(?m)^line2").unwrap();
    let m = pattern.search("line1\nline2", 0).unwrap();
    assert_eq!(m.span(0), Some((6, 11)));
    assert_eq!(m.group(0), Some("line2"));
    // Without the flag the anchor is absolute.
    assert_search!("^line2", "line1\nline2", None);
}

#[test]
fn anchored_digits_take_the_fast_path() {
    let pattern = compile(r"^\d+abc$").unwrap();
    assert!(pattern.opt.is_some());
    let m = pattern.search("123abc", 0).unwrap();
    assert_eq!(m.group(0), Some("123abc"));
    assert!(pattern.fullmatch("123abc", 0).is_some());
    assert!(pattern.search("123abcd", 0).is_none());
    assert!(pattern.search("x123abc", 0).is_none());
}

#[test]
fn lazy_disjoint_loop_still_consumes_the_run() {
    assert_search!("a*?b", "aaab", "aaab");
}

#[test]
fn word_boundaries() {
    assert_search!(r"\bcat\b", "scatter", None);
    assert_search!(r"\bcat\b", "a cat.", "cat");
    assert_search!(r"\Bcat\B", "scatter", "cat");
    // No word characters, no boundaries.
    assert_search!(r"\b", "!!!", None);
}

#[test]
fn uri_decomposition() {
    let pattern = compile(
        r"^((?P<scheme>[^:/?#]+):)?(//(?P<authority>[^/?#]*))?(?P<path>[^?#]*)(\?(?P<query>[^#]*))?(#(?P<fragment>.*))?",
    )
    .unwrap();
    let m = pattern
        .search("https://www.google.com/search?q=bazel#frag", 0)
        .unwrap();
    assert_eq!(m.group_by_name("scheme"), Some("https"));
    assert_eq!(m.group_by_name("authority"), Some("www.google.com"));
    assert_eq!(m.group_by_name("path"), Some("/search"));
    assert_eq!(m.group_by_name("query"), Some("q=bazel"));
    assert_eq!(m.group_by_name("fragment"), Some("frag"));
}

#[test]
fn empty_pattern_matches_everywhere() {
    let pattern = compile("").unwrap();
    assert_eq!(pattern.search("ab", 0).unwrap().span(0), Some((0, 0)));
    assert_eq!(pattern.search("ab", 1).unwrap().span(0), Some((1, 1)));
    assert_eq!(pattern.search("ab", 2).unwrap().span(0), Some((2, 2)));
    assert_eq!(pattern.findall("ab"), vec!["", "", ""]);
}

#[test]
fn caret_dollar_on_empty_input() {
    let pattern = compile("^$").unwrap();
    assert!(pattern.search("", 0).is_some());
    assert!(pattern.search("a", 0).is_none());
    let multiline = compile("(?m)^$").unwrap();
    assert_eq!(multiline.search("a\n\nb", 0).unwrap().span(0), Some((2, 2)));
}

#[test]
fn repeat_zero_bounds() {
    // {0,} is *, {0} consumes nothing.
    let star = compile("a*").unwrap();
    let zero_or_more = compile("a{0,}").unwrap();
    assert_eq!(star.findall("baaab"), zero_or_more.findall("baaab"));
    assert_search!("ab{0}c", "ac", "ac");
}

#[test]
fn leftmost_first_alternation() {
    // The first alternative wins even though the second is longer.
    assert_search!("a|ab", "xab", "a");
    assert_search!("ab|a", "xab", "ab");
}

#[test]
fn greedy_lazy_duality() {
    let greedy = compile("<.*>").unwrap();
    let lazy = compile("<.*?>").unwrap();
    let input = "<a><b>";
    let g = greedy.search(input, 0).unwrap();
    let l = lazy.search(input, 0).unwrap();
    assert_eq!(g.start(0), l.start(0));
    assert_eq!(g.span(0), Some((0, 6)));
    assert_eq!(l.span(0), Some((0, 3)));
}

#[test]
fn search_and_match_agree() {
    let cases = [
        (r"\d+", "abc 123 def"),
        ("(or)(ange)", "xxorangexx"),
        ("a*b", "caaab"),
        (r"\bword\b", "a word here"),
    ];
    for (pattern, input) in cases {
        let pattern = compile(pattern).unwrap();
        let found = pattern.search(input, 0).unwrap();
        let anchored =
            pattern.match_at(input, found.start(0).unwrap()).unwrap();
        assert_eq!(found.span(0), anchored.span(0));
        assert_eq!(found.groups(), anchored.groups());
    }
}

#[test]
fn fullmatch_is_match_to_the_end() {
    let pattern = compile(r"\d+").unwrap();
    assert!(pattern.fullmatch("123", 0).is_some());
    assert!(pattern.fullmatch("123x", 0).is_none());
    assert_eq!(
        pattern.fullmatch("123", 0).unwrap().span(0),
        Some((0, 3)),
    );
    // match_at succeeds where fullmatch fails, ending early.
    assert_eq!(pattern.match_at("123x", 0).unwrap().span(0), Some((0, 3)));
}

#[test]
fn findall_does_not_overlap() {
    let pattern = compile("a*").unwrap();
    // Empty matches advance by one code unit.
    assert_eq!(pattern.findall("baaab"), vec!["", "aaa", "", ""]);

    let pattern = compile(r"\d+").unwrap();
    assert_eq!(pattern.findall("1 22 333"), vec!["1", "22", "333"]);

    let pattern = compile("aa").unwrap();
    assert_eq!(pattern.findall("aaaa"), vec!["aa", "aa"]);
}

#[test]
fn captures_round_trip() {
    let pattern = compile(r"(\w+)@(\w+)").unwrap();
    let input = "mail me at someone@example today";
    let m = pattern.search(input, 0).unwrap();
    for group in 0..=pattern.group_count() {
        let (start, end) = m.span(group).unwrap();
        let by_index: String = input
            .chars()
            .skip(start)
            .take(end - start)
            .collect();
        assert_eq!(m.group(group), Some(by_index.as_str()));
    }
}

#[test]
fn optimizer_and_fast_paths_are_neutral() {
    assert_equivalence(&[
        ("abc", "xxabcxx"),
        ("abc", "no such thing"),
        ("a*b", "caaab"),
        ("a*?b", "aaab"),
        ("a+b", "caaab"),
        (r"\d+", "abc 123"),
        (r"^\d+abc$", "123abc"),
        (r"^\d+abc$", "123abd"),
        (r"[a-z]+ing$", "whistling"),
        (r"[a-z]+ing$", "WHISTLING"),
        (r"ing$", "whistling"),
        (r"^[0-9]*", "123abc"),
        ("x[0-9]*y", "x01234y"),
        ("x[0-9]*y", "xy"),
        ("(?i)abc", "xxABCxx"),
        ("", "anything"),
        ("a{2,4}", "aaaaaa"),
        (r"\w+-\w+", "one-two three-four"),
    ]);
}

#[test]
fn overlapping_literal_attempts_are_kept_apart() {
    // The second attempt reaches the same program position as the first
    // one but wakes up later; it must survive the first attempt's death.
    assert_search!("(aa)x", "aaax", "aax", Some("aa"));
    assert_search!("(aa)x", "aaaax", "aax", Some("aa"));
}

#[test]
fn unanchored_prefix_search_uses_find() {
    let pattern = compile("needle").unwrap();
    assert!(pattern.opt.is_some());
    let haystack = "hay needle hay";
    assert_eq!(pattern.search(haystack, 0).unwrap().span(0), Some((4, 10)));
    assert!(pattern.search(haystack, 5).is_none());
}

#[test]
fn end_anchored_search_strips_backwards() {
    let pattern = compile(r"[0-9]*kg$").unwrap();
    assert!(pattern.opt.is_some());
    let m = pattern.search("weight: 75kg", 0).unwrap();
    assert_eq!(m.group(0), Some("75kg"));
    assert!(pattern.search("75kgs", 0).is_none());
}

#[test]
fn suffix_only_search_synthesizes_registers() {
    let pattern = compile(r"[0-9]*px").unwrap();
    let m = pattern.search("width: 240px;", 0).unwrap();
    assert_eq!(m.group(0), Some("240px"));
    assert_eq!(m.span(0), Some((7, 12)));
}

#[test]
fn start_parameter_behaves_like_python_pos() {
    let pattern = compile("a").unwrap();
    assert_eq!(pattern.search("aaa", 1).unwrap().span(0), Some((1, 2)));
    assert!(pattern.search("aaa", 3).is_none());
    // Out-of-range positions clamp to the end of the input.
    assert!(pattern.search("aaa", 10).is_none());
    assert!(compile("").unwrap().search("aaa", 10).is_some());

    // `^` does not match at a non-zero start.
    let anchored = compile("^a").unwrap();
    assert!(anchored.search("aaa", 1).is_none());

    // Word boundaries may look at characters before `start`.
    let boundary = compile(r"\bcat").unwrap();
    assert!(boundary.search("concat", 3).is_none());
}

#[test]
fn groups_that_did_not_participate() {
    let pattern = compile("(a)|(b)").unwrap();
    let m = pattern.search("b", 0).unwrap();
    assert_eq!(m.groups(), vec![None, Some("b")]);
    assert_eq!(m.lastindex(), Some(2));
    assert_eq!(m.lastgroup(), None);

    let named = compile("(?P<x>a)|(?P<y>b)").unwrap();
    let m = named.search("b", 0).unwrap();
    assert_eq!(m.lastgroup(), Some("y"));
    assert_eq!(m.group_by_name("x"), None);
    assert_eq!(m.group_by_name("y"), Some("b"));
}

#[test]
fn repeated_group_captures_the_last_iteration() {
    let pattern = compile("(ab)+").unwrap();
    let m = pattern.search("ababab", 0).unwrap();
    assert_eq!(m.group(0), Some("ababab"));
    assert_eq!(m.group(1), Some("ab"));
    assert_eq!(m.span(1), Some((4, 6)));
}

#[test]
fn match_object_accessors() {
    let pattern = compile(r"(\w+)").unwrap();
    let text = "  hello  ";
    let m = pattern.search(text, 1).unwrap();
    assert_eq!(m.pos(), 1);
    assert_eq!(m.endpos(), text.chars().count());
    assert_eq!(m.string(), text);
    assert_eq!(m.re().group_count(), 1);
    assert_eq!(m.start(0), Some(2));
    assert_eq!(m.end(0), Some(7));
    let dict = m.group_dict();
    assert!(dict.is_empty());
}

#[test]
#[should_panic(expected = "no such group")]
fn out_of_range_group_panics() {
    let pattern = compile("a").unwrap();
    let m = pattern.search("a", 0).unwrap();
    let _ = m.group(1);
}

#[test]
fn spans_are_code_unit_indices() {
    let pattern = compile("é+").unwrap();
    let m = pattern.search("caféé!", 0).unwrap();
    assert_eq!(m.span(0), Some((3, 5)));
    assert_eq!(m.group(0), Some("éé"));
}

#[test]
fn posix_classes() {
    assert_search!("[[:alpha:]]+", "12abc34", "abc");
    assert_search!("[[:^alpha:]]+", "ab123cd", "123");
    assert_search!("[x[:digit:]]+", "yx12z", "x12");
}

#[test]
fn negated_classes_and_predefined_sets() {
    assert_search!(r"[^a-z]+", "abcDEFghi", "DEF");
    assert_search!(r"\D+", "123abc456", "abc");
    assert_search!(r"\s\w\s", "a b c", " b ");
    // \D inside a bracket expression contributes nothing.
    assert_search!(r"x[\D]*", "xabc", "x");
}

#[test]
fn wide_ranges_match_above_the_bitmap() {
    assert_search!("[\\x{100}-\\x{ffff}]+", "abc\u{1234}\u{2345}x", "\u{1234}\u{2345}");
}

#[test]
fn substitution() {
    let pattern = compile(r"(?P<first>\w+) (?P<second>\w+)").unwrap();
    assert_eq!(
        pattern.sub(r"\g<second> \g<first>", "hello world").unwrap(),
        "world hello",
    );

    let digits = compile(r"\d+").unwrap();
    assert_eq!(digits.sub("#", "a1b22c333").unwrap(), "a#b#c#");
    assert_eq!(digits.subn("#", "a1b22c333").unwrap().1, 3);
    assert_eq!(digits.subn("#", "nothing").unwrap(), ("nothing".into(), 0));

    // \0 is the whole match.
    assert_eq!(
        compile("ab").unwrap().sub(r"<\0>", "xabx").unwrap(),
        "x<ab>x",
    );
}

#[test]
fn substitution_with_unset_group() {
    let pattern = compile("(a)|(b)").unwrap();
    assert_eq!(pattern.sub(r"[\1\2]", "ab").unwrap(), "[a][b]");
}

#[test]
fn template_parsing() {
    let pattern = compile(r"(?P<x>a)(b)").unwrap();
    let template = Template::parse(r"pre \1 mid \g<x> post", &pattern).unwrap();
    assert_eq!(template.parts().len(), 5);

    assert!(matches!(
        Template::parse(r"\5", &pattern),
        Err(Error::BadGroupName { .. }),
    ));
    assert!(matches!(
        Template::parse(r"\g<nope>", &pattern),
        Err(Error::BadGroupName { .. }),
    ));
    assert!(matches!(
        Template::parse(r"\q", &pattern),
        Err(Error::BadEscape { .. }),
    ));
}

#[test]
fn splitting() {
    let pattern = compile(r",\s*").unwrap();
    assert_eq!(pattern.split("a, b,c"), vec!["a", "b", "c"]);
    assert_eq!(pattern.split("no separators"), vec!["no separators"]);
}

#[test]
fn escaping_metacharacters() {
    let text = "1+1=2 (really?)";
    let pattern = compile(&escape(text)).unwrap();
    assert!(pattern.fullmatch(text, 0).is_some());
}

#[test]
fn quoted_runs_and_flags_together() {
    assert_search!(r"(?i)\Qa*\E", "XA*X", "A*");
}

#[test]
fn is_match_convenience() {
    let pattern = compile(r"\d{3}").unwrap();
    assert!(pattern.is_match("abc 123"));
    assert!(!pattern.is_match("abc 12"));
}

/// Asserts the span of the leftmost match (or its absence).
macro_rules! assert_span {
    ($pattern:literal, $input:expr, $span:expr) => {{
        let pattern = compile($pattern).unwrap();
        let span = pattern.search($input, 0).map(|m| m.span(0).unwrap());
        assert_eq!(span, $span, "`{}` on `{:?}`", $pattern, $input);
    }};
}

#[test]
fn quantifier_battery() {
    assert_span!("a?", "b", Some((0, 0)));
    assert_span!("a+", "baa", Some((1, 3)));
    assert_span!("a+?", "baa", Some((1, 2)));
    assert_span!("a{3}", "aaaa", Some((0, 3)));
    assert_span!("a{3}", "aa", None);
    assert_span!("a{2,4}", "aaaaa", Some((0, 4)));
    assert_span!("a{2,4}?", "aaaaa", Some((0, 2)));
    assert_span!("a{2,}", "baaa", Some((1, 4)));
    assert_span!("(?U)a+", "aaa", Some((0, 1)));
    assert_span!("(?U)a+?", "aaa", Some((0, 3)));
    assert_span!("(a?)*b", "aaab", Some((0, 4)));
}

#[test]
fn alternation_battery() {
    assert_span!("a|ab|abc", "zabc", Some((1, 2)));
    assert_span!("abc|ab|a", "zabc", Some((1, 4)));
    assert_span!("x|y", "zzz", None);
    assert_span!("a(|b)c", "ac", Some((0, 2)));
    assert_span!("a(|b)c", "abc", Some((0, 3)));
    assert_span!("(?:ab|cd)+", "abcdab", Some((0, 6)));
}

#[test]
fn class_battery() {
    assert_span!("[abc]+", "xabcy", Some((1, 4)));
    assert_span!("[^abc]+", "abxyc", Some((2, 4)));
    assert_span!("[a-fA-F]+", "zzBeEfz", Some((2, 6)));
    assert_span!("[]a]+", "]a]", Some((0, 3)));
    assert_span!("[a-]+", "a-a", Some((0, 3)));
    assert_span!("[-a]+", "-a-", Some((0, 3)));
    assert_span!(r"[\d]+", "ab12cd", Some((2, 4)));
    assert_span!(r"[\n]+", "a\n\nb", Some((1, 3)));
    assert_span!(r"[^\n]+", "ab\ncd", Some((0, 2)));
    assert_span!(r"[\x41-\x43]+", "zABCz", Some((1, 4)));
    assert_span!("[[:xdigit:]]+", "zzAF09gz", Some((2, 6)));
}

#[test]
fn anchor_battery() {
    assert_span!(r"\Aab", "ab", Some((0, 2)));
    assert_span!(r"\Aab", "zab", None);
    assert_span!(r"ab\z", "zab", Some((1, 3)));
    assert_span!(r"ab\z", "abz", None);
    assert_span!("(?m)^b", "a\nb", Some((2, 3)));
    assert_span!("(?m)b$", "b\na", Some((0, 1)));
    assert_span!("^", "abc", Some((0, 0)));
    assert_span!("$", "abc", Some((3, 3)));
    assert_span!(r"\bfoo", "a foo", Some((2, 5)));
    assert_span!(r"foo\b", "foobar", None);
    assert_span!(r"\Bend", "bend", Some((1, 4)));
}

#[test]
fn dot_battery() {
    assert_span!("a.c", "abc", Some((0, 3)));
    assert_span!("a.c", "a\nc", None);
    assert_span!("(?s)a.c", "a\nc", Some((0, 3)));
    assert_span!(".+", "\n\nab", Some((2, 4)));
}

#[test]
fn case_insensitive_battery() {
    assert_span!("(?i)aBc", "xABCx", Some((1, 4)));
    assert_span!("(?i)[a-z]+", "123AbC", Some((3, 6)));
    assert_span!(r"(?i)\x41+", "xaAax", Some((1, 4)));
}

#[test]
fn escape_battery() {
    assert_span!(r"\x41+", "AAB", Some((0, 2)));
    assert_span!(r"\101\102", "zAB", Some((1, 3)));
    assert_span!(r"\x{100}+", "z\u{100}\u{100}z", Some((1, 3)));
    assert_span!(r"a\tb", "a\tb", Some((0, 3)));
}

#[test]
fn capture_priority_battery() {
    assert_search!("((a)(b))", "ab", "ab", Some("ab"), Some("a"), Some("b"));
    assert_search!("(ab|a)(b?)", "ab", "ab", Some("ab"), Some(""));
    assert_search!("(a|ab)(b?)", "ab", "ab", Some("a"), Some("b"));
    assert_search!("(a+)(a*)", "aaa", "aaa", Some("aaa"), Some(""));
    assert_search!(r"(\d+)(\d)", "12345", "12345", Some("1234"), Some("5"));
    assert_search!("(ab|cd)+", "abcdab", "abcdab", Some("ab"));
    assert_search!("(a)?b", "b", "b", None);
}

#[test]
fn consistency_battery() {
    let patterns = [
        "a", "a+", "a*?b", "(a)(b)?", "[ab]+", r"\w+", "a|ab|abc", "^a",
        "a$", r"\ba\b", "(?i)ab", "a{2,3}", "(?:ab)+", ".*", "x[0-9]*y",
        r"[0-9]*px", "",
    ];
    let inputs = [
        "", "a", "b", "ab", "aab", "abc", "aaab", "xaby", "x01234y",
        "width 20px", "a a", "A AB", "line1\nline2",
    ];
    for pattern_src in patterns {
        let pattern = compile(pattern_src).unwrap();
        for input in inputs {
            // Equivalence of the three execution strategies.
            assert_equivalence(&[(pattern_src, input)]);

            // A search hit re-anchors at its own start.
            if let Some(m) = pattern.search(input, 0) {
                let start = m.start(0).unwrap();
                let anchored = pattern
                    .match_at(input, start)
                    .unwrap_or_else(|| {
                        panic!(
                            "`{}` found at {} in `{:?}` but does not \
                             re-match there",
                            pattern_src, start, input,
                        )
                    });
                assert_eq!(m.span(0), anchored.span(0));
                assert_eq!(m.groups(), anchored.groups());
            }

            // A match that already spans the whole input implies that
            // fullmatch succeeds. The reverse does not hold: `a|ab` on
            // `ab` matches `a` but full-matches `ab`.
            let full = pattern.fullmatch(input, 0);
            let to_end = pattern
                .match_at(input, 0)
                .filter(|m| m.end(0) == Some(input.chars().count()));
            if to_end.is_some() {
                assert!(
                    full.is_some(),
                    "match spans all of `{:?}` but fullmatch fails for `{}`",
                    input,
                    pattern_src,
                );
            }
        }
    }
}

#[test]
fn pattern_accessors_and_expand() {
    let pattern = compile(r"(?P<word>\w+)-(\d+)").unwrap();
    assert_eq!(pattern.pattern(), r"(?P<word>\w+)-(\d+)");
    let m = pattern.search("see alpha-42", 0).unwrap();
    assert_eq!(m.expand(r"\g<word>: \2").unwrap(), "alpha: 42");
    // The disassembly lists one instruction per line.
    assert!(pattern.dump().lines().count() >= 4);
}

#[test]
fn find_iter_yields_positions() {
    let pattern = compile(r"\d+").unwrap();
    let spans: Vec<_> = pattern
        .find_iter("1 22 333")
        .map(|m| m.span(0).unwrap())
        .collect();
    assert_eq!(spans, vec![(0, 1), (2, 4), (5, 8)]);
}
