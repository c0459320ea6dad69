/*!
Literal fast paths.

Patterns whose program reduces to the shape
`prefix · [one-char set] · [greedy set] · suffix` (optionally anchored at
either end) can be matched with plain string operations instead of the NFA
simulation: a prefix comparison, a set strip and a suffix comparison for
anchored matches, and repeated literal finds for searches. The
[prefix analysis](crate::compiler::prefix) proves the shape at compile
time; whenever a runtime precondition is not met the executors fall back
to the general VM, which is always semantically equivalent.

The shape carries no capture groups, so a fast-path hit synthesizes the
register vector directly.
*/

use crate::compiler::charset::case_fold;
use crate::compiler::prefix::PrefixAnalysis;

/// Outcome of a fast-path attempt.
pub(crate) enum FastResult {
    /// Definitive match, with synthesized registers.
    Matched(Vec<isize>),
    /// Definitive non-match.
    NoMatch,
    /// A precondition failed; the general VM must decide.
    Fallback,
}

#[inline]
fn char_eq(c: char, expected: char, case_insensitive: bool) -> bool {
    (if case_insensitive { case_fold(c) } else { c }) == expected
}

/// Does `lit` occur in `chars` at position `at`?
fn literal_at(
    chars: &[char],
    at: usize,
    lit: &[char],
    case_insensitive: bool,
) -> bool {
    at + lit.len() <= chars.len()
        && lit
            .iter()
            .zip(&chars[at..])
            .all(|(&l, &c)| char_eq(c, l, case_insensitive))
}

/// First occurrence of `lit` at or after `from`. An empty literal occurs
/// everywhere.
fn find_literal(
    chars: &[char],
    lit: &[char],
    from: usize,
    case_insensitive: bool,
) -> Option<usize> {
    if lit.is_empty() {
        return (from <= chars.len()).then_some(from);
    }
    if chars.len() < lit.len() {
        return None;
    }
    (from..=chars.len() - lit.len())
        .find(|&at| literal_at(chars, at, lit, case_insensitive))
}

/// Registers for a groupless match spanning `start..end`: the whole-match
/// pair plus an unset `lastindex`.
fn synthesize_regs(start: usize, end: usize) -> Vec<isize> {
    vec![start as isize, end as isize, -1]
}

/// Anchored match at `start`: prefix comparison, one mandatory code unit
/// from the one-char set, greedy strip, suffix comparison, end check.
///
/// The non-match results are definitive: the greedy set is disjoint from
/// the instruction that follows the loop (the optimizer only builds such
/// loops), so no shorter strip could have let the suffix match.
pub(crate) fn match_at(
    opt: &PrefixAnalysis,
    chars: &[char],
    start: usize,
    require_end: bool,
) -> FastResult {
    if opt.anchored_start && start != 0 {
        return FastResult::NoMatch;
    }
    if !literal_at(chars, start, &opt.prefix, opt.prefix_case_insensitive) {
        return FastResult::NoMatch;
    }
    let mut at = start + opt.prefix.len();

    if let Some(set) = &opt.prefix_set {
        match chars.get(at) {
            Some(&c) => {
                let c = if opt.prefix_set_case_insensitive {
                    case_fold(c)
                } else {
                    c
                };
                if !set.contains(c) {
                    return FastResult::NoMatch;
                }
                at += 1;
            }
            None => return FastResult::NoMatch,
        }
    }

    if let Some(set) = &opt.greedy_set {
        at += set.strip_prefix_len(&chars[at..], opt.greedy_case_insensitive);
    }

    if !literal_at(chars, at, &opt.suffix, opt.suffix_case_insensitive) {
        return FastResult::NoMatch;
    }
    at += opt.suffix.len();

    if (opt.anchored_end || require_end) && at != chars.len() {
        return FastResult::NoMatch;
    }
    FastResult::Matched(synthesize_regs(start, at))
}

/// Unanchored search from `start`.
pub(crate) fn search(
    opt: &PrefixAnalysis,
    chars: &[char],
    start: usize,
) -> FastResult {
    // A start-anchored pattern can only match at index 0.
    if opt.anchored_start {
        return if start == 0 {
            match_at(opt, chars, 0, false)
        } else {
            FastResult::NoMatch
        };
    }

    // Find-driven search: every occurrence of the prefix is a candidate
    // start, tried left to right, and the anchored matcher decides.
    if !opt.prefix.is_empty() {
        let mut from = start;
        while let Some(at) =
            find_literal(chars, &opt.prefix, from, opt.prefix_case_insensitive)
        {
            match match_at(opt, chars, at, false) {
                FastResult::NoMatch => from = at + 1,
                result => return result,
            }
        }
        return FastResult::NoMatch;
    }

    // The remaining paths assume the match begins directly with the greedy
    // set or the suffix.
    if opt.prefix_set.is_some() {
        return FastResult::Fallback;
    }

    // End-anchored: the match must end at the end of the input. Check the
    // suffix there and extend backwards over the greedy set; the leftmost
    // match is the maximal backward extension.
    if opt.anchored_end {
        let n = chars.len();
        if n < opt.suffix.len() {
            return FastResult::NoMatch;
        }
        let tail = n - opt.suffix.len();
        if tail < start
            || !literal_at(chars, tail, &opt.suffix, opt.suffix_case_insensitive)
        {
            return FastResult::NoMatch;
        }
        let mut begin = tail;
        if let Some(set) = &opt.greedy_set {
            begin -= set.strip_suffix_len(
                &chars[start..tail],
                opt.greedy_case_insensitive,
            );
        }
        return FastResult::Matched(synthesize_regs(begin, n));
    }

    // No suffix at all: the pattern is a bare greedy set (or empty) and
    // matches at `start`, possibly with zero length.
    if opt.suffix.is_empty() {
        return match_at(opt, chars, start, false);
    }

    // Suffix-only: find the leftmost suffix occurrence and extend
    // backwards over the greedy set. Sound only when the suffix shares no
    // member with the set, otherwise the found occurrence might sit inside
    // the strip.
    if opt.suffix_disjoint {
        return match find_literal(
            chars,
            &opt.suffix,
            start,
            opt.suffix_case_insensitive,
        ) {
            None => FastResult::NoMatch,
            Some(at) => {
                let mut begin = at;
                if let Some(set) = &opt.greedy_set {
                    begin -= set.strip_suffix_len(
                        &chars[start..at],
                        opt.greedy_case_insensitive,
                    );
                }
                FastResult::Matched(synthesize_regs(
                    begin,
                    at + opt.suffix.len(),
                ))
            }
        };
    }

    FastResult::Fallback
}
