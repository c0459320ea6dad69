/*!
Prefix analysis for the literal fast paths.

After optimization, many common patterns reduce to the program shape

```text
save 0, [start], literal*, [one-char class], [greedy_loop], literal*,
[end], save 1, match
```

This module walks the final program and, when it has exactly that shape,
records the literal prefix and suffix, the optional one-character class,
the optional greedy set and the anchors. The executors in
[`crate::fast`] use these facts to answer matches with plain string
operations; any program that deviates from the shape gets no analysis and
always runs on the general VM.
*/

use crate::compiler::charset::{case_fold, Charset};
use crate::compiler::instr::Instr;

/// Literal facts extracted from a fast-path-shaped program.
#[derive(Debug, Clone)]
pub(crate) struct PrefixAnalysis {
    /// Literal run at the start of the pattern.
    pub prefix: Vec<char>,
    pub prefix_case_insensitive: bool,
    /// A class consuming exactly one code unit between the prefix and the
    /// greedy set, like the mandatory first iteration of `[a-z]+`.
    pub prefix_set: Option<Box<Charset>>,
    pub prefix_set_case_insensitive: bool,
    /// The set of a greedy loop between prefix and suffix.
    pub greedy_set: Option<Box<Charset>>,
    pub greedy_case_insensitive: bool,
    /// Literal run at the end of the pattern.
    pub suffix: Vec<char>,
    pub suffix_case_insensitive: bool,
    pub anchored_start: bool,
    pub anchored_end: bool,
    /// True when the suffix shares no member with the greedy set, which
    /// allows the suffix-driven search to bypass the VM entirely.
    pub suffix_disjoint: bool,
}

/// Collects a run of `Char`/`Literal` instructions with uniform case
/// sensitivity starting at `pc`. Stops, without consuming, at the first
/// instruction of any other kind or with the opposite sensitivity.
fn literal_run(code: &[Instr], mut pc: usize) -> (Vec<char>, bool, usize) {
    let mut run: Vec<char> = Vec::new();
    let mut run_ci = false;
    loop {
        match code.get(pc) {
            Some(Instr::Char { c, case_insensitive }) => {
                if !run.is_empty() && *case_insensitive != run_ci {
                    break;
                }
                run_ci = *case_insensitive;
                run.push(*c);
                pc += 1;
            }
            Some(Instr::Literal { chars, case_insensitive }) => {
                if !run.is_empty() && *case_insensitive != run_ci {
                    break;
                }
                run_ci = *case_insensitive;
                run.extend_from_slice(chars);
                pc += 1;
            }
            _ => break,
        }
    }
    (run, run_ci, pc)
}

/// Can a set whose instruction has case sensitivity `class_ci` match the
/// literal character `c` coming from an instruction with sensitivity
/// `c_ci`?
fn set_matches_literal(
    class: &Charset,
    class_ci: bool,
    c: char,
    c_ci: bool,
) -> bool {
    if c_ci {
        if class_ci {
            class.contains(c)
        } else {
            class.flat_members().chars().any(|m| case_fold(m) == c)
        }
    } else {
        class.contains(if class_ci { case_fold(c) } else { c })
    }
}

/// Analyzes the final program. Returns `None` unless it has exactly the
/// fast-path shape.
pub(crate) fn analyze(code: &[Instr]) -> Option<PrefixAnalysis> {
    let mut pc = 0;

    match code.get(pc) {
        Some(Instr::Save { slot: 0 }) => pc += 1,
        _ => return None,
    }

    let anchored_start = matches!(code.get(pc), Some(Instr::Start));
    if anchored_start {
        pc += 1;
    }

    let (prefix, prefix_case_insensitive, next) = literal_run(code, pc);
    pc = next;

    let mut prefix_set = None;
    let mut prefix_set_case_insensitive = false;
    if let Some(Instr::Class { class, negated: false, case_insensitive }) =
        code.get(pc)
    {
        if !class.is_simple() {
            return None;
        }
        prefix_set = Some(class.clone());
        prefix_set_case_insensitive = *case_insensitive;
        pc += 1;
    }

    let mut greedy_set = None;
    let mut greedy_case_insensitive = false;
    if let Some(Instr::GreedyLoop { class, exit, case_insensitive }) =
        code.get(pc)
    {
        // The loop must fall through to the instruction that follows it.
        if *exit != pc + 1 {
            return None;
        }
        greedy_set = Some(class.clone());
        greedy_case_insensitive = *case_insensitive;
        pc += 1;
    }

    let (suffix, suffix_case_insensitive, next) = literal_run(code, pc);
    pc = next;

    let anchored_end = matches!(code.get(pc), Some(Instr::End));
    if anchored_end {
        pc += 1;
    }

    // A prefix and a suffix with different case sensitivity cannot be
    // searched through a single pair of string operations.
    if !prefix.is_empty()
        && !suffix.is_empty()
        && prefix_case_insensitive != suffix_case_insensitive
    {
        return None;
    }

    match code.get(pc) {
        Some(Instr::Save { slot: 1 }) => pc += 1,
        _ => return None,
    }
    match code.get(pc) {
        Some(Instr::Match) => pc += 1,
        _ => return None,
    }
    if pc != code.len() {
        return None;
    }

    let suffix_disjoint = match &greedy_set {
        Some(class) => suffix.iter().all(|&c| {
            !set_matches_literal(
                class,
                greedy_case_insensitive,
                c,
                suffix_case_insensitive,
            )
        }),
        None => true,
    };

    Some(PrefixAnalysis {
        prefix,
        prefix_case_insensitive,
        prefix_set,
        prefix_set_case_insensitive,
        greedy_set,
        greedy_case_insensitive,
        suffix,
        suffix_case_insensitive,
        anchored_start,
        anchored_end,
        suffix_disjoint,
    })
}
