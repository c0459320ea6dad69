/*!
The general NFA simulation, a [Pike's VM](https://swtch.com/~rsc/regexp/regexp2.html)
extended with capture registers.

The VM keeps an ordered list of threads, one per live NFA state. For every
input index it first computes the epsilon closure of each thread, following
non-consuming instructions until a consuming instruction (or `Match`) is
reached, and then runs one consumption step that advances the surviving
threads to the next index. Thread order encodes priority: the preferred
side of every split is expanded first, and new unanchored search attempts
are appended last, which together yield leftmost-first semantics without
any backtracking.
*/

use std::mem;
use std::rc::Rc;

use bitvec::vec::BitVec;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::compiler::charset::case_fold;
use crate::compiler::instr::Instr;
use crate::compiler::Pattern;

/// A thread of the simulation: a program counter, the thread's view of the
/// capture registers, and the input index the thread sleeps until.
/// `skip` lets a multi-character `Literal` (or a greedy-loop strip) consume
/// across several iterations of the per-character loop: the thread is
/// carried over untouched while `skip` is ahead of the current index.
#[derive(Clone)]
struct Thread {
    pc: usize,
    regs: Rc<Vec<isize>>,
    skip: usize,
}

#[inline]
fn is_word_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

/// Runs `pattern` against `chars` starting at `start`.
///
/// With `anchored` the match must begin exactly at `start`; otherwise a new
/// attempt is injected at every index until a match is found. With
/// `require_end` a `Match` instruction is only honored at the end of the
/// input, which is how `fullmatch` is implemented.
///
/// Returns the register vector of the best match according to
/// leftmost-first semantics, or `None`.
pub(crate) fn run(
    pattern: &Pattern,
    chars: &[char],
    start: usize,
    anchored: bool,
    require_end: bool,
) -> Option<Vec<isize>> {
    let code = &pattern.code[..];
    let n = chars.len();
    debug_assert!(start <= n);

    // Word-character positions, precomputed only when the program actually
    // tests word boundaries.
    let word_mask: Option<BitVec> = if code
        .iter()
        .any(|i| matches!(i, Instr::WordBoundary | Instr::WordBoundaryNeg))
    {
        Some(chars.iter().map(|&c| is_word_char(c)).collect())
    } else {
        None
    };
    let word_at = |i: usize| -> bool {
        word_mask.as_ref().map_or(false, |m| i < m.len() && m[i])
    };

    // Greedy-loop strips, cached per (pc, index) so that overlapping search
    // attempts do not recompute the same run.
    let mut strip_cache: FxHashMap<(usize, usize), usize> =
        FxHashMap::default();

    let mut current: Vec<Thread> = Vec::new();
    let mut next: Vec<Thread> = Vec::new();
    let mut expanded: Vec<Thread> = Vec::new();
    let mut stack: Vec<Thread> = Vec::new();
    // Expansion counter per program position, reset at every index. Each
    // position expands at most twice: once on the primary path and once
    // more if it is re-entered through a lower-priority branch.
    let mut visits: Vec<u8> = vec![0; code.len()];
    // Deduplicates the next-index thread list. Two threads with the same
    // program position and wake-up index have identical futures, and the
    // first (highest-priority) arrival wins. The wake-up index takes part
    // in the key because mid-literal threads at the same position may
    // still wake up at different indexes.
    let mut in_next: FxHashSet<(usize, usize)> = FxHashSet::default();
    let mut best: Option<Vec<isize>> = None;

    for i in start..=n {
        // Inject a fresh attempt at this index: always for the anchored
        // start, and at every index for an unanchored search for as long
        // as no match has been found (a later start can never beat an
        // already recorded one).
        if (anchored && i == start) || (!anchored && best.is_none()) {
            current.push(Thread {
                pc: 0,
                regs: Rc::new(vec![-1; pattern.register_count()]),
                skip: 0,
            });
        }

        // Epsilon closure, preserving priority: each thread is expanded
        // depth-first with the preferred split side on top of the stack,
        // so `expanded` ends up ordered from the highest-priority thread
        // down.
        visits.fill(0);
        expanded.clear();
        for thread in current.drain(..) {
            stack.push(thread);
            while let Some(mut t) = stack.pop() {
                if t.skip > i {
                    expanded.push(t);
                    continue;
                }
                if visits[t.pc] >= 2 {
                    continue;
                }
                visits[t.pc] += 1;
                match &code[t.pc] {
                    Instr::Jump { target } => {
                        t.pc = *target;
                        stack.push(t);
                    }
                    Instr::Split { preferred, alternate } => {
                        let mut other = t.clone();
                        other.pc = *alternate;
                        t.pc = *preferred;
                        // Pushed in reverse so the preferred side pops
                        // first.
                        stack.push(other);
                        stack.push(t);
                    }
                    Instr::Save { slot } => {
                        let slot = *slot;
                        let regs = Rc::make_mut(&mut t.regs);
                        regs[slot] = i as isize;
                        // Closing a capturing group updates `lastindex`,
                        // kept in the final register slot.
                        if slot >= 3 && slot % 2 == 1 {
                            let last = regs.len() - 1;
                            regs[last] = ((slot - 1) / 2) as isize;
                        }
                        t.pc += 1;
                        stack.push(t);
                    }
                    Instr::Start => {
                        if i == 0 {
                            t.pc += 1;
                            stack.push(t);
                        }
                    }
                    Instr::End => {
                        if i == n {
                            t.pc += 1;
                            stack.push(t);
                        }
                    }
                    Instr::LineStart => {
                        if i == 0 || chars[i - 1] == '\n' {
                            t.pc += 1;
                            stack.push(t);
                        }
                    }
                    Instr::LineEnd => {
                        if i == n || chars[i] == '\n' {
                            t.pc += 1;
                            stack.push(t);
                        }
                    }
                    Instr::WordBoundary => {
                        let before = i > 0 && word_at(i - 1);
                        if before != word_at(i) {
                            t.pc += 1;
                            stack.push(t);
                        }
                    }
                    Instr::WordBoundaryNeg => {
                        let before = i > 0 && word_at(i - 1);
                        if before == word_at(i) {
                            t.pc += 1;
                            stack.push(t);
                        }
                    }
                    Instr::GreedyLoop { class, exit, case_insensitive } => {
                        let stripped = *strip_cache
                            .entry((t.pc, i))
                            .or_insert_with(|| {
                                class.strip_prefix_len(
                                    &chars[i..],
                                    *case_insensitive,
                                )
                            });
                        if stripped == 0 {
                            // A zero-length strip is an epsilon transition
                            // to the loop's exit.
                            t.pc = *exit;
                            stack.push(t);
                        } else {
                            expanded.push(t);
                        }
                    }
                    // Consuming instructions and Match wait for the
                    // consumption step.
                    _ => expanded.push(t),
                }
            }
        }

        // Consumption step, in priority order.
        in_next.clear();
        for (priority, mut t) in expanded.drain(..).enumerate() {
            if t.skip > i {
                // Dormant mid-literal thread; carry it over unchanged.
                if in_next.insert((t.pc, t.skip)) {
                    next.push(t);
                }
                continue;
            }
            match &code[t.pc] {
                Instr::Match => {
                    if require_end && i != n {
                        // Not a usable match; the thread dies but lower
                        // priority threads keep going.
                        continue;
                    }
                    let regs = t.regs.to_vec();
                    // The top-priority thread matched: no other thread can
                    // improve on this, leftmost-first-wise.
                    if priority == 0 {
                        return Some(regs);
                    }
                    // Otherwise record it and drop every lower-priority
                    // thread at this index. Surviving higher-priority
                    // threads may still extend into a better match later,
                    // in which case `best` is overwritten.
                    best = Some(regs);
                    break;
                }
                Instr::Char { c, case_insensitive } => {
                    if i < n {
                        let x = if *case_insensitive {
                            case_fold(chars[i])
                        } else {
                            chars[i]
                        };
                        if x == *c {
                            t.pc += 1;
                            t.skip = i + 1;
                            if in_next.insert((t.pc, t.skip)) {
                                next.push(t);
                            }
                        }
                    }
                }
                Instr::Literal { chars: lit, case_insensitive } => {
                    if i + lit.len() <= n {
                        let matched = lit
                            .iter()
                            .zip(&chars[i..i + lit.len()])
                            .all(|(&l, &c)| {
                                let c = if *case_insensitive {
                                    case_fold(c)
                                } else {
                                    c
                                };
                                c == l
                            });
                        if matched {
                            let skip = i + lit.len();
                            t.pc += 1;
                            t.skip = skip;
                            if in_next.insert((t.pc, t.skip)) {
                                next.push(t);
                            }
                        }
                    }
                }
                Instr::AnyChar => {
                    if i < n {
                        t.pc += 1;
                        t.skip = i + 1;
                        if in_next.insert((t.pc, t.skip)) {
                            next.push(t);
                        }
                    }
                }
                Instr::AnyCharExceptNewline => {
                    if i < n && chars[i] != '\n' {
                        t.pc += 1;
                        t.skip = i + 1;
                        if in_next.insert((t.pc, t.skip)) {
                            next.push(t);
                        }
                    }
                }
                Instr::Class { class, negated, case_insensitive } => {
                    if i < n {
                        let x = if *case_insensitive {
                            case_fold(chars[i])
                        } else {
                            chars[i]
                        };
                        if class.contains(x) != *negated {
                            t.pc += 1;
                            t.skip = i + 1;
                            if in_next.insert((t.pc, t.skip)) {
                                next.push(t);
                            }
                        }
                    }
                }
                Instr::GreedyLoop { exit, .. } => {
                    // The closure already cached a non-zero strip length.
                    let stripped = strip_cache[&(t.pc, i)];
                    t.skip = i + stripped;
                    t.pc = *exit;
                    if in_next.insert((t.pc, t.skip)) {
                        next.push(t);
                    }
                }
                _ => unreachable!("epsilon instruction escaped the closure"),
            }
        }

        mem::swap(&mut current, &mut next);
        next.clear();

        if current.is_empty() && (anchored || best.is_some()) {
            break;
        }
    }

    best
}
