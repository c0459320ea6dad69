/*!
Peephole optimizations over the compiled program.

Three passes, each preserving match semantics exactly:

1. disjoint quantifier loops over a single character or a simple set are
   rewritten as a [`GreedyLoop`](Instr::GreedyLoop) that strips the whole
   run at once;
2. runs of consecutive `Char` instructions are folded into a single
   `Literal`;
3. chains of jumps are threaded so that no surviving target lands on
   another jump.

The first two passes delete instructions, so they renumber the program
through an old-to-new position map applied to every jump-bearing
instruction.
*/

use rustc_hash::FxHashSet;

use crate::compiler::charset::{case_fold, Charset};
use crate::compiler::instr::Instr;

/// Upper bound for the jump-threading pass, so that a cycle of jumps in a
/// malformed program cannot spin forever.
const MAX_THREADING_PASSES: usize = 100;

pub(crate) fn optimize(code: Vec<Instr>) -> Vec<Instr> {
    let code = collapse_disjoint_loops(code);
    let code = fold_literal_runs(code);
    thread_jumps(code)
}

/// The character set a loop body matches, when the body is eligible for
/// the greedy-loop rewrite: a `Char`, or a simple non-negated `Class`.
fn loop_body_class(instr: &Instr) -> Option<(Charset, bool)> {
    match instr {
        Instr::Char { c, case_insensitive } => {
            Some((Charset::singleton(*c), *case_insensitive))
        }
        Instr::Class { class, negated: false, case_insensitive }
            if class.is_simple() && !class.is_empty() =>
        {
            Some((class.as_ref().clone(), *case_insensitive))
        }
        _ => None,
    }
}

/// The first effective instruction at `pc`, reached by skipping register
/// saves and threading jumps. Saves are epsilon transitions, so they do
/// not affect disjointness.
fn continuation(code: &[Instr], mut pc: usize) -> Option<&Instr> {
    for _ in 0..code.len() {
        match &code[pc] {
            Instr::Save { .. } => pc += 1,
            Instr::Jump { target } => pc = *target,
            instr => return Some(instr),
        }
    }
    None
}

/// Can the loop body match `c`, a character that a continuation
/// instruction matches literally? `c_folded` says whether `c` comes from a
/// case-insensitive instruction, and is therefore already folded and
/// stands for every character folding into it.
fn body_matches_literal(
    class: &Charset,
    class_ci: bool,
    c: char,
    c_folded: bool,
) -> bool {
    if c_folded {
        if class_ci {
            class.contains(c)
        } else {
            class.flat_members().chars().any(|m| case_fold(m) == c)
        }
    } else {
        class.contains(if class_ci { case_fold(c) } else { c })
    }
}

/// Is the loop disjoint from its continuation? Disjointness guarantees
/// that the maximal strip is the only viable behavior, for greedy and lazy
/// loops alike, with one exception: a lazy loop whose continuation is
/// `Match` legitimately stops at zero length and must not be rewritten.
fn loop_is_disjoint(
    class: &Charset,
    class_ci: bool,
    continuation: &Instr,
    greedy: bool,
) -> bool {
    match continuation {
        Instr::Match => greedy,
        Instr::End => true,
        Instr::LineEnd => !body_matches_literal(class, class_ci, '\n', false),
        Instr::Char { c, case_insensitive } => {
            !body_matches_literal(class, class_ci, *c, *case_insensitive)
        }
        _ => false,
    }
}

/// Is `instr` the loop-back edge of a `X*` construct whose entry split
/// sits at `split_pc` with its body at `body_pc`?
fn is_loop_back(
    instr: &Instr,
    split_pc: usize,
    body_pc: usize,
    exit: usize,
) -> bool {
    match instr {
        Instr::Jump { target } => *target == split_pc || *target == body_pc,
        Instr::Split { preferred, alternate } => {
            let back = |t: usize| t == split_pc || t == body_pc;
            (back(*preferred) && *alternate == exit)
                || (back(*alternate) && *preferred == exit)
        }
        _ => false,
    }
}

/// Rewrites disjoint quantifier loops.
///
/// Two shapes are recognized. The `X*` shape, where the three instructions
/// collapse into one:
///
/// ```text
///   split body, exit        greedy_loop exit
///   <single-instr body>  →
///   split body, exit
/// ```
///
/// and the `X+` shape, where the mandatory first iteration stays in place:
///
/// ```text
///   <single-instr body>      <single-instr body>
///   split body, exit      →  greedy_loop exit
/// ```
fn collapse_disjoint_loops(code: Vec<Instr>) -> Vec<Instr> {
    let mut code = code;
    let len = code.len();
    let mut removed = vec![false; len];
    let mut changed = false;

    for pc in 0..len {
        if removed[pc] {
            continue;
        }
        // `X*`: entry split at `pc`, body at `pc + 1`, loop-back at
        // `pc + 2`.
        if pc + 2 < len {
            let entry = match &code[pc] {
                Instr::Split { preferred, alternate } => {
                    Some((*preferred, *alternate))
                }
                _ => None,
            };
            if let Some((preferred, alternate)) = entry {
                let body_exit = if preferred == pc + 1 {
                    Some((alternate, true))
                } else if alternate == pc + 1 {
                    Some((preferred, false))
                } else {
                    None
                };
                if let Some((exit, greedy)) = body_exit {
                    if let Some((class, case_insensitive)) =
                        loop_body_class(&code[pc + 1])
                    {
                        let shape_ok = is_loop_back(
                            &code[pc + 2],
                            pc,
                            pc + 1,
                            exit,
                        );
                        let disjoint = continuation(&code, exit)
                            .is_some_and(|cont| {
                                loop_is_disjoint(
                                    &class,
                                    case_insensitive,
                                    cont,
                                    greedy,
                                )
                            });
                        if shape_ok && disjoint {
                            code[pc] = Instr::GreedyLoop {
                                class: Box::new(class),
                                exit,
                                case_insensitive,
                            };
                            removed[pc + 1] = true;
                            removed[pc + 2] = true;
                            changed = true;
                            continue;
                        }
                    }
                }
            }
        }
        // `X+`: body at `pc`, loop-back split at `pc + 1`.
        if pc + 1 < len && !removed[pc + 1] {
            if let Some((class, case_insensitive)) = loop_body_class(&code[pc])
            {
                let back = match &code[pc + 1] {
                    Instr::Split { preferred, alternate } => {
                        Some((*preferred, *alternate))
                    }
                    _ => None,
                };
                if let Some((preferred, alternate)) = back {
                    let exit_greedy = if preferred == pc {
                        Some((alternate, true))
                    } else if alternate == pc {
                        Some((preferred, false))
                    } else {
                        None
                    };
                    if let Some((exit, greedy)) = exit_greedy {
                        let disjoint = continuation(&code, exit)
                            .is_some_and(|cont| {
                                loop_is_disjoint(
                                    &class,
                                    case_insensitive,
                                    cont,
                                    greedy,
                                )
                            });
                        if disjoint {
                            code[pc + 1] = Instr::GreedyLoop {
                                class: Box::new(class),
                                exit,
                                case_insensitive,
                            };
                        }
                    }
                }
            }
        }
    }

    if !changed {
        return code;
    }
    renumber(code, &removed)
}

/// Folds runs of `Char` instructions with the same case sensitivity into a
/// single `Literal`, provided no instruction targets the middle of the
/// run.
fn fold_literal_runs(code: Vec<Instr>) -> Vec<Instr> {
    let mut targets: FxHashSet<usize> = FxHashSet::default();
    for instr in &code {
        let mut probe = instr.clone();
        probe.map_targets(|t| {
            targets.insert(t);
            t
        });
    }

    let len = code.len();
    let mut new_code: Vec<Instr> = Vec::with_capacity(len);
    let mut map = vec![0usize; len + 1];
    let mut pc = 0;
    while pc < len {
        map[pc] = new_code.len();
        if let Instr::Char { c, case_insensitive } = &code[pc] {
            let case_insensitive = *case_insensitive;
            let mut run = vec![*c];
            let mut end = pc + 1;
            while end < len && !targets.contains(&end) {
                match &code[end] {
                    Instr::Char { c, case_insensitive: ci }
                        if *ci == case_insensitive =>
                    {
                        run.push(*c);
                        map[end] = new_code.len();
                        end += 1;
                    }
                    _ => break,
                }
            }
            if run.len() >= 2 {
                new_code.push(Instr::Literal { chars: run, case_insensitive });
                pc = end;
                continue;
            }
        }
        new_code.push(code[pc].clone());
        pc += 1;
    }
    map[len] = new_code.len();

    for instr in new_code.iter_mut() {
        instr.map_targets(|t| map[t]);
    }
    new_code
}

/// Threads `jump → jump` chains, bounded by [`MAX_THREADING_PASSES`].
/// Every pass shortens each chain by one hop; cycles (only reachable from
/// malformed programs) stall on the self-jump check and the pass limit.
fn thread_jumps(code: Vec<Instr>) -> Vec<Instr> {
    let mut code = code;
    for _ in 0..MAX_THREADING_PASSES {
        let resolved: Vec<usize> = (0..code.len())
            .map(|t| match &code[t] {
                Instr::Jump { target } if *target != t => *target,
                _ => t,
            })
            .collect();
        let mut changed = false;
        for instr in code.iter_mut() {
            instr.map_targets(|t| {
                if resolved[t] != t {
                    changed = true;
                }
                resolved[t]
            });
        }
        if !changed {
            break;
        }
    }
    code
}

/// Rebuilds the program without the instructions marked `removed`,
/// remapping every target. Removed positions map to the first following
/// kept instruction; nothing in a well-formed program targets them.
fn renumber(code: Vec<Instr>, removed: &[bool]) -> Vec<Instr> {
    let mut map = vec![0usize; code.len() + 1];
    let mut new_code: Vec<Instr> = Vec::with_capacity(code.len());
    for (pc, instr) in code.into_iter().enumerate() {
        map[pc] = new_code.len();
        if !removed[pc] {
            new_code.push(instr);
        }
    }
    let map_last = map.len() - 1;
    map[map_last] = new_code.len();

    for instr in new_code.iter_mut() {
        instr.map_targets(|t| map[t]);
    }
    new_code
}
