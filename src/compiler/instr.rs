/*!
This module defines the instructions executed by the NFA virtual machine.

Each instruction is a variant of the [`Instr`] enum carrying exactly the
fields it needs. Consuming instructions (`Char`, `Literal`, `Class`, the
`Any*` variants and `GreedyLoop`) read one or more code units from the
input; the remaining ones are epsilon transitions that the VM resolves
while computing epsilon closures.
*/

use std::fmt::{Display, Formatter};

use crate::compiler::charset::Charset;

/// Placeholder for a jump target that has not been back-patched yet. The
/// compiler guarantees that no placeholder survives compilation.
pub(crate) const UNPATCHED: usize = usize::MAX;

/// An instruction for the NFA virtual machine.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Instr {
    /// Matches a single code unit. When `case_insensitive` is true, `c` is
    /// stored pre-lowercased and compared against the lowercased input.
    Char { c: char, case_insensitive: bool },

    /// Matches a literal run of code units. Produced by the optimizer by
    /// folding consecutive `Char` instructions.
    Literal { chars: Vec<char>, case_insensitive: bool },

    /// Matches any code unit, including `\n`. Produced by `.` under the
    /// `s` flag.
    AnyChar,

    /// Matches any code unit except `\n`.
    AnyCharExceptNewline,

    /// Matches a code unit contained (or, when `negated`, not contained) in
    /// the given character set.
    Class { class: Box<Charset>, negated: bool, case_insensitive: bool },

    /// Stores the current input index into capture register `slot`.
    Save { slot: usize },

    /// Non-deterministic branch. `preferred` is tried before `alternate`,
    /// which is how greedy vs. lazy preferences are encoded.
    Split { preferred: usize, alternate: usize },

    /// Unconditional jump.
    Jump { target: usize },

    /// A match has been found.
    Match,

    /// Matches at the start of the input (`\A`, or `^` outside of
    /// multi-line mode).
    Start,

    /// Matches at the end of the input (`\z`, or `$` outside of multi-line
    /// mode).
    End,

    /// Matches at the start of the input or right after a `\n`.
    LineStart,

    /// Matches at the end of the input or right before a `\n`.
    LineEnd,

    /// Matches at an ASCII word boundary.
    WordBoundary,

    /// Matches everywhere but at an ASCII word boundary.
    WordBoundaryNeg,

    /// Consumes as many code units contained in `class` as possible and
    /// continues at `exit`. The optimizer produces this instruction only
    /// for loops whose body is disjoint from their continuation, where the
    /// maximal munch is the only viable behavior.
    GreedyLoop { class: Box<Charset>, exit: usize, case_insensitive: bool },
}

impl Instr {
    /// Applies `f` to every jump target carried by the instruction. Used
    /// when instructions are cloned to a different location and when the
    /// optimizer renumbers the program.
    pub(crate) fn map_targets<F: FnMut(usize) -> usize>(&mut self, mut f: F) {
        match self {
            Instr::Split { preferred, alternate } => {
                *preferred = f(*preferred);
                *alternate = f(*alternate);
            }
            Instr::Jump { target } => *target = f(*target),
            Instr::GreedyLoop { exit, .. } => *exit = f(*exit),
            _ => {}
        }
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Instr::Char { c, case_insensitive } => {
                write!(f, "char {:?}{}", c, if *case_insensitive { " (i)" } else { "" })
            }
            Instr::Literal { chars, case_insensitive } => {
                let s: String = chars.iter().collect();
                write!(f, "literal {:?}{}", s, if *case_insensitive { " (i)" } else { "" })
            }
            Instr::AnyChar => write!(f, "any"),
            Instr::AnyCharExceptNewline => write!(f, "any_no_nl"),
            Instr::Class { negated, case_insensitive, .. } => {
                write!(
                    f,
                    "class{}{}",
                    if *negated { " negated" } else { "" },
                    if *case_insensitive { " (i)" } else { "" }
                )
            }
            Instr::Save { slot } => write!(f, "save {}", slot),
            Instr::Split { preferred, alternate } => {
                write!(f, "split {}, {}", preferred, alternate)
            }
            Instr::Jump { target } => write!(f, "jump {}", target),
            Instr::Match => write!(f, "match"),
            Instr::Start => write!(f, "start"),
            Instr::End => write!(f, "end"),
            Instr::LineStart => write!(f, "line_start"),
            Instr::LineEnd => write!(f, "line_end"),
            Instr::WordBoundary => write!(f, "word_boundary"),
            Instr::WordBoundaryNeg => write!(f, "word_boundary_neg"),
            Instr::GreedyLoop { exit, case_insensitive, .. } => {
                write!(
                    f,
                    "greedy_loop exit {}{}",
                    exit,
                    if *case_insensitive { " (i)" } else { "" }
                )
            }
        }
    }
}

/// Renders a program as one instruction per line, prefixed with its
/// position. Useful for debugging and for golden tests.
pub(crate) fn disassemble(code: &[Instr]) -> String {
    code.iter()
        .enumerate()
        .map(|(pc, instr)| format!("{:03}: {}", pc, instr))
        .collect::<Vec<_>>()
        .join("\n")
}
