/*!
Character sets used by class instructions and greedy loops.

A [`Charset`] is built once at compile time by a [`CharsetBuilder`] and is
immutable afterwards. Sets keep a 256-bit bitmap that answers membership
for every code unit below 256 in O(1); code units above that threshold are
answered from the expanded member set, from the unexpanded ranges, or from
the negated POSIX classes.
*/

use bitvec::prelude::*;
use lazy_static::lazy_static;
use rustc_hash::{FxHashMap, FxHashSet};

/// Ranges above this size are not expanded into individual members and are
/// kept as `(lo, hi)` pairs instead.
const RANGE_EXPANSION_LIMIT: u32 = 512;

/// A set of code-unit ranges describing a character class. All the
/// predefined classes are ASCII-only.
pub(crate) type ClassRanges = &'static [(char, char)];

pub(crate) static CLASS_DIGIT: ClassRanges = &[('0', '9')];

pub(crate) static CLASS_WORD: ClassRanges =
    &[('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z')];

// \t \n \v \f \r and the space character.
pub(crate) static CLASS_SPACE: ClassRanges = &[('\t', '\r'), (' ', ' ')];

static CLASS_ALPHA: ClassRanges = &[('A', 'Z'), ('a', 'z')];
static CLASS_ALNUM: ClassRanges = &[('0', '9'), ('A', 'Z'), ('a', 'z')];
static CLASS_UPPER: ClassRanges = &[('A', 'Z')];
static CLASS_LOWER: ClassRanges = &[('a', 'z')];
static CLASS_BLANK: ClassRanges = &[('\t', '\t'), (' ', ' ')];
static CLASS_CNTRL: ClassRanges = &[('\x00', '\x1f'), ('\x7f', '\x7f')];
static CLASS_GRAPH: ClassRanges = &[('!', '~')];
static CLASS_PRINT: ClassRanges = &[(' ', '~')];
static CLASS_PUNCT: ClassRanges =
    &[('!', '/'), (':', '@'), ('[', '`'), ('{', '~')];
static CLASS_XDIGIT: ClassRanges = &[('0', '9'), ('A', 'F'), ('a', 'f')];
static CLASS_ASCII: ClassRanges = &[('\x00', '\x7f')];

lazy_static! {
    /// POSIX classes recognized inside bracket expressions, for example
    /// `[[:alpha:]]`.
    pub(crate) static ref POSIX_CLASSES: FxHashMap<&'static str, ClassRanges> = {
        let mut classes = FxHashMap::default();
        classes.insert("alpha", CLASS_ALPHA);
        classes.insert("digit", CLASS_DIGIT);
        classes.insert("alnum", CLASS_ALNUM);
        classes.insert("upper", CLASS_UPPER);
        classes.insert("lower", CLASS_LOWER);
        classes.insert("space", CLASS_SPACE);
        classes.insert("blank", CLASS_BLANK);
        classes.insert("cntrl", CLASS_CNTRL);
        classes.insert("graph", CLASS_GRAPH);
        classes.insert("print", CLASS_PRINT);
        classes.insert("punct", CLASS_PUNCT);
        classes.insert("xdigit", CLASS_XDIGIT);
        classes.insert("word", CLASS_WORD);
        classes.insert("ascii", CLASS_ASCII);
        classes
    };
}

/// Lowercases a code unit, keeping only the first scalar of multi-scalar
/// case mappings. Case-insensitive instructions store their members
/// pre-folded and the VM folds the input before comparing.
#[inline]
pub(crate) fn case_fold(c: char) -> char {
    if c.is_ascii() {
        c.to_ascii_lowercase()
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

#[inline]
fn in_ranges(ranges: ClassRanges, c: char) -> bool {
    ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi)
}

/// An immutable, searchable set of code units.
#[derive(Clone, Debug, PartialEq, Default)]
pub(crate) struct Charset {
    /// Individually tracked members, including every character of the
    /// expanded ranges.
    members: FxHashSet<char>,
    /// Ranges too large to expand.
    ranges: Vec<(char, char)>,
    /// Negated POSIX classes; a code unit that is *not* in one of these
    /// classes belongs to the set.
    negated_classes: Vec<ClassRanges>,
    /// Membership bitmap for code units below 256. This is exact: every
    /// contribution, including the ASCII portion of unexpanded ranges and
    /// of negated classes, is baked into it.
    ascii: BitArr!(for 256),
    /// All the expanded members, flattened. Only meaningful when the set
    /// is simple.
    flat: String,
}

impl Charset {
    /// Returns true if `c` belongs to the set.
    pub(crate) fn contains(&self, c: char) -> bool {
        if (c as u32) < 256 {
            return self.ascii[c as usize];
        }
        self.members.contains(&c)
            || self.ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi)
            || self.negated_classes.iter().any(|cls| !in_ranges(cls, c))
    }

    /// Returns true if the set is fully described by its bitmap and flat
    /// member string, which enables the optimizer's disjointness test and
    /// the strip fast paths.
    pub(crate) fn is_simple(&self) -> bool {
        self.ranges.is_empty() && self.negated_classes.is_empty()
    }

    /// Returns true if nothing can ever match the set.
    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
            && self.ranges.is_empty()
            && self.negated_classes.is_empty()
    }

    /// The expanded members of the set. Exhaustive only for simple sets.
    pub(crate) fn flat_members(&self) -> &str {
        &self.flat
    }

    /// Number of code units consumed by stripping members of this set from
    /// the front of `chars`. Pass the case-insensitive flag of the
    /// instruction owning the set.
    pub(crate) fn strip_prefix_len(
        &self,
        chars: &[char],
        case_insensitive: bool,
    ) -> usize {
        chars
            .iter()
            .take_while(|&&c| {
                self.contains(if case_insensitive { case_fold(c) } else { c })
            })
            .count()
    }

    /// Like [`Charset::strip_prefix_len`], but stripping backwards from the
    /// end of `chars`.
    pub(crate) fn strip_suffix_len(
        &self,
        chars: &[char],
        case_insensitive: bool,
    ) -> usize {
        chars
            .iter()
            .rev()
            .take_while(|&&c| {
                self.contains(if case_insensitive { case_fold(c) } else { c })
            })
            .count()
    }

    /// Builds a single-member set. Used when the optimizer rewrites a
    /// `Char` loop body as a greedy loop.
    pub(crate) fn singleton(c: char) -> Self {
        let mut builder = CharsetBuilder::new(false);
        builder.add_char(c);
        builder.build()
    }
}

/// Accumulates the contents of a bracket expression (or of a predefined
/// class) into a [`Charset`].
pub(crate) struct CharsetBuilder {
    set: Charset,
    case_insensitive: bool,
}

impl CharsetBuilder {
    pub(crate) fn new(case_insensitive: bool) -> Self {
        Self { set: Charset::default(), case_insensitive }
    }

    /// Adds a single code unit, folding it when the builder is
    /// case-insensitive.
    pub(crate) fn add_char(&mut self, c: char) {
        let c = if self.case_insensitive { case_fold(c) } else { c };
        if (c as u32) < 256 {
            self.set.ascii.set(c as usize, true);
        }
        if self.set.members.insert(c) {
            self.set.flat.push(c);
        }
    }

    /// Adds a range of code units. Ranges spanning at most
    /// [`RANGE_EXPANSION_LIMIT`] code points are expanded into individual
    /// members; larger ones are stored as-is.
    pub(crate) fn add_range(&mut self, lo: char, hi: char) {
        let (lo_u, hi_u) = (lo as u32, hi as u32);
        if hi_u - lo_u < RANGE_EXPANSION_LIMIT {
            for c in (lo_u..=hi_u).filter_map(char::from_u32) {
                self.add_char(c);
            }
            return;
        }
        // The ASCII portion of an unexpanded range still goes into the
        // bitmap so that sub-256 lookups remain exact.
        for c in lo_u..=hi_u.min(255) {
            self.set.ascii.set(c as usize, true);
        }
        self.set.ranges.push((lo, hi));
    }

    /// Adds every range of a predefined or POSIX class.
    pub(crate) fn add_class(&mut self, ranges: ClassRanges) {
        for &(lo, hi) in ranges {
            self.add_range(lo, hi);
        }
    }

    /// Adds a negated POSIX class like `[[:^alpha:]]`: any code unit not
    /// in the class belongs to the set.
    pub(crate) fn add_negated_class(&mut self, ranges: ClassRanges) {
        for c in 0..256u32 {
            let c = char::from_u32(c).unwrap();
            if !in_ranges(ranges, c) {
                self.set.ascii.set(c as usize, true);
            }
        }
        self.set.negated_classes.push(ranges);
    }

    pub(crate) fn build(self) -> Charset {
        self.set
    }
}
