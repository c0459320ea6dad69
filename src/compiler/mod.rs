/*! Compiles regular expressions into NFA bytecode.

Patterns must be compiled before they can be matched against an input. This
module implements the compiler: a single left-to-right pass over the pattern
that emits code for the NFA virtual machine using Thompson's construction,
followed by a peephole [`optimizer`] and a [`prefix`] analysis that feeds
the literal fast paths.

The compiler maintains a stack of group frames. Each frame remembers where
its alternatives start and where their trailing jumps are, so that a closing
parenthesis (or the end of the pattern, for the implicit top-level group)
can assemble the split tree that tries the alternatives in priority order.
Quantifiers work on the last parsed atom: the atom's instructions are taken
out of the program, and re-emitted one or more times with their internal
jump targets shifted to each copy's location.
*/

use rustc_hash::FxHashMap;

use crate::compiler::charset::{
    case_fold, CharsetBuilder, CLASS_DIGIT, CLASS_SPACE, CLASS_WORD,
    POSIX_CLASSES,
};
use crate::compiler::instr::{Instr, UNPATCHED};
use crate::compiler::prefix::PrefixAnalysis;

#[doc(inline)]
pub use crate::compiler::errors::Error;

pub(crate) mod charset;
pub(crate) mod instr;
pub(crate) mod prefix;

mod errors;
mod optimizer;


/// Maximum length of a group name, in code units.
pub const MAX_GROUP_NAME_LEN: usize = 32;

/// A compiler for regular expressions.
///
/// ```
/// use pyre::Compiler;
///
/// let pattern = Compiler::new().compile(r"(\w+)-(\d+)").unwrap();
/// assert_eq!(pattern.group_count(), 2);
/// ```
pub struct Compiler {
    optimize: bool,
}

impl Compiler {
    /// Creates a new compiler.
    pub fn new() -> Self {
        Self { optimize: true }
    }

    /// Enables or disables the peephole optimizer. The optimizer is enabled
    /// by default; disabling it never changes what a pattern matches, only
    /// how fast it runs.
    pub fn optimize(mut self, yes: bool) -> Self {
        self.optimize = yes;
        self
    }

    /// Compiles `pattern` into an immutable [`Pattern`].
    pub fn compile(&self, pattern: &str) -> Result<Pattern, Error> {
        let parser = PatternCompiler::new(pattern);
        let (code, named_groups, group_count, has_case_insensitive) =
            parser.compile()?;

        let code =
            if self.optimize { optimizer::optimize(code) } else { code };

        let opt = prefix::analyze(&code);

        Ok(Pattern {
            source: pattern.to_owned(),
            code,
            named_groups,
            group_count,
            has_case_insensitive,
            opt,
        })
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled pattern.
///
/// Instances are immutable once [`Compiler::compile`] returns, and can be
/// shared freely across concurrent callers; all per-match state lives in
/// the call frame of the executors.
pub struct Pattern {
    /// The pattern this program was compiled from.
    pub(crate) source: String,
    /// The NFA program.
    pub(crate) code: Vec<Instr>,
    /// Maps each group name to its group id.
    pub(crate) named_groups: FxHashMap<String, usize>,
    /// Number of capturing groups, the whole-match group excluded.
    pub(crate) group_count: usize,
    /// True if any instruction matches case-insensitively.
    #[allow(dead_code)]
    pub(crate) has_case_insensitive: bool,
    /// Literal prefix/suffix facts used by the fast paths, when the
    /// program has the required shape.
    pub(crate) opt: Option<PrefixAnalysis>,
}

impl Pattern {
    /// The pattern string this program was compiled from.
    pub fn pattern(&self) -> &str {
        &self.source
    }

    /// Number of capturing groups in the pattern, not counting group 0,
    /// the whole match.
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Returns the id of the named group `name`.
    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.named_groups.get(name).copied()
    }

    /// Iterates over `(name, group id)` pairs for the named groups.
    pub fn group_names(&self) -> impl Iterator<Item = (&str, usize)> {
        self.named_groups.iter().map(|(name, &id)| (name.as_str(), id))
    }

    /// Length of a register vector for this pattern: one start/end pair per
    /// group (the whole match included) plus the trailing `lastindex` slot.
    pub(crate) fn register_count(&self) -> usize {
        2 * (self.group_count + 1) + 1
    }

    /// Renders the compiled program, one instruction per line. Useful when
    /// debugging a pattern.
    pub fn dump(&self) -> String {
        instr::disassemble(&self.code)
    }
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("pattern", &self.source)
            .field("group_count", &self.group_count)
            .finish_non_exhaustive()
    }
}

/// Scope-dependent parsing state. The `i`, `m`, `s`, `U` and `x` flags can
/// be toggled by `(?flags)` for the remainder of the enclosing group, or by
/// `(?flags:…)` for a single group.
#[derive(Clone, Copy, Default)]
struct Flags {
    case_insensitive: bool,
    multi_line: bool,
    dot_matches_new_line: bool,
    ungreedy: bool,
    verbose: bool,
}

/// The extent of the most recently parsed atom, which is what a quantifier
/// applies to. `quantifiable` turns false once a quantifier has been
/// applied, making `a**` an error.
struct Atom {
    start: usize,
    quantifiable: bool,
}

/// A quantifier token.
enum Quantifier {
    /// `?`
    Optional,
    /// `*`
    Star,
    /// `+`
    Plus,
    /// `{n}`, `{n,}` or `{n,m}`
    Repeat(u32, Option<u32>),
}

/// Bookkeeping for an open group (or for the implicit top-level group).
struct GroupFrame {
    /// Capture id, `None` for `(?:…)`, `(?flags:…)` and the root.
    group: Option<usize>,
    /// Entry of the group as an atom: the `Save` instruction for capturing
    /// groups, the first body instruction otherwise.
    start: usize,
    /// Start of each alternative.
    branch_starts: Vec<usize>,
    /// Placeholder jumps terminating each alternative but the last.
    branch_jumps: Vec<usize>,
    /// Flags to restore when the group closes.
    saved_flags: Flags,
}

/// The single-pass parser/compiler. Consumes the pattern and produces the
/// raw (unoptimized) program.
struct PatternCompiler {
    pattern: Vec<char>,
    pos: usize,
    code: Vec<Instr>,
    frames: Vec<GroupFrame>,
    flags: Flags,
    atom: Option<Atom>,
    group_count: usize,
    named_groups: FxHashMap<String, usize>,
    has_case_insensitive: bool,
}

impl PatternCompiler {
    fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.chars().collect(),
            pos: 0,
            code: Vec::new(),
            frames: Vec::new(),
            flags: Flags::default(),
            atom: None,
            group_count: 0,
            named_groups: FxHashMap::default(),
            has_case_insensitive: false,
        }
    }

    fn compile(
        mut self,
    ) -> Result<(Vec<Instr>, FxHashMap<String, usize>, usize, bool), Error>
    {
        self.emit(Instr::Save { slot: 0 });
        self.frames.push(GroupFrame {
            group: None,
            start: 1,
            branch_starts: vec![1],
            branch_jumps: Vec::new(),
            saved_flags: self.flags,
        });

        while let Some(c) = self.bump() {
            if self.flags.verbose {
                if c.is_whitespace() {
                    continue;
                }
                if c == '#' {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                    continue;
                }
            }
            match c {
                '(' => self.open_group()?,
                ')' => self.close_group()?,
                '|' => self.start_branch(),
                '?' => self.quantifier(Quantifier::Optional)?,
                '*' => self.quantifier(Quantifier::Star)?,
                '+' => self.quantifier(Quantifier::Plus)?,
                '{' => self.repeat_or_literal_brace()?,
                '^' => {
                    let anchor = if self.flags.multi_line {
                        Instr::LineStart
                    } else {
                        Instr::Start
                    };
                    self.emit_anchor(anchor);
                }
                '$' => {
                    let anchor = if self.flags.multi_line {
                        Instr::LineEnd
                    } else {
                        Instr::End
                    };
                    self.emit_anchor(anchor);
                }
                '.' => {
                    let instr = if self.flags.dot_matches_new_line {
                        Instr::AnyChar
                    } else {
                        Instr::AnyCharExceptNewline
                    };
                    let start = self.emit(instr);
                    self.atom = Some(Atom { start, quantifiable: true });
                }
                '[' => self.parse_class()?,
                '\\' => self.parse_escape()?,
                _ => self.literal_char(c),
            }
        }

        if self.frames.len() != 1 {
            return Err(Error::bad_pattern("missing closing parenthesis"));
        }
        let mut root = self.frames.pop().unwrap();
        self.resolve_alternation(&mut root);
        self.emit(Instr::Save { slot: 1 });
        self.emit(Instr::Match);

        Ok((
            self.code,
            self.named_groups,
            self.group_count,
            self.has_case_insensitive,
        ))
    }

    // Cursor over the pattern.

    fn bump(&mut self) -> Option<char> {
        let c = self.pattern.get(self.pos).copied();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.pattern.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.pattern.get(self.pos + n).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    // Atoms.

    fn literal_char(&mut self, c: char) {
        let case_insensitive = self.flags.case_insensitive;
        let c = if case_insensitive { case_fold(c) } else { c };
        if case_insensitive {
            self.has_case_insensitive = true;
        }
        let start = self.emit(Instr::Char { c, case_insensitive });
        self.atom = Some(Atom { start, quantifiable: true });
    }

    /// Anchors and boundaries are not quantifiable, so they leave no atom
    /// behind.
    fn emit_anchor(&mut self, instr: Instr) {
        self.emit(instr);
        self.atom = None;
    }

    fn emit_predefined_class(
        &mut self,
        ranges: charset::ClassRanges,
        negated: bool,
    ) {
        let case_insensitive = self.flags.case_insensitive;
        let mut builder = CharsetBuilder::new(case_insensitive);
        builder.add_class(ranges);
        if case_insensitive {
            self.has_case_insensitive = true;
        }
        let start = self.emit(Instr::Class {
            class: Box::new(builder.build()),
            negated,
            case_insensitive,
        });
        self.atom = Some(Atom { start, quantifiable: true });
    }

    // Alternation.

    fn start_branch(&mut self) {
        let jump = self.emit(Instr::Jump { target: UNPATCHED });
        let next = self.code.len();
        let frame = self.frames.last_mut().unwrap();
        frame.branch_jumps.push(jump);
        frame.branch_starts.push(next);
        self.atom = None;
    }

    /// Turns the alternatives accumulated by a frame into a split tree that
    /// tries them in priority order (first alternative wins).
    ///
    /// The entry of the group must stay at its original position, because
    /// earlier code falls through into it, but a split tree may need more
    /// instructions than the first alternative occupies. The first
    /// alternative is therefore relocated to the end of the program
    /// (patching its internal jump targets by the move offset), its
    /// original first slot becomes a jump into the tree, and the rest of
    /// its original extent goes dead.
    fn resolve_alternation(&mut self, frame: &mut GroupFrame) {
        if frame.branch_jumps.is_empty() {
            return;
        }

        // Terminate the last alternative with the same kind of placeholder
        // jump that `|` put after the other ones.
        let last = self.emit(Instr::Jump { target: UNPATCHED });
        frame.branch_jumps.push(last);

        let first = frame.branch_starts[0];
        let first_end = frame.branch_jumps[0];

        let reloc = self.code.len();
        let delta = reloc - first;
        for pc in first..=first_end {
            let mut instr = self.code[pc].clone();
            instr.map_targets(|t| {
                if t != UNPATCHED && (first..=first_end).contains(&t) {
                    t + delta
                } else {
                    t
                }
            });
            self.code.push(instr);
        }

        // The relocated copy of the first alternative's jump is the live
        // one; the dead original still gets patched below so that no
        // placeholder survives.
        frame.branch_jumps.push(frame.branch_jumps[0]);
        frame.branch_jumps[0] = first_end + delta;

        let tree = self.code.len();
        self.code[first] = Instr::Jump { target: tree };

        let mut entries = vec![reloc];
        entries.extend_from_slice(&frame.branch_starts[1..]);
        for k in 0..entries.len() - 1 {
            let alternate = if k == entries.len() - 2 {
                entries[k + 1]
            } else {
                tree + k + 1
            };
            self.code.push(Instr::Split { preferred: entries[k], alternate });
        }

        // Every alternative converges right after the tree.
        let after = self.code.len();
        for &jump in frame.branch_jumps.iter() {
            self.code[jump] = Instr::Jump { target: after };
        }
    }

    // Groups.

    fn open_group(&mut self) -> Result<(), Error> {
        let saved_flags = self.flags;
        if !self.eat('?') {
            self.open_capturing_group(None, saved_flags);
            return Ok(());
        }
        match self.peek() {
            Some(':') => {
                self.bump();
                self.push_frame(None, saved_flags);
                Ok(())
            }
            Some('P') => {
                self.bump();
                match self.bump() {
                    Some('<') => {
                        let name = self.parse_group_name()?;
                        self.open_capturing_group(Some(name), saved_flags);
                        Ok(())
                    }
                    Some('=') => Err(Error::unsupported(
                        "backreferences `(?P=name)` are not supported",
                    )),
                    _ => Err(Error::bad_group_name("expected `<` after `(?P`")),
                }
            }
            Some('<') => {
                self.bump();
                match self.peek() {
                    Some('=') => Err(Error::unsupported(
                        "lookbehind assertions are not supported",
                    )),
                    Some('!') => Err(Error::unsupported(
                        "negative lookbehind assertions are not supported",
                    )),
                    _ => {
                        let name = self.parse_group_name()?;
                        self.open_capturing_group(Some(name), saved_flags);
                        Ok(())
                    }
                }
            }
            Some('=') => Err(Error::unsupported(
                "lookahead assertions are not supported",
            )),
            Some('!') => Err(Error::unsupported(
                "negative lookahead assertions are not supported",
            )),
            _ => self.parse_inline_flags(saved_flags),
        }
    }

    fn open_capturing_group(
        &mut self,
        name: Option<String>,
        saved_flags: Flags,
    ) {
        self.group_count += 1;
        let id = self.group_count;
        if let Some(name) = name {
            self.named_groups.insert(name, id);
        }
        let start = self.emit(Instr::Save { slot: 2 * id });
        self.push_frame_at(Some(id), start, saved_flags);
    }

    fn push_frame(&mut self, group: Option<usize>, saved_flags: Flags) {
        let start = self.code.len();
        self.push_frame_at(group, start, saved_flags);
    }

    fn push_frame_at(
        &mut self,
        group: Option<usize>,
        start: usize,
        saved_flags: Flags,
    ) {
        let body = self.code.len();
        self.frames.push(GroupFrame {
            group,
            start,
            branch_starts: vec![body],
            branch_jumps: Vec::new(),
            saved_flags,
        });
        self.atom = None;
    }

    fn close_group(&mut self) -> Result<(), Error> {
        if self.frames.len() == 1 {
            return Err(Error::bad_pattern("unbalanced parenthesis"));
        }
        let mut frame = self.frames.pop().unwrap();
        self.resolve_alternation(&mut frame);
        if let Some(id) = frame.group {
            self.emit(Instr::Save { slot: 2 * id + 1 });
        }
        self.flags = frame.saved_flags;
        self.atom = Some(Atom { start: frame.start, quantifiable: true });
        Ok(())
    }

    fn parse_group_name(&mut self) -> Result<String, Error> {
        let mut name = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Error::bad_group_name(
                        "missing `>` after group name",
                    ))
                }
                Some('>') => break,
                Some(c) => name.push(c),
            }
        }
        if name.is_empty() {
            return Err(Error::bad_group_name("empty group name"));
        }
        if name.chars().count() > MAX_GROUP_NAME_LEN {
            return Err(Error::bad_group_name(format!(
                "group name `{}` is longer than {} characters",
                name, MAX_GROUP_NAME_LEN
            )));
        }
        if self.named_groups.contains_key(&name) {
            return Err(Error::bad_group_name(format!(
                "duplicate group name `{}`",
                name
            )));
        }
        Ok(name)
    }

    fn parse_inline_flags(&mut self, saved_flags: Flags) -> Result<(), Error> {
        let mut new_flags = self.flags;
        let mut seen = 0;
        loop {
            match self.bump() {
                None => {
                    return Err(Error::bad_pattern("unterminated flags group"))
                }
                Some(')') => {
                    if seen == 0 {
                        return Err(Error::bad_pattern(
                            "missing flags in `(?…)`",
                        ));
                    }
                    // `(?flags)`: applies until the enclosing group closes.
                    self.flags = new_flags;
                    self.atom = None;
                    return Ok(());
                }
                Some(':') => {
                    // `(?flags:…)`: applies to this group only.
                    self.flags = new_flags;
                    self.push_frame(None, saved_flags);
                    return Ok(());
                }
                Some('i') => new_flags.case_insensitive = true,
                Some('m') => new_flags.multi_line = true,
                Some('s') => new_flags.dot_matches_new_line = true,
                Some('U') => new_flags.ungreedy = true,
                Some('x') => new_flags.verbose = true,
                Some(c) => {
                    return Err(Error::unsupported(format!(
                        "unknown flag `{}`",
                        c
                    )))
                }
            }
            seen += 1;
        }
    }

    // Quantifiers.

    fn quantifier(&mut self, quantifier: Quantifier) -> Result<(), Error> {
        let lazy_marker = self.eat_lazy_marker();
        let lazy = lazy_marker != self.flags.ungreedy;
        self.apply_quantifier(quantifier, lazy)
    }

    /// Consumes a trailing `?` marking the quantifier as lazy. In verbose
    /// mode the marker may be separated by whitespace.
    fn eat_lazy_marker(&mut self) -> bool {
        if self.flags.verbose {
            while self.peek().is_some_and(|c| c.is_whitespace()) {
                self.pos += 1;
            }
        }
        self.eat('?')
    }

    fn repeat_or_literal_brace(&mut self) -> Result<(), Error> {
        match self.parse_repeat_bounds()? {
            Some((min, max)) => {
                let lazy_marker = self.eat_lazy_marker();
                let lazy = lazy_marker != self.flags.ungreedy;
                self.apply_quantifier(Quantifier::Repeat(min, max), lazy)
            }
            // A `{` that does not open a repetition is an ordinary
            // character.
            None => {
                self.literal_char('{');
                Ok(())
            }
        }
    }

    /// Parses `{n}`, `{n,}`, `{,m}` or `{n,m}`. Returns `None`, consuming
    /// nothing, when there is no closing `}`; a closed brace with
    /// non-numeric bounds or `m < n` is an error.
    fn parse_repeat_bounds(
        &mut self,
    ) -> Result<Option<(u32, Option<u32>)>, Error> {
        let start = self.pos;
        let mut body = String::new();
        let mut closed = false;
        while let Some(c) = self.bump() {
            if c == '}' {
                closed = true;
                break;
            }
            body.push(c);
        }
        if !closed {
            self.pos = start;
            return Ok(None);
        }

        let parse_bound = |bound: &str| -> Result<u32, Error> {
            if bound.is_empty()
                || !bound.chars().all(|c| c.is_ascii_digit())
            {
                return Err(Error::bad_repetition(format!(
                    "invalid bound `{}` in `{{{}}}`",
                    bound, body
                )));
            }
            bound.parse().map_err(|_| {
                Error::bad_repetition(format!(
                    "bound `{}` is too large",
                    bound
                ))
            })
        };

        let parts: Vec<&str> = body.split(',').collect();
        let bounds = match *parts.as_slice() {
            [exact] => {
                let n = parse_bound(exact)?;
                (n, Some(n))
            }
            [min, max] => {
                let min =
                    if min.is_empty() { 0 } else { parse_bound(min)? };
                let max = if max.is_empty() {
                    None
                } else {
                    Some(parse_bound(max)?)
                };
                if max.is_some_and(|max| max < min) {
                    return Err(Error::bad_repetition(format!(
                        "min repeat greater than max repeat in `{{{}}}`",
                        body
                    )));
                }
                (min, max)
            }
            _ => {
                return Err(Error::bad_repetition(format!(
                    "malformed repetition `{{{}}}`",
                    body
                )))
            }
        };
        Ok(Some(bounds))
    }

    /// Re-emits the last parsed atom according to the quantifier. The
    /// atom's instructions become a template that is written back one or
    /// more times, with jump targets inside the template shifted to each
    /// copy's position.
    fn apply_quantifier(
        &mut self,
        quantifier: Quantifier,
        lazy: bool,
    ) -> Result<(), Error> {
        let atom = self
            .atom
            .take()
            .ok_or_else(|| Error::bad_repetition("nothing to repeat"))?;
        if !atom.quantifiable {
            return Err(Error::bad_repetition("multiple repeat"));
        }

        let at = atom.start;
        let template = self.code.split_off(at);
        match quantifier {
            Quantifier::Optional => self.emit_optional(&template, at, lazy),
            Quantifier::Star => self.emit_star(&template, at, lazy),
            Quantifier::Plus => self.emit_plus(&template, at, lazy),
            Quantifier::Repeat(min, max) => {
                for _ in 0..min {
                    self.emit_copy(&template, at);
                }
                match max {
                    Some(max) => {
                        for _ in 0..max - min {
                            self.emit_optional(&template, at, lazy);
                        }
                    }
                    None => self.emit_star(&template, at, lazy),
                }
            }
        }

        self.atom = Some(Atom { start: at, quantifiable: false });
        Ok(())
    }

    /// Appends a copy of the template at the current end of the program.
    /// Targets inside the template, the position one past its end
    /// included, are rebased to the copy.
    fn emit_copy(&mut self, template: &[Instr], old_base: usize) {
        let new_base = self.code.len();
        let old_end = old_base + template.len();
        for instr in template {
            let mut instr = instr.clone();
            instr.map_targets(|t| {
                if (old_base..=old_end).contains(&t) {
                    t - old_base + new_base
                } else {
                    t
                }
            });
            self.code.push(instr);
        }
    }

    fn split_instr(body: usize, skip: usize, lazy: bool) -> Instr {
        if lazy {
            Instr::Split { preferred: skip, alternate: body }
        } else {
            Instr::Split { preferred: body, alternate: skip }
        }
    }

    /// `X?` → `Split(body, skip)`, preferring the body when greedy.
    fn emit_optional(
        &mut self,
        template: &[Instr],
        old_base: usize,
        lazy: bool,
    ) {
        let split = self.code.len();
        let body = split + 1;
        let skip = split + 1 + template.len();
        self.code.push(Self::split_instr(body, skip, lazy));
        self.emit_copy(template, old_base);
    }

    /// `X*` → entry split, body, trailing split back to the body. Both
    /// splits prefer the body when greedy, the exit when lazy.
    fn emit_star(&mut self, template: &[Instr], old_base: usize, lazy: bool) {
        let split = self.code.len();
        let body = split + 1;
        let after = split + 2 + template.len();
        self.code.push(Self::split_instr(body, after, lazy));
        self.emit_copy(template, old_base);
        self.code.push(Self::split_instr(body, after, lazy));
    }

    /// `X+` → body, trailing split back to the body.
    fn emit_plus(&mut self, template: &[Instr], old_base: usize, lazy: bool) {
        let body = self.code.len();
        self.emit_copy(template, old_base);
        let after = self.code.len() + 1;
        self.code.push(Self::split_instr(body, after, lazy));
    }

    // Escapes.

    fn parse_escape(&mut self) -> Result<(), Error> {
        let c = self.bump().ok_or_else(|| {
            Error::bad_pattern("pattern ends with a bare backslash")
        })?;
        match c {
            'd' => self.emit_predefined_class(CLASS_DIGIT, false),
            'D' => self.emit_predefined_class(CLASS_DIGIT, true),
            'w' => self.emit_predefined_class(CLASS_WORD, false),
            'W' => self.emit_predefined_class(CLASS_WORD, true),
            's' => self.emit_predefined_class(CLASS_SPACE, false),
            'S' => self.emit_predefined_class(CLASS_SPACE, true),
            'b' => self.emit_anchor(Instr::WordBoundary),
            'B' => self.emit_anchor(Instr::WordBoundaryNeg),
            'A' => self.emit_anchor(Instr::Start),
            'z' => self.emit_anchor(Instr::End),
            'Q' => self.quoted_run(),
            // A stray `\E` with no opening `\Q` is ignored.
            'E' => {}
            'n' => self.literal_char('\n'),
            'r' => self.literal_char('\r'),
            't' => self.literal_char('\t'),
            'f' => self.literal_char('\x0c'),
            'v' => self.literal_char('\x0b'),
            'a' => self.literal_char('\x07'),
            'x' => {
                let c = self.parse_hex_escape()?;
                self.literal_char(c);
            }
            'u' => {
                let c = self.parse_fixed_hex(4)?;
                self.literal_char(c);
            }
            'U' => {
                let c = self.parse_fixed_hex(8)?;
                self.literal_char(c);
            }
            '0'..='7' => {
                let c = self.parse_octal(c)?;
                self.literal_char(c);
            }
            '8' | '9' => {
                return Err(Error::bad_escape(format!(
                    "invalid escape `\\{}`",
                    c
                )))
            }
            c if c.is_alphanumeric() => {
                return Err(Error::bad_escape(format!(
                    "unknown escape `\\{}`",
                    c
                )))
            }
            c => self.literal_char(c),
        }
        Ok(())
    }

    /// `\Q…\E`: every character up to `\E` (or the end of the pattern) is
    /// a literal.
    fn quoted_run(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\\' && self.peek() == Some('E') {
                self.bump();
                return;
            }
            self.literal_char(c);
        }
    }

    /// `\xHH` or `\x{HHHH}`, the braced form truncated to one code unit.
    fn parse_hex_escape(&mut self) -> Result<char, Error> {
        if self.eat('{') {
            let mut digits = String::new();
            loop {
                match self.bump() {
                    None => {
                        return Err(Error::bad_escape(
                            "unterminated `\\x{…}` escape",
                        ))
                    }
                    Some('}') => break,
                    Some(c) => digits.push(c),
                }
            }
            if digits.is_empty()
                || digits.len() > 6
                || !digits.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(Error::bad_escape(format!(
                    "invalid hex escape `\\x{{{}}}`",
                    digits
                )));
            }
            let value = u32::from_str_radix(&digits, 16).unwrap();
            return char::from_u32(value).ok_or_else(|| {
                Error::bad_escape(format!(
                    "hex escape `\\x{{{}}}` is out of range",
                    digits
                ))
            });
        }
        let mut value = 0;
        for _ in 0..2 {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| {
                    Error::bad_escape("`\\x` needs two hex digits")
                })?;
            value = value * 16 + digit;
        }
        Ok(char::from_u32(value).unwrap())
    }

    /// `\uHHHH` or `\UHHHHHHHH`.
    fn parse_fixed_hex(&mut self, len: u32) -> Result<char, Error> {
        let mut value: u32 = 0;
        for _ in 0..len {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| {
                    Error::bad_escape(format!(
                        "unicode escape needs {} hex digits",
                        len
                    ))
                })?;
            value = value
                .checked_mul(16)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| {
                    Error::bad_escape("unicode escape is out of range")
                })?;
        }
        char::from_u32(value).ok_or_else(|| {
            Error::bad_escape(format!(
                "unicode escape `{:x}` is out of range",
                value
            ))
        })
    }

    /// Up to three octal digits, `\377` at most.
    fn parse_octal(&mut self, first: char) -> Result<char, Error> {
        let mut value = first.to_digit(8).unwrap();
        for _ in 0..2 {
            match self.peek().and_then(|c| c.to_digit(8)) {
                Some(digit) => {
                    self.bump();
                    value = value * 8 + digit;
                }
                None => break,
            }
        }
        if value > 0o377 {
            return Err(Error::bad_escape(format!(
                "octal escape `\\{:o}` is out of range",
                value
            )));
        }
        Ok(char::from_u32(value).unwrap())
    }

    // Character classes.

    fn parse_class(&mut self) -> Result<(), Error> {
        let case_insensitive = self.flags.case_insensitive;
        let negated = self.eat('^');
        let mut builder = CharsetBuilder::new(case_insensitive);
        let mut first = true;
        loop {
            let c = self.bump().ok_or_else(|| {
                Error::bad_pattern("unterminated character class")
            })?;
            if c == ']' && !first {
                break;
            }
            first = false;

            if c == '[' && self.peek() == Some(':') {
                self.parse_posix_class(&mut builder)?;
                continue;
            }

            // An escape may contribute a whole class instead of a single
            // character; classes cannot form ranges.
            let lo = if c == '\\' {
                match self.parse_class_escape(&mut builder)? {
                    Some(c) => c,
                    None => continue,
                }
            } else {
                c
            };

            if self.peek() == Some('-')
                && self.peek_at(1).is_some_and(|c| c != ']')
            {
                self.bump();
                let hi = match self.bump().unwrap() {
                    '\\' => match self.parse_class_escape(&mut builder)? {
                        Some(c) => c,
                        None => {
                            return Err(Error::bad_pattern(
                                "bad character range",
                            ))
                        }
                    },
                    c => c,
                };
                if (hi as u32) < (lo as u32) {
                    return Err(Error::bad_pattern(format!(
                        "bad character range `{}-{}`",
                        lo, hi
                    )));
                }
                builder.add_range(lo, hi);
            } else {
                builder.add_char(lo);
            }
        }

        if case_insensitive {
            self.has_case_insensitive = true;
        }
        let start = self.emit(Instr::Class {
            class: Box::new(builder.build()),
            negated,
            case_insensitive,
        });
        self.atom = Some(Atom { start, quantifiable: true });
        Ok(())
    }

    /// `[:name:]` or `[:^name:]` inside a bracket expression. The leading
    /// `[` has been consumed already.
    fn parse_posix_class(
        &mut self,
        builder: &mut CharsetBuilder,
    ) -> Result<(), Error> {
        self.bump(); // the ':'
        let negated = self.eat('^');
        let mut name = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(Error::bad_pattern(
                        "unterminated POSIX class",
                    ))
                }
                Some(':') => {
                    if self.eat(']') {
                        break;
                    }
                    return Err(Error::bad_pattern(
                        "malformed POSIX class",
                    ));
                }
                Some(c) => name.push(c),
            }
        }
        let ranges = *POSIX_CLASSES.get(name.as_str()).ok_or_else(|| {
            Error::bad_pattern(format!("unknown POSIX class `{}`", name))
        })?;
        if negated {
            builder.add_negated_class(ranges);
        } else {
            builder.add_class(ranges);
        }
        Ok(())
    }

    /// An escape inside a bracket expression. Returns the escaped
    /// character, or `None` when the escape contributed a class (or, for
    /// `\D`, `\W` and `\S`, nothing at all).
    fn parse_class_escape(
        &mut self,
        builder: &mut CharsetBuilder,
    ) -> Result<Option<char>, Error> {
        let c = self.bump().ok_or_else(|| {
            Error::bad_pattern("unterminated character class")
        })?;
        match c {
            'd' => {
                builder.add_class(CLASS_DIGIT);
                Ok(None)
            }
            'w' => {
                builder.add_class(CLASS_WORD);
                Ok(None)
            }
            's' => {
                builder.add_class(CLASS_SPACE);
                Ok(None)
            }
            // Negated classes contribute an empty set inside a bracket
            // expression.
            'D' | 'W' | 'S' => Ok(None),
            'n' => Ok(Some('\n')),
            'r' => Ok(Some('\r')),
            't' => Ok(Some('\t')),
            'f' => Ok(Some('\x0c')),
            'v' => Ok(Some('\x0b')),
            'a' => Ok(Some('\x07')),
            // Inside a bracket expression `\b` is a backspace.
            'b' => Ok(Some('\x08')),
            'x' => Ok(Some(self.parse_hex_escape()?)),
            'u' => Ok(Some(self.parse_fixed_hex(4)?)),
            'U' => Ok(Some(self.parse_fixed_hex(8)?)),
            '0'..='7' => Ok(Some(self.parse_octal(c)?)),
            '8' | '9' => Err(Error::bad_escape(format!(
                "invalid escape `\\{}` in character class",
                c
            ))),
            c if c.is_alphanumeric() => Err(Error::bad_escape(format!(
                "unknown escape `\\{}` in character class",
                c
            ))),
            c => Ok(Some(c)),
        }
    }
}
