/*!
Match objects and the executors that produce them.

[`Pattern`] exposes the three core executors (`search`, `match_at`,
`fullmatch`) plus the conveniences built on top of them (`find_iter`,
`findall`, `sub`, `subn`, `split`). All of them decode the input into a
code-unit sequence once, consult the literal fast paths when the pattern
qualifies, and fall back to the general VM otherwise.

A [`Match`] presents the register vector of a successful match: group
text, spans, named-group lookups and the `lastindex`/`lastgroup`
bookkeeping. Spans and positions are indices into the code-unit sequence,
not byte offsets.
*/

use std::fmt;

use rustc_hash::FxHashMap;

use crate::compiler::{Error, Pattern};
use crate::fast::{self, FastResult};
use crate::pikevm;
use crate::template::Template;

impl Pattern {
    /// Scans `text` from `start` (a code-unit index) for the leftmost
    /// match.
    pub fn search<'r, 't>(
        &'r self,
        text: &'t str,
        start: usize,
    ) -> Option<Match<'r, 't>> {
        self.execute(text, start, false, false)
    }

    /// Matches only at `start`.
    pub fn match_at<'r, 't>(
        &'r self,
        text: &'t str,
        start: usize,
    ) -> Option<Match<'r, 't>> {
        self.execute(text, start, true, false)
    }

    /// Matches the whole remainder of `text`, from `start` to the end.
    pub fn fullmatch<'r, 't>(
        &'r self,
        text: &'t str,
        start: usize,
    ) -> Option<Match<'r, 't>> {
        self.execute(text, start, true, true)
    }

    /// Does the pattern match anywhere in `text`?
    pub fn is_match(&self, text: &str) -> bool {
        self.search(text, 0).is_some()
    }

    fn execute<'r, 't>(
        &'r self,
        text: &'t str,
        start: usize,
        anchored: bool,
        require_end: bool,
    ) -> Option<Match<'r, 't>> {
        let chars: Vec<char> = text.chars().collect();
        let pos = start.min(chars.len());
        let endpos = chars.len();
        let regs = self.exec_chars(&chars, pos, anchored, require_end, true)?;
        Some(Match { pattern: self, text, regs, pos, endpos })
    }

    /// Runs the executors over an already decoded input. `allow_fast`
    /// exists so that equivalence tests can force the general VM.
    pub(crate) fn exec_chars(
        &self,
        chars: &[char],
        start: usize,
        anchored: bool,
        require_end: bool,
        allow_fast: bool,
    ) -> Option<Vec<isize>> {
        if allow_fast {
            if let Some(opt) = &self.opt {
                let result = if anchored {
                    fast::match_at(opt, chars, start, require_end)
                } else {
                    fast::search(opt, chars, start)
                };
                match result {
                    FastResult::Matched(regs) => return Some(regs),
                    FastResult::NoMatch => return None,
                    FastResult::Fallback => {}
                }
            }
        }
        pikevm::run(self, chars, start, anchored, require_end)
    }

    /// Iterates over non-overlapping matches, left to right. An empty
    /// match advances the scan by one code unit.
    pub fn find_iter<'r, 't>(&'r self, text: &'t str) -> Matches<'r, 't> {
        Matches {
            pattern: self,
            text,
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    /// The text of every non-overlapping match.
    pub fn findall<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.find_iter(text)
            .map(|m| m.group(0).unwrap_or_default())
            .collect()
    }

    /// Replaces every match with the expansion of `repl` (see
    /// [`Template`]).
    pub fn sub(&self, repl: &str, text: &str) -> Result<String, Error> {
        Ok(self.subn(repl, text)?.0)
    }

    /// Like [`Pattern::sub`], also returning the number of substitutions.
    pub fn subn(
        &self,
        repl: &str,
        text: &str,
    ) -> Result<(String, usize), Error> {
        let template = Template::parse(repl, self)?;
        let mut out = String::new();
        let mut count = 0;
        let mut last = 0;
        for m in self.find_iter(text) {
            let (match_start, match_end) = m.byte_span(0);
            out.push_str(&text[last..match_start]);
            out.push_str(&template.expand(&m));
            last = match_end;
            count += 1;
        }
        out.push_str(&text[last..]);
        Ok((out, count))
    }

    /// Splits `text` around every match, returning the pieces in between.
    pub fn split<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut out = Vec::new();
        let mut last = 0;
        for m in self.find_iter(text) {
            let (match_start, match_end) = m.byte_span(0);
            out.push(&text[last..match_start]);
            last = match_end;
        }
        out.push(&text[last..]);
        out
    }
}

/// Iterator over the non-overlapping matches of a pattern, created by
/// [`Pattern::find_iter`].
pub struct Matches<'r, 't> {
    pattern: &'r Pattern,
    text: &'t str,
    chars: Vec<char>,
    pos: usize,
}

impl<'r, 't> Iterator for Matches<'r, 't> {
    type Item = Match<'r, 't>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos > self.chars.len() {
            return None;
        }
        let pos = self.pos;
        let regs =
            self.pattern.exec_chars(&self.chars, pos, false, false, true)?;
        let (start, end) = (regs[0] as usize, regs[1] as usize);
        // Advance past the match; an empty match advances by one code unit
        // so that iteration makes progress.
        self.pos = if end == start { end + 1 } else { end };
        Some(Match {
            pattern: self.pattern,
            text: self.text,
            regs,
            pos,
            endpos: self.chars.len(),
        })
    }
}

/// The result of a successful match.
///
/// Register slots hold code-unit indices; group 0 is the whole match.
pub struct Match<'r, 't> {
    pattern: &'r Pattern,
    text: &'t str,
    regs: Vec<isize>,
    pos: usize,
    endpos: usize,
}

impl<'r, 't> Match<'r, 't> {
    /// Register pair for `group`.
    ///
    /// # Panics
    ///
    /// Panics if `group` is out of range, mirroring the `IndexError` a
    /// Python `re.Match` raises.
    fn pair(&self, group: usize) -> (isize, isize) {
        if group > self.pattern.group_count() {
            panic!("no such group: {}", group);
        }
        (self.regs[2 * group], self.regs[2 * group + 1])
    }

    /// The text of `group`, or `None` if the group did not participate in
    /// the match. Group 0 is the whole match.
    ///
    /// # Panics
    ///
    /// Panics if `group` is out of range.
    pub fn group(&self, group: usize) -> Option<&'t str> {
        let (start, end) = self.pair(group);
        if start < 0 {
            return None;
        }
        let (byte_start, byte_end) =
            char_range_to_byte_range(self.text, start as usize, end as usize);
        Some(&self.text[byte_start..byte_end])
    }

    /// The text of the named group `name`.
    ///
    /// # Panics
    ///
    /// Panics if no group has that name.
    pub fn group_by_name(&self, name: &str) -> Option<&'t str> {
        let group = self
            .pattern
            .group_index(name)
            .unwrap_or_else(|| panic!("no such group: `{}`", name));
        self.group(group)
    }

    /// The text of every capture group, `None` for the ones that did not
    /// participate.
    pub fn groups(&self) -> Vec<Option<&'t str>> {
        (1..=self.pattern.group_count()).map(|g| self.group(g)).collect()
    }

    /// Maps every named group to its text.
    pub fn group_dict(&self) -> FxHashMap<&'r str, Option<&'t str>> {
        self.pattern
            .group_names()
            .map(|(name, group)| (name, self.group(group)))
            .collect()
    }

    /// `(start, end)` of `group` in code units, or `None` if it did not
    /// participate.
    ///
    /// # Panics
    ///
    /// Panics if `group` is out of range.
    pub fn span(&self, group: usize) -> Option<(usize, usize)> {
        let (start, end) = self.pair(group);
        if start < 0 {
            None
        } else {
            Some((start as usize, end as usize))
        }
    }

    /// Start of `group` in code units.
    pub fn start(&self, group: usize) -> Option<usize> {
        self.span(group).map(|(start, _)| start)
    }

    /// End of `group` in code units.
    pub fn end(&self, group: usize) -> Option<usize> {
        self.span(group).map(|(_, end)| end)
    }

    /// Byte offsets of `group` within [`Match::string`]. The group must
    /// have participated in the match.
    pub(crate) fn byte_span(&self, group: usize) -> (usize, usize) {
        let (start, end) = self.span(group).unwrap_or((0, 0));
        char_range_to_byte_range(self.text, start, end)
    }

    /// Index of the most recently closed capture group, or `None` if no
    /// group participated.
    pub fn lastindex(&self) -> Option<usize> {
        let last = *self.regs.last().unwrap();
        if last < 0 {
            None
        } else {
            Some(last as usize)
        }
    }

    /// Name of the most recently closed capture group, if it has one.
    pub fn lastgroup(&self) -> Option<&'r str> {
        let last = self.lastindex()?;
        self.pattern
            .group_names()
            .find(|&(_, group)| group == last)
            .map(|(name, _)| name)
    }

    /// Expands a replacement template against this match, like `sub` does
    /// for each of its matches.
    pub fn expand(&self, repl: &str) -> Result<String, Error> {
        Ok(Template::parse(repl, self.pattern)?.expand(self))
    }

    /// The pattern that produced this match.
    pub fn re(&self) -> &'r Pattern {
        self.pattern
    }

    /// The input that was scanned.
    pub fn string(&self) -> &'t str {
        self.text
    }

    /// Code-unit index the scan started at.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Code-unit index the scan ended at (the length of the input).
    pub fn endpos(&self) -> usize {
        self.endpos
    }
}

impl fmt::Debug for Match<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("span", &self.span(0))
            .field("text", &self.group(0))
            .finish()
    }
}

/// Converts a code-unit span into a byte span of `text`.
fn char_range_to_byte_range(
    text: &str,
    start: usize,
    end: usize,
) -> (usize, usize) {
    let mut byte_start = text.len();
    let mut byte_end = text.len();
    for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
        if char_idx == start {
            byte_start = byte_idx;
        }
        if char_idx == end {
            byte_end = byte_idx;
            break;
        }
    }
    (byte_start, byte_end)
}
