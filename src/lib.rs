/*! A Python-compatible, linear-time regular expression engine.

`pyre` implements the pattern surface of Python's `re` module over an
RE2-style subset: no backreferences and no lookaround, which is what makes
the linear-time guarantee possible. Patterns are compiled into bytecode
for a Thompson-NFA virtual machine; matching runs every live alternative
in lockstep over the input, so the worst case is `O(pattern · input)`
regardless of the pattern.

Compiling and matching:

```
let pattern = pyre::compile(r"(?P<word>\w+)-(\d+)").unwrap();
let m = pattern.search("item alpha-42 rest", 0).unwrap();

assert_eq!(m.group(0), Some("alpha-42"));
assert_eq!(m.group_by_name("word"), Some("alpha"));
assert_eq!(m.span(2), Some((11, 13)));
```

A compiled [`Pattern`] is immutable and can be shared freely between
threads; every match call keeps its state on its own stack. Spans and
positions are indices into the sequence of code units (Unicode scalar
values), as in Python, not byte offsets.

The supported syntax is the usual one: concatenation, alternation `|`,
greedy and lazy quantifiers (`* + ? {n,m}`), capturing, non-capturing and
named groups, character classes with ranges and POSIX names, anchors
(`^ $ \A \z`), word boundaries (`\b \B`, ASCII), and the `i`, `m`, `s`,
`U` and `x` inline flags.
*/

pub mod compiler;

mod fast;
mod matches;
mod pikevm;
mod template;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use crate::compiler::{Compiler, Error, Pattern, MAX_GROUP_NAME_LEN};
pub use crate::matches::{Match, Matches};
pub use crate::template::{Template, TemplatePart};

/// Compiles a pattern with the default compiler configuration.
pub fn compile(pattern: &str) -> Result<Pattern, Error> {
    Compiler::new().compile(pattern)
}

/// Returns `text` with every character that could be interpreted as
/// pattern syntax backslash-escaped, so that the result matches `text`
/// literally.
///
/// ```
/// assert_eq!(pyre::escape("1+1=2"), r"1\+1\=2");
/// ```
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() && !c.is_ascii_alphanumeric() && c != '_' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
