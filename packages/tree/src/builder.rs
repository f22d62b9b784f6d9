//! Level-indexed tree builder.
//!
//! The builder holds an ordered list of levels, each a pattern paired with a
//! node factory. Lines are fed one at a time; the shallowest reachable level
//! whose pattern matches fires. A match at a shallower level than the current
//! one closes the open deeper branches, a match at the current level extends
//! the open branch. Pattern priority is the only nesting signal, which is
//! what lets flat text with no indentation be recovered as a hierarchy.

use std::fmt;

use regex::{Captures, Regex};

use crate::tree::{NodeId, Tree};

/// What a factory asks the builder to do after a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<C, V> {
    /// Carry `context` to the next factory call and, if present, append
    /// `value` under the cursor and descend into it.
    Emit { context: Option<C>, value: Option<V> },
    /// Stop feeding lines. Nothing is appended.
    Stop { context: Option<C> },
}

impl<C, V> Step<C, V> {
    /// Bare node value; the carried context is reset.
    #[must_use]
    pub fn node(value: V) -> Self {
        Self::Emit {
            context: None,
            value: Some(value),
        }
    }

    /// Keep `context` and optionally append `value`.
    #[must_use]
    pub fn carry(context: C, value: Option<V>) -> Self {
        Self::Emit {
            context: Some(context),
            value,
        }
    }
}

/// Whether the builder wants more input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Node factory: receives the carried context and the captures of the match.
pub type Factory<'a, C, V, E> =
    dyn FnMut(Option<C>, &Captures<'_>) -> std::result::Result<Step<C, V>, E> + 'a;

/// A pattern and the factory invoked when it matches.
pub struct Level<'a, C, V, E> {
    pattern: Regex,
    factory: Box<Factory<'a, C, V, E>>,
}

impl<'a, C, V, E> Level<'a, C, V, E> {
    pub fn new(
        pattern: Regex,
        factory: impl FnMut(Option<C>, &Captures<'_>) -> std::result::Result<Step<C, V>, E> + 'a,
    ) -> Self {
        Self {
            pattern,
            factory: Box::new(factory),
        }
    }

    #[must_use]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }
}

impl<C, V, E> fmt::Debug for Level<'_, C, V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Incremental builder that grows a [`Tree`] from matched lines.
pub struct TreeBuilder<'a, C, V, E> {
    levels: Vec<Level<'a, C, V, E>>,
    tree: Tree<V>,
    cursor: NodeId,
    depth: usize,
    context: Option<C>,
}

impl<'a, C, V: fmt::Display, E> TreeBuilder<'a, C, V, E> {
    /// Start building under the root of `tree`.
    #[must_use]
    pub fn new(tree: Tree<V>, levels: Vec<Level<'a, C, V, E>>) -> Self {
        let cursor = tree.root();
        Self {
            levels,
            tree,
            cursor,
            depth: 0,
            context: None,
        }
    }

    /// Seed the context handed to the first factory call.
    #[must_use]
    pub fn with_context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }

    /// Feed a single line.
    ///
    /// At most one level fires per line. Only levels up to the current depth
    /// are tried, so a deeper level cannot match before its parent has.
    ///
    /// # Errors
    /// Returns the factory's error unchanged; the builder state is left as it
    /// was right before the failing factory call.
    pub fn feed(&mut self, line: &str) -> std::result::Result<Flow, E> {
        let Some(last) = self.levels.len().checked_sub(1) else {
            return Ok(Flow::Continue);
        };
        let reachable = self.depth.min(last);

        for (level_depth, level) in self.levels[..=reachable].iter_mut().enumerate() {
            let Some(captures) = level.pattern.captures(line) else {
                continue;
            };

            if level_depth < self.depth {
                self.cursor = self.tree.ascend(self.cursor, self.depth - level_depth);
                self.depth = level_depth + 1;
            } else {
                self.depth += 1;
            }
            tracing::trace!(level = level_depth, line, "Level matched");

            let step = (level.factory)(self.context.take(), &captures)?;
            return Ok(match step {
                Step::Emit { context, value } => {
                    self.context = context;
                    if let Some(value) = value {
                        self.cursor = self.tree.add(self.cursor, value);
                    }
                    Flow::Continue
                }
                Step::Stop { context } => {
                    self.context = context;
                    Flow::Stop
                }
            });
        }

        Ok(Flow::Continue)
    }

    /// Feed every line of `text`, stopping early if a factory asks to.
    ///
    /// # Errors
    /// Returns the first factory error.
    pub fn build(&mut self, text: &str) -> std::result::Result<Flow, E> {
        for line in split_lines(text) {
            if self.feed(line)? == Flow::Stop {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }
}

impl<C, V, E> TreeBuilder<'_, C, V, E> {
    /// Current nesting depth of the insertion cursor.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn tree(&self) -> &Tree<V> {
        &self.tree
    }

    #[must_use]
    pub fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    #[must_use]
    pub fn into_tree(self) -> Tree<V> {
        self.tree
    }
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split text into lines on every line-boundary character, including the
/// form feeds that separate pages of extracted text. `\r\n` counts as one
/// boundary and a trailing boundary does not produce an empty last line.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(is_line_break) {
            Some(pos) => {
                let line = &rest[..pos];
                let tail = &rest[pos..];
                let width = if tail.starts_with("\r\n") {
                    2
                } else {
                    tail.chars().next().map_or(1, char::len_utf8)
                };
                rest = &tail[width..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = "";
                Some(line)
            }
        }
    })
}
