//! Character-level scanning shared by path and search parsing.

use cfgdoc_types::{ConfigError, Result};

use crate::predicate::Predicate;

/// A key or value token. `quoted` distinguishes `'0'` (a key) from `0`
/// (an index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Atom {
    pub text: String,
    pub quoted: bool,
}

/// The part of a segment before any bracketed predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Head {
    Atom(Atom),
    Pair(Atom, Atom),
    Wildcard,
    Descendants,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawSegment {
    pub head: Head,
    pub predicates: Vec<Predicate>,
}

pub(crate) struct Cursor<'s> {
    src: &'s str,
    chars: Vec<char>,
    pos: usize,
}

impl<'s> Cursor<'s> {
    pub fn new(src: &'s str) -> Self {
        Self {
            src,
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    pub fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    pub fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    pub fn error(&self, reason: impl std::fmt::Display) -> ConfigError {
        ConfigError::malformed_path(self.src, format!("{reason} at offset {}", self.pos))
    }

    pub fn expect(&mut self, c: char) -> Result<()> {
        if self.eat(c) {
            Ok(())
        } else {
            match self.peek() {
                Some(found) => Err(self.error(format!("expected '{c}', found '{found}'"))),
                None => Err(self.error(format!("expected '{c}', found end of input"))),
            }
        }
    }

    /// Read a quoted or bare atom. Bare atoms end at any char in `stops`.
    pub fn atom(&mut self, stops: &[char]) -> Result<Atom> {
        match self.peek() {
            Some(q @ ('\'' | '"')) => {
                self.pos += 1;
                let text = self.quoted(q)?;
                Ok(Atom { text, quoted: true })
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if stops.contains(&c) || c == '\'' || c == '"' {
                        break;
                    }
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(self.error("empty segment"));
                }
                Ok(Atom {
                    text: self.chars[start..self.pos].iter().collect(),
                    quoted: false,
                })
            }
        }
    }

    /// Body of a quoted atom; the opening quote is already consumed.
    /// A doubled quote character stands for itself.
    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    if self.eat(quote) {
                        out.push(quote);
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated quote")),
            }
        }
    }

    /// Parse one segment; the leading `/` is already consumed.
    pub fn segment(&mut self) -> Result<RawSegment> {
        const HEAD_STOPS: &[char] = &['/', '[', ']', '=', '*'];

        let head = if self.eat('*') {
            if self.eat('*') {
                Head::Descendants
            } else {
                Head::Wildcard
            }
        } else {
            let key = self.atom(HEAD_STOPS)?;
            if self.eat('=') {
                let value = self.atom(HEAD_STOPS)?;
                Head::Pair(key, value)
            } else {
                Head::Atom(key)
            }
        };

        let mut predicates = Vec::new();
        while self.eat('[') {
            predicates.push(self.predicate()?);
        }

        match self.peek() {
            None | Some('/') => Ok(RawSegment { head, predicates }),
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
        }
    }

    /// Parse a bracketed predicate; the `[` is already consumed.
    fn predicate(&mut self) -> Result<Predicate> {
        const STOPS: &[char] = &['(', ')', ',', '=', '!', '[', ']', ' ', '\t'];

        self.skip_ws();
        let first = self.atom(STOPS)?;
        self.skip_ws();

        let predicate = if !first.quoted && self.eat('(') {
            let mut args = Vec::new();
            loop {
                self.skip_ws();
                args.push(self.atom(STOPS)?.text);
                self.skip_ws();
                if self.eat(',') {
                    continue;
                }
                self.expect(')')?;
                break;
            }
            Predicate::function(&first.text, args).map_err(|reason| self.error(reason))?
        } else if self.eat('!') {
            self.expect('=')?;
            self.skip_ws();
            let value = self.atom(STOPS)?;
            Predicate::Ne {
                field: first.text,
                value: value.text,
            }
        } else if self.eat('=') {
            self.skip_ws();
            let value = self.atom(STOPS)?;
            Predicate::Eq {
                field: first.text,
                value: value.text,
            }
        } else {
            Predicate::Exists { field: first.text }
        };

        self.skip_ws();
        self.expect(']')?;
        Ok(predicate)
    }
}

/// Whether a key must be quoted to survive a format/parse round trip.
pub(crate) fn needs_quotes(key: &str) -> bool {
    key.is_empty()
        || key.chars().all(|c| c.is_ascii_digit())
        || key.chars().any(|c| {
            c.is_whitespace() || matches!(c, '/' | '[' | ']' | '=' | '*' | '\'' | '"' | '(' | ')' | ',' | '!')
        })
}

/// Write an atom, quoting it when needed.
pub(crate) fn write_atom(f: &mut impl std::fmt::Write, text: &str) -> std::fmt::Result {
    if needs_quotes(text) {
        f.write_char('\'')?;
        for c in text.chars() {
            if c == '\'' {
                f.write_str("''")?;
            } else {
                f.write_char(c)?;
            }
        }
        f.write_char('\'')
    } else {
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_atoms_unescape_doubled_quotes() {
        let mut cursor = Cursor::new("'it''s here'");
        let atom = cursor.atom(&['/']).unwrap();
        assert_eq!(atom.text, "it's here");
        assert!(atom.quoted);
        assert!(cursor.at_end());
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        let mut cursor = Cursor::new("'open");
        assert!(cursor.atom(&['/']).is_err());
    }

    #[test]
    fn segment_with_predicates() {
        let mut cursor = Cursor::new("*[aet='DCM4CHEE'][contains(title,'arc')]");
        let seg = cursor.segment().unwrap();
        assert_eq!(seg.head, Head::Wildcard);
        assert_eq!(seg.predicates.len(), 2);
    }

    #[test]
    fn numeric_and_special_keys_need_quotes() {
        assert!(needs_quotes("0"));
        assert!(needs_quotes("a b"));
        assert!(needs_quotes("x[1]"));
        assert!(needs_quotes(""));
        assert!(!needs_quotes("dicomNetworkAE"));
        assert!(!needs_quotes("#uuid"));
    }

    #[test]
    fn write_atom_quotes_when_needed() {
        let mut out = String::new();
        write_atom(&mut out, "it's").unwrap();
        assert_eq!(out, "'it''s'");
    }
}
