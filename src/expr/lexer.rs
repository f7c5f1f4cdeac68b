//! Tokenizer for the expression grammar.

use super::EvalError;
use core::iter::Peekable;
use core::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),

    // keywords
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    Lambda,
    True,
    False,
    None,

    // operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    At,
    Amp,
    Pipe,
    Caret,
    Tilde,
    LeftShift,
    RightShift,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Assign,
    Walrus,

    // delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
}

impl Token {
    fn keyword(word: &str) -> Option<Self> {
        Some(match word {
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "in" => Self::In,
            "is" => Self::Is,
            "if" => Self::If,
            "else" => Self::Else,
            "for" => Self::For,
            "lambda" => Self::Lambda,
            "True" => Self::True,
            "False" => Self::False,
            "None" => Self::None,
            _ => return None,
        })
    }
}

/// Reserved words that cannot start an expression.
const STATEMENT_KEYWORDS: &[&str] = &[
    "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif", "except", "finally", "from", "global",
    "import", "nonlocal", "pass", "raise", "return", "try", "while", "with", "yield",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    Lexer {
        source,
        chars: source.char_indices().peekable(),
        tokens: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Token>, EvalError> {
        while let Some(&(pos, c)) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' | '\x0c' => {
                    _ = self.chars.next();
                }
                '\\' => {
                    // explicit line continuation
                    _ = self.chars.next();
                    match self.chars.next() {
                        Some((_, '\n')) => {}
                        Some((_, '\r')) if self.eat('\n') => {}
                        _ => return Err(EvalError::syntax("unexpected character after line continuation character")),
                    }
                }
                '#' => return Err(EvalError::syntax("comments are not allowed in expressions")),
                '0'..='9' => self.number(pos)?,
                '.' if self.next_is_digit(pos) => self.number(pos)?,
                '\'' | '"' => self.string(pos, pos)?,
                c if c == '_' || c.is_alphabetic() => self.word(pos)?,
                _ => self.punctuation(pos, c)?,
            }
        }

        Ok(self.tokens)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek().is_some_and(|&(_, c)| c == expected) {
            _ = self.chars.next();
            true
        } else {
            false
        }
    }

    fn next_is_digit(&self, pos: usize) -> bool {
        self.source
            .get(pos + 1..)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) -> usize {
        let mut end = self.source.len();
        while let Some(&(pos, c)) = self.chars.peek() {
            if !predicate(c) {
                end = pos;
                break;
            }
            _ = self.chars.next();
        }
        end
    }

    fn word(&mut self, start: usize) -> Result<(), EvalError> {
        let end = self.take_while(|c| c == '_' || c.is_alphanumeric());
        let word = &self.source[start..end];

        // string prefixes such as r'...' or u"..."
        if let Some(&(quote_pos, '\'' | '"')) = self.chars.peek()
            && word.len() <= 2
            && word.chars().all(|c| matches!(c.to_ascii_lowercase(), 'r' | 'u' | 'b' | 'f'))
        {
            return self.string(start, quote_pos);
        }

        if let Some(keyword) = Token::keyword(word) {
            self.tokens.push(keyword);
        } else if STATEMENT_KEYWORDS.contains(&word) {
            return Err(EvalError::syntax(format!("invalid syntax at keyword '{word}'")));
        } else {
            self.tokens.push(Token::Name(word.to_string()));
        }
        Ok(())
    }

    fn number(&mut self, start: usize) -> Result<(), EvalError> {
        let end = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');

        // exponent signs split the literal, so pick them up separately
        let mut end = end;
        let mut text = self.source[start..end].to_string();
        let lower = text.to_ascii_lowercase();
        if !lower.starts_with("0x") && lower.ends_with('e') && matches!(self.chars.peek(), Some((_, '+' | '-'))) {
            if let Some((_, sign)) = self.chars.next() {
                text.push(sign);
            }
            end = self.take_while(|c| c.is_ascii_digit() || c == '_');
            text.push_str(&self.source[start + text.len()..end]);
        }

        let literal = text.replace('_', "");
        let lower = literal.to_ascii_lowercase();

        let radix = if lower.starts_with("0x") {
            Some(16)
        } else if lower.starts_with("0o") {
            Some(8)
        } else if lower.starts_with("0b") {
            Some(2)
        } else {
            None
        };

        if let Some(radix) = radix {
            let value = i64::from_str_radix(&literal[2..], radix).map_err(|_| EvalError::syntax(format!("invalid integer literal '{text}'")))?;
            self.tokens.push(Token::Int(value));
            return Ok(());
        }

        if lower.ends_with('j') {
            return Err(EvalError::syntax(format!("complex literals are not supported: '{text}'")));
        }

        if lower.contains(['.', 'e']) {
            let value: f64 = literal.parse().map_err(|_| EvalError::syntax(format!("invalid float literal '{text}'")))?;
            self.tokens.push(Token::Float(value));
        } else {
            if !literal.bytes().all(|b| b.is_ascii_digit()) {
                return Err(EvalError::syntax(format!("invalid decimal literal '{text}'")));
            }
            if literal.len() > 1 && literal.starts_with('0') && literal.bytes().any(|b| b != b'0') {
                return Err(EvalError::syntax("leading zeros in decimal integer literals are not permitted"));
            }
            let value: i64 = literal.parse().map_err(|_| EvalError::syntax(format!("integer literal '{text}' is too large")))?;
            self.tokens.push(Token::Int(value));
        }

        Ok(())
    }

    fn string(&mut self, prefix_start: usize, quote_pos: usize) -> Result<(), EvalError> {
        let prefix = self.source[prefix_start..quote_pos].to_ascii_lowercase();
        if prefix.contains('b') {
            return Err(EvalError::syntax("bytes literals are not supported"));
        }
        if prefix.contains('f') {
            return Err(EvalError::syntax("f-strings are not supported"));
        }
        let raw = prefix.contains('r');

        let Some((_, quote)) = self.chars.next() else {
            return Err(EvalError::syntax("unterminated string literal"));
        };

        let rest = &self.source[quote_pos + 1..];
        let triple = rest.starts_with(quote) && rest[quote.len_utf8()..].starts_with(quote);
        if triple {
            _ = self.chars.next();
            _ = self.chars.next();
        }

        let mut value = String::new();
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Err(EvalError::syntax("unterminated string literal"));
            };

            if c == quote {
                if !triple {
                    break;
                }
                if self.eat(quote) {
                    if self.eat(quote) {
                        break;
                    }
                    value.push(quote);
                }
                value.push(quote);
                continue;
            }

            match c {
                '\n' if !triple => return Err(EvalError::syntax("unterminated string literal")),
                '\\' => self.escape(raw, &mut value)?,
                c => value.push(c),
            }
        }

        self.tokens.push(Token::Str(value));
        Ok(())
    }

    fn escape(&mut self, raw: bool, value: &mut String) -> Result<(), EvalError> {
        let Some((_, c)) = self.chars.next() else {
            return Err(EvalError::syntax("unterminated string literal"));
        };

        if raw {
            value.push('\\');
            value.push(c);
            return Ok(());
        }

        match c {
            '\n' => {}
            '\\' => value.push('\\'),
            '\'' => value.push('\''),
            '"' => value.push('"'),
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '0' => value.push('\0'),
            'a' => value.push('\x07'),
            'b' => value.push('\x08'),
            'f' => value.push('\x0c'),
            'v' => value.push('\x0b'),
            'x' => value.push(self.code_point(2)?),
            'u' => value.push(self.code_point(4)?),
            'U' => value.push(self.code_point(8)?),

            // unknown escapes are kept verbatim, so regex classes like \d survive
            other => {
                value.push('\\');
                value.push(other);
            }
        }
        Ok(())
    }

    fn code_point(&mut self, digits: usize) -> Result<char, EvalError> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.chars.next() {
                Some((_, c)) if c.is_ascii_hexdigit() => hex.push(c),
                _ => return Err(EvalError::syntax("truncated escape sequence in string literal")),
            }
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| EvalError::syntax(format!("invalid escape sequence '\\{hex}'")))
    }

    fn punctuation(&mut self, pos: usize, c: char) -> Result<(), EvalError> {
        _ = self.chars.next();
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if self.eat('*') => Token::DoubleStar,
            '*' => Token::Star,
            '/' if self.eat('/') => Token::DoubleSlash,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '@' => Token::At,
            '&' => Token::Amp,
            '|' => Token::Pipe,
            '^' => Token::Caret,
            '~' => Token::Tilde,
            '<' if self.eat('<') => Token::LeftShift,
            '<' if self.eat('=') => Token::LtEq,
            '<' => Token::Lt,
            '>' if self.eat('>') => Token::RightShift,
            '>' if self.eat('=') => Token::GtEq,
            '>' => Token::Gt,
            '=' if self.eat('=') => Token::EqEq,
            '=' => Token::Assign,
            '!' if self.eat('=') => Token::NotEq,
            ':' if self.eat('=') => Token::Walrus,
            ':' => Token::Colon,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            '.' => Token::Dot,
            _ => return Err(EvalError::syntax(format!("invalid character '{c}' at position {pos}"))),
        };

        self.tokens.push(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_comparison() {
        let tokens = tokenize("count >= 10 and name != 'x'").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Name("count".into()),
                Token::GtEq,
                Token::Int(10),
                Token::And,
                Token::Name("name".into()),
                Token::NotEq,
                Token::Str("x".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("0x1F").unwrap(), vec![Token::Int(31)]);
        assert_eq!(tokenize("1_000").unwrap(), vec![Token::Int(1000)]);
        assert_eq!(tokenize("1.5e-3").unwrap(), vec![Token::Float(0.0015)]);
        assert_eq!(tokenize(".5").unwrap(), vec![Token::Float(0.5)]);
        assert_eq!(tokenize("2e3").unwrap(), vec![Token::Float(2000.0)]);
        assert!(tokenize("99999999999999999999").is_err());
        assert!(tokenize("012").is_err());
    }

    #[test]
    fn test_strings() {
        assert_eq!(tokenize(r"'a\nb'").unwrap(), vec![Token::Str("a\nb".into())]);
        assert_eq!(tokenize(r"'^\d+$'").unwrap(), vec![Token::Str(r"^\d+$".into())]);
        assert_eq!(tokenize(r"r'\n'").unwrap(), vec![Token::Str(r"\n".into())]);
        assert_eq!(tokenize(r#""it's""#).unwrap(), vec![Token::Str("it's".into())]);
        assert_eq!(tokenize("'''a'b'''").unwrap(), vec![Token::Str("a'b".into())]);
        assert_eq!(tokenize(r"'\x41'").unwrap(), vec![Token::Str("A".into())]);
        assert!(tokenize("'open").is_err());
        assert!(tokenize("b'x'").is_err());
    }

    #[test]
    fn test_rejects_bang_and_statements() {
        assert!(tokenize("!x").is_err());
        assert!(tokenize("import os").is_err());
        assert!(tokenize("x # comment").is_err());
    }

    #[test]
    fn test_unicode_identifiers() {
        assert_eq!(tokenize("größe").unwrap(), vec![Token::Name("größe".into())]);
    }
}
