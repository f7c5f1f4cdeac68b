//! Recursive-descent parser producing [`Node`] trees.
//!
//! The grammar follows the usual expression precedence ladder, from loosest to
//! tightest binding:
//!
//! ```text
//! expression  := lambda | disjunction ['if' disjunction 'else' expression]
//! disjunction := conjunction ('or' conjunction)*
//! conjunction := inversion ('and' inversion)*
//! inversion   := 'not' inversion | comparison
//! comparison  := bitor (compare_op bitor)*
//! bitor       := bitxor ('|' bitxor)*
//! bitxor      := bitand ('^' bitand)*
//! bitand      := shift ('&' shift)*
//! shift       := sum (('<<' | '>>') sum)*
//! sum         := term (('+' | '-') term)*
//! term        := factor (('*' | '/' | '//' | '%' | '@') factor)*
//! factor      := ('+' | '-' | '~') factor | power
//! power       := primary ['**' factor]
//! primary     := atom ('.' NAME | '(' arguments ')' | '[' subscript ']')*
//! ```
//!
//! Everything the grammar accepts is represented in the tree, including
//! constructs the evaluator refuses to run. Those are reported at evaluation
//! time so the error names the offending construct.

use super::ast::{BinaryOp, BoolOp, CompareOp, Generator, Node, UnaryOp};
use super::lexer::{Token, tokenize};
use super::{EvalError, Value};

/// Bound on syntactic nesting, keeping recursion depth well inside the stack.
const MAX_NESTING: usize = 64;

pub(crate) fn parse(source: &str) -> Result<Node, EvalError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(EvalError::syntax("empty expression"));
    }

    let mut parser = Parser { tokens, pos: 0, nesting: 0 };
    let node = parser.expression_list()?;
    match parser.peek() {
        None => Ok(node),
        Some(token) => Err(EvalError::syntax(format!("unexpected {}", describe(token)))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), EvalError> {
        if self.eat(expected) {
            return Ok(());
        }
        Err(EvalError::syntax(match self.peek() {
            Some(token) => format!("expected {what}, found {}", describe(token)),
            None => format!("expected {what}, found end of expression"),
        }))
    }

    fn enter(&mut self) -> Result<(), EvalError> {
        self.nesting += 1;
        if self.nesting > MAX_NESTING {
            return Err(EvalError::syntax("expression is nested too deeply to parse"));
        }
        Ok(())
    }

    const fn leave(&mut self) {
        self.nesting -= 1;
    }

    /// A bare tuple such as `1, 2` is accepted at the top level.
    fn expression_list(&mut self) -> Result<Node, EvalError> {
        let first = self.expression()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.peek().is_none() {
                break;
            }
            items.push(self.expression()?);
        }
        Ok(Node::Tuple(items))
    }

    fn expression(&mut self) -> Result<Node, EvalError> {
        self.enter()?;
        let result = self.expression_inner();
        self.leave();
        result
    }

    fn expression_inner(&mut self) -> Result<Node, EvalError> {
        if self.eat(&Token::Lambda) {
            self.skip_lambda_parameters()?;
            _ = self.expression()?;
            return Ok(Node::Unsupported("Lambda"));
        }

        let body = self.disjunction()?;

        if self.eat(&Token::If) {
            let test = self.disjunction()?;
            self.expect(&Token::Else, "'else' in conditional expression")?;
            let orelse = self.expression()?;
            return Ok(Node::IfExp {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            });
        }

        if self.eat(&Token::Walrus) {
            if !matches!(body, Node::Name(_)) {
                return Err(EvalError::syntax("cannot use assignment expressions with this target"));
            }
            _ = self.expression()?;
            return Ok(Node::Unsupported("NamedExpr"));
        }

        Ok(body)
    }

    fn skip_lambda_parameters(&mut self) -> Result<(), EvalError> {
        loop {
            match self.advance() {
                Some(Token::Colon) => return Ok(()),
                Some(Token::Assign) => _ = self.expression()?,
                Some(Token::Name(_) | Token::Comma | Token::Star | Token::DoubleStar | Token::Slash) => {}
                Some(token) => return Err(EvalError::syntax(format!("unexpected {} in lambda parameters", describe(&token)))),
                None => return Err(EvalError::syntax("expected ':' after lambda parameters")),
            }
        }
    }

    fn disjunction(&mut self) -> Result<Node, EvalError> {
        self.bool_chain(&Token::Or, BoolOp::Or, Self::conjunction)
    }

    fn conjunction(&mut self) -> Result<Node, EvalError> {
        self.bool_chain(&Token::And, BoolOp::And, Self::inversion)
    }

    fn bool_chain(&mut self, token: &Token, op: BoolOp, operand: fn(&mut Self) -> Result<Node, EvalError>) -> Result<Node, EvalError> {
        let first = operand(self)?;
        if !self.check(token) {
            return Ok(first);
        }

        let mut values = vec![first];
        while self.eat(token) {
            values.push(operand(self)?);
        }
        Ok(Node::BoolOp { op, values })
    }

    fn inversion(&mut self) -> Result<Node, EvalError> {
        if !self.eat(&Token::Not) {
            return self.comparison();
        }

        self.enter()?;
        let operand = self.inversion();
        self.leave();
        Ok(Node::UnaryOp {
            op: UnaryOp::Not,
            operand: Box::new(operand?),
        })
    }

    fn comparison(&mut self) -> Result<Node, EvalError> {
        let left = self.bitor()?;
        let mut comparisons = Vec::new();

        loop {
            let op = match self.peek().cloned() {
                Some(Token::EqEq) => CompareOp::Eq,
                Some(Token::NotEq) => CompareOp::NotEq,
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::LtEq) => CompareOp::LtE,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::GtEq) => CompareOp::GtE,
                Some(Token::In) => CompareOp::In,
                Some(Token::Not) if self.peek_at(1) == Some(&Token::In) => {
                    self.pos += 1;
                    CompareOp::NotIn
                }
                Some(Token::Is) if self.peek_at(1) == Some(&Token::Not) => {
                    self.pos += 1;
                    CompareOp::IsNot
                }
                Some(Token::Is) => CompareOp::Is,
                _ => break,
            };
            self.pos += 1;
            comparisons.push((op, self.bitor()?));
        }

        if comparisons.is_empty() {
            Ok(left)
        } else {
            Ok(Node::Compare {
                left: Box::new(left),
                comparisons,
            })
        }
    }

    fn binary_level(
        &mut self,
        operators: &[(Token, BinaryOp)],
        operand: fn(&mut Self) -> Result<Node, EvalError>,
    ) -> Result<Node, EvalError> {
        let mut left = operand(self)?;
        'outer: loop {
            for (token, op) in operators {
                if self.eat(token) {
                    let right = operand(self)?;
                    left = Node::BinOp {
                        left: Box::new(left),
                        op: *op,
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    fn bitor(&mut self) -> Result<Node, EvalError> {
        self.binary_level(&[(Token::Pipe, BinaryOp::BitOr)], Self::bitxor)
    }

    /// `bitor` reached from a starred item or a comprehension target, outside `expression`.
    fn nested_bitor(&mut self) -> Result<Node, EvalError> {
        self.enter()?;
        let result = self.bitor();
        self.leave();
        result
    }

    fn bitxor(&mut self) -> Result<Node, EvalError> {
        self.binary_level(&[(Token::Caret, BinaryOp::BitXor)], Self::bitand)
    }

    fn bitand(&mut self) -> Result<Node, EvalError> {
        self.binary_level(&[(Token::Amp, BinaryOp::BitAnd)], Self::shift)
    }

    fn shift(&mut self) -> Result<Node, EvalError> {
        self.binary_level(
            &[(Token::LeftShift, BinaryOp::LShift), (Token::RightShift, BinaryOp::RShift)],
            Self::sum,
        )
    }

    fn sum(&mut self) -> Result<Node, EvalError> {
        self.binary_level(&[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)], Self::term)
    }

    fn term(&mut self) -> Result<Node, EvalError> {
        self.binary_level(
            &[
                (Token::Star, BinaryOp::Mult),
                (Token::Slash, BinaryOp::Div),
                (Token::DoubleSlash, BinaryOp::FloorDiv),
                (Token::Percent, BinaryOp::Mod),
                (Token::At, BinaryOp::MatMult),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> Result<Node, EvalError> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::USub,
            Some(Token::Plus) => UnaryOp::UAdd,
            Some(Token::Tilde) => UnaryOp::Invert,
            _ => return self.power(),
        };
        self.pos += 1;

        self.enter()?;
        let operand = self.factor();
        self.leave();

        Ok(Node::UnaryOp {
            op,
            operand: Box::new(operand?),
        })
    }

    fn power(&mut self) -> Result<Node, EvalError> {
        let base = self.primary()?;
        if !self.eat(&Token::DoubleStar) {
            return Ok(base);
        }

        self.enter()?;
        let exponent = self.factor();
        self.leave();
        Ok(Node::BinOp {
            left: Box::new(base),
            op: BinaryOp::Pow,
            right: Box::new(exponent?),
        })
    }

    fn primary(&mut self) -> Result<Node, EvalError> {
        let mut node = self.atom()?;

        loop {
            if self.eat(&Token::Dot) {
                let Some(Token::Name(attr)) = self.advance() else {
                    return Err(EvalError::syntax("expected attribute name after '.'"));
                };
                node = Node::Attribute {
                    value: Box::new(node),
                    attr,
                };
            } else if self.eat(&Token::LParen) {
                let (args, keywords) = self.call_arguments()?;
                node = Node::Call {
                    func: Box::new(node),
                    args,
                    keywords,
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.subscript()?;
                node = Node::Subscript {
                    value: Box::new(node),
                    index: Box::new(index),
                };
            } else {
                return Ok(node);
            }
        }
    }

    fn call_arguments(&mut self) -> Result<(Vec<Node>, Vec<(String, Node)>), EvalError> {
        let mut args = Vec::new();
        let mut keywords: Vec<(String, Node)> = Vec::new();

        if self.eat(&Token::RParen) {
            return Ok((args, keywords));
        }

        loop {
            if self.eat(&Token::Star) || self.eat(&Token::DoubleStar) {
                _ = self.expression()?;
                args.push(Node::Unsupported("Starred"));
            } else if let (Some(Token::Name(name)), Some(Token::Assign)) = (self.peek(), self.peek_at(1)) {
                let name = name.clone();
                self.pos += 2;
                if keywords.iter().any(|(existing, _)| *existing == name) {
                    return Err(EvalError::syntax(format!("keyword argument repeated: {name}")));
                }
                let value = self.expression()?;
                keywords.push((name, value));
            } else {
                if !keywords.is_empty() {
                    return Err(EvalError::syntax("positional argument follows keyword argument"));
                }

                let arg = self.expression()?;
                if self.check(&Token::For) {
                    let generator = self.comprehension(arg)?;
                    if !args.is_empty() || !self.check(&Token::RParen) {
                        return Err(EvalError::syntax("generator expression must be parenthesized"));
                    }
                    args.push(generator);
                } else {
                    args.push(arg);
                }
            }

            if self.eat(&Token::Comma) {
                if self.eat(&Token::RParen) {
                    return Ok((args, keywords));
                }
                continue;
            }

            self.expect(&Token::RParen, "')' to close the argument list")?;
            return Ok((args, keywords));
        }
    }

    fn subscript(&mut self) -> Result<Node, EvalError> {
        let mut items = Vec::new();
        let trailing_comma = loop {
            items.push(self.slice_item()?);
            if !self.eat(&Token::Comma) {
                break false;
            }
            if self.check(&Token::RBracket) {
                break true;
            }
        };

        self.expect(&Token::RBracket, "']' to close the subscript")?;
        if items.len() == 1 && !trailing_comma {
            Ok(items.remove(0))
        } else {
            Ok(Node::Tuple(items))
        }
    }

    fn slice_item(&mut self) -> Result<Node, EvalError> {
        let lower = if self.check(&Token::Colon) { None } else { Some(self.expression()?) };
        if !self.eat(&Token::Colon) {
            return lower.ok_or_else(|| EvalError::syntax("expected subscript"));
        }

        let ends_slice = |p: &Self| matches!(p.peek(), Some(Token::RBracket | Token::Comma | Token::Colon) | None);
        if !ends_slice(self) {
            _ = self.expression()?;
        }
        if self.eat(&Token::Colon) && !ends_slice(self) {
            _ = self.expression()?;
        }
        Ok(Node::Unsupported("Slice"))
    }

    fn atom(&mut self) -> Result<Node, EvalError> {
        let Some(token) = self.advance() else {
            return Err(EvalError::syntax("unexpected end of expression"));
        };

        match token {
            Token::Name(name) => Ok(Node::Name(name)),
            Token::True => Ok(Node::Constant(Value::Bool(true))),
            Token::False => Ok(Node::Constant(Value::Bool(false))),
            Token::None => Ok(Node::Constant(Value::Null)),
            Token::Int(i) => Ok(Node::Constant(Value::Int(i))),
            Token::Float(f) => Ok(Node::Constant(Value::Float(f))),
            Token::Str(mut s) => {
                // adjacent literals concatenate
                while let Some(Token::Str(next)) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Node::Constant(Value::Str(s)))
            }
            Token::LParen => self.parenthesized(),
            Token::LBracket => self.list_display(),
            Token::LBrace => self.brace_display(),
            other => Err(EvalError::syntax(format!("unexpected {}", describe(&other)))),
        }
    }

    fn display_item(&mut self) -> Result<Node, EvalError> {
        if self.eat(&Token::Star) {
            _ = self.nested_bitor()?;
            return Ok(Node::Unsupported("Starred"));
        }
        self.expression()
    }

    /// Parses the remaining items of a comma-separated display up to `close`.
    fn display_items(&mut self, first: Node, close: &Token) -> Result<Vec<Node>, EvalError> {
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(close) {
                break;
            }
            items.push(self.display_item()?);
        }
        self.expect(close, &format!("{} to close the display", describe(close)))?;
        Ok(items)
    }

    fn parenthesized(&mut self) -> Result<Node, EvalError> {
        if self.eat(&Token::RParen) {
            return Ok(Node::Tuple(Vec::new()));
        }

        let first = self.display_item()?;
        if self.check(&Token::For) {
            let generator = self.comprehension(first)?;
            self.expect(&Token::RParen, "')' to close the generator expression")?;
            return Ok(generator);
        }

        if self.check(&Token::Comma) {
            return Ok(Node::Tuple(self.display_items(first, &Token::RParen)?));
        }

        self.expect(&Token::RParen, "')'")?;
        Ok(first)
    }

    fn list_display(&mut self) -> Result<Node, EvalError> {
        if self.eat(&Token::RBracket) {
            return Ok(Node::List(Vec::new()));
        }

        let first = self.display_item()?;
        if self.check(&Token::For) {
            let comprehension = self.comprehension(first)?;
            self.expect(&Token::RBracket, "']' to close the list comprehension")?;
            return Ok(comprehension);
        }

        Ok(Node::List(self.display_items(first, &Token::RBracket)?))
    }

    fn brace_display(&mut self) -> Result<Node, EvalError> {
        if self.eat(&Token::RBrace) {
            return Ok(Node::Dict(Vec::new()));
        }

        if self.eat(&Token::DoubleStar) {
            _ = self.nested_bitor()?;
            self.skip_to_closing_brace()?;
            return Ok(Node::Unsupported("Starred"));
        }

        let first = self.display_item()?;

        if !self.eat(&Token::Colon) {
            if self.check(&Token::For) {
                _ = self.comprehension(first)?;
                self.expect(&Token::RBrace, "'}' to close the set comprehension")?;
                return Ok(Node::Unsupported("SetComp"));
            }
            return Ok(Node::Set(self.display_items(first, &Token::RBrace)?));
        }

        let value = self.expression()?;
        if self.check(&Token::For) {
            _ = self.comprehension(value)?;
            self.expect(&Token::RBrace, "'}' to close the dict comprehension")?;
            return Ok(Node::Unsupported("DictComp"));
        }

        let mut entries = vec![(first, value)];
        while self.eat(&Token::Comma) {
            if self.check(&Token::RBrace) {
                break;
            }
            if self.eat(&Token::DoubleStar) {
                _ = self.nested_bitor()?;
                self.skip_to_closing_brace()?;
                return Ok(Node::Unsupported("Starred"));
            }
            let key = self.expression()?;
            self.expect(&Token::Colon, "':' in dict display")?;
            entries.push((key, self.expression()?));
        }
        self.expect(&Token::RBrace, "'}' to close the dict display")?;
        Ok(Node::Dict(entries))
    }

    fn skip_to_closing_brace(&mut self) -> Result<(), EvalError> {
        while !self.eat(&Token::RBrace) {
            if self.eat(&Token::Comma) {
                continue;
            }
            if self.eat(&Token::DoubleStar) {
                _ = self.nested_bitor()?;
                continue;
            }
            _ = self.expression()?;
            if self.eat(&Token::Colon) {
                _ = self.expression()?;
            }
        }
        Ok(())
    }

    fn comprehension(&mut self, element: Node) -> Result<Node, EvalError> {
        let mut generators = Vec::new();

        while self.eat(&Token::For) {
            let target = self.target_list()?;
            self.expect(&Token::In, "'in' in comprehension")?;
            let iter = self.disjunction()?;

            let mut conditions = Vec::new();
            while self.eat(&Token::If) {
                conditions.push(self.disjunction()?);
            }

            generators.push(Generator { target, iter, conditions });
        }

        Ok(Node::Comprehension {
            element: Box::new(element),
            generators,
        })
    }

    fn target_list(&mut self) -> Result<Node, EvalError> {
        let first = self.nested_bitor()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }

        let mut targets = vec![first];
        while self.eat(&Token::Comma) {
            if self.check(&Token::In) {
                break;
            }
            targets.push(self.nested_bitor()?);
        }
        Ok(Node::Tuple(targets))
    }
}

fn describe(token: &Token) -> String {
    let text = match token {
        Token::Name(name) => return format!("name '{name}'"),
        Token::Int(i) => return format!("number {i}"),
        Token::Float(f) => return format!("number {f}"),
        Token::Str(_) => return "string literal".to_string(),
        Token::And => "and",
        Token::Or => "or",
        Token::Not => "not",
        Token::In => "in",
        Token::Is => "is",
        Token::If => "if",
        Token::Else => "else",
        Token::For => "for",
        Token::Lambda => "lambda",
        Token::True => "True",
        Token::False => "False",
        Token::None => "None",
        Token::Plus => "+",
        Token::Minus => "-",
        Token::Star => "*",
        Token::DoubleStar => "**",
        Token::Slash => "/",
        Token::DoubleSlash => "//",
        Token::Percent => "%",
        Token::At => "@",
        Token::Amp => "&",
        Token::Pipe => "|",
        Token::Caret => "^",
        Token::Tilde => "~",
        Token::LeftShift => "<<",
        Token::RightShift => ">>",
        Token::EqEq => "==",
        Token::NotEq => "!=",
        Token::Lt => "<",
        Token::LtEq => "<=",
        Token::Gt => ">",
        Token::GtEq => ">=",
        Token::Assign => "=",
        Token::Walrus => ":=",
        Token::LParen => "(",
        Token::RParen => ")",
        Token::LBracket => "[",
        Token::RBracket => "]",
        Token::LBrace => "{",
        Token::RBrace => "}",
        Token::Comma => ",",
        Token::Colon => ":",
        Token::Dot => ".",
    };
    format!("'{text}'")
}
