use std::fmt;

use super::test_case::TestCase;

/// The attribute holding a test case's tag set.
const TAGS: &str = "tc.tags";
/// The attribute holding a test case's priority.
const PRIORITY: &str = "tc.priority";

/// A parsed selection query.
///
/// Queries are a restricted boolean language over one test case's tags and
/// priority:
///
/// - membership: `"smoke" in tc.tags`, `"slow" not in tc.tags`
/// - comparison: `tc.priority >= 3` with `<`, `<=`, `>`, `>=`, `==`, `!=`
/// - combinators: `and` (binds tighter) and `or`, plus parentheses
///
/// String literals take double or single quotes without escapes; integers
/// may carry a leading minus sign. The grammar deliberately has no general
/// identifiers, no function calls, and no side effects: query text is
/// untrusted configuration authored inside library records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(Expr);

impl Query {
    /// Parses a query expression.
    ///
    /// # Errors
    ///
    /// Returns a `SyntaxError` describing the first offending token when the
    /// text does not conform to the grammar.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let tokens = lex(text)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if let Some(trailing) = parser.peek() {
            return Err(SyntaxError::Unexpected {
                expected: "end of query",
                found: trailing.to_string(),
            });
        }
        Ok(Self(expr))
    }

    /// Evaluates the query against one test case.
    ///
    /// `and`/`or` short-circuit, so the right-hand side of a decided
    /// combinator is never inspected.
    ///
    /// # Errors
    ///
    /// Returns an `EvaluateError` if the query references an attribute other
    /// than `tc.tags`/`tc.priority`, or applies an operator to an attribute
    /// of the wrong shape.
    pub fn matches(&self, case: &TestCase) -> Result<bool, EvaluateError> {
        self.0.evaluate(case)
    }
}

/// Errors raised while parsing a query expression.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyntaxError {
    /// A character outside the query alphabet.
    #[error("unexpected character '{found}' at byte {at}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Byte offset into the query text.
        at: usize,
    },

    /// A string literal was opened but never closed.
    #[error("unterminated string literal starting at byte {at}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        at: usize,
    },

    /// An integer literal does not fit in 64 bits.
    #[error("integer literal '{0}' is out of range")]
    IntOutOfRange(String),

    /// A token appeared where another construct was required.
    #[error("expected {expected}, found {found}")]
    Unexpected {
        /// What the grammar required at this point.
        expected: &'static str,
        /// The token actually found.
        found: String,
    },

    /// The query ended before the expression was complete.
    #[error("unexpected end of query: expected {expected}")]
    UnexpectedEnd {
        /// What the grammar required at this point.
        expected: &'static str,
    },
}

/// Errors raised while evaluating a parsed query against a test case.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EvaluateError {
    /// The query references an attribute the engine does not expose.
    #[error("unknown attribute '{0}': queries may reference 'tc.tags' and 'tc.priority'")]
    UnknownAttribute(String),

    /// A membership test was applied to a non-collection attribute.
    #[error("attribute '{0}' does not support membership tests")]
    Membership(String),

    /// An ordered comparison was applied to a non-numeric attribute.
    #[error("attribute '{0}' does not support numeric comparison")]
    Comparison(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    In {
        literal: String,
        attribute: Attribute,
        negated: bool,
    },
    Compare {
        attribute: Attribute,
        op: CompareOp,
        value: i64,
    },
}

impl Expr {
    fn evaluate(&self, case: &TestCase) -> Result<bool, EvaluateError> {
        match self {
            Self::Or(lhs, rhs) => Ok(lhs.evaluate(case)? || rhs.evaluate(case)?),
            Self::And(lhs, rhs) => Ok(lhs.evaluate(case)? && rhs.evaluate(case)?),
            Self::In {
                literal,
                attribute,
                negated,
            } => match attribute.as_str() {
                TAGS => {
                    let held = case.tags.contains(literal);
                    Ok(if *negated { !held } else { held })
                }
                PRIORITY => Err(EvaluateError::Membership(attribute.to_string())),
                other => Err(EvaluateError::UnknownAttribute(other.to_string())),
            },
            Self::Compare {
                attribute,
                op,
                value,
            } => match attribute.as_str() {
                PRIORITY => Ok(op.apply(case.priority, *value)),
                TAGS => Err(EvaluateError::Comparison(attribute.to_string())),
                other => Err(EvaluateError::UnknownAttribute(other.to_string())),
            },
        }
    }
}

/// A dotted attribute path as written in the query.
///
/// Unknown paths survive parsing and are rejected at evaluation time, so a
/// syntactically valid query always produces a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute(String);

impl Attribute {
    fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CompareOp {
    const fn apply(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(String),
    Int(i64),
    Dot,
    LParen,
    RParen,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    Ne,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Word(word) => write!(f, "'{word}'"),
            Self::Str(literal) => write!(f, "string {literal:?}"),
            Self::Int(value) => write!(f, "integer {value}"),
            Self::Dot => f.write_str("'.'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Lt => f.write_str("'<'"),
            Self::Le => f.write_str("'<='"),
            Self::Gt => f.write_str("'>'"),
            Self::Ge => f.write_str("'>='"),
            Self::EqEq => f.write_str("'=='"),
            Self::Ne => f.write_str("'!='"),
        }
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(word, "and" | "or" | "not" | "in")
}

fn lex(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((at, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            '.' => tokens.push(Token::Dot),
            '<' => tokens.push(follow(&mut chars, Token::Le, Token::Lt)),
            '>' => tokens.push(follow(&mut chars, Token::Ge, Token::Gt)),
            '=' => match chars.peek() {
                Some((_, '=')) => {
                    chars.next();
                    tokens.push(Token::EqEq);
                }
                _ => return Err(SyntaxError::UnexpectedChar { found: '=', at }),
            },
            '!' => match chars.peek() {
                Some((_, '=')) => {
                    chars.next();
                    tokens.push(Token::Ne);
                }
                _ => return Err(SyntaxError::UnexpectedChar { found: '!', at }),
            },
            '"' | '\'' => tokens.push(lex_string(&mut chars, c, at)?),
            '-' => {
                if !matches!(chars.peek(), Some((_, d)) if d.is_ascii_digit()) {
                    return Err(SyntaxError::UnexpectedChar { found: '-', at });
                }
                tokens.push(lex_int(&mut chars, c)?);
            }
            c if c.is_ascii_digit() => tokens.push(lex_int(&mut chars, c)?),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some((_, w)) = chars.peek() {
                    if w.is_ascii_alphanumeric() || *w == '_' {
                        word.push(*w);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(word));
            }
            other => return Err(SyntaxError::UnexpectedChar { found: other, at }),
        }
    }

    Ok(tokens)
}

/// Emits `long` when the next character is `=`, otherwise `short`.
fn follow(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    long: Token,
    short: Token,
) -> Token {
    if matches!(chars.peek(), Some((_, '='))) {
        chars.next();
        long
    } else {
        short
    }
}

fn lex_string(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    quote: char,
    at: usize,
) -> Result<Token, SyntaxError> {
    let mut literal = String::new();
    loop {
        match chars.next() {
            Some((_, c)) if c == quote => return Ok(Token::Str(literal)),
            Some((_, c)) => literal.push(c),
            None => return Err(SyntaxError::UnterminatedString { at }),
        }
    }
}

fn lex_int(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    first: char,
) -> Result<Token, SyntaxError> {
    let mut digits = String::from(first);
    while let Some((_, d)) = chars.peek() {
        if d.is_ascii_digit() {
            digits.push(*d);
            chars.next();
        } else {
            break;
        }
    }
    let value = digits
        .parse::<i64>()
        .map_err(|_| SyntaxError::IntOutOfRange(digits))?;
    Ok(Token::Int(value))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w == word)
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_and()?;
        while self.peek_word("or") {
            self.pos += 1;
            let rhs = self.parse_and()?;
            expr = Expr::Or(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        while self.peek_word("and") {
            self.pos += 1;
            let rhs = self.parse_primary()?;
            expr = Expr::And(Box::new(expr), Box::new(rhs));
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        const EXPECTED: &str = "a string literal, an attribute, or '('";
        match self.advance() {
            Some(Token::LParen) => {
                let expr = self.parse_or()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(expr),
                    Some(other) => Err(SyntaxError::Unexpected {
                        expected: "')'",
                        found: other.to_string(),
                    }),
                    None => Err(SyntaxError::UnexpectedEnd { expected: "')'" }),
                }
            }
            Some(Token::Str(literal)) => self.parse_membership(literal),
            Some(Token::Word(word)) if !is_keyword(&word) => self.parse_comparison(word),
            Some(other) => Err(SyntaxError::Unexpected {
                expected: EXPECTED,
                found: other.to_string(),
            }),
            None => Err(SyntaxError::UnexpectedEnd { expected: EXPECTED }),
        }
    }

    /// Parses the remainder of a membership test after its string literal.
    ///
    /// The literal is always the left-hand side; `tc.tags in "smoke"` is a
    /// syntax error, not a reversed membership test.
    fn parse_membership(&mut self, literal: String) -> Result<Expr, SyntaxError> {
        let negated = match self.advance() {
            Some(Token::Word(w)) if w == "in" => false,
            Some(Token::Word(w)) if w == "not" => match self.advance() {
                Some(Token::Word(w)) if w == "in" => true,
                Some(other) => {
                    return Err(SyntaxError::Unexpected {
                        expected: "'in'",
                        found: other.to_string(),
                    });
                }
                None => return Err(SyntaxError::UnexpectedEnd { expected: "'in'" }),
            },
            Some(other) => {
                return Err(SyntaxError::Unexpected {
                    expected: "'in' or 'not in'",
                    found: other.to_string(),
                });
            }
            None => {
                return Err(SyntaxError::UnexpectedEnd {
                    expected: "'in' or 'not in'",
                });
            }
        };
        let attribute = self.parse_attribute()?;
        Ok(Expr::In {
            literal,
            attribute,
            negated,
        })
    }

    /// Parses the remainder of a comparison after its first attribute word.
    ///
    /// The attribute is always the left-hand side; `5 < tc.priority` is a
    /// syntax error, not a reversed comparison.
    fn parse_comparison(&mut self, first: String) -> Result<Expr, SyntaxError> {
        let attribute = self.parse_attribute_rest(first)?;
        let op = match self.advance() {
            Some(Token::Lt) => CompareOp::Lt,
            Some(Token::Le) => CompareOp::Le,
            Some(Token::Gt) => CompareOp::Gt,
            Some(Token::Ge) => CompareOp::Ge,
            Some(Token::EqEq) => CompareOp::Eq,
            Some(Token::Ne) => CompareOp::Ne,
            Some(other) => {
                return Err(SyntaxError::Unexpected {
                    expected: "a comparison operator",
                    found: other.to_string(),
                });
            }
            None => {
                return Err(SyntaxError::UnexpectedEnd {
                    expected: "a comparison operator",
                });
            }
        };
        let value = match self.advance() {
            Some(Token::Int(value)) => value,
            Some(other) => {
                return Err(SyntaxError::Unexpected {
                    expected: "an integer literal",
                    found: other.to_string(),
                });
            }
            None => {
                return Err(SyntaxError::UnexpectedEnd {
                    expected: "an integer literal",
                });
            }
        };
        Ok(Expr::Compare {
            attribute,
            op,
            value,
        })
    }

    fn parse_attribute(&mut self) -> Result<Attribute, SyntaxError> {
        match self.advance() {
            Some(Token::Word(word)) if !is_keyword(&word) => self.parse_attribute_rest(word),
            Some(other) => Err(SyntaxError::Unexpected {
                expected: "an attribute",
                found: other.to_string(),
            }),
            None => Err(SyntaxError::UnexpectedEnd {
                expected: "an attribute",
            }),
        }
    }

    fn parse_attribute_rest(&mut self, first: String) -> Result<Attribute, SyntaxError> {
        let mut path = first;
        while matches!(self.peek(), Some(Token::Dot)) {
            self.pos += 1;
            match self.advance() {
                Some(Token::Word(word)) if !is_keyword(&word) => {
                    path.push('.');
                    path.push_str(&word);
                }
                Some(other) => {
                    return Err(SyntaxError::Unexpected {
                        expected: "an attribute segment",
                        found: other.to_string(),
                    });
                }
                None => {
                    return Err(SyntaxError::UnexpectedEnd {
                        expected: "an attribute segment",
                    });
                }
            }
        }
        Ok(Attribute(path))
    }
}
