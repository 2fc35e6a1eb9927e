//! Lexes pattern text into a validated infix token stream and reorders it
//! into postfix with a shunting-yard pass.
//!
//! # Example
//!
//! ```
//! use seqex_compiler::tokenizer::{to_postfix, tokenize};
//!
//! let postfix = tokenize("^A/B*|C$").map(to_postfix).expect("pattern is well-formed");
//! let rendered: Vec<String> = postfix.iter().map(|t| t.token().to_string()).collect();
//!
//! assert_eq!("^ A / B * / C $ / |", rendered.join(" "));
//! ```

use std::fmt::Display;

use parcel::parsers::character::{alphabetic, digit, expect_character};
use parcel::prelude::v1::*;
use seqex_runtime::CaptureKey;

use crate::parser::{ParseErr, ParseErrKind};

/// The type name matching any item.
pub const WILDCARD: &str = "_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A type name with an optional guard, compiled to a single `Filter`.
    Filter {
        type_name: String,
        guard: Option<String>,
    },
    Begin,
    End,
    Catenation,
    Alternation,
    ZeroOrMore,
    OneOrMore,
    ZeroOrOne,
    /// Opens a group in the infix stream. Groups without a key are
    /// synthesized and capture nothing.
    OpenGroup(Option<CaptureKey>),
    CloseGroup(Option<CaptureKey>),
    /// Opens a capture in the postfix stream.
    StartSaving(CaptureKey),
    StopSaving(CaptureKey),
}

impl Token {
    pub fn filter<S: Into<String>>(type_name: S, guard: Option<&str>) -> Self {
        Token::Filter {
            type_name: type_name.into(),
            guard: guard.map(str::to_string),
        }
    }

    /// Binding strength of the binary operators.
    fn precedence(&self) -> Option<u8> {
        match self {
            Token::Catenation => Some(2),
            Token::Alternation => Some(1),
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Filter {
                type_name,
                guard: Some(guard),
            } => write!(f, "{}({})", type_name, guard),
            Token::Filter {
                type_name,
                guard: None,
            } => write!(f, "{}", type_name),
            Token::Begin => write!(f, "^"),
            Token::End => write!(f, "$"),
            Token::Catenation => write!(f, "/"),
            Token::Alternation => write!(f, "|"),
            Token::ZeroOrMore => write!(f, "*"),
            Token::OneOrMore => write!(f, "+"),
            Token::ZeroOrOne => write!(f, "?"),
            Token::OpenGroup(Some(CaptureKey::Name(name))) => write!(f, "(?<{}>", name),
            Token::OpenGroup(_) => write!(f, "("),
            Token::CloseGroup(_) => write!(f, ")"),
            Token::StartSaving(key) => write!(f, "Save[{}]", key),
            Token::StopSaving(key) => write!(f, "Stop[{}]", key),
        }
    }
}

/// A token and the character offset in the pattern it originated from.
/// Synthesized tokens carry the offset of the character that caused them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    token: Token,
    offset: usize,
}

impl Spanned {
    pub fn new(token: Token, offset: usize) -> Self {
        Self { token, offset }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn into_token(self) -> Token {
        self.token
    }
}

/// Lexes a pattern into infix tokens, synthesizing anchoring catenations and
/// the search-anywhere prefix for patterns that don't begin with `^` or `(`.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseErr> {
    let input: Vec<(usize, char)> = source.chars().enumerate().collect();

    Lexer::new(input.len()).lex(&input)
}

/// Reorders a well-formed infix stream into postfix. Repetition operators
/// are already postfix and bind tightest, so they pass straight through.
pub fn to_postfix(infix: Vec<Spanned>) -> Vec<Spanned> {
    let mut output = Vec::with_capacity(infix.len());
    let mut operators: Vec<Spanned> = vec![];

    for spanned in infix {
        let offset = spanned.offset;
        match spanned.token {
            Token::Catenation | Token::Alternation => {
                let precedence = spanned.token.precedence();
                while let Some(top) = operators.last() {
                    if top.token.precedence().is_some() && top.token.precedence() >= precedence {
                        output.extend(operators.pop());
                    } else {
                        break;
                    }
                }
                operators.push(spanned);
            }
            Token::OpenGroup(ref key) => {
                if let Some(key) = key {
                    output.push(Spanned::new(Token::StartSaving(key.clone()), offset));
                }
                operators.push(spanned);
            }
            Token::CloseGroup(key) => {
                while let Some(top) = operators.pop() {
                    if let Token::OpenGroup(_) = top.token {
                        break;
                    }
                    output.push(top);
                }
                if let Some(key) = key {
                    output.push(Spanned::new(Token::StopSaving(key), offset));
                }
            }
            _ => output.push(spanned),
        }
    }

    // a validated stream has no open groups left on the stack.
    while let Some(top) = operators.pop() {
        output.push(top);
    }

    output
}

struct Lexer {
    tokens: Vec<Spanned>,
    open_groups: Vec<(Option<CaptureKey>, usize)>,
    next_group_index: usize,
    expect_operand: bool,
    end_offset: usize,
}

impl Lexer {
    fn new(end_offset: usize) -> Self {
        Self {
            tokens: vec![],
            open_groups: vec![],
            next_group_index: 0,
            expect_operand: true,
            end_offset,
        }
    }

    fn lex(mut self, input: &[(usize, char)]) -> Result<Vec<Spanned>, ParseErr> {
        let start = match skip_whitespace(input).first() {
            Some(&(offset, c)) => {
                if c != '^' && c != '(' {
                    self.search_anywhere(offset);
                }
                offset
            }
            None => return Err(ParseErr::new(ParseErrKind::EmptyPattern, 0)),
        };

        let mut rest = input;
        loop {
            rest = skip_whitespace(rest);
            let (offset, c) = match rest.first() {
                Some(&(offset, c)) => (offset, c),
                None => break,
            };

            rest = match c {
                '^' if offset == start => {
                    self.push(Token::Begin, offset);
                    self.expect_operand = false;
                    &rest[1..]
                }
                '$' => {
                    if !self.expect_operand {
                        self.push(Token::Catenation, offset);
                    }
                    self.push(Token::End, offset);
                    self.expect_operand = false;
                    &rest[1..]
                }
                '*' => self.repetition(Token::ZeroOrMore, rest)?,
                '+' => self.repetition(Token::OneOrMore, rest)?,
                '?' => self.repetition(Token::ZeroOrOne, rest)?,
                '/' | ',' => self.binary(Token::Catenation, rest)?,
                '|' => self.binary(Token::Alternation, rest)?,
                '(' => self.open_group(rest)?,
                ')' => self.close_group(rest)?,
                c if c == '_' || c.is_ascii_alphabetic() => self.atom(rest)?,
                c => return Err(ParseErr::new(ParseErrKind::UnexpectedCharacter(c), offset)),
            };
        }

        self.finish()
    }

    fn push(&mut self, token: Token, offset: usize) {
        self.tokens.push(Spanned::new(token, offset))
    }

    /// Prefixes the pattern with `^ / _* / (`, closed again at the end of
    /// input.
    fn search_anywhere(&mut self, offset: usize) {
        self.push(Token::Begin, offset);
        self.push(Token::Catenation, offset);
        self.push(Token::filter(WILDCARD, None), offset);
        self.push(Token::ZeroOrMore, offset);
        self.push(Token::Catenation, offset);
        self.push(Token::OpenGroup(None), offset);
        self.open_groups.push((None, offset));
    }

    /// Prepares for an operand at `offset`, synthesizing the catenation that
    /// follows a leading `^`.
    fn begin_operand(&mut self, offset: usize) -> Result<(), ParseErr> {
        if self.expect_operand {
            return Ok(());
        }

        match self.tokens.last() {
            Some(Spanned {
                token: Token::Begin,
                ..
            }) => {
                self.push(Token::Catenation, offset);
                Ok(())
            }
            _ => Err(ParseErr::new(ParseErrKind::MissingCatenation, offset)),
        }
    }

    fn repetition<'a>(
        &mut self,
        token: Token,
        input: &'a [(usize, char)],
    ) -> Result<&'a [(usize, char)], ParseErr> {
        let offset = input[0].0;
        if self.expect_operand {
            return Err(ParseErr::new(ParseErrKind::MissingOperand, offset));
        }

        self.push(token, offset);
        Ok(&input[1..])
    }

    fn binary<'a>(
        &mut self,
        token: Token,
        input: &'a [(usize, char)],
    ) -> Result<&'a [(usize, char)], ParseErr> {
        let offset = input[0].0;
        if self.expect_operand {
            return Err(ParseErr::new(ParseErrKind::MissingOperand, offset));
        }

        self.push(token, offset);
        self.expect_operand = true;
        Ok(&input[1..])
    }

    fn open_group<'a>(
        &mut self,
        input: &'a [(usize, char)],
    ) -> Result<&'a [(usize, char)], ParseErr> {
        let offset = input[0].0;
        self.begin_operand(offset)?;

        let after_paren = &input[1..];
        let (key, rest) = match after_paren.first() {
            Some(&(modifier_offset, '?')) => match group_name().parse(after_paren) {
                Ok(MatchStatus::Match {
                    remainder, inner, ..
                }) => (CaptureKey::Name(inner), remainder),
                _ => {
                    return Err(ParseErr::new(
                        ParseErrKind::UnexpectedCharacter('?'),
                        modifier_offset,
                    ))
                }
            },
            _ => {
                let idx = self.next_group_index;
                self.next_group_index += 1;
                (CaptureKey::Index(idx), after_paren)
            }
        };

        self.push(Token::OpenGroup(Some(key.clone())), offset);
        self.open_groups.push((Some(key), offset));
        self.expect_operand = true;
        Ok(rest)
    }

    fn close_group<'a>(
        &mut self,
        input: &'a [(usize, char)],
    ) -> Result<&'a [(usize, char)], ParseErr> {
        let offset = input[0].0;
        let key = match self.open_groups.last() {
            Some((Some(key), _)) => key.clone(),
            _ => return Err(ParseErr::new(ParseErrKind::UnbalancedGroup, offset)),
        };
        if self.expect_operand {
            return Err(ParseErr::new(ParseErrKind::MissingOperand, offset));
        }

        self.open_groups.pop();
        self.push(Token::CloseGroup(Some(key)), offset);
        Ok(&input[1..])
    }

    fn atom<'a>(&mut self, input: &'a [(usize, char)]) -> Result<&'a [(usize, char)], ParseErr> {
        let (offset, c) = input[0];
        self.begin_operand(offset)?;

        match atom().parse(input) {
            Ok(MatchStatus::Match {
                remainder,
                inner: (type_name, guard),
                ..
            }) => {
                // a paren directly after the type name always opens a guard.
                if let (None, Some(&(paren_offset, '('))) = (&guard, remainder.first()) {
                    return Err(ParseErr::new(ParseErrKind::UnterminatedGuard, paren_offset));
                }

                self.push(Token::Filter { type_name, guard }, offset);
                self.expect_operand = false;
                Ok(remainder)
            }
            _ => Err(ParseErr::new(ParseErrKind::UnexpectedCharacter(c), offset)),
        }
    }

    fn finish(mut self) -> Result<Vec<Spanned>, ParseErr> {
        if self.expect_operand {
            return Err(ParseErr::new(ParseErrKind::MissingOperand, self.end_offset));
        }

        while let Some((key, offset)) = self.open_groups.pop() {
            match key {
                Some(_) => return Err(ParseErr::new(ParseErrKind::UnbalancedGroup, offset)),
                None => self.push(Token::CloseGroup(None), self.end_offset),
            }
        }

        Ok(self.tokens)
    }
}

fn skip_whitespace(input: &[(usize, char)]) -> &[(usize, char)] {
    let skipped = input.iter().take_while(|(_, c)| c.is_whitespace()).count();
    &input[skipped..]
}

// Atoms

fn atom<'a>() -> impl Parser<'a, &'a [(usize, char)], (String, Option<String>)> {
    parcel::join(type_name(), parcel::optional(guard()))
}

/// Dot separated identifiers, e.g. `geo.Point`.
fn type_name<'a>() -> impl Parser<'a, &'a [(usize, char)], String> {
    parcel::join(
        identifier(),
        parcel::zero_or_more(parcel::right(parcel::join(
            expect_character('.'),
            identifier(),
        ))),
    )
    .map(|(head, tail)| vec![head].into_iter().chain(tail).collect::<Vec<_>>().join("."))
}

fn group_name<'a>() -> impl Parser<'a, &'a [(usize, char)], String> {
    parcel::right(parcel::join(
        parcel::join(expect_character('?'), expect_character('<')),
        parcel::left(parcel::join(identifier(), expect_character('>'))),
    ))
}

/// The verbatim text between balanced parens.
fn guard<'a>() -> impl Parser<'a, &'a [(usize, char)], String> {
    move |input: &'a [(usize, char)]| {
        let start = match input.first() {
            Some(&(start, '(')) => start,
            _ => return Ok(MatchStatus::NoMatch(input)),
        };

        let mut depth = 0usize;
        for (idx, &(pos, c)) in input.iter().enumerate() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(MatchStatus::Match {
                            span: start..pos + 1,
                            remainder: &input[idx + 1..],
                            inner: input[1..idx].iter().map(|&(_, c)| c).collect(),
                        });
                    }
                }
                _ => (),
            }
        }

        Ok(MatchStatus::NoMatch(input))
    }
}

// Terminals

fn identifier<'a>() -> impl Parser<'a, &'a [(usize, char)], String> {
    parcel::join(
        parcel::or(ascii_letter(), || expect_character('_')),
        parcel::zero_or_more(parcel::or(ascii_letter(), || {
            parcel::or(digit(10), || expect_character('_'))
        })),
    )
    .map(|(head, tail)| vec![head].into_iter().chain(tail).collect::<String>())
}

fn ascii_letter<'a>() -> impl Parser<'a, &'a [(usize, char)], char> {
    alphabetic().predicate(|c| c.is_ascii_alphabetic())
}
