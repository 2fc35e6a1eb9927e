//! Assembles a postfix token stream into a program by Thompson construction.
//! Fragments are built with jump offsets relative to their own instructions
//! and back-patched to absolute addresses once the program is complete.

use std::fmt::Display;

use seqex_runtime::*;

use crate::registry::{GuardCompiler, TypeResolver};
use crate::tokenizer::{Spanned, Token, WILDCARD};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrKind {
    UnexpectedCharacter(char),
    UnbalancedGroup,
    UnterminatedGuard,
    MissingOperand,
    MissingCatenation,
    UnresolvedType(String),
    InvalidGuard(String),
    EmptyPattern,
    ProgramTooLarge,
}

impl Display for ParseErrKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedCharacter(c) => write!(f, "unexpected character `{}`", c),
            Self::UnbalancedGroup => write!(f, "unbalanced group"),
            Self::UnterminatedGuard => write!(f, "unterminated guard"),
            Self::MissingOperand => write!(f, "operator is missing an operand"),
            Self::MissingCatenation => write!(f, "operands must be joined by `/` or `,`"),
            Self::UnresolvedType(name) => write!(f, "unresolved type `{}`", name),
            Self::InvalidGuard(msg) => write!(f, "invalid guard: {}", msg),
            Self::EmptyPattern => write!(f, "pattern is empty"),
            Self::ProgramTooLarge => write!(f, "program exceeds the addressable size"),
        }
    }
}

/// A compile-time error and the character offset of the pattern it was
/// raised at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErr {
    kind: ParseErrKind,
    offset: usize,
}

impl ParseErr {
    pub fn new(kind: ParseErrKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    pub fn kind(&self) -> &ParseErrKind {
        &self.kind
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Display for ParseErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)
    }
}

impl std::error::Error for ParseErr {}

/// An instruction with jump targets relative to its own address.
enum RelativeInstruction<T> {
    BeginInput,
    EndInput,
    Filter(Predicate<T>),
    Split(i32, i32),
    Jump(i32),
    Save(CaptureKey),
    Stop(CaptureKey),
    Match,
}

impl<T> RelativeInstruction<T> {
    fn into_instruction_with_index(self, idx: i32) -> Option<Instruction<T>> {
        let absolute = |rel: i32| -> Option<Target> {
            let target: u32 = idx.checked_add(rel)?.try_into().ok()?;
            Some(Target::absolute(target))
        };

        let inst = match self {
            RelativeInstruction::BeginInput => Instruction::BeginInput,
            RelativeInstruction::EndInput => Instruction::EndInput,
            RelativeInstruction::Filter(predicate) => Instruction::Filter(InstFilter::new(predicate)),
            RelativeInstruction::Split(rel_x, rel_y) => {
                Instruction::Split(InstSplit::new(absolute(rel_x)?, absolute(rel_y)?))
            }
            RelativeInstruction::Jump(rel) => Instruction::Jump(InstJump::new(absolute(rel)?)),
            RelativeInstruction::Save(key) => Instruction::Save(InstSave::new(key)),
            RelativeInstruction::Stop(key) => Instruction::Stop(InstStop::new(key)),
            RelativeInstruction::Match => Instruction::Match,
        };

        Some(inst)
    }
}

type Fragment<T> = Vec<RelativeInstruction<T>>;

/// An entry of the assembly stack, either a finished fragment or the marker
/// of an open capture.
enum Operand<T> {
    Fragment(Fragment<T>),
    Capture(CaptureKey),
}

/// Assembles a postfix token stream into a program, resolving filters
/// through `env` and appending the final `Match`.
pub fn parse<T, E>(postfix: Vec<Spanned>, env: &E) -> Result<Vec<Instruction<T>>, ParseErr>
where
    T: 'static,
    E: TypeResolver<T> + GuardCompiler<T>,
{
    let mut stack: Vec<Operand<T>> = vec![];
    let mut last_offset = 0;

    for spanned in postfix {
        let offset = spanned.offset();
        last_offset = offset;

        match spanned.into_token() {
            Token::Filter { type_name, guard } => {
                let predicate = filter_predicate(env, type_name, guard)
                    .map_err(|kind| ParseErr::new(kind, offset))?;
                stack.push(Operand::Fragment(vec![RelativeInstruction::Filter(predicate)]));
            }
            Token::Begin => stack.push(Operand::Fragment(vec![RelativeInstruction::BeginInput])),
            Token::End => stack.push(Operand::Fragment(vec![RelativeInstruction::EndInput])),
            Token::Catenation => {
                let (lhs, rhs) = pop_pair(&mut stack, offset)?;
                stack.push(Operand::Fragment(catenation(lhs, rhs)));
            }
            Token::Alternation => {
                let (lhs, rhs) = pop_pair(&mut stack, offset)?;
                stack.push(Operand::Fragment(alternation(lhs, rhs)));
            }
            Token::ZeroOrMore => {
                let operand = pop_fragment(&mut stack, offset)?;
                stack.push(Operand::Fragment(zero_or_more(operand)));
            }
            Token::OneOrMore => {
                let operand = pop_fragment(&mut stack, offset)?;
                stack.push(Operand::Fragment(one_or_more(operand)));
            }
            Token::ZeroOrOne => {
                let operand = pop_fragment(&mut stack, offset)?;
                stack.push(Operand::Fragment(zero_or_one(operand)));
            }
            Token::StartSaving(key) => stack.push(Operand::Capture(key)),
            Token::StopSaving(key) => {
                let enclosed = pop_fragment(&mut stack, offset)?;
                match stack.pop() {
                    Some(Operand::Capture(opened)) if opened == key => {
                        stack.push(Operand::Fragment(capture(key, enclosed)))
                    }
                    _ => return Err(ParseErr::new(ParseErrKind::UnbalancedGroup, offset)),
                }
            }
            // groups are resolved into captures by the postfix reordering.
            Token::OpenGroup(_) | Token::CloseGroup(_) => {
                return Err(ParseErr::new(ParseErrKind::UnbalancedGroup, offset))
            }
        }
    }

    let program = match (stack.pop(), stack.is_empty()) {
        (Some(Operand::Fragment(program)), true) => program,
        (None, _) => return Err(ParseErr::new(ParseErrKind::EmptyPattern, 0)),
        (Some(Operand::Capture(_)), _) => {
            return Err(ParseErr::new(ParseErrKind::UnbalancedGroup, last_offset))
        }
        (Some(Operand::Fragment(_)), false) => {
            return Err(ParseErr::new(ParseErrKind::MissingCatenation, last_offset))
        }
    };

    program
        .into_iter()
        .chain([RelativeInstruction::Match])
        .enumerate()
        .map(|(idx, inst)| {
            i32::try_from(idx)
                .ok()
                .and_then(|idx| inst.into_instruction_with_index(idx))
        })
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ParseErr::new(ParseErrKind::ProgramTooLarge, last_offset))
}

/// Builds the predicate of a filter atom. The wildcard skips type
/// resolution.
fn filter_predicate<T, E>(
    env: &E,
    type_name: String,
    guard: Option<String>,
) -> Result<Predicate<T>, ParseErrKind>
where
    T: 'static,
    E: TypeResolver<T> + GuardCompiler<T>,
{
    let is_wildcard = type_name == WILDCARD;
    let instance_of = if is_wildcard {
        Predicate::any()
    } else {
        env.resolve_type(&type_name)
            .ok_or_else(|| ParseErrKind::UnresolvedType(type_name.clone()))?
    };

    match guard {
        Some(source) => {
            let guard_type = (!is_wildcard).then_some(type_name.as_str());
            env.compile_guard(guard_type, &source)
                .map(|guard| instance_of.and(guard))
                .map_err(ParseErrKind::InvalidGuard)
        }
        None => Ok(instance_of),
    }
}

fn pop_fragment<T>(stack: &mut Vec<Operand<T>>, offset: usize) -> Result<Fragment<T>, ParseErr> {
    match stack.pop() {
        Some(Operand::Fragment(fragment)) => Ok(fragment),
        _ => Err(ParseErr::new(ParseErrKind::MissingOperand, offset)),
    }
}

fn pop_pair<T>(
    stack: &mut Vec<Operand<T>>,
    offset: usize,
) -> Result<(Fragment<T>, Fragment<T>), ParseErr> {
    let rhs = pop_fragment(stack, offset)?;
    let lhs = pop_fragment(stack, offset)?;

    Ok((lhs, rhs))
}

fn len_of<T>(fragment: &Fragment<T>) -> i32 {
    // fragments larger than i32::MAX are caught when back-patching.
    i32::try_from(fragment.len()).unwrap_or(i32::MAX)
}

fn catenation<T>(lhs: Fragment<T>, rhs: Fragment<T>) -> Fragment<T> {
    lhs.into_iter().chain(rhs).collect()
}

/// `Split(L1, L2); L1: <lhs>; Jump(End); L2: <rhs>; End:`
fn alternation<T>(lhs: Fragment<T>, rhs: Fragment<T>) -> Fragment<T> {
    let (lhs_len, rhs_len) = (len_of(&lhs), len_of(&rhs));

    [RelativeInstruction::Split(1, lhs_len.saturating_add(2))]
        .into_iter()
        .chain(lhs)
        .chain([RelativeInstruction::Jump(rhs_len.saturating_add(1))])
        .chain(rhs)
        .collect()
}

/// `L1: Split(L2, End); L2: <e>; Jump(L1); End:`
fn zero_or_more<T>(operand: Fragment<T>) -> Fragment<T> {
    let len = len_of(&operand);

    [RelativeInstruction::Split(1, len.saturating_add(2))]
        .into_iter()
        .chain(operand)
        .chain([RelativeInstruction::Jump(-len.saturating_add(1))])
        .collect()
}

/// `L1: <e>; Split(L1, End); End:`
fn one_or_more<T>(operand: Fragment<T>) -> Fragment<T> {
    let len = len_of(&operand);

    operand
        .into_iter()
        .chain([RelativeInstruction::Split(-len, 1)])
        .collect()
}

/// `Split(L1, End); L1: <e>; End:`
fn zero_or_one<T>(operand: Fragment<T>) -> Fragment<T> {
    let len = len_of(&operand);

    [RelativeInstruction::Split(1, len.saturating_add(1))]
        .into_iter()
        .chain(operand)
        .collect()
}

fn capture<T>(key: CaptureKey, enclosed: Fragment<T>) -> Fragment<T> {
    [RelativeInstruction::Save(key.clone())]
        .into_iter()
        .chain(enclosed)
        .chain([RelativeInstruction::Stop(key)])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::tokenizer::{to_postfix, tokenize};

    fn registry() -> Registry<char> {
        Registry::new()
            .with_type("A", |c: &char| *c == 'a')
            .with_type("B", |c: &char| *c == 'b')
            .with_type("C", |c: &char| *c == 'c')
            .with_guard("upper", |c: &char, _: &mut Variables| c.is_uppercase())
    }

    fn dump(pattern: &str) -> Result<String, ParseErr> {
        let postfix = tokenize(pattern).map(to_postfix)?;
        let program = Program::new(parse(postfix, &registry())?).with_name(pattern);

        Ok(program.to_string())
    }

    #[test]
    fn should_compile_anchored_catenation() {
        assert_eq!(
            Ok("^A/B$:
  0: BeginInput
  1: Filter: A
  2: Filter: B
  3: EndInput
  4: Match\n"
                .to_string()),
            dump("^A/B$")
        );
    }

    #[test]
    fn should_compile_search_anywhere_prefix() {
        assert_eq!(
            Ok("A:
  0: BeginInput
  1: Split: (0002), (0004)
  2: Filter: _
  3: Jump: (0001)
  4: Filter: A
  5: Match\n"
                .to_string()),
            dump("A")
        );
    }

    #[test]
    fn should_compile_alternation() {
        assert_eq!(
            Ok("^A|B/C:
  0: Split: (0001), (0004)
  1: BeginInput
  2: Filter: A
  3: Jump: (0006)
  4: Filter: B
  5: Filter: C
  6: Match\n"
                .to_string()),
            dump("^A|B/C")
        );
    }

    #[test]
    fn should_compile_repetition_operators() {
        assert_eq!(
            Ok("^A*/B+/C?:
  0: BeginInput
  1: Split: (0002), (0004)
  2: Filter: A
  3: Jump: (0001)
  4: Filter: B
  5: Split: (0004), (0006)
  6: Split: (0007), (0008)
  7: Filter: C
  8: Match\n"
                .to_string()),
            dump("^A*/B+/C?")
        );
    }

    #[test]
    fn should_compile_captures_and_guards() {
        assert_eq!(
            Ok("^(A)*/(?<tail>B(upper)|_(upper)):
  0: BeginInput
  1: Split: (0002), (0006)
  2: Save[0]
  3: Filter: A
  4: Stop[0]
  5: Jump: (0001)
  6: Save[tail]
  7: Split: (0008), (0010)
  8: Filter: B(upper)
  9: Jump: (0011)
  10: Filter: _(upper)
  11: Stop[tail]
  12: Match\n"
                .to_string()),
            dump("^(A)*/(?<tail>B(upper)|_(upper))")
        );
    }

    #[test]
    fn should_reject_unresolvable_filters() {
        let tests = vec![
            (
                ParseErr::new(ParseErrKind::UnresolvedType("geo.Point".to_string()), 2),
                "^ geo.Point",
            ),
            (
                ParseErr::new(
                    ParseErrKind::InvalidGuard("no guard registered for `lower`".to_string()),
                    3,
                ),
                "^A/B(lower)",
            ),
        ];

        for (case_id, (expected, pattern)) in tests.into_iter().enumerate() {
            assert_eq!((case_id, Err(expected)), (case_id, dump(pattern)));
        }
    }

    #[test]
    fn should_reject_malformed_postfix_streams() {
        let a = || Spanned::new(Token::filter("A", None), 0);
        let tests = vec![
            (ParseErrKind::MissingOperand, vec![a(), Spanned::new(Token::Catenation, 1)]),
            (ParseErrKind::MissingCatenation, vec![a(), a()]),
            (ParseErrKind::EmptyPattern, vec![]),
            (
                ParseErrKind::UnbalancedGroup,
                vec![a(), Spanned::new(Token::StopSaving(CaptureKey::Index(0)), 1)],
            ),
        ];

        for (case_id, (expected, postfix)) in tests.into_iter().enumerate() {
            let res = parse::<char, _>(postfix, &registry()).map_err(|e| e.kind().clone());
            assert_eq!((case_id, Some(expected)), (case_id, res.err()));
        }
    }
}
