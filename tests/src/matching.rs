use seqex_compiler::*;
use seqex_runtime::{CaptureGroup, Engine, EngineError, Predicate, Value, Variables};

fn chars(input: &str) -> Vec<char> {
    input.chars().collect()
}

fn letters() -> Registry<char> {
    let mut registry = Registry::new()
        .with_type("A", |c: &char| *c == 'a')
        .with_type("B", |c: &char| *c == 'b')
        .with_type("C", |c: &char| *c == 'c');

    registry.register_guard(
        "count",
        Predicate::new("count", |_: &char, vars: &mut Variables| {
            let seen = vars.get("count").and_then(Value::as_int).unwrap_or(0);
            vars.insert("count", seen + 1);
            true
        }),
    );

    registry
}

/// Resolves word classes and compiles guards of the form `len > N`.
struct Lengths;

impl TypeResolver<&'static str> for Lengths {
    fn resolve_type(&self, name: &str) -> Option<Predicate<&'static str>> {
        match name {
            "text.Word" => Some(Predicate::new(name, |word: &&str, _| {
                word.chars().all(char::is_alphabetic)
            })),
            _ => None,
        }
    }
}

impl GuardCompiler<&'static str> for Lengths {
    fn compile_guard(
        &self,
        type_name: Option<&str>,
        source: &str,
    ) -> Result<Predicate<&'static str>, String> {
        let bound: usize = source
            .strip_prefix("len >")
            .ok_or_else(|| format!("unsupported guard `{}`", source))?
            .trim()
            .parse()
            .map_err(|e| format!("{}", e))?;
        let label = format!("{}:{}", type_name.unwrap_or("*"), source);

        Ok(Predicate::new(label, move |word: &&str, _| word.len() > bound))
    }
}

#[test]
fn should_match_anchored_linear_pattern() {
    let pattern = compile("^A/A/B$", &letters()).expect("pattern should compile");

    let tests = vec![
        (true, Some(chars("aab"))),
        (false, Some(chars("ab"))),
        (false, Some(vec![])),
        (false, None),
    ];

    for (case_id, (expected_res, input)) in tests.into_iter().enumerate() {
        let res = pattern.matcher(input.as_deref()).matches();
        assert_eq!((case_id, expected_res), (case_id, res));
    }
}

#[test]
fn should_capture_named_groups_without_an_implicit_whole_match() {
    let pattern = compile("^(?<A>A)/(?<B>B)$", &letters()).expect("pattern should compile");
    let input = chars("ab");
    let mut matcher = pattern.matcher(Some(&input[..]));

    assert!(matcher.matches());
    assert_eq!(Some(&['a'][..]), matcher.group("A"));
    assert_eq!(Some(&['b'][..]), matcher.group("B"));
    assert_eq!(None, matcher.group(0usize));
    assert_eq!(2, matcher.group_count());
}

#[test]
fn should_match_zero_or_more_against_empty_input() {
    let pattern = compile("^A*", &letters()).expect("pattern should compile");

    let tests = vec![
        ((true, true), Some(chars("aaa"))),
        ((true, true), Some(vec![])),
        ((true, true), None),
        ((false, true), Some(chars("aab"))),
    ];

    for (case_id, (expected_res, input)) in tests.into_iter().enumerate() {
        let mut matcher = pattern.matcher(input.as_deref());
        let res = (matcher.matches(), matcher.looking_at());
        assert_eq!((case_id, expected_res), (case_id, res));
    }
}

#[test]
fn should_prefer_primary_continuation_of_optional() {
    let pattern = compile("^(A?)/B", &letters()).expect("pattern should compile");

    let tests = vec![
        (Some(vec![]), chars("b")),
        (Some(vec!['a']), chars("ab")),
        (None, chars("aab")),
    ];

    for (case_id, (expected_res, input)) in tests.into_iter().enumerate() {
        let mut matcher = pattern.matcher(Some(&input[..]));
        let res = matcher
            .looking_at()
            .then(|| matcher.group(0usize).map(<[char]>::to_vec))
            .flatten();
        assert_eq!((case_id, expected_res), (case_id, res));
    }
}

#[test]
fn should_search_anywhere_in_unanchored_patterns() {
    let pattern = compile("A/(B)", &letters()).expect("pattern should compile");
    let input = chars("ccabab");
    let mut matcher = pattern.matcher(Some(&input[..]));

    assert!(matcher.looking_at());
    assert_eq!(
        Some(&CaptureGroup::closed(3, 4)),
        matcher.last_match().and_then(|m| m.capture(0usize))
    );
}

#[test]
fn should_search_every_branch_of_unanchored_alternation() {
    let pattern = compile("A/A|B$", &letters()).expect("pattern should compile");

    let tests = vec![(false, "cca"), (true, "ccaa"), (true, "ccb"), (false, "cbc")];

    for (case_id, (expected_res, input)) in tests.into_iter().enumerate() {
        let input = chars(input);
        let res = pattern.matcher(Some(&input[..])).looking_at();
        assert_eq!((case_id, expected_res), (case_id, res));
    }
}

#[test]
fn should_terminate_on_empty_loops() {
    let pattern = compile("^(A?)*/B$", &letters()).expect("pattern should compile");

    let tests = vec![(true, "aab"), (true, "b"), (false, "aa"), (false, "aac")];

    for (case_id, (expected_res, input)) in tests.into_iter().enumerate() {
        let input = chars(input);
        let res = pattern.matcher(Some(&input[..])).matches();
        assert_eq!((case_id, expected_res), (case_id, res));
    }
}

#[test]
fn should_keep_variables_written_along_the_matching_path() {
    let pattern = compile("^_(count)*/B$", &letters()).expect("pattern should compile");
    let input = chars("aab");
    let mut matcher = pattern.matcher(Some(&input[..]));

    assert!(matcher.matches());
    // the path that matched consumed two items through the guard before `B`.
    assert_eq!(Some(&Value::Int(2)), matcher.get("count"));
}

#[test]
fn should_read_variables_written_by_a_later_alternation_branch() {
    let registry = letters()
        .with_guard("one", |_: &char, vars: &mut Variables| {
            vars.insert("x", 1i64);
            true
        })
        .with_guard("two", |_: &char, vars: &mut Variables| {
            vars.insert("x", 2i64);
            true
        })
        .with_guard("second", |_: &char, vars: &mut Variables| {
            vars.get("x") == Some(&Value::Int(2))
        });
    let pattern =
        compile("^(A(one)|A(two))/B(second)$", &registry).expect("pattern should compile");
    let input = chars("ab");
    let mut matcher = pattern.matcher(Some(&input[..]));

    // both branches reach `B` at the same offset, only the second with x = 2.
    assert!(matcher.matches());
    assert_eq!(Some(&Value::Int(2)), matcher.get("x"));
    assert_eq!(Some(&['a'][..]), matcher.group(0usize));
}

#[test]
fn should_keep_pure_patterns_within_a_linear_step_budget() {
    let pattern = compile("^(A|A)*/B", &letters()).expect("pattern should compile");
    let input = chars("aaaaaaaaaaaaaaaab");

    let tests = vec![
        (Ok(true), true),
        (Err(EngineError::StepLimitExceeded { limit: 400 }), false),
    ];

    for (case_id, (expected_res, deduplicate)) in tests.into_iter().enumerate() {
        let engine = Engine::new()
            .with_step_limit(400)
            .with_state_deduplication(deduplicate);
        let res = pattern
            .matcher(Some(&input[..]))
            .with_engine(engine)
            .try_looking_at();
        assert_eq!((case_id, expected_res), (case_id, res));
    }
}

#[test]
fn should_compile_guards_through_custom_environment() {
    let pattern: Pattern<&str> =
        compile("^text.Word(len > 3)+/_(len > 1)", &Lengths).expect("pattern should compile");
    let dump = pattern.to_string();

    assert!(dump.contains("Filter: text.Word(text.Word:len > 3)"));
    assert!(dump.contains("Filter: _(*:len > 1)"));

    let tests = vec![
        (true, vec!["hello", "world", "ok"]),
        (false, vec!["hello", "world", "!"]),
        (false, vec!["hi", "world", "ok"]),
    ];

    for (case_id, (expected_res, input)) in tests.into_iter().enumerate() {
        let res = pattern.matcher(Some(&input[..])).matches();
        assert_eq!((case_id, expected_res), (case_id, res));
    }
}

#[test]
fn should_report_compile_errors_with_offsets() {
    let tests = vec![
        (ParseErrKind::UnresolvedType("Word".to_string()), 1, "^Word"),
        (
            ParseErrKind::InvalidGuard("unsupported guard `len < 3`".to_string()),
            1,
            "^_(len < 3)",
        ),
        (ParseErrKind::MissingCatenation, 11, "^text.Word text.Word"),
        (ParseErrKind::UnbalancedGroup, 1, "^(text.Word"),
    ];

    for (case_id, (expected_kind, expected_offset, pattern)) in tests.into_iter().enumerate() {
        let res = compile::<&str, _>(pattern, &Lengths)
            .map(|_| ())
            .map_err(|e| (e.kind().clone(), e.offset()));
        assert_eq!((case_id, Err((expected_kind, expected_offset))), (case_id, res));
    }
}

#[test]
fn should_bound_runs_with_a_step_limit() {
    let pattern = compile("^(A|A)*/B", &letters()).expect("pattern should compile");
    let input = chars("aaaaaaaaaaaaaaaac");

    let mut limited = pattern
        .matcher(Some(&input[..]))
        .with_engine(Engine::new().with_step_limit(16));
    assert_eq!(
        Err(EngineError::StepLimitExceeded { limit: 16 }),
        limited.try_looking_at()
    );

    let mut unlimited = pattern.matcher(Some(&input[..]));
    assert_eq!(Ok(false), unlimited.try_looking_at());
}

#[test]
fn should_share_compiled_patterns_across_threads() {
    let pattern = compile("A/B+", &letters()).expect("pattern should compile");
    let inputs = vec![chars("cabb"), chars("ccc"), chars("ab"), chars("ba")];

    let results: Vec<bool> = std::thread::scope(|s| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let pattern = &pattern;
                s.spawn(move || pattern.matcher(Some(&input[..])).looking_at())
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .collect()
    });

    assert_eq!(vec![true, false, true, false], results);
}
