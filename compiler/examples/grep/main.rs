use std::io::{self, BufRead};

use seqex_compiler::{compile, Registry};
use seqex_runtime::Variables;

const USAGE: &str = "grep PATTERN";

/// Classes of whitespace separated words a pattern may refer to.
fn word_classes() -> Registry<String> {
    Registry::new()
        .with_type("Num", |word: &String| word.parse::<f64>().is_ok())
        .with_type("Word", |word: &String| {
            !word.is_empty() && word.chars().all(char::is_alphabetic)
        })
        .with_type("Upper", |word: &String| {
            word.chars().next().map_or(false, char::is_uppercase)
        })
        .with_type("Punct", |word: &String| {
            !word.is_empty() && word.chars().all(|c| c.is_ascii_punctuation())
        })
        .with_guard("long", |word: &String, _: &mut Variables| word.chars().count() > 6)
        .with_guard("short", |word: &String, _: &mut Variables| word.chars().count() <= 3)
}

fn main() -> Result<(), String> {
    let (debug, args) = std::env::args()
        .skip(1)
        .fold((false, vec![]), |(debug, mut args), arg| {
            if arg == "--debug" || arg == "-d" {
                (true, args)
            } else {
                args.push(arg);
                (debug, args)
            }
        });

    let (pattern, input) = match args.len() {
        1 => args
            .first()
            .map(|pattern| (pattern.as_str(), io::stdin()))
            .ok_or_else(|| USAGE.to_string()),
        _ => Err(USAGE.to_string()),
    }?;

    let registry = word_classes();
    let pattern = compile(pattern, &registry).map_err(|e| e.to_string())?;

    if debug {
        println!(
            "DEBUG
--------
{}--------
",
            pattern
        )
    }

    for line in input.lock().lines() {
        let line = line.map_err(|e| e.to_string())?;
        let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();

        if pattern.matcher(Some(&words[..])).looking_at() {
            println!("{}", line)
        }
    }

    Ok(())
}
