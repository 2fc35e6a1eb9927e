//! End-to-end tests compiling patterns and running them against input.

#[cfg(test)]
mod matching;
