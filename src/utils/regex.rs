use regex::Regex;
use std::sync;

pub static HOSTNAME: sync::LazyLock<Regex> =
    sync::LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9-]*$").unwrap());

pub static CIDR_V4: sync::LazyLock<Regex> =
    sync::LazyLock::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}/\d{1,2}$").unwrap());

pub static KEY_PAIR_NAME: sync::LazyLock<Regex> =
    sync::LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").unwrap());

#[cfg(test)]
#[path = "regex_tests.rs"]
mod tests;
