use std::collections::HashSet;

use crate::error::{Error, Result};

/// Journal logins end up verbatim in the cookie header, so only characters
/// that would split the cookie or the header are refused
pub fn login(login: &str) -> Result<()> {
    if login.is_empty() {
        return Err(Error::config("Login is empty"));
    }
    let set = login
        .chars()
        .filter(|c| !c.is_ascii_graphic() || matches!(c, ';' | ',' | '='))
        .collect::<HashSet<char>>();
    if set.is_empty() {
        return Ok(());
    }
    Err(Error::config(format!(
        "Login contains invalid characters: {set:?}"
    )))
}

pub fn generic_token(token: &str) -> Result<()> {
    const CHARS: &[u8; 65] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.";
    validate_charset("Token", token, CHARS)
}

fn validate_charset(description: &'static str, string: &str, charset: &'static [u8]) -> Result<()> {
    if string.is_empty() {
        return Err(Error::config(format!("{description} is empty")));
    }
    if string.bytes().all(|b| charset.contains(&b)) {
        return Ok(());
    }

    let set = string
        .chars()
        .filter(|c| !c.is_ascii() || !charset.contains(&(*c as u8)))
        .collect::<HashSet<char>>();
    Err(Error::config(format!(
        "{description} contains invalid characters: {set:?}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logins() {
        assert!(login("s21730").is_ok());
        assert!(login("i.ivanov").is_ok());
        assert!(login("i.ivanov@unn.ru").is_ok());
        assert!(login("a,b").is_err());
        assert!(login("a=b").is_err());
        assert!(login("").is_err());
        assert!(login("s2; hash=x").is_err());
        assert!(login("студент").is_err());
    }

    #[test]
    fn tokens() {
        assert!(generic_token("abc.DEF-12_3").is_ok());
        assert!(generic_token("a b").is_err());
    }
}
