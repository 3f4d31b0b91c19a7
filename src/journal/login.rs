use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::journal::{Journal, Transport};
use crate::model::Session;
use crate::validate;

/// `<date> <time><token>OK`
#[allow(clippy::expect_used)]
static AUTH_RESPONSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d\d-\d\d\s\d\d:\d\d:\d\d(.*?)OK").expect("auth regex is valid")
});

impl<T: Transport> Journal<T> {
    /// Log into the journal, acquiring the cookie token for all later requests.
    ///
    /// # Errors
    /// Always [`Error::Auth`], whatever went wrong:
    /// * Login with characters that cannot go into the cookie
    /// * Wrong credentials (the server answers without a token)
    /// * Maintenance or error page
    /// * Error sending the request or a timeout
    pub fn authenticate(&self, login: &str, password: &str) -> Result<Session> {
        validate::login(login).map_err(|e| Error::auth(e.to_string()))?;

        let form = [
            ("login", login.to_owned()),
            ("password", password.to_owned()),
        ];

        let text = self.post("auth.php", &form, None).map_err(|e| {
            log::warn!("Auth request failed: {e}");
            Error::auth(e.to_string())
        })?;

        parse_auth_response(&text, login)
    }
}

pub fn parse_auth_response(text: &str, login: &str) -> Result<Session> {
    let token = AUTH_RESPONSE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| Error::auth("Unexpected response from auth.php"))?;

    if token.is_empty() {
        return Err(Error::auth("Empty token in auth response"));
    }

    Ok(Session {
        login: login.to_owned(),
        auth_token: token.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::testing::{AUTH_OK, FakeTransport, journal};

    #[test]
    fn token_is_taken_before_ok() {
        let session = parse_auth_response(AUTH_OK, "s21730").unwrap();
        assert_eq!(session.login, "s21730");
        assert_eq!(session.auth_token, "5f2b9c0e7d1a4b38");
    }

    #[test]
    fn lowercase_ok_belongs_to_the_token() {
        let session = parse_auth_response("2023-04-25 08:00:01 tokok OK", "s21730").unwrap();
        assert_eq!(session.auth_token, "tokok");
    }

    #[test]
    fn rejected_login_has_no_token() {
        let err = parse_auth_response("Неверный логин или пароль", "s21730").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn network_failure_becomes_auth_error() {
        // No page registered, so the fake answers 404
        let journal = journal(FakeTransport::default());
        let err = journal.authenticate("s21730", "hunter2").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn malformed_login_is_not_sent() {
        let journal = journal(FakeTransport::default().with("/auth.php", AUTH_OK));
        let err = journal.authenticate("s1; hash=x", "hunter2").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(journal.transport.call_count("/auth.php"), 0);
    }

    #[test]
    fn credentials_are_sent_as_form() {
        let journal = journal(FakeTransport::default().with("/auth.php", AUTH_OK));
        journal.authenticate("s21730", "p&ss").unwrap();

        let calls = journal.transport.calls.lock().unwrap();
        let (path, form) = &calls[0];
        assert_eq!(path, "/auth.php");
        assert_eq!(form[0], ("login".to_owned(), "s21730".to_owned()));
        assert_eq!(form[1], ("password".to_owned(), "p&ss".to_owned()));
    }
}
