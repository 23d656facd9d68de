pub mod guard;
pub mod oauth;
pub mod session;

pub use guard::chat_guard;
pub use oauth::GoogleOAuth;
pub use session::{Session, SessionVerifier};

/// The single authorization rule: a verified session, or a deployment
/// explicitly running in permissive mode.
pub fn is_authorized(session: Option<&Session>, permissive_mode: bool) -> bool {
    session.is_some() || permissive_mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_or_permissive_mode_authorizes() {
        let session = Session::new("u1", None, None, None);
        assert!(is_authorized(Some(&session), false));
        assert!(is_authorized(Some(&session), true));
        assert!(is_authorized(None, true));
        assert!(!is_authorized(None, false));
    }
}
