use super::*;
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_guard() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// # Safety
/// Callers must hold [`env_guard`] so env mutations do not race.
unsafe fn clear_answer_env() {
    unsafe {
        std::env::remove_var("EXA_API_KEY");
        std::env::remove_var("EXA_BASE_URL");
        std::env::remove_var("EXA_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("EXA_CONNECT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_applies_defaults() {
    let _guard = env_guard();
    unsafe {
        clear_answer_env();
        std::env::set_var("EXA_API_KEY", "secret");
    }

    let cfg = AnswerConfig::from_env().unwrap();
    assert_eq!(cfg.api_key, "secret");
    assert_eq!(cfg.base_url, DEFAULT_EXA_BASE_URL);
    assert_eq!(
        cfg.timeouts,
        AnswerTimeouts {
            request_secs: DEFAULT_EXA_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_EXA_CONNECT_TIMEOUT_SECS
        }
    );

    unsafe { clear_answer_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _guard = env_guard();
    unsafe {
        clear_answer_env();
        std::env::set_var("EXA_API_KEY", "secret");
        std::env::set_var("EXA_BASE_URL", "https://proxy.example.test/exa/");
        std::env::set_var("EXA_REQUEST_TIMEOUT_SECS", "30");
        std::env::set_var("EXA_CONNECT_TIMEOUT_SECS", "3");
    }

    let cfg = AnswerConfig::from_env().unwrap();
    assert_eq!(cfg.base_url, "https://proxy.example.test/exa");
    assert_eq!(cfg.timeouts, AnswerTimeouts { request_secs: 30, connect_secs: 3 });

    unsafe { clear_answer_env() };
}

#[test]
fn from_env_missing_key_errors() {
    let _guard = env_guard();
    unsafe { clear_answer_env() };

    let err = AnswerConfig::from_env().unwrap_err();
    assert!(matches!(err, UpstreamError::MissingApiKey { ref var } if var == "EXA_API_KEY"));
}

#[test]
fn from_env_blank_key_errors() {
    let _guard = env_guard();
    unsafe {
        clear_answer_env();
        std::env::set_var("EXA_API_KEY", "   ");
    }

    assert!(AnswerConfig::from_env().is_err());

    unsafe { clear_answer_env() };
}

#[test]
fn parse_base_url_rejects_missing_scheme() {
    let err = parse_base_url(Some("api.exa.ai")).unwrap_err().to_string();
    assert!(err.contains("EXA_BASE_URL"));
}
