use super::*;

// =============================================================================
// env_parse
// =============================================================================

#[test]
fn env_parse_missing_returns_default() {
    let val: u64 = env_parse("__STICKYBOARD_TEST_MISSING__", 42);
    assert_eq!(val, 42);
}

#[test]
fn env_parse_present_valid() {
    unsafe { std::env::set_var("__STICKYBOARD_TEST_VALID__", "99") };
    let val: u32 = env_parse("__STICKYBOARD_TEST_VALID__", 0);
    assert_eq!(val, 99);
    unsafe { std::env::remove_var("__STICKYBOARD_TEST_VALID__") };
}

#[test]
fn env_parse_present_invalid_returns_default() {
    unsafe { std::env::set_var("__STICKYBOARD_TEST_INVALID__", "soon") };
    let val: u64 = env_parse("__STICKYBOARD_TEST_INVALID__", 7);
    assert_eq!(val, 7);
    unsafe { std::env::remove_var("__STICKYBOARD_TEST_INVALID__") };
}

// =============================================================================
// BoardConfig
// =============================================================================

#[test]
fn defaults_match_constants() {
    let cfg = BoardConfig::default();
    assert!(cfg.database_url.is_none());
    assert_eq!(cfg.data_dir, PathBuf::from(".stickyboard"));
    assert_eq!(cfg.db_max_connections, 5);
    assert_eq!(cfg.timing.heartbeat, Duration::from_secs(15));
    assert_eq!(cfg.timing.presence_timeout_ms(), 30_000);
    assert_eq!(cfg.timing.cursor_throttle_ms(), 100);
    assert_eq!(cfg.timing.cursor_timeout_ms(), 10_000);
    assert_eq!(cfg.timing.lock_grace, Duration::from_millis(150));
    assert!(cfg.validate().is_ok());
}

#[test]
fn from_env_reads_overrides() {
    unsafe {
        std::env::set_var("STICKYBOARD_DATABASE_URL", "postgres://board@localhost/board");
        std::env::set_var("STICKYBOARD_DATA_DIR", "/tmp/board-data");
        std::env::set_var("STICKYBOARD_USERNAME", "  ada  ");
        std::env::set_var("CURSOR_THROTTLE_MS", "250");
    }

    let cfg = BoardConfig::from_env().unwrap();
    assert_eq!(cfg.database_url.as_deref(), Some("postgres://board@localhost/board"));
    assert_eq!(cfg.data_dir, PathBuf::from("/tmp/board-data"));
    assert_eq!(cfg.username.as_deref(), Some("ada"));
    assert_eq!(cfg.timing.cursor_throttle, Duration::from_millis(250));

    unsafe {
        std::env::remove_var("STICKYBOARD_DATABASE_URL");
        std::env::remove_var("STICKYBOARD_DATA_DIR");
        std::env::remove_var("STICKYBOARD_USERNAME");
        std::env::remove_var("CURSOR_THROTTLE_MS");
    }
}

#[test]
fn validate_rejects_heartbeat_not_shorter_than_timeout() {
    let mut cfg = BoardConfig::default();
    cfg.timing.heartbeat = Duration::from_secs(30);
    let err = cfg.validate().unwrap_err();
    assert!(matches!(err, ConfigError::HeartbeatTooSlow { heartbeat: 30, timeout: 30 }));
}

#[test]
fn validate_rejects_zero_timeout() {
    use crate::error::ErrorCode;

    let mut cfg = BoardConfig::default();
    cfg.timing.cursor_timeout = Duration::ZERO;
    let err = cfg.validate().unwrap_err();
    assert_eq!(err.error_code(), "E_CONFIG_ZERO");
    assert!(err.to_string().contains("CURSOR_TIMEOUT_SECS"));
}
