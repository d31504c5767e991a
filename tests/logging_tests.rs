#[test]
fn should_emit_filters_below_runtime_level() {
    use chargectl::logging::{set_web_log_level, should_emit_to_web};
    use tracing::Level;
    set_web_log_level(Level::WARN);
    assert!(!should_emit_to_web(" INFO message"));
    assert!(should_emit_to_web(" ERROR something"));
    assert!(should_emit_to_web(r#"{"level":"WARN","fields":{}}"#));
}

#[test]
fn parse_line_level_reads_plain_and_json() {
    use chargectl::logging::parse_line_level;
    use tracing::Level;
    assert_eq!(
        parse_line_level("2024-05-01T10:00:00Z  INFO chargectl: started"),
        Some(Level::INFO)
    );
    assert_eq!(
        parse_line_level(r#"{"level":"DEBUG","message":"x"}"#),
        Some(Level::DEBUG)
    );
    assert_eq!(parse_line_level("no level"), None);
}
