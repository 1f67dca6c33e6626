use std::error::Error;
use taskbot::errors::BotError;

#[test]
fn test_bot_error_implements_error_trait() {
    fn assert_error<T: Error>(_: &T) {}

    let error = BotError::ParseError("test error".to_string());
    assert_error(&error);
}

#[test]
fn test_bot_error_display() {
    let error = BotError::ApiError("API failed".to_string());
    assert_eq!(format!("{error}"), "Failed to access Slack API: API failed");

    let error = BotError::OpenAIError("Model unavailable".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to access OpenAI API: Model unavailable"
    );

    let error = BotError::GatewayError {
        status: 422,
        message: "bad list".to_string(),
    };
    assert_eq!(
        format!("{error}"),
        "Work-management API error (status 422): bad list"
    );
}

#[test]
fn test_bot_error_from_conversions() {
    let err = anyhow::anyhow!("test error");
    let bot_err: BotError = err.into();

    match bot_err {
        BotError::GeneralError(msg) => assert!(msg.contains("test error")),
        _ => panic!("Unexpected error type"),
    }

    let parse: BotError = serde_json::from_str::<serde_json::Value>("{")
        .unwrap_err()
        .into();
    assert!(matches!(parse, BotError::ParseError(_)));

    #[allow(unused)]
    #[allow(clippy::items_after_statements)]
    fn _check_reqwest_conversion(err: reqwest::Error) -> BotError {
        BotError::from(err)
    }
}

#[test]
fn test_retryable_errors() {
    assert!(BotError::RateLimited("429".into()).is_retryable());
    assert!(
        BotError::GatewayError {
            status: 503,
            message: String::new()
        }
        .is_retryable()
    );
    assert!(
        !BotError::GatewayError {
            status: 404,
            message: String::new()
        }
        .is_retryable()
    );
    assert!(!BotError::ValidationError("x".into()).is_retryable());
}

#[test]
fn test_user_messages_hide_internals() {
    let errors = [
        BotError::GatewayError {
            status: 500,
            message: "stack trace at line 42".into(),
        },
        BotError::HttpError("connection reset by peer".into()),
        BotError::DirectoryError("secret-token rejected".into()),
        BotError::MissingCredential("U1".into()),
        BotError::GeneralError("panic in worker".into()),
    ];
    for error in &errors {
        let text = error.user_message();
        assert!(!text.is_empty());
        assert!(!text.contains("42"));
        assert!(!text.contains("peer"));
        assert!(!text.contains("secret-token"));
        assert!(!text.contains("U1"));
        assert!(!text.contains("panic"));
    }
}
