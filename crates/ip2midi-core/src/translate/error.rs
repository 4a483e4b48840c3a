use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("event list full: need {needed} bytes, {available} available")]
    Overflow { needed: usize, available: usize },
    #[error("empty events are not allowed")]
    EmptyEvent,
    #[error("unknown payload mode '{0}' (expected raw-bytes or hex-string)")]
    UnknownMode(String),
}
