//! Runs the encoder against real child processes.
#![cfg(unix)]

mod common;

use bytes::Bytes;

use common::{expect_error, next};
use framepipe::{EncoderConfig, EncoderError, EncoderEvent, PngEncoder};

fn encoder(program: &str) -> PngEncoder {
    PngEncoder::new(EncoderConfig::default().with_converter_path(program))
}

#[tokio::test]
async fn test_missing_converter_is_reported_as_not_found() {
    let mut encoder = encoder("/nonexistent/framepipe-test-converter");

    encoder.write(Bytes::from_static(b"video"));

    let err = expect_error(next(&mut encoder).await);
    assert!(err.is_not_found(), "{err}");
    assert!(next(&mut encoder).await.is_none());
}

#[tokio::test]
async fn test_failing_converter_reports_exit_code() {
    let mut encoder = encoder("false");

    encoder.write(Bytes::from_static(b"video"));

    let err = expect_error(next(&mut encoder).await);
    assert!(matches!(err, EncoderError::Failed { code: Some(1) }), "{err}");
    assert!(next(&mut encoder).await.is_none());
}

#[tokio::test]
async fn test_converter_exiting_after_end_finishes_cleanly() {
    let mut encoder = encoder("true");

    encoder.write(Bytes::from_static(b"video"));
    encoder.end();

    assert!(matches!(next(&mut encoder).await, Some(EncoderEvent::End)));
    assert!(next(&mut encoder).await.is_none());
}

#[tokio::test]
async fn test_converter_exiting_on_its_own_is_unexpected() {
    let mut encoder = encoder("true");

    encoder.write(Bytes::from_static(b"video"));

    let err = expect_error(next(&mut encoder).await);
    assert!(matches!(err, EncoderError::UnexpectedExit), "{err}");
}
