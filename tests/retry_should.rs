use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use tunecloak::upstream::retry::{MAX_ATTEMPTS, RetryPolicy, is_transient_io, with_retry};

fn transient(err: &io::Error) -> bool {
    is_transient_io(err.kind())
}

#[tokio::test]
async fn test_transient_errors_are_retried_until_exhausted() {
    let attempts = AtomicUsize::new(0);

    let result: Result<(), io::Error> = with_retry(RetryPolicy::Transient, transient, || async {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::from(io::ErrorKind::ConnectionReset))
    })
    .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
}

#[tokio::test]
async fn test_non_transient_errors_abort_immediately() {
    let attempts = AtomicUsize::new(0);

    let result: Result<(), io::Error> = with_retry(RetryPolicy::Transient, transient, || async {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    })
    .await;

    assert_eq!(result.unwrap_err().kind(), io::ErrorKind::PermissionDenied);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_retry_all_retries_anything() {
    let attempts = AtomicUsize::new(0);

    let result = with_retry(RetryPolicy::All, transient, || async {
        let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt < 3 {
            Err(io::Error::from(io::ErrorKind::NotFound))
        } else {
            Ok(attempt)
        }
    })
    .await;

    assert_eq!(result.unwrap(), 3);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[test]
fn test_transient_kinds() {
    assert!(is_transient_io(io::ErrorKind::TimedOut));
    assert!(is_transient_io(io::ErrorKind::BrokenPipe));
    assert!(is_transient_io(io::ErrorKind::ConnectionReset));
    assert!(!is_transient_io(io::ErrorKind::InvalidData));
}
