use std::error::Error as StdError;
use std::future::Future;
use std::io;

use tracing::debug;

/// how many times a request is attempted before the error is surfaced
pub const MAX_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// only retry errors caused by idle connections going away or timing out, used for
    /// basically everything
    Transient,
    /// retry anything, used while probing the web shell and script bundle
    All,
}

impl RetryPolicy {
    fn should_retry(self, transient: bool) -> bool {
        match self {
            Self::All => true,
            Self::Transient => transient,
        }
    }
}

/// runs `op` until it succeeds, the policy refuses the error, or we run out of attempts
///
/// no backoff between attempts, the pool redials right away and the upstream doesn't mind
pub async fn with_retry<T, E, F, Fut, C>(policy: RetryPolicy, is_transient: C, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= MAX_ATTEMPTS || !policy.should_retry(is_transient(&err)) {
                    return Err(err);
                }

                debug!("attempt {} failed ({:?}), retrying", attempt, policy);
            }
        }
    }
}

/// timeouts (connect, tls handshake, read/write), closed connections and broken pipes
pub fn is_transient(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return true;
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            if is_transient_io(io_err.kind()) {
                return true;
            }
        }

        // hyper doesn't give us a kind for this one
        if inner.to_string().contains("connection closed") {
            return true;
        }

        source = inner.source();
    }

    false
}

pub fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::TimedOut
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
    )
}
