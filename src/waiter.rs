// Copyright 2024 ZSoftly Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A generic bounded polling loop, generalized from the teacher's
//! `Waiter`/`DeletionWaiter`: poll a probe at a fixed interval until it
//! reports a terminal state or an overall timeout elapses.

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::error::{Error, ErrorKind, Result};

/// What one poll of a `Waiter` found.
pub enum Poll<T> {
    /// Still in progress; keep polling.
    Pending,
    /// Reached a terminal success state.
    Done(T),
    /// Reached a terminal failure state; stop polling immediately.
    Failed(Error),
}

/// Poll `probe` every `interval` until it returns `Done`/`Failed`, or until
/// `timeout` elapses (in which case an `AgentChannelTimedOut` error is
/// returned). Mirrors the teacher's `Waiter::wait` shape: a closure
/// returning an enum of in-progress/success/failure, driven by this
/// free function instead of a trait object, since there's exactly one
/// caller-visible behavior difference (sync vs. async) rather than several
/// swappable wait strategies.
pub async fn poll_until<F, Fut, T>(interval: Duration, timeout: Duration, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<Poll<T>>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match probe().await? {
            Poll::Done(value) => return Ok(value),
            Poll::Failed(err) => return Err(err),
            Poll::Pending => {}
        }

        if Instant::now() >= deadline {
            return Err(Error::new(
                ErrorKind::AgentChannelTimedOut,
                format!("condition did not become true within {:?}", timeout),
            ));
        }

        sleep(interval).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_done_once_probe_succeeds() {
        let calls = AtomicU32::new(0);
        let result = poll_until(Duration::from_millis(1), Duration::from_secs(1), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Ok(Poll::Pending)
            } else {
                Ok(Poll::Done(n))
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn propagates_failed_immediately() {
        let result: Result<()> = poll_until(Duration::from_millis(1), Duration::from_secs(1), || async {
            Ok(Poll::Failed(Error::new(ErrorKind::Grant, "denied")))
        })
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn times_out_when_never_done() {
        let result: Result<()> = poll_until(Duration::from_millis(1), Duration::from_millis(5), || async {
            Ok(Poll::Pending)
        })
        .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::AgentChannelTimedOut);
    }
}
