use std::{iter::Take, time::Duration};

/// An endless sequence of delays which grows by a constant factor from a
/// starting delay until it saturates at a maximum. Used to pace connection
/// attempts while the peers of a ring are still starting up.
///
/// The delays are meant for [std::thread::sleep], so do NOT use this with
/// asynchronous code.
pub struct ExponentialBackoff {
    curr: Duration,
    max: Duration,
    factor: u32,
}

impl ExponentialBackoff {
    pub fn new(start: Duration, max: Duration, factor: u32) -> ExponentialBackoff {
        ExponentialBackoff {
            curr: start,
            max,
            factor,
        }
    }
}

impl Iterator for ExponentialBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Self::Item> {
        let delay = self.curr;
        self.curr = (self.curr * self.factor).min(self.max);
        Some(delay)
    }
}

/// Retry a fallible operation once per delay yielded by the iterator,
/// sleeping between attempts.
pub trait Retry: Iterator<Item = Duration> + Sized {
    /// Call `f` until it returns [Ok]. After each failed attempt except the
    /// last, `sleep` receives the error and the delay to wait. Returns the
    /// last error if every attempt fails, or `None` if the iterator was
    /// empty to begin with.
    fn retry<F, S, T, E>(self, mut f: F, sleep: S) -> Option<Result<T, E>>
    where
        F: FnMut() -> Result<T, E>,
        S: Fn(&E, Duration),
    {
        let mut last_err = None;
        let mut iter = self.peekable();

        while let Some(delay) = iter.next() {
            match f() {
                Ok(v) => return Some(Ok(v)),
                Err(e) => {
                    if iter.peek().is_some() {
                        sleep(&e, delay);
                    }
                    last_err = Some(Err(e));
                }
            }
        }
        last_err
    }
}

impl Retry for ExponentialBackoff {}

impl Retry for Take<ExponentialBackoff> {}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{ExponentialBackoff, Retry};
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn delays_grow_then_saturate() {
        let delays: Vec<_> = ExponentialBackoff::new(Duration::from_millis(10), Duration::from_millis(50), 2)
            .take(5)
            .collect();
        let millis: Vec<_> = delays.iter().map(|d| d.as_millis()).collect();
        assert_eq!(millis, vec![10, 20, 40, 50, 50]);
    }

    #[test]
    fn retry_stops_at_first_success() {
        let attempts = Cell::new(0);
        let sleeps = Cell::new(0);
        let result: Option<Result<usize, &str>> = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 2)
            .take(10)
            .retry(
                || {
                    attempts.set(attempts.get() + 1);
                    if attempts.get() < 3 { Err("not yet") } else { Ok(attempts.get()) }
                },
                |_, _| sleeps.set(sleeps.get() + 1),
            );
        assert_eq!(result, Some(Ok(3)));
        assert_eq!(sleeps.get(), 2);
    }

    #[test]
    fn retry_returns_the_last_error() {
        let result: Option<Result<(), usize>> = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO, 2)
            .take(3)
            .retry(|| Err(7), |_, _| {});
        assert_eq!(result, Some(Err(7)));
    }
}
