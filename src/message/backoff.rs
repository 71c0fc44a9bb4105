use std::{iter::Take, time::Duration};

/// An endless stream of delays for retrying a failed operation. Each delay
/// is the previous one multiplied by a constant factor, until a ceiling is
/// reached, after which the ceiling is repeated. Cap the number of attempts
/// with `Iterator::take`.
///
/// The retry helpers block the calling thread with [std::thread::sleep], so
/// they belong on transport helper threads and not in async code.
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

/// Repeats a fallible operation, waiting between attempts for the delays
/// produced by an iterator of [Duration] values.
pub trait Retry: Iterator<Item = Duration> + Sized {
    /// Call `f` until it returns [Ok], or until the delays run out, in which
    /// case the last error is returned. `on_err` sees each failure and the
    /// delay about to be slept; it is not called after the final attempt.
    /// Returns `None` only if the iterator yields no delays at all.
    fn retry<F, S, T, E>(self, mut f: F, on_err: S) -> Option<Result<T, E>>
    where
        F: FnMut() -> Result<T, E>,
        S: Fn(&E, Duration),
    {
        let mut last_err = None;
        let mut delays = self.peekable();

        while let Some(delay) = delays.next() {
            match f() {
                Ok(v) => return Some(Ok(v)),
                Err(e) => {
                    if delays.peek().is_some() {
                        on_err(&e, delay);
                        std::thread::sleep(delay);
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

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn delays_grow_to_the_ceiling() {
        let delays: Vec<_> = ExponentialBackoff::new(ms(1), ms(5), 2).take(5).collect();
        assert_eq!(delays, vec![ms(1), ms(2), ms(4), ms(5), ms(5)]);
    }

    #[test]
    fn retry_stops_at_first_success() {
        let calls = Cell::new(0);
        let result = ExponentialBackoff::new(ms(0), ms(0), 2).take(10).retry(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err("busy") } else { Ok(calls.get()) }
            },
            |_, _| {},
        );
        assert_eq!(result, Some(Ok(3)));
    }

    #[test]
    fn retry_returns_last_error_when_attempts_run_out() {
        let errors = Cell::new(0);
        let result: Option<Result<(), usize>> = ExponentialBackoff::new(ms(0), ms(0), 2)
            .take(4)
            .retry(|| Err(7), |_, _| errors.set(errors.get() + 1));
        assert_eq!(result, Some(Err(7)));
        assert_eq!(errors.get(), 3);
    }
}
