/// Monotonic millisecond time source used for ack deadlines, capture deadlines
/// and the telemetry refresh interval.
///
/// Any `Fn() -> u64` works, e.g. `|| Instant::now().as_millis()` with `embassy-time`.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<F> Clock for F
where
    F: Fn() -> u64,
{
    fn now_ms(&self) -> u64 {
        self()
    }
}
