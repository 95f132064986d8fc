use std::thread;
use std::time::Duration;

/// Something that can hold the caller back for a while. Blocking pauses between
/// upstream calls all go through this so the delay policy can be swapped in tests.
pub trait Pacer {
    fn pause(&mut self, delay: Duration);
}

/// Pacer that blocks the current thread
#[derive(Default, Clone, Copy)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, delay: Duration) {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn pause(&mut self, delay: Duration) {
        (**self).pause(delay)
    }
}

/// Sequential iterator that hands out one item per token.
///
/// The first token is available immediately, every following token is released only
/// after the pacer has paused for `interval`. No pause is taken after the last item.
pub struct Paced<I, P> {
    inner: I,
    pacer: P,
    interval: Duration,
    issued: usize,
}

impl<I: Iterator, P: Pacer> Paced<I, P> {
    /// Wraps an iterator so consecutive items are spaced by the given interval
    ///
    /// # Arguments
    ///
    /// * 'inner' - the items to pace
    /// * 'pacer' - the pacer doing the actual waiting
    /// * 'interval' - pause between two consecutive items
    pub fn new(inner: I, pacer: P, interval: Duration) -> Self {
        Self { inner, pacer, interval, issued: 0 }
    }

    /// Same as new but for a sequence continuing an earlier paced one, i.e. the pacer
    /// also pauses before the first item
    ///
    /// # Arguments
    ///
    /// * 'inner' - the items to pace
    /// * 'pacer' - the pacer doing the actual waiting
    /// * 'interval' - pause between two consecutive items
    pub fn continuing(inner: I, pacer: P, interval: Duration) -> Self {
        Self { inner, pacer, interval, issued: 1 }
    }
}

impl<I: Iterator, P: Pacer> Iterator for Paced<I, P> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        if self.issued > 0 {
            self.pacer.pause(self.interval);
        }
        self.issued += 1;

        Some(item)
    }
}

/// Pacer that only records requested pauses
#[cfg(test)]
#[derive(Default)]
pub struct RecordingPacer {
    pub pauses: Vec<Duration>,
}

#[cfg(test)]
impl Pacer for RecordingPacer {
    fn pause(&mut self, delay: Duration) {
        self.pauses.push(delay);
    }
}
