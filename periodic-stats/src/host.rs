//! Release of a host serialization lock around long parallel computations.
//!
//! When this library is embedded in a host with a global lock (for example
//! an interpreter lock in a scripting language), the lock should be released
//! while the heavy parallel sections run, and taken back before returning to
//! the host. [`ReleasedHost`] makes sure the lock is reacquired on every exit
//! path, including errors and panics.

/// A lock owned by the host embedding this library
pub trait HostLock {
    /// Release the lock, allowing the host to run other work
    fn release(&self);
    /// Take back the lock. This is always called after `release`.
    fn reacquire(&self);
}

/// Host lock implementation for hosts without a global lock
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHostLock;

impl HostLock for NoHostLock {
    fn release(&self) {}
    fn reacquire(&self) {}
}

/// RAII guard releasing a [`HostLock`] on creation and reacquiring it when
/// dropped.
pub struct ReleasedHost<'a, H: HostLock + ?Sized> {
    host: &'a H,
}

impl<'a, H: HostLock + ?Sized> ReleasedHost<'a, H> {
    /// Release the `host` lock until the returned guard is dropped
    pub fn new(host: &'a H) -> ReleasedHost<'a, H> {
        host.release();
        ReleasedHost { host }
    }
}

impl<'a, H: HostLock + ?Sized> Drop for ReleasedHost<'a, H> {
    fn drop(&mut self) {
        self.host.reacquire();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Host lock recording all the calls made to it
    #[derive(Debug, Default)]
    pub struct RecordingHost {
        pub events: Mutex<Vec<&'static str>>,
    }

    impl HostLock for RecordingHost {
        fn release(&self) {
            self.events.lock().unwrap().push("release");
        }

        fn reacquire(&self) {
            self.events.lock().unwrap().push("reacquire");
        }
    }

    #[test]
    fn reacquire_on_drop() {
        let host = RecordingHost::default();
        {
            let _guard = ReleasedHost::new(&host);
            assert_eq!(*host.events.lock().unwrap(), ["release"]);
        }
        assert_eq!(*host.events.lock().unwrap(), ["release", "reacquire"]);
    }

    #[test]
    fn reacquire_on_panic() {
        let host = RecordingHost::default();
        let result = std::panic::catch_unwind(|| {
            let _guard = ReleasedHost::new(&host);
            panic!("computation failed");
        });
        assert!(result.is_err());
        assert_eq!(*host.events.lock().unwrap(), ["release", "reacquire"]);
    }
}
