use core::{
    cell::UnsafeCell,
    hint::spin_loop,
    ops::{Deref, DerefMut},
    sync::atomic::{AtomicBool, Ordering},
};

/// A busy-waiting lock around a `T`.
///
/// ```
/// # use kernel_sync::SpinLock;
/// static FREE_FRAMES: SpinLock<u32> = SpinLock::new(0);
///
/// FREE_FRAMES.with_lock(|n| *n += 16);
/// assert_eq!(*FREE_FRAMES.lock(), 16);
/// ```
pub struct SpinLock<T> {
    /// `true` while a guard is alive.
    locked: AtomicBool,
    inner: UnsafeCell<T>,
}

// Safety: mutual exclusion; only T: Send may cross threads.
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    pub const fn new(inner: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            inner: UnsafeCell::new(inner),
        }
    }

    #[inline]
    fn acquire(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Try once; returns immediately.
    #[inline]
    #[must_use]
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.acquire().then_some(SpinLockGuard { lock: self })
    }

    /// Spin until acquired, then return a guard.
    ///
    /// While contended, the loop only reads the flag and retries the
    /// compare-exchange once it is seen clear.
    #[inline]
    #[must_use]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        while !self.acquire() {
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
        SpinLockGuard { lock: self }
    }

    /// Run `f` with the lock held.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut g = self.lock();
        f(&mut g)
    }
}

/// Exclusive access to the locked value; unlocks on drop.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: the guard proves exclusive access.
        unsafe { &*self.lock.inner.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves exclusive access.
        unsafe { &mut *self.lock.inner.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
