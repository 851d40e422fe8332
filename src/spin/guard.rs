use super::{Relax, Spin, SpinRelax};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

pub(crate) struct SpinGuard<'a, T, R = SpinRelax>
where
    T: ?Sized,
{
    pub(super) lock: &'a Spin<T, R>,
    // Holding a spin lock pins the critical section to one thread.
    pub(super) _not_send: PhantomData<*mut ()>,
}

impl<T, R> SpinGuard<'_, T, R>
where
    T: ?Sized,
    R: Relax,
{
    /// # Safety
    /// The protected value must not be accessed again until `force_relock`
    /// has been called.
    pub(crate) unsafe fn force_unlock(&mut self) {
        unsafe { self.lock.do_unlock() }
    }

    /// # Safety
    /// Must pair with a previous `force_unlock`; calling it twice deadlocks
    /// against ourselves.
    pub(crate) unsafe fn force_relock(&mut self) {
        self.lock.do_lock();
    }
}

impl<T, R> Deref for SpinGuard<'_, T, R>
where
    T: ?Sized,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // SAFETY: We are holding the lock, so we can safely access the value.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T, R> DerefMut for SpinGuard<'_, T, R>
where
    T: ?Sized,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: We are holding the lock, so we can safely access the value.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T, R> Drop for SpinGuard<'_, T, R>
where
    T: ?Sized,
{
    fn drop(&mut self) {
        // SAFETY: The guard is going away; the value is not accessed through
        //         it afterwards.
        unsafe { self.lock.do_unlock() }
    }
}
