//! Process-wide frame allocator.
//!
//! The bootstrap builds a [`FrameAllocator`] over the boot-allocated frame
//! table and [`install`]s it here; later code reaches it through
//! [`with_frame_allocator`].

use crate::frame_alloc::FrameAllocator;
use kernel_sync::SpinLock;

static FRAME_ALLOCATOR: SpinLock<Option<FrameAllocator<'static>>> = SpinLock::new(None);

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum InstallError {
    #[error("a frame allocator is already installed")]
    AlreadyInstalled,
}

/// Make `allocator` the process-wide frame allocator.
///
/// # Errors
/// [`InstallError::AlreadyInstalled`] if one is installed; the existing
/// allocator is kept.
pub fn install(allocator: FrameAllocator<'static>) -> Result<(), InstallError> {
    FRAME_ALLOCATOR.with_lock(|slot| {
        if slot.is_some() {
            return Err(InstallError::AlreadyInstalled);
        }
        *slot = Some(allocator);
        Ok(())
    })
}

/// Run `f` with the installed allocator, or return `None` if there is none.
pub fn try_with_frame_allocator<R>(f: impl FnOnce(&mut FrameAllocator<'static>) -> R) -> Option<R> {
    FRAME_ALLOCATOR.with_lock(|slot| slot.as_mut().map(f))
}

/// Run `f` with the installed allocator.
///
/// # Panics
/// If no allocator is installed.
pub fn with_frame_allocator<R>(f: impl FnOnce(&mut FrameAllocator<'static>) -> R) -> R {
    match try_with_frame_allocator(f) {
        Some(r) => r,
        None => panic!("frame allocator used before installation"),
    }
}

/// Uninstall and return the allocator.
pub fn teardown() -> Option<FrameAllocator<'static>> {
    FRAME_ALLOCATOR.with_lock(Option::take)
}
