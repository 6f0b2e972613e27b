use kernel_sync::SpinLock;
use std::sync::{Arc, Barrier};
use std::{panic, thread};

/// Stand-in for a frame allocator: a stack of free frame numbers.
struct FreeFrames {
    frames: Vec<u32>,
}

impl FreeFrames {
    fn with_frames(n: u32) -> Self {
        Self { frames: (0..n).rev().collect() }
    }

    fn alloc(&mut self) -> Option<u32> {
        self.frames.pop()
    }

    fn free(&mut self, frame: u32) {
        assert!(!self.frames.contains(&frame), "double free of frame {frame}");
        self.frames.push(frame);
    }
}

#[test]
fn guard_releases_on_drop() {
    let frames = SpinLock::new(FreeFrames::with_frames(4));

    let taken = {
        let mut g = frames.lock();
        assert!(frames.try_lock().is_none());
        g.alloc()
    };
    assert_eq!(taken, Some(0));

    let g = frames.try_lock().expect("lock released with its guard");
    assert_eq!(g.frames.len(), 3);
}

#[test]
fn singleton_slot_refuses_a_second_install() {
    let slot: SpinLock<Option<FreeFrames>> = SpinLock::new(None);

    let install = |n| {
        slot.with_lock(|s| {
            if s.is_some() {
                return false;
            }
            *s = Some(FreeFrames::with_frames(n));
            true
        })
    };
    assert!(install(8));
    assert!(!install(16));

    assert_eq!(slot.with_lock(|s| s.as_mut().and_then(FreeFrames::alloc)), Some(0));
    let torn_down = slot.with_lock(Option::take).expect("installed above");
    assert_eq!(torn_down.frames.len(), 7);
    assert!(install(16));
}

#[test]
fn contended_alloc_and_free_lose_no_frames() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 2_000;

    let frames = Arc::new(SpinLock::new(FreeFrames::with_frames(64)));
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let frames = Arc::clone(&frames);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                for _ in 0..ROUNDS {
                    let frame = frames.with_lock(FreeFrames::alloc).expect("more frames than threads");
                    thread::yield_now();
                    frames.with_lock(|f| f.free(frame));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let mut left = frames.with_lock(|f| f.frames.clone());
    left.sort_unstable();
    assert_eq!(left, (0..64).collect::<Vec<_>>());
}

#[test]
fn lock_is_released_when_the_holder_panics() {
    let frames = SpinLock::new(FreeFrames::with_frames(2));

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        frames.with_lock(|f| {
            let frame = f.alloc().unwrap();
            f.free(frame);
            f.free(frame);
        });
    }));
    assert!(res.is_err(), "double free must panic");

    assert_eq!(frames.with_lock(|f| f.frames.len()), 2);
}

#[test]
fn spinlock_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    takes_sync(&SpinLock::new(FreeFrames::with_frames(1)));
}
