//! # 32-bit Task State Segment
//!
//! The kernel never uses hardware task switching. The TSS is only there so
//! the CPU finds `ss0:esp0`, the kernel stack, when a trap or interrupt
//! raises the privilege level from ring 3 to ring 0.
//!
//! The I/O map base points at the end of the segment, so there is no I/O
//! permission bitmap and user code cannot touch ports.

use core::mem::size_of;

/// Hardware layout of a 32-bit TSS (104 bytes).
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[allow(dead_code)]
pub struct TaskState {
    link: u16,
    _pad0: u16,
    /// Stack pointer loaded on a switch to ring 0.
    pub esp0: u32,
    /// Stack segment loaded on a switch to ring 0.
    pub ss0: u16,
    _pad1: u16,
    esp1: u32,
    ss1: u16,
    _pad2: u16,
    esp2: u32,
    ss2: u16,
    _pad3: u16,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u16,
    _pad4: u16,
    cs: u16,
    _pad5: u16,
    ss: u16,
    _pad6: u16,
    ds: u16,
    _pad7: u16,
    fs: u16,
    _pad8: u16,
    gs: u16,
    _pad9: u16,
    ldt: u16,
    _pad10: u16,
    /// Debug trap on task switch.
    t: u16,
    /// Offset of the I/O permission bitmap.
    iomb: u16,
}

/// Size of [`TaskState`] in bytes.
#[allow(clippy::cast_possible_truncation)]
pub const TSS_SIZE: u32 = size_of::<TaskState>() as u32;

const _: () = assert!(TSS_SIZE == 104);

impl TaskState {
    /// A TSS whose ring-0 stack is `ss0:esp0` and which has no I/O bitmap.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(esp0: u32, ss0: u16) -> Self {
        Self {
            link: 0,
            _pad0: 0,
            esp0,
            ss0,
            _pad1: 0,
            esp1: 0,
            ss1: 0,
            _pad2: 0,
            esp2: 0,
            ss2: 0,
            _pad3: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            _pad4: 0,
            cs: 0,
            _pad5: 0,
            ss: 0,
            _pad6: 0,
            ds: 0,
            _pad7: 0,
            fs: 0,
            _pad8: 0,
            gs: 0,
            _pad9: 0,
            ldt: 0,
            _pad10: 0,
            t: 0,
            iomb: TSS_SIZE as u16,
        }
    }
}
