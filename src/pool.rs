//! DMA-capable pixel buffers.
//!
//! - [`DmaBuffer`]: one aligned allocation of RGB565 pixels
//! - [`FramePool`]: the draw-buffer pair the renderer alternates between
//! - [`ScratchBuffer`]: line-group storage for the rotated flush path
//!
//! On the board the global allocator is backed by internal DRAM only (see
//! `bin/main.rs`), which is what makes these allocations DMA-capable.

use core::alloc::Layout;
use core::ptr::NonNull;

use alloc::alloc::{alloc_zeroed, dealloc};

use crate::config::DisplayConfig;
use crate::error::Error;

const PIXEL_BYTES: usize = core::mem::size_of::<u16>();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    OutOfDmaMemory { bytes: usize },
    Busy,
    ScratchBound { requested: usize, limit: usize },
}

impl<E> From<PoolError> for Error<E> {
    fn from(e: PoolError) -> Self {
        match e {
            PoolError::OutOfDmaMemory { bytes } => Error::OutOfDmaMemory { bytes },
            PoolError::Busy => Error::Busy,
            PoolError::ScratchBound { requested, limit } => Error::ScratchBound { requested, limit },
        }
    }
}

/// Zeroed, `align`-aligned block of `len` pixels.
pub struct DmaBuffer {
    ptr: NonNull<u16>,
    len: usize,
    layout: Layout,
}

impl DmaBuffer {
    pub fn try_new(len: usize, align: usize) -> Result<Self, PoolError> {
        let bytes = len * PIXEL_BYTES;
        let layout = Layout::from_size_align(bytes, align.max(core::mem::align_of::<u16>()))
            .map_err(|_| PoolError::OutOfDmaMemory { bytes })?;
        if bytes == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
                layout,
            });
        }
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw as *mut u16).ok_or(PoolError::OutOfDmaMemory { bytes })?;
        Ok(Self { ptr, len, layout })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.len * PIXEL_BYTES
    }

    #[inline]
    pub fn as_slice(&self) -> &[u16] {
        // SAFETY: ptr is valid for len initialised (zeroed) u16s, or dangling with len 0.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        // SAFETY: as above, and &mut self gives exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            // SAFETY: allocated in try_new with this exact layout.
            unsafe { dealloc(self.ptr.as_ptr() as *mut u8, self.layout) };
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SlotState {
    Free,
    Rendering,
    InFlight,
}

struct Slot {
    buf: DmaBuffer,
    state: SlotState,
}

/// Proof of ownership of one draw buffer. Not `Clone`: give it back with
/// [`FramePool::release`].
#[derive(Debug, PartialEq, Eq)]
pub struct Lease {
    index: usize,
}

impl Lease {
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// The double-buffer pair. The renderer fills one buffer while the other is
/// (or was just) on its way to the panel.
pub struct FramePool {
    slots: [Slot; 2],
    next: usize,
}

impl FramePool {
    pub fn new(cfg: &DisplayConfig) -> Result<Self, PoolError> {
        let pixels = cfg.draw_buf_pixels();
        let a = DmaBuffer::try_new(pixels, cfg.dma_align)?;
        let b = DmaBuffer::try_new(pixels, cfg.dma_align)?;
        log::info!(
            "Draw buffers: 2 x {} bytes, {}-byte aligned",
            a.byte_len(),
            cfg.dma_align
        );
        Ok(Self {
            slots: [
                Slot { buf: a, state: SlotState::Free },
                Slot { buf: b, state: SlotState::Free },
            ],
            next: 0,
        })
    }

    /// Pixels per draw buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots[0].buf.len()
    }

    /// Hand out the next free buffer, alternating between the two.
    pub fn acquire(&mut self) -> Result<Lease, PoolError> {
        for step in 0..2 {
            let index = (self.next + step) % 2;
            if self.slots[index].state == SlotState::Free {
                self.slots[index].state = SlotState::Rendering;
                self.next = 1 - index;
                return Ok(Lease { index });
            }
        }
        Err(PoolError::Busy)
    }

    /// Writable view for the renderer.
    #[inline]
    pub fn pixels_mut(&mut self, lease: &Lease) -> &mut [u16] {
        self.slots[lease.index].buf.as_mut_slice()
    }

    /// Move the leased buffer to the transport until the returned guard
    /// drops. The guard holds the pool, so no second buffer can go in flight.
    pub fn begin_transfer(&mut self, lease: &Lease) -> Transfer<'_> {
        debug_assert!(self.in_flight() == 0, "a second buffer went in flight");
        self.slots[lease.index].state = SlotState::InFlight;
        Transfer {
            pool: self,
            index: lease.index,
        }
    }

    /// Run `f` with the leased buffer in flight; it is back with the
    /// renderer when `f` returns.
    pub fn with_transfer<R>(&mut self, lease: &Lease, f: impl FnOnce(&mut [u16]) -> R) -> R {
        f(self.begin_transfer(lease).pixels())
    }

    pub fn release(&mut self, lease: Lease) {
        self.slots[lease.index].state = SlotState::Free;
    }

    pub fn is_in_flight(&self, lease: &Lease) -> bool {
        self.slots[lease.index].state == SlotState::InFlight
    }

    /// Buffers currently owned by the transport.
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|s| s.state == SlotState::InFlight).count()
    }

    pub fn free(&self) -> usize {
        self.slots.iter().filter(|s| s.state == SlotState::Free).count()
    }
}

/// A draw buffer on loan to the transport; returns to the renderer on drop.
pub struct Transfer<'p> {
    pool: &'p mut FramePool,
    index: usize,
}

impl Transfer<'_> {
    #[inline]
    pub fn pixels(&mut self) -> &mut [u16] {
        self.pool.slots[self.index].buf.as_mut_slice()
    }

    /// Read-only view of the pool while the transfer is open.
    pub fn pool(&self) -> &FramePool {
        self.pool
    }
}

impl Drop for Transfer<'_> {
    fn drop(&mut self) {
        self.pool.slots[self.index].state = SlotState::Rendering;
    }
}

/// Line-group scratch storage for the rotated path, never larger than
/// `line_group * logical_width` pixels.
pub struct ScratchBuffer {
    buf: DmaBuffer,
}

impl ScratchBuffer {
    /// Largest scratch buffer `cfg` allows, in bytes.
    #[inline]
    pub fn limit_bytes(cfg: &DisplayConfig) -> usize {
        cfg.scratch_pixels() * PIXEL_BYTES
    }

    pub fn try_new(pixels: usize, cfg: &DisplayConfig) -> Result<Self, PoolError> {
        let requested = pixels * PIXEL_BYTES;
        let limit = Self::limit_bytes(cfg);
        if requested > limit {
            return Err(PoolError::ScratchBound { requested, limit });
        }
        Ok(Self {
            buf: DmaBuffer::try_new(pixels, cfg.dma_align)?,
        })
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.buf.byte_len()
    }

    /// First `pixels` entries of the scratch buffer.
    #[inline]
    pub fn prefix_mut(&mut self, pixels: usize) -> &mut [u16] {
        &mut self.buf.as_mut_slice()[..pixels]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg() -> DisplayConfig {
        DisplayConfig {
            panel_width: 16,
            panel_height: 24,
            draw_buf_lines: 4,
            ..DisplayConfig::CO5300_LANDSCAPE
        }
    }

    #[test]
    fn test_dma_buffer_alignment_and_zeroing() {
        let buf = DmaBuffer::try_new(1000, 64).unwrap();
        assert_eq!(buf.address() % 64, 0);
        assert_eq!(buf.byte_len(), 2000);
        assert!(buf.as_slice().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_zero_length_buffer() {
        let mut buf = DmaBuffer::try_new(0, 64).unwrap();
        assert!(buf.is_empty());
        assert!(buf.as_mut_slice().is_empty());
    }

    #[test]
    fn test_pool_alternates_buffers() {
        let mut pool = FramePool::new(&small_cfg()).unwrap();
        assert_eq!(pool.capacity(), 64);

        let a = pool.acquire().unwrap();
        assert_eq!(a.index(), 0);
        pool.release(a);
        let b = pool.acquire().unwrap();
        assert_eq!(b.index(), 1);
        pool.release(b);
        let c = pool.acquire().unwrap();
        assert_eq!(c.index(), 0);
        pool.release(c);
    }

    #[test]
    fn test_pool_busy_when_both_leased() {
        let mut pool = FramePool::new(&small_cfg()).unwrap();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.acquire(), Err(PoolError::Busy));
        pool.release(a);
        let c = pool.acquire().unwrap();
        assert_eq!(c.index(), 0);
        pool.release(b);
        pool.release(c);
        assert_eq!(pool.free(), 2);
    }

    #[test]
    fn test_transfer_is_scoped() {
        let mut pool = FramePool::new(&small_cfg()).unwrap();
        let lease = pool.acquire().unwrap();
        pool.pixels_mut(&lease)[0] = 0xABCD;
        let seen = pool.with_transfer(&lease, |px| {
            px[0] = px[0].swap_bytes();
            px[0]
        });
        assert_eq!(seen, 0xCDAB);
        assert_eq!(pool.in_flight(), 0);
        pool.release(lease);
    }

    #[test]
    fn test_one_buffer_in_flight_while_other_renders() {
        let mut pool = FramePool::new(&small_cfg()).unwrap();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        pool.pixels_mut(&b)[0] = 0x1111;

        {
            let mut t = pool.begin_transfer(&a);
            t.pixels()[0] = 0x2222;
            assert_eq!(t.pool().in_flight(), 1);
            assert_eq!(t.pool().free(), 0);
            assert!(t.pool().is_in_flight(&a));
            assert!(!t.pool().is_in_flight(&b));
        }
        assert_eq!(pool.in_flight(), 0);

        // b is still the renderer's and can go out next
        pool.pixels_mut(&b)[1] = 0x3333;
        let sent = pool.with_transfer(&b, |px| (px[0], px[1]));
        assert_eq!(sent, (0x1111, 0x3333));
        assert_eq!(pool.pixels_mut(&a)[0], 0x2222);
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.free(), 2);
    }

    #[test]
    fn test_scratch_bound() {
        let cfg = small_cfg();
        // logical width is 24 when rotated, line group 8
        assert_eq!(ScratchBuffer::limit_bytes(&cfg), 8 * 24 * 2);
        assert!(ScratchBuffer::try_new(8 * 24, &cfg).is_ok());
        assert_eq!(
            ScratchBuffer::try_new(8 * 24 + 1, &cfg).err(),
            Some(PoolError::ScratchBound {
                requested: 386,
                limit: 384
            })
        );
    }
}
