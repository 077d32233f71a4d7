//! Fixed-size memory blocks backing PPU RAM.
//!
//! Blocks live inline by default; the `boxed-memblock` feature (and targets
//! with small stacks) moves them to the heap without changing the API.

use core::ops::{Deref, DerefMut};

#[cfg(any(feature = "boxed-memblock", target_arch = "wasm32"))]
type Storage<T, const N: usize> = Box<[T; N]>;

#[cfg(not(any(feature = "boxed-memblock", target_arch = "wasm32")))]
type Storage<T, const N: usize> = [T; N];

#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemBlock<T, const N: usize>(Storage<T, N>);

/// Block of bytes, the common case for video memory.
pub type ByteBlock<const N: usize> = MemBlock<u8, N>;

/// Concrete blocks owned by the PPU core.
pub mod ppu {
    use crate::memory::ppu as ppu_mem;

    pub type NameTableVram = super::ByteBlock<{ ppu_mem::NAMETABLE_VRAM_SIZE }>;
    pub type PatternVram = super::ByteBlock<{ ppu_mem::PATTERN_SPACE }>;
    pub type PaletteRam = super::ByteBlock<{ ppu_mem::PALETTE_RAM_SIZE }>;
    pub type OamRam = super::ByteBlock<{ ppu_mem::OAM_RAM_SIZE }>;
    pub type SecondaryOamRam = super::ByteBlock<{ ppu_mem::SECONDARY_OAM_RAM_SIZE }>;
    /// Background pixel line used by the sprite-0 hit test.
    pub type PixelLine = super::ByteBlock<{ ppu_mem::FRAME_WIDTH }>;
}

impl<T: Copy, const N: usize> MemBlock<T, N> {
    /// Creates a block with every element set to `value`.
    #[inline]
    pub fn filled(value: T) -> Self {
        #[cfg(any(feature = "boxed-memblock", target_arch = "wasm32"))]
        {
            Self(Box::new([value; N]))
        }
        #[cfg(not(any(feature = "boxed-memblock", target_arch = "wasm32")))]
        {
            Self([value; N])
        }
    }

    /// Copies `src` into the block; `src` must be exactly `N` long.
    pub fn copy_from(&mut self, src: &[T]) -> bool {
        if src.len() != N {
            return false;
        }
        self.as_mut_slice().copy_from_slice(src);
        true
    }
}

impl<T: Copy + Default, const N: usize> MemBlock<T, N> {
    pub fn new() -> Self {
        Self::filled(T::default())
    }
}

impl<T: Copy + Default, const N: usize> Default for MemBlock<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> MemBlock<T, N> {
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.0[..]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.0[..]
    }
}

impl<T, const N: usize> Deref for MemBlock<T, N> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T, const N: usize> DerefMut for MemBlock<T, N> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

#[cfg(not(any(feature = "boxed-memblock", target_arch = "wasm32")))]
impl<T: Copy, const N: usize> Copy for MemBlock<T, N> {}

#[cfg(feature = "savestate-serde")]
impl<T, const N: usize> serde::Serialize for MemBlock<T, N>
where
    T: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.as_slice())
    }
}

#[cfg(feature = "savestate-serde")]
impl<'de, T, const N: usize> serde::Deserialize<'de> for MemBlock<T, N>
where
    T: Copy + Default + serde::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let items = Vec::<T>::deserialize(deserializer)?;
        let mut out = Self::new();
        if !out.copy_from(&items) {
            return Err(serde::de::Error::invalid_length(
                items.len(),
                &"a sequence matching the block size",
            ));
        }
        Ok(out)
    }
}
