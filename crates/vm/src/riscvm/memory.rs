use std::{
    fmt::{self, Display},
    ops::BitOr,
};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("failed to allocate {size} bytes for a memory region")]
    OutOfMemory { size: u32 },
    #[error("access of {len} bytes at 0x{addr:08x} is out of bounds")]
    OutOfBounds { addr: u32, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Rom,
    Ram,
}

impl Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Rom => write!(f, "ROM"),
            RegionKind::Ram => write!(f, "RAM"),
        }
    }
}

/// Access attributes of a region. They are recorded for inspection only,
/// no access is ever checked against them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes(u8);

impl Attributes {
    pub const READ_ONLY: Attributes = Attributes(1 << 0);
    pub const READ_WRITE: Attributes = Attributes(1 << 1);
    pub const NO_EXECUTE: Attributes = Attributes(1 << 2);

    pub const fn contains(self, other: Attributes) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Attributes {
    type Output = Attributes;

    fn bitor(self, rhs: Attributes) -> Attributes {
        Attributes(self.0 | rhs.0)
    }
}

impl Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.contains(Self::READ_ONLY) || self.contains(Self::READ_WRITE) {
            'r'
        } else {
            '-'
        };
        let w = if self.contains(Self::READ_WRITE) { 'w' } else { '-' };
        let x = if self.contains(Self::NO_EXECUTE) { '-' } else { 'x' };
        write!(f, "{r}{w}{x}")
    }
}

/// A contiguous mapping of `size` bytes starting at `base`.
///
/// Addresses are translated to buffer offsets by subtracting `base`, every
/// access has to fit entirely inside the region. All values are little
/// endian and accesses need not be aligned.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    bytes: Box<[u8]>,
    base: u32,
    kind: RegionKind,
    attrs: Attributes,
    /// Translate address 0 to offset 0 regardless of `base`.
    zero_address_alias: bool,
}

impl MemoryRegion {
    /// Allocates a zeroed region.
    pub fn new(
        base: u32,
        size: u32,
        kind: RegionKind,
        attrs: Attributes,
    ) -> Result<MemoryRegion, MemoryError> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(size as usize)
            .map_err(|_| MemoryError::OutOfMemory { size })?;
        bytes.resize(size as usize, 0);

        tracing::debug!(
            "created {} region at 0x{:08x}, size 0x{:x}, attrs {}",
            kind,
            base,
            size,
            attrs
        );

        Ok(MemoryRegion {
            bytes: bytes.into_boxed_slice(),
            base,
            kind,
            attrs,
            zero_address_alias: false,
        })
    }

    pub fn with_zero_address_alias(mut self, enabled: bool) -> MemoryRegion {
        self.zero_address_alias = enabled;
        self
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn size(&self) -> u32 {
        self.bytes.len() as u32
    }

    /// One past the last address of the region.
    pub fn end(&self) -> u64 {
        self.base as u64 + self.bytes.len() as u64
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn attrs(&self) -> Attributes {
        self.attrs
    }

    pub fn zero_address_alias(&self) -> bool {
        self.zero_address_alias
    }

    /// Whether `addr` falls inside `[base, base + size)`.
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.base && (addr as u64) < self.end()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn offset(&self, addr: u32, len: usize) -> Result<usize, MemoryError> {
        let offset = if addr == 0 && self.zero_address_alias {
            0
        } else {
            addr.checked_sub(self.base)
                .ok_or(MemoryError::OutOfBounds { addr, len })? as usize
        };

        match offset.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(offset),
            _ => Err(MemoryError::OutOfBounds { addr, len }),
        }
    }

    fn read_bytes<const N: usize>(&self, addr: u32) -> Result<[u8; N], MemoryError> {
        let offset = self.offset(addr, N)?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.bytes[offset..offset + N]);
        Ok(buf)
    }

    fn write_bytes<const N: usize>(&mut self, addr: u32, data: [u8; N]) -> Result<(), MemoryError> {
        let offset = self.offset(addr, N)?;
        self.bytes[offset..offset + N].copy_from_slice(&data);
        Ok(())
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, MemoryError> {
        Ok(self.read_bytes::<1>(addr)?[0])
    }

    pub fn read_u16(&self, addr: u32) -> Result<u16, MemoryError> {
        Ok(u16::from_le_bytes(self.read_bytes(addr)?))
    }

    pub fn read_u32(&self, addr: u32) -> Result<u32, MemoryError> {
        Ok(u32::from_le_bytes(self.read_bytes(addr)?))
    }

    pub fn read_s8(&self, addr: u32) -> Result<i32, MemoryError> {
        Ok(self.read_bytes::<1>(addr)?[0] as i8 as i32)
    }

    pub fn read_s16(&self, addr: u32) -> Result<i32, MemoryError> {
        Ok(i16::from_le_bytes(self.read_bytes(addr)?) as i32)
    }

    pub fn read_s32(&self, addr: u32) -> Result<i32, MemoryError> {
        Ok(i32::from_le_bytes(self.read_bytes(addr)?))
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), MemoryError> {
        self.write_bytes(addr, [value])
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), MemoryError> {
        self.write_bytes(addr, value.to_le_bytes())
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        self.write_bytes(addr, value.to_le_bytes())
    }

    /// Copies `data` into the region starting at byte offset `offset`.
    pub fn copy_from(&mut self, offset: usize, data: &[u8]) -> Result<(), MemoryError> {
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= self.bytes.len())
            .ok_or(MemoryError::OutOfBounds {
                addr: self.base.wrapping_add(offset as u32),
                len: data.len(),
            })?;
        self.bytes[offset..end].copy_from_slice(data);
        Ok(())
    }
}

/// The address space of a VM, a ROM region for the program image followed by
/// a RAM region for data and stack.
#[derive(Debug, Clone)]
pub struct Memory {
    pub rom: MemoryRegion,
    pub ram: MemoryRegion,
}

impl Memory {
    /// Finds the region `addr` belongs to.
    pub fn region(&self, addr: u32, len: usize) -> Result<&MemoryRegion, MemoryError> {
        if (addr == 0 && self.rom.zero_address_alias()) || self.rom.contains(addr) {
            Ok(&self.rom)
        } else if self.ram.contains(addr) {
            Ok(&self.ram)
        } else {
            Err(MemoryError::OutOfBounds { addr, len })
        }
    }

    fn region_mut(&mut self, addr: u32, len: usize) -> Result<&mut MemoryRegion, MemoryError> {
        if (addr == 0 && self.rom.zero_address_alias()) || self.rom.contains(addr) {
            Ok(&mut self.rom)
        } else if self.ram.contains(addr) {
            Ok(&mut self.ram)
        } else {
            Err(MemoryError::OutOfBounds { addr, len })
        }
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, MemoryError> {
        self.region(addr, 1)?.read_u8(addr)
    }

    pub fn read_u16(&self, addr: u32) -> Result<u16, MemoryError> {
        self.region(addr, 2)?.read_u16(addr)
    }

    pub fn read_u32(&self, addr: u32) -> Result<u32, MemoryError> {
        self.region(addr, 4)?.read_u32(addr)
    }

    pub fn read_s8(&self, addr: u32) -> Result<i32, MemoryError> {
        self.region(addr, 1)?.read_s8(addr)
    }

    pub fn read_s16(&self, addr: u32) -> Result<i32, MemoryError> {
        self.region(addr, 2)?.read_s16(addr)
    }

    pub fn read_s32(&self, addr: u32) -> Result<i32, MemoryError> {
        self.region(addr, 4)?.read_s32(addr)
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), MemoryError> {
        self.region_mut(addr, 1)?.write_u8(addr, value)
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), MemoryError> {
        self.region_mut(addr, 2)?.write_u16(addr, value)
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), MemoryError> {
        self.region_mut(addr, 4)?.write_u32(addr, value)
    }
}
