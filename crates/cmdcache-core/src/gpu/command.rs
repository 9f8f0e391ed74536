//! Decoding of recorded command units.
//!
//! A unit is a little-endian data word followed by a header word. Burst units
//! carry `extra` more data words after the header and are padded so the next
//! unit starts on an 8-byte boundary:
//!
//! ```text
//! single: [data0][header]
//! burst:  [data0][header][data1]..[dataN]{pad}
//! ```

/// Header word of a command unit.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CommandHeader(u32);

impl CommandHeader {
    pub const ADDR_OFFSET: u32 = 0;
    pub const ADDR_MASK: u32 = 0xFFFF;

    pub const BYTE_ENABLE_OFFSET: u32 = 16;
    pub const BYTE_ENABLE_MASK: u32 = 0xF;

    pub const EXTRA_OFFSET: u32 = 20;
    pub const EXTRA_MASK: u32 = 0x7F;

    pub const SEQUENTIAL_OFFSET: u32 = 31;
    pub const SEQUENTIAL_MASK: u32 = 0x1;

    /// Byte enable writing all four bytes of the destination register.
    pub const BYTE_ENABLE_ALL: u8 = 0xF;

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u32 {
        self.0
    }

    /// Header for a single write to `addr`.
    pub fn single(addr: u16) -> Self {
        let mut header = Self(0);
        header.set_addr(addr);
        header.set_byte_enable(Self::BYTE_ENABLE_ALL);
        header
    }

    /// Header for a burst of `count` values starting at `addr`.
    ///
    /// # Panics
    /// If `count` is zero or does not fit the extra field.
    pub fn burst(addr: u16, count: usize, sequential: bool) -> Self {
        assert!(
            (1..=Self::EXTRA_MASK as usize + 1).contains(&count),
            "burst of {count} values does not fit a command header"
        );

        let mut header = Self::single(addr);
        header.set_extra((count - 1) as u8);
        header.set_sequential(sequential);
        header
    }

    /// Destination register address.
    #[must_use]
    pub fn addr(&self) -> u16 {
        ((self.0 >> Self::ADDR_OFFSET) & Self::ADDR_MASK) as u16
    }

    pub fn set_addr(&mut self, val: u16) {
        self.0 = (self.0 & !(Self::ADDR_MASK << Self::ADDR_OFFSET))
            | ((val as u32 & Self::ADDR_MASK) << Self::ADDR_OFFSET);
    }

    /// Byte enable. Zero means the unit writes nothing.
    #[must_use]
    pub fn byte_enable(&self) -> u8 {
        ((self.0 >> Self::BYTE_ENABLE_OFFSET) & Self::BYTE_ENABLE_MASK) as u8
    }

    pub fn set_byte_enable(&mut self, val: u8) {
        self.0 = (self.0 & !(Self::BYTE_ENABLE_MASK << Self::BYTE_ENABLE_OFFSET))
            | ((val as u32 & Self::BYTE_ENABLE_MASK) << Self::BYTE_ENABLE_OFFSET);
    }

    /// Value count minus one. Zero for single commands.
    #[must_use]
    pub fn extra(&self) -> u8 {
        ((self.0 >> Self::EXTRA_OFFSET) & Self::EXTRA_MASK) as u8
    }

    pub fn set_extra(&mut self, val: u8) {
        self.0 = (self.0 & !(Self::EXTRA_MASK << Self::EXTRA_OFFSET))
            | ((val as u32 & Self::EXTRA_MASK) << Self::EXTRA_OFFSET);
    }

    /// Whether a burst increments the destination address per value.
    #[must_use]
    pub fn sequential(&self) -> bool {
        (self.0 >> Self::SEQUENTIAL_OFFSET) & Self::SEQUENTIAL_MASK != 0
    }

    pub fn set_sequential(&mut self, val: bool) {
        self.0 = (self.0 & !(Self::SEQUENTIAL_MASK << Self::SEQUENTIAL_OFFSET))
            | ((val as u32) << Self::SEQUENTIAL_OFFSET);
    }

    pub fn is_burst(&self) -> bool {
        self.extra() != 0
    }

    /// Number of values carried by the unit.
    pub fn value_count(&self) -> usize {
        self.extra() as usize + 1
    }
}

/// Byte offset of the unit following one at `offset` with `header`.
pub fn next_unit_offset(offset: usize, header: CommandHeader) -> usize {
    if !header.is_burst() {
        return offset + 8;
    }

    let next = offset + (header.value_count() + 1) * 4;
    if next & 4 != 0 {
        next + 4
    } else {
        next
    }
}

/// Byte offset of value `index` inside a unit starting at `offset`.
pub fn value_offset(offset: usize, index: usize) -> usize {
    if index == 0 {
        offset
    } else {
        offset + 4 + 4 * index
    }
}

pub(crate) fn read_word(buf: &[u8], offset: usize) -> u32 {
    let bytes = [
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ];
    u32::from_le_bytes(bytes)
}

/// One register write performed by a command unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterWrite {
    pub address: u16,
    pub value: u32,
    /// Byte offset of the value word in the scanned buffer.
    pub offset: usize,
}

/// A decoded command unit borrowing its bytes from the scanned buffer.
#[derive(Debug, Clone, Copy)]
pub struct RawCommand<'a> {
    buf: &'a [u8],
    offset: usize,
    header: CommandHeader,
}

impl<'a> RawCommand<'a> {
    /// Byte offset of the unit in the scanned buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn header(&self) -> CommandHeader {
        self.header
    }

    /// Value `index` of the unit.
    ///
    /// # Panics
    /// If `index` is not below [`CommandHeader::value_count`].
    pub fn value(&self, index: usize) -> u32 {
        assert!(index < self.header.value_count());
        read_word(self.buf, value_offset(self.offset, index))
    }

    /// The register writes performed by this unit, in execution order.
    pub fn writes(&self) -> impl Iterator<Item = RegisterWrite> + 'a {
        let this = *self;
        let count = if this.header.byte_enable() == 0 {
            0
        } else {
            this.header.value_count()
        };

        (0..count).map(move |index| {
            let address = if this.header.sequential() {
                this.header.addr().wrapping_add(index as u16)
            } else {
                this.header.addr()
            };

            RegisterWrite {
                address,
                value: this.value(index),
                offset: value_offset(this.offset, index),
            }
        })
    }
}

/// Iterates over the command units of a buffer.
pub struct CommandIter<'a> {
    buf: &'a [u8],
    offset: usize,
    end: usize,
}

impl<'a> CommandIter<'a> {
    /// Walk `buf[start..size]`. `size` is clamped to the buffer length.
    pub fn new(buf: &'a [u8], start: usize, size: usize) -> Self {
        Self {
            buf,
            offset: start,
            end: size.min(buf.len()),
        }
    }

    /// Byte offset of the next unit.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// All register writes of the remaining units.
    pub fn writes(self) -> impl Iterator<Item = RegisterWrite> + 'a {
        self.flat_map(|command| command.writes())
    }
}

impl<'a> Iterator for CommandIter<'a> {
    type Item = RawCommand<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.end {
            return None;
        }

        if self.offset + 8 > self.end {
            log::warn!(
                "truncated command unit at 0x{:X} ({} bytes left)",
                self.offset,
                self.end - self.offset
            );
            self.offset = self.end;
            return None;
        }

        let header = CommandHeader::from_raw(read_word(self.buf, self.offset + 4));
        let last_value_end = value_offset(self.offset, header.value_count() - 1) + 4;
        if last_value_end > self.end {
            log::warn!(
                "truncated burst at 0x{:X}: {} values need 0x{:X} bytes, buffer ends at 0x{:X}",
                self.offset,
                header.value_count(),
                last_value_end,
                self.end
            );
            self.offset = self.end;
            return None;
        }

        let command = RawCommand {
            buf: self.buf,
            offset: self.offset,
            header,
        };
        self.offset = next_unit_offset(self.offset, header);

        Some(command)
    }
}
