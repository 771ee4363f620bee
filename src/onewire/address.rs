use defmt::Format;

/// ROM code of a 1-Wire device, in bus order: family code, 48-bit serial, CRC.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Address([u8; 8]);

impl Address {
    pub const fn from_rom(rom: [u8; 8]) -> Self {
        Self(rom)
    }

    /// Bytes as sent after MATCH ROM
    pub const fn rom(&self) -> &[u8; 8] {
        &self.0
    }

    pub const fn family_code(&self) -> u8 {
        self.0[0]
    }

    pub fn serial_number(&self) -> u64 {
        let mut serial = [0; 8];
        serial[..6].copy_from_slice(&self.0[1..7]);
        u64::from_le_bytes(serial)
    }
}

// `28-00000f83fb60`, the naming used by the Linux w1 subsystem
impl core::fmt::Debug for Address {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02x}-{:012x}", self.family_code(), self.serial_number())
    }
}

impl Format for Address {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{=u8:02x}-{=u64:012x}", self.family_code(), self.serial_number());
    }
}
