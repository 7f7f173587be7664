use std::fmt;

// H10301 layout, bit 0 being the last bit clocked in
const TRAILING_PARITY_SHIFT: u32 = 0;
const CARD_NUMBER_SHIFT: u32 = 1;
const CARD_NUMBER_MASK: u64 = 0xFFFF;
const FACILITY_CODE_SHIFT: u32 = 17;
const FACILITY_CODE_MASK: u64 = 0xFF;
const LEADING_PARITY_SHIFT: u32 = 25;
// Each parity bit covers its own half of the 26-bit frame
const PARITY_HALF_MASK: u64 = 0x1FFF;
const EVEN_HALF_SHIFT: u32 = 13;

/// A view over a raw Wiegand frame laid out as 26-bit HID H10301 card data.
///
/// Construction never fails. A frame of the wrong length or with a bad parity
/// bit still yields a `CardData`, and [`CardData::is_valid`] reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CardData {
    raw: u64,
}

impl CardData {
    pub fn from_raw(raw: u64) -> CardData {
        CardData { raw }
    }

    /// Build a well formed frame, filling in both parity bits
    pub fn from_fields(facility_code: u8, card_number: u16) -> CardData {
        let body = (facility_code as u64) << FACILITY_CODE_SHIFT
            | (card_number as u64) << CARD_NUMBER_SHIFT;

        // Leading bit makes the upper half even, trailing bit makes the lower half odd
        let leading = (body >> EVEN_HALF_SHIFT & PARITY_HALF_MASK).count_ones() as u64 & 1;
        let trailing = !(body & PARITY_HALF_MASK).count_ones() as u64 & 1;

        CardData::from_raw(leading << LEADING_PARITY_SHIFT | body | trailing)
    }

    pub fn raw(&self) -> u64 {
        self.raw
    }

    pub fn leading_parity_bit(&self) -> u8 {
        (self.raw >> LEADING_PARITY_SHIFT & 0x1) as u8
    }

    pub fn facility_code(&self) -> u8 {
        (self.raw >> FACILITY_CODE_SHIFT & FACILITY_CODE_MASK) as u8
    }

    pub fn card_number(&self) -> u16 {
        (self.raw >> CARD_NUMBER_SHIFT & CARD_NUMBER_MASK) as u16
    }

    pub fn trailing_parity_bit(&self) -> u8 {
        (self.raw >> TRAILING_PARITY_SHIFT & 0x1) as u8
    }

    /// Checks both parity bits: bits 13-25 must have an even Hamming weight
    /// and bits 0-12 an odd one
    pub fn is_valid(&self) -> bool {
        let even_half = self.raw >> EVEN_HALF_SHIFT & PARITY_HALF_MASK;
        let odd_half = self.raw & PARITY_HALF_MASK;

        even_half.count_ones() % 2 == 0 && odd_half.count_ones() % 2 == 1
    }
}

impl fmt::Display for CardData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Leading Parity Bit: {}", self.leading_parity_bit())?;
        writeln!(f, "Facility Code: {}", self.facility_code())?;
        writeln!(f, "Card Number: {}", self.card_number())?;
        writeln!(f, "Trailing Parity Bit: {}", self.trailing_parity_bit())?;
        write!(
            f,
            "Is Valid: {}",
            if self.is_valid() { "True" } else { "False" }
        )
    }
}
