use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Not enough bytes left to read")]
    NotEnoughBytes,

    #[error("Invalid size")]
    InvalidSize,

    #[error("Invalid value")]
    InvalidValue,

    #[error("Invalid hex string")]
    InvalidHex,

    #[error("Invalid utf8 string")]
    InvalidString,
}

// Reader walks a borrowed byte slice, tracking the current position
pub struct Reader<'a> {
    bytes: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, total: 0 }
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], ReaderError> {
        if self.remaining() < count {
            return Err(ReaderError::NotEnoughBytes);
        }
        let bytes = &self.bytes[self.total..self.total + count];
        self.total += count;
        Ok(bytes)
    }

    pub fn read_bytes_32(&mut self) -> Result<[u8; 32], ReaderError> {
        let bytes = self.read_bytes(32)?;
        bytes.try_into().map_err(|_| ReaderError::InvalidSize)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        let bytes = self.read_bytes(8)?;
        Ok(u64::from_be_bytes(bytes.try_into().unwrap()))
    }

    pub fn read_bool(&mut self) -> Result<bool, ReaderError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.total
    }

    pub fn total_read(&self) -> usize {
        self.total
    }
}
