mod defaults;
mod reader;
mod writer;

pub use reader::{Reader, ReaderError};
pub use writer::Writer;

// Canonical binary encoding used for wire formats and store keys.
// Every type that crosses the driver surface or is signed implements it,
// so that all replicas agree on the exact bytes.
pub trait Serializer {
    fn write(&self, writer: &mut Writer);

    fn read(reader: &mut Reader) -> Result<Self, ReaderError>
    where
        Self: Sized;

    // Size in bytes of the serialized representation
    fn size(&self) -> usize {
        let mut buffer = Vec::new();
        let mut writer = Writer::new(&mut buffer);
        self.write(&mut writer);
        buffer.len()
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut writer = Writer::new(&mut buffer);
        self.write(&mut writer);
        buffer
    }

    fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ReaderError>
    where
        Self: Sized,
    {
        let mut reader = Reader::new(bytes);
        let value = Self::read(&mut reader)?;
        // trailing bytes mean the caller handed us a different type
        if reader.remaining() != 0 {
            return Err(ReaderError::InvalidSize);
        }
        Ok(value)
    }

    fn from_hex(hex: &str) -> Result<Self, ReaderError>
    where
        Self: Sized,
    {
        let bytes = hex::decode(hex).map_err(|_| ReaderError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }
}
