use super::{Reader, ReaderError, Serializer, Writer};

// Strings are length-prefixed with a u16, which bounds them to 64 KiB
const MAX_STRING_SIZE: usize = u16::MAX as usize;

impl Serializer for u8 {
    fn write(&self, writer: &mut Writer) {
        writer.write_u8(*self);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u8()
    }

    fn size(&self) -> usize {
        1
    }
}

impl Serializer for u16 {
    fn write(&self, writer: &mut Writer) {
        writer.write_u16(*self);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u16()
    }

    fn size(&self) -> usize {
        2
    }
}

impl Serializer for u32 {
    fn write(&self, writer: &mut Writer) {
        writer.write_u32(self);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u32()
    }

    fn size(&self) -> usize {
        4
    }
}

impl Serializer for u64 {
    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u64()
    }

    fn size(&self) -> usize {
        8
    }
}

impl Serializer for bool {
    fn write(&self, writer: &mut Writer) {
        writer.write_bool(*self);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_bool()
    }

    fn size(&self) -> usize {
        1
    }
}

impl Serializer for String {
    fn write(&self, writer: &mut Writer) {
        let bytes = self.as_bytes();
        writer.write_u16(bytes.len() as u16);
        writer.write_bytes(bytes);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let len = reader.read_u16()? as usize;
        if len > MAX_STRING_SIZE {
            return Err(ReaderError::InvalidSize);
        }
        let bytes = reader.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ReaderError::InvalidString)
    }

    fn size(&self) -> usize {
        2 + self.len()
    }
}

impl Serializer for [u8; 32] {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(self);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_bytes_32()
    }

    fn size(&self) -> usize {
        32
    }
}

impl<T: Serializer> Serializer for Option<T> {
    fn write(&self, writer: &mut Writer) {
        match self {
            Some(value) => {
                writer.write_u8(1);
                value.write(writer);
            }
            None => writer.write_u8(0),
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::read(reader)?)),
            _ => Err(ReaderError::InvalidValue),
        }
    }

    fn size(&self) -> usize {
        1 + match self {
            Some(value) => value.size(),
            None => 0,
        }
    }
}

// Collections are length-prefixed with a u32 so that raw byte payloads
// (signed external transactions, tracker raw txs) are not capped at 64 KiB
impl<T: Serializer> Serializer for Vec<T> {
    fn write(&self, writer: &mut Writer) {
        writer.write_u32(&(self.len() as u32));
        for item in self {
            item.write(writer);
        }
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let count = reader.read_u32()? as usize;
        if count > reader.remaining() {
            return Err(ReaderError::InvalidSize);
        }
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(T::read(reader)?);
        }
        Ok(items)
    }

    fn size(&self) -> usize {
        4 + self.iter().map(|item| item.size()).sum::<usize>()
    }
}
