use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassParseError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid class file magic header")]
    InvalidMagic,
    #[error("unsupported constant pool tag {tag}")]
    UnsupportedConstant { tag: u8 },
    #[error("invalid constant pool index {index}")]
    InvalidConstantIndex { index: u16 },
    #[error("invalid UTF-8 string in constant pool: {0}")]
    Utf8Decode(#[from] std::string::FromUtf8Error),
}

/// Read the fully-qualified name of the class defined by `bytes`.
///
/// Only the header and constant pool are decoded; members and attributes
/// are never touched.
pub fn read_class_name(bytes: &[u8]) -> Result<String, ClassParseError> {
    let mut reader = ClassReader::new(bytes);
    reader.expect_magic()?;
    let _minor_version = reader.read_u2()?;
    let _major_version = reader.read_u2()?;
    let constant_pool = ConstantPool::parse(&mut reader)?;

    let _access_flags = reader.read_u2()?;
    let this_class = reader.read_u2()?;

    let class_name = constant_pool.class_name(this_class)?;
    Ok(class_name.replace('/', "."))
}

#[derive(Debug, Clone)]
enum Constant {
    Utf8(String),
    Class { name_index: u16 },
    Other,
    Unusable,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn parse(reader: &mut ClassReader<'_>) -> Result<Self, ClassParseError> {
        let count = reader.read_u2()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable); // index 0 unused

        let mut index = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let length = reader.read_u2()? as usize;
                    let bytes = reader.read_slice(length)?;
                    Constant::Utf8(String::from_utf8(bytes.to_vec())?)
                }
                7 => {
                    let name_index = reader.read_u2()?;
                    Constant::Class { name_index }
                }
                // Long and Double occupy two slots.
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Unusable);
                    index += 1;
                    Constant::Other
                }
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    Constant::Other
                }
                15 => {
                    reader.skip(3)?;
                    Constant::Other
                }
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    Constant::Other
                }
                other => return Err(ClassParseError::UnsupportedConstant { tag: other }),
            };

            entries.push(entry);
            index += 1;
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Result<&Constant, ClassParseError> {
        self.entries
            .get(index as usize)
            .ok_or(ClassParseError::InvalidConstantIndex { index })
    }

    fn utf8(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Utf8(value) => Ok(value.as_str()),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }

    fn class_name(&self, index: u16) -> Result<&str, ClassParseError> {
        match self.get(index)? {
            Constant::Class { name_index } => self.utf8(*name_index),
            _ => Err(ClassParseError::InvalidConstantIndex { index }),
        }
    }
}

struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn expect_magic(&mut self) -> Result<(), ClassParseError> {
        const MAGIC: u32 = 0xCAFEBABE;
        if self.read_u4()? != MAGIC {
            return Err(ClassParseError::InvalidMagic);
        }
        Ok(())
    }

    fn read_u1(&mut self) -> Result<u8, ClassParseError> {
        let value = *self.data.get(self.pos).ok_or(ClassParseError::UnexpectedEof)?;
        self.pos += 1;
        Ok(value)
    }

    fn read_u2(&mut self) -> Result<u16, ClassParseError> {
        let slice = self.read_slice(2)?;
        Ok(u16::from_be_bytes([slice[0], slice[1]]))
    }

    fn read_u4(&mut self) -> Result<u32, ClassParseError> {
        let slice = self.read_slice(4)?;
        Ok(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ClassParseError> {
        if self.pos + len > self.data.len() {
            return Err(ClassParseError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ClassParseError> {
        self.read_slice(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::class_bytes;

    #[test]
    fn reads_binary_name_from_constant_pool() {
        let bytes = class_bytes("com/example/Widget");
        assert_eq!(read_class_name(&bytes).unwrap(), "com.example.Widget");
    }

    #[test]
    fn rejects_invalid_magic() {
        let mut bytes = class_bytes("A");
        bytes[0] = 0;
        assert!(matches!(
            read_class_name(&bytes),
            Err(ClassParseError::InvalidMagic)
        ));
    }

    #[test]
    fn truncated_input_reports_eof() {
        let bytes = class_bytes("com/example/Widget");
        assert!(matches!(
            read_class_name(&bytes[..12]),
            Err(ClassParseError::UnexpectedEof)
        ));
    }
}
