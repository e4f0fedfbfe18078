//! Constant pool reading and interning.
//!
//! Every entry, including `Long` and `Double`, occupies a single index. Index 0 is reserved for
//! "no entry".

use crate::insn::{Constant, MemberRef};
use crate::reader::ByteReader;
use crate::result::{Error, Result};
use std::collections::HashMap;

pub(crate) const TAG_UTF8: u8 = 1;
pub(crate) const TAG_INT: u8 = 3;
pub(crate) const TAG_FLOAT: u8 = 4;
pub(crate) const TAG_LONG: u8 = 5;
pub(crate) const TAG_DOUBLE: u8 = 6;
pub(crate) const TAG_CLASS: u8 = 7;
pub(crate) const TAG_STRING: u8 = 8;
pub(crate) const TAG_FIELD_REF: u8 = 9;
pub(crate) const TAG_METHOD_REF: u8 = 10;
pub(crate) const TAG_INTERFACE_METHOD_REF: u8 = 11;
pub(crate) const TAG_NAME_AND_TYPE: u8 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum PoolEntry {
    Utf8(String),
    Int(i32),
    Float(u32),
    Long(i64),
    Double(u64),
    Class(u16),
    String(u16),
    FieldRef { class: u16, nat: u16 },
    MethodRef { class: u16, nat: u16 },
    InterfaceMethodRef { class: u16, nat: u16 },
    NameAndType { name: u16, desc: u16 },
}

impl PoolEntry {
    fn kind(&self) -> &'static str {
        match self {
            PoolEntry::Utf8(_) => "utf8",
            PoolEntry::Int(_) => "int",
            PoolEntry::Float(_) => "float",
            PoolEntry::Long(_) => "long",
            PoolEntry::Double(_) => "double",
            PoolEntry::Class(_) => "class",
            PoolEntry::String(_) => "string",
            PoolEntry::FieldRef { .. } => "field reference",
            PoolEntry::MethodRef { .. } => "method reference",
            PoolEntry::InterfaceMethodRef { .. } => "interface method reference",
            PoolEntry::NameAndType { .. } => "name-and-type",
        }
    }
}

/// Decoded pool with typed accessors.
#[derive(Debug, Default)]
pub(crate) struct PoolReader {
    entries: Vec<PoolEntry>,
}

impl PoolReader {
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self> {
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(usize::from(count.saturating_sub(1)));
        for _ in 1..count {
            let offset = reader.offset();
            let entry = match reader.u8()? {
                TAG_UTF8 => {
                    let len = reader.u16()?;
                    let bytes = reader.take(usize::from(len))?;
                    PoolEntry::Utf8(String::from_utf8(bytes.to_vec())?)
                }
                TAG_INT => PoolEntry::Int(reader.i32()?),
                TAG_FLOAT => PoolEntry::Float(reader.u32()?),
                TAG_LONG => PoolEntry::Long(reader.i64()?),
                TAG_DOUBLE => PoolEntry::Double(reader.u64()?),
                TAG_CLASS => PoolEntry::Class(reader.u16()?),
                TAG_STRING => PoolEntry::String(reader.u16()?),
                TAG_FIELD_REF => PoolEntry::FieldRef {
                    class: reader.u16()?,
                    nat: reader.u16()?,
                },
                TAG_METHOD_REF => PoolEntry::MethodRef {
                    class: reader.u16()?,
                    nat: reader.u16()?,
                },
                TAG_INTERFACE_METHOD_REF => PoolEntry::InterfaceMethodRef {
                    class: reader.u16()?,
                    nat: reader.u16()?,
                },
                TAG_NAME_AND_TYPE => PoolEntry::NameAndType {
                    name: reader.u16()?,
                    desc: reader.u16()?,
                },
                tag => return Err(Error::UnknownPoolTag { tag, offset }),
            };
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    fn entry(&self, index: u16) -> Result<&PoolEntry> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .ok_or(Error::InvalidPoolIndex(index))
    }

    fn mismatch(index: u16, expected: &'static str) -> Error {
        Error::PoolTypeMismatch { index, expected }
    }

    pub(crate) fn utf8(&self, index: u16) -> Result<&str> {
        match self.entry(index)? {
            PoolEntry::Utf8(value) => Ok(value),
            _ => Err(Self::mismatch(index, "utf8")),
        }
    }

    pub(crate) fn class(&self, index: u16) -> Result<String> {
        match self.entry(index)? {
            PoolEntry::Class(name) => self.utf8(*name).map(str::to_string),
            _ => Err(Self::mismatch(index, "class")),
        }
    }

    pub(crate) fn optional_class(&self, index: u16) -> Result<Option<String>> {
        if index == 0 {
            return Ok(None);
        }
        self.class(index).map(Some)
    }

    fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.entry(index)? {
            PoolEntry::NameAndType { name, desc } => {
                Ok((self.utf8(*name)?.to_string(), self.utf8(*desc)?.to_string()))
            }
            _ => Err(Self::mismatch(index, "name-and-type")),
        }
    }

    pub(crate) fn field(&self, index: u16) -> Result<MemberRef> {
        match self.entry(index)? {
            PoolEntry::FieldRef { class, nat } => {
                let (name, desc) = self.name_and_type(*nat)?;
                Ok(MemberRef::new(self.class(*class)?, name, desc))
            }
            _ => Err(Self::mismatch(index, "field reference")),
        }
    }

    pub(crate) fn method(&self, index: u16) -> Result<MemberRef> {
        let (class, nat, interface) = match self.entry(index)? {
            PoolEntry::MethodRef { class, nat } => (*class, *nat, false),
            PoolEntry::InterfaceMethodRef { class, nat } => (*class, *nat, true),
            _ => return Err(Self::mismatch(index, "method reference")),
        };
        let (name, desc) = self.name_and_type(nat)?;
        let mut member = MemberRef::new(self.class(class)?, name, desc);
        member.interface = interface;
        Ok(member)
    }

    /// Loadable constant at `index`.
    pub(crate) fn constant(&self, index: u16) -> Result<Constant> {
        Ok(match self.entry(index)? {
            PoolEntry::Int(v) => Constant::Int(*v),
            PoolEntry::Float(bits) => Constant::Float(f32::from_bits(*bits)),
            PoolEntry::Long(v) => Constant::Long(*v),
            PoolEntry::Double(bits) => Constant::Double(f64::from_bits(*bits)),
            PoolEntry::String(utf8) => Constant::String(self.utf8(*utf8)?.to_string()),
            PoolEntry::Class(utf8) => Constant::Class(self.utf8(*utf8)?.to_string()),
            other => {
                tracing::debug!("pool entry {} is a {}, not a constant", index, other.kind());
                return Err(Self::mismatch(index, "loadable constant"));
            }
        })
    }
}

/// Interning pool builder used by the encoder.
#[derive(Debug, Default)]
pub(crate) struct PoolWriter {
    entries: Vec<PoolEntry>,
    index: HashMap<PoolEntry, u16>,
}

impl PoolWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, entry: PoolEntry) -> Result<u16> {
        if let Some(&index) = self.index.get(&entry) {
            return Ok(index);
        }
        // `pool_count` is stored as entries + 1 in a u16.
        if self.entries.len() >= usize::from(u16::MAX) - 1 {
            return Err(Error::PoolOverflow);
        }
        self.entries.push(entry.clone());
        let index = self.entries.len() as u16;
        self.index.insert(entry, index);
        Ok(index)
    }

    pub(crate) fn utf8(&mut self, value: &str) -> Result<u16> {
        if value.len() > usize::from(u16::MAX) {
            return Err(Error::StringTooLong(value.len()));
        }
        self.intern(PoolEntry::Utf8(value.to_string()))
    }

    pub(crate) fn class(&mut self, name: &str) -> Result<u16> {
        let utf8 = self.utf8(name)?;
        self.intern(PoolEntry::Class(utf8))
    }

    fn name_and_type(&mut self, name: &str, desc: &str) -> Result<u16> {
        let name = self.utf8(name)?;
        let desc = self.utf8(desc)?;
        self.intern(PoolEntry::NameAndType { name, desc })
    }

    pub(crate) fn field(&mut self, member: &MemberRef) -> Result<u16> {
        let class = self.class(&member.owner)?;
        let nat = self.name_and_type(&member.name, &member.desc)?;
        self.intern(PoolEntry::FieldRef { class, nat })
    }

    pub(crate) fn method(&mut self, member: &MemberRef) -> Result<u16> {
        let class = self.class(&member.owner)?;
        let nat = self.name_and_type(&member.name, &member.desc)?;
        if member.interface {
            self.intern(PoolEntry::InterfaceMethodRef { class, nat })
        } else {
            self.intern(PoolEntry::MethodRef { class, nat })
        }
    }

    pub(crate) fn constant(&mut self, constant: &Constant) -> Result<u16> {
        match constant {
            Constant::Int(v) => self.intern(PoolEntry::Int(*v)),
            Constant::Float(v) => self.intern(PoolEntry::Float(v.to_bits())),
            Constant::Long(v) => self.intern(PoolEntry::Long(*v)),
            Constant::Double(v) => self.intern(PoolEntry::Double(v.to_bits())),
            Constant::String(v) => {
                let utf8 = self.utf8(v)?;
                self.intern(PoolEntry::String(utf8))
            }
            Constant::Class(v) => self.class(v),
        }
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.entries.len() as u16 + 1).to_be_bytes());
        for entry in &self.entries {
            match entry {
                PoolEntry::Utf8(value) => {
                    out.push(TAG_UTF8);
                    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
                    out.extend_from_slice(value.as_bytes());
                }
                PoolEntry::Int(v) => {
                    out.push(TAG_INT);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolEntry::Float(bits) => {
                    out.push(TAG_FLOAT);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                PoolEntry::Long(v) => {
                    out.push(TAG_LONG);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                PoolEntry::Double(bits) => {
                    out.push(TAG_DOUBLE);
                    out.extend_from_slice(&bits.to_be_bytes());
                }
                PoolEntry::Class(utf8) | PoolEntry::String(utf8) => {
                    out.push(if matches!(entry, PoolEntry::Class(_)) {
                        TAG_CLASS
                    } else {
                        TAG_STRING
                    });
                    out.extend_from_slice(&utf8.to_be_bytes());
                }
                PoolEntry::FieldRef { class, nat }
                | PoolEntry::MethodRef { class, nat }
                | PoolEntry::InterfaceMethodRef { class, nat } => {
                    out.push(match entry {
                        PoolEntry::FieldRef { .. } => TAG_FIELD_REF,
                        PoolEntry::MethodRef { .. } => TAG_METHOD_REF,
                        _ => TAG_INTERFACE_METHOD_REF,
                    });
                    out.extend_from_slice(&class.to_be_bytes());
                    out.extend_from_slice(&nat.to_be_bytes());
                }
                PoolEntry::NameAndType { name, desc } => {
                    out.push(TAG_NAME_AND_TYPE);
                    out.extend_from_slice(&name.to_be_bytes());
                    out.extend_from_slice(&desc.to_be_bytes());
                }
            }
        }
    }
}
