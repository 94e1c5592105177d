use strum::{Display, EnumCount, EnumIter, FromRepr};

/// Metadata tables of the `#~` stream, numbered as in the presence bit vector.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount, Display, FromRepr,
)]
#[repr(u8)]
pub enum TableId {
    /// 0x00
    Module = 0x00,
    /// 0x01
    TypeRef = 0x01,
    /// 0x02
    TypeDef = 0x02,
    /// 0x03
    FieldPtr = 0x03,
    /// 0x04
    Field = 0x04,
    /// 0x05
    MethodPtr = 0x05,
    /// 0x06
    MethodDef = 0x06,
    /// 0x07
    ParamPtr = 0x07,
    /// 0x08
    Param = 0x08,
    /// 0x09
    InterfaceImpl = 0x09,
    /// 0x0A
    MemberRef = 0x0A,
    /// 0x0B
    Constant = 0x0B,
    /// 0x0C
    CustomAttribute = 0x0C,
    /// 0x0D
    FieldMarshal = 0x0D,
    /// 0x0E
    DeclSecurity = 0x0E,
    /// 0x0F
    ClassLayout = 0x0F,
    /// 0x10
    FieldLayout = 0x10,
    /// 0x11
    StandAloneSig = 0x11,
    /// 0x12
    EventMap = 0x12,
    /// 0x13
    EventPtr = 0x13,
    /// 0x14
    Event = 0x14,
    /// 0x15
    PropertyMap = 0x15,
    /// 0x16
    PropertyPtr = 0x16,
    /// 0x17
    Property = 0x17,
    /// 0x18
    MethodSemantics = 0x18,
    /// 0x19
    MethodImpl = 0x19,
    /// 0x1A
    ModuleRef = 0x1A,
    /// 0x1B
    TypeSpec = 0x1B,
    /// 0x1C
    ImplMap = 0x1C,
    /// 0x1D
    FieldRva = 0x1D,
    /// 0x1E
    EncLog = 0x1E,
    /// 0x1F
    EncMap = 0x1F,
    /// 0x20
    Assembly = 0x20,
    /// 0x21
    AssemblyProcessor = 0x21,
    /// 0x22
    AssemblyOs = 0x22,
    /// 0x23
    AssemblyRef = 0x23,
    /// 0x24
    AssemblyRefProcessor = 0x24,
    /// 0x25
    AssemblyRefOs = 0x25,
    /// 0x26
    File = 0x26,
    /// 0x27
    ExportedType = 0x27,
    /// 0x28
    ManifestResource = 0x28,
    /// 0x29
    NestedClass = 0x29,
    /// 0x2A
    GenericParam = 0x2A,
    /// 0x2B
    MethodSpec = 0x2B,
    /// 0x2C
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// High byte of metadata tokens referring to this table.
    #[must_use]
    pub fn token(self, row: u32) -> u32 {
        (u32::from(self as u8) << 24) | (row & 0x00FF_FFFF)
    }

    /// Bit of this table in the presence vector.
    #[must_use]
    pub fn mask(self) -> u64 {
        1u64 << (self as u8)
    }
}
