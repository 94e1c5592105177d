//! Coded indexes.
//!
//! A coded index stores a row number shifted left by enough tag bits to say which of a fixed
//! set of tables it refers to. The column is 2 bytes wide unless the largest referenced table
//! has too many rows to leave room for the tag, then 4.

use strum::{EnumCount, EnumIter};

use crate::metadata::tables::TableId;

/// The coded index kinds of ECMA-335 II.24.2.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
pub enum CodedIndexType {
    /// `TypeDef`, `TypeRef`, `TypeSpec`
    TypeDefOrRef,
    /// `Field`, `Param`, `Property`
    HasConstant,
    /// Everything that can carry a custom attribute
    HasCustomAttribute,
    /// `Field`, `Param`
    HasFieldMarshal,
    /// `TypeDef`, `MethodDef`, `Assembly`
    HasDeclSecurity,
    /// `TypeDef`, `TypeRef`, `ModuleRef`, `MethodDef`, `TypeSpec`
    MemberRefParent,
    /// `Event`, `Property`
    HasSemantics,
    /// `MethodDef`, `MemberRef`
    MethodDefOrRef,
    /// `Field`, `MethodDef`
    MemberForwarded,
    /// `File`, `AssemblyRef`, `ExportedType`
    Implementation,
    /// Tags 2 and 3 only: `MethodDef`, `MemberRef`
    CustomAttributeType,
    /// `Module`, `ModuleRef`, `AssemblyRef`, `TypeRef`
    ResolutionScope,
    /// `TypeDef`, `MethodDef`
    TypeOrMethodDef,
}

impl CodedIndexType {
    /// Tables by tag value; `None` marks tags that are reserved.
    #[must_use]
    pub fn tables(self) -> &'static [Option<TableId>] {
        use TableId as T;

        match self {
            Self::TypeDefOrRef => &[Some(T::TypeDef), Some(T::TypeRef), Some(T::TypeSpec)],
            Self::HasConstant => &[Some(T::Field), Some(T::Param), Some(T::Property)],
            Self::HasCustomAttribute => &[
                Some(T::MethodDef),
                Some(T::Field),
                Some(T::TypeRef),
                Some(T::TypeDef),
                Some(T::Param),
                Some(T::InterfaceImpl),
                Some(T::MemberRef),
                Some(T::Module),
                Some(T::DeclSecurity),
                Some(T::Property),
                Some(T::Event),
                Some(T::StandAloneSig),
                Some(T::ModuleRef),
                Some(T::TypeSpec),
                Some(T::Assembly),
                Some(T::AssemblyRef),
                Some(T::File),
                Some(T::ExportedType),
                Some(T::ManifestResource),
                Some(T::GenericParam),
                Some(T::GenericParamConstraint),
                Some(T::MethodSpec),
            ],
            Self::HasFieldMarshal => &[Some(T::Field), Some(T::Param)],
            Self::HasDeclSecurity => &[Some(T::TypeDef), Some(T::MethodDef), Some(T::Assembly)],
            Self::MemberRefParent => &[
                Some(T::TypeDef),
                Some(T::TypeRef),
                Some(T::ModuleRef),
                Some(T::MethodDef),
                Some(T::TypeSpec),
            ],
            Self::HasSemantics => &[Some(T::Event), Some(T::Property)],
            Self::MethodDefOrRef => &[Some(T::MethodDef), Some(T::MemberRef)],
            Self::MemberForwarded => &[Some(T::Field), Some(T::MethodDef)],
            Self::Implementation => &[Some(T::File), Some(T::AssemblyRef), Some(T::ExportedType)],
            Self::CustomAttributeType => &[None, None, Some(T::MethodDef), Some(T::MemberRef), None],
            Self::ResolutionScope => &[
                Some(T::Module),
                Some(T::ModuleRef),
                Some(T::AssemblyRef),
                Some(T::TypeRef),
            ],
            Self::TypeOrMethodDef => &[Some(T::TypeDef), Some(T::MethodDef)],
        }
    }

    /// Number of low bits holding the tag.
    #[must_use]
    pub fn tag_bits(self) -> u32 {
        let count = self.tables().len() as u32;
        u32::BITS - (count - 1).leading_zeros()
    }

    /// Splits a stored value into table and row, `None` for reserved tags.
    #[must_use]
    pub fn decode(self, value: u32) -> Option<CodedIndex> {
        let bits = self.tag_bits();
        let tag = (value & ((1 << bits) - 1)) as usize;
        let table = (*self.tables().get(tag)?)?;
        Some(CodedIndex {
            table,
            row: value >> bits,
        })
    }
}

/// A decoded coded index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedIndex {
    /// Referenced table
    pub table: TableId,
    /// 1-based row, 0 for a null reference
    pub row: u32,
}

impl CodedIndex {
    /// Metadata token of the referenced row.
    #[must_use]
    pub fn token(&self) -> u32 {
        self.table.token(self.row)
    }
}
