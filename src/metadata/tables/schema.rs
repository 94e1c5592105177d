//! Column layout of every table.
//!
//! Rows have no self-describing length. The byte width of heap indexes comes from the
//! `HeapSizes` flags; the width of table and coded indexes depends on the row counts of the
//! tables they can point to.

use crate::metadata::tables::{CodedIndexType, TableId};

use CodedIndexType as C;
use Column::{Blob, Coded, Fixed, Guid, Index, Str};
use TableId as T;

/// Kind of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Constant of the given width
    Fixed(u8),
    /// `#Strings` index
    Str,
    /// `#GUID` index
    Guid,
    /// `#Blob` index
    Blob,
    /// Simple index into one table
    Index(TableId),
    /// Coded index
    Coded(CodedIndexType),
}

/// Column name as in ECMA-335 II.22 and its kind.
pub type ColumnDef = (&'static str, Column);

/// Columns of `table` in storage order.
#[must_use]
pub fn columns(table: TableId) -> &'static [ColumnDef] {
    match table {
        T::Module => &[
            ("Generation", Fixed(2)),
            ("Name", Str),
            ("Mvid", Guid),
            ("EncId", Guid),
            ("EncBaseId", Guid),
        ],
        T::TypeRef => &[
            ("ResolutionScope", Coded(C::ResolutionScope)),
            ("TypeName", Str),
            ("TypeNamespace", Str),
        ],
        T::TypeDef => &[
            ("Flags", Fixed(4)),
            ("TypeName", Str),
            ("TypeNamespace", Str),
            ("Extends", Coded(C::TypeDefOrRef)),
            ("FieldList", Index(T::Field)),
            ("MethodList", Index(T::MethodDef)),
        ],
        T::FieldPtr => &[("Field", Index(T::Field))],
        T::Field => &[
            ("Flags", Fixed(2)),
            ("Name", Str),
            ("Signature", Blob),
        ],
        T::MethodPtr => &[("Method", Index(T::MethodDef))],
        T::MethodDef => &[
            ("RVA", Fixed(4)),
            ("ImplFlags", Fixed(2)),
            ("Flags", Fixed(2)),
            ("Name", Str),
            ("Signature", Blob),
            ("ParamList", Index(T::Param)),
        ],
        T::ParamPtr => &[("Param", Index(T::Param))],
        T::Param => &[
            ("Flags", Fixed(2)),
            ("Sequence", Fixed(2)),
            ("Name", Str),
        ],
        T::InterfaceImpl => &[
            ("Class", Index(T::TypeDef)),
            ("Interface", Coded(C::TypeDefOrRef)),
        ],
        T::MemberRef => &[
            ("Class", Coded(C::MemberRefParent)),
            ("Name", Str),
            ("Signature", Blob),
        ],
        // one type byte plus one padding byte
        T::Constant => &[
            ("Type", Fixed(2)),
            ("Parent", Coded(C::HasConstant)),
            ("Value", Blob),
        ],
        T::CustomAttribute => &[
            ("Parent", Coded(C::HasCustomAttribute)),
            ("Type", Coded(C::CustomAttributeType)),
            ("Value", Blob),
        ],
        T::FieldMarshal => &[
            ("Parent", Coded(C::HasFieldMarshal)),
            ("NativeType", Blob),
        ],
        T::DeclSecurity => &[
            ("Action", Fixed(2)),
            ("Parent", Coded(C::HasDeclSecurity)),
            ("PermissionSet", Blob),
        ],
        T::ClassLayout => &[
            ("PackingSize", Fixed(2)),
            ("ClassSize", Fixed(4)),
            ("Parent", Index(T::TypeDef)),
        ],
        T::FieldLayout => &[("Offset", Fixed(4)), ("Field", Index(T::Field))],
        T::StandAloneSig => &[("Signature", Blob)],
        T::EventMap => &[
            ("Parent", Index(T::TypeDef)),
            ("EventList", Index(T::Event)),
        ],
        T::EventPtr => &[("Event", Index(T::Event))],
        T::Event => &[
            ("EventFlags", Fixed(2)),
            ("Name", Str),
            ("EventType", Coded(C::TypeDefOrRef)),
        ],
        T::PropertyMap => &[
            ("Parent", Index(T::TypeDef)),
            ("PropertyList", Index(T::Property)),
        ],
        T::PropertyPtr => &[("Property", Index(T::Property))],
        T::Property => &[
            ("Flags", Fixed(2)),
            ("Name", Str),
            ("Type", Blob),
        ],
        T::MethodSemantics => &[
            ("Semantics", Fixed(2)),
            ("Method", Index(T::MethodDef)),
            ("Association", Coded(C::HasSemantics)),
        ],
        T::MethodImpl => &[
            ("Class", Index(T::TypeDef)),
            ("MethodBody", Coded(C::MethodDefOrRef)),
            ("MethodDeclaration", Coded(C::MethodDefOrRef)),
        ],
        T::ModuleRef => &[("Name", Str)],
        T::TypeSpec => &[("Signature", Blob)],
        T::ImplMap => &[
            ("MappingFlags", Fixed(2)),
            ("MemberForwarded", Coded(C::MemberForwarded)),
            ("ImportName", Str),
            ("ImportScope", Index(T::ModuleRef)),
        ],
        T::FieldRva => &[("RVA", Fixed(4)), ("Field", Index(T::Field))],
        T::EncLog => &[("Token", Fixed(4)), ("FuncCode", Fixed(4))],
        T::EncMap => &[("Token", Fixed(4))],
        T::Assembly => &[
            ("HashAlgId", Fixed(4)),
            ("MajorVersion", Fixed(2)),
            ("MinorVersion", Fixed(2)),
            ("BuildNumber", Fixed(2)),
            ("RevisionNumber", Fixed(2)),
            ("Flags", Fixed(4)),
            ("PublicKey", Blob),
            ("Name", Str),
            ("Culture", Str),
        ],
        T::AssemblyProcessor => &[("Processor", Fixed(4))],
        T::AssemblyOs => &[
            ("OSPlatformID", Fixed(4)),
            ("OSMajorVersion", Fixed(4)),
            ("OSMinorVersion", Fixed(4)),
        ],
        T::AssemblyRef => &[
            ("MajorVersion", Fixed(2)),
            ("MinorVersion", Fixed(2)),
            ("BuildNumber", Fixed(2)),
            ("RevisionNumber", Fixed(2)),
            ("Flags", Fixed(4)),
            ("PublicKeyOrToken", Blob),
            ("Name", Str),
            ("Culture", Str),
            ("HashValue", Blob),
        ],
        T::AssemblyRefProcessor => &[
            ("Processor", Fixed(4)),
            ("AssemblyRef", Index(T::AssemblyRef)),
        ],
        T::AssemblyRefOs => &[
            ("OSPlatformId", Fixed(4)),
            ("OSMajorVersion", Fixed(4)),
            ("OSMinorVersion", Fixed(4)),
            ("AssemblyRef", Index(T::AssemblyRef)),
        ],
        T::File => &[
            ("Flags", Fixed(4)),
            ("Name", Str),
            ("HashValue", Blob),
        ],
        T::ExportedType => &[
            ("Flags", Fixed(4)),
            ("TypeDefId", Fixed(4)),
            ("TypeName", Str),
            ("TypeNamespace", Str),
            ("Implementation", Coded(C::Implementation)),
        ],
        T::ManifestResource => &[
            ("Offset", Fixed(4)),
            ("Flags", Fixed(4)),
            ("Name", Str),
            ("Implementation", Coded(C::Implementation)),
        ],
        T::NestedClass => &[
            ("NestedClass", Index(T::TypeDef)),
            ("EnclosingClass", Index(T::TypeDef)),
        ],
        T::GenericParam => &[
            ("Number", Fixed(2)),
            ("Flags", Fixed(2)),
            ("Owner", Coded(C::TypeOrMethodDef)),
            ("Name", Str),
        ],
        T::MethodSpec => &[
            ("Method", Coded(C::MethodDefOrRef)),
            ("Instantiation", Blob),
        ],
        T::GenericParamConstraint => &[
            ("Owner", Index(T::GenericParam)),
            ("Constraint", Coded(C::TypeDefOrRef)),
        ],
    }
}
