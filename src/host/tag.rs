use std::fmt;

use serde::{Deserialize, Serialize};

/// The three analyzer families the host knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalyzerKind {
    Protocol,
    File,
    Packet,
}

impl AnalyzerKind {
    pub const ALL: [AnalyzerKind; 3] = [AnalyzerKind::Protocol, AnalyzerKind::File, AnalyzerKind::Packet];
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerKind::Protocol => write!(f, "protocol"),
            AnalyzerKind::File => write!(f, "file"),
            AnalyzerKind::Packet => write!(f, "packet"),
        }
    }
}

macro_rules! analyzer_tag {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            pub fn new(type_id: u32) -> Self {
                Self(type_id)
            }

            /// Host-assigned numeric type. Zero is never handed out for a
            /// real analyzer.
            pub fn type_id(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

analyzer_tag!(
    /// Handle of a protocol analyzer type.
    ProtocolTag
);
analyzer_tag!(
    /// Handle of a file analyzer type.
    FileTag
);
analyzer_tag!(
    /// Handle of a packet analyzer type.
    PacketTag
);

/// A tag of any kind, dispatched once where an untyped host value comes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalyzerTag {
    Protocol(ProtocolTag),
    File(FileTag),
    Packet(PacketTag),
}

impl AnalyzerTag {
    pub fn new(kind: AnalyzerKind, type_id: u32) -> Self {
        match kind {
            AnalyzerKind::Protocol => AnalyzerTag::Protocol(ProtocolTag::new(type_id)),
            AnalyzerKind::File => AnalyzerTag::File(FileTag::new(type_id)),
            AnalyzerKind::Packet => AnalyzerTag::Packet(PacketTag::new(type_id)),
        }
    }

    pub fn kind(&self) -> AnalyzerKind {
        match self {
            AnalyzerTag::Protocol(_) => AnalyzerKind::Protocol,
            AnalyzerTag::File(_) => AnalyzerKind::File,
            AnalyzerTag::Packet(_) => AnalyzerKind::Packet,
        }
    }

    pub fn type_id(&self) -> u32 {
        match self {
            AnalyzerTag::Protocol(t) => t.type_id(),
            AnalyzerTag::File(t) => t.type_id(),
            AnalyzerTag::Packet(t) => t.type_id(),
        }
    }
}

impl From<ProtocolTag> for AnalyzerTag {
    fn from(tag: ProtocolTag) -> Self {
        AnalyzerTag::Protocol(tag)
    }
}

impl From<FileTag> for AnalyzerTag {
    fn from(tag: FileTag) -> Self {
        AnalyzerTag::File(tag)
    }
}

impl From<PacketTag> for AnalyzerTag {
    fn from(tag: PacketTag) -> Self {
        AnalyzerTag::Packet(tag)
    }
}

/// A script-level enum value as the host passes it around: the name of its
/// enum type plus the numeric value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumVal {
    pub type_name: String,
    pub value: u32,
}

impl EnumVal {
    pub fn new(type_name: impl Into<String>, value: u32) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_kind_roundtrip() {
        for kind in AnalyzerKind::ALL {
            let tag = AnalyzerTag::new(kind, 7);
            assert_eq!(tag.kind(), kind);
            assert_eq!(tag.type_id(), 7);
        }
    }

    #[test]
    fn test_tag_conversion() {
        let tag: AnalyzerTag = FileTag::new(3).into();
        assert_eq!(tag, AnalyzerTag::File(FileTag::new(3)));
        assert_eq!(ProtocolTag::new(12).to_string(), "12");
    }
}
