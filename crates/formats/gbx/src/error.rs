use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid magic: expected \"GBX\", found {found:?}")]
    InvalidMagic { found: [u8; 3] },

    #[error("unexpected end of data at offset {offset:#x} (need {need} bytes, have {have})")]
    UnexpectedEof {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("unsupported Gbx version {version}")]
    UnsupportedVersion { version: u16 },

    #[error("unsupported Gbx format {format:?} (only binary is supported)")]
    UnsupportedFormat { format: char },

    #[error("unsupported compression flag {flag:?} in {section}")]
    UnsupportedCompression { section: &'static str, flag: char },

    #[error("body is compressed but no body codec was provided")]
    CompressionUnavailable,

    #[error("body codec failed: {message}")]
    Compression { message: String },

    #[error("unknown chunk 0x{id:08X} is not skippable (previous chunk: {})", fmt_previous(.previous))]
    UnknownUnskippableChunk { id: u32, previous: Option<u32> },

    #[error("chunk 0x{id:08X}: expected skip marker, found 0x{found:08X}")]
    MalformedSkipMarker { id: u32, found: u32 },

    #[error("chunk 0x{id:08X} is not skippable and cannot be ignored")]
    IgnoredUnskippableChunk { id: u32 },

    #[error("chunk 0x{id:08X} has no reader (previous chunk: {})", fmt_previous(.previous))]
    ChunkReadUnsupported { id: u32, previous: Option<u32> },

    #[error("chunk 0x{id:08X} has no writer")]
    ChunkWriteUnsupported { id: u32 },

    #[error("chunk 0x{id:08X} declared {declared} bytes but {consumed} were read")]
    ChunkSizeMismatch {
        id: u32,
        declared: usize,
        consumed: usize,
    },

    #[error("class 0x{class_id:08X} cannot be instantiated")]
    ClassNotConstructible { class_id: u32 },

    #[error("class 0x{class_id:08X} does not support writing")]
    ClassWriteNotSupported { class_id: u32 },

    #[error("header user data declares {declared} bytes but its table adds up to {computed}")]
    HeaderSizeMismatch { declared: usize, computed: usize },

    #[error("string at offset {offset:#x} is not valid UTF-8: {source}")]
    InvalidString {
        offset: usize,
        source: std::string::FromUtf8Error,
    },

    #[error("invalid boolean {value} at offset {offset:#x}")]
    InvalidBool { offset: usize, value: u32 },

    #[error("unsupported lookback id version {version}")]
    InvalidIdVersion { version: u32 },

    #[error("lookback id index {index:#x} refers to an unknown string")]
    InvalidIdIndex { index: u32 },

    #[error("invalid node index {index}")]
    InvalidNodeIndex { index: i32 },

    #[error("node index {index} is referenced more than once")]
    SharedNodeRef { index: u32 },

    #[error("nested nodes exceed the maximum depth of {max}")]
    NodeDepthExceeded { max: usize },

    #[error("chunk 0x{chunk_id:08X} expects node data of type {expected}")]
    NodeTypeMismatch {
        chunk_id: u32,
        expected: &'static str,
    },

    #[error("length {len} does not fit in a 32-bit size field")]
    LengthOverflow { len: usize },

    #[error("Gbx has neither a node nor a raw body to write")]
    MissingBody,

    #[error("invalid registry: {message}")]
    InvalidRegistry { message: String },
}

fn fmt_previous(previous: &Option<u32>) -> String {
    match previous {
        Some(id) => format!("0x{id:08X}"),
        None => "none".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
