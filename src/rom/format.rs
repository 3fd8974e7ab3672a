// Output formats and their fixed layouts.

/// PAK/3 accepts at most a 256 KiB system image.
pub const PAK3_MAX_SOURCE: u64 = 256 * 1024;
/// Size of a finished PAK/3 ROM, twice the largest accepted source.
pub const PAK3_TARGET_SIZE: u64 = 512 * 1024;
pub const PAK3_PATCH_OFFSET: u64 = 0x40030;
/// `JMP $00E00000.L`
pub const PAK3_JMP: [u8; 6] = [0x4E, 0xF9, 0x00, 0xE0, 0x00, 0x00];

/// Steem Engine cartridge size, marker included.
pub const STC_TARGET_SIZE: u64 = 128 * 1024;
pub const STC_MARKER_LEN: u64 = 4;

// The patch is written over padding that must already exist.
const _: () = assert!(PAK3_PATCH_OFFSET + PAK3_JMP.len() as u64 <= PAK3_TARGET_SIZE);
const _: () = assert!(PAK3_MAX_SOURCE <= PAK3_TARGET_SIZE);
const _: () = assert!(STC_MARKER_LEN <= STC_TARGET_SIZE);

/// Bytes overwritten at a fixed offset once the image is fully written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    pub offset: u64,
    pub bytes: &'static [u8],
}

/// Fixed byte layout of one output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub target_size: u64,
    pub max_source: u64,
    /// Zero bytes written before the payload.
    pub leading_zeros: u64,
    pub patch: Option<Patch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Zero padding up to an arbitrary size.
    Pad { target_size: u64 },
    /// PAK/3 512 KiB image with a jump patched into the upper half.
    Pak3,
    /// Steem Engine cartridge image.
    Stc,
}

impl Format {
    pub fn layout(&self) -> Layout {
        match *self {
            Format::Pad { target_size } => Layout {
                target_size,
                max_source: target_size,
                leading_zeros: 0,
                patch: None,
            },
            Format::Pak3 => Layout {
                target_size: PAK3_TARGET_SIZE,
                max_source: PAK3_MAX_SOURCE,
                leading_zeros: 0,
                patch: Some(Patch {
                    offset: PAK3_PATCH_OFFSET,
                    bytes: &PAK3_JMP,
                }),
            },
            Format::Stc => Layout {
                target_size: STC_TARGET_SIZE,
                max_source: STC_TARGET_SIZE - STC_MARKER_LEN,
                leading_zeros: STC_MARKER_LEN,
                patch: None,
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Pad { .. } => "pad",
            Format::Pak3 => "pak3",
            Format::Stc => "stc",
        }
    }
}
