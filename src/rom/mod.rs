// ROM image construction
mod error;
mod format;
mod stream;

use std::io::{Read, Seek, SeekFrom, Write};

use log::info;

pub use error::BuildError;
pub use format::Format;
pub use stream::Named;

use format::{Layout, Patch};

/// Size of the staging buffer each builder carries.
pub const STAGING_SIZE: usize = 16 * 1024;

/// What a successful build produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub target_size: u64,
    pub leading_zeros: u64,
    /// Bytes copied from the source.
    pub source_size: u64,
    /// Zero bytes appended after the source.
    pub padding: u64,
}

/// Builds images through its own staging buffer.
///
/// A builder holds no state between builds; concurrent builds just need one
/// builder each.
pub struct ImageBuilder {
    buf: Vec<u8>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            buf: vec![0; STAGING_SIZE],
        }
    }

    /// Write `source` into `dest` laid out as `format`.
    ///
    /// On error the destination holds a partial image and must be discarded.
    pub fn build<R, W>(
        &mut self,
        format: Format,
        source: &mut Named<'_, R>,
        dest: &mut Named<'_, W>,
    ) -> Result<BuildReport, BuildError>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        let layout = format.layout();
        info!(
            "building {} image: {} -> {} ({} bytes)",
            format.name(),
            source.name,
            dest.name,
            layout.target_size
        );

        let report = match format {
            Format::Pad { target_size } => self.pad(source, dest, target_size)?,
            Format::Pak3 => self.pak3(source, dest, &layout)?,
            Format::Stc => self.stc(source, dest, &layout)?,
        };

        debug_assert_eq!(
            report.leading_zeros + report.source_size + report.padding,
            report.target_size
        );
        info!(
            "{}: {} bytes copied, {} bytes free",
            dest.name, report.source_size, report.padding
        );
        Ok(report)
    }

    /// Copy the whole source, then zero-fill up to `target_size`.
    fn pad<R: Read + Seek, W: Write>(
        &mut self,
        source: &mut Named<'_, R>,
        dest: &mut Named<'_, W>,
        target_size: u64,
    ) -> Result<BuildReport, BuildError> {
        let source_size = stream::stream_size(source)?;
        stream::validate_max(source_size, target_size, source.name)?;

        stream::copy(source, dest, &mut self.buf, source_size)?;
        let padding = target_size - source_size;
        stream::fill(dest, &mut self.buf, 0, padding)?;

        Ok(BuildReport {
            target_size,
            leading_zeros: 0,
            source_size,
            padding,
        })
    }

    fn pak3<R: Read + Seek, W: Write + Seek>(
        &mut self,
        source: &mut Named<'_, R>,
        dest: &mut Named<'_, W>,
        layout: &Layout,
    ) -> Result<BuildReport, BuildError> {
        // Checked against the half-size bound before padding to the full one.
        let source_size = stream::stream_size(source)?;
        stream::validate_max(source_size, layout.max_source, source.name)?;

        let report = self.pad(source, dest, layout.target_size)?;
        if let Some(patch) = layout.patch {
            apply_patch(dest, &patch)?;
        }
        Ok(report)
    }

    fn stc<R: Read + Seek, W: Write>(
        &mut self,
        source: &mut Named<'_, R>,
        dest: &mut Named<'_, W>,
        layout: &Layout,
    ) -> Result<BuildReport, BuildError> {
        let source_size = stream::stream_size(source)?;
        stream::validate_max(source_size, layout.max_source, source.name)?;

        stream::fill(dest, &mut self.buf, 0, layout.leading_zeros)?;
        stream::copy(source, dest, &mut self.buf, source_size)?;
        let padding = layout.target_size - layout.leading_zeros - source_size;
        stream::fill(dest, &mut self.buf, 0, padding)?;

        Ok(BuildReport {
            target_size: layout.target_size,
            leading_zeros: layout.leading_zeros,
            source_size,
            padding,
        })
    }
}

fn apply_patch<W: Write + Seek>(dest: &mut Named<'_, W>, patch: &Patch) -> Result<(), BuildError> {
    dest.stream
        .seek(SeekFrom::Start(patch.offset))
        .map_err(|e| BuildError::io(dest.name, e))?;
    dest.stream
        .write_all(patch.bytes)
        .map_err(|e| BuildError::io(dest.name, e))?;
    log::debug!(
        "{}: patched {} bytes at {:#x}",
        dest.name,
        patch.bytes.len(),
        patch.offset
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::{self, Cursor, ErrorKind};

    /// Image sink that breaks once the patch step starts seeking.
    struct Jammed {
        image: Cursor<Vec<u8>>,
        seek_fails: bool,
        seeked: bool,
    }

    impl Jammed {
        fn new(seek_fails: bool) -> Self {
            Self {
                image: Cursor::new(Vec::new()),
                seek_fails,
                seeked: false,
            }
        }
    }

    impl Write for Jammed {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            if self.seeked {
                return Err(io::Error::new(ErrorKind::Other, "write protected"));
            }
            self.image.write(data)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for Jammed {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            if self.seek_fails {
                return Err(io::Error::new(ErrorKind::Other, "illegal seek"));
            }
            self.seeked = true;
            self.image.seek(pos)
        }
    }

    fn run(format: Format, data: &[u8]) -> Result<(BuildReport, Vec<u8>), BuildError> {
        let mut source = Named::new(Cursor::new(data.to_vec()), "tos.img");
        let mut dest = Named::new(Cursor::new(Vec::new()), "rom.img");
        let report = ImageBuilder::new().build(format, &mut source, &mut dest)?;
        Ok((report, dest.stream.into_inner()))
    }

    #[test]
    fn pad_small_source() {
        let (report, out) = run(Format::Pad { target_size: 1024 }, b"ABC").unwrap();
        assert_eq!(out.len(), 1024);
        assert_eq!(&out[..3], b"ABC");
        assert!(out[3..].iter().all(|&b| b == 0));
        assert_eq!(report.source_size, 3);
        assert_eq!(report.padding, 1021);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(0, 4096)]
    #[case(100, 100)]
    #[case(5000, 40_000)]
    #[case(40_000, 40_001)]
    fn pad_layout_holds(#[case] source_len: usize, #[case] target: u64) {
        let data: Vec<u8> = (0..source_len).map(|i| (i % 251) as u8 + 1).collect();
        let (report, out) = run(Format::Pad { target_size: target }, &data).unwrap();
        assert_eq!(out.len() as u64, target);
        assert_eq!(&out[..source_len], &data[..]);
        assert!(out[source_len..].iter().all(|&b| b == 0));
        assert_eq!(report.padding, target - source_len as u64);
    }

    #[test]
    fn pad_oversize_reports_overage() {
        let err = run(Format::Pad { target_size: 16 }, &[1u8; 21]).unwrap_err();
        assert!(matches!(err, BuildError::Oversize { excess: 5, limit: 16, .. }));
    }

    #[test]
    fn pad_oversize_writes_nothing() {
        let mut source = Named::new(Cursor::new(vec![1u8; 21]), "tos.img");
        let mut dest = Named::new(Cursor::new(Vec::new()), "rom.img");
        ImageBuilder::new()
            .build(Format::Pad { target_size: 16 }, &mut source, &mut dest)
            .unwrap_err();
        assert!(dest.stream.get_ref().is_empty());
    }

    #[test]
    fn pak3_full_source_gets_jump() {
        let data = vec![0xFFu8; 256 * 1024];
        let (report, out) = run(Format::Pak3, &data).unwrap();
        assert_eq!(out.len(), 512 * 1024);
        assert_eq!(&out[..256 * 1024], &data[..]);
        assert_eq!(&out[0x40030..0x40036], &[0x4E, 0xF9, 0x00, 0xE0, 0x00, 0x00]);
        assert!(out[0x40036..].iter().all(|&b| b == 0));
        assert!(out[0x40000..0x40030].iter().all(|&b| b == 0));
        assert_eq!(report.padding, 256 * 1024);
    }

    #[test]
    fn pak3_small_source() {
        let (report, out) = run(Format::Pak3, b"\x60\x2e").unwrap();
        assert_eq!(out.len(), 512 * 1024);
        assert_eq!(&out[..2], b"\x60\x2e");
        assert_eq!(&out[0x40030..0x40036], &format::PAK3_JMP);
        assert_eq!(report.source_size, 2);
    }

    #[test]
    fn pak3_checks_half_size_bound() {
        let err = run(Format::Pak3, &vec![0u8; 256 * 1024 + 10]).unwrap_err();
        assert!(matches!(err, BuildError::Oversize { excess: 10, limit: 262_144, .. }));
    }

    #[test]
    fn stc_layout() {
        let data = b"EMUTOS";
        let (report, out) = run(Format::Stc, data).unwrap();
        assert_eq!(out.len(), 128 * 1024);
        assert_eq!(&out[..4], &[0, 0, 0, 0]);
        assert_eq!(&out[4..10], data);
        assert!(out[10..].iter().all(|&b| b == 0));
        assert_eq!(report.leading_zeros, 4);
        assert_eq!(report.padding, 128 * 1024 - 4 - 6);
    }

    #[test]
    fn stc_largest_payload_fills_cartridge() {
        let data = vec![0x11u8; 128 * 1024 - 4];
        let (report, out) = run(Format::Stc, &data).unwrap();
        assert_eq!(out.len(), 128 * 1024);
        assert_eq!(report.padding, 0);
    }

    #[test]
    fn stc_rejects_full_size_source() {
        let err = run(Format::Stc, &vec![0u8; 128 * 1024]).unwrap_err();
        assert!(matches!(err, BuildError::Oversize { excess: 4, .. }));
    }

    #[test]
    fn builds_are_repeatable() {
        let data: Vec<u8> = (0..3000u32).map(|i| (i * 7) as u8).collect();
        for format in [Format::Pad { target_size: 8192 }, Format::Pak3, Format::Stc] {
            let (_, first) = run(format, &data).unwrap();
            let (_, second) = run(format, &data).unwrap();
            assert_eq!(first, second, "{} differs between runs", format.name());
        }
    }

    #[test]
    fn one_builder_serves_many_builds() {
        let mut builder = ImageBuilder::new();
        let mut dest = Named::new(Cursor::new(Vec::new()), "a");
        let mut source = Named::new(Cursor::new(vec![9u8; 20_000]), "big");
        builder
            .build(Format::Pad { target_size: 20_000 }, &mut source, &mut dest)
            .unwrap();

        let mut dest = Named::new(Cursor::new(Vec::new()), "b");
        let mut source = Named::new(Cursor::new(vec![1u8; 3]), "small");
        builder
            .build(Format::Pad { target_size: 8 }, &mut source, &mut dest)
            .unwrap();
        assert_eq!(dest.stream.into_inner(), vec![1, 1, 1, 0, 0, 0, 0, 0]);
    }

    #[rstest]
    #[case::seek(true, "illegal seek")]
    #[case::write(false, "write protected")]
    fn pak3_patch_failure_is_io_error(#[case] seek_fails: bool, #[case] cause: &str) {
        let mut source = Named::new(Cursor::new(vec![0x42u8; 64]), "tos.img");
        let mut dest = Named::new(Jammed::new(seek_fails), "pak3.img");
        let err = ImageBuilder::new()
            .build(Format::Pak3, &mut source, &mut dest)
            .unwrap_err();
        match err {
            BuildError::Io { name, source } => {
                assert_eq!(name, "pak3.img");
                assert_eq!(source.to_string(), cause);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Padding was complete before the patch step failed.
        assert_eq!(dest.stream.image.get_ref().len(), 512 * 1024);
    }
}
