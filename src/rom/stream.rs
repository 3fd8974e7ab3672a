//! Byte stream primitives: bounded copy and fill, plus length probing.
//!
//! Everything here moves data through a caller-supplied staging buffer, so a
//! single small allocation serves arbitrarily large counts.

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use log::debug;

use super::error::BuildError;

/// A stream paired with the name used to report errors against it.
pub struct Named<'a, S> {
    pub stream: S,
    pub name: &'a str,
}

impl<'a, S> Named<'a, S> {
    pub fn new(stream: S, name: &'a str) -> Self {
        Self { stream, name }
    }

    fn io_err(&self, e: std::io::Error) -> BuildError {
        BuildError::io(self.name, e)
    }
}

/// Append exactly `count` bytes of `value` to `dest`.
pub fn fill<W: Write>(
    dest: &mut Named<'_, W>,
    buf: &mut [u8],
    value: u8,
    count: u64,
) -> Result<(), BuildError> {
    assert!(!buf.is_empty(), "staging buffer must not be empty");
    let prefix = chunk_len(buf, count);
    buf[..prefix].fill(value);

    let mut remaining = count;
    while remaining > 0 {
        let n = chunk_len(buf, remaining);
        dest.stream
            .write_all(&buf[..n])
            .map_err(|e| dest.io_err(e))?;
        remaining -= n as u64;
    }

    debug!("{}: wrote {count} bytes of {value:#04x}", dest.name);
    Ok(())
}

/// Copy exactly `count` bytes from `source` to `dest`.
///
/// Short reads are fine as long as data keeps coming; a read of zero bytes
/// before `count` is reached is reported as [`BuildError::PrematureEnd`].
pub fn copy<R: Read, W: Write>(
    source: &mut Named<'_, R>,
    dest: &mut Named<'_, W>,
    buf: &mut [u8],
    count: u64,
) -> Result<(), BuildError> {
    assert!(!buf.is_empty(), "staging buffer must not be empty");
    let mut copied = 0u64;

    while copied < count {
        let want = chunk_len(buf, count - copied);
        let got = match source.stream.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(BuildError::PrematureEnd {
                    name: source.name.to_owned(),
                    expected: count,
                    copied,
                })
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(source.io_err(e)),
        };

        dest.stream
            .write_all(&buf[..got])
            .map_err(|e| dest.io_err(e))?;
        copied += got as u64;
    }

    debug!("{} -> {}: copied {count} bytes", source.name, dest.name);
    Ok(())
}

/// Length of `source` in bytes. The current position is left untouched.
pub fn stream_size<S: Seek>(source: &mut Named<'_, S>) -> Result<u64, BuildError> {
    let pos = source
        .stream
        .stream_position()
        .map_err(|e| source.io_err(e))?;
    let end = source
        .stream
        .seek(SeekFrom::End(0))
        .map_err(|e| source.io_err(e))?;
    source
        .stream
        .seek(SeekFrom::Start(pos))
        .map_err(|e| BuildError::PositionLost {
            name: source.name.to_owned(),
            source: e,
        })?;

    debug!("{}: {end} bytes", source.name);
    Ok(end)
}

/// Fail with [`BuildError::Oversize`] when `actual` exceeds `max`.
pub fn validate_max(actual: u64, max: u64, name: &str) -> Result<(), BuildError> {
    if actual > max {
        return Err(BuildError::Oversize {
            name: name.to_owned(),
            excess: actual - max,
            limit: max,
        });
    }
    Ok(())
}

fn chunk_len(buf: &[u8], remaining: u64) -> usize {
    remaining.min(buf.len() as u64) as usize
}
