//! Framing of outgoing DUCI lines.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::{Error, Result};

/// Bytes reserved in the output buffer beyond the payload: checksum
/// (`:CC`), CR, LF and a trailing NUL slot for C-style transmit drivers.
pub const FRAME_OVERHEAD: usize = 6;

/// Additive checksum of `data`, modulo 100
pub fn checksum(data: &[u8]) -> u8 {
    (data.iter().map(|&b| u32::from(b)).sum::<u32>() % 100) as u8
}

/// Turns a reply or command string into an on-wire line.
///
/// With checksum enabled, `payload` is followed by `:` and two decimal
/// digits, the sum of the payload bytes and the `:` modulo 100.  The line
/// ends with CR LF if CRLF termination is enabled, else LF alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framer {
    pub checksum: bool,
    pub crlf: bool,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl Framer {
    pub const fn new(checksum: bool, crlf: bool) -> Self {
        Self { checksum, crlf }
    }

    /// Frame `payload` into `buf`, returning the number of bytes written.
    ///
    /// Fails with [`Error::BufferTooSmall`] unless `payload` is shorter
    /// than `buf.len() - FRAME_OVERHEAD`.
    pub fn frame(&self, payload: &str, buf: &mut [u8]) -> Result<usize> {
        let data = payload.as_bytes();
        if data.len() >= buf.len().saturating_sub(FRAME_OVERHEAD) {
            warn!(
                "Frame of {} bytes too large for {} byte buffer",
                data.len(),
                buf.len()
            );
            return Err(Error::BufferTooSmall);
        }

        let mut size = data.len();
        buf[..size].copy_from_slice(data);

        if self.checksum {
            let sum = (u32::from(checksum(data)) + u32::from(b':')) % 100;
            buf[size] = b':';
            buf[size + 1] = b'0' + (sum / 10) as u8;
            buf[size + 2] = b'0' + (sum % 10) as u8;
            size += 3;
        }

        if self.crlf {
            buf[size] = b'\r';
            size += 1;
        }
        buf[size] = b'\n';
        size += 1;

        trace!("Framed {size} bytes");
        Ok(size)
    }

    /// Frame `payload` into a new fixed capacity buffer of `N` bytes
    pub fn frame_vec<const N: usize>(&self, payload: &str) -> Result<heapless::Vec<u8, N>> {
        let mut buf = [0u8; N];
        let size = self.frame(payload, &mut buf)?;
        heapless::Vec::from_slice(&buf[..size]).map_err(|_| Error::BufferTooSmall)
    }
}
