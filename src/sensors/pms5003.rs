/// PMS5003 particulate sensor: serial frame decoding
use log::{debug, warn};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::{LoggerError, LoggerResult};
use crate::models::Particulates;

// PMS5003 protocol constants
const START_BYTES: [u8; 2] = [0x42, 0x4d];
const FRAME_LENGTH: usize = 32; // Start bytes + length field + 13 data words + checksum
const DATA_LENGTH: u16 = 28; // Value of the length field: data words plus checksum
const MAX_SCAN_BYTES: usize = FRAME_LENGTH * 16; // Give up after this much unaligned input
const READ_TIMEOUT: Duration = Duration::from_secs(5);
const IDLE_POLL: Duration = Duration::from_millis(10);

/// Decode one PMS5003 frame into particulate concentrations
///
/// Frame layout (all words big-endian):
/// - Bytes 0-1: Start characters 0x42 0x4D
/// - Bytes 2-3: Frame length (28)
/// - Bytes 4-9: PM1.0 / PM2.5 / PM10 in ug/m3, standard particle (CF=1)
/// - Bytes 10-15: The same under atmospheric environment (not used here)
/// - Bytes 16-29: Particle counts per 0.1 L and reserved word (not used here)
/// - Bytes 30-31: Checksum, the sum of bytes 0-29
///
/// # Returns
/// Some(Particulates) if the frame is well formed, None otherwise
pub fn decode_frame(frame: &[u8]) -> Option<Particulates> {
    if frame.len() != FRAME_LENGTH || frame[..2] != START_BYTES {
        return None;
    }

    let word = |i: usize| u16::from_be_bytes([frame[i], frame[i + 1]]);

    if word(2) != DATA_LENGTH {
        warn!("PMS5003 frame length field {} != {}", word(2), DATA_LENGTH);
        return None;
    }

    let checksum: u16 = frame[..FRAME_LENGTH - 2]
        .iter()
        .fold(0u16, |acc, b| acc.wrapping_add(*b as u16));
    if checksum != word(FRAME_LENGTH - 2) {
        warn!(
            "PMS5003 checksum mismatch: computed {:#06x}, frame says {:#06x}",
            checksum,
            word(FRAME_LENGTH - 2)
        );
        return None;
    }

    Some(Particulates {
        pm1: word(4) as f64,
        pm25: word(6) as f64,
        pm10: word(8) as f64,
    })
}

/// Scan a byte stream for the next valid frame.
///
/// `reader` may return 0 bytes or `WouldBlock` when nothing has arrived yet;
/// scanning then continues until `deadline`.
pub fn read_frame<R: Read>(reader: &mut R, deadline: Instant) -> LoggerResult<Particulates> {
    let mut frame = [0u8; FRAME_LENGTH];
    let mut filled = 0;
    let mut scanned = 0;

    while scanned < MAX_SCAN_BYTES {
        if Instant::now() >= deadline {
            return Err(LoggerError::sensor("pms5003", "timed out waiting for a frame"));
        }

        let n = match reader.read(&mut frame[filled..filled + 1]) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(IDLE_POLL);
                continue;
            }
            Err(e) => return Err(LoggerError::sensor("pms5003", e.to_string())),
        };
        if n == 0 {
            continue;
        }
        scanned += 1;

        // Stay aligned on the start characters
        if filled < START_BYTES.len() && frame[filled] != START_BYTES[filled] {
            filled = usize::from(frame[filled] == START_BYTES[0]);
            if filled == 1 {
                frame[0] = START_BYTES[0];
            }
            continue;
        }
        filled += 1;

        if filled == FRAME_LENGTH {
            if let Some(particulates) = decode_frame(&frame) {
                debug!(
                    "PMS5003: pm1={} pm2.5={} pm10={}",
                    particulates.pm1, particulates.pm25, particulates.pm10
                );
                return Ok(particulates);
            }
            filled = 0;
        }
    }

    Err(LoggerError::sensor(
        "pms5003",
        format!("no valid frame within {} bytes", MAX_SCAN_BYTES),
    ))
}

/// PMS5003 on a serial device.
///
/// The tty must already be configured as raw 9600 baud,
/// e.g. `stty -F /dev/ttyAMA0 9600 raw -echo`. It is opened non-blocking and
/// polled until the read timeout.
pub struct Pms5003 {
    device: PathBuf,
}

impl Pms5003 {
    pub fn new(device: PathBuf) -> Self {
        Pms5003 { device }
    }

    pub fn read(&self) -> LoggerResult<Particulates> {
        let mut port = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&self.device)
            .map_err(|e| {
                LoggerError::sensor("pms5003", format!("{}: {}", self.device.display(), e))
            })?;
        read_frame(&mut port, Instant::now() + READ_TIMEOUT)
    }
}
