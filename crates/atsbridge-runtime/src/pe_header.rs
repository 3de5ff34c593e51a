//! Binary-format gate for legacy modules.
//!
//! Only 32-bit x86 Windows images can implement the legacy ABI.  The check
//! reads three fields: the `MZ` signature, the `PE\0\0` signature at the
//! offset stored at `0x3C`, and the COFF machine type, which must be
//! `IMAGE_FILE_MACHINE_I386`.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const MZ_SIGNATURE: u16 = 0x5A4D;
const PE_OFFSET_POINTER: u64 = 0x3C;
const PE_SIGNATURE: u32 = 0x0000_4550;
const MACHINE_I386: u16 = 0x014C;

/// `true` when `path` is a 32-bit x86 PE image.  Unreadable or truncated
/// files are not.
pub fn is_i386_pe(path: &Path) -> bool {
    File::open(path)
        .and_then(|f| check(BufReader::new(f)))
        .unwrap_or(false)
}

fn check<R: Read + Seek>(mut reader: R) -> io::Result<bool> {
    if read_u16(&mut reader)? != MZ_SIGNATURE {
        return Ok(false);
    }
    reader.seek(SeekFrom::Start(PE_OFFSET_POINTER))?;
    let pe_offset = read_u32(&mut reader)?;
    reader.seek(SeekFrom::Start(u64::from(pe_offset)))?;
    if read_u32(&mut reader)? != PE_SIGNATURE {
        return Ok(false);
    }
    Ok(read_u16(&mut reader)? == MACHINE_I386)
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Minimal header bytes for tests: MZ stub, PE signature at 0x80 and the
/// given machine type.
#[cfg(test)]
pub(crate) fn fake_image(machine: u16) -> Vec<u8> {
    let mut bytes = vec![0u8; 0x100];
    bytes[0..2].copy_from_slice(&MZ_SIGNATURE.to_le_bytes());
    bytes[0x3C..0x40].copy_from_slice(&0x80u32.to_le_bytes());
    bytes[0x80..0x84].copy_from_slice(&PE_SIGNATURE.to_le_bytes());
    bytes[0x84..0x86].copy_from_slice(&machine.to_le_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn accepts_i386_image() {
        assert!(check(Cursor::new(fake_image(MACHINE_I386))).unwrap());
    }

    #[test]
    fn rejects_amd64_image() {
        assert!(!check(Cursor::new(fake_image(0x8664))).unwrap());
    }

    #[test]
    fn rejects_missing_mz() {
        let mut bytes = fake_image(MACHINE_I386);
        bytes[0] = b'X';
        assert!(!check(Cursor::new(bytes)).unwrap());
    }

    #[test]
    fn rejects_missing_pe_signature() {
        let mut bytes = fake_image(MACHINE_I386);
        bytes[0x80] = 0;
        assert!(!check(Cursor::new(bytes)).unwrap());
    }

    #[test]
    fn truncated_and_missing_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let short = dir.path().join("short.dll");
        std::fs::write(&short, b"MZ").unwrap();
        assert!(!is_i386_pe(&short));
        assert!(!is_i386_pe(&dir.path().join("absent.dll")));

        let good = dir.path().join("ats.dll");
        std::fs::write(&good, fake_image(MACHINE_I386)).unwrap();
        assert!(is_i386_pe(&good));
    }
}
