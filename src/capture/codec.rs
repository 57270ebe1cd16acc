//! Length prefixed framing of capture messages.
//!
//! Every message is written as a 4 byte little-endian length followed by
//! that many bytes of the encoded message. Nothing marks the end of a
//! stream; a length prefix that cannot be read is the end.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use prost::Message;

use crate::error::CaptureError;

/// Writes one framed message.
pub fn write_message<M: Message, W: Write>(
    message: &M,
    writer: &mut W,
) -> Result<(), CaptureError> {
    let encoded = message.encode_to_vec();
    let message_size = u32::try_from(encoded.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("message of {} bytes does not fit a frame", encoded.len()),
        )
    })?;

    writer.write_u32::<LittleEndian>(message_size)?;
    writer.write_all(&encoded)?;
    Ok(())
}

/// Reads one framed message.
///
/// Returns `Ok(None)` when the length prefix cannot be read, which is how the
/// end of the stream shows. A frame shorter than its prefix, or a payload
/// that is not a valid encoding of `M`, is an error.
pub fn read_message<M: Message + Default, R: Read>(
    reader: &mut R,
) -> Result<Option<M>, CaptureError> {
    let message_size = match reader.read_u32::<LittleEndian>() {
        Ok(message_size) => message_size,
        Err(_) => return Ok(None),
    };

    // The prefix is untrusted; grow the buffer with the data actually read.
    let mut buffer = Vec::new();
    reader
        .by_ref()
        .take(u64::from(message_size))
        .read_to_end(&mut buffer)?;
    if buffer.len() != message_size as usize {
        return Err(CaptureError::Stream(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "frame announced {} bytes, stream ended after {}",
                message_size,
                buffer.len()
            ),
        )));
    }
    Ok(Some(M::decode(buffer.as_slice())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capturepb::{CaptureHeader, TimerInfo};
    use std::io::Cursor;

    #[test]
    fn test_frame_layout() {
        let header = CaptureHeader {
            version: "1.0".to_string(),
        };
        let mut buf = vec![];
        write_message(&header, &mut buf).unwrap();

        let encoded = header.encode_to_vec();
        assert_eq!(&(encoded.len() as u32).to_le_bytes(), &buf[..4]);
        assert_eq!(encoded, buf[4..]);
    }

    #[test]
    fn test_end_of_stream() {
        let mut empty = Cursor::new(vec![]);
        assert!(read_message::<TimerInfo, _>(&mut empty).unwrap().is_none());

        // A partial length prefix is the end of the stream too.
        let mut partial = Cursor::new(vec![3u8, 0]);
        assert!(read_message::<TimerInfo, _>(&mut partial).unwrap().is_none());
    }

    #[test]
    fn test_short_frame_is_error() {
        let timer = TimerInfo {
            start: 10,
            end: 20,
            ..Default::default()
        };
        let mut buf = vec![];
        write_message(&timer, &mut buf).unwrap();
        buf.pop();

        let mut reader = Cursor::new(buf);
        assert!(matches!(
            read_message::<TimerInfo, _>(&mut reader),
            Err(CaptureError::Stream(_))
        ));
    }

    #[test]
    fn test_oversized_prefix_is_error() {
        let mut buf = u32::MAX.to_le_bytes().to_vec();
        buf.extend_from_slice(&[0x08, 0x01]);

        let mut reader = Cursor::new(buf);
        match read_message::<TimerInfo, _>(&mut reader) {
            Err(CaptureError::Stream(e)) => {
                assert_eq!(std::io::ErrorKind::UnexpectedEof, e.kind())
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_payload_is_error() {
        // Field 1, wire type 7 does not exist.
        let mut buf = vec![];
        buf.write_u32::<LittleEndian>(2).unwrap();
        buf.extend_from_slice(&[0x0f, 0x00]);

        let mut reader = Cursor::new(buf);
        assert!(matches!(
            read_message::<TimerInfo, _>(&mut reader),
            Err(CaptureError::Decode(_))
        ));
    }

    #[test]
    fn test_empty_message_decodes_to_default() {
        let mut reader = Cursor::new(0u32.to_le_bytes().to_vec());
        let timer: TimerInfo = read_message(&mut reader).unwrap().unwrap();
        assert_eq!(TimerInfo::default(), timer);
    }
}
