use std::io::{self, prelude::*};

/// Compute the log-base-two of the next power of two: 8 -> 3, 9 -> 4.
///
pub fn ceil_log2(x: usize) -> usize {
    let mut n = 0;
    while 1 << n < x {
        n += 1
    }
    n
}

/// Isolate the lowest set bit: 12 -> 4, 7 -> 1. Returns zero for zero.
///
pub fn lowest_bit(x: usize) -> usize {
    x & x.wrapping_neg()
}

/// Read a usize out of the given stream.
///
pub fn read_usize<R: Read>(stream: &mut R) -> io::Result<usize> {
    let mut buffer = [0; std::mem::size_of::<usize>()];
    stream.read_exact(&mut buffer)?;
    Ok(usize::from_le_bytes(buffer))
}

/// Read the given number of bytes from a stream, into a vec.
///
pub fn read_bytes_vec<R: Read>(stream: &mut R, size: usize) -> io::Result<Vec<u8>> {
    let mut buffer = vec![0; size];
    stream.read_exact(&mut buffer)?;
    Ok(buffer)
}

/// Write a length-prefixed frame to the given stream.
///
pub fn write_frame<W: Write>(stream: &mut W, bytes: &[u8]) -> io::Result<()> {
    stream.write_all(&bytes.len().to_le_bytes())?;
    stream.write_all(bytes)?;
    stream.flush()
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn ceil_log2_rounds_up() {
        assert_eq!(ceil_log2(1), 0);
        assert_eq!(ceil_log2(2), 1);
        assert_eq!(ceil_log2(8), 3);
        assert_eq!(ceil_log2(9), 4);
    }

    #[test]
    fn lowest_bit_isolates_one_bit() {
        assert_eq!(lowest_bit(12), 4);
        assert_eq!(lowest_bit(7), 1);
        assert_eq!(lowest_bit(0), 0);
    }

    #[test]
    fn frames_read_back_through_a_cursor() {
        let mut bytes = Vec::new();
        write_frame(&mut bytes, b"ring").unwrap();
        let mut cursor = io::Cursor::new(bytes);
        let size = read_usize(&mut cursor).unwrap();
        assert_eq!(read_bytes_vec(&mut cursor, size).unwrap(), b"ring".to_vec());
    }
}
