/// Cursor over an immutable response buffer.
///
/// Every read either returns a value and advances the cursor by the width of
/// that value, or returns `None` and leaves the cursor where it was. Nothing
/// here fails loudly: callers decide whether a missing field is fatal.
#[derive(Debug, Clone)]
pub struct PacketReader<'a> {
    bufs: &'a [u8],
    current_idx: usize,
}

impl<'a> PacketReader<'a> {
    pub fn create(bufs: &'a [u8]) -> Self {
        Self {
            bufs,
            current_idx: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.current_idx
    }

    pub fn remaining(&self) -> usize {
        self.bufs.len() - self.current_idx
    }

    /// Take exactly `size` bytes.
    pub fn read_bytes(&mut self, size: usize) -> Option<&'a [u8]> {
        if self.remaining() < size {
            return None;
        }

        let bufs = &self.bufs[self.current_idx..self.current_idx + size];
        self.current_idx += size;

        Some(bufs)
    }

    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.read_bytes(N).and_then(|bufs| bufs.try_into().ok())
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[b]| b)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        self.read_array().map(i32::from_le_bytes)
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        self.read_array().map(f32::from_le_bytes)
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    pub fn read_u16_be(&mut self) -> Option<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_u32_be(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_be_bytes)
    }

    /// Read a null-terminated byte string, without the terminator.
    ///
    /// The bytes are not required to be valid UTF-8.
    pub fn read_cstring(&mut self) -> Option<&'a [u8]> {
        let tail = &self.bufs[self.current_idx..];
        let end = tail.iter().position(|&b| b == 0x00)?;

        self.current_idx += end + 1;

        Some(&tail[..end])
    }

    /// [PacketReader::read_cstring] decoded lossily into a [String].
    pub fn read_str(&mut self) -> Option<String> {
        self.read_cstring()
            .map(|bufs| String::from_utf8_lossy(bufs).into_owned())
    }

    /// Everything that is left. The cursor moves to the end.
    pub fn rest(&mut self) -> &'a [u8] {
        let tail = &self.bufs[self.current_idx..];
        self.current_idx = self.bufs.len();

        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_little_endian() {
        let bufs = [
            0x7F, 0x34, 0x12, 0x78, 0x56, 0x34, 0x12, 0xFE, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x80,
            0x3F,
        ];
        let mut reader = PacketReader::create(&bufs);

        assert_eq!(reader.read_u8(), Some(0x7F));
        assert_eq!(reader.read_u16(), Some(0x1234));
        assert_eq!(reader.read_u32(), Some(0x12345678));
        assert_eq!(reader.read_i32(), Some(-2));
        assert_eq!(reader.read_f32(), Some(1.0));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn short_reads_leave_cursor_alone() {
        let bufs = [0x01, 0x02, 0x03];
        let mut reader = PacketReader::create(&bufs);

        assert_eq!(reader.read_u32(), None);
        assert_eq!(reader.read_i32(), None);
        assert_eq!(reader.read_f32(), None);
        assert_eq!(reader.position(), 0);

        assert_eq!(reader.read_u16(), Some(0x0201));
        assert_eq!(reader.read_u16(), None);
        assert_eq!(reader.read_u32(), None);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.read_u8(), Some(0x03));
        assert_eq!(reader.read_u8(), None);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn cstring_needs_terminator() {
        let bufs = b"de_dust2\0cstr";
        let mut reader = PacketReader::create(bufs);

        assert_eq!(reader.read_cstring(), Some(&b"de_dust2"[..]));
        assert_eq!(reader.position(), 9);
        assert_eq!(reader.read_cstring(), None);
        assert_eq!(reader.position(), 9);
        assert_eq!(reader.rest(), b"cstr");
        assert_eq!(reader.remaining(), 0);
        assert_eq!(reader.rest(), b"");
    }

    #[test]
    fn cstring_keeps_raw_bytes() {
        let bufs = [0xC3, 0x28, 0x00, 0x00];
        let mut reader = PacketReader::create(&bufs);

        assert_eq!(reader.read_cstring(), Some(&[0xC3, 0x28][..]));
        assert_eq!(reader.read_str(), Some(String::new()));
    }

    #[test]
    fn big_endian_fields() {
        let bufs = [0x12, 0x34, 0xDE, 0xAD, 0xBE, 0xEF];
        let mut reader = PacketReader::create(&bufs);

        assert_eq!(reader.read_u16_be(), Some(0x1234));
        assert_eq!(reader.read_u32_be(), Some(0xDEADBEEF));
    }
}
