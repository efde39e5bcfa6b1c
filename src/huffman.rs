//! Static-table Huffman codec used by the Skulltag/Zandronum launcher protocol.
//!
//! Payload layout: the first byte is the number of padding bits at the end of
//! the stream. The special value [UNCOMPRESSED_MARKER] means the rest of the
//! payload is stored verbatim. Compressed bytes are expanded least significant
//! bit first.

use crate::GsqErr;
use std::collections::HashMap;

/// Padding byte announcing an uncompressed payload.
pub const UNCOMPRESSED_MARKER: u8 = 0xFF;

/// Symbol frequencies of the Skulltag/Zandronum launcher protocol, indexed by
/// byte value. Both ends build the same code from it with
/// [HuffmanTable::from_frequencies].
#[rustfmt::skip]
pub const ZANDRONUM_FREQUENCIES: [f32; 256] = [
    0.14473691, 0.01147017, 0.00167522, 0.03831121, 0.00356579, 0.03811315,
    0.00178254, 0.00199644, 0.00183511, 0.00225716, 0.00211240, 0.00308829,
    0.00172852, 0.00186608, 0.00215921, 0.00168891, 0.00168603, 0.00218586,
    0.00284414, 0.00161833, 0.00196043, 0.00151029, 0.00173932, 0.00218370,
    0.00934121, 0.00220530, 0.00381211, 0.00185456, 0.00194675, 0.00161977,
    0.00186680, 0.00182071, 0.06421956, 0.00537786, 0.00514019, 0.00487155,
    0.00493925, 0.00503143, 0.00514019, 0.00453520, 0.00454241, 0.00485642,
    0.00422407, 0.00593387, 0.00458130, 0.00343687, 0.00342823, 0.00531592,
    0.00324890, 0.00333388, 0.00308613, 0.00293776, 0.00258918, 0.00259278,
    0.00377105, 0.00267488, 0.00227516, 0.00415997, 0.00248763, 0.00301555,
    0.00220962, 0.00206990, 0.00270369, 0.00231694, 0.00273826, 0.00450928,
    0.00384380, 0.00504728, 0.00221251, 0.00376961, 0.00232990, 0.00312574,
    0.00291688, 0.00280236, 0.00252436, 0.00229461, 0.00294353, 0.00241201,
    0.00366590, 0.00199860, 0.00257838, 0.00225860, 0.00260646, 0.00187256,
    0.00266552, 0.00242641, 0.00219450, 0.00192082, 0.00182071, 0.02185930,
    0.00157439, 0.00164353, 0.00161401, 0.00187544, 0.00186248, 0.03338637,
    0.00186968, 0.00172132, 0.00148509, 0.00177749, 0.00144620, 0.00192442,
    0.00169683, 0.00209439, 0.00209439, 0.00259062, 0.00194531, 0.00182359,
    0.00159096, 0.00145196, 0.00128199, 0.00158232, 0.00171412, 0.00243433,
    0.00345704, 0.00156359, 0.00145700, 0.00157007, 0.00232342, 0.00154198,
    0.00140730, 0.00288807, 0.00152830, 0.00151246, 0.00250203, 0.00224420,
    0.00161761, 0.00714383, 0.08188576, 0.00802537, 0.00119484, 0.00123805,
    0.05632671, 0.00305156, 0.00105584, 0.00105368, 0.00099246, 0.00090459,
    0.00109473, 0.00115379, 0.00261223, 0.00105656, 0.00124381, 0.00100326,
    0.00127550, 0.00089739, 0.00162481, 0.00100830, 0.00097229, 0.00078864,
    0.00107240, 0.00084409, 0.00265760, 0.00116891, 0.00073102, 0.00075695,
    0.00093916, 0.00106880, 0.00086786, 0.00185600, 0.00608367, 0.00133600,
    0.00075695, 0.00122077, 0.00566955, 0.00108249, 0.00259638, 0.00077063,
    0.00166586, 0.00090387, 0.00087074, 0.00084914, 0.00130935, 0.00162409,
    0.00085922, 0.00093340, 0.00093844, 0.00087722, 0.00108249, 0.00098598,
    0.00095933, 0.00427593, 0.00496661, 0.00102775, 0.00159312, 0.00118404,
    0.00114947, 0.00104936, 0.00154342, 0.00140082, 0.00115883, 0.00110769,
    0.00161112, 0.00169107, 0.00107816, 0.00142747, 0.00279804, 0.00085922,
    0.00116315, 0.00119484, 0.00128559, 0.00146204, 0.00130215, 0.00101551,
    0.00091756, 0.00161184, 0.00236375, 0.00131872, 0.00214120, 0.00088875,
    0.00138570, 0.00211960, 0.00094060, 0.00088083, 0.00094564, 0.00090243,
    0.00106160, 0.00088659, 0.00114514, 0.00095861, 0.00108753, 0.00124165,
    0.00427016, 0.00159384, 0.00170547, 0.00104431, 0.00091395, 0.00095789,
    0.00134681, 0.00095213, 0.00105944, 0.00094132, 0.00141883, 0.00102127,
    0.00101911, 0.00082105, 0.00158376, 0.00102631, 0.00087938, 0.00139290,
    0.00114658, 0.00095501, 0.00161329, 0.00126542, 0.00113218, 0.00123661,
    0.00101695, 0.00112930, 0.00317976, 0.00085346, 0.00101190, 0.00189849,
    0.00105728, 0.00186824, 0.00092908, 0.00160896,
];

/// Immutable bit-pattern to byte mapping.
#[derive(Debug, Clone)]
pub struct HuffmanTable {
    codes: HashMap<String, u8>,
    min_len: usize,
    max_len: usize,
}

impl HuffmanTable {
    /// Build a table from explicit `(pattern, byte)` pairs, e.g. `("0110", b'e')`.
    ///
    /// The patterns must be non-empty strings of `0`/`1`, unique and prefix-free.
    pub fn from_patterns<I, S>(patterns: I) -> Result<Self, GsqErr>
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
    {
        let mut codes = HashMap::new();

        for (pattern, byte) in patterns {
            let pattern: String = pattern.into();

            if pattern.is_empty() || pattern.chars().any(|c| c != '0' && c != '1') {
                return Err(GsqErr::ConfErr(format!(
                    "Invalid Huffman pattern for byte 0x{:02X}: {:?}",
                    byte, pattern
                )));
            }

            if codes.insert(pattern.clone(), byte).is_some() {
                return Err(GsqErr::ConfErr(format!(
                    "Duplicate Huffman pattern: {}",
                    pattern
                )));
            }
        }

        if codes.is_empty() {
            return Err(GsqErr::ConfErr("Huffman table must not be empty".into()));
        }

        // After sorting, a pattern that prefixes another one sorts right before it.
        let mut sorted = codes.keys().collect::<Vec<_>>();
        sorted.sort();

        if let Some(pair) = sorted.windows(2).find(|w| w[1].starts_with(w[0].as_str())) {
            return Err(GsqErr::ConfErr(format!(
                "Huffman table is not prefix-free: {} prefixes {}",
                pair[0], pair[1]
            )));
        }

        let min_len = codes.keys().map(String::len).min().unwrap_or(1);
        let max_len = codes.keys().map(String::len).max().unwrap_or(1);

        Ok(Self {
            codes,
            min_len,
            max_len,
        })
    }

    /// Build the code from a symbol frequency table, indexed by byte value.
    ///
    /// Repeatedly merges the two lightest nodes (earliest wins ties), the first
    /// becoming the `0` branch. This is the construction the Skulltag engine
    /// runs over its frequency table at startup.
    pub fn from_frequencies(frequencies: &[f32]) -> Result<Self, GsqErr> {
        enum Node {
            Leaf(u8),
            Branch(Box<Node>, Box<Node>),
        }

        if frequencies.is_empty() || frequencies.len() > 256 {
            return Err(GsqErr::ConfErr(format!(
                "Huffman frequency table needs 1 to 256 entries, got {}",
                frequencies.len()
            )));
        }

        let mut pool = frequencies
            .iter()
            .enumerate()
            .map(|(byte, &weight)| (weight, Node::Leaf(byte as u8)))
            .collect::<Vec<_>>();

        fn take_lightest(pool: &mut Vec<(f32, Node)>) -> (f32, Node) {
            let mut lightest = 0;

            for (idx, (weight, _)) in pool.iter().enumerate() {
                if weight.total_cmp(&pool[lightest].0).is_lt() {
                    lightest = idx;
                }
            }

            pool.remove(lightest)
        }

        while pool.len() > 1 {
            let (w0, zero) = take_lightest(&mut pool);
            let (w1, one) = take_lightest(&mut pool);

            pool.push((w0 + w1, Node::Branch(Box::new(zero), Box::new(one))));
        }

        let mut patterns = Vec::with_capacity(frequencies.len());
        let mut stack = Vec::new();

        if let Some((_, root)) = pool.pop() {
            stack.push((root, String::new()));
        }

        while let Some((node, prefix)) = stack.pop() {
            match node {
                // A lone symbol still needs one bit.
                Node::Leaf(byte) if prefix.is_empty() => patterns.push(("0".to_string(), byte)),
                Node::Leaf(byte) => patterns.push((prefix, byte)),
                Node::Branch(zero, one) => {
                    stack.push((*one, format!("{}1", prefix)));
                    stack.push((*zero, format!("{}0", prefix)));
                }
            }
        }

        Self::from_patterns(patterns)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn min_len(&self) -> usize {
        self.min_len
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

/// Decoder bound to one table.
#[derive(Debug, Clone)]
pub struct HuffmanCodec {
    table: HuffmanTable,
}

impl HuffmanCodec {
    pub fn create(table: HuffmanTable) -> Self {
        Self { table }
    }

    /// Codec for the Skulltag/Zandronum launcher protocol.
    pub fn zandronum() -> Result<Self, GsqErr> {
        Ok(Self::create(HuffmanTable::from_frequencies(
            &ZANDRONUM_FREQUENCIES,
        )?))
    }

    pub fn table(&self) -> &HuffmanTable {
        &self.table
    }

    /// Decode a padded Huffman stream.
    ///
    /// A bit sequence that matches no pattern is a malformed stream and is
    /// reported as [GsqErr::DataErr].
    pub fn decompress(&self, bufs: &[u8]) -> Result<Vec<u8>, GsqErr> {
        let (padding, payload) = match bufs.split_first() {
            Some((&padding, payload)) => (padding, payload),
            None => return Ok(Vec::new()),
        };

        if padding == UNCOMPRESSED_MARKER {
            return Ok(payload.to_vec());
        }

        let bits = expand_bits(payload);
        let significant = match bits.len().checked_sub(padding as usize) {
            Some(significant) => significant,
            None => {
                return Err(GsqErr::DataErr(format!(
                    "Huffman padding ({}) exceeds stream length ({} bits)",
                    padding,
                    bits.len()
                )));
            }
        };

        let mut result = Vec::new();
        let mut pos = 0;

        'stream: while pos < significant {
            for len in self.table.min_len..=self.table.max_len {
                if pos + len > significant {
                    break;
                }

                if let Some(&byte) = self.table.codes.get(&bits[pos..pos + len]) {
                    result.push(byte);
                    pos += len;
                    continue 'stream;
                }
            }

            return Err(GsqErr::DataErr(format!(
                "No Huffman pattern matches the stream at bit {} of {}",
                pos, significant
            )));
        }

        Ok(result)
    }

    /// Wrap `data` in the uncompressed format. No real encoding is performed.
    pub fn compress(&self, data: &[u8]) -> Vec<u8> {
        let mut bufs = Vec::with_capacity(data.len() + 1);

        bufs.push(UNCOMPRESSED_MARKER);
        bufs.extend_from_slice(data);

        bufs
    }
}

fn expand_bits(bufs: &[u8]) -> String {
    let mut bits = String::with_capacity(bufs.len() * 8);

    for &buf in bufs {
        for shift in 0..8 {
            bits.push(if (buf >> shift) & 1 == 1 { '1' } else { '0' });
        }
    }

    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abcd_codec() -> HuffmanCodec {
        HuffmanCodec::create(
            HuffmanTable::from_patterns([("0", b'a'), ("10", b'b'), ("110", b'c'), ("111", b'd')])
                .unwrap(),
        )
    }

    fn pack_bits(bits: &str) -> Vec<u8> {
        let padding = (8 - bits.len() % 8) % 8;
        let mut bufs = vec![padding as u8];

        for chunk in bits.as_bytes().chunks(8) {
            let mut byte = 0u8;

            for (shift, &bit) in chunk.iter().enumerate() {
                if bit == b'1' {
                    byte |= 1 << shift;
                }
            }

            bufs.push(byte);
        }

        bufs
    }

    #[test]
    fn decodes_lsb_first_stream() {
        // "abcd" = 0 10 110 111, packed into two bytes with 7 padding bits.
        let codec = abcd_codec();

        assert_eq!(codec.decompress(&[7, 0xDA, 0x01]).unwrap(), b"abcd");
        assert_eq!(codec.decompress(&pack_bits("010110111")).unwrap(), b"abcd");
    }

    #[test]
    fn uncompressed_round_trip() {
        let codec = abcd_codec();

        for data in [&b""[..], b"\x00\xFF\x01", b"\xFF\xFF\xFF\xFFLAUNCHER"] {
            let compressed = codec.compress(data);

            assert_eq!(compressed[0], UNCOMPRESSED_MARKER);
            assert_eq!(codec.decompress(&compressed).unwrap(), data);
        }
    }

    #[test]
    fn empty_inputs() {
        let codec = abcd_codec();

        assert!(codec.decompress(&[]).unwrap().is_empty());
        assert!(codec.decompress(&[0]).unwrap().is_empty());
    }

    #[test]
    fn unmatched_pattern_is_fatal() {
        let codec =
            HuffmanCodec::create(HuffmanTable::from_patterns([("00", b'x'), ("01", b'y')]).unwrap());

        assert!(matches!(codec.decompress(&[0, 0xFF]), Err(GsqErr::DataErr(_))));
        assert!(matches!(codec.decompress(&[9, 0x00]), Err(GsqErr::DataErr(_))));
    }

    #[test]
    fn rejects_bad_tables() {
        assert!(HuffmanTable::from_patterns(Vec::<(String, u8)>::new()).is_err());
        assert!(HuffmanTable::from_patterns([("0", 1), ("01", 2)]).is_err());
        assert!(HuffmanTable::from_patterns([("0", 1), ("0", 2)]).is_err());
        assert!(HuffmanTable::from_patterns([("02", 1)]).is_err());
    }

    #[test]
    fn frequency_table_builds_complete_code() {
        let frequencies = (0..256).map(|i| 1.0 + (i % 7) as f32).collect::<Vec<_>>();
        let table = HuffmanTable::from_frequencies(&frequencies).unwrap();

        assert_eq!(table.len(), 256);
        assert_eq!(
            table.codes.values().collect::<std::collections::HashSet<_>>().len(),
            256
        );
        assert!(table.min_len() <= table.max_len());

        let mut lookup = HashMap::new();
        for (pattern, &byte) in &table.codes {
            lookup.insert(byte, pattern.clone());
        }

        let message = b"\xFF\xFF\xFF\xFF\x00ZANDRONUM launcher";
        let bits = message
            .iter()
            .map(|b| lookup[b].as_str())
            .collect::<String>();
        let codec = HuffmanCodec::create(table);

        assert_eq!(codec.decompress(&pack_bits(&bits)).unwrap(), message);
    }

    #[test]
    fn zandronum_launcher_challenge() {
        let codec = HuffmanCodec::zandronum().unwrap();
        let table = codec.table();

        assert_eq!(table.len(), 256);
        assert_eq!(table.min_len(), 3);
        assert_eq!(table.max_len(), 10);

        let lookup: HashMap<u8, &str> = table
            .codes
            .iter()
            .map(|(pattern, &byte)| (byte, pattern.as_str()))
            .collect();
        assert_eq!(lookup[&0x00], "101");

        // LAUNCHER_SERVER_CHALLENGE (199), query flags, then a timestamp.
        let request = [0xC7, 0, 0, 0, 0x01, 0, 0, 0, 0x78, 0x56, 0x34, 0x12];
        let bits = request.iter().map(|b| lookup[b]).collect::<String>();
        let compressed = pack_bits(&bits);

        assert_eq!(bits.len(), 68);
        assert_eq!(compressed.len(), 10);
        assert_eq!(codec.decompress(&compressed).unwrap(), request);
    }

    #[test]
    fn heavier_symbols_get_shorter_codes() {
        let table = HuffmanTable::from_frequencies(&[0.5, 0.25, 0.125, 0.125]).unwrap();

        assert_eq!(table.codes.len(), 4);
        assert_eq!(table.min_len(), 1);
        assert_eq!(table.max_len(), 3);

        let zero = table.codes.iter().find(|(_, &b)| b == 0).unwrap().0;
        assert_eq!(zero.len(), 1);
    }
}
