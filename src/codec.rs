//! Compression Codec
//!
//! Whole-chunk string compression. Output stays a valid string so it can be
//! handed to a string-only host store.
//!
//! With the `compression` feature the codec produces the same UTF-16 packing
//! as lz-string's `compressToUTF16`, so chunks written by other lz-string
//! clients stay readable. Without the feature both directions are identity
//! and callers cannot tell the difference.

/// String compressor for chunk payloads
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec;

impl Codec {
    pub fn new() -> Self {
        Self
    }

    /// Whether real compression is compiled in
    pub fn is_available(&self) -> bool {
        cfg!(feature = "compression")
    }

    #[cfg(feature = "compression")]
    pub fn compress(&self, input: &str) -> String {
        lz_str::compress_to_utf16(input)
    }

    #[cfg(not(feature = "compression"))]
    pub fn compress(&self, input: &str) -> String {
        input.to_string()
    }

    /// Returns `None` when `input` is not a valid compressed payload
    #[cfg(feature = "compression")]
    pub fn decompress(&self, input: &str) -> Option<String> {
        let units = lz_str::decompress_from_utf16(input)?;
        String::from_utf16(&units).ok()
    }

    #[cfg(not(feature = "compression"))]
    pub fn decompress(&self, input: &str) -> Option<String> {
        Some(input.to_string())
    }

    /// Encode a serialized chunk for storage
    pub fn encode(&self, serialized: &str, compress: bool) -> String {
        if compress {
            self.compress(serialized)
        } else {
            serialized.to_string()
        }
    }

    /// Candidate plaintexts for a stored chunk, most likely first.
    ///
    /// Toggling compression never rewrites existing chunks, so a chunk may
    /// be in either form. The form matching `compress` is tried first; the
    /// other is only computed when the first is rejected.
    pub fn decode_candidates<'a>(
        &'a self,
        stored: &'a str,
        compress: bool,
    ) -> impl Iterator<Item = String> + 'a {
        type Candidate<'c> = Box<dyn Fn() -> Option<String> + 'c>;

        let raw: Candidate<'a> = Box::new(move || Some(stored.to_string()));
        let unpacked: Candidate<'a> = Box::new(move || self.decompress(stored));

        let order = if compress { [unpacked, raw] } else { [raw, unpacked] };
        order.into_iter().filter_map(|candidate| candidate())
    }
}
