use crate::models::CompressionAlgorithm;
use crate::pipeline::LedgerError;
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

/// Inflates `payload` when the document declares GZIP; anything else passes
/// through untouched.
pub fn decompress(
    payload: Vec<u8>,
    algorithm: CompressionAlgorithm,
) -> Result<Vec<u8>, LedgerError> {
    match algorithm {
        CompressionAlgorithm::None => Ok(payload),
        CompressionAlgorithm::Gzip => {
            let mut decoder = GzDecoder::new(payload.as_slice());
            let mut inflated = Vec::new();
            decoder
                .read_to_end(&mut inflated)
                .map_err(|err| LedgerError::Decompression(err.to_string()))?;
            debug!(
                target = "fba.pipeline",
                compressed = payload.len(),
                inflated = inflated.len(),
                "report_document_inflated"
            );
            Ok(inflated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, write::GzEncoder};
    use std::io::Write;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn gzip_payload_inflates_to_plain_text() {
        let plain = "FNSKU\tQuantity\nX1\t10\n".as_bytes();
        let out = decompress(gzip(plain), CompressionAlgorithm::Gzip).expect("inflate");
        assert_eq!(out, plain);
    }

    #[test]
    fn uncompressed_payload_passes_through() {
        let plain = b"not compressed at all".to_vec();
        let out = decompress(plain.clone(), CompressionAlgorithm::None).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn corrupt_gzip_stream_is_a_decompression_error() {
        let err = decompress(b"definitely not gzip".to_vec(), CompressionAlgorithm::Gzip)
            .expect_err("corrupt stream");
        assert!(matches!(err, LedgerError::Decompression(_)));
        assert_eq!(err.stage(), "decompress");
    }
}
