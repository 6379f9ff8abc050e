//! Shannon entropy of file contents
//!
//! Plain text and source code sit around 3-5 bits/byte. Compressed and
//! encrypted content sits close to 8. A high score alone is weak evidence
//! (zip containers, JPEGs and PDFs are already dense), so the evaluator and
//! the confirmer always pair it with other signals.

use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Calculate Shannon entropy of data
///
/// Returns a value between 0.0 (a single repeated byte) and 8.0 (every byte
/// value equally frequent). Empty input scores 0.0.
#[inline]
pub fn calculate(data: &[u8]) -> f64 {
    let mut histogram = ByteHistogram::new();
    histogram.update(data);
    histogram.entropy()
}

/// Byte frequencies accumulated over any number of chunks
#[derive(Debug, Clone)]
pub struct ByteHistogram {
    frequency: [u64; 256],
    total: u64,
}

impl ByteHistogram {
    pub fn new() -> Self {
        Self {
            frequency: [0; 256],
            total: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.frequency[byte as usize] += 1;
        }
        self.total += data.len() as u64;
    }

    /// Bytes counted so far
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Shannon entropy of everything counted so far
    pub fn entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let len = self.total as f64;
        let entropy: f64 = self
            .frequency
            .iter()
            .filter(|&&count| count > 0)
            .map(|&count| {
                let probability = count as f64 / len;
                -probability * probability.log2()
            })
            .sum();

        // A single symbol yields -0.0
        entropy.max(0.0)
    }
}

impl Default for ByteHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculate entropy of a file, reading it in 8 KiB chunks
pub fn calculate_file(path: &Path) -> std::io::Result<f64> {
    let mut file = File::open(path)?;
    let mut histogram = ByteHistogram::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        histogram.update(&buffer[..bytes_read]);
    }

    Ok(histogram.entropy())
}

/// Entropy of a file, or `None` when it cannot be read
pub fn score_file(path: &Path) -> Option<f64> {
    match calculate_file(path) {
        Ok(entropy) => Some(entropy),
        Err(e) => {
            tracing::debug!("Entropy unavailable for {:?}: {}", path, e);
            None
        }
    }
}

/// Check if entropy indicates encryption
#[inline]
pub fn is_high_entropy(entropy: f64, threshold: f64) -> bool {
    entropy > threshold
}

/// Entropy classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyClass {
    /// Very low entropy (repetitive data)
    VeryLow,
    /// Low entropy (text, source code)
    Low,
    /// Medium entropy (binary, some compression)
    Medium,
    /// High entropy (compressed, encrypted)
    High,
    /// Very high entropy (strongly encrypted, random)
    VeryHigh,
}

/// Classify entropy level
pub fn classify(entropy: f64) -> EntropyClass {
    match entropy {
        e if e < 2.0 => EntropyClass::VeryLow,
        e if e < 5.0 => EntropyClass::Low,
        e if e < 7.0 => EntropyClass::Medium,
        e if e < 7.8 => EntropyClass::High,
        _ => EntropyClass::VeryHigh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_empty() {
        assert_eq!(calculate(&[]), 0.0);
    }

    #[test]
    fn test_entropy_all_zero() {
        for len in [1, 7, 1000, 65_536] {
            assert_eq!(calculate(&vec![0u8; len]), 0.0);
        }
    }

    #[test]
    fn test_entropy_two_values() {
        let data: Vec<u8> = (0..1000).map(|i| (i % 2) as u8).collect();
        let entropy = calculate(&data);
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_entropy_every_byte_value() {
        let data: Vec<u8> = (0..256 * 16).map(|i| (i % 256) as u8).collect();
        let entropy = calculate(&data);
        assert!((entropy - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_text() {
        let text = b"Hello, World! This is a test of entropy calculation.";
        let entropy = calculate(text);
        assert!(entropy > 3.0 && entropy < 5.0);
    }

    #[test]
    fn test_calculate_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"aaaabbbb").unwrap();

        let entropy = calculate_file(&path).unwrap();
        assert!((entropy - 1.0).abs() < 1e-9);

        assert!(score_file(&dir.path().join("missing.txt")).is_none());
    }

    #[test]
    fn test_calculate_file_spanning_many_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.bin");
        let data: Vec<u8> = (0..30_000u32).map(|i| (i * 7 % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(calculate_file(&path).unwrap(), calculate(&data));

        let mut histogram = ByteHistogram::new();
        for chunk in data.chunks(1000) {
            histogram.update(chunk);
        }
        assert_eq!(histogram.total(), 30_000);
        assert_eq!(histogram.entropy(), calculate(&data));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(1.0), EntropyClass::VeryLow);
        assert_eq!(classify(4.0), EntropyClass::Low);
        assert_eq!(classify(6.5), EntropyClass::Medium);
        assert_eq!(classify(7.5), EntropyClass::High);
        assert_eq!(classify(7.95), EntropyClass::VeryHigh);
        assert!(is_high_entropy(7.2, 7.0));
        assert!(!is_high_entropy(7.0, 7.0));
    }
}
