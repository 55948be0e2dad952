use anyhow::{Context, Result};
use qrcode::QrCode;

/// Square module matrix of a scannable code, row-major, `true` for dark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrMatrix {
    pub width: usize,
    pub modules: Vec<bool>,
}

impl QrMatrix {
    #[must_use]
    pub fn is_dark(&self, row: usize, col: usize) -> bool {
        row < self.width && col < self.width && self.modules[row * self.width + col]
    }

    pub fn dark_modules(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.modules
            .iter()
            .enumerate()
            .filter(|(_, dark)| **dark)
            .map(|(i, _)| (i / self.width, i % self.width))
    }
}

/// Encodes a link into a scannable code.
pub trait QuickAccessEncoder {
    fn encode(&self, data: &str) -> Result<QrMatrix>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QrEncoder;

impl QuickAccessEncoder for QrEncoder {
    fn encode(&self, data: &str) -> Result<QrMatrix> {
        let code = QrCode::new(data.as_bytes()).context("Failed to generate QR code")?;
        let width = code.width();
        let modules = code
            .into_colors()
            .into_iter()
            .map(|c| c == qrcode::Color::Dark)
            .collect();
        Ok(QrMatrix { width, modules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_square_matrix() {
        let matrix = QrEncoder.encode("https://example.org/portal/u1").unwrap();
        assert!(matrix.width >= 21);
        assert_eq!(matrix.modules.len(), matrix.width * matrix.width);
        // Finder pattern corner is always dark.
        assert!(matrix.is_dark(0, 0));
        assert!(!matrix.is_dark(matrix.width, 0));
        assert!(matrix.dark_modules().count() > 0);
    }

    #[test]
    fn oversized_payload_fails() {
        let data = "x".repeat(8000);
        assert!(QrEncoder.encode(&data).is_err());
    }
}
