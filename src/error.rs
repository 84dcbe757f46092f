//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom dell'applicazione.
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Decode`: Errori di decodifica immagini (file corrotti, formato invalido)
//! - `Cancelled`: Interruzione richiesta dall'operatore (ctrl-c)
//!
//! Gli errori per singolo file vengono catturati dall'orchestratore e non
//! interrompono il batch; solo `Cancelled` risale fino al main.

/// Custom error types for batch conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decoding error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Conversion cancelled by user")]
    Cancelled,
}

impl ConvertError {
    /// Whether an error propagated through `anyhow` is an operator cancellation.
    pub fn is_cancellation(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<ConvertError>(), Some(ConvertError::Cancelled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_detection() {
        let err = anyhow::Error::from(ConvertError::Cancelled);
        assert!(ConvertError::is_cancellation(&err));

        let err = anyhow::Error::from(ConvertError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        )));
        assert!(!ConvertError::is_cancellation(&err));

        let err = anyhow::anyhow!("unrelated");
        assert!(!ConvertError::is_cancellation(&err));
    }
}
