use std::fmt;

/// Optional features of the primitive operation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Rectangle/mask seeded energy-minimization cut
    EnergyCut,
    /// Morphological close/open on masks
    Morphology,
    /// Neural foreground mask inference
    NeuralMask,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::EnergyCut => "energy-minimization cut",
            Capability::Morphology => "morphology",
            Capability::NeuralMask => "neural foreground mask",
        };
        f.write_str(name)
    }
}

/// Which segmentation session an operation needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Cut,
    Matting,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Cut => f.write_str("no cut mask available, run background removal first"),
            SessionKind::Matting => f.write_str("no neural mask available, run neural background removal first"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("{0}")]
    NoSession(SessionKind),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("{0} is not available in this backend")]
    Unavailable(Capability),

    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("foreground inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("cannot {action} in {mode} mode")]
    WrongMode {
        action: &'static str,
        mode: crate::editor::Mode,
    },

    #[error("no handler registered for extension command `{0}`")]
    UnregisteredExtension(String),

    #[error("mask is {actual:?} but image is {expected:?}")]
    MaskSize {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

pub type Result<T> = std::result::Result<T, EditorError>;
