use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// What the editor is doing right now.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    Crop,
    PerspectiveCrop,
    RotateLeft,
    RotateRight,
    FlipHorizontal,
    FlipVertical,
    Scale,
    RemoveBackground,
    RefineBackground,
    Undo,
    Redo,
    FullReset,
    Preview,
    /// Plugin-defined mode the dispatcher does not act on
    Custom(String),
}

impl Mode {
    pub fn as_str(&self) -> &str {
        match self {
            Mode::Idle => "idle",
            Mode::Crop => "crop",
            Mode::PerspectiveCrop => "perspective-crop",
            Mode::RotateLeft => "rotate-left",
            Mode::RotateRight => "rotate-right",
            Mode::FlipHorizontal => "flip-horizontal",
            Mode::FlipVertical => "flip-vertical",
            Mode::Scale => "scale",
            Mode::RemoveBackground => "remove-background",
            Mode::RefineBackground => "refine-background",
            Mode::Undo => "undo",
            Mode::Redo => "redo",
            Mode::FullReset => "full-reset",
            Mode::Preview => "preview",
            Mode::Custom(name) => name.as_str(),
        }
    }

    /// Modes that stay active until the user commits or cancels.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Mode::Crop | Mode::PerspectiveCrop | Mode::RefineBackground)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Infallible;

    /// Unknown names become [`Mode::Custom`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "idle" => Mode::Idle,
            "crop" => Mode::Crop,
            "perspective-crop" => Mode::PerspectiveCrop,
            "rotate-left" => Mode::RotateLeft,
            "rotate-right" => Mode::RotateRight,
            "flip-horizontal" => Mode::FlipHorizontal,
            "flip-vertical" => Mode::FlipVertical,
            "scale" => Mode::Scale,
            "remove-background" => Mode::RemoveBackground,
            "refine-background" => Mode::RefineBackground,
            "undo" => Mode::Undo,
            "redo" => Mode::Redo,
            "full-reset" => Mode::FullReset,
            "preview" => Mode::Preview,
            other => Mode::Custom(other.to_string()),
        })
    }
}
