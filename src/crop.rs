use crate::error_code::ErrorCode;

/// Side of the delivered video note, in pixels.
pub(crate) const NOTE_SIDE: u32 = 480;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    /// Derived once from the source dimensions at intake. Square sources
    /// count as horizontal.
    pub(crate) const fn of(width: u32, height: u32) -> Self {
        if width >= height {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }

    pub(crate) const fn positions(self) -> &'static [CropPosition] {
        match self {
            Self::Horizontal => &[
                CropPosition::Left,
                CropPosition::Center,
                CropPosition::Right,
            ],
            Self::Vertical => &[
                CropPosition::Top,
                CropPosition::Center,
                CropPosition::Bottom,
            ],
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Horizontal => f.write_str("horizontal"),
            Self::Vertical => f.write_str("vertical"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CropPosition {
    Left,
    Center,
    Right,
    Top,
    Bottom,
}

impl CropPosition {
    pub(crate) const fn as_token(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }

    pub(crate) fn from_token(token: &str) -> Option<Self> {
        match token {
            "left" => Some(Self::Left),
            "center" => Some(Self::Center),
            "right" => Some(Self::Right),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }

    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Center => "Center",
            Self::Right => "Right",
            Self::Top => "Top",
            Self::Bottom => "Bottom",
        }
    }
}

impl std::fmt::Display for CropPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_token())
    }
}

/// A square crop window, fully contained in the source frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct CropRect {
    pub(crate) side: u32,
    pub(crate) x: u32,
    pub(crate) y: u32,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum CropError {
    #[error("Position {position} does not apply to a {orientation} video")]
    PositionMismatch {
        position: CropPosition,
        orientation: Orientation,
    },

    #[error("A {side}x{side} window at ({x}, {y}) does not fit inside {width}x{height}")]
    OutOfBounds {
        side: u32,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
}

impl CropError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        ErrorCode::INVALID_CROP_REGION
    }
}

/// Square crop sized to the shorter source dimension, anchored by position.
pub(crate) fn preset(
    width: u32,
    height: u32,
    position: CropPosition,
) -> Result<CropRect, CropError> {
    let orientation = Orientation::of(width, height);

    match (orientation, position) {
        (Orientation::Horizontal, CropPosition::Left) => Ok(CropRect {
            side: height,
            x: 0,
            y: 0,
        }),
        (Orientation::Horizontal, CropPosition::Center) => Ok(CropRect {
            side: height,
            x: (width - height) / 2,
            y: 0,
        }),
        (Orientation::Horizontal, CropPosition::Right) => Ok(CropRect {
            side: height,
            x: width - height,
            y: 0,
        }),
        (Orientation::Vertical, CropPosition::Top) => Ok(CropRect {
            side: width,
            x: 0,
            y: 0,
        }),
        (Orientation::Vertical, CropPosition::Center) => Ok(CropRect {
            side: width,
            x: 0,
            y: (height - width) / 2,
        }),
        (Orientation::Vertical, CropPosition::Bottom) => Ok(CropRect {
            side: width,
            x: 0,
            y: height - width,
        }),
        (orientation, position) => Err(CropError::PositionMismatch {
            position,
            orientation,
        }),
    }
}

/// Fixed-size crop anchored at user-supplied coordinates.
///
/// Accepted iff `x >= 0 && y >= 0 && x + 480 <= width && y + 480 <= height`.
pub(crate) fn custom(width: u32, height: u32, x: i64, y: i64) -> Result<CropRect, CropError> {
    let side = i64::from(NOTE_SIDE);

    if x < 0 || y < 0 || x + side > i64::from(width) || y + side > i64::from(height) {
        return Err(CropError::OutOfBounds {
            side: NOTE_SIDE,
            x,
            y,
            width,
            height,
        });
    }

    Ok(CropRect {
        side: NOTE_SIDE,
        x: x as u32,
        y: y as u32,
    })
}

/// Parse a free-form `x:y` coordinate pair. `None` means re-prompt.
pub(crate) fn parse_coords(text: &str) -> Option<(i64, i64)> {
    let (x, y) = text.trim().split_once(':')?;

    let x = x.trim().parse().ok()?;
    let y = y.trim().parse().ok()?;

    Some((x, y))
}
