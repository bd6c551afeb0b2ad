#[non_exhaustive]
#[derive(Debug)]
pub enum Error {
    /// The box or the cutoff radius do not describe a valid periodic geometry:
    /// non-positive cutoff, cutoff larger than half the box, 3D tilts in a 2D
    /// box, ...
    InvalidGeometry(String),
    /// A neighbor list or a set of points does not match the declared number
    /// of points
    ShapeMismatch(String),
    /// The solid angle filter could not find a complete neighbor shell for at
    /// least one point
    IncompleteNeighborShell(String),
    /// Two points are at the same position where a direction between them is
    /// required
    DegenerateGeometry(String),
    /// Got an invalid parameter value in a function
    InvalidParameter(String),
    /// Error while serializing/deserializing data
    Json(serde_json::Error),
    /// Error used when a panic was caught
    Panic(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidGeometry(e) => write!(f, "invalid geometry: {}", e),
            Error::ShapeMismatch(e) => write!(f, "shape mismatch: {}", e),
            Error::IncompleteNeighborShell(e) => write!(f, "incomplete neighbor shell: {}", e),
            Error::DegenerateGeometry(e) => write!(f, "degenerate geometry: {}", e),
            Error::InvalidParameter(e) => write!(f, "invalid parameter: {}", e),
            Error::Json(e) => write!(f, "json error: {}", e),
            Error::Panic(e) => write!(f, "internal error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidGeometry(_) |
            Error::ShapeMismatch(_) |
            Error::IncompleteNeighborShell(_) |
            Error::DegenerateGeometry(_) |
            Error::InvalidParameter(_) |
            Error::Panic(_) => None,
            Error::Json(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::Json(error)
    }
}

// Box<dyn Any + Send + 'static> is the error type in std::panic::catch_unwind
impl From<Box<dyn std::any::Any + Send + 'static>> for Error {
    fn from(error: Box<dyn std::any::Any + Send + 'static>) -> Error {
        let message = if let Some(message) = error.downcast_ref::<String>() {
            message.clone()
        } else if let Some(message) = error.downcast_ref::<&str>() {
            (*message).to_owned()
        } else {
            "panic payload is not a string".to_owned()
        };

        Error::Panic(message)
    }
}
