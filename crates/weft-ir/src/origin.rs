use std::fmt;
use std::panic::Location;
use std::path::PathBuf;

/// Where a type or function was declared.
///
/// Combinators called from Rust are `#[track_caller]`, so the recorded location is the
/// first frame outside this workspace. Items loaded from a declaration file carry the file
/// and the dotted item path instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    Source {
        file: &'static str,
        line: u32,
        column: u32,
    },
    Declaration {
        file: PathBuf,
        item: String,
    },
    Builtin,
}

impl Origin {
    /// Captures the location of the caller.
    #[track_caller]
    pub fn caller() -> Self {
        Location::caller().into()
    }

    pub fn declaration(file: impl Into<PathBuf>, item: impl Into<String>) -> Self {
        Origin::Declaration {
            file: file.into(),
            item: item.into(),
        }
    }
}

impl From<&'static Location<'static>> for Origin {
    fn from(location: &'static Location<'static>) -> Self {
        Origin::Source {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Source { file, line, column } => write!(f, "{}:{}:{}", file, line, column),
            Origin::Declaration { file, item } => write!(f, "{} ({})", file.display(), item),
            Origin::Builtin => f.write_str("<builtin>"),
        }
    }
}
