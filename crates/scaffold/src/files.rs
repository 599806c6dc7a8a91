//! Text, JSON and YAML file helpers.
//!
//! Every operation logs a debug record when it starts, an info record with
//! the path and size when it succeeds, and an error record with context when
//! it fails. Failures are returned as [`FileError`].

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use encoding_rs::SHIFT_JIS;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

/// Indentation used by [`write_json`] callers that have no preference.
pub const DEFAULT_JSON_INDENT: usize = 4;

/// Text encodings supported by [`read_file`] and [`write_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Encoding {
    #[default]
    Utf8,
    /// Windows code page 932 (Shift_JIS with Microsoft extensions).
    Cp932,
}

impl Encoding {
    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Cp932 => "cp932",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Encoding {
    type Err = FileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Encoding::Utf8),
            "cp932" | "shift-jis" | "sjis" | "windows-31j" => Ok(Encoding::Cp932),
            other => Err(FileError::UnsupportedEncoding(other.to_owned())),
        }
    }
}

/// Errors returned by the file helpers.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found: {}", .path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("permission denied: {}", .path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The bytes on disk, or the text being written, are not valid in the
    /// requested encoding.
    #[error("{} is not valid {encoding}", .path.display())]
    Encoding { path: PathBuf, encoding: Encoding },

    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => FileError::NotFound { path, source },
            io::ErrorKind::PermissionDenied => FileError::PermissionDenied { path, source },
            _ => FileError::Io { path, source },
        }
    }

    fn log_read(&self, path: &Path) {
        match self {
            FileError::NotFound { .. } => {
                error!(path = %path.display(), error = %self, "File not found")
            }
            FileError::PermissionDenied { .. } => {
                error!(path = %path.display(), error = %self, "Permission denied reading file")
            }
            FileError::Encoding { encoding, .. } => {
                error!(
                    path = %path.display(),
                    %encoding,
                    error = %self,
                    "Encoding error reading file"
                )
            }
            _ => error!(path = %path.display(), error = %self, "Error reading file"),
        }
    }

    fn log_write(&self, path: &Path) {
        match self {
            FileError::PermissionDenied { .. } => {
                error!(path = %path.display(), error = %self, "Permission denied writing file")
            }
            FileError::Encoding { encoding, .. } => {
                error!(
                    path = %path.display(),
                    %encoding,
                    error = %self,
                    "Encoding error writing file"
                )
            }
            _ => error!(path = %path.display(), error = %self, "Error writing file"),
        }
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Read `path` as text in `encoding`.
pub fn read_file(path: impl AsRef<Path>, encoding: Encoding) -> Result<String, FileError> {
    let path = path.as_ref();
    debug!(path = %path.display(), %encoding, "Reading file");

    let result = fs::read(path)
        .map_err(|e| FileError::from_io(path, e))
        .and_then(|bytes| decode(path, bytes, encoding));

    match result {
        Ok(content) => {
            info!(path = %path.display(), size = content.chars().count(), "File read successfully");
            Ok(content)
        }
        Err(e) => {
            e.log_read(path);
            Err(e)
        }
    }
}

/// Write `content` to `path` in `encoding`, creating parent directories.
pub fn write_file(
    path: impl AsRef<Path>,
    content: &str,
    encoding: Encoding,
) -> Result<(), FileError> {
    let path = path.as_ref();
    let size = content.chars().count();

    let result = create_parent(path).and_then(|()| {
        debug!(path = %path.display(), %encoding, size, "Writing file");
        let bytes = encode(path, content, encoding)?;
        fs::write(path, bytes).map_err(|e| FileError::from_io(path, e))
    });

    match result {
        Ok(()) => {
            info!(path = %path.display(), size, "File written successfully");
            Ok(())
        }
        Err(e) => {
            e.log_write(path);
            Err(e)
        }
    }
}

fn create_parent(path: &Path) -> Result<(), FileError> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => fs::create_dir_all(parent).map_err(|e| FileError::from_io(parent, e)),
        None => Ok(()),
    }
}

fn decode(path: &Path, bytes: Vec<u8>, encoding: Encoding) -> Result<String, FileError> {
    let invalid = || FileError::Encoding {
        path: path.to_path_buf(),
        encoding,
    };
    match encoding {
        Encoding::Utf8 => String::from_utf8(bytes).map_err(|_| invalid()),
        Encoding::Cp932 => SHIFT_JIS
            .decode_without_bom_handling_and_without_replacement(&bytes)
            .map(|text| text.into_owned())
            .ok_or_else(invalid),
    }
}

fn encode(path: &Path, content: &str, encoding: Encoding) -> Result<Vec<u8>, FileError> {
    match encoding {
        Encoding::Utf8 => Ok(content.as_bytes().to_vec()),
        Encoding::Cp932 => {
            let (bytes, _, unmappable) = SHIFT_JIS.encode(content);
            if unmappable {
                return Err(FileError::Encoding {
                    path: path.to_path_buf(),
                    encoding,
                });
            }
            Ok(bytes.into_owned())
        }
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Read and parse a UTF-8 JSON file.
pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, FileError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Reading JSON file");

    let content = read_file(path, Encoding::Utf8)?;
    match serde_json::from_str::<T>(&content) {
        Ok(data) => {
            info!(
                path = %path.display(),
                data_type = std::any::type_name::<T>(),
                "JSON file parsed successfully"
            );
            Ok(data)
        }
        Err(source) => {
            error!(
                path = %path.display(),
                error = %source,
                line = source.line(),
                column = source.column(),
                "JSON decode error"
            );
            Err(FileError::Json {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Write `data` as pretty JSON indented by `indent` spaces. Non-ASCII text is
/// written as is.
pub fn write_json<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    data: &T,
    indent: usize,
) -> Result<(), FileError> {
    let path = path.as_ref();
    let data_type = std::any::type_name::<T>();
    debug!(path = %path.display(), data_type, "Writing JSON file");

    let content = to_pretty_json(data, indent).map_err(|source| {
        error!(path = %path.display(), data_type, error = %source, "JSON serialization error");
        FileError::Json {
            path: path.to_path_buf(),
            source,
        }
    })?;
    write_file(path, &content, Encoding::Utf8)?;
    info!(path = %path.display(), "JSON file written successfully");
    Ok(())
}

fn to_pretty_json<T: Serialize + ?Sized>(
    data: &T,
    indent: usize,
) -> Result<String, serde_json::Error> {
    let indent = vec![b' '; indent];
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(
        &mut out,
        serde_json::ser::PrettyFormatter::with_indent(&indent),
    );
    data.serialize(&mut serializer)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

// ---------------------------------------------------------------------------
// YAML
// ---------------------------------------------------------------------------

/// Read and parse a UTF-8 YAML file.
pub fn read_yaml<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, FileError> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Reading YAML file");

    let content = read_file(path, Encoding::Utf8)?;
    match serde_yaml::from_str::<T>(&content) {
        Ok(data) => {
            info!(
                path = %path.display(),
                data_type = std::any::type_name::<T>(),
                "YAML file parsed successfully"
            );
            Ok(data)
        }
        Err(source) => {
            error!(path = %path.display(), error = %source, "YAML parse error");
            Err(FileError::Yaml {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Write `data` as block-style YAML.
pub fn write_yaml<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    data: &T,
) -> Result<(), FileError> {
    let path = path.as_ref();
    let data_type = std::any::type_name::<T>();
    debug!(path = %path.display(), data_type, "Writing YAML file");

    let content = serde_yaml::to_string(data).map_err(|source| {
        error!(
            path = %path.display(),
            data_type,
            error = %source,
            "YAML serialization error"
        );
        FileError::Yaml {
            path: path.to_path_buf(),
            source,
        }
    })?;
    write_file(path, &content, Encoding::Utf8)?;
    info!(path = %path.display(), "YAML file written successfully");
    Ok(())
}
