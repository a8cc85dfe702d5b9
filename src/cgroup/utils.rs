use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use crate::container::{ContainerName, Error, Result};

use super::parser::{self, ParseError};

/// Maps a container name onto its directory below the cgroup root.
pub(super) fn cgroup_path(root: &Path, name: &ContainerName) -> PathBuf {
    name.components()
        .fold(root.to_path_buf(), |path, component| path.join(component))
}

/// Opens `path` and applies `reader` to its contents.
///
/// Returns `Ok(None)` if the file does not exist, as controllers may be disabled
/// for a given cgroup.
pub(super) fn read_optional<T>(
    path: &Path,
    reader: impl FnOnce(&mut BufReader<File>) -> parser::Result<T>,
) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(Error::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    reader(&mut BufReader::new(file))
        .map(Some)
        .map_err(|err| match err {
            ParseError::Io(source) => Error::Io {
                path: path.to_path_buf(),
                source,
            },
            source => Error::Parse {
                path: path.to_path_buf(),
                source,
            },
        })
}
