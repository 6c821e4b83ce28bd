//! Source discovery under a capability-scoped `src/` directory.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;

use crate::{ArchitectureLintError, LintSource};

/// Every `.rs` file below `src_dir`, sorted by relative path.
pub(crate) fn collect_sources(src_dir: &Utf8Path) -> Result<Vec<LintSource>, ArchitectureLintError> {
    let root = Dir::open_ambient_dir(src_dir, ambient_authority())
        .map_err(|source| ArchitectureLintError::io(src_dir, source))?;
    let mut sources = Vec::new();
    walk(&root, src_dir, Utf8Path::new(""), &mut sources)?;
    sources.sort_by(|left, right| left.file.cmp(&right.file));
    Ok(sources)
}

fn walk(
    dir: &Dir,
    src_dir: &Utf8Path,
    relative: &Utf8Path,
    sources: &mut Vec<LintSource>,
) -> Result<(), ArchitectureLintError> {
    let here = src_dir.join(relative);
    let entries = dir
        .entries()
        .map_err(|source| ArchitectureLintError::io(&here, source))?;
    for entry in entries {
        let entry = entry.map_err(|source| ArchitectureLintError::io(&here, source))?;
        let name = entry
            .file_name()
            .into_string()
            .map_err(|raw| ArchitectureLintError::NonUtf8Name {
                parent: here.clone(),
                name: raw.to_string_lossy().into_owned(),
            })?;
        let path: Utf8PathBuf = relative.join(&name);
        let file_type = entry
            .file_type()
            .map_err(|source| ArchitectureLintError::io(&src_dir.join(&path), source))?;

        if file_type.is_dir() {
            let child = dir
                .open_dir(&name)
                .map_err(|source| ArchitectureLintError::io(&src_dir.join(&path), source))?;
            walk(&child, src_dir, &path, sources)?;
        } else if path.extension() == Some("rs") {
            let contents = dir
                .read_to_string(&name)
                .map_err(|source| ArchitectureLintError::io(&src_dir.join(&path), source))?;
            sources.push(LintSource {
                file: path,
                contents,
            });
        }
    }
    Ok(())
}
