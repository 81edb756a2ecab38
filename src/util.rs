use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use nix::unistd::{chown, Gid, Uid};

use crate::error::WriteError;

/// Numeric owner applied to files written on behalf of the interactive user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

/// `sudo`-able command line that switches to `app_id`, carrying the
/// configuration file when one was given explicitly.
pub fn switch_command(install_path: &Path, config: Option<&Path>, app_id: &str) -> String {
    match config {
        Some(config) => format!(
            "{} --config {} switch {}",
            install_path.display(),
            config.display(),
            app_id
        ),
        None => format!("{} switch {}", install_path.display(), app_id),
    }
}

/// File a write to `path` must land in. Symlinks are followed so a
/// linked dotfile is updated in place instead of being replaced.
fn resolve_target(path: &Path) -> PathBuf {
    let is_link = fs::symlink_metadata(path).is_ok_and(|meta| meta.file_type().is_symlink());
    if !is_link {
        return path.to_path_buf();
    }
    if let Ok(real) = fs::canonicalize(path) {
        return real;
    }
    // dangling link: write where it points
    match fs::read_link(path) {
        Ok(target) if target.is_absolute() => target,
        Ok(target) => path.parent().unwrap_or(Path::new("/")).join(target),
        Err(_) => path.to_path_buf(),
    }
}

/// Replace `path` with `content` in one step.
///
/// The content goes to a temp file in the same directory which is then
/// renamed over the target, so readers see either the old or the new file.
/// A symlinked `path` is resolved first and the link itself is left alone.
/// The existing file mode is kept unless `mode` is given. The parent
/// directory is never created.
pub fn write_atomic(
    path: &Path,
    content: &str,
    mode: Option<u32>,
    owner: Option<Owner>,
) -> Result<(), WriteError> {
    let target = resolve_target(path);
    let path = target.as_path();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(WriteError::MissingParent(path.to_path_buf()));
    }

    let file_name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let tmp = dir.join(format!(".{}.frontend-switch.tmp", file_name));

    let mode = mode.or_else(|| {
        fs::metadata(path)
            .ok()
            .map(|meta| meta.permissions().mode() & 0o7777)
    });

    let result = (|| -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        if let Some(mode) = mode {
            fs::set_permissions(&tmp, fs::Permissions::from_mode(mode))?;
        }
        fs::rename(&tmp, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp);
        return Err(WriteError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    if let Some(owner) = owner {
        chown_path(path, owner)?;
    }

    Ok(())
}

pub fn chown_path(path: &Path, owner: Owner) -> Result<(), WriteError> {
    chown(
        path,
        Some(Uid::from_raw(owner.uid)),
        Some(Gid::from_raw(owner.gid)),
    )
    .map_err(|source| WriteError::Chown {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_content_and_keeps_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bashrc");
        fs::write(&path, "old\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&path, "new\n", None, None).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
        // no temp file left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn explicit_mode_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("launch.sh");
        write_atomic(&path, "#!/bin/bash\n", Some(0o755), None).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn missing_parent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join(".bashrc");
        let err = write_atomic(&path, "x", None, None).unwrap_err();
        assert!(matches!(err, WriteError::MissingParent(_)));
        assert!(!path.exists());
    }

    #[test]
    fn chown_to_self_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owned");
        let owner = Owner {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        };
        write_atomic(&path, "x", None, Some(owner)).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn symlinked_file_is_updated_through_the_link() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("dotfiles_bashrc");
        let link = dir.path().join(".bashrc");
        fs::write(&real, "alias x=y\n").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        write_atomic(&link, "alias x=z\n", None, None).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_to_string(&real).unwrap(), "alias x=z\n");
        assert_eq!(fs::read_to_string(&link).unwrap(), "alias x=z\n");
    }

    #[test]
    fn dangling_link_creates_its_target() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join(".bashrc");
        std::os::unix::fs::symlink("dotfiles_bashrc", &link).unwrap();

        write_atomic(&link, "new\n", None, None).unwrap();

        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        let real = dir.path().join("dotfiles_bashrc");
        assert_eq!(fs::read_to_string(real).unwrap(), "new\n");
    }

    #[test]
    fn switch_command_carries_explicit_config() {
        let bin = Path::new("/usr/local/bin/frontend-switch");
        assert_eq!(
            switch_command(bin, None, "kodi"),
            "/usr/local/bin/frontend-switch switch kodi"
        );
        assert_eq!(
            switch_command(bin, Some(Path::new("/etc/fs.json")), "kodi"),
            "/usr/local/bin/frontend-switch --config /etc/fs.json switch kodi"
        );
    }
}
