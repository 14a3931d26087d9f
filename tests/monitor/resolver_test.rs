//! Path resolution against a real directory tree.

use std::path::PathBuf;

use playtime_monitor::monitor::resolve_watch_set;

use super::support::Fixture;

#[test]
fn test_missing_entry_fails_whole_pass() {
    let fixture = Fixture::new(&["game.bin"]);
    let spec = format!(
        "{};{}",
        fixture.path("game.bin").display(),
        fixture.path("missing.bin").display()
    );
    let err = resolve_watch_set(&spec).unwrap_err();
    assert!(err.is_configuration());
}

#[cfg(unix)]
#[test]
fn test_symlinks_followed_and_dangling_skipped() {
    use std::os::unix::fs::{symlink, PermissionsExt};

    let fixture = Fixture::new(&["real.bin"]);
    let target = fixture.path("real.bin");
    std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755)).unwrap();

    let dir = fixture.path("links");
    std::fs::create_dir(&dir).unwrap();
    symlink(&target, dir.join("launcher")).unwrap();
    symlink(fixture.path("gone.bin"), dir.join("broken")).unwrap();

    let set = resolve_watch_set(&dir.display().to_string()).unwrap();
    assert_eq!(set.paths(), vec![dir.join("launcher").as_path()]);
    // Processes started through the link report the target image.
    assert_eq!(set.names().into_iter().collect::<Vec<_>>(), vec!["real.bin"]);
}

#[cfg(unix)]
#[test]
fn test_file_and_directory_mix() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = Fixture::new(&["a"]);
    let dir = fixture.path("dir");
    std::fs::create_dir_all(dir.join("sub")).unwrap();
    for (name, mode) in [("b.bin", 0o755), ("readme.txt", 0o644), ("sub/c.bin", 0o700)] {
        let path = dir.join(name);
        std::fs::write(&path, b"").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).unwrap();
    }

    let spec = format!(" {} ; {} ", fixture.path("a").display(), dir.display());
    let set = resolve_watch_set(&spec).unwrap();

    let mut paths: Vec<PathBuf> = set.paths().into_iter().map(PathBuf::from).collect();
    paths.sort();
    let mut expected = vec![fixture.path("a"), dir.join("b.bin"), dir.join("sub/c.bin")];
    expected.sort();
    assert_eq!(paths, expected);
}
