/*!
 * System Adapter Tests
 * Local disk backend driven through the filesystem service
 */

use bytes::Bytes;
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

use ai_os_vfs::vfs::types::*;
use ai_os_vfs::vfs::ListingOptions;
use ai_os_vfs::{Filesystem, VfsConfig};

use crate::support::user;

async fn home_on(dir: &Path) -> Filesystem {
    let fs = Filesystem::builder()
        .with_config(VfsConfig::default().without_watch())
        .build();
    let root = format!("{}/{{username}}", dir.display());
    fs.mount(MountSpec::new("home").with_root(root)).await.unwrap();
    fs
}

fn names(entries: &[DirEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.filename.as_str()).collect()
}

#[tokio::test]
async fn test_per_user_roots() {
    let dir = TempDir::new().unwrap();
    let fs = home_on(dir.path()).await;
    let router = fs.router();
    let (amy, bob) = (user("amy", &[]), user("bob", &[]));

    let written = router
        .writefile(&amy, "home:/docs/a.txt", Bytes::from_static(b"amy's"))
        .await
        .unwrap();
    assert_eq!(written, 5);
    assert_eq!(
        std::fs::read(dir.path().join("amy/docs/a.txt")).unwrap(),
        b"amy's".to_vec()
    );

    let err = router.readfile(&bob, "home:/docs/a.txt").await.unwrap_err();
    assert_eq!(err.code(), "not_found");

    let realpath = fs.realpath("home:/docs/a.txt", Some(&amy)).unwrap();
    assert_eq!(Path::new(&realpath), dir.path().join("amy/docs/a.txt"));
}

#[tokio::test]
async fn test_unusable_usernames_are_denied() {
    let dir = TempDir::new().unwrap();
    let fs = home_on(dir.path()).await;

    for name in ["", "..", "a/b"] {
        let err = fs
            .router()
            .writefile(&user(name, &[]), "home:/x.txt", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "permission_denied", "username {:?}", name);
    }
    assert!(fs.realpath("home:/x.txt", None).is_err());
}

#[tokio::test]
async fn test_traversal_stays_inside_root() {
    let dir = TempDir::new().unwrap();
    let fs = home_on(dir.path()).await;
    let amy = user("amy", &[]);

    fs.router()
        .writefile(&amy, "home:/../bob/evil.txt", Bytes::from_static(b"x"))
        .await
        .unwrap();

    assert!(!dir.path().join("bob/evil.txt").exists());
    assert!(dir.path().join("amy/bob/evil.txt").exists());

    let realpath = fs.realpath("home:/../../../etc/passwd", Some(&amy)).unwrap();
    assert_eq!(Path::new(&realpath), dir.path().join("amy/etc/passwd"));
}

#[tokio::test]
async fn test_listing_and_stat() {
    let dir = TempDir::new().unwrap();
    let fs = home_on(dir.path()).await;
    let router = fs.router();
    let amy = user("amy", &[]);

    for path in ["home:/docs/zeta.md", "home:/docs/Alpha.txt", "home:/docs/.secret"] {
        router.writefile(&amy, path, Bytes::from_static(b"abc")).await.unwrap();
    }
    router.mkdir(&amy, "home:/docs/sub").await.unwrap();

    let listing = router
        .readdir(&amy, "home:/docs", &ListingOptions::default())
        .await
        .unwrap();
    assert_eq!(names(&listing), vec!["..", "sub", "Alpha.txt", "zeta.md"]);
    assert_eq!(listing[1].path, "home:/docs/sub");
    assert_eq!(listing[2].mime.as_deref(), Some("text/plain"));
    assert_eq!(listing[2].size, 3);

    let hidden = router
        .readdir(&amy, "home:/docs", &ListingOptions::default().with_hidden())
        .await
        .unwrap();
    assert_eq!(hidden.len(), 5);

    let entry = router.stat(&amy, "home:/docs/Alpha.txt").await.unwrap();
    assert!(entry.is_file);
    assert_eq!(entry.filename, "Alpha.txt");
    assert!(entry.stat.mtime.is_some());

    let err = router
        .readdir(&amy, "home:/docs/Alpha.txt", &ListingOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_a_directory");
    let err = router.readfile(&amy, "home:/docs").await.unwrap_err();
    assert_eq!(err.code(), "is_a_directory");
}

#[tokio::test]
async fn test_copy_rename_unlink() {
    let dir = TempDir::new().unwrap();
    let fs = home_on(dir.path()).await;
    let router = fs.router();
    let amy = user("amy", &[]);

    router
        .writefile(&amy, "home:/project/src/main.rs", Bytes::from_static(b"fn main() {}"))
        .await
        .unwrap();
    router
        .writefile(&amy, "home:/project/README", Bytes::from_static(b"readme"))
        .await
        .unwrap();

    router.copy(&amy, "home:/project", "home:/backup/project").await.unwrap();
    assert_eq!(
        router.readfile(&amy, "home:/backup/project/src/main.rs").await.unwrap(),
        Bytes::from_static(b"fn main() {}")
    );
    assert!(router.exists(&amy, "home:/project/README").await.unwrap());

    router
        .rename(&amy, "home:/project/README", "home:/notes/README.md")
        .await
        .unwrap();
    assert!(!router.exists(&amy, "home:/project/README").await.unwrap());
    assert!(router.exists(&amy, "home:/notes/README.md").await.unwrap());

    router.unlink(&amy, "home:/backup").await.unwrap();
    assert!(!dir.path().join("amy/backup").exists());

    let err = router.unlink(&amy, "home:/").await.unwrap_err();
    assert_eq!(err.code(), "invalid_path");
    let err = router.unlink(&amy, "home:/missing").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_search() {
    let dir = TempDir::new().unwrap();
    let fs = home_on(dir.path()).await;
    let router = fs.router();
    let amy = user("amy", &[]);

    for path in [
        "home:/a/Invoice-2023.pdf",
        "home:/a/b/invoice-2024.pdf",
        "home:/a/b/c/notes.txt",
        "home:/invoices/readme.txt",
    ] {
        router.writefile(&amy, path, Bytes::from_static(b"x")).await.unwrap();
    }

    let mut found = router.search(&amy, "home:/", "invoice").await.unwrap();
    found.sort_by(|a, b| a.path.cmp(&b.path));
    let paths: Vec<&str> = found.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["home:/a/Invoice-2023.pdf", "home:/a/b/invoice-2024.pdf", "home:/invoices"]
    );
    assert!(found[2].is_directory);
    assert_eq!(found[0].mime.as_deref(), Some("application/pdf"));

    let scoped = router.search(&amy, "home:/a/b", "notes").await.unwrap();
    assert_eq!(names(&scoped), vec!["notes.txt"]);
}

#[tokio::test]
async fn test_download_from_disk() {
    let dir = TempDir::new().unwrap();
    let fs = home_on(dir.path()).await;
    let amy = user("amy", &[]);

    std::fs::create_dir_all(dir.path().join("amy")).unwrap();
    std::fs::write(dir.path().join("amy/photo.png"), b"\x89PNG").unwrap();

    let response = fs
        .call(
            CallOptions::new(VfsMethod::Download).as_user(amy),
            vec!["home:/photo.png".into()],
        )
        .await
        .unwrap();
    match response {
        VfsResponse::Download(download) => {
            assert_eq!(download.filename, "photo.png");
            assert_eq!(download.mime, "image/png");
            assert_eq!(download.bytes.len(), 4);
        }
        other => panic!("unexpected response {:?}", other),
    }
}
