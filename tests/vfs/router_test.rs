/*!
 * Request Router Tests
 * Capability gating, access checks and cross-adapter transfers
 */

use bytes::Bytes;
use pretty_assertions::assert_eq;
use serde_json::json;

use ai_os_vfs::vfs::types::*;
use ai_os_vfs::vfs::ListingOptions;

use crate::support::{filesystem_with, user, Counting};

fn read_stat() -> CapabilitySet {
    CapabilitySet::empty()
        .with(Capability::Read)
        .with(Capability::Stat)
}

#[tokio::test]
async fn test_unsupported_operation_does_no_io() {
    let counting = Counting::new(read_stat());
    let fs = filesystem_with(counting.clone());
    fs.mount(MountSpec::new("c").with_adapter("counting")).await.unwrap();

    let router = fs.router();
    let amy = user("amy", &[]);

    let err = router
        .writefile(&amy, "c:/a.txt", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "unsupported_operation");

    assert_eq!(router.mkdir(&amy, "c:/dir").await.unwrap_err().code(), "unsupported_operation");
    assert_eq!(router.unlink(&amy, "c:/a.txt").await.unwrap_err().code(), "unsupported_operation");
    assert_eq!(router.search(&amy, "c:/", "a").await.unwrap_err().code(), "unsupported_operation");
    assert_eq!(
        router
            .readdir(&amy, "c:/", &ListingOptions::default())
            .await
            .unwrap_err()
            .code(),
        "unsupported_operation"
    );
    assert_eq!(router.copy(&amy, "c:/a", "c:/b").await.unwrap_err().code(), "unsupported_operation");
    assert_eq!(counting.calls(), 0);

    // Declared operations do reach the adapter
    assert!(!router.exists(&amy, "c:/a.txt").await.unwrap());
    assert_eq!(counting.calls(), 1);
}

#[tokio::test]
async fn test_capabilities_reflect_adapter_and_read_only() {
    let counting = Counting::new(CapabilitySet::all());
    let fs = filesystem_with(counting);
    fs.mount(MountSpec::new("rw").with_adapter("counting")).await.unwrap();
    fs.mount(MountSpec::new("ro").with_adapter("counting").read_only())
        .await
        .unwrap();

    let anyone = CallerIdentity::anonymous();
    let rw = fs.router().capabilities(&anyone, "rw:/").unwrap();
    assert_eq!(rw, CapabilitySet::all());

    let ro = fs.router().capabilities(&anyone, "ro:/").unwrap();
    assert!(ro.contains(Capability::Read));
    assert!(ro.contains(Capability::Readdir));
    assert!(!ro.contains(Capability::Write));
    assert!(!ro.contains(Capability::Unlink));
}

#[tokio::test]
async fn test_permission_denied_before_io() {
    let counting = Counting::new(CapabilitySet::all());
    let fs = filesystem_with(counting.clone());
    fs.mount(
        MountSpec::new("admins")
            .with_adapter("counting")
            .with_groups(["admin", "ops"], GroupPolicy::All),
    )
    .await
    .unwrap();
    fs.mount(
        MountSpec::new("staff")
            .with_adapter("counting")
            .with_groups(["admin", "ops"], GroupPolicy::Any),
    )
    .await
    .unwrap();

    let router = fs.router();
    let bob = user("bob", &["ops"]);

    let err = router.readfile(&bob, "admins:/secret.txt").await.unwrap_err();
    assert_eq!(err.code(), "permission_denied");
    let err = router
        .writefile(&bob, "admins:/x", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "permission_denied");
    assert_eq!(counting.calls(), 0);

    // One matching group is enough under the "any" policy
    let err = router.readfile(&bob, "staff:/missing.txt").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
    assert_eq!(counting.calls(), 1);

    let root = user("root", &["admin", "ops"]);
    router
        .writefile(&root, "admins:/secret.txt", Bytes::from_static(b"s3cret"))
        .await
        .unwrap();
    assert_eq!(
        router.readfile(&root, "admins:/secret.txt").await.unwrap(),
        Bytes::from_static(b"s3cret")
    );
}

#[tokio::test]
async fn test_read_only_mount_rejects_writes() {
    let counting = Counting::new(CapabilitySet::all());
    let fs = filesystem_with(counting.clone());
    fs.mount(MountSpec::new("osjs").with_adapter("counting").read_only())
        .await
        .unwrap();

    let router = fs.router();
    let amy = user("amy", &[]);

    for err in [
        router
            .writefile(&amy, "osjs:/a.txt", Bytes::from_static(b"x"))
            .await
            .unwrap_err(),
        router.mkdir(&amy, "osjs:/dir").await.unwrap_err(),
        router.unlink(&amy, "osjs:/a.txt").await.unwrap_err(),
        router.rename(&amy, "osjs:/a.txt", "osjs:/b.txt").await.unwrap_err(),
        router.copy(&amy, "osjs:/a.txt", "osjs:/b.txt").await.unwrap_err(),
    ] {
        assert_eq!(err.code(), "read_only");
    }
    assert_eq!(counting.calls(), 0);

    let listing = router
        .readdir(&amy, "osjs:/", &ListingOptions::default())
        .await
        .unwrap();
    assert!(listing.is_empty());
}

#[tokio::test]
async fn test_unknown_mount_and_bad_requests() {
    let counting = Counting::new(CapabilitySet::all());
    let fs = filesystem_with(counting.clone());
    fs.mount(MountSpec::new("c").with_adapter("counting")).await.unwrap();
    let anyone = CallerIdentity::anonymous();

    let err = fs.router().readfile(&anyone, "nowhere:/a").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
    let err = fs.router().readfile(&anyone, "/a").await.unwrap_err();
    assert_eq!(err.code(), "not_found");

    let err = fs
        .request(VfsMethod::Readfile, VfsRequest::new(anyone.clone()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_argument");

    let err = fs
        .request(
            VfsMethod::Readfile,
            VfsRequest::new(anyone.clone()).with_field("path", ""),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_path");

    let err = fs
        .request(
            VfsMethod::Writefile,
            VfsRequest::new(anyone).with_field("path", "c:/a.txt"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid_argument");
    assert_eq!(counting.calls(), 0);
}

#[tokio::test]
async fn test_call_and_request_round_trip() {
    let fs = filesystem_with(Counting::new(CapabilitySet::all()));
    fs.mount(MountSpec::new("tmp").with_adapter("memory")).await.unwrap();
    let amy = user("amy", &[]);

    let written = fs
        .call(
            CallOptions::new(VfsMethod::Writefile).as_user(amy.clone()),
            vec!["tmp:/notes/hello.txt".into(), b"hello".to_vec().into()],
        )
        .await
        .unwrap();
    assert_eq!(written, VfsResponse::Written(5));

    let read = fs
        .call(
            CallOptions::new(VfsMethod::Readfile).as_user(amy.clone()),
            vec!["tmp:/notes/hello.txt".into()],
        )
        .await
        .unwrap();
    assert_eq!(
        read,
        VfsResponse::Data {
            mime: "text/plain".into(),
            bytes: Bytes::from_static(b"hello"),
        }
    );

    let listing = fs
        .request(
            VfsMethod::Readdir,
            VfsRequest::new(amy.clone())
                .with_field("path", "tmp:/notes")
                .with_field("options", json!({"showHiddenFiles": true})),
        )
        .await
        .unwrap()
        .into_entries()
        .unwrap();
    let names: Vec<&str> = listing.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["..", "hello.txt"]);

    let exists = fs
        .call(
            CallOptions::new(VfsMethod::Exists).as_user(amy),
            vec!["tmp:/notes/nope.txt".into()],
        )
        .await
        .unwrap();
    assert_eq!(exists.to_json(), Some(json!(false)));
}

#[tokio::test]
async fn test_stat_exists_and_mime() {
    let fs = filesystem_with(Counting::new(CapabilitySet::all()));
    fs.mount(MountSpec::new("tmp").with_adapter("memory")).await.unwrap();
    let router = fs.router();
    let amy = user("amy", &[]);

    assert!(!router.exists(&amy, "tmp:/photo.png").await.unwrap());
    router
        .writefile(&amy, "tmp:/photo.png", Bytes::from_static(b"\x89PNG"))
        .await
        .unwrap();
    assert!(router.exists(&amy, "tmp:/photo.png").await.unwrap());

    let entry = router.stat(&amy, "tmp:/photo.png").await.unwrap();
    assert!(entry.is_file);
    assert_eq!(entry.size, 4);
    assert_eq!(entry.mime.as_deref(), Some("image/png"));
    assert_eq!(entry.path, "tmp:/photo.png");

    assert_eq!(fs.mime("archive.zip"), "application/zip");
}

#[tokio::test]
async fn test_url_and_download() {
    let fs = filesystem_with(Counting::new(CapabilitySet::all()));
    fs.mount(MountSpec::new("tmp").with_adapter("memory")).await.unwrap();
    let router = fs.router();
    let amy = user("amy", &[]);

    let url = router.url(&amy, "tmp:/a b.txt").unwrap();
    assert_eq!(url, "/vfs/readfile?path=tmp%3A%2Fa+b.txt");

    router
        .writefile(&amy, "tmp:/docs/report.txt", Bytes::from_static(b"quarterly"))
        .await
        .unwrap();
    let download = router.download(&amy, "tmp:/docs/report.txt").await.unwrap();
    assert_eq!(download.filename, "report.txt");
    assert_eq!(download.mime, "text/plain");
    assert_eq!(download.bytes, Bytes::from_static(b"quarterly"));
    assert_eq!(download.disposition(), "attachment; filename=\"report.txt\"");
}

#[tokio::test]
async fn test_search_annotates_results() {
    let fs = filesystem_with(Counting::new(CapabilitySet::all()));
    fs.mount(MountSpec::new("tmp").with_adapter("memory")).await.unwrap();
    let router = fs.router();
    let amy = user("amy", &[]);

    for path in ["tmp:/docs/Report.pdf", "tmp:/docs/notes.txt", "tmp:/old/report-2019.pdf"] {
        router.writefile(&amy, path, Bytes::from_static(b"x")).await.unwrap();
    }

    let mut found: Vec<DirEntry> = router.search(&amy, "tmp:/", "REPORT").await.unwrap();
    found.sort_by(|a, b| a.path.cmp(&b.path));
    let paths: Vec<&str> = found.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["tmp:/docs/Report.pdf", "tmp:/old/report-2019.pdf"]);
    assert!(found
        .iter()
        .all(|e| e.mime.as_deref() == Some("application/pdf")));
}

#[tokio::test]
async fn test_cross_adapter_copy_and_rename() {
    let counting = Counting::new(CapabilitySet::all());
    let fs = filesystem_with(counting.clone());
    fs.mount(MountSpec::new("tmp").with_adapter("memory")).await.unwrap();
    fs.mount(MountSpec::new("c").with_adapter("counting")).await.unwrap();

    let router = fs.router();
    let amy = user("amy", &[]);
    router
        .writefile(&amy, "tmp:/a.txt", Bytes::from_static(b"payload"))
        .await
        .unwrap();

    router.copy(&amy, "tmp:/a.txt", "c:/b.txt").await.unwrap();
    assert_eq!(counting.calls(), 1);
    assert_eq!(
        router.readfile(&amy, "c:/b.txt").await.unwrap(),
        Bytes::from_static(b"payload")
    );
    assert!(router.exists(&amy, "tmp:/a.txt").await.unwrap());

    let before = counting.calls();
    router.rename(&amy, "c:/b.txt", "tmp:/moved.txt").await.unwrap();
    assert_eq!(counting.calls() - before, 2);
    assert!(!router.exists(&amy, "c:/b.txt").await.unwrap());
    assert_eq!(
        router.readfile(&amy, "tmp:/moved.txt").await.unwrap(),
        Bytes::from_static(b"payload")
    );
}

#[tokio::test]
async fn test_cross_adapter_checks_precede_io() {
    let counting = Counting::new(read_stat());
    let fs = filesystem_with(counting.clone());
    fs.mount(MountSpec::new("tmp").with_adapter("memory")).await.unwrap();
    fs.mount(MountSpec::new("c").with_adapter("counting")).await.unwrap();
    fs.mount(MountSpec::new("ro").with_adapter("memory").read_only())
        .await
        .unwrap();

    let router = fs.router();
    let amy = user("amy", &[]);
    router
        .writefile(&amy, "tmp:/a.txt", Bytes::from_static(b"x"))
        .await
        .unwrap();

    // Destination cannot be written
    let err = router.copy(&amy, "tmp:/a.txt", "c:/a.txt").await.unwrap_err();
    assert_eq!(err.code(), "unsupported_operation");

    // Source cannot be unlinked, so nothing is read either
    let err = router.rename(&amy, "c:/a.txt", "tmp:/b.txt").await.unwrap_err();
    assert_eq!(err.code(), "unsupported_operation");
    assert_eq!(counting.calls(), 0);

    // Moving out of a read-only mount is a write on the source
    let err = router.rename(&amy, "ro:/a.txt", "tmp:/b.txt").await.unwrap_err();
    assert_eq!(err.code(), "read_only");
    assert!(router.exists(&amy, "tmp:/a.txt").await.unwrap());
}

#[tokio::test]
async fn test_same_adapter_rename_between_mounts() {
    let fs = filesystem_with(Counting::new(CapabilitySet::all()));
    fs.mount(MountSpec::new("one").with_adapter("memory")).await.unwrap();
    fs.mount(MountSpec::new("two").with_adapter("memory")).await.unwrap();

    let router = fs.router();
    let amy = user("amy", &[]);
    router
        .writefile(&amy, "one:/dir/a.txt", Bytes::from_static(b"x"))
        .await
        .unwrap();
    router.rename(&amy, "one:/dir", "two:/moved").await.unwrap();

    assert!(!router.exists(&amy, "one:/dir").await.unwrap());
    assert!(router.exists(&amy, "two:/moved/a.txt").await.unwrap());
}

#[tokio::test]
async fn test_readdir_directories_first() {
    let fs = filesystem_with(Counting::new(CapabilitySet::all()));
    fs.mount(MountSpec::new("tmp").with_adapter("memory")).await.unwrap();
    let router = fs.router();
    let amy = user("amy", &[]);

    for path in ["tmp:/docs/z.txt", "tmp:/docs/sub/a.txt", "tmp:/docs/B.txt", "tmp:/docs/.hidden"] {
        router.writefile(&amy, path, Bytes::from_static(b"xx")).await.unwrap();
    }
    router.mkdir(&amy, "tmp:/docs/Alpha").await.unwrap();

    let listing = router
        .readdir(&amy, "tmp:/docs", &ListingOptions::default())
        .await
        .unwrap();
    let names: Vec<&str> = listing.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["..", "Alpha", "sub", "B.txt", "z.txt"]);
    assert_eq!(listing[0].path, "tmp:/");
    assert_eq!(listing[3].mime.as_deref(), Some("text/plain"));
    assert!(listing[1].mime.is_none());
    assert_eq!(listing[3].human_size.as_deref(), Some("2 B"));

    let root = router
        .readdir(&amy, "tmp:/", &ListingOptions::default())
        .await
        .unwrap();
    let names: Vec<&str> = root.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["docs"]);
}
