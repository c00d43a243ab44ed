//! Byte-level helper protocol tests plus end-to-end runs of the remote
//! engines through `CommandTransport` and the real helper binaries.

use blocksync::protocol::{self, serve_read, serve_write};
use blocksync::transport::{CommandTransport, Transport, remote_size};
use blocksync::{HashAlgo, Hooks, RemoteOpts, SyncOpts};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

fn fixture(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// --- framing primitives ---

#[test]
fn test_lines_and_numbers() {
    let mut input = Cursor::new(b"/dev/vda\n1048576\n".to_vec());
    assert_eq!(protocol::read_line(&mut input).unwrap(), "/dev/vda");
    assert_eq!(protocol::read_number(&mut input).unwrap(), 1_048_576);
    assert!(protocol::read_line(&mut input).is_err());
}

#[test]
fn test_directive_bytes() {
    let mut input = Cursor::new(vec![protocol::SKIP, protocol::DIFF, protocol::SAME]);
    assert_eq!(protocol::read_directive(&mut input).unwrap(), Some(protocol::SKIP));
    assert_eq!(protocol::read_directive(&mut input).unwrap(), Some(protocol::DIFF));
    // The legacy SAME token is not a valid directive on the wire.
    assert!(protocol::read_directive(&mut input).is_err());
    assert_eq!(protocol::read_directive(&mut input).unwrap(), None);
}

#[test]
fn test_exact_read_flags_short_streams() {
    let err = protocol::read_exact(&mut Cursor::new(b"abc".to_vec()), 5, "digest").unwrap_err();
    assert!(matches!(err, blocksync::SyncError::Protocol(_)));
}

#[test]
fn test_payload_read_stops_at_eof() {
    let payload = protocol::read_payload(&mut Cursor::new(b"abc".to_vec()), 8).unwrap();
    assert_eq!(payload, b"abc");
}

// --- read helper protocol ---

#[test]
fn test_read_helper_streams_size_digest_and_block() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"source content");

    let mut input = Cursor::new(
        [
            format!("{}\n", src.display()).into_bytes(),
            b"14\nsha256\n0\n1\n".to_vec(),
            vec![protocol::DIFF],
        ]
        .concat(),
    );
    let mut output = Vec::new();
    serve_read(&mut input, &mut output).unwrap();

    let digest = HashAlgo::Sha256.digest(b"source content");
    assert_eq!(&output[..3], b"14\n");
    assert_eq!(&output[3..35], digest.as_slice());
    assert_eq!(&output[35..], b"source content");
}

#[test]
fn test_read_helper_skip_emits_no_block() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"source content");

    let mut input = Cursor::new(
        [
            format!("{}\n", src.display()).into_bytes(),
            b"14\nsha256\n0\n1\n".to_vec(),
            vec![protocol::SKIP],
        ]
        .concat(),
    );
    let mut output = Vec::new();
    serve_read(&mut input, &mut output).unwrap();

    assert_eq!(output.len(), 3 + HashAlgo::Sha256.digest_len());
}

#[test]
fn test_read_helper_honors_startpos_and_short_block() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"0123456789abcde");

    // One 10-byte block starting at offset 10 leaves 5 bytes.
    let mut input = Cursor::new(
        [
            format!("{}\n", src.display()).into_bytes(),
            b"10\nsha256\n10\n1\n".to_vec(),
            vec![protocol::DIFF],
        ]
        .concat(),
    );
    let mut output = Vec::new();
    serve_read(&mut input, &mut output).unwrap();

    let digest = HashAlgo::Sha256.digest(b"abcde");
    assert_eq!(&output[..3], b"15\n");
    assert_eq!(&output[3..35], digest.as_slice());
    assert_eq!(&output[35..], b"abcde");
}

#[test]
fn test_read_helper_size_only_probe() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"12345");

    let mut input = Cursor::new(format!("{}\n", src.display()).into_bytes());
    let mut output = Vec::new();
    serve_read(&mut input, &mut output).unwrap();

    assert_eq!(output, b"5\n");
}

#[test]
fn test_read_helper_rejects_non_directive_byte() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"source content");

    let mut input = Cursor::new(
        [
            format!("{}\n", src.display()).into_bytes(),
            b"14\nsha256\n0\n1\n".to_vec(),
            b"x".to_vec(),
        ]
        .concat(),
    );
    let mut output = Vec::new();
    assert!(serve_read(&mut input, &mut output).is_err());
}

// --- write helper protocol ---

#[test]
fn test_write_helper_creates_and_writes_one_block() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("dest.img");

    let mut input = Cursor::new(
        [
            format!("{}\n20\n20\n0\n1\n", dest.display()).into_bytes(),
            vec![protocol::DIFF],
            b"aaaaaaaaaaaaaaaaaaaa".to_vec(),
        ]
        .concat(),
    );
    serve_write(&mut input).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"aaaaaaaaaaaaaaaaaaaa");
}

#[test]
fn test_write_helper_skip_leaves_content_alone() {
    let dir = TempDir::new().unwrap();
    let dest = fixture(&dir, "dest.img", b"xxxxyyyy");

    let mut input = Cursor::new(
        [
            format!("{}\n0\n4\n0\n2\n", dest.display()).into_bytes(),
            vec![protocol::SKIP],
            vec![protocol::DIFF],
            b"ZZZZ".to_vec(),
        ]
        .concat(),
    );
    serve_write(&mut input).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"xxxxZZZZ");
}

#[test]
fn test_write_helper_short_final_payload() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("dest.img");

    // 15-byte container, 10-byte blocks: the second payload is short and
    // the stream ends right after it.
    let mut input = Cursor::new(
        [
            format!("{}\n15\n10\n0\n2\n", dest.display()).into_bytes(),
            vec![protocol::DIFF],
            b"bbbbbbbbbb".to_vec(),
            vec![protocol::DIFF],
            b"ccccc".to_vec(),
        ]
        .concat(),
    );
    serve_write(&mut input).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"bbbbbbbbbbccccc");
}

#[test]
fn test_write_helper_honors_startpos() {
    let dir = TempDir::new().unwrap();
    let dest = fixture(&dir, "dest.img", b"00000000");

    let mut input = Cursor::new(
        [
            format!("{}\n0\n4\n4\n1\n", dest.display()).into_bytes(),
            vec![protocol::DIFF],
            b"WXYZ".to_vec(),
        ]
        .concat(),
    );
    serve_write(&mut input).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"0000WXYZ");
}

#[test]
fn test_write_helper_truncates_to_create_size() {
    let dir = TempDir::new().unwrap();
    let dest = fixture(&dir, "dest.img", b"way too long for the source");

    let mut input = Cursor::new(format!("{}\n5\n5\n0\n0\n", dest.display()).into_bytes());
    serve_write(&mut input).unwrap();

    assert_eq!(std::fs::metadata(&dest).unwrap().len(), 5);
}

// --- transport ---

fn local_transport() -> Arc<dyn Transport> {
    Arc::new(CommandTransport::local())
}

fn read_helper_command() -> String {
    format!("'{}'", env!("CARGO_BIN_EXE_blocksync-read-helper"))
}

fn write_helper_command() -> String {
    format!("'{}'", env!("CARGO_BIN_EXE_blocksync-write-helper"))
}

fn helper_opts() -> RemoteOpts {
    RemoteOpts {
        read_helper_command: Some(read_helper_command()),
        write_helper_command: Some(write_helper_command()),
        helper_dir: None,
    }
}

#[test]
fn test_remote_size_probe() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"0123456789012345678");

    let transport = local_transport();
    let size = remote_size(
        transport.as_ref(),
        &read_helper_command(),
        &src.display().to_string(),
    )
    .unwrap();
    assert_eq!(size, 19);
}

#[test]
fn test_upload_makes_an_executable_copy() {
    let dir = TempDir::new().unwrap();
    let payload = fixture(&dir, "payload", b"#!/bin/sh\necho hi\n");
    let uploaded = dir.path().join("uploaded");

    let transport = local_transport();
    transport
        .upload(&payload, &uploaded.display().to_string())
        .unwrap();

    assert_eq!(std::fs::read(&uploaded).unwrap(), b"#!/bin/sh\necho hi\n");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&uploaded).unwrap().permissions().mode();
        assert_ne!(mode & 0o111, 0, "uploaded helper is not executable");
    }
}

// --- local -> remote engine ---

fn push(src: &Path, dest: &Path, opts: &SyncOpts) -> blocksync::SyncHandle {
    blocksync::local_to_remote(
        src,
        &dest.display().to_string(),
        local_transport(),
        &helper_opts(),
        opts,
        Hooks::new(),
    )
    .unwrap()
}

fn pull(src: &Path, dest: &Path, opts: &SyncOpts) -> blocksync::SyncHandle {
    blocksync::remote_to_local(
        &src.display().to_string(),
        dest,
        local_transport(),
        &helper_opts(),
        opts,
        Hooks::new(),
    )
    .unwrap()
}

fn wait_opts(block_size: u64, workers: usize) -> SyncOpts {
    SyncOpts {
        block_size: block_size.into(),
        workers,
        wait: true,
        ..SyncOpts::default()
    }
}

#[test]
fn test_push_rewrites_only_diff_blocks() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"aaaaaaaaaabbbbbbbbbbcccccccccc");
    let dest = fixture(&dir, "dest", b"aaaaaaaaaaXXXXXXXXXXcccccccccc");

    let handle = push(&src, &dest, &wait_opts(10, 1));

    let blocks = handle.status().blocks();
    assert_eq!((blocks.same, blocks.diff, blocks.done), (2, 1, 3));
    assert_eq!(std::fs::read(&dest).unwrap(), b"aaaaaaaaaabbbbbbbbbbcccccccccc");
    assert_eq!(handle.status().dest_size(), 30);
}

#[test]
fn test_push_parallel_with_short_final_block() {
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..10_010u32).map(|i| (i % 251) as u8).collect();
    let src = fixture(&dir, "src", &content);
    let dest = fixture(&dir, "dest", &vec![0u8; 10_010]);

    let handle = push(&src, &dest, &wait_opts(1024, 3));

    handle.wait();
    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[test]
fn test_push_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"0123456789abcdef0123456789abcdef0");
    let dest = fixture(&dir, "dest", b"XXXXXXXXXXabcdef0123456789abcdeXX");

    let opts = wait_opts(8, 2);
    push(&src, &dest, &opts);
    assert_eq!(std::fs::read(&dest).unwrap(), std::fs::read(&src).unwrap());

    let handle = push(&src, &dest, &opts);
    assert_eq!(handle.status().blocks().diff, 0);
}

#[test]
fn test_push_dryrun_never_writes() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"aaaaaaaaaabbbbbbbbbb");
    let dest = fixture(&dir, "dest", b"aaaaaaaaaaXXXXXXXXXX");

    let opts = SyncOpts {
        dryrun: true,
        ..wait_opts(10, 1)
    };
    let handle = push(&src, &dest, &opts);

    let blocks = handle.status().blocks();
    assert_eq!((blocks.same, blocks.diff), (1, 1));
    assert_eq!(std::fs::read(&dest).unwrap(), b"aaaaaaaaaaXXXXXXXXXX");
}

#[test]
fn test_push_create_dest_builds_the_destination() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"built from scratch over the wire");
    let dest = dir.path().join("dest");

    let opts = SyncOpts {
        create_dest: true,
        ..wait_opts(8, 2)
    };
    push(&src, &dest, &opts);

    assert_eq!(std::fs::read(&dest).unwrap(), b"built from scratch over the wire");
}

#[test]
fn test_push_with_blake3() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"aaaaaaaaaabbbbbbbbbb");
    let dest = fixture(&dir, "dest", b"aaaaaaaaaaXXXXXXXXXX");

    let opts = SyncOpts {
        hash: HashAlgo::Blake3,
        ..wait_opts(10, 1)
    };
    let handle = push(&src, &dest, &opts);

    let blocks = handle.status().blocks();
    assert_eq!((blocks.same, blocks.diff), (1, 1));
    assert_eq!(std::fs::read(&dest).unwrap(), b"aaaaaaaaaabbbbbbbbbb");
}

#[test]
fn test_push_failing_reader_reports_error_hook() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"aaaaaaaaaabbbbbbbbbb");
    let dest = fixture(&dir, "dest", b"aaaaaaaaaabbbbbbbbbb");

    let errors = Arc::new(AtomicUsize::new(0));
    let hooks = Hooks::new().on_error({
        let errors = Arc::clone(&errors);
        move |_, _| {
            errors.fetch_add(1, Ordering::SeqCst);
        }
    });

    let remote = RemoteOpts {
        read_helper_command: Some("false".to_string()),
        write_helper_command: Some("cat > /dev/null".to_string()),
        helper_dir: None,
    };
    let handle = blocksync::local_to_remote(
        &src,
        &dest.display().to_string(),
        local_transport(),
        &remote,
        &wait_opts(10, 1),
        hooks,
    )
    .unwrap();

    assert!(handle.finished());
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(handle.status().blocks().done, 0);
}

// --- remote -> local engine ---

#[test]
fn test_pull_rewrites_only_diff_blocks() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"aaaaaaaaaabbbbbbbbbbcccccccccc");
    let dest = fixture(&dir, "dest", b"aaaaaaaaaaXXXXXXXXXXcccccccccc");

    let handle = pull(&src, &dest, &wait_opts(10, 1));

    let blocks = handle.status().blocks();
    assert_eq!((blocks.same, blocks.diff, blocks.done), (2, 1, 3));
    assert_eq!(std::fs::read(&dest).unwrap(), b"aaaaaaaaaabbbbbbbbbbcccccccccc");
}

#[test]
fn test_pull_parallel_with_short_final_block() {
    let dir = TempDir::new().unwrap();
    let content: Vec<u8> = (0..10_010u32).map(|i| (i % 241) as u8).collect();
    let src = fixture(&dir, "src", &content);
    let dest = fixture(&dir, "dest", &vec![0u8; 10_010]);

    pull(&src, &dest, &wait_opts(1024, 3));

    assert_eq!(std::fs::read(&dest).unwrap(), content);
}

#[test]
fn test_pull_dryrun_never_writes() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"aaaaaaaaaabbbbbbbbbb");
    let dest = fixture(&dir, "dest", b"aaaaaaaaaaXXXXXXXXXX");

    let opts = SyncOpts {
        dryrun: true,
        ..wait_opts(10, 1)
    };
    let handle = pull(&src, &dest, &opts);

    let blocks = handle.status().blocks();
    assert_eq!((blocks.same, blocks.diff), (1, 1));
    assert_eq!(std::fs::read(&dest).unwrap(), b"aaaaaaaaaaXXXXXXXXXX");
}

#[test]
fn test_pull_create_dest_builds_the_destination() {
    let dir = TempDir::new().unwrap();
    let src = fixture(&dir, "src", b"pulled into a fresh container");
    let dest = dir.path().join("dest");

    let opts = SyncOpts {
        create_dest: true,
        ..wait_opts(8, 2)
    };
    let handle = pull(&src, &dest, &opts);

    assert_eq!(std::fs::read(&dest).unwrap(), b"pulled into a fresh container");
    assert_eq!(handle.status().src_size(), 29);
}

#[test]
fn test_pull_missing_remote_source_fails_fast() {
    let dir = TempDir::new().unwrap();
    let dest = fixture(&dir, "dest", b"whatever");
    let missing = dir.path().join("nope");

    let result = blocksync::remote_to_local(
        &missing.display().to_string(),
        &dest,
        local_transport(),
        &helper_opts(),
        &wait_opts(4, 1),
        Hooks::new(),
    );
    assert!(result.is_err());
}
