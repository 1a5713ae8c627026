//! Unit tests for codec-backed decoders.

use std::time::Duration;

use rstest::{fixture, rstest};
use tokio::io::{AsyncWriteExt, DuplexStream, duplex};
use tokio_util::sync::CancellationToken;

use super::*;
use crate::transport::{StreamTransport, TransportError};

struct Link {
    transport: StreamTransport<DuplexStream>,
    host: DuplexStream,
    cancel: CancellationToken,
}

#[fixture]
fn link() -> Link {
    let (device, host) = duplex(256);
    Link {
        transport: StreamTransport::new("duplex", device),
        host,
        cancel: CancellationToken::new(),
    }
}

async fn opened(mut link: Link, read_timeout: Duration) -> Link {
    link.transport.set_read_timeout(read_timeout);
    link.transport
        .open(&link.cancel)
        .await
        .expect("open duplex transport");
    link
}

#[rstest]
#[tokio::test]
async fn lines_split_across_reads_are_joined(link: Link) {
    let mut link = opened(link, Duration::from_secs(5)).await;
    let mut decoder = LineDecoder::with_chunk_len(tokio_util::codec::LinesCodec::new(), 3);
    link.host.write_all(b"hello wor").await.expect("write");
    link.host.write_all(b"ld\n").await.expect("write");

    let line = decoder
        .read_message(&mut link.transport, &link.cancel)
        .await
        .expect("line");
    assert_eq!(line, "hello world");
    assert_eq!(decoder.buffered(), 0);
}

#[rstest]
#[tokio::test]
async fn one_read_with_many_lines_yields_them_in_order(link: Link) {
    let mut link = opened(link, Duration::from_secs(5)).await;
    let mut decoder = LineDecoder::lines();
    link.host.write_all(b"A\nB\nC\n").await.expect("write");
    drop(link.host);

    for expected in ["A", "B", "C"] {
        let line = decoder
            .read_message(&mut link.transport, &link.cancel)
            .await
            .expect("line");
        assert_eq!(line, expected);
    }
    assert!(matches!(
        decoder.read_message(&mut link.transport, &link.cancel).await,
        Err(DecodeError::EndOfStream)
    ));
}

#[rstest]
#[tokio::test]
async fn eof_mid_line_is_a_transport_fault(link: Link) {
    let mut link = opened(link, Duration::from_secs(5)).await;
    let mut decoder = LineDecoder::lines();
    link.host.write_all(b"partial").await.expect("write");
    drop(link.host);

    let err = decoder
        .read_message(&mut link.transport, &link.cancel)
        .await
        .expect_err("partial line must not decode");
    assert!(
        matches!(err, DecodeError::Transport(TransportError::Closed)),
        "got {err:?}"
    );
    assert!(!err.is_termination());
}

#[rstest]
#[tokio::test]
async fn cancellation_interrupts_the_wait(link: Link) {
    let mut link = opened(link, Duration::from_secs(5)).await;
    let mut decoder = LineDecoder::lines();
    let cancel = link.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
    });

    let err = decoder
        .read_message(&mut link.transport, &link.cancel)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, DecodeError::Cancelled));
    assert!(err.is_termination());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn idle_timeouts_keep_waiting(link: Link) {
    let mut link = opened(link, Duration::from_millis(10)).await;
    let mut decoder = LineDecoder::lines();
    let mut host = link.host;
    let writer = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        host.write_all(b"late\n").await.expect("write");
        host
    });

    let line = decoder
        .read_message(&mut link.transport, &link.cancel)
        .await
        .expect("line after idle polls");
    assert_eq!(line, "late");
    writer.await.expect("writer task");
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn timeout_mid_line_is_a_transport_fault(link: Link) {
    let mut link = opened(link, Duration::from_millis(10)).await;
    let mut decoder = LineDecoder::lines();
    link.host.write_all(b"stalled").await.expect("write");

    let err = decoder
        .read_message(&mut link.transport, &link.cancel)
        .await
        .expect_err("stalled line times out");
    assert!(
        matches!(&err, DecodeError::Transport(inner) if inner.is_timeout()),
        "got {err:?}"
    );
}

#[rstest]
#[tokio::test]
async fn overlong_lines_are_malformed(link: Link) {
    let mut link = opened(link, Duration::from_secs(5)).await;
    let mut decoder = LineDecoder::with_max_length(4);
    link.host.write_all(b"toolong\n").await.expect("write");

    let err = decoder
        .read_message(&mut link.transport, &link.cancel)
        .await
        .expect_err("line exceeds limit");
    assert!(matches!(err, DecodeError::Malformed(_)), "got {err:?}");
}

#[test]
fn malformed_wraps_the_cause() {
    let err = DecodeError::malformed("bad checksum");
    assert_eq!(err.to_string(), "malformed message: bad checksum");
    assert!(std::error::Error::source(&err).is_some());
}
