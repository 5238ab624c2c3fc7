//! Transports carrying GMP commands to gvmd

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{Command, Credentials, GmpError, GmpResponse, authenticate_command};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one command and return the raw response document
    async fn send(&self, command: &Command) -> Result<String, GmpError>;
}

/// GMP over the gvmd Unix domain socket
///
/// The connection is opened on first use and authenticated with the carried
/// credentials. Commands on one transport are strictly serialized. Any error
/// drops the connection so the next command starts from a fresh session.
pub struct UnixSocketTransport {
    path: PathBuf,
    credentials: Option<Credentials>,
    timeout: Duration,
    stream: Mutex<Option<UnixStream>>,
}

impl UnixSocketTransport {
    pub fn new(path: PathBuf, credentials: Option<Credentials>, timeout: Duration) -> Self {
        Self {
            path,
            credentials,
            timeout,
            stream: Mutex::new(None),
        }
    }

    async fn connect(&self) -> Result<UnixStream, GmpError> {
        debug!(path = %self.path.display(), "Connecting to gvmd");
        let mut stream = UnixStream::connect(&self.path).await?;

        if let Some(credentials) = &self.credentials {
            let raw = exchange(&mut stream, &authenticate_command(credentials)).await?;
            GmpResponse::parse(raw)?;
            debug!(username = %credentials.username, "Authenticated GMP session");
        }
        Ok(stream)
    }

    async fn send_inner(&self, command: &Command) -> Result<String, GmpError> {
        let mut guard = self.stream.lock().await;

        if guard.is_none() {
            *guard = Some(self.connect().await?);
        }
        let Some(stream) = guard.as_mut() else {
            return Err(GmpError::ConnectionClosed);
        };

        let result = exchange(stream, command).await;
        if result.is_err() {
            *guard = None;
        }
        result
    }
}

#[async_trait]
impl Transport for UnixSocketTransport {
    async fn send(&self, command: &Command) -> Result<String, GmpError> {
        match tokio::time::timeout(self.timeout, self.send_inner(command)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(command = command.name(), "GMP command timed out");
                // The half-read response would poison the stream
                *self.stream.lock().await = None;
                Err(GmpError::Timeout)
            }
        }
    }
}

async fn exchange(stream: &mut UnixStream, command: &Command) -> Result<String, GmpError> {
    let mut request = Vec::new();
    command.write_to(&mut request)?;
    stream.write_all(&request).await?;

    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 8192];
    let mut framer = Framer::default();
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(GmpError::ConnectionClosed);
        }
        buf.extend_from_slice(&chunk[..n]);
        if framer.feed(&buf) {
            break;
        }
    }

    String::from_utf8(buf)
        .map_err(|_| GmpError::UnexpectedResponse("response is not valid UTF-8".into()))
}

/// Detects the end of a response as it arrives
///
/// gvmd does not frame responses, so the only end marker is the root element
/// closing. Each call resumes after the last complete event, so every byte is
/// parsed about once. A parse error means the buffer ends mid-token and more
/// is needed.
#[derive(Debug, Default)]
struct Framer {
    /// Bytes of the buffer consumed by complete events
    scanned: usize,
    depth: usize,
}

impl Framer {
    /// Scan what `buf` gained since the last call; true once the root closed
    fn feed(&mut self, buf: &[u8]) -> bool {
        let base = self.scanned;
        let mut reader = Reader::from_reader(&buf[base..]);
        reader.config_mut().check_end_names = false;

        loop {
            let done = match reader.read_event() {
                Ok(Event::Start(_)) => {
                    self.depth += 1;
                    false
                }
                Ok(Event::End(_)) => {
                    self.depth = self.depth.saturating_sub(1);
                    self.depth == 0
                }
                Ok(Event::Empty(_)) => self.depth == 0,
                Ok(Event::Eof) | Err(_) => return false,
                Ok(_) => false,
            };
            self.scanned = base + usize::try_from(reader.buffer_position()).unwrap_or(0);
            if done {
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::UnixListener;

    fn response_complete(buf: &[u8]) -> bool {
        Framer::default().feed(buf)
    }

    #[test]
    fn test_response_complete() {
        assert!(response_complete(b"<a status=\"200\"/>"));
        assert!(response_complete(b"<a><b/><c>x</c></a>"));
        assert!(!response_complete(b"<a><b/><c>x</c>"));
        assert!(!response_complete(b"<a><b/></"));
        assert!(!response_complete(b"<a st"));
        assert!(!response_complete(b""));
    }

    #[test]
    fn test_framer_resumes_across_chunks() {
        let doc = b"<r status=\"200\"><a x=\"1\">te&amp;xt</a><b/><c><d>y</d></c></r>";
        for split in 1..doc.len() {
            let mut framer = Framer::default();
            assert!(!framer.feed(&doc[..split]), "split at {split}");
            assert!(framer.feed(doc), "split at {split}");
        }

        let mut framer = Framer::default();
        let mut buf = Vec::new();
        for (i, byte) in doc.iter().enumerate() {
            buf.push(*byte);
            assert_eq!(framer.feed(&buf), i == doc.len() - 1, "byte {i}");
        }
    }

    #[test]
    fn test_large_response_is_scanned_once() {
        let mut doc = b"<get_reports_response status=\"200\">".to_vec();
        while doc.len() < 4 * 1024 * 1024 {
            doc.extend_from_slice(b"<report id=\"x\"><result><host>10.0.0.1</host><port>443/tcp</port></result></report>");
        }
        let body_end = doc.len();
        doc.extend_from_slice(b"</get_reports_response>");

        let mut framer = Framer::default();
        let mut fed = 0;
        for chunk in doc.chunks(8192) {
            fed += chunk.len();
            let complete = framer.feed(&doc[..fed]);
            assert_eq!(complete, fed == doc.len());
            // at most one partial event is ever left to rescan
            assert!(fed - framer.scanned < 128, "rescanning {} bytes", fed - framer.scanned);
        }
        assert!(framer.scanned > body_end);
    }

    #[tokio::test]
    async fn test_socket_roundtrip_authenticates_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gvmd.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut read = tokio::io::BufReader::new(read);
            let mut received = Vec::new();
            for response in [
                "<authenticate_response status=\"200\" status_text=\"OK\"><role>Admin</role></authenticate_response>",
                "<get_version_response status=\"200\" status_text=\"OK\"><version>22.4</version></get_version_response>",
            ] {
                let mut buf = Vec::new();
                read.read_until(b'>', &mut buf).await.unwrap();
                // consume the rest of the command
                while !response_complete(&buf) {
                    read.read_until(b'>', &mut buf).await.unwrap();
                }
                received.push(String::from_utf8(buf).unwrap());
                write.write_all(response.as_bytes()).await.unwrap();
            }
            received
        });

        let transport = UnixSocketTransport::new(
            path,
            Some(Credentials::new("admin", "admin")),
            Duration::from_secs(5),
        );
        let raw = transport.send(&Command::new("get_version")).await.unwrap();
        assert!(raw.contains("<version>22.4</version>"));

        let received = server.await.unwrap();
        assert!(received[0].starts_with("<authenticate>"));
        assert_eq!(received[1], "<get_version/>");
    }

    #[tokio::test]
    async fn test_missing_socket_is_io_error() {
        let transport = UnixSocketTransport::new(
            PathBuf::from("/nonexistent/gvmd.sock"),
            None,
            Duration::from_secs(1),
        );
        let result = transport.send(&Command::new("get_version")).await;
        assert!(matches!(result, Err(GmpError::Io(_))));
    }
}
