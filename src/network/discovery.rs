use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

// ── Wire types ──────────────────────────────────────────────────────────────

/// A running session as advertised to scanning players.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub player_count: u32,
}

/// The discovery side-channel's two-message protocol. Kept separate from
/// the game session's message set: discovery connections are single-shot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum DiscoveryMessage {
    GetHostInfo,
    HostInfo(HostInfo),
}

// ── HostAnnouncer ───────────────────────────────────────────────────────────

/// Answers `GET_HOST_INFO` probes on a dedicated port so players scanning
/// the LAN can list joinable sessions without touching the game port.
pub struct HostAnnouncer {
    info: Arc<Mutex<HostInfo>>,
    accept_handle: Option<tokio::task::JoinHandle<()>>,
}

impl HostAnnouncer {
    /// Bind the announcement listener and start answering probes.
    pub async fn start(info: HostInfo, port: u16) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        log::info!("Announcement service listening on port {port}");

        let info = Arc::new(Mutex::new(info));
        let shared = info.clone();

        let accept_handle = tokio::spawn(async move {
            loop {
                let (stream, addr) = match listener.accept().await {
                    Ok(v) => v,
                    Err(e) => {
                        log::error!("Announcement accept error: {e}");
                        continue;
                    }
                };
                log::debug!("Discovery probe from {addr}");

                let shared = shared.clone();
                tokio::spawn(async move {
                    if let Err(e) = answer_probe(stream, &shared).await {
                        log::debug!("Discovery probe from {addr} failed: {e}");
                    }
                });
            }
        });

        Ok(Self {
            info,
            accept_handle: Some(accept_handle),
        })
    }

    /// Refresh the advertised player count (called on roster changes).
    pub fn update_player_count(&self, count: u32) {
        self.info.lock().player_count = count;
    }

    /// Stop answering probes and release the port. Safe to call twice.
    pub fn stop(&mut self) {
        if let Some(handle) = self.accept_handle.take() {
            handle.abort();
            log::info!("Announcement service stopped");
        }
    }
}

impl Drop for HostAnnouncer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle one probe connection: read the request, reply with HOST_INFO if
/// it is a GET_HOST_INFO, then let the connection drop.
async fn answer_probe(
    mut stream: TcpStream,
    info: &Arc<Mutex<HostInfo>>,
) -> Result<(), std::io::Error> {
    let mut buf = [0u8; 512];
    let n = stream.read(&mut buf).await?;

    let request: DiscoveryMessage = match serde_json::from_slice(trim_frame(&buf[..n])) {
        Ok(msg) => msg,
        Err(e) => {
            log::debug!("Ignoring malformed discovery request: {e}");
            return Ok(());
        }
    };

    if matches!(request, DiscoveryMessage::GetHostInfo) {
        let response = DiscoveryMessage::HostInfo(info.lock().clone());
        let mut frame = serde_json::to_vec(&response)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        frame.push(b'\n');
        stream.write_all(&frame).await?;
    }
    Ok(())
}

fn trim_frame(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &bytes[start..end]
}

// ── Client-side probe ───────────────────────────────────────────────────────

/// Ask `addr` for its host info. Used by a scanning presentation layer to
/// build the join list; a closed port or timeout is an expected outcome.
pub async fn query_host_info(
    addr: SocketAddr,
    wait: Duration,
) -> Result<HostInfo, std::io::Error> {
    let probe = async {
        let mut stream = TcpStream::connect(addr).await?;

        let mut request = serde_json::to_vec(&DiscoveryMessage::GetHostInfo)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        request.push(b'\n');
        stream.write_all(&request).await?;

        let mut buf = Vec::with_capacity(512);
        let mut chunk = [0u8; 512];
        loop {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.contains(&b'\n') {
                break;
            }
        }

        match serde_json::from_slice(trim_frame(&buf)) {
            Ok(DiscoveryMessage::HostInfo(info)) => Ok(info),
            Ok(other) => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unexpected discovery reply: {other:?}"),
            )),
            Err(e) => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        }
    };

    match timeout(wait, probe).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "host info request timed out",
        )),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    fn sample_info(port: u16) -> HostInfo {
        HostInfo {
            name: "Friday Quiz".into(),
            address: "127.0.0.1".into(),
            port,
            player_count: 1,
        }
    }

    #[tokio::test]
    async fn test_announcer_answers_probe() {
        let port = free_port().await;
        let _announcer = HostAnnouncer::start(sample_info(8080), port).await.unwrap();

        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let info = query_host_info(addr, Duration::from_secs(5)).await.unwrap();

        assert_eq!(info.name, "Friday Quiz");
        assert_eq!(info.port, 8080);
        assert_eq!(info.player_count, 1);
    }

    #[tokio::test]
    async fn test_player_count_updates_are_visible() {
        let port = free_port().await;
        let announcer = HostAnnouncer::start(sample_info(8080), port).await.unwrap();
        announcer.update_player_count(4);

        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let info = query_host_info(addr, Duration::from_secs(5)).await.unwrap();
        assert_eq!(info.player_count, 4);
    }

    #[tokio::test]
    async fn test_malformed_probe_gets_no_reply() {
        let port = free_port().await;
        let _announcer = HostAnnouncer::start(sample_info(8080), port).await.unwrap();

        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"garbage\n").await.unwrap();

        // The announcer drops the request; the read should end without data.
        let mut buf = [0u8; 64];
        let read = timeout(Duration::from_secs(2), stream.read(&mut buf)).await;
        match read {
            Ok(Ok(0)) => {}       // clean close, no reply
            Ok(Ok(n)) => panic!("unexpected reply of {n} bytes"),
            Ok(Err(_)) | Err(_) => {} // reset or timeout are also no-reply
        }
    }

    #[tokio::test]
    async fn test_query_against_dead_port_fails() {
        let port = free_port().await;
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let result = query_host_info(addr, Duration::from_millis(500)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stop_twice_is_safe() {
        let port = free_port().await;
        let mut announcer = HostAnnouncer::start(sample_info(8080), port).await.unwrap();
        announcer.stop();
        announcer.stop();
    }
}
