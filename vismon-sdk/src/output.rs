//! Output backends for emitting snapshots.

use std::path::PathBuf;

use vismon_types::Snapshot;

/// Output destination for snapshots.
///
/// Configure where the engine should emit snapshots.
#[derive(Debug, Clone)]
pub enum Output {
    /// Write snapshots to a JSON file.
    ///
    /// The file is overwritten with each snapshot.
    File(PathBuf),

    /// Send snapshots to a TCP server.
    ///
    /// Each snapshot is sent as a newline-delimited JSON message.
    Tcp(String),

    /// Send snapshots through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    #[cfg(feature = "tokio")]
    Channel(tokio::sync::mpsc::Sender<Snapshot>),
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vismon_sdk::Output;
    ///
    /// let output = Output::file("snapshot.json");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vismon_sdk::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    ///
    /// // Later, receive snapshots
    /// // while let Some(snapshot) = rx.recv().await {
    /// //     println!("{} objects tracked", snapshot.len());
    /// // }
    /// ```
    #[cfg(feature = "tokio")]
    pub fn channel(buffer: usize) -> (Self, tokio::sync::mpsc::Receiver<Snapshot>) {
        let (tx, rx) = tokio::sync::mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Short description used in logs.
    pub fn describe(&self) -> String {
        match self {
            Output::File(path) => format!("file:{}", path.display()),
            Output::Tcp(addr) => format!("tcp:{}", addr),
            #[cfg(feature = "tokio")]
            Output::Channel(_) => "channel".to_string(),
        }
    }

    /// Emit a snapshot to this output.
    #[cfg(feature = "tokio")]
    pub(crate) async fn emit(&self, snapshot: &Snapshot) -> std::io::Result<()> {
        match self {
            Output::File(path) => {
                let json = serde_json::to_string_pretty(snapshot)?;
                tokio::fs::write(path, json).await?;
            }
            Output::Tcp(addr) => {
                use tokio::io::AsyncWriteExt;
                use tokio::net::TcpStream;

                // Best effort: an absent listener is not an error
                if let Ok(mut stream) = TcpStream::connect(addr).await {
                    let mut json = serde_json::to_vec(snapshot)?;
                    json.push(b'\n');
                    stream.write_all(&json).await?;
                }
            }
            Output::Channel(tx) => {
                // Never block on a slow consumer
                let _ = tx.try_send(snapshot.clone());
            }
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "tokio"))]
mod tests {
    use super::*;
    use vismon_types::ObjectSnapshot;

    fn snapshot() -> Snapshot {
        Snapshot::builder()
            .object(ObjectSnapshot::new(1, "scheduler", "app::Scheduler", "Core"))
            .build()
    }

    #[tokio::test]
    async fn file_output_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        Output::file(&path).emit(&snapshot()).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let back: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back.objects[0].name, "scheduler");
    }

    #[tokio::test]
    async fn channel_output_drops_when_full() {
        let (output, mut rx) = Output::channel(1);
        output.emit(&snapshot()).await.unwrap();
        output.emit(&snapshot()).await.unwrap();
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn tcp_output_tolerates_missing_listener() {
        let output = Output::tcp("127.0.0.1:1");
        assert!(output.emit(&snapshot()).await.is_ok());
    }

    #[tokio::test]
    async fn tcp_output_sends_one_line() {
        use tokio::io::AsyncBufReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut line = String::new();
            tokio::io::BufReader::new(stream).read_line(&mut line).await.unwrap();
            line
        });

        Output::tcp(addr).emit(&snapshot()).await.unwrap();
        let line = server.await.unwrap();
        assert!(line.ends_with('\n'));
        let back: Snapshot = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(back.objects.len(), 1);
    }

    #[test]
    fn describe_names_destination() {
        assert_eq!(Output::tcp("localhost:9090").describe(), "tcp:localhost:9090");
        assert!(Output::file("a.json").describe().starts_with("file:"));
    }
}
