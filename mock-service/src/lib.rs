//! Minimal RESP server standing in for a store node in tests.
use anyhow::{bail, Context};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// How the node answers `FLUSHALL`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushReply {
    #[default]
    Ok,
    /// Answer like a replica does.
    ReadOnly,
    Error,
}

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    /// Added to every `SET` before replying.
    pub set_delay: Duration,
    /// Reply to every `SET` with an error.
    pub fail_sets: bool,
    pub flush: FlushReply,
    /// Body returned by `CLUSTER NODES`; `None` answers as a non-cluster node.
    pub cluster_nodes: Option<String>,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub sets: AtomicU64,
    pub flushes: AtomicU64,
    data: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MockState {
    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> usize {
        self.data.lock().unwrap().len()
    }

    pub fn value_len(&self, key: &[u8]) -> Option<usize> {
        self.data.lock().unwrap().get(key).map(Vec::len)
    }

    pub fn any_value_len(&self) -> Option<usize> {
        self.data.lock().unwrap().values().next().map(Vec::len)
    }
}

pub struct MockHandle {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockHandle {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Binds an ephemeral port on localhost and serves in the background until the handle
/// is dropped.
pub async fn spawn(config: MockConfig) -> anyhow::Result<MockHandle> {
    spawn_on(TcpListener::bind("127.0.0.1:0").await?, config)
}

/// Serves on an already bound listener, for nodes whose config must name their own port.
pub fn spawn_on(listener: TcpListener, config: MockConfig) -> anyhow::Result<MockHandle> {
    let addr = listener.local_addr()?;
    let state = Arc::new(MockState::default());

    let task = tokio::spawn(serve(listener, Arc::new(config), state.clone()));
    Ok(MockHandle { addr, state, task })
}

pub async fn run(addr: SocketAddr, config: MockConfig, state: Arc<MockState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, Arc::new(config), state).await;
    Ok(())
}

async fn serve(listener: TcpListener, config: Arc<MockConfig>, state: Arc<MockState>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(err) => {
                debug!("accept failed: {err}");
                continue;
            }
        };
        trace!("connection from {peer}");

        let config = config.clone();
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle(stream, &config, &state).await {
                debug!("connection from {peer} closed: {err:#}");
            }
        });
    }
}

async fn handle(stream: TcpStream, config: &MockConfig, state: &MockState) -> anyhow::Result<()> {
    // Address the client reached us on, advertised as the owner of every slot.
    let local = stream.local_addr()?;
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await? {
        let Some((name, rest)) = args.split_first() else {
            write_error(&mut write, "ERR empty command").await?;
            continue;
        };

        match name.to_ascii_uppercase().as_slice() {
            b"PING" => write.write_all(b"+PONG\r\n").await?,
            b"SET" => {
                let [key, value, ..] = rest else {
                    write_error(&mut write, "ERR wrong number of arguments for 'set' command")
                        .await?;
                    continue;
                };
                if !config.set_delay.is_zero() {
                    tokio::time::sleep(config.set_delay).await;
                }
                state.sets.fetch_add(1, Ordering::SeqCst);
                if config.fail_sets {
                    write_error(&mut write, "ERR injected failure").await?;
                } else {
                    state
                        .data
                        .lock()
                        .unwrap()
                        .insert(key.clone(), value.clone());
                    write.write_all(b"+OK\r\n").await?;
                }
            }
            b"FLUSHALL" => match config.flush {
                FlushReply::Ok => {
                    state.flushes.fetch_add(1, Ordering::SeqCst);
                    state.data.lock().unwrap().clear();
                    write.write_all(b"+OK\r\n").await?;
                }
                FlushReply::ReadOnly => {
                    write_error(
                        &mut write,
                        "READONLY You can't write against a read only replica.",
                    )
                    .await?
                }
                FlushReply::Error => write_error(&mut write, "ERR flush refused").await?,
            },
            b"CLUSTER" => {
                let sub = rest.first().map(|s| s.to_ascii_uppercase());
                match (sub.as_deref(), &config.cluster_nodes) {
                    (_, None) => {
                        write_error(&mut write, "ERR This instance has cluster support disabled")
                            .await?
                    }
                    (Some(b"NODES"), Some(nodes)) => write_bulk(&mut write, nodes.as_bytes()).await?,
                    (Some(b"SLOTS"), Some(_)) => write_slots(&mut write, local).await?,
                    _ => write_error(&mut write, "ERR unknown CLUSTER subcommand").await?,
                }
            }
            // Handshake chatter such as CLIENT SETINFO.
            _ => write.write_all(b"+OK\r\n").await?,
        }
    }

    Ok(())
}

async fn read_command<R>(reader: &mut R) -> anyhow::Result<Option<Vec<Vec<u8>>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }

    let count: usize = line
        .trim_end()
        .strip_prefix('*')
        .context("expected a RESP array")?
        .parse()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await?;
        let len: usize = line
            .trim_end()
            .strip_prefix('$')
            .context("expected a bulk string")?
            .parse()?;

        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await?;
        if !buf.ends_with(b"\r\n") {
            bail!("bulk string not terminated by CRLF");
        }
        buf.truncate(len);
        args.push(buf);
    }

    Ok(Some(args))
}

async fn write_error<W: AsyncWrite + Unpin>(write: &mut W, msg: &str) -> std::io::Result<()> {
    write.write_all(format!("-{msg}\r\n").as_bytes()).await
}

async fn write_bulk<W: AsyncWrite + Unpin>(write: &mut W, data: &[u8]) -> std::io::Result<()> {
    write
        .write_all(format!("${}\r\n", data.len()).as_bytes())
        .await?;
    write.write_all(data).await?;
    write.write_all(b"\r\n").await
}

/// `CLUSTER SLOTS` reply with this node serving the whole keyspace.
async fn write_slots<W: AsyncWrite + Unpin>(write: &mut W, addr: SocketAddr) -> std::io::Result<()> {
    let host = addr.ip().to_string();
    let id = format!("mock-{}", addr.port());
    let reply = format!(
        "*1\r\n*3\r\n:0\r\n:16383\r\n*3\r\n${}\r\n{host}\r\n:{}\r\n${}\r\n{id}\r\n",
        host.len(),
        addr.port(),
        id.len(),
    );
    write.write_all(reply.as_bytes()).await
}
