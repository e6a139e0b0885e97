use crate::domain::value_objects::ids::QueueJobId;
use crate::infrastructure::queue::job_queue::{JobQueue, QueueError, ReservedJob};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

const DEFAULT_PRIORITY: u32 = 1024;
const DEFAULT_TTR_SECONDS: u32 = 120;

/// beanstalkd client over a single connection.
///
/// Commands are serialized through one lock. A command future must not be
/// dropped half way, or the connection loses its place in the protocol.
pub struct BeanstalkQueue {
    conn: Mutex<Connection>,
    put_priority: u32,
    put_ttr: u32,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    using: String,
}

impl BeanstalkQueue {
    pub async fn connect(addr: &str) -> Result<Self, QueueError> {
        let stream = TcpStream::connect(addr).await?;
        let (read, write) = stream.into_split();
        Ok(Self {
            conn: Mutex::new(Connection {
                reader: BufReader::new(read),
                writer: write,
                using: "default".to_string(),
            }),
            put_priority: DEFAULT_PRIORITY,
            put_ttr: DEFAULT_TTR_SECONDS,
        })
    }

    pub fn with_put_ttr(mut self, ttr: Duration) -> Self {
        self.put_ttr = ttr.as_secs().max(1) as u32;
        self
    }
}

impl Connection {
    async fn send(&mut self, command: &str, payload: Option<&[u8]>) -> Result<(), QueueError> {
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        if let Some(data) = payload {
            self.writer.write_all(data).await?;
            self.writer.write_all(b"\r\n").await?;
        }
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, QueueError> {
        let mut line = String::new();
        let read = self.reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(QueueError::Connection("connection closed".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn read_body(&mut self, len: usize) -> Result<Vec<u8>, QueueError> {
        let mut buf = vec![0_u8; len + 2];
        self.reader.read_exact(&mut buf).await?;
        if !buf.ends_with(b"\r\n") {
            return Err(QueueError::Protocol("job body not terminated".to_string()));
        }
        buf.truncate(len);
        Ok(buf)
    }

    async fn use_tube(&mut self, tube: &str) -> Result<(), QueueError> {
        if self.using == tube {
            return Ok(());
        }
        self.send(&format!("use {tube}"), None).await?;
        let reply = self.read_line().await?;
        match split_reply(&reply) {
            ("USING", _) => {
                self.using = tube.to_string();
                Ok(())
            }
            _ => Err(unexpected(&reply)),
        }
    }
}

fn split_reply(reply: &str) -> (&str, Vec<&str>) {
    let mut parts = reply.split_whitespace();
    let head = parts.next().unwrap_or("");
    (head, parts.collect())
}

fn unexpected(reply: &str) -> QueueError {
    QueueError::Protocol(format!("unexpected reply: {reply}"))
}

fn parse_id(raw: Option<&&str>, reply: &str) -> Result<QueueJobId, QueueError> {
    raw.and_then(|v| v.parse::<u64>().ok())
        .map(QueueJobId)
        .ok_or_else(|| unexpected(reply))
}

#[async_trait]
impl JobQueue for BeanstalkQueue {
    async fn watch(&self, tube: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.lock().await;
        conn.send(&format!("watch {tube}"), None).await?;
        let reply = conn.read_line().await?;
        match split_reply(&reply) {
            ("WATCHING", _) => Ok(()),
            _ => Err(unexpected(&reply)),
        }
    }

    async fn use_tube(&self, tube: &str) -> Result<(), QueueError> {
        self.conn.lock().await.use_tube(tube).await
    }

    async fn reserve(&self, timeout: Duration) -> Result<Option<ReservedJob>, QueueError> {
        let mut conn = self.conn.lock().await;
        conn.send(&format!("reserve-with-timeout {}", timeout.as_secs()), None)
            .await?;
        let reply = conn.read_line().await?;
        let (head, args) = split_reply(&reply);
        match head {
            "RESERVED" => {
                let id = parse_id(args.first(), &reply)?;
                let len = args
                    .get(1)
                    .and_then(|v| v.parse::<usize>().ok())
                    .ok_or_else(|| unexpected(&reply))?;
                let body = conn.read_body(len).await?;
                let body = String::from_utf8_lossy(&body).trim().to_string();
                debug!(job_id = id.0, body = %body, "queue_reserved");
                Ok(Some(ReservedJob { id, body }))
            }
            // A reservation we hold is about to expire; nothing new was reserved.
            "TIMED_OUT" | "DEADLINE_SOON" => Ok(None),
            _ => Err(unexpected(&reply)),
        }
    }

    async fn touch(&self, id: QueueJobId) -> Result<(), QueueError> {
        let mut conn = self.conn.lock().await;
        conn.send(&format!("touch {}", id.0), None).await?;
        let reply = conn.read_line().await?;
        match split_reply(&reply) {
            ("TOUCHED", _) => Ok(()),
            ("NOT_FOUND", _) => Err(QueueError::NotFound),
            _ => Err(unexpected(&reply)),
        }
    }

    async fn delete(&self, id: QueueJobId) -> Result<(), QueueError> {
        let mut conn = self.conn.lock().await;
        conn.send(&format!("delete {}", id.0), None).await?;
        let reply = conn.read_line().await?;
        match split_reply(&reply) {
            ("DELETED", _) => Ok(()),
            ("NOT_FOUND", _) => Err(QueueError::NotFound),
            _ => Err(unexpected(&reply)),
        }
    }

    async fn put(&self, tube: &str, body: &str) -> Result<QueueJobId, QueueError> {
        let mut conn = self.conn.lock().await;
        conn.use_tube(tube).await?;
        let data = body.as_bytes();
        conn.send(
            &format!("put {} 0 {} {}", self.put_priority, self.put_ttr, data.len()),
            Some(data),
        )
        .await?;
        let reply = conn.read_line().await?;
        let (head, args) = split_reply(&reply);
        match head {
            "INSERTED" | "BURIED" => parse_id(args.first(), &reply),
            _ => Err(unexpected(&reply)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BeanstalkQueue;
    use crate::domain::value_objects::ids::QueueJobId;
    use crate::infrastructure::queue::job_queue::{JobQueue, QueueError};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    /// Serve one connection, answering each command line with the next reply.
    async fn scripted_server(replies: Vec<&'static str>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut reader = BufReader::new(read);
            let mut commands = Vec::new();
            for reply in replies {
                let mut line = String::new();
                reader.read_line(&mut line).await.unwrap();
                let line = line.trim_end().to_string();
                if line.starts_with("put ") {
                    let mut body = String::new();
                    reader.read_line(&mut body).await.unwrap();
                }
                commands.push(line);
                write.write_all(reply.as_bytes()).await.unwrap();
            }
            commands
        });
        (addr, handle)
    }

    #[tokio::test]
    async fn given_reserved_reply_when_reserve_should_return_body() {
        let (addr, server) = scripted_server(vec!["RESERVED 7 12\r\n20240101_abc\r\n"]).await;
        let queue = BeanstalkQueue::connect(&addr).await.unwrap();

        let job = queue.reserve(Duration::from_secs(30)).await.unwrap().unwrap();

        assert_eq!(job.id, QueueJobId(7));
        assert_eq!(job.body, "20240101_abc");
        assert_eq!(server.await.unwrap(), vec!["reserve-with-timeout 30"]);
    }

    #[tokio::test]
    async fn given_timed_out_reply_when_reserve_should_return_none() {
        let (addr, _server) = scripted_server(vec!["TIMED_OUT\r\n"]).await;
        let queue = BeanstalkQueue::connect(&addr).await.unwrap();

        assert_eq!(queue.reserve(Duration::from_secs(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn given_not_found_reply_when_touch_should_report_lost_job() {
        let (addr, _server) = scripted_server(vec!["TOUCHED\r\n", "NOT_FOUND\r\n"]).await;
        let queue = BeanstalkQueue::connect(&addr).await.unwrap();

        assert_eq!(queue.touch(QueueJobId(3)).await, Ok(()));
        assert_eq!(queue.touch(QueueJobId(3)).await, Err(QueueError::NotFound));
    }

    #[tokio::test]
    async fn given_put_on_other_tube_when_put_should_switch_tube_first() {
        let (addr, server) = scripted_server(vec!["USING build\r\n", "INSERTED 42\r\n"]).await;
        let queue = BeanstalkQueue::connect(&addr).await.unwrap();

        let id = queue.put("build", "20240101_abc").await.unwrap();

        assert_eq!(id, QueueJobId(42));
        let commands = server.await.unwrap();
        assert_eq!(commands[0], "use build");
        assert!(commands[1].starts_with("put 1024 0 120 12"));
    }
}
