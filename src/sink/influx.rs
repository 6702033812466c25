//! InfluxDB sink (HTTP line protocol, `/write?db=`).

use std::time::Duration;

use url::Url;

use crate::model::Point;

use super::{PointSink, SinkError};

/// Escape a measurement name: backslashes, commas and spaces.
pub fn escape_measurement(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ',' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a tag key or tag value: backslashes, commas, equals signs and
/// spaces.
pub fn escape_key(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | ',' | '=' | ' ') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render points in line protocol, one line each, nanosecond timestamps.
///
/// Tags with an empty key or value are skipped (InfluxDB rejects them), as
/// are non-finite values.
pub fn line_protocol(points: &[Point]) -> String {
    let mut body = String::new();
    for point in points.iter().filter(|p| p.value.is_finite()) {
        body.push_str(&escape_measurement(&point.name));
        for (key, value) in point.tags.iter().filter(|(k, v)| !k.is_empty() && !v.is_empty()) {
            body.push(',');
            body.push_str(&escape_key(key));
            body.push('=');
            body.push_str(&escape_key(value));
        }
        body.push_str(" value=");
        body.push_str(&point.value.to_string());
        if let Some(ns) = point.time.timestamp_nanos_opt() {
            body.push(' ');
            body.push_str(&ns.to_string());
        }
        body.push('\n');
    }
    body
}

/// Writes points to an InfluxDB 1.x compatible `/write` endpoint.
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: reqwest::Client,
    write_url: Url,
    credentials: Option<(String, String)>,
}

impl InfluxSink {
    /// Create a sink for `database` at `base_url`.
    pub fn new(
        base_url: &Url,
        database: &str,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let mut write_url = base_url.clone();
        let path = format!("{}/write", base_url.path().trim_end_matches('/'));
        write_url.set_path(&path);
        write_url.query_pairs_mut().append_pair("db", database);

        Ok(Self {
            client,
            write_url,
            credentials,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

#[async_trait::async_trait]
impl PointSink for InfluxSink {
    async fn write_points(&self, points: &[Point]) -> Result<(), SinkError> {
        let body = line_protocol(points);
        if body.is_empty() {
            return Ok(());
        }

        let mut request = self.client.post(self.write_url.clone()).body(body);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        tracing::trace!(count = points.len(), "Points written to InfluxDB");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_escaping() {
        assert_eq!(escape_measurement("cpu load,x"), r"cpu\ load\,x");
        assert_eq!(escape_key("a=b c,d"), r"a\=b\ c\,d");
        assert_eq!(escape_measurement("a=b"), "a=b");
    }

    #[test]
    fn test_trailing_backslash_does_not_swallow_separator() {
        assert_eq!(escape_key(r"C:\"), r"C:\\");
        assert_eq!(escape_measurement(r"disk\"), r"disk\\");

        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let points = vec![
            Point::new("disk.Free", 1.0)
                .with_tag("mount", r"C:\")
                .with_tag("z", "1")
                .at(ts),
        ];
        assert_eq!(
            line_protocol(&points),
            "disk.Free,mount=C:\\\\,z=1 value=1 1700000000000000000\n"
        );
    }

    #[test]
    fn test_line_protocol() {
        let ts = DateTime::from_timestamp(1_700_000_000, 5).unwrap();
        let points = vec![
            Point::new("cpu.User", 12.5)
                .with_tag("core", "0")
                .with_tag("hostname", "db 1")
                .at(ts),
            Point::new("misc.Forks", f64::NAN).at(ts),
            Point::new("mem.Used", 1024.0).with_tag("empty", "").at(ts),
        ];

        assert_eq!(
            line_protocol(&points),
            "cpu.User,core=0,hostname=db\\ 1 value=12.5 1700000000000000005\n\
             mem.Used value=1024 1700000000000000005\n"
        );
    }

    #[test]
    fn test_write_url() {
        let base = Url::parse("http://influx.local:8086/").unwrap();
        let sink = InfluxSink::new(&base, "vigil", None, Duration::from_secs(1)).unwrap();
        assert_eq!(sink.write_url().as_str(), "http://influx.local:8086/write?db=vigil");

        let base = Url::parse("http://proxy.local/influx").unwrap();
        let sink = InfluxSink::new(&base, "a b", None, Duration::from_secs(1)).unwrap();
        assert_eq!(sink.write_url().as_str(), "http://proxy.local/influx/write?db=a+b");
    }

    /// Serve exactly one request with the given status line and body,
    /// returning the raw request text.
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (Url, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}", listener.local_addr().unwrap())).unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
            }
            let response = format!(
                "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn test_write_points_with_auth() {
        let (url, server) = serve_once("HTTP/1.1 204 No Content", "").await;
        let sink = InfluxSink::new(
            &url,
            "vigil",
            Some(("monitor".to_string(), "secret".to_string())),
            Duration::from_secs(5),
        )
        .unwrap();

        sink.write_points(&[Point::new("misc.AvailableEntropy", 256.0)])
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /write?db=vigil HTTP/1.1"));
        // base64("monitor:secret")
        assert!(request.contains("bW9uaXRvcjpzZWNyZXQ="));
        assert!(request.contains("misc.AvailableEntropy value=256 "));
    }

    #[tokio::test]
    async fn test_write_points_rejected() {
        let (url, server) = serve_once("HTTP/1.1 400 Bad Request", "oops!").await;
        let sink = InfluxSink::new(&url, "vigil", None, Duration::from_secs(5)).unwrap();

        let err = sink
            .write_points(&[Point::new("x", 1.0)])
            .await
            .unwrap_err();
        match err {
            SinkError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "oops!");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_batch_sends_nothing() {
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        let sink = InfluxSink::new(&base, "vigil", None, Duration::from_millis(100)).unwrap();
        sink.write_points(&[]).await.unwrap();
    }
}
