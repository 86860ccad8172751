//! Blocking client for the Lambda Runtime API.

use anyhow::{anyhow, Context, Result};
use serde_json::json;

const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
const API_VERSION: &str = "2018-06-01";
const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
const ERROR_TYPE: &str = "HandlerError";

/// One event handed out by the runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub request_id: String,
    pub payload: Vec<u8>,
}

pub struct LambdaRuntime {
    agent: ureq::Agent,
    base: String,
}

impl LambdaRuntime {
    /// `api` is the `host:port` published in `AWS_LAMBDA_RUNTIME_API`.
    pub fn new(api: &str) -> Self {
        // No timeout: `next` long-polls until an event arrives.
        let agent = ureq::AgentBuilder::new().build();
        Self {
            agent,
            base: format!("http://{}/{}/runtime", api, API_VERSION),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api = std::env::var(RUNTIME_API_ENV)
            .map_err(|_| anyhow!("{} is not set; not running inside Lambda", RUNTIME_API_ENV))?;
        Ok(Self::new(&api))
    }

    pub fn next_invocation(&self) -> Result<Invocation> {
        let url = format!("{}/invocation/next", self.base);
        let response = self
            .agent
            .get(&url)
            .call()
            .context("fetch next invocation")?;
        let request_id = response
            .header(REQUEST_ID_HEADER)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("invocation without {} header", REQUEST_ID_HEADER))?;
        let mut payload = Vec::new();
        std::io::copy(&mut response.into_reader(), &mut payload)
            .context("read invocation payload")?;
        Ok(Invocation {
            request_id,
            payload,
        })
    }

    pub fn send_response(&self, request_id: &str, body: &[u8]) -> Result<()> {
        let url = format!("{}/invocation/{}/response", self.base, request_id);
        self.agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_bytes(body)
            .with_context(|| format!("post response for {}", request_id))?;
        Ok(())
    }

    pub fn send_error(&self, request_id: &str, error: &anyhow::Error) -> Result<()> {
        let url = format!("{}/invocation/{}/error", self.base, request_id);
        let body = json!({
            "errorMessage": format!("{:#}", error),
            "errorType": ERROR_TYPE,
        });
        self.agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Lambda-Runtime-Function-Error-Type", ERROR_TYPE)
            .send_string(&body.to_string())
            .with_context(|| format!("post error for {}", request_id))?;
        Ok(())
    }

    /// Serves invocations until the runtime API fails. Handler errors are
    /// reported for that invocation and the loop continues.
    pub fn run<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(&Invocation) -> Result<Vec<u8>>,
    {
        loop {
            let invocation = self.next_invocation()?;
            log::debug!(
                "invocation {} ({} bytes)",
                invocation.request_id,
                invocation.payload.len()
            );
            match handler(&invocation) {
                Ok(body) => self.send_response(&invocation.request_id, &body)?,
                Err(err) => {
                    log::error!("invocation {} failed: {:#}", invocation.request_id, err);
                    self.send_error(&invocation.request_id, &err)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    struct Captured {
        request_line: String,
        body: Vec<u8>,
    }

    fn read_request(stream: &mut TcpStream) -> Captured {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        let header_end = loop {
            let n = stream.read(&mut buf).expect("read");
            assert!(n > 0, "client closed before headers");
            data.extend_from_slice(&buf[..n]);
            if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&data[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
            .map(|(_, v)| v.trim().parse::<usize>().expect("length"))
            .unwrap_or(0);
        let mut body = data[header_end..].to_vec();
        while body.len() < content_length {
            let n = stream.read(&mut buf).expect("read body");
            assert!(n > 0, "client closed before body");
            body.extend_from_slice(&buf[..n]);
        }
        Captured {
            request_line: head.lines().next().unwrap_or_default().to_string(),
            body,
        }
    }

    fn respond(stream: &mut TcpStream, status: &str, extra: &str, body: &[u8]) {
        let head = format!(
            "HTTP/1.1 {}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            extra,
            body.len()
        );
        stream.write_all(head.as_bytes()).expect("write head");
        stream.write_all(body).expect("write body");
    }

    /// Serves one invocation, then captures the follow-up post.
    fn spawn_runtime(payload: &'static [u8]) -> (String, thread::JoinHandle<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr").to_string();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept next");
            let next = read_request(&mut stream);
            assert!(next
                .request_line
                .starts_with("GET /2018-06-01/runtime/invocation/next"));
            respond(
                &mut stream,
                "200 OK",
                "Lambda-Runtime-Aws-Request-Id: req-42\r\nContent-Type: application/json\r\n",
                payload,
            );
            drop(stream);

            let (mut stream, _) = listener.accept().expect("accept post");
            let posted = read_request(&mut stream);
            respond(&mut stream, "202 Accepted", "", br#"{"status":"OK"}"#);
            posted
        });
        (addr, handle)
    }

    #[test]
    fn fetches_invocation_and_posts_response() {
        let (addr, server) = spawn_runtime(br#"{"Records":[]}"#);
        let runtime = LambdaRuntime::new(&addr);

        let invocation = runtime.next_invocation().expect("next");
        assert_eq!(invocation.request_id, "req-42");
        assert_eq!(invocation.payload, br#"{"Records":[]}"#);

        runtime
            .send_response(&invocation.request_id, br#"{"statusCode":200}"#)
            .expect("respond");
        let posted = server.join().expect("server");
        assert!(posted
            .request_line
            .starts_with("POST /2018-06-01/runtime/invocation/req-42/response"));
        assert_eq!(posted.body, br#"{"statusCode":200}"#);
    }

    #[test]
    fn handler_error_is_reported_and_loop_stops_when_runtime_goes_away() {
        let (addr, server) = spawn_runtime(b"{}");
        let runtime = LambdaRuntime::new(&addr);

        let result = runtime.run(|_| Err(anyhow!("detector unavailable")));
        // The mock serves a single invocation, so the next poll fails.
        assert!(result.is_err());

        let posted = server.join().expect("server");
        assert!(posted
            .request_line
            .starts_with("POST /2018-06-01/runtime/invocation/req-42/error"));
        let body: serde_json::Value = serde_json::from_slice(&posted.body).expect("json");
        assert_eq!(body["errorMessage"], "detector unavailable");
        assert_eq!(body["errorType"], "HandlerError");
    }
}
