//! Canned profile backend on the same routes the UI talks to. Payloads come
//! from files in a fixture directory, chosen by the requested view.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use url::Url;

use crate::codec::{OptionsCodec, CHECK_ROUTE, PROFILE_ROUTE};
use crate::logging::{self, obj, v_num, v_str, Domain};
use crate::options::{VIEW_GRAPH, VIEW_PPROF};

pub const NOT_GENERATED_TEXT: &str = "Profile was not generated.";
pub const PPROF_FILE: &str = "pprof.svg";
pub const TIMELINE_FILE: &str = "timeline.json";
pub const TEXT_FILE: &str = "profile.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Response {
    fn new(status: u16, content_type: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    fn status_line(&self) -> &'static str {
        match self.status {
            200 => "200 OK",
            400 => "400 BAD REQUEST",
            404 => "404 NOT FOUND",
            _ => "500 INTERNAL SERVER ERROR",
        }
    }
}

/// File holding the payload for a view.
pub fn payload_file(view: &str) -> &'static str {
    match view {
        VIEW_PPROF => PPROF_FILE,
        VIEW_GRAPH => TIMELINE_FILE,
        _ => TEXT_FILE,
    }
}

/// Answers one GET for `target` (path plus query).
pub fn route(target: &str, dir: &Path) -> Response {
    let parsed = Url::parse("http://fixture.local").and_then(|base| base.join(target));
    let url = match parsed {
        Ok(url) => url,
        Err(_) => return Response::new(400, "text/plain", "Malformed request target."),
    };

    match url.path() {
        "/" => Response::new(200, "text/plain", "profview fixture backend"),
        CHECK_ROUTE => Response::new(200, "text/plain", "ok"),
        PROFILE_ROUTE => {
            let Some(raw) = url.query_pairs().find(|(k, _)| k == "options").map(|(_, v)| v.into_owned()) else {
                return Response::new(400, "text/plain", "Missing options.");
            };
            let options = match OptionsCodec::new().try_decode(&raw) {
                Ok(options) => options,
                Err(err) => return Response::new(400, "text/plain", format!("Bad options: {}", err)),
            };
            let path = dir.join(payload_file(&options.view));
            match std::fs::read_to_string(&path) {
                Ok(body) => Response::new(200, "text/plain", body),
                Err(_) => Response::new(200, "text/plain", NOT_GENERATED_TEXT),
            }
        }
        _ => Response::new(404, "text/plain", "Not Found"),
    }
}

pub struct FixtureServer {
    listener: TcpListener,
    dir: PathBuf,
}

impl FixtureServer {
    pub fn bind(addr: &str, dir: &Path) -> Result<Self> {
        let listener = TcpListener::bind(addr).with_context(|| format!("binding {}", addr))?;
        Ok(Self {
            listener,
            dir: dir.to_path_buf(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Blocks, answering connections one at a time.
    pub fn serve_forever(&self) {
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(s) => s,
                Err(_) => continue,
            };
            if let Err(err) = self.answer(stream) {
                logging::warn(Domain::Server, "connection_failed", obj(&[("error", v_str(&err.to_string()))]));
            }
        }
    }

    fn answer(&self, mut stream: TcpStream) -> Result<()> {
        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line)?;

        // drain headers so closing the socket does not reset the peer
        let mut header = String::new();
        loop {
            header.clear();
            if reader.read_line(&mut header)? == 0 || header.trim().is_empty() {
                break;
            }
        }

        let mut parts = request_line.split_whitespace();
        let response = match (parts.next(), parts.next()) {
            (Some("GET"), Some(target)) => route(target, &self.dir),
            _ => Response::new(404, "text/plain", "Not Found"),
        };
        logging::info(
            Domain::Server,
            "request",
            obj(&[
                ("line", v_str(request_line.trim())),
                ("status", v_num(response.status as f64)),
                ("bytes", v_num(response.body.len() as f64)),
            ]),
        );

        let head = format!(
            "HTTP/1.1 {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Connection: close\r\n\
             Content-Length: {}\r\n\r\n",
            response.status_line(),
            response.content_type,
            response.body.len()
        );
        stream.write_all(head.as_bytes())?;
        stream.write_all(response.body.as_bytes())?;
        stream.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;

    fn profile_target(view: &str) -> String {
        OptionsCodec::new().profile_path(&Options { view: view.into(), ..Default::default() })
    }

    #[test]
    fn test_routes_by_view() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(PPROF_FILE), "<svg/>").unwrap();
        std::fs::write(dir.path().join(TEXT_FILE), "node name | micros").unwrap();

        assert_eq!(route(&profile_target("pprof"), dir.path()).body, "<svg/>");
        assert_eq!(route(&profile_target("code"), dir.path()).body, "node name | micros");
        let missing = route(&profile_target("graph"), dir.path());
        assert_eq!(missing.status, 200);
        assert_eq!(missing.body, NOT_GENERATED_TEXT);
    }

    #[test]
    fn test_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(route("/profile", dir.path()).status, 400);
        assert_eq!(route("/profile?options=%5B1%5D", dir.path()).status, 400);
        assert_eq!(route("/nowhere", dir.path()).status, 404);
        assert_eq!(route(CHECK_ROUTE, dir.path()).body, "ok");
    }
}
