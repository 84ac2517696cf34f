#![forbid(unsafe_code)]
#![allow(dead_code)]

use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub(crate) struct Server {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Server {
    pub(crate) fn start(storage_dir: &Path) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_listarchive"))
            .arg("--storage-dir")
            .arg(storage_dir)
            .env("LISTARCHIVE_LOG", "warn")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn listarchive");

        let stdin = child.stdin.take().expect("stdin");
        let stdout = BufReader::new(child.stdout.take().expect("stdout"));
        Self {
            child,
            stdin: Some(stdin),
            stdout,
        }
    }

    pub(crate) fn send(&mut self, req: Value) {
        self.send_raw(&req.to_string());
    }

    pub(crate) fn send_raw(&mut self, line: &str) {
        self.send_bytes(line.as_bytes());
    }

    /// Writes `bytes` as one line, without any encoding check.
    pub(crate) fn send_bytes(&mut self, bytes: &[u8]) {
        let stdin = self.stdin.as_mut().expect("stdin open");
        stdin.write_all(bytes).expect("write request");
        stdin.write_all(b"\n").expect("write newline");
        stdin.flush().expect("flush request");
    }

    pub(crate) fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.stdout.read_line(&mut line).expect("read event");
        assert!(!line.trim().is_empty(), "empty event line");
        serde_json::from_str(&line).expect("parse event json")
    }

    /// Reads events until one with the given `type` arrives.
    pub(crate) fn recv_type(&mut self, kind: &str) -> Value {
        loop {
            let event = self.recv();
            if event["type"] == kind {
                return event;
            }
        }
    }

    /// Closes stdin and returns every event written before the process exits.
    pub(crate) fn finish(mut self) -> Vec<Value> {
        drop(self.stdin.take());
        let mut events = Vec::new();
        let mut line = String::new();
        while self.stdout.read_line(&mut line).expect("read event") > 0 {
            if !line.trim().is_empty() {
                events.push(serde_json::from_str(&line).expect("parse event json"));
            }
            line.clear();
        }
        let status = self.child.wait().expect("wait listarchive");
        assert!(status.success(), "listarchive exited with {status}");
        events
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
