//! Shared fakes for monitor tests: HTTP stub, controller, sampler, sink.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use vigil::controller::{ControllerError, ProcessController};
use vigil::monitor::report::Report;
use vigil::sampler::ResourceSampler;
use vigil::sink::{AlertSink, Notifier, SinkError};

/// One scripted HTTP reply.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    /// Respond with this status code.
    Status(u16),
    /// Accept the connection and never answer.
    Hang,
}

/// Serve `replies` in order, one per connection; the last reply repeats.
pub async fn serve_script(replies: Vec<Reply>) -> (String, Arc<AtomicUsize>) {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let mut script: VecDeque<Reply> = replies.into();
    tokio::spawn(async move {
        let mut last = Reply::Status(200);
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            let reply = script.pop_front().unwrap_or(last);
            last = reply;
            tokio::spawn(async move {
                let mut buf = [0_u8; 2048];
                let _ = socket.read(&mut buf).await;
                match reply {
                    Reply::Status(code) => {
                        let body = "ok";
                        let response = format!(
                            "HTTP/1.1 {code} Scripted\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                            body.len()
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                    }
                    Reply::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                    }
                }
            });
        }
    });

    (format!("http://{addr}/health"), hits)
}

/// Serve the same status forever.
pub async fn serve_status(code: u16) -> String {
    serve_script(vec![Reply::Status(code)]).await.0
}

/// A URL nothing listens on.
pub async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}/health")
}

/// Process controller with scripted restart results.
pub struct MockController {
    script: Mutex<VecDeque<Result<(), String>>>,
    fallback: Result<(), String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    heap_dumps: Mutex<Vec<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockController {
    /// Every restart succeeds.
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new(), Ok(()))
    }

    /// Every restart fails.
    pub fn failing() -> Self {
        Self::scripted(Vec::new(), Err("pm2 exited with code 1".to_owned()))
    }

    /// Pop results from `script`, then fall back to `fallback`.
    pub fn scripted(script: Vec<Result<(), String>>, fallback: Result<(), String>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            heap_dumps: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Make each restart take `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Names passed to `restart`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Names passed to `heap_dump`.
    pub fn heap_dumps(&self) -> Vec<String> {
        self.heap_dumps.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Highest number of restarts observed in flight at once.
    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessController for MockController {
    async fn restart(&self, name: &str) -> Result<String, ControllerError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name.to_owned());
        }
        let now = self.active.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone());
        self.active.fetch_sub(1, Ordering::SeqCst);

        result
            .map(|()| format!("restarted {name}"))
            .map_err(|stderr| ControllerError::Failed {
                program: "pm2".to_owned(),
                code: Some(1),
                stderr,
            })
    }

    async fn heap_dump(&self, name: &str) -> Result<String, ControllerError> {
        if let Ok(mut dumps) = self.heap_dumps.lock() {
            dumps.push(name.to_owned());
        }
        Ok(format!("heap dump for {name}"))
    }

    fn kind(&self) -> &'static str {
        "mock"
    }
}

/// Sampler returning fixed readings.
pub struct FixedSampler {
    cpu: f64,
    memory: f64,
}

impl FixedSampler {
    /// Readings in percent.
    pub fn new(cpu: f64, memory: f64) -> Self {
        Self { cpu, memory }
    }
}

#[async_trait]
impl ResourceSampler for FixedSampler {
    async fn cpu_percent(&self) -> anyhow::Result<f64> {
        Ok(self.cpu)
    }

    async fn memory_percent(&self) -> anyhow::Result<f64> {
        Ok(self.memory)
    }
}

/// Sink that keeps every alert it receives.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, Report)>>,
}

impl RecordingSink {
    /// Subjects received, in order.
    pub fn subjects(&self) -> Vec<String> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|(subject, _)| subject.clone()).collect())
            .unwrap_or_default()
    }

    /// Reports received, in order.
    pub fn reports(&self) -> Vec<Report> {
        self.sent
            .lock()
            .map(|sent| sent.iter().map(|(_, report)| report.clone()).collect())
            .unwrap_or_default()
    }

    /// How many alerts carried `subject` (without prefix).
    pub fn count(&self, subject: &str) -> usize {
        self.subjects().iter().filter(|s| s.as_str() == subject).count()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, subject: &str, report: &Report) -> Result<(), SinkError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((subject.to_owned(), report.clone()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// An enabled notifier without prefix that records into a fresh sink.
pub fn recording_notifier() -> (Notifier, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let sinks: Vec<Arc<dyn AlertSink>> = vec![sink.clone()];
    (Notifier::new(true, String::new(), sinks), sink)
}
