// src/rx.rs
//
// Ingest side of the pipeline: read datagrams, stamp arrival, push into the
// ring. The ring full case is drop-tail; the frame is discarded and counted.

use crate::net::build_mcast_socket;
use crate::spsc::SpscRing;
use crate::util::{now_nanos, ShutdownFlag};
use crate::wire::RawFrame;
use anyhow::Context;
use log::{debug, error};
use std::io;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

/// Datagrams requested per receive call where the platform supports batching.
pub const RX_BATCH: usize = 8;

/// Abstract multicast endpoint. The read loop is OS-agnostic; backends decide
/// between batched and one-shot receives. Implementations must be
/// non-blocking: an empty socket surfaces as `WouldBlock`.
pub trait MulticastSource: Send {
    /// Fills `frames` from the front, setting `len` on each, and returns how
    /// many datagrams were received.
    fn recv_batch(&self, frames: &mut [RawFrame]) -> io::Result<usize>;
}

pub struct UdpSource {
    sock: UdpSocket,
}

impl UdpSource {
    pub fn open(group: Ipv4Addr, port: u16) -> anyhow::Result<Self> {
        let sock = build_mcast_socket(group, port)
            .with_context(|| format!("open multicast source {group}:{port}"))?;
        Ok(Self { sock })
    }
}

#[cfg(target_os = "linux")]
impl MulticastSource for UdpSource {
    fn recv_batch(&self, frames: &mut [RawFrame]) -> io::Result<usize> {
        use crate::wire::MAX_FRAME_BYTES;
        use std::os::fd::AsRawFd;

        let want = frames.len().min(RX_BATCH);
        if want == 0 {
            return Ok(0);
        }

        let mut iovecs: [libc::iovec; RX_BATCH] = unsafe { std::mem::zeroed() };
        let mut hdrs: [libc::mmsghdr; RX_BATCH] = unsafe { std::mem::zeroed() };
        for i in 0..want {
            iovecs[i].iov_base = frames[i].bytes.as_mut_ptr() as *mut libc::c_void;
            iovecs[i].iov_len = MAX_FRAME_BYTES;
            hdrs[i].msg_hdr.msg_iov = &mut iovecs[i];
            hdrs[i].msg_hdr.msg_iovlen = 1;
        }

        let rc = unsafe {
            libc::recvmmsg(
                self.sock.as_raw_fd(),
                hdrs.as_mut_ptr(),
                want as libc::c_uint,
                libc::MSG_DONTWAIT,
                std::ptr::null_mut(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        let got = rc as usize;
        for i in 0..got {
            // Oversized datagrams arrive truncated to the frame capacity.
            frames[i].len = (hdrs[i].msg_len as usize).min(MAX_FRAME_BYTES);
        }
        Ok(got)
    }
}

#[cfg(not(target_os = "linux"))]
impl MulticastSource for UdpSource {
    fn recv_batch(&self, frames: &mut [RawFrame]) -> io::Result<usize> {
        let frame = match frames.first_mut() {
            Some(f) => f,
            None => return Ok(0),
        };
        let n = self.sock.recv(&mut frame.bytes)?;
        frame.len = n;
        Ok(1)
    }
}

#[derive(Default)]
pub struct RxCounters {
    messages_received: AtomicU64,
    bytes_received: AtomicU64,
    push_failures: AtomicU64,
}

impl RxCounters {
    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Acquire)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Acquire)
    }

    pub fn push_failures(&self) -> u64 {
        self.push_failures.load(Ordering::Acquire)
    }
}

#[inline]
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::ConnectionReset
    )
}

/// Producer loop. Exits when `shutdown` is raised or on a hard socket error;
/// transient errors yield and retry.
pub fn rx_loop<S: MulticastSource>(
    source: &S,
    ring: &SpscRing<RawFrame>,
    counters: &RxCounters,
    shutdown: &ShutdownFlag,
) -> anyhow::Result<()> {
    let mut batch = [RawFrame::default(); RX_BATCH];
    let mut dropped: u64 = 0;

    while !shutdown.is_raised() {
        match source.recv_batch(&mut batch) {
            Ok(0) => thread::yield_now(),
            Ok(n) => {
                for frame in &mut batch[..n] {
                    frame.arrival_ts_ns = now_nanos();
                    let len = frame.len;
                    match ring.try_push(*frame) {
                        Ok(()) => {
                            counters.messages_received.fetch_add(1, Ordering::Relaxed);
                            counters.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
                        }
                        Err(_full) => {
                            counters.push_failures.fetch_add(1, Ordering::Relaxed);
                            dropped += 1;
                            if dropped % 10_000 == 1 {
                                debug!("rx: ring full, dropped={dropped}");
                            }
                        }
                    }
                }
            }
            Err(err) if is_transient(&err) => thread::yield_now(),
            Err(err) => return Err(err).context("multicast recv"),
        }
    }
    Ok(())
}

/// Owns the socket and the ingest thread. `stop` raises the shared shutdown
/// flag and joins; dropping the receiver does the same.
pub struct Receiver {
    source: Option<UdpSource>,
    shutdown: Option<Arc<ShutdownFlag>>,
    counters: Arc<RxCounters>,
    failed: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Receiver {
    /// Construction performs all socket setup; any failure here is fatal for
    /// the caller.
    pub fn new(group: Ipv4Addr, port: u16) -> anyhow::Result<Self> {
        Ok(Self {
            source: Some(UdpSource::open(group, port)?),
            shutdown: None,
            counters: Arc::new(RxCounters::default()),
            failed: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }

    pub fn start(
        &mut self,
        ring: Arc<SpscRing<RawFrame>>,
        shutdown: Arc<ShutdownFlag>,
    ) -> anyhow::Result<()> {
        let source = self.source.take().context("receiver already started")?;
        self.shutdown = Some(shutdown.clone());
        let counters = self.counters.clone();
        let failed = self.failed.clone();
        let handle = thread::Builder::new()
            .name("rx".into())
            .spawn(move || {
                if let Err(e) = rx_loop(&source, &ring, &counters, &shutdown) {
                    error!("ingest failed: {e:#}");
                    failed.store(true, Ordering::Release);
                    shutdown.raise();
                }
            })
            .context("spawn rx thread")?;
        self.handle = Some(handle);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(shutdown) = &self.shutdown {
            shutdown.raise();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn counters(&self) -> &RxCounters {
        &self.counters
    }

    /// True when the ingest thread died on a hard socket error.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}
