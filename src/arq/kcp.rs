//! KCP-compatible ARQ engine.
//!
//! Selective-repeat ARQ with cumulative and selective ACKs, RTO estimation,
//! fast retransmit and an optional congestion window. Segments use the
//! classic KCP wire format (see [`SegmentHeader`]).

use std::collections::VecDeque;

use tracing::trace;

use super::segment::{Command, SegmentHeader, SEGMENT_HEADER_SIZE};
use super::{time_diff, ArqConfig, ArqEngine, Output};
use crate::core::ArqError;

/// Engine constants.
pub mod constants {
    /// Minimum RTO in nodelay mode (ms).
    pub const RTO_NDL: u32 = 30;
    /// Minimum RTO (ms).
    pub const RTO_MIN: u32 = 100;
    /// RTO before the first sample (ms).
    pub const RTO_DEF: u32 = 200;
    /// Maximum RTO (ms).
    pub const RTO_MAX: u32 = 60_000;
    /// Probe flag: ask the peer for its window.
    pub const ASK_SEND: u32 = 1;
    /// Probe flag: tell the peer our window.
    pub const ASK_TELL: u32 = 2;
    /// Default send window (segments).
    pub const WND_SND: u16 = 32;
    /// Default and minimum receive window (segments).
    pub const WND_RCV: u16 = 128;
    /// Default MTU.
    pub const MTU_DEF: usize = 1400;
    /// Smallest accepted MTU.
    pub const MTU_MIN: usize = 50;
    /// Default tick interval (ms).
    pub const INTERVAL: u32 = 100;
    /// Default dead-link transmission count.
    pub const DEADLINK: u32 = 20;
    /// Initial slow start threshold.
    pub const THRESH_INIT: u32 = 2;
    /// Minimum slow start threshold.
    pub const THRESH_MIN: u32 = 2;
    /// Initial window probe wait (ms).
    pub const PROBE_INIT: u32 = 7_000;
    /// Maximum window probe wait (ms).
    pub const PROBE_LIMIT: u32 = 120_000;
    /// Fast retransmits allowed per segment.
    pub const FASTACK_LIMIT: u32 = 5;
}

use constants::*;

/// In-flight or queued segment.
#[derive(Debug, Default)]
struct Segment {
    frg: u8,
    sn: u32,
    ts: u32,
    resendts: u32,
    rto: u32,
    fastack: u32,
    xmit: u32,
    data: Vec<u8>,
}

/// KCP protocol control block.
///
/// Drive it with [`update`](Kcp::update) on the cadence reported by
/// [`check`](Kcp::check); raw datagrams go to the owned [`Output`].
pub struct Kcp<O: Output> {
    conv: u32,
    mtu: usize,
    mss: usize,
    reserved: usize,
    dead: bool,

    snd_una: u32,
    snd_nxt: u32,
    rcv_nxt: u32,

    ssthresh: u32,
    rx_rttval: i32,
    rx_srtt: i32,
    rx_rto: u32,
    rx_minrto: u32,

    snd_wnd: u16,
    rcv_wnd: u16,
    rmt_wnd: u16,
    cwnd: u32,
    incr: usize,
    probe: u32,

    current: u32,
    interval: u32,
    ts_flush: u32,
    xmit: u32,
    updated: bool,
    ts_probe: u32,
    probe_wait: u32,

    nodelay: bool,
    fastresend: u32,
    fastlimit: u32,
    nocwnd: bool,
    ack_nodelay: bool,
    dead_link: u32,

    snd_queue: VecDeque<Segment>,
    snd_buf: VecDeque<Segment>,
    rcv_queue: VecDeque<Segment>,
    rcv_buf: VecDeque<Segment>,
    acklist: Vec<(u32, u32)>,

    buffer: Vec<u8>,
    output: O,
}

impl<O: Output> Kcp<O> {
    /// Create an engine with default parameters.
    pub fn new(conv: u32, output: O) -> Self {
        Self {
            conv,
            mtu: MTU_DEF,
            mss: MTU_DEF - SEGMENT_HEADER_SIZE,
            reserved: 0,
            dead: false,

            snd_una: 0,
            snd_nxt: 0,
            rcv_nxt: 0,

            ssthresh: THRESH_INIT,
            rx_rttval: 0,
            rx_srtt: 0,
            rx_rto: RTO_DEF,
            rx_minrto: RTO_MIN,

            snd_wnd: WND_SND,
            rcv_wnd: WND_RCV,
            rmt_wnd: WND_RCV,
            cwnd: 0,
            incr: 0,
            probe: 0,

            current: 0,
            interval: INTERVAL,
            ts_flush: INTERVAL,
            xmit: 0,
            updated: false,
            ts_probe: 0,
            probe_wait: 0,

            nodelay: false,
            fastresend: 0,
            fastlimit: FASTACK_LIMIT,
            nocwnd: false,
            ack_nodelay: false,
            dead_link: DEADLINK,

            snd_queue: VecDeque::new(),
            snd_buf: VecDeque::new(),
            rcv_queue: VecDeque::new(),
            rcv_buf: VecDeque::new(),
            acklist: Vec::new(),

            buffer: vec![0u8; (MTU_DEF + SEGMENT_HEADER_SIZE) * 3],
            output,
        }
    }

    /// Conversation id.
    pub fn conv(&self) -> u32 {
        self.conv
    }

    /// Current MTU.
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Maximum payload carried by one segment.
    pub fn mss(&self) -> usize {
        self.mss
    }

    /// Current retransmission timeout (ms).
    pub fn rto(&self) -> u32 {
        self.rx_rto
    }

    /// Smoothed RTT (ms), 0 before the first sample.
    pub fn srtt(&self) -> i32 {
        self.rx_srtt
    }

    /// Total timeout-driven retransmissions.
    pub fn retransmits(&self) -> u32 {
        self.xmit
    }

    /// Reference to the output sink.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Configure timing behaviour.
    ///
    /// `nodelay` lowers the minimum RTO, `interval` is clamped to
    /// `10..=5000` ms, `resend` enables fast retransmit (0 disables) and
    /// `nc` disables the congestion window.
    pub fn set_nodelay(&mut self, nodelay: bool, interval: u32, resend: u32, nc: bool) {
        self.nodelay = nodelay;
        self.rx_minrto = if nodelay { RTO_NDL } else { RTO_MIN };
        self.interval = interval.clamp(10, 5000);
        self.fastresend = resend;
        self.nocwnd = nc;
    }

    /// Set send and receive windows. Zero leaves a window unchanged.
    pub fn set_wndsize(&mut self, snd_wnd: u16, rcv_wnd: u16) {
        if snd_wnd > 0 {
            self.snd_wnd = snd_wnd;
        }
        if rcv_wnd > 0 {
            self.rcv_wnd = rcv_wnd.max(WND_RCV);
        }
    }

    /// Change the MTU.
    pub fn set_mtu(&mut self, mtu: usize) -> Result<(), ArqError> {
        if mtu < MTU_MIN || mtu <= SEGMENT_HEADER_SIZE + self.reserved {
            return Err(ArqError::InvalidMtu(mtu));
        }
        self.buffer = vec![0u8; (mtu + SEGMENT_HEADER_SIZE) * 3];
        self.mtu = mtu;
        self.mss = mtu - SEGMENT_HEADER_SIZE - self.reserved;
        Ok(())
    }

    /// Flush ACKs right after input instead of waiting for the next tick.
    pub fn set_ack_nodelay(&mut self, enabled: bool) {
        self.ack_nodelay = enabled;
    }

    /// Transmissions of one segment after which the link is dead.
    pub fn set_dead_link(&mut self, count: u32) {
        self.dead_link = count;
    }

    fn wnd_unused(&self) -> u16 {
        let queued = self.rcv_queue.len();
        let wnd = self.rcv_wnd as usize;
        if queued < wnd { (wnd - queued) as u16 } else { 0 }
    }

    fn update_ack(&mut self, rtt: i32) {
        // Samples come from peer timestamps; keep the smoothing in range.
        let rtt = rtt.min(RTO_MAX as i32);
        if self.rx_srtt == 0 {
            self.rx_srtt = rtt;
            self.rx_rttval = rtt / 2;
        } else {
            let delta = (rtt - self.rx_srtt).abs();
            self.rx_rttval = (3 * self.rx_rttval + delta) / 4;
            self.rx_srtt = ((7 * self.rx_srtt + rtt) / 8).max(1);
        }
        let rto = self.rx_srtt + (self.interval as i32).max(4 * self.rx_rttval);
        self.rx_rto = (rto.max(0) as u32).clamp(self.rx_minrto, RTO_MAX);
    }

    fn shrink_buf(&mut self) {
        self.snd_una = self.snd_buf.front().map_or(self.snd_nxt, |seg| seg.sn);
    }

    fn parse_ack(&mut self, sn: u32) {
        if time_diff(sn, self.snd_una) < 0 || time_diff(sn, self.snd_nxt) >= 0 {
            return;
        }
        if let Some(pos) = self.snd_buf.iter().position(|seg| seg.sn == sn) {
            self.snd_buf.remove(pos);
        }
    }

    fn parse_una(&mut self, una: u32) {
        while self
            .snd_buf
            .front()
            .is_some_and(|seg| time_diff(una, seg.sn) > 0)
        {
            self.snd_buf.pop_front();
        }
    }

    fn parse_fastack(&mut self, sn: u32) {
        if time_diff(sn, self.snd_una) < 0 || time_diff(sn, self.snd_nxt) >= 0 {
            return;
        }
        for seg in self.snd_buf.iter_mut() {
            if time_diff(sn, seg.sn) < 0 {
                break;
            } else if sn != seg.sn {
                seg.fastack += 1;
            }
        }
    }

    fn parse_data(&mut self, segment: Segment) {
        let sn = segment.sn;
        if time_diff(sn, self.rcv_nxt.wrapping_add(self.rcv_wnd as u32)) >= 0
            || time_diff(sn, self.rcv_nxt) < 0
        {
            return;
        }

        let mut insert_at = self.rcv_buf.len();
        let mut repeat = false;
        for (i, existing) in self.rcv_buf.iter().enumerate().rev() {
            if existing.sn == sn {
                repeat = true;
                break;
            }
            if time_diff(sn, existing.sn) > 0 {
                break;
            }
            insert_at = i;
        }

        if !repeat {
            self.rcv_buf.insert(insert_at, segment);
        }
        self.move_to_rcv_queue();
    }

    /// Move in-order segments from the receive buffer to the receive queue.
    fn move_to_rcv_queue(&mut self) {
        loop {
            let ready = self.rcv_queue.len() < self.rcv_wnd as usize
                && self.rcv_buf.front().is_some_and(|seg| seg.sn == self.rcv_nxt);
            if !ready {
                break;
            }
            if let Some(seg) = self.rcv_buf.pop_front() {
                self.rcv_queue.push_back(seg);
                self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
            }
        }
    }

    fn emit(&mut self, len: usize) {
        if len > self.reserved {
            trace!(conv = self.conv, len, "kcp output");
            self.output.output(&mut self.buffer[..len]);
        }
    }

    /// Append a header-only segment, emitting the pending datagram if full.
    fn push_control(&mut self, ptr: &mut usize, cmd: Command, wnd: u16, ts: u32, sn: u32) {
        if *ptr + SEGMENT_HEADER_SIZE > self.mtu {
            self.emit(*ptr);
            *ptr = self.reserved;
        }
        SegmentHeader {
            conv: self.conv,
            cmd,
            frg: 0,
            wnd,
            ts,
            sn,
            una: self.rcv_nxt,
            len: 0,
        }
        .encode(&mut self.buffer[*ptr..]);
        *ptr += SEGMENT_HEADER_SIZE;
    }

    fn flush_inner(&mut self, ack_only: bool) {
        if !self.updated {
            return;
        }

        let current = self.current;
        let wnd = self.wnd_unused();
        let mut ptr = self.reserved;

        let mut acks = std::mem::take(&mut self.acklist);
        for &(sn, ts) in &acks {
            self.push_control(&mut ptr, Command::Ack, wnd, ts, sn);
        }
        acks.clear();
        self.acklist = acks;

        if ack_only {
            self.emit(ptr);
            return;
        }

        // Probe a zero remote window.
        if self.rmt_wnd == 0 {
            if self.probe_wait == 0 {
                self.probe_wait = PROBE_INIT;
                self.ts_probe = current.wrapping_add(self.probe_wait);
            } else if time_diff(current, self.ts_probe) >= 0 {
                self.probe_wait = self.probe_wait.max(PROBE_INIT);
                self.probe_wait = (self.probe_wait + self.probe_wait / 2).min(PROBE_LIMIT);
                self.ts_probe = current.wrapping_add(self.probe_wait);
                self.probe |= ASK_SEND;
            }
        } else {
            self.ts_probe = 0;
            self.probe_wait = 0;
        }

        if self.probe & ASK_SEND != 0 {
            self.push_control(&mut ptr, Command::WindowAsk, wnd, 0, 0);
        }
        if self.probe & ASK_TELL != 0 {
            self.push_control(&mut ptr, Command::WindowTell, wnd, 0, 0);
        }
        self.probe = 0;

        let mut cwnd = self.snd_wnd.min(self.rmt_wnd) as u32;
        if !self.nocwnd {
            cwnd = cwnd.min(self.cwnd);
        }

        while time_diff(self.snd_nxt, self.snd_una.wrapping_add(cwnd)) < 0 {
            let Some(mut seg) = self.snd_queue.pop_front() else {
                break;
            };
            seg.ts = current;
            seg.sn = self.snd_nxt;
            seg.resendts = current;
            seg.rto = self.rx_rto;
            seg.fastack = 0;
            seg.xmit = 0;
            self.snd_nxt = self.snd_nxt.wrapping_add(1);
            self.snd_buf.push_back(seg);
        }

        let resent = if self.fastresend > 0 { self.fastresend } else { u32::MAX };
        let rtomin = if self.nodelay { 0 } else { self.rx_rto >> 3 };
        let mut lost = false;
        let mut change = false;

        let mut snd_buf = std::mem::take(&mut self.snd_buf);
        for seg in snd_buf.iter_mut() {
            let mut needsend = false;
            if seg.xmit == 0 {
                needsend = true;
                seg.xmit += 1;
                seg.rto = self.rx_rto;
                seg.resendts = current.wrapping_add(seg.rto + rtomin);
            } else if time_diff(current, seg.resendts) >= 0 {
                needsend = true;
                seg.xmit += 1;
                self.xmit += 1;
                let step = if self.nodelay { seg.rto / 2 } else { seg.rto.max(self.rx_rto) };
                seg.rto = seg.rto.saturating_add(step);
                seg.resendts = current.wrapping_add(seg.rto);
                lost = true;
            } else if seg.fastack >= resent
                && (seg.xmit <= self.fastlimit || self.fastlimit == 0)
            {
                needsend = true;
                seg.xmit += 1;
                seg.fastack = 0;
                seg.resendts = current.wrapping_add(seg.rto);
                change = true;
            }

            if needsend {
                seg.ts = current;
                let need = SEGMENT_HEADER_SIZE + seg.data.len();
                if ptr + need > self.mtu {
                    self.emit(ptr);
                    ptr = self.reserved;
                }
                SegmentHeader {
                    conv: self.conv,
                    cmd: Command::Push,
                    frg: seg.frg,
                    wnd,
                    ts: seg.ts,
                    sn: seg.sn,
                    una: self.rcv_nxt,
                    len: seg.data.len() as u32,
                }
                .encode(&mut self.buffer[ptr..]);
                ptr += SEGMENT_HEADER_SIZE;
                self.buffer[ptr..ptr + seg.data.len()].copy_from_slice(&seg.data);
                ptr += seg.data.len();

                if seg.xmit >= self.dead_link {
                    self.dead = true;
                }
            }
        }
        self.snd_buf = snd_buf;
        self.emit(ptr);

        if change {
            let inflight = self.snd_nxt.wrapping_sub(self.snd_una);
            self.ssthresh = (inflight / 2).max(THRESH_MIN);
            self.cwnd = self.ssthresh.saturating_add(resent);
            self.incr = self.cwnd as usize * self.mss;
        }
        if lost {
            self.ssthresh = (cwnd / 2).max(THRESH_MIN);
            self.cwnd = 1;
            self.incr = self.mss;
        }
        if self.cwnd < 1 {
            self.cwnd = 1;
            self.incr = self.mss;
        }
    }

    /// Grow the congestion window after new data was acknowledged.
    fn grow_cwnd(&mut self) {
        let mss = self.mss.max(1);
        if self.cwnd < self.ssthresh {
            self.cwnd += 1;
            self.incr += mss;
        } else {
            if self.incr < mss {
                self.incr = mss;
            }
            self.incr += (mss * mss) / self.incr + mss / 16;
            if (self.cwnd as usize + 1) * mss <= self.incr {
                self.cwnd = self.incr.div_ceil(mss) as u32;
            }
        }
        if self.cwnd > self.rmt_wnd as u32 {
            self.cwnd = self.rmt_wnd as u32;
            self.incr = self.rmt_wnd as usize * mss;
        }
    }
}

impl<O: Output> ArqEngine for Kcp<O> {
    type Output = O;

    fn with_output(conv: u32, config: &ArqConfig, output: O) -> Result<Self, ArqError> {
        let mut kcp = Kcp::new(conv, output);
        kcp.set_nodelay(
            config.nodelay,
            config.interval,
            config.resend,
            config.no_congestion_window,
        );
        kcp.set_wndsize(config.send_window, config.recv_window);
        kcp.set_mtu(config.mtu)?;
        kcp.set_ack_nodelay(config.ack_nodelay);
        kcp.set_dead_link(config.dead_link);
        Ok(kcp)
    }

    fn send(&mut self, data: &[u8]) -> Result<usize, ArqError> {
        let mss = self.mss.max(1);
        let count = if data.len() <= mss { 1 } else { data.len().div_ceil(mss) };
        if count >= WND_RCV as usize {
            return Err(ArqError::TooManyFragments(count));
        }

        if data.is_empty() {
            self.snd_queue.push_back(Segment::default());
        } else {
            for (i, chunk) in data.chunks(mss).enumerate() {
                self.snd_queue.push_back(Segment {
                    frg: (count - i - 1) as u8,
                    data: chunk.to_vec(),
                    ..Segment::default()
                });
            }
        }
        Ok(data.len())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, ArqError> {
        let size = self.peek_size().ok_or(ArqError::EmptyQueue)?;
        if size > buf.len() {
            return Err(ArqError::BufferTooSmall {
                needed: size,
                available: buf.len(),
            });
        }

        let recover = self.rcv_queue.len() >= self.rcv_wnd as usize;

        let mut len = 0;
        while let Some(seg) = self.rcv_queue.pop_front() {
            buf[len..len + seg.data.len()].copy_from_slice(&seg.data);
            len += seg.data.len();
            if seg.frg == 0 {
                break;
            }
        }

        self.move_to_rcv_queue();

        // Window reopened: tell the peer on the next flush.
        if recover && self.rcv_queue.len() < self.rcv_wnd as usize {
            self.probe |= ASK_TELL;
        }

        Ok(len)
    }

    fn input(&mut self, data: &[u8]) -> Result<usize, ArqError> {
        if data.len() < SEGMENT_HEADER_SIZE {
            return Err(ArqError::Truncated);
        }

        let prev_una = self.snd_una;
        let mut max_ack: Option<u32> = None;
        let mut offset = 0;

        while data.len() - offset >= SEGMENT_HEADER_SIZE {
            let header = SegmentHeader::decode(&data[offset..])?;
            if header.conv != self.conv {
                return Err(ArqError::ConvMismatch {
                    expected: self.conv,
                    actual: header.conv,
                });
            }
            offset += SEGMENT_HEADER_SIZE;

            let len = header.len as usize;
            if data.len() - offset < len {
                return Err(ArqError::Truncated);
            }

            self.rmt_wnd = header.wnd;
            self.parse_una(header.una);
            self.shrink_buf();

            match header.cmd {
                Command::Ack => {
                    let rtt = time_diff(self.current, header.ts);
                    if rtt >= 0 {
                        self.update_ack(rtt);
                    }
                    self.parse_ack(header.sn);
                    self.shrink_buf();
                    max_ack = match max_ack {
                        Some(sn) if time_diff(header.sn, sn) <= 0 => Some(sn),
                        _ => Some(header.sn),
                    };
                }
                Command::Push => {
                    let window_end = self.rcv_nxt.wrapping_add(self.rcv_wnd as u32);
                    if time_diff(header.sn, window_end) < 0 {
                        self.acklist.push((header.sn, header.ts));
                        if time_diff(header.sn, self.rcv_nxt) >= 0 {
                            self.parse_data(Segment {
                                frg: header.frg,
                                sn: header.sn,
                                ts: header.ts,
                                data: data[offset..offset + len].to_vec(),
                                ..Segment::default()
                            });
                        }
                    }
                }
                Command::WindowAsk => self.probe |= ASK_TELL,
                Command::WindowTell => {}
            }

            offset += len;
        }

        if let Some(sn) = max_ack {
            self.parse_fastack(sn);
        }

        if time_diff(self.snd_una, prev_una) > 0 && self.cwnd < self.rmt_wnd as u32 {
            self.grow_cwnd();
        }

        if self.ack_nodelay && !self.acklist.is_empty() {
            self.flush_inner(true);
        }

        Ok(offset)
    }

    fn peek_size(&self) -> Option<usize> {
        let front = self.rcv_queue.front()?;
        if front.frg == 0 {
            return Some(front.data.len());
        }
        if self.rcv_queue.len() < front.frg as usize + 1 {
            return None;
        }

        let mut len = 0;
        for seg in &self.rcv_queue {
            len += seg.data.len();
            if seg.frg == 0 {
                break;
            }
        }
        Some(len)
    }

    fn update(&mut self, now: u32) {
        self.current = now;
        if !self.updated {
            self.updated = true;
            self.ts_flush = now;
        }

        let mut slap = time_diff(now, self.ts_flush);
        if !(-10_000..10_000).contains(&slap) {
            self.ts_flush = now;
            slap = 0;
        }

        if slap >= 0 {
            self.ts_flush = self.ts_flush.wrapping_add(self.interval);
            if time_diff(now, self.ts_flush) >= 0 {
                self.ts_flush = now.wrapping_add(self.interval);
            }
            self.flush_inner(false);
        }
    }

    fn check(&self, now: u32) -> u32 {
        if !self.updated {
            return now;
        }

        let mut ts_flush = self.ts_flush;
        if !(-10_000..10_000).contains(&time_diff(now, ts_flush)) {
            ts_flush = now;
        }
        if time_diff(now, ts_flush) >= 0 {
            return now;
        }

        let tm_flush = time_diff(ts_flush, now);
        let mut tm_packet = i32::MAX;
        for seg in &self.snd_buf {
            let diff = time_diff(seg.resendts, now);
            if diff <= 0 {
                return now;
            }
            tm_packet = tm_packet.min(diff);
        }

        let minimal = (tm_packet.min(tm_flush) as u32).min(self.interval);
        now.wrapping_add(minimal)
    }

    fn flush(&mut self) {
        self.flush_inner(false);
    }

    fn reserve_bytes(&mut self, len: usize) -> Result<(), ArqError> {
        if len >= self.mtu - SEGMENT_HEADER_SIZE {
            return Err(ArqError::InvalidReserve {
                reserved: len,
                mtu: self.mtu,
            });
        }
        self.reserved = len;
        self.mss = self.mtu - SEGMENT_HEADER_SIZE - len;
        Ok(())
    }

    fn wait_snd(&self) -> usize {
        self.snd_buf.len() + self.snd_queue.len()
    }

    fn send_window(&self) -> usize {
        self.snd_wnd as usize
    }

    fn is_dead_link(&self) -> bool {
        self.dead
    }

    fn clear(&mut self) {
        self.snd_queue.clear();
        self.snd_buf.clear();
        self.rcv_queue.clear();
        self.rcv_buf.clear();
        self.acklist.clear();
    }
}

impl<O: Output> std::fmt::Debug for Kcp<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kcp")
            .field("conv", &self.conv)
            .field("mtu", &self.mtu)
            .field("snd_una", &self.snd_una)
            .field("snd_nxt", &self.snd_nxt)
            .field("rcv_nxt", &self.rcv_nxt)
            .field("rto", &self.rx_rto)
            .field("wait_snd", &self.wait_snd())
            .field("dead", &self.dead)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Output that records datagrams in memory.
    #[derive(Clone, Default)]
    struct Wire(Rc<RefCell<VecDeque<Vec<u8>>>>);

    impl Output for Wire {
        fn output(&mut self, datagram: &mut [u8]) {
            self.0.borrow_mut().push_back(datagram.to_vec());
        }
    }

    impl Wire {
        fn take(&self) -> Vec<Vec<u8>> {
            self.0.borrow_mut().drain(..).collect()
        }
    }

    fn engine(conv: u32) -> (Kcp<Wire>, Wire) {
        let wire = Wire::default();
        let kcp = Kcp::with_output(conv, &ArqConfig::fast(), wire.clone()).unwrap();
        (kcp, wire)
    }

    fn deliver(wire: &Wire, to: &mut Kcp<Wire>) {
        for datagram in wire.take() {
            to.input(&datagram).unwrap();
        }
    }

    fn recv_all(kcp: &mut Kcp<Wire>) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(size) = kcp.peek_size() {
            let mut buf = vec![0u8; size];
            let n = kcp.recv(&mut buf).unwrap();
            buf.truncate(n);
            out.push(buf);
        }
        out
    }

    #[test]
    fn test_send_recv_single_message() {
        let (mut a, wa) = engine(7);
        let (mut b, _wb) = engine(7);
        a.update(0);
        b.update(0);

        assert_eq!(a.send(b"hello").unwrap(), 5);
        a.flush();
        deliver(&wa, &mut b);

        assert_eq!(b.peek_size(), Some(5));
        assert_eq!(recv_all(&mut b), vec![b"hello".to_vec()]);
        assert_eq!(b.peek_size(), None);
    }

    #[test]
    fn test_ack_with_far_past_timestamp_caps_rto() {
        let (mut a, _wa) = engine(7);
        a.update(1_000_000);

        let mut ack = [0u8; SEGMENT_HEADER_SIZE];
        SegmentHeader {
            conv: 7,
            cmd: Command::Ack,
            frg: 0,
            wnd: 128,
            ts: 1_000_000u32.wrapping_sub(0x7fff_0000),
            sn: 0,
            una: 0,
            len: 0,
        }
        .encode(&mut ack);

        // First sample seeds the estimate, second goes through smoothing.
        a.input(&ack).unwrap();
        a.input(&ack).unwrap();
        assert_eq!(a.rto(), RTO_MAX);
        assert_eq!(a.srtt(), RTO_MAX as i32);
    }

    #[test]
    fn test_flush_before_update_is_noop() {
        let (mut a, wa) = engine(7);
        a.send(b"queued").unwrap();
        a.flush();
        assert!(wa.take().is_empty());
        assert_eq!(a.wait_snd(), 1);
    }

    #[test]
    fn test_ack_clears_send_buffer() {
        let (mut a, wa) = engine(7);
        let (mut b, wb) = engine(7);
        a.update(0);
        b.update(0);

        a.send(b"ping").unwrap();
        a.flush();
        assert_eq!(a.wait_snd(), 1);

        // ack_nodelay: b answers from inside input()
        deliver(&wa, &mut b);
        deliver(&wb, &mut a);
        assert_eq!(a.wait_snd(), 0);
    }

    #[test]
    fn test_fragmented_message_out_of_order() {
        let (mut a, wa) = engine(9);
        let (mut b, _wb) = engine(9);
        a.update(0);
        b.update(0);

        let message: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        a.send(&message).unwrap();
        a.flush();

        let mut datagrams = wa.take();
        assert_eq!(datagrams.len(), 3);
        datagrams.reverse();

        b.input(&datagrams[0]).unwrap();
        assert_eq!(b.peek_size(), None);
        b.input(&datagrams[1]).unwrap();
        assert_eq!(b.peek_size(), None);
        b.input(&datagrams[2]).unwrap();

        assert_eq!(b.peek_size(), Some(3000));
        assert_eq!(recv_all(&mut b), vec![message]);
    }

    #[test]
    fn test_messages_delivered_in_order() {
        let (mut a, wa) = engine(3);
        let (mut b, _wb) = engine(3);
        a.update(0);
        b.update(0);

        for size in [10usize, 20, 30] {
            a.send(&vec![size as u8; size]).unwrap();
        }
        a.flush();
        deliver(&wa, &mut b);

        let received = recv_all(&mut b);
        assert_eq!(received.len(), 3);
        assert_eq!(received[0], vec![10u8; 10]);
        assert_eq!(received[1], vec![20u8; 20]);
        assert_eq!(received[2], vec![30u8; 30]);
    }

    #[test]
    fn test_retransmit_after_loss() {
        let (mut a, wa) = engine(5);
        let (mut b, _wb) = engine(5);
        a.update(0);
        b.update(0);

        a.send(b"lost once").unwrap();
        a.flush();
        assert_eq!(wa.take().len(), 1); // dropped on the floor

        // RTO 200 + rtomin 25: nothing before 225 ms.
        a.update(100);
        assert!(wa.take().is_empty());

        a.update(300);
        let resent = wa.take();
        assert_eq!(resent.len(), 1);
        assert_eq!(a.retransmits(), 1);

        b.input(&resent[0]).unwrap();
        assert_eq!(recv_all(&mut b), vec![b"lost once".to_vec()]);
    }

    #[test]
    fn test_duplicate_segment_delivered_once() {
        let (mut a, wa) = engine(5);
        let (mut b, _wb) = engine(5);
        a.update(0);
        b.update(0);

        a.send(b"once").unwrap();
        a.flush();
        let datagram = wa.take().remove(0);
        b.input(&datagram).unwrap();
        b.input(&datagram).unwrap();

        assert_eq!(recv_all(&mut b), vec![b"once".to_vec()]);
    }

    #[test]
    fn test_dead_link_after_repeated_loss() {
        let (mut a, wa) = engine(5);
        a.set_dead_link(3);
        a.update(0);
        a.send(b"nobody home").unwrap();
        a.flush();

        let mut now = 0;
        while !a.is_dead_link() && now < 120_000 {
            now += 500;
            a.update(now);
            wa.take();
        }
        assert!(a.is_dead_link());
    }

    #[test]
    fn test_reserved_prefix_left_untouched() {
        let (mut a, wa) = engine(11);
        let (mut b, _wb) = engine(11);
        a.reserve_bytes(20).unwrap();
        assert_eq!(a.mss(), MTU_DEF - SEGMENT_HEADER_SIZE - 20);
        a.update(0);
        b.update(0);

        a.send(b"framed").unwrap();
        a.flush();
        let datagram = wa.take().remove(0);
        assert_eq!(datagram.len(), 20 + SEGMENT_HEADER_SIZE + 6);
        assert_eq!(&datagram[..20], &[0u8; 20]);
        assert_eq!(super::super::peek_conv(&datagram[20..]), Some(11));

        b.input(&datagram[20..]).unwrap();
        assert_eq!(recv_all(&mut b), vec![b"framed".to_vec()]);
    }

    #[test]
    fn test_reserve_too_large() {
        let (mut a, _wa) = engine(1);
        assert!(matches!(
            a.reserve_bytes(MTU_DEF),
            Err(ArqError::InvalidReserve { .. })
        ));
    }

    #[test]
    fn test_conv_mismatch_rejected() {
        let (mut a, wa) = engine(1);
        let (mut b, _wb) = engine(2);
        a.update(0);
        a.send(b"x").unwrap();
        a.flush();

        let datagram = wa.take().remove(0);
        assert_eq!(
            b.input(&datagram),
            Err(ArqError::ConvMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_input_truncated() {
        let (mut b, _wb) = engine(1);
        assert_eq!(b.input(&[0u8; 10]), Err(ArqError::Truncated));
    }

    #[test]
    fn test_too_many_fragments() {
        let (mut a, _wa) = engine(1);
        let data = vec![0u8; a.mss() * WND_RCV as usize];
        assert_eq!(
            a.send(&data),
            Err(ArqError::TooManyFragments(WND_RCV as usize))
        );
        assert_eq!(a.wait_snd(), 0);
    }

    #[test]
    fn test_recv_buffer_too_small() {
        let (mut a, wa) = engine(1);
        let (mut b, _wb) = engine(1);
        a.update(0);
        b.update(0);
        a.send(b"0123456789").unwrap();
        a.flush();
        deliver(&wa, &mut b);

        let mut small = [0u8; 4];
        assert_eq!(
            b.recv(&mut small),
            Err(ArqError::BufferTooSmall {
                needed: 10,
                available: 4
            })
        );
        assert_eq!(b.peek_size(), Some(10));
    }

    #[test]
    fn test_recv_empty_queue() {
        let (mut b, _wb) = engine(1);
        let mut buf = [0u8; 8];
        assert_eq!(b.recv(&mut buf), Err(ArqError::EmptyQueue));
    }

    #[test]
    fn test_wait_snd_counts_queued_segments() {
        let (mut a, _wa) = engine(1);
        for _ in 0..40 {
            a.send(b"m").unwrap();
        }
        assert_eq!(a.wait_snd(), 40);
        assert!(a.wait_snd() >= a.send_window());
    }

    #[test]
    fn test_check_bounded_by_interval() {
        let (mut a, _wa) = engine(1);
        assert_eq!(a.check(123), 123);

        a.update(0);
        assert_eq!(a.check(0), 30);
        assert_eq!(a.check(30), 30);
    }

    #[test]
    fn test_clear_drops_state() {
        let (mut a, _wa) = engine(1);
        a.send(b"pending").unwrap();
        a.clear();
        assert_eq!(a.wait_snd(), 0);
        assert_eq!(a.peek_size(), None);
    }

    #[test]
    fn test_rtt_sample_updates_rto() {
        let (mut a, wa) = engine(4);
        let (mut b, wb) = engine(4);
        a.update(0);
        b.update(0);

        a.send(b"timed").unwrap();
        a.flush();
        deliver(&wa, &mut b);

        a.update(40);
        wa.take();
        deliver(&wb, &mut a);

        assert_eq!(a.srtt(), 40);
        assert!(a.rto() >= RTO_MIN);
    }
}
