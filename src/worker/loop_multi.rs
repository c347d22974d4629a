//! Multi-interface datapath loop (`SPEC_FULL.md` §4.3).

use crate::{config::InterfaceBindMode, error::RingInvariantError, pool::FrameAddr, processor::Verdict};

use super::Worker;

pub(super) fn run_once(worker: &mut Worker) {
    let n = worker.sockets.len();

    for k in 0..n {
        let to_fill = drain_completions(worker, k);
        distribute_to_fill(worker, &to_fill);
    }

    for k in 0..n {
        let (to_drop, to_tx) = receive_and_classify(worker, k);

        if !to_drop.is_empty() {
            return_to_fill(worker, k, &to_drop);
        }

        for (target, items) in to_tx.into_iter().enumerate() {
            if !items.is_empty() {
                enqueue_forwards(worker, k, target, &items);
            }
        }
    }
}

/// Step A: drain up to `batch_size` completions from socket `k`'s pool's
/// completion ring, bucketed by the socket that must receive each frame
/// back.
fn drain_completions(worker: &mut Worker, k: usize) -> Vec<Vec<FrameAddr>> {
    let n = worker.sockets.len();
    let mut to_fill = vec![Vec::new(); n];

    if worker.sockets[k].outstanding_tx == 0 {
        return to_fill;
    }

    let bind_mode = worker.sockets[k].bind_mode;

    let needs_kick = {
        let sock = &worker.sockets[k];
        bind_mode == InterfaceBindMode::Copy
            || (!worker.poll && !worker.busy_poll && sock.tx.needs_wakeup())
    };

    if needs_kick {
        match worker.sockets[k].tx.wakeup() {
            Ok(()) => worker.sockets[k].stats.inc_tx_trigger_sendtos(1),
            Err(e) => log::error!(
                "worker {}: tx wakeup on {} failed: {}",
                worker.id,
                worker.sockets[k].name,
                e
            ),
        }
    }

    let batch = worker.batch_size.get() as usize;
    let want = batch.min(worker.sockets[k].outstanding_tx as usize);

    if want == 0 {
        return to_fill;
    }

    let mut completed = vec![FrameAddr(0); want];

    let got = {
        let group = worker.group_mut(bind_mode);
        unsafe { group.cq.consume(&mut completed) }
    };

    worker.sockets[k].outstanding_tx -= got as u32;

    {
        let group = worker.group(bind_mode);
        let layout = group.pool.layout();

        for addr in &completed[..got] {
            let pool_local = layout.owner_of(*addr);
            let owner = group.members[pool_local as usize];
            to_fill[owner].push(*addr);
        }
    }

    to_fill
}

fn distribute_to_fill(worker: &mut Worker, to_fill: &[Vec<FrameAddr>]) {
    for (target, addrs) in to_fill.iter().enumerate() {
        if !addrs.is_empty() {
            return_to_fill(worker, target, addrs);
        }
    }
}

/// Step A.6 / C: reserve `addrs.len()` slots on socket `target`'s pool's
/// fill ring and submit. A short reserve here means the pool's own
/// bookkeeping promised room that the ring didn't have — fatal.
fn return_to_fill(worker: &mut Worker, target: usize, addrs: &[FrameAddr]) {
    let bind_mode = worker.sockets[target].bind_mode;
    let group = worker.group_mut(bind_mode);
    let got = unsafe { group.fq.produce(addrs) };

    if got != addrs.len() {
        RingInvariantError::ShortReserveOnFreshRing {
            requested: addrs.len() as u32,
            got: got as u32,
        }
        .abort();
    }
}

/// Step B: receive up to `batch_size` packets from socket `k` and run
/// each through the processor, bucketing by verdict.
#[allow(clippy::type_complexity)]
fn receive_and_classify(
    worker: &mut Worker,
    k: usize,
) -> (Vec<FrameAddr>, Vec<Vec<(FrameAddr, u32)>>) {
    let n = worker.sockets.len();
    let batch = worker.batch_size.get() as usize;
    let bind_mode = worker.sockets[k].bind_mode;

    let mut out = vec![(FrameAddr(0), 0u32); batch];
    let got = worker.sockets[k].rx.consume(&mut out);

    let mut to_drop = Vec::new();
    let mut to_tx = vec![Vec::new(); n];

    if got == 0 {
        let zero_copy = bind_mode == InterfaceBindMode::ZeroCopy;
        let needs_kick =
            zero_copy && (worker.busy_poll || worker.group(bind_mode).fq.needs_wakeup());

        if needs_kick {
            if let Err(e) = worker.sockets[k].rx.fd_mut().poll_read(0) {
                log::warn!(
                    "worker {}: rx empty-poll on {} failed: {}",
                    worker.id,
                    worker.sockets[k].name,
                    e
                );
            }
            worker.sockets[k].stats.inc_rx_empty_polls(1);
        }

        return (to_drop, to_tx);
    }

    worker.sockets[k].stats.inc_rx_npkts(got as u64);

    let pool = worker.group(bind_mode).pool.clone();
    let layout = pool.layout();

    for (addr, len) in &out[..got] {
        let frame_start = layout.strip_offset(*addr);
        let offset = (addr.as_u64() - frame_start.as_u64()) as usize;

        let verdict = {
            let frame = unsafe { pool.frame_mut(frame_start, offset + *len as usize) };
            worker.processor.process(&mut frame[offset..], k as u32)
        };

        match verdict {
            Verdict::Drop => to_drop.push(*addr),
            Verdict::Forward(t) if (t as usize) < n => to_tx[t as usize].push((*addr, *len)),
            Verdict::Forward(t) => {
                log::warn!(
                    "worker {}: processor returned out-of-range forward target {} (have {} interfaces), dropping",
                    worker.id, t, n
                );
                to_drop.push(*addr);
            }
        }
    }

    (to_drop, to_tx)
}

/// Step D: reserve TX slots on `target`, copying payload across pools
/// first if `k` and `target` differ in bind mode, then submit. On a
/// short reserve, drain `k`'s completions and wake `target`'s TX side
/// before retrying.
fn enqueue_forwards(worker: &mut Worker, k: usize, target: usize, items: &[(FrameAddr, u32)]) {
    let src_bind = worker.sockets[k].bind_mode;
    let dst_bind = worker.sockets[target].bind_mode;

    if src_bind != dst_bind {
        let src_pool = worker.group(src_bind).pool.clone();
        let dst_pool = worker.group(dst_bind).pool.clone();

        for (addr, len) in items {
            unsafe { src_pool.copy_into(&dst_pool, *addr, *len as usize) };
        }
    }

    loop {
        let produced = unsafe { worker.sockets[target].tx.produce(items) };

        if produced == items.len() {
            worker.sockets[target].outstanding_tx += produced as u32;
            worker.sockets[target].stats.inc_tx_npkts(produced as u64);
            return;
        }

        if produced != 0 {
            RingInvariantError::ShortReserveOnFreshRing {
                requested: items.len() as u32,
                got: produced as u32,
            }
            .abort();
        }

        let to_fill = drain_completions(worker, k);
        distribute_to_fill(worker, &to_fill);

        let needs_kick = worker.busy_poll || worker.sockets[target].tx.needs_wakeup();

        if needs_kick {
            match worker.sockets[target].tx.wakeup() {
                Ok(()) => worker.sockets[target].stats.inc_tx_wakeup_sendtos(1),
                Err(e) => log::error!(
                    "worker {}: tx wakeup on {} failed: {}",
                    worker.id,
                    worker.sockets[target].name,
                    e
                ),
            }
        }
    }
}
