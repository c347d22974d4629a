//! Single-interface datapath loop (`SPEC_FULL.md` §4.4): a hot-path
//! specialization of §4.3 for `I = 1` that skips the per-target bucketing
//! and `owner_of` lookup since every frame already belongs to the one
//! socket involved, and never crosses pools since there is nowhere else
//! to forward to.

use crate::{config::InterfaceBindMode, error::RingInvariantError, pool::FrameAddr, processor::Verdict};

use super::Worker;

pub(super) fn run_once(worker: &mut Worker) {
    debug_assert_eq!(worker.sockets.len(), 1);

    drain_completions(worker);

    let (to_drop, to_tx) = receive_and_classify(worker);

    if !to_drop.is_empty() {
        return_to_fill(worker, &to_drop);
    }

    if !to_tx.is_empty() {
        enqueue_forwards(worker, &to_tx);
    }
}

fn bind_mode(worker: &Worker) -> InterfaceBindMode {
    worker.sockets[0].bind_mode
}

fn drain_completions(worker: &mut Worker) {
    if worker.sockets[0].outstanding_tx == 0 {
        return;
    }

    let bm = bind_mode(worker);

    let needs_kick = {
        let sock = &worker.sockets[0];
        bm == InterfaceBindMode::Copy || (!worker.poll && !worker.busy_poll && sock.tx.needs_wakeup())
    };

    if needs_kick {
        match worker.sockets[0].tx.wakeup() {
            Ok(()) => worker.sockets[0].stats.inc_tx_trigger_sendtos(1),
            Err(e) => log::error!("worker {}: tx wakeup failed: {}", worker.id, e),
        }
    }

    let batch = worker.batch_size.get() as usize;
    let want = batch.min(worker.sockets[0].outstanding_tx as usize);

    if want == 0 {
        return;
    }

    let mut completed = vec![FrameAddr(0); want];

    let got = {
        let group = worker.group_mut(bm);
        unsafe { group.cq.consume(&mut completed) }
    };

    worker.sockets[0].outstanding_tx -= got as u32;

    if got > 0 {
        return_to_fill(worker, &completed[..got]);
    }
}

fn return_to_fill(worker: &mut Worker, addrs: &[FrameAddr]) {
    let bm = bind_mode(worker);
    let group = worker.group_mut(bm);
    let got = unsafe { group.fq.produce(addrs) };

    if got != addrs.len() {
        RingInvariantError::ShortReserveOnFreshRing {
            requested: addrs.len() as u32,
            got: got as u32,
        }
        .abort();
    }
}

fn receive_and_classify(worker: &mut Worker) -> (Vec<FrameAddr>, Vec<(FrameAddr, u32)>) {
    let batch = worker.batch_size.get() as usize;
    let bm = bind_mode(worker);

    let mut out = vec![(FrameAddr(0), 0u32); batch];
    let got = worker.sockets[0].rx.consume(&mut out);

    let mut to_drop = Vec::new();
    let mut to_tx = Vec::new();

    if got == 0 {
        let zero_copy = bm == InterfaceBindMode::ZeroCopy;
        let needs_kick = zero_copy && (worker.busy_poll || worker.group(bm).fq.needs_wakeup());

        if needs_kick {
            if let Err(e) = worker.sockets[0].rx.fd_mut().poll_read(0) {
                log::warn!("worker {}: rx empty-poll failed: {}", worker.id, e);
            }
            worker.sockets[0].stats.inc_rx_empty_polls(1);
        }

        return (to_drop, to_tx);
    }

    worker.sockets[0].stats.inc_rx_npkts(got as u64);

    let pool = worker.group(bm).pool.clone();
    let layout = pool.layout();

    for (addr, len) in &out[..got] {
        let frame_start = layout.strip_offset(*addr);
        let offset = (addr.as_u64() - frame_start.as_u64()) as usize;

        let verdict = {
            let frame = unsafe { pool.frame_mut(frame_start, offset + *len as usize) };
            worker.processor.process(&mut frame[offset..], 0)
        };

        match verdict {
            Verdict::Drop => to_drop.push(*addr),
            Verdict::Forward(0) => to_tx.push((*addr, *len)),
            Verdict::Forward(t) => {
                log::warn!(
                    "worker {}: processor returned out-of-range forward target {} on a single-interface worker, dropping",
                    worker.id, t
                );
                to_drop.push(*addr);
            }
        }
    }

    (to_drop, to_tx)
}

fn enqueue_forwards(worker: &mut Worker, items: &[(FrameAddr, u32)]) {
    loop {
        let produced = unsafe { worker.sockets[0].tx.produce(items) };

        if produced == items.len() {
            worker.sockets[0].outstanding_tx += produced as u32;
            worker.sockets[0].stats.inc_tx_npkts(produced as u64);
            return;
        }

        if produced != 0 {
            RingInvariantError::ShortReserveOnFreshRing {
                requested: items.len() as u32,
                got: produced as u32,
            }
            .abort();
        }

        drain_completions(worker);

        let needs_kick = worker.busy_poll || worker.sockets[0].tx.needs_wakeup();

        if needs_kick {
            match worker.sockets[0].tx.wakeup() {
                Ok(()) => worker.sockets[0].stats.inc_tx_wakeup_sendtos(1),
                Err(e) => log::error!("worker {}: tx wakeup failed: {}", worker.id, e),
            }
        }
    }
}
