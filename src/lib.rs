//! A kernel-bypass packet-processing framework built on AF_XDP.
//!
//! A [`Datapath`](datapath::Datapath) owns a [`Pool`](pool::Pool) of
//! frames per bind mode, an AF_XDP [`Socket`](socket::Socket) per
//! configured interface, and one worker thread per
//! [`Config::workers`](config::Config::workers), each polling its sockets
//! and handing every received frame to a user-supplied
//! [`PacketProcessor`](processor::PacketProcessor) that decides whether to
//! drop it or forward it out another interface on the same worker.
//!
//! Most applications only need:
//!
//! ```no_run
//! use std::{ffi::CString, sync::Arc};
//! use xsknf_rs::prelude::*;
//! use xsknf_rs::{Datapath, PacketProcessor, Verdict};
//!
//! struct EchoBack;
//!
//! impl PacketProcessor for EchoBack {
//!     fn process(&self, _pkt: &mut [u8], rx_iface: u32) -> Verdict {
//!         Verdict::Forward(rx_iface)
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let eth0 = Interface::new(CString::new("eth0")?);
//! let config = Config::builder()
//!     .add_interface("eth0", eth0, Some(InterfaceBindMode::ZeroCopy))
//!     .build()?;
//!
//! let datapath = Datapath::init(config, Arc::new(EchoBack))?;
//! datapath.start_workers()?;
//! # datapath.stop_workers();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod datapath;
pub mod error;
pub mod pool;
pub mod processor;
pub mod socket;

mod ring;
mod util;
mod worker;

pub mod prelude;

pub use datapath::Datapath;
pub use processor::{PacketProcessor, Verdict};
pub use worker::stats::Stats;
